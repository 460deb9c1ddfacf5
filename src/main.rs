use anyhow::Result;
use clap::Parser;
use graceful::command::RunnerConfig;
use graceful::Orchestrator;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "graceful-run")]
#[command(about = "Run startup commands, wait for a termination signal, then run shutdown commands")]
#[command(version)]
#[command(long_about = "Wraps a service's lifecycle: startup commands run in order (commands \
listed together in one step run concurrently), the process then waits for SIGINT/SIGTERM or any \
extra configured signal, and finally every shutdown step runs concurrently. The reason for exiting \
is printed as JSON and mapped to the process exit code.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "graceful.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without running anything")]
    validate_config: bool,

    /// Print an example configuration and exit
    #[arg(long, help = "Print an example configuration in TOML format and exit")]
    print_config: bool,

    /// Print the exit reason as indented JSON
    #[arg(long, help = "Print the exit reason as indented JSON instead of a single line")]
    pretty: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_example_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting graceful-run v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match RunnerConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let mut orchestrator = Orchestrator::new(config.lifecycle.clone());
    let reason = orchestrator
        .start(config.startup_steps(), config.shutdown_steps())
        .await;

    if args.pretty {
        println!("{}", reason.to_indented_text("", "  "));
    } else {
        println!("{}", reason.to_compact_text());
    }

    let exit_code = reason.exit_code();
    info!("graceful-run exited with code: {}", exit_code);

    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("graceful={}", log_level)));

    // Logs go to stderr so stdout carries only the exit reason
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print an example configuration in TOML format
fn print_example_config() -> Result<()> {
    println!("# graceful-run configuration file");
    println!("# Startup steps run in order; commands listed in one step run concurrently.");
    println!("# Shutdown steps all run concurrently.");
    println!();
    print!("{}", toml::to_string_pretty(&RunnerConfig::example())?);
    Ok(())
}
