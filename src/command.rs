//! Shell-command steps and the runner configuration built from them.

use crate::config::Options;
use crate::context::StepContext;
use crate::error::{GracefulError, Result};
use crate::multi::multi;
use crate::step::Step;
use anyhow::{anyhow, Context};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Configuration for the `graceful-run` binary
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub lifecycle: Options,
    pub startup: Vec<CommandStep>,
    pub shutdown: Vec<CommandStep>,
}

/// One step made of shell commands. Several commands run concurrently.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommandStep {
    pub name: String,
    pub commands: Vec<String>,
}

impl RunnerConfig {
    /// Load the runner configuration from a TOML file (required) overlaid
    /// with `GRACEFUL_*` environment variables. Nested keys use `__`, e.g.
    /// `GRACEFUL_LIFECYCLE__SHUTDOWN_TIMEOUT_MS=5000` or
    /// `GRACEFUL_LIFECYCLE__SIGNALS=SIGHUP,SIGUSR1`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading runner configuration from: {}", path_str);

        let settings = Config::builder()
            .add_source(File::with_name(&path_str))
            .add_source(
                Environment::with_prefix("GRACEFUL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("lifecycle.signals"),
            )
            .build()?;
        let config: RunnerConfig = settings.try_deserialize()?;

        info!(
            "Runner configuration loaded: {} startup and {} shutdown step(s)",
            config.startup.len(),
            config.shutdown.len()
        );
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.lifecycle.resolve()?;

        for step in self.startup.iter().chain(&self.shutdown) {
            if step.name.trim().is_empty() {
                return Err(GracefulError::invalid_option("step name must not be empty"));
            }
            if step.commands.is_empty() {
                return Err(GracefulError::invalid_option(format!(
                    "step '{}' has no commands",
                    step.name
                )));
            }
        }

        Ok(())
    }

    pub fn startup_steps(&self) -> Vec<Step> {
        self.startup.iter().map(CommandStep::to_step).collect()
    }

    pub fn shutdown_steps(&self) -> Vec<Step> {
        self.shutdown.iter().map(CommandStep::to_step).collect()
    }

    /// A small configuration showing every section
    pub fn example() -> Self {
        Self {
            lifecycle: Options {
                startup_timeout: Some(std::time::Duration::from_secs(30)),
                shutdown_timeout: Some(std::time::Duration::from_secs(10)),
                signals: Vec::new(),
            },
            startup: vec![
                CommandStep {
                    name: "migrate".to_string(),
                    commands: vec!["echo running migrations".to_string()],
                },
                CommandStep {
                    name: "warm-caches".to_string(),
                    commands: vec!["echo warming a".to_string(), "echo warming b".to_string()],
                },
            ],
            shutdown: vec![CommandStep {
                name: "flush".to_string(),
                commands: vec!["echo flushing".to_string()],
            }],
        }
    }
}

impl CommandStep {
    pub fn to_step(&self) -> Step {
        match self.commands.as_slice() {
            [command] => shell_step(self.name.clone(), command.clone()),
            commands => {
                let composed = multi(
                    commands
                        .iter()
                        .enumerate()
                        .map(|(i, command)| {
                            shell_step(format!("{}#{}", self.name, i + 1), command.clone())
                        })
                        .collect::<Vec<_>>(),
                );
                Step::new(self.name.clone(), move |ctx| composed.run(ctx))
            }
        }
    }
}

/// Run `command` through `sh -c`. A non-zero exit is an error; the child is
/// killed if the context finishes first.
pub fn shell_step(name: String, command: String) -> Step {
    Step::new(name.clone(), move |ctx: StepContext| async move {
        debug!("Step '{}' running: {}", name, command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", command))?;

        tokio::select! {
            status = child.wait() => {
                let status = status.with_context(|| format!("failed to wait for '{}'", command))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(anyhow!("command '{}' exited with {}", command, status))
                }
            }
            err = ctx.done_err() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill '{}' for step '{}': {}", command, name, e);
                }
                Err(anyhow::Error::new(err).context(format!("command '{}' interrupted", command)))
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use parking_lot::Mutex;
    use std::io::Write;
    use std::time::Duration;
    use tokio::time::Instant;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_successful_command() {
        let step = shell_step("ok".to_string(), "true".to_string());
        assert!(step.run(StepContext::background()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_command_reports_status() {
        let step = shell_step("bad".to_string(), "exit 3".to_string());
        let err = step.run(StepContext::background()).await.unwrap_err();
        assert!(err.to_string().contains("exit 3"));
    }

    #[tokio::test]
    async fn test_command_killed_when_context_expires() {
        let step = shell_step("slow".to_string(), "sleep 5".to_string());
        let ctx = StepContext::background().with_timeout(Duration::from_millis(50));

        let started = Instant::now();
        let err = step.run(ctx).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.to_string().contains("interrupted"));
        assert!(matches!(
            err.downcast_ref::<GracefulError>(),
            Some(GracefulError::DeadlineExceeded)
        ));
    }

    #[tokio::test]
    async fn test_multiple_commands_run_under_one_name() {
        let step = CommandStep {
            name: "pair".to_string(),
            commands: vec!["true".to_string(), "exit 1".to_string()],
        }
        .to_step();

        assert_eq!(step.name(), "pair");
        assert!(step.run(StepContext::background()).await.is_err());
    }

    #[test]
    fn test_load_and_validate() {
        let _env = ENV_LOCK.lock();
        let file = write_toml(
            r#"
[lifecycle]
shutdown_timeout_ms = 500

[[startup]]
name = "migrate"
commands = ["true"]

[[shutdown]]
name = "flush"
commands = ["true", "true"]
"#,
        );

        let config = RunnerConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.lifecycle.shutdown_timeout,
            Some(Duration::from_millis(500))
        );
        assert_eq!(config.startup_steps().len(), 1);
        assert_eq!(config.shutdown_steps()[0].name(), "flush");
    }

    #[test]
    fn test_env_overrides_lifecycle_section() {
        let _env = ENV_LOCK.lock();
        let file = write_toml(
            r#"
[lifecycle]
shutdown_timeout_ms = 500

[[shutdown]]
name = "flush"
commands = ["true"]
"#,
        );

        std::env::set_var("GRACEFUL_LIFECYCLE__SHUTDOWN_TIMEOUT_MS", "2500");
        std::env::set_var("GRACEFUL_LIFECYCLE__SIGNALS", "SIGHUP,SIGUSR2");
        let loaded = RunnerConfig::load_from_file(file.path());
        std::env::remove_var("GRACEFUL_LIFECYCLE__SHUTDOWN_TIMEOUT_MS");
        std::env::remove_var("GRACEFUL_LIFECYCLE__SIGNALS");

        let config = loaded.unwrap();
        assert_eq!(
            config.lifecycle.shutdown_timeout,
            Some(Duration::from_millis(2500))
        );
        assert_eq!(
            config.lifecycle.signals,
            vec![Signal::HANGUP, Signal::USER_DEFINED_2]
        );
        assert_eq!(config.shutdown[0].name, "flush");
    }

    #[test]
    fn test_validation_rejects_empty_commands() {
        let mut config = RunnerConfig::example();
        assert!(config.validate().is_ok());

        config.shutdown.push(CommandStep {
            name: "nothing".to_string(),
            commands: Vec::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_renders_as_toml() {
        let rendered = toml::to_string_pretty(&RunnerConfig::example()).unwrap();
        assert!(rendered.contains("shutdown_timeout_ms = 10000"));
        assert!(rendered.contains("[[startup]]"));
    }
}
