use crate::error::{GracefulError, Result};
use crate::signal::Signal;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Orchestrator settings as supplied by the caller.
///
/// Unset timeouts mean "unlimited". Signals listed here are added to the
/// default termination set, never substituted for it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Maximum time for the whole startup sequence
    #[serde(
        rename = "startup_timeout_ms",
        with = "millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub startup_timeout: Option<Duration>,

    /// Maximum time to wait for shutdown steps to report
    #[serde(
        rename = "shutdown_timeout_ms",
        with = "millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub shutdown_timeout: Option<Duration>,

    /// Extra signals that trigger shutdown
    pub signals: Vec<Signal>,
}

/// Validated settings consumed by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    startup_timeout: Option<Duration>,
    shutdown_timeout: Option<Duration>,
    signals: Vec<Signal>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Listen for these signals in addition to the defaults
    pub fn with_signals<I>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = Signal>,
    {
        self.signals.extend(signals);
        self
    }

    /// Load options from a TOML file (optional) overlaid with `GRACEFUL_*`
    /// environment variables, e.g. `GRACEFUL_SHUTDOWN_TIMEOUT_MS=5000` or
    /// `GRACEFUL_SIGNALS=SIGHUP,SIGUSR1`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading lifecycle options from: {}", path_str);

        let settings = Config::builder()
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("GRACEFUL")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("signals"),
            )
            .build()?;

        let options: Options = settings.try_deserialize()?;

        info!("Lifecycle options loaded");
        debug!("Lifecycle options: {:?}", options);

        Ok(options)
    }

    /// Validate and resolve into the configuration the orchestrator runs with
    pub fn resolve(&self) -> Result<LifecycleConfig> {
        let startup_timeout = positive("startup", self.startup_timeout)?;
        let shutdown_timeout = positive("shutdown", self.shutdown_timeout)?;

        let mut signals = Signal::defaults();
        for signal in &self.signals {
            if !signals.contains(signal) {
                signals.push(*signal);
            }
        }

        Ok(LifecycleConfig {
            startup_timeout,
            shutdown_timeout,
            signals,
        })
    }
}

fn positive(phase: &str, timeout: Option<Duration>) -> Result<Option<Duration>> {
    match timeout {
        Some(timeout) if timeout.is_zero() => Err(GracefulError::invalid_option(format!(
            "{} timeout must be positive",
            phase
        ))),
        other => Ok(other),
    }
}

impl LifecycleConfig {
    /// `None` means unlimited
    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout
    }

    /// `None` means unlimited
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            startup_timeout: None,
            shutdown_timeout: None,
            signals: Signal::defaults(),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_u64(duration.as_millis() as u64),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
