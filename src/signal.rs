//! OS signal identifiers and the listener used while awaiting a trigger.
//!
//! Signals are carried as raw signal numbers so that any signal the platform
//! supports can be configured, while the common termination signals get named
//! constants and conventional descriptions.

use crate::error::GracefulError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error};

/// An operating-system signal, identified by its raw number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(i32);

struct KnownSignal {
    signal: Signal,
    name: &'static str,
    description: &'static str,
}

impl Signal {
    /// SIGINT, delivered by Ctrl+C
    pub const INTERRUPT: Signal = Signal(libc::SIGINT);
    /// SIGTERM, the conventional service stop request (systemd, docker, kill)
    pub const TERMINATE: Signal = Signal(libc::SIGTERM);
    #[cfg(unix)]
    pub const HANGUP: Signal = Signal(libc::SIGHUP);
    #[cfg(unix)]
    pub const QUIT: Signal = Signal(libc::SIGQUIT);
    #[cfg(unix)]
    pub const USER_DEFINED_1: Signal = Signal(libc::SIGUSR1);
    #[cfg(unix)]
    pub const USER_DEFINED_2: Signal = Signal(libc::SIGUSR2);

    /// Wrap a raw signal number. Zero and negative numbers are not signals.
    pub fn from_raw(raw: i32) -> crate::Result<Self> {
        if raw <= 0 {
            return Err(GracefulError::UnknownSignal(raw.to_string()));
        }
        Ok(Signal(raw))
    }

    pub fn as_raw(&self) -> i32 {
        self.0
    }

    /// Conventional `SIGxxx` name, if this is one of the named signals
    pub fn name(&self) -> Option<&'static str> {
        known_signals()
            .into_iter()
            .find(|known| known.signal == *self)
            .map(|known| known.name)
    }

    /// The default termination set: interrupt and terminate
    pub fn defaults() -> Vec<Signal> {
        vec![Signal::INTERRUPT, Signal::TERMINATE]
    }
}

fn known_signals() -> Vec<KnownSignal> {
    let mut known = vec![
        KnownSignal {
            signal: Signal::INTERRUPT,
            name: "SIGINT",
            description: "interrupt",
        },
        KnownSignal {
            signal: Signal::TERMINATE,
            name: "SIGTERM",
            description: "terminated",
        },
    ];

    #[cfg(unix)]
    known.extend([
        KnownSignal {
            signal: Signal::HANGUP,
            name: "SIGHUP",
            description: "hangup",
        },
        KnownSignal {
            signal: Signal::QUIT,
            name: "SIGQUIT",
            description: "quit",
        },
        KnownSignal {
            signal: Signal::USER_DEFINED_1,
            name: "SIGUSR1",
            description: "user defined signal 1",
        },
        KnownSignal {
            signal: Signal::USER_DEFINED_2,
            name: "SIGUSR2",
            description: "user defined signal 2",
        },
    ]);

    known
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match known_signals().into_iter().find(|known| known.signal == *self) {
            Some(known) => f.write_str(known.description),
            None => write!(f, "signal {}", self.0),
        }
    }
}

impl FromStr for Signal {
    type Err = GracefulError;

    /// Accepts `SIGTERM`, `TERM`, `terminated` (any case) or a raw number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(raw) = trimmed.parse::<i32>() {
            return Signal::from_raw(raw);
        }

        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);

        known_signals()
            .into_iter()
            .find(|known| {
                &known.name[3..] == bare || known.description.eq_ignore_ascii_case(trimmed)
            })
            .map(|known| known.signal)
            .ok_or_else(|| GracefulError::UnknownSignal(trimmed.to_string()))
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.name() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_i32(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i32),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(raw) => Signal::from_raw(raw).map_err(de::Error::custom),
            Repr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// Listener for a fixed set of OS signals.
///
/// Handlers are installed when the listener is registered, not when it is
/// first polled. tokio never uninstalls a handler, so once registered a
/// signal no longer terminates the process by default, even after the
/// listener is dropped.
pub struct SignalListener {
    #[cfg(unix)]
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
    #[cfg(not(unix))]
    ctrl_c: bool,
}

impl SignalListener {
    /// Install handlers for every signal in `signals`.
    ///
    /// A signal that cannot be registered is logged and skipped. If nothing
    /// could be registered, `recv` never resolves.
    pub fn register(signals: &[Signal]) -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut streams = Vec::with_capacity(signals.len());
            for &sig in signals {
                match signal(SignalKind::from_raw(sig.as_raw())) {
                    Ok(stream) => {
                        debug!("Listening for {} ({})", sig, sig.as_raw());
                        streams.push((sig, stream));
                    }
                    Err(e) => error!("Failed to register handler for {}: {}", sig, e),
                }
            }
            Self { streams }
        }

        #[cfg(not(unix))]
        {
            let ctrl_c = signals.contains(&Signal::INTERRUPT);
            for sig in signals.iter().filter(|sig| **sig != Signal::INTERRUPT) {
                error!("Signal {} cannot be observed on this platform", sig);
            }
            Self { ctrl_c }
        }
    }

    /// Number of signals that were successfully registered
    pub fn registered(&self) -> usize {
        #[cfg(unix)]
        {
            self.streams.len()
        }
        #[cfg(not(unix))]
        {
            usize::from(self.ctrl_c)
        }
    }

    /// Wait for the first delivered signal
    pub async fn recv(&mut self) -> Signal {
        #[cfg(unix)]
        {
            if self.streams.is_empty() {
                return std::future::pending().await;
            }

            let waits = self.streams.iter_mut().map(|(sig, stream)| {
                let sig = *sig;
                Box::pin(async move {
                    match stream.recv().await {
                        Some(()) => sig,
                        None => std::future::pending().await,
                    }
                })
            });

            let (sig, _, _) = futures::future::select_all(waits).await;
            sig
        }

        #[cfg(not(unix))]
        {
            if !self.ctrl_c {
                return std::future::pending().await;
            }
            match tokio::signal::ctrl_c().await {
                Ok(()) => Signal::INTERRUPT,
                Err(e) => {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending().await
                }
            }
        }
    }
}
