//! Why an orchestration run ended.

use crate::signal::Signal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal record of one orchestration run.
///
/// Either `startup_error` is set and nothing else is, or exactly one of
/// `os_signal` / a runtime request ended the run, followed by whatever the
/// shutdown steps reported. `runtime_error` is `None` both for a clean
/// explicit request and for a signal-triggered run.
#[derive(Debug, Default)]
pub struct ExitReason {
    pub os_signal: Option<Signal>,
    pub startup_error: Option<anyhow::Error>,
    pub runtime_error: Option<anyhow::Error>,
    /// In the order the shutdown steps reported, not declaration order
    pub shutdown_errors: Vec<anyhow::Error>,
}

/// Display-safe projection of an [`ExitReason`]; unset fields are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintableExitReason {
    pub os_signal: String,
    pub err_startup: String,
    pub err_runtime: String,
    pub errs_shutdown: Vec<String>,
}

impl ExitReason {
    pub fn to_printable(&self) -> PrintableExitReason {
        PrintableExitReason {
            os_signal: self
                .os_signal
                .map(|signal| signal.to_string())
                .unwrap_or_default(),
            err_startup: describe(self.startup_error.as_ref()),
            err_runtime: describe(self.runtime_error.as_ref()),
            errs_shutdown: self
                .shutdown_errors
                .iter()
                .map(|e| format!("{:#}", e))
                .collect(),
        }
    }

    /// Single-line JSON
    pub fn to_compact_text(&self) -> String {
        serde_json::to_string(&self.to_printable()).unwrap_or_default()
    }

    /// Multi-line JSON. Nested lines are indented with repeated `indent`
    /// and every line after the first begins with `prefix`.
    pub fn to_indented_text(&self, prefix: &str, indent: &str) -> String {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        if self.to_printable().serialize(&mut serializer).is_err() {
            return String::new();
        }

        let rendered = String::from_utf8(buf).unwrap_or_default();
        if prefix.is_empty() {
            return rendered;
        }
        rendered
            .lines()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    line.to_string()
                } else {
                    format!("{}{}", prefix, line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// No startup failure, no runtime error and no shutdown errors
    pub fn is_clean(&self) -> bool {
        self.startup_error.is_none()
            && self.runtime_error.is_none()
            && self.shutdown_errors.is_empty()
    }

    /// Process exit status for this reason: 0 when clean, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }
}

fn describe(err: Option<&anyhow::Error>) -> String {
    err.map(|e| format!("{:#}", e)).unwrap_or_default()
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact_text())
    }
}
