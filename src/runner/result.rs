//! Serializable execution results.
//!
//! The result tree mirrors what happened, including partial per-host
//! failure: one [`CommandResult`] per submitted command, one [`HostResult`]
//! per target host, and one [`ExecutionResult`] per run.

use std::time::Duration;

use chrono::Utc;
use serde::{Serialize, Serializer};

/// Result of a single command on a single host.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    /// The command that was submitted.
    pub command: String,

    /// Cleaned output (echo and trailing prompt removed).
    pub output: String,

    /// Error text, present only when the command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// RFC 3339 timestamp taken when the command was submitted.
    pub timestamp: String,
}

impl CommandResult {
    /// Record a successful command.
    pub(crate) fn ok(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: output.into(),
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    /// Record a failed command.
    pub(crate) fn failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output: String::new(),
            error: Some(error.into()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Result of the whole command batch on one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostResult {
    /// The target host.
    pub host: String,

    /// Per-command results, in submission order. Empty when the
    /// connection itself failed.
    pub results: Vec<CommandResult>,

    /// False when the connection failed or any command failed.
    pub success: bool,

    /// Wall-clock time spent on this host.
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,

    /// Connection or setup error, present only when the host never got
    /// to run commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostResult {
    /// Record a host that failed before any command ran.
    pub(crate) fn failed(
        host: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            results: vec![],
            success: false,
            duration,
            error: Some(error.into()),
        }
    }
}

/// Aggregated result of one batch run across all hosts.
///
/// In parallel mode `hosts` is in completion-arrival order, not input
/// order; sort by host afterwards if input order matters.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Per-host results.
    pub hosts: Vec<HostResult>,

    /// Number of hosts targeted. Always equals `hosts.len()`.
    pub total_hosts: usize,

    /// Hosts whose every command succeeded.
    pub successful: usize,

    /// Hosts that failed to connect or had a failing command.
    pub failed: usize,

    /// Wall-clock time for the whole run.
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,

    /// Whether hosts were executed concurrently.
    pub parallel: bool,
}

impl ExecutionResult {
    /// Build the aggregate from collected host results.
    pub(crate) fn tally(hosts: Vec<HostResult>, duration: Duration, parallel: bool) -> Self {
        let total_hosts = hosts.len();
        let successful = hosts.iter().filter(|h| h.success).count();
        Self {
            failed: total_hosts - successful,
            hosts,
            total_hosts,
            successful,
            duration,
            parallel,
        }
    }
}

/// Durations render as human-readable strings (`"1.5s"`, `"250ms"`).
fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{duration:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_add_up() {
        let hosts = vec![
            HostResult {
                host: "a".into(),
                results: vec![CommandResult::ok("show version", "ok")],
                success: true,
                duration: Duration::from_millis(10),
                error: None,
            },
            HostResult::failed("b", "connection refused", Duration::from_millis(5)),
        ];

        let result = ExecutionResult::tally(hosts, Duration::from_millis(20), true);
        assert_eq!(result.total_hosts, 2);
        assert_eq!(result.hosts.len(), result.total_hosts);
        assert_eq!(result.successful + result.failed, result.total_hosts);
        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
        assert!(result.parallel);
    }

    #[test]
    fn error_fields_are_omitted_when_absent() {
        let ok = serde_json::to_value(CommandResult::ok("show clock", "12:00:00")).unwrap();
        assert!(ok.get("error").is_none());
        assert_eq!(ok["command"], "show clock");
        assert_eq!(ok["output"], "12:00:00");
        assert!(ok["timestamp"].as_str().is_some_and(|t| t.contains('T')));

        let failed = serde_json::to_value(CommandResult::failed("show clock", "timeout")).unwrap();
        assert_eq!(failed["error"], "timeout");
    }

    #[test]
    fn result_schema_field_names() {
        let result = ExecutionResult::tally(
            vec![HostResult::failed("b", "no route", Duration::from_secs(1))],
            Duration::from_secs(2),
            false,
        );
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["total_hosts"], 1);
        assert_eq!(value["successful"], 0);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["parallel"], false);
        assert_eq!(value["duration"], "2s");

        let host = &value["hosts"][0];
        assert_eq!(host["host"], "b");
        assert_eq!(host["success"], false);
        assert_eq!(host["error"], "no route");
        assert_eq!(host["duration"], "1s");
        assert!(host["results"].as_array().unwrap().is_empty());
    }
}
