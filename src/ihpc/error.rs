//! Error type and failure classification.
//!
//! [`IhpcError`] covers every failure the orchestration layer can surface.
//! The parsers never fail and have no error type.
//!
//! [`failure_hint`] turns the stderr of a failed remote listing into advice
//! for the user. Patterns are matched case-insensitively; authentication
//! patterns are checked first, so a message mentioning both a timeout and a
//! rejected key is reported as an authentication problem.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IhpcError {
    #[error("Failed to read SSH configuration {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write SSH configuration {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("SSH configuration requires a username for the uts gateway")]
    UsernameCancelled,

    #[error("Invalid node name '{0}'")]
    InvalidNode(String),

    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Patterns that mean the gateway rejected the user or key.
const AUTH_ERRORS: &[&str] = &[
    "permission denied",
    "authentication failed",
    "publickey",
    "too many authentication failures",
    "invalid user",
    "host key verification failed",
];

/// Patterns that mean the gateway could not be reached.
const CONNECTION_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timed out",
    "network is unreachable",
    "no route to host",
    "could not resolve hostname",
    "temporary failure",
    "connection closed",
];

/// Advice appended to a failed node listing.
pub fn failure_hint(message: &str) -> &'static str {
    let message = message.to_lowercase();

    if AUTH_ERRORS.iter().any(|pattern| message.contains(pattern)) {
        return "Please check your uts username and SSH key.";
    }

    if CONNECTION_ERRORS
        .iter()
        .any(|pattern| message.contains(pattern))
    {
        return "Please check your network connection.";
    }

    "Please check your network connection, username and SSH key."
}

#[cfg(test)]
mod tests {
    use super::*;

    mod failure_hints {
        use super::*;

        #[test]
        fn test_permission_denied_is_auth() {
            assert_eq!(
                failure_hint("alice@access.ihpc.uts.edu.au: Permission denied (publickey)."),
                "Please check your uts username and SSH key."
            );
        }

        #[test]
        fn test_host_key_failure_is_auth() {
            assert_eq!(
                failure_hint("Host key verification failed."),
                "Please check your uts username and SSH key."
            );
        }

        #[test]
        fn test_unreachable_is_connection() {
            assert_eq!(
                failure_hint("ssh: connect to host uts port 22: Network is unreachable"),
                "Please check your network connection."
            );
        }

        #[test]
        fn test_unknown_host_is_connection() {
            assert_eq!(
                failure_hint("ssh: Could not resolve hostname uts: Name or service not known"),
                "Please check your network connection."
            );
        }

        #[test]
        fn test_auth_takes_precedence() {
            assert_eq!(
                failure_hint("Connection timed out during publickey exchange"),
                "Please check your uts username and SSH key."
            );
        }

        #[test]
        fn test_unknown_message_gets_generic_hint() {
            assert_eq!(
                failure_hint("cnode: command not found"),
                "Please check your network connection, username and SSH key."
            );
        }

        #[test]
        fn test_empty_message_gets_generic_hint() {
            assert_eq!(
                failure_hint(""),
                "Please check your network connection, username and SSH key."
            );
        }
    }

    mod display {
        use super::*;

        #[test]
        fn test_timeout_message() {
            let error = IhpcError::Timeout {
                command: "ssh uts".to_string(),
                timeout: Duration::from_secs(10),
            };
            assert_eq!(error.to_string(), "`ssh uts` timed out after 10s");
        }

        #[test]
        fn test_read_error_includes_path() {
            let error = IhpcError::ConfigRead {
                path: PathBuf::from("/home/a/.ssh/config"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            };
            assert_eq!(
                error.to_string(),
                "Failed to read SSH configuration /home/a/.ssh/config: denied"
            );
        }
    }
}
