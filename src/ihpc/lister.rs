//! Node listing through the gateway.
//!
//! Runs `ssh <gateway> "cnode | grep yes"` and parses its output. Any failure
//! (spawn error, timeout, non-zero exit, output on stderr) produces an empty
//! list and a warning; the caller is never left without an answer.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::config::{GATEWAY_HOST, NODE_LIST_COMMAND};
use super::error::{IhpcError, failure_hint};
use super::process::{ProcessRunner, display_command};
use super::status::parse_status;
use super::types::NodeStatusRecord;

/// Parsed nodes plus the reason the list is empty, if the command failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOutcome {
    pub nodes: Vec<NodeStatusRecord>,
    pub warning: Option<String>,
}

pub struct NodeLister {
    runner: Arc<dyn ProcessRunner>,
    gateway: String,
    timeout: Duration,
}

impl NodeLister {
    pub fn new(runner: Arc<dyn ProcessRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            gateway: GATEWAY_HOST.to_string(),
            timeout,
        }
    }

    fn args(&self) -> Vec<String> {
        vec![self.gateway.clone(), NODE_LIST_COMMAND.to_string()]
    }

    pub async fn list(&self) -> ListOutcome {
        let args = self.args();

        let output = match self.runner.run("ssh", &args, self.timeout).await {
            Ok(output) => output,
            Err(IhpcError::Timeout { timeout, .. }) => {
                return failed(format!(
                    "SSH command timed out after {:?}. {}",
                    timeout,
                    failure_hint("timed out")
                ));
            }
            Err(e) => return failed(format!("{}", e)),
        };

        if !output.is_clean() {
            let detail = if output.stderr.trim().is_empty() {
                match output.exit_code {
                    Some(code) => format!("exited with status {}", code),
                    None => "was terminated by a signal".to_string(),
                }
            } else {
                output.stderr.trim().to_string()
            };
            return failed(format!(
                "`{}` failed: {}. {}",
                display_command("ssh", &args),
                detail,
                failure_hint(&output.stderr)
            ));
        }

        let nodes = parse_status(&output.stdout);
        info!("Listed {} available node(s)", nodes.len());
        ListOutcome {
            nodes,
            warning: None,
        }
    }
}

fn failed(message: String) -> ListOutcome {
    warn!("Node listing failed: {}", message);
    ListOutcome {
        nodes: Vec::new(),
        warning: Some(message),
    }
}
