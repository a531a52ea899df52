//! Facility constants and settings resolution.
//!
//! Runtime settings use a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value, e.g. a CLI flag (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IHPC_SSH_CONFIG` | `~/.ssh/config` | SSH client configuration file to manage |
//! | `IHPC_LIST_TIMEOUT` | 10s | Node listing timeout in seconds |
//! | `IHPC_INSIDE_NETWORK` | detected | `true`/`1` when running inside the facility network |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use super::error::IhpcError;

/// Host pattern of the gateway block
pub const GATEWAY_HOST: &str = "uts";

/// `HostName` written into the gateway block
pub const GATEWAY_HOSTNAME: &str = "access.ihpc.uts.edu.au";

/// Domain suffix of machines inside the facility network
pub const FACILITY_DOMAIN: &str = "ihpc.uts.edu.au";

/// Command run on the gateway to list available nodes
pub const NODE_LIST_COMMAND: &str = "cnode | grep yes";

/// Node families in display order. The gateway is a reserved last entry.
pub const NODE_FAMILIES: &[&str] = &[
    "jupiter", "mars", "mercury", "neptune", "saturn", "venus", GATEWAY_HOST,
];

/// Default node listing timeout in seconds
pub(crate) const DEFAULT_LIST_TIMEOUT_SECS: u64 = 10;

/// Timeout for the `hostname` probe used to detect the network location
pub(crate) const HOSTNAME_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable name for the SSH config path
pub(crate) const SSH_CONFIG_ENV_VAR: &str = "IHPC_SSH_CONFIG";

/// Environment variable name for the node listing timeout
pub(crate) const LIST_TIMEOUT_ENV_VAR: &str = "IHPC_LIST_TIMEOUT";

/// Environment variable name for the network location override
pub(crate) const INSIDE_NETWORK_ENV_VAR: &str = "IHPC_INSIDE_NETWORK";

/// Resolve the SSH config path with priority: parameter -> env var -> `~/.ssh/config`
pub fn resolve_config_path(path_param: Option<PathBuf>) -> Result<PathBuf, IhpcError> {
    if let Some(path) = path_param {
        return Ok(path);
    }

    if let Ok(env_path) = env::var(SSH_CONFIG_ENV_VAR)
        && !env_path.trim().is_empty()
    {
        return Ok(PathBuf::from(env_path));
    }

    dirs::home_dir()
        .map(|home| home.join(".ssh").join("config"))
        .ok_or(IhpcError::NoHomeDir)
}

/// Resolve the node listing timeout with priority: parameter -> env var -> default
pub fn resolve_list_timeout(timeout_param: Option<u64>) -> Duration {
    if let Some(timeout) = timeout_param {
        return Duration::from_secs(timeout);
    }

    if let Ok(env_timeout) = env::var(LIST_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return Duration::from_secs(timeout);
    }

    Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS)
}

/// Resolve the network location override: parameter -> env var -> `None` (detect).
pub fn resolve_inside_network(inside_param: Option<bool>) -> Option<bool> {
    if inside_param.is_some() {
        return inside_param;
    }

    env::var(INSIDE_NETWORK_ENV_VAR)
        .ok()
        .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
}
