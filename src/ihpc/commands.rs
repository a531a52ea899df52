//! User-facing actions.
//!
//! - `ensure_gateway_configured`: prompt for the uts username if the gateway has none
//! - `set_gateway_user`: prompt for and rewrite the uts username
//! - `configure_node`: add or update the block for a compute node
//! - `list_nodes`: list available nodes through the gateway
//! - `gateway_status`: report the configured uts username
//!
//! Every read-modify-write of the config file runs under one lock, so two
//! actions on the same [`IhpcCommands`] never interleave and lose an update.
//! Failures are reported through the [`UiShell`] and returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::{FACILITY_DOMAIN, GATEWAY_HOST, GATEWAY_HOSTNAME, HOSTNAME_PROBE_TIMEOUT};
use super::error::IhpcError;
use super::lister::NodeLister;
use super::process::ProcessRunner;
use super::shell::{NotifyKind, UiShell};
use super::ssh_config;
use super::store::ConfigStore;
use super::types::{GatewayStatus, NetworkLocation, NodeListing, NodeUpdate};

const USERNAME_PROMPT: &str = "Enter your username for Host uts";

pub struct IhpcCommands {
    store: ConfigStore,
    shell: Arc<dyn UiShell>,
    lister: NodeLister,
    write_lock: Mutex<()>,
}

impl IhpcCommands {
    pub fn new(
        store: ConfigStore,
        runner: Arc<dyn ProcessRunner>,
        shell: Arc<dyn UiShell>,
        list_timeout: Duration,
    ) -> Self {
        Self {
            store,
            shell,
            lister: NodeLister::new(runner, list_timeout),
            write_lock: Mutex::new(()),
        }
    }

    /// Make sure the gateway block has a `User`.
    ///
    /// Returns `Ok(true)` when the user was prompted and the file written,
    /// `Ok(false)` when the gateway was already configured.
    pub async fn ensure_gateway_configured(&self) -> Result<bool, IhpcError> {
        let _guard = self.write_lock.lock().await;
        let result = self.ensure_gateway_locked().await;
        self.report(&result);
        result
    }

    /// Prompt for a new uts username and write it, replacing any existing one.
    pub async fn set_gateway_user(&self) -> Result<String, IhpcError> {
        let _guard = self.write_lock.lock().await;
        let result: Result<String, IhpcError> = async {
            let config = self.store.load().await?;
            let username = self.prompt_username().await?;
            self.write_gateway(&config, &username).await?;
            Ok(username)
        }
        .await;

        match &result {
            Ok(_) => self.shell.notify(
                NotifyKind::Info,
                "SSH configuration for UTS iHPC updated successfully.",
            ),
            Err(e) => self.shell.notify(NotifyKind::Error, &e.to_string()),
        }
        result
    }

    /// Add or update the block for `node`.
    ///
    /// When the gateway has no username yet, the gateway setup flow runs
    /// first and the node is written with the new username.
    pub async fn configure_node(
        &self,
        node: &str,
        location: NetworkLocation,
    ) -> Result<NodeUpdate, IhpcError> {
        let node = node.trim();
        info!("Configuring SSH for {} ({:?})", node, location);

        let _guard = self.write_lock.lock().await;
        let result: Result<NodeUpdate, IhpcError> = async {
            validate_node_name(node)?;
            let mut config = self.store.load().await?;
            let mut outcome = ssh_config::configure_node(&config, node, GATEWAY_HOST, location);

            let gateway_configured = outcome.needs_gateway_setup;
            if gateway_configured {
                warn!("Gateway has no username, running gateway setup first");
                self.ensure_gateway_locked().await?;
                config = self.store.load().await?;
                outcome = ssh_config::configure_node(&config, node, GATEWAY_HOST, location);
            }

            if outcome.config == config {
                debug!("{} already up to date", node);
            } else {
                self.store.save(&outcome.config).await?;
            }

            Ok(NodeUpdate {
                node: node.to_string(),
                location,
                gateway_configured,
            })
        }
        .await;

        match &result {
            Ok(update) => self.shell.notify(
                NotifyKind::Info,
                &format!("SSH configuration updated for {}", update.node),
            ),
            Err(e) => self.shell.notify(
                NotifyKind::Error,
                &format!("Failed to update SSH configuration: {}", e),
            ),
        }
        result
    }

    /// Available nodes. Failures produce an empty listing and an error notification.
    pub async fn list_nodes(&self) -> NodeListing {
        let outcome = self.lister.list().await;
        if let Some(warning) = &outcome.warning {
            self.shell.notify(NotifyKind::Error, warning);
        }
        NodeListing::new(outcome.nodes, outcome.warning)
    }

    pub async fn gateway_status(&self) -> GatewayStatus {
        match self.store.load().await {
            Ok(config) => match ssh_config::gateway_user(&config, GATEWAY_HOST) {
                Some(user) => GatewayStatus::Configured(user),
                None => GatewayStatus::NotSet,
            },
            Err(e) => GatewayStatus::Unavailable(e.to_string()),
        }
    }

    /// Caller must hold `write_lock`.
    async fn ensure_gateway_locked(&self) -> Result<bool, IhpcError> {
        let config = self.store.load().await?;
        if let Some(user) = ssh_config::gateway_user(&config, GATEWAY_HOST) {
            debug!("Gateway already configured for {}", user);
            return Ok(false);
        }

        let username = self.prompt_username().await?;
        self.write_gateway(&config, &username).await?;
        Ok(true)
    }

    async fn prompt_username(&self) -> Result<String, IhpcError> {
        self.shell
            .prompt_for_username(USERNAME_PROMPT)
            .await
            .ok_or(IhpcError::UsernameCancelled)
    }

    async fn write_gateway(&self, config: &str, username: &str) -> Result<(), IhpcError> {
        let updated =
            ssh_config::configure_gateway(config, GATEWAY_HOST, GATEWAY_HOSTNAME, username);
        self.store.save(&updated).await?;
        info!("Gateway {} configured for {}", GATEWAY_HOST, username);
        Ok(())
    }

    fn report(&self, result: &Result<bool, IhpcError>) {
        match result {
            Ok(true) => self.shell.notify(
                NotifyKind::Info,
                "SSH configuration for UTS iHPC updated successfully.",
            ),
            Ok(false) => {}
            Err(e) => self.shell.notify(NotifyKind::Error, &e.to_string()),
        }
    }
}

/// A node name becomes a `Host` pattern and a `HostName` value, so it must be
/// a single non-empty token.
fn validate_node_name(node: &str) -> Result<(), IhpcError> {
    let invalid = node.is_empty()
        || node.starts_with('#')
        || node
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '=');
    if invalid {
        return Err(IhpcError::InvalidNode(node.to_string()));
    }
    Ok(())
}

/// Inside when this machine's hostname is in the facility domain.
/// Any failure to run `hostname` counts as outside.
pub async fn detect_network_location(runner: &dyn ProcessRunner) -> NetworkLocation {
    match runner.run("hostname", &[], HOSTNAME_PROBE_TIMEOUT).await {
        Ok(output) if output.exit_code == Some(0) => {
            let hostname = output.stdout.trim();
            if hostname.ends_with(FACILITY_DOMAIN) {
                debug!("{} is inside the facility network", hostname);
                NetworkLocation::Inside
            } else {
                NetworkLocation::Outside
            }
        }
        Ok(output) => {
            warn!("hostname exited with {:?}, assuming outside", output.exit_code);
            NetworkLocation::Outside
        }
        Err(e) => {
            warn!("{}, assuming outside the facility network", e);
            NetworkLocation::Outside
        }
    }
}
