//! Serializable records shared by the CLI and the orchestration layer.

use serde::{Deserialize, Serialize};

/// Load figures for one available compute node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusRecord {
    pub name: String,
    pub cpu_load: String,
    pub mem_load: String,
    /// `"N/A"` on nodes without a GPU
    pub gpu_load: String,
    /// `"N/A"` on nodes without a GPU
    pub gpu_mem_load: String,
    pub users: Vec<String>,
}

/// Result of a node listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeListing {
    /// When the listing was taken (RFC3339 format)
    pub listed_at: String,
    /// Number of nodes returned
    pub count: usize,
    pub nodes: Vec<NodeStatusRecord>,
    /// Why the list is empty, when the listing command failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl NodeListing {
    pub fn new(nodes: Vec<NodeStatusRecord>, warning: Option<String>) -> Self {
        Self {
            listed_at: chrono::Utc::now().to_rfc3339(),
            count: nodes.len(),
            nodes,
            warning,
        }
    }
}

/// Where this machine sits relative to the facility network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkLocation {
    /// Nodes are reached through the gateway with `ProxyJump`
    Outside,
    /// Nodes are reachable directly
    Inside,
}

/// State of the gateway credential in the SSH config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum GatewayStatus {
    Configured(String),
    NotSet,
    /// The config file could not be read
    Unavailable(String),
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Configured(user) => write!(f, "UTS User: {}", user),
            GatewayStatus::NotSet => write!(f, "UTS User: Not Set"),
            GatewayStatus::Unavailable(_) => write!(f, "UTS User: Not Available"),
        }
    }
}

/// Result of configuring a node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeUpdate {
    pub node: String,
    pub location: NetworkLocation,
    /// The gateway had to be configured before the node could be written
    pub gateway_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod node_listing {
        use super::*;

        #[test]
        fn test_count_matches_nodes() {
            let node = NodeStatusRecord {
                name: "mars1".to_string(),
                cpu_load: "1.0%".to_string(),
                mem_load: "2.0%".to_string(),
                gpu_load: "N/A".to_string(),
                gpu_mem_load: "N/A".to_string(),
                users: vec![],
            };
            let listing = NodeListing::new(vec![node.clone(), node], None);
            assert_eq!(listing.count, 2);
            assert!(chrono::DateTime::parse_from_rfc3339(&listing.listed_at).is_ok());
        }

        #[test]
        fn test_warning_omitted_when_absent() {
            let json = serde_json::to_value(NodeListing::new(vec![], None)).unwrap();
            assert!(json.get("warning").is_none());
            assert_eq!(json["count"], 0);
        }

        #[test]
        fn test_warning_serialized_when_present() {
            let listing = NodeListing::new(vec![], Some("timed out".to_string()));
            let json = serde_json::to_value(listing).unwrap();
            assert_eq!(json["warning"], "timed out");
        }
    }

    mod gateway_status {
        use super::*;

        #[test]
        fn test_display() {
            assert_eq!(
                GatewayStatus::Configured("alice".to_string()).to_string(),
                "UTS User: alice"
            );
            assert_eq!(GatewayStatus::NotSet.to_string(), "UTS User: Not Set");
            assert_eq!(
                GatewayStatus::Unavailable("denied".to_string()).to_string(),
                "UTS User: Not Available"
            );
        }

        #[test]
        fn test_json_structure() {
            let json = serde_json::to_value(GatewayStatus::Configured("bob".to_string())).unwrap();
            assert_eq!(json["state"], "configured");
            assert_eq!(json["detail"], "bob");
        }
    }

    #[test]
    fn test_network_location_snake_case() {
        assert_eq!(
            serde_json::to_string(&NetworkLocation::Inside).unwrap(),
            "\"inside\""
        );
    }
}
