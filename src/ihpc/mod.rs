//! UTS iHPC SSH configuration management.
//!
//! This module is organized into the following submodules:
//!
//! - `ssh_config`: Parsing, merging and rendering of the SSH client config
//! - `status`: Parser for the gateway's node listing output
//! - `types`: Serializable records
//! - `config`: Facility constants and settings resolution with environment variable support
//! - `error`: Error type and failure hints
//! - `store`: Config file reading and atomic writing
//! - `process`: External command execution with timeout
//! - `lister`: Node listing through the gateway
//! - `shell`: Username prompts and notifications
//! - `commands`: User-facing actions

pub mod commands;
pub mod config;
pub mod error;
pub mod lister;
pub mod process;
pub mod shell;
pub mod ssh_config;
pub mod status;
pub mod store;
pub mod types;

pub use commands::{IhpcCommands, detect_network_location};
pub use error::IhpcError;
