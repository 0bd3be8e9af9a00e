//! Host network configuration.
//!
//! The listener only depends on [`NetworkConfigurator`]; [`nmcli::NmcliConfigurator`] is the
//! production implementation backed by NetworkManager.

pub mod nmcli;

use crate::errors::ConfigureError;
use crate::provisioning::Credentials;
use async_trait::async_trait;

pub use nmcli::NmcliConfigurator;

/// Applies a credential pair to the host. Calls must not block indefinitely.
#[async_trait]
pub trait NetworkConfigurator {
    /// Replace any profile named after the SSID and connect with the new password.
    async fn apply(&self, credentials: &Credentials) -> Result<(), ConfigureError>;
}
