//! # credbridge - WiFi provisioning over a serial link
//!
//! credbridge listens on a serial port for WiFi credentials announced by a companion
//! microcontroller (typically an ESP32 running a provisioning sketch) and applies them to
//! the host through NetworkManager.
//!
//! ## Features
//!
//! - **Self-healing serial session**: the device may be absent at startup or unplugged at
//!   any time; the session is reopened with a fixed backoff.
//! - **Strict line contract**: only `Provisioned Credentials: SSID: <name>, Password: <pw>`
//!   lines trigger a configuration change.
//! - **Pluggable network backend**: anything implementing [`network::NetworkConfigurator`];
//!   `nmcli` is the default.
//! - **Headless**: all output goes to the log stream; passwords are masked.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use credbridge::config::Config;
//! use credbridge::listener::CredentialListener;
//! use credbridge::serial::{SerialSession, SystemConnector};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default("credbridge.toml").await?;
//!     let session = SerialSession::new(
//!         config.serial.settings(),
//!         config.serial.retry_policy(),
//!         SystemConnector,
//!     );
//!     let mut listener = CredentialListener::new(
//!         session,
//!         config.network.configurator(),
//!         config.serial.timing(),
//!     );
//!     let mut shutdown = credbridge::shutdown::listen_for_signals();
//!     listener.run(&mut shutdown).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`serial`] - serial session lifecycle and line framing
//! - [`provisioning`] - provisioning line contract and credential extraction
//! - [`network`] - network configurator trait and the `nmcli` backend
//! - [`listener`] - the reconnect/read/parse/apply state machine
//! - [`shutdown`] - interruption signal handling
//! - [`config`] - configuration loading and defaults
//! - [`errors`] - error taxonomy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  microcontroller│
//! └─────────────────┘
//!          │ serial lines
//! ┌─────────────────┐
//! │  SerialSession  │ ← open / poll_line / close
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ CredentialLis-  │ ← marker + extraction
//! │ tener           │
//! └─────────────────┘
//!          │ Credentials
//! ┌─────────────────┐
//! │ NetworkConfigu- │ ← nmcli
//! │ rator           │
//! └─────────────────┘
//! ```

pub mod config;
pub mod errors;
pub mod listener;
pub mod logutil;
pub mod network;
pub mod provisioning;
pub mod serial;
pub mod shutdown;
