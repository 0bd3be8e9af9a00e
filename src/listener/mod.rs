//! # Credential Listener
//!
//! The main loop of the bridge. A single state machine drives the serial session and
//! dispatches provisioning lines to a [`NetworkConfigurator`]:
//!
//! ```text
//!   NoSession ──open()──▶ Active ──I/O error──▶ NoSession (after close + backoff)
//!        │                  │
//!        └──── shutdown ────┴──────────────▶ Shutdown
//! ```
//!
//! Shutdown is honoured between iterations and during sleeps only; a line read or a
//! configurator call that is already running always completes.

use crate::errors::{ProvisioningError, SerialError};
use crate::logutil::{escape_log, redact};
use crate::network::NetworkConfigurator;
use crate::provisioning::{self, Credentials};
use crate::serial::{Connector, SerialSession};
use crate::shutdown::Shutdown;
use log::{debug, error, info};
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    NoSession,
    Active,
    Shutdown,
}

/// What happened to one received line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Empty or whitespace-only.
    Empty,
    /// No provisioning marker.
    Ignored,
    /// Marker present but credentials could not be extracted.
    Malformed,
    /// Credentials applied successfully.
    Applied { ssid: String },
    /// The network tool reported failure.
    Rejected { ssid: String },
    /// Something unexpected went wrong while applying.
    Failed { ssid: String },
}

/// Running counters, logged at shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListenerStats {
    pub lines_received: u64,
    pub lines_ignored: u64,
    pub malformed: u64,
    pub applied: u64,
    pub rejected: u64,
    pub failed: u64,
    pub session_losses: u64,
}

impl ListenerStats {
    fn record(&mut self, outcome: &LineOutcome) {
        match outcome {
            LineOutcome::Empty => return,
            LineOutcome::Ignored => self.lines_ignored += 1,
            LineOutcome::Malformed => self.malformed += 1,
            LineOutcome::Applied { .. } => self.applied += 1,
            LineOutcome::Rejected { .. } => self.rejected += 1,
            LineOutcome::Failed { .. } => self.failed += 1,
        }
        self.lines_received += 1;
    }
}

/// Loop timing, normally sourced from `Config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerTiming {
    /// Sleep when no input is waiting.
    pub poll_interval: Duration,
    /// Sleep after losing the session, before reopening.
    pub reconnect_delay: Duration,
}

impl Default for ListenerTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

pub struct CredentialListener<C: Connector, N: NetworkConfigurator> {
    session: SerialSession<C>,
    configurator: N,
    timing: ListenerTiming,
    state: ListenerState,
    stats: ListenerStats,
}

impl<C: Connector, N: NetworkConfigurator> CredentialListener<C, N> {
    pub fn new(session: SerialSession<C>, configurator: N, timing: ListenerTiming) -> Self {
        Self {
            session,
            configurator,
            timing,
            state: ListenerState::NoSession,
            stats: ListenerStats::default(),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn stats(&self) -> &ListenerStats {
        &self.stats
    }

    pub fn session(&self) -> &SerialSession<C> {
        &self.session
    }

    pub fn configurator(&self) -> &N {
        &self.configurator
    }

    /// Run until shutdown is requested. Returns the final counters.
    ///
    /// With an unbounded retry policy the only way out is `shutdown`; a bounded policy
    /// surfaces [`SerialError::RetriesExhausted`].
    pub async fn run(&mut self, shutdown: &mut Shutdown) -> Result<ListenerStats, SerialError> {
        info!("Starting WiFi credential listener...");
        let result = loop {
            if shutdown.is_requested() {
                break Ok(());
            }
            if let Err(e) = self.step(shutdown).await {
                break Err(e);
            }
            if self.state == ListenerState::Shutdown {
                break Ok(());
            }
        };
        info!("Shutting down...");
        self.session.close();
        self.state = ListenerState::Shutdown;
        info!(
            "Listener stats: lines={} ignored={} malformed={} applied={} rejected={} failed={} session_losses={}",
            self.stats.lines_received,
            self.stats.lines_ignored,
            self.stats.malformed,
            self.stats.applied,
            self.stats.rejected,
            self.stats.failed,
            self.stats.session_losses
        );
        result.map(|()| self.stats.clone())
    }

    /// One iteration of the state machine.
    pub async fn step(&mut self, shutdown: &mut Shutdown) -> Result<(), SerialError> {
        match self.state {
            ListenerState::NoSession => match self.session.open(shutdown).await {
                Ok(()) => {
                    self.state = ListenerState::Active;
                    info!(
                        "Waiting for credentials on {}...",
                        self.session.settings().port
                    );
                }
                Err(SerialError::Shutdown) => self.state = ListenerState::Shutdown,
                Err(e) => return Err(e),
            },
            ListenerState::Active => match self.session.poll_line() {
                Ok(Some(line)) => {
                    let outcome = self.handle_line(&line).await;
                    self.stats.record(&outcome);
                }
                Ok(None) => {
                    if shutdown.sleep(self.timing.poll_interval).await {
                        self.state = ListenerState::Shutdown;
                    }
                }
                Err(e) => {
                    error!("Serial connection lost: {}", e);
                    self.session.close();
                    self.state = ListenerState::NoSession;
                    self.stats.session_losses += 1;
                    if shutdown.sleep(self.timing.reconnect_delay).await {
                        self.state = ListenerState::Shutdown;
                    }
                }
            },
            ListenerState::Shutdown => {}
        }
        Ok(())
    }

    /// Classify one line and, when it carries credentials, apply them.
    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        if line.trim().is_empty() {
            return LineOutcome::Empty;
        }
        let credentials = match provisioning::parse_credentials(line) {
            Ok(c) => c,
            Err(ProvisioningError::MissingMarker) => {
                debug!("Received raw data: {}", escape_log(line));
                return LineOutcome::Ignored;
            }
            Err(e) => {
                error!("Error processing credentials: {}", e);
                return LineOutcome::Malformed;
            }
        };
        debug!(
            "Received raw data: {}",
            redact(line, credentials.password())
        );
        info!("Found credentials for network: {}", credentials.ssid());
        self.apply(credentials).await
    }

    async fn apply(&self, credentials: Credentials) -> LineOutcome {
        let ssid = credentials.ssid().to_string();
        match self.configurator.apply(&credentials).await {
            Ok(()) => {
                info!("WiFi configuration successful");
                LineOutcome::Applied { ssid }
            }
            Err(e) if e.is_expected() => {
                error!("Failed to configure WiFi: {}", e);
                LineOutcome::Rejected { ssid }
            }
            Err(e) => {
                error!("Error setting up WiFi: {}", e);
                LineOutcome::Failed { ssid }
            }
        }
    }
}
