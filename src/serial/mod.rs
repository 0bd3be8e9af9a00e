//! # Serial Session Module
//!
//! Owns the lifetime of the connection to the provisioning board: a reconnect-on-failure
//! [`SerialSession::open`], a non-blocking [`SerialSession::poll_line`], and a best-effort
//! [`SerialSession::close`].
//!
//! The physical port sits behind two small traits so the session can be driven by the
//! scripted [`mock::MockConnector`] in tests:
//!
//! - [`Connector`] opens a link from [`SerialSettings`]
//! - [`SerialLink`] reports how many bytes are waiting and reads a chunk
//!
//! ## Configuration
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! read_timeout_ms = 1000
//! reconnect_delay_ms = 2000
//! ```

pub mod framer;
pub mod mock;

use crate::errors::SerialError;
use crate::shutdown::Shutdown;
use framer::LineFramer;
use log::{debug, error, info};
use std::io::{self, ErrorKind};
use tokio::time::Duration;

/// Where and how to open the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 115200,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Fixed-backoff retry policy for opening the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(2))
    }
}

/// An open serial handle.
pub trait SerialLink {
    /// Number of bytes ready to be read without blocking.
    fn bytes_waiting(&mut self) -> io::Result<usize>;
    /// Read up to `buf.len()` bytes, blocking at most the link's read timeout.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Factory for [`SerialLink`]s.
pub trait Connector {
    type Link: SerialLink;

    fn connect(&mut self, settings: &SerialSettings) -> Result<Self::Link, SerialError>;
}

/// Lifecycle-managed connection to the provisioning board.
pub struct SerialSession<C: Connector> {
    settings: SerialSettings,
    retry: RetryPolicy,
    connector: C,
    link: Option<C::Link>,
    framer: LineFramer,
    open_attempts: u64,
    opens: u64,
}

impl<C: Connector> SerialSession<C> {
    pub fn new(settings: SerialSettings, retry: RetryPolicy, connector: C) -> Self {
        Self {
            settings,
            retry,
            connector,
            link: None,
            framer: LineFramer::new(),
            open_attempts: 0,
            opens: 0,
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Total connect attempts made over the session's lifetime (successful or not).
    pub fn open_attempts(&self) -> u64 {
        self.open_attempts
    }

    /// Number of successful opens.
    pub fn opens(&self) -> u64 {
        self.opens
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Open the device, retrying with the fixed backoff until it succeeds.
    ///
    /// With an unbounded policy this returns `Ok` or, if shutdown is requested while
    /// waiting, [`SerialError::Shutdown`]. A bounded policy can also end in
    /// [`SerialError::RetriesExhausted`]. An already open session is returned as is.
    pub async fn open(&mut self, shutdown: &mut Shutdown) -> Result<(), SerialError> {
        if self.link.is_some() {
            return Ok(());
        }
        let mut attempts: u32 = 0;
        loop {
            if shutdown.is_requested() {
                return Err(SerialError::Shutdown);
            }
            attempts = attempts.saturating_add(1);
            self.open_attempts += 1;
            match self.connector.connect(&self.settings) {
                Ok(link) => {
                    self.link = Some(link);
                    self.framer.clear();
                    self.opens += 1;
                    info!(
                        "Serial port {} opened successfully at {} baud",
                        self.settings.port, self.settings.baud_rate
                    );
                    return Ok(());
                }
                Err(e) => {
                    error!("{}", e);
                    if let Some(max) = self.retry.max_attempts {
                        if attempts >= max {
                            return Err(SerialError::RetriesExhausted {
                                port: self.settings.port.clone(),
                                attempts,
                            });
                        }
                    }
                    info!("Retrying in {:.1} seconds...", self.retry.delay.as_secs_f32());
                    if shutdown.sleep(self.retry.delay).await {
                        return Err(SerialError::Shutdown);
                    }
                }
            }
        }
    }

    /// Return the next line if input is waiting, `Ok(None)` otherwise.
    ///
    /// The line is decoded lossily and trimmed, so it may be empty. A buffered tail left
    /// over from an earlier read is completed by the next read or delivered when that read
    /// times out. I/O errors are not swallowed: they propagate so the caller can tear the
    /// session down.
    pub fn poll_line(&mut self) -> Result<Option<String>, SerialError> {
        if let Some(line) = self.framer.next_line() {
            return Ok(Some(line));
        }
        let link = self.link.as_mut().ok_or(SerialError::NotOpen)?;
        if self.framer.is_empty() && link.bytes_waiting()? == 0 {
            return Ok(None);
        }
        let mut chunk = [0u8; 256];
        while !self.framer.has_line() {
            match link.read_chunk(&mut chunk) {
                Ok(0) => break,
                Ok(n) => self.framer.push(&chunk[..n]),
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {
                    debug!("Serial read interrupted (EINTR), retrying");
                    continue;
                }
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
        Ok(self.framer.next_line().or_else(|| self.framer.take_partial()))
    }

    /// Release the handle if open. Idempotent.
    pub fn close(&mut self) {
        if self.link.take().is_some() {
            debug!("Closed serial port {}", self.settings.port);
        }
        self.framer.clear();
    }
}

/// Opens real devices through the `serialport` crate.
#[cfg(feature = "serial")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

#[cfg(feature = "serial")]
pub struct PortLink {
    port: Box<dyn serialport::SerialPort>,
}

#[cfg(feature = "serial")]
impl SerialLink for PortLink {
    fn bytes_waiting(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

#[cfg(feature = "serial")]
impl Connector for SystemConnector {
    type Link = PortLink;

    fn connect(&mut self, settings: &SerialSettings) -> Result<PortLink, SerialError> {
        let mut builder =
            serialport::new(settings.port.as_str(), settings.baud_rate).timeout(settings.read_timeout);
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let port = builder.open().map_err(|e| SerialError::Open {
            port: settings.port.clone(),
            reason: e.to_string(),
        })?;
        Ok(PortLink { port })
    }
}
