//! Scripted connector and link for driving [`SerialSession`](super::SerialSession)
//! without hardware.
//!
//! ```rust
//! use credbridge::serial::mock::{MockConnector, MockLink};
//!
//! let connector = MockConnector::new()
//!     .fail_times(2)
//!     .then_link(MockLink::new().data(b"hello\n"));
//! assert_eq!(connector.stats().connects(), 0);
//! ```
use super::{Connector, SerialLink, SerialSettings};
use crate::errors::SerialError;
use crate::shutdown::ShutdownTrigger;
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
enum MockEvent {
    Data(Vec<u8>),
    Timeout,
    Error(ErrorKind),
}

/// Counters shared between a [`MockConnector`], its links, and the test.
#[derive(Debug, Default)]
pub struct MockStats {
    connects: AtomicUsize,
    failures: AtomicUsize,
    links_dropped: AtomicUsize,
}

impl MockStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
    pub fn links_dropped(&self) -> usize {
        self.links_dropped.load(Ordering::Relaxed)
    }
}

/// A link that replays a script of data chunks, timeouts and I/O errors.
#[derive(Debug, Default)]
pub struct MockLink {
    script: VecDeque<MockEvent>,
    stats: Option<Arc<MockStats>>,
    on_drained: Option<ShutdownTrigger>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.script.push_back(MockEvent::Data(bytes.to_vec()));
        self
    }

    pub fn line(self, text: &str) -> Self {
        self.data(format!("{text}\r\n").as_bytes())
    }

    pub fn timeout(mut self) -> Self {
        self.script.push_back(MockEvent::Timeout);
        self
    }

    pub fn io_error(mut self, kind: ErrorKind) -> Self {
        self.script.push_back(MockEvent::Error(kind));
        self
    }

    /// Request shutdown the first time the script is found empty.
    pub fn shutdown_when_drained(mut self, trigger: ShutdownTrigger) -> Self {
        self.on_drained = Some(trigger);
        self
    }
}

impl SerialLink for MockLink {
    fn bytes_waiting(&mut self) -> io::Result<usize> {
        match self.script.front() {
            Some(MockEvent::Data(d)) => Ok(d.len()),
            Some(MockEvent::Timeout) => {
                self.script.pop_front();
                Ok(0)
            }
            Some(MockEvent::Error(kind)) => {
                let kind = *kind;
                self.script.pop_front();
                Err(io::Error::new(kind, "mock link failure"))
            }
            None => {
                if let Some(trigger) = self.on_drained.take() {
                    trigger.trigger();
                }
                Ok(0)
            }
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.pop_front() {
            Some(MockEvent::Data(mut d)) => {
                let n = d.len().min(buf.len());
                buf[..n].copy_from_slice(&d[..n]);
                if n < d.len() {
                    self.script.push_front(MockEvent::Data(d.split_off(n)));
                }
                Ok(n)
            }
            Some(MockEvent::Error(kind)) => Err(io::Error::new(kind, "mock link failure")),
            Some(MockEvent::Timeout) | None => {
                Err(io::Error::new(ErrorKind::TimedOut, "mock read timed out"))
            }
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Some(stats) = &self.stats {
            stats.links_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

enum Attempt {
    Fail(String),
    Link(MockLink),
}

/// Connector that fails or hands out scripted links in order. Once the script is
/// exhausted every further attempt fails as if the device were unplugged.
#[derive(Default)]
pub struct MockConnector {
    attempts: VecDeque<Attempt>,
    stats: Arc<MockStats>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_times(mut self, n: usize) -> Self {
        for _ in 0..n {
            self.attempts
                .push_back(Attempt::Fail("No such file or directory".to_string()));
        }
        self
    }

    pub fn then_link(mut self, link: MockLink) -> Self {
        self.attempts.push_back(Attempt::Link(link));
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn connect(&mut self, settings: &SerialSettings) -> Result<MockLink, SerialError> {
        self.stats.connects.fetch_add(1, Ordering::Relaxed);
        match self.attempts.pop_front() {
            Some(Attempt::Link(mut link)) => {
                link.stats = Some(Arc::clone(&self.stats));
                Ok(link)
            }
            Some(Attempt::Fail(reason)) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(SerialError::Open {
                    port: settings.port.clone(),
                    reason,
                })
            }
            None => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(SerialError::Open {
                    port: settings.port.clone(),
                    reason: "device not present".to_string(),
                })
            }
        }
    }
}
