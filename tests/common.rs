//! Test utilities & fixtures shared by the listener integration tests.

use async_trait::async_trait;
use credbridge::errors::ConfigureError;
use credbridge::network::NetworkConfigurator;
use credbridge::provisioning::Credentials;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted response of the fake network tool.
#[allow(dead_code)]
pub enum Reply {
    Ok,
    Rejected(&'static str),
    SpawnFailure,
}

/// Records every apply() call; replies from a script, then succeeds.
#[derive(Clone, Default)]
pub struct RecordingConfigurator {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    replies: Arc<Mutex<VecDeque<Reply>>>,
}

#[allow(dead_code)]
impl RecordingConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<Reply>) -> Self {
        let cfg = Self::default();
        cfg.replies.lock().unwrap().extend(replies);
        cfg
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkConfigurator for RecordingConfigurator {
    async fn apply(&self, credentials: &Credentials) -> Result<(), ConfigureError> {
        self.calls.lock().unwrap().push((
            credentials.ssid().to_string(),
            credentials.password().to_string(),
        ));
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => Ok(()),
            Reply::Rejected(stderr) => Err(ConfigureError::Rejected {
                program: "nmcli".to_string(),
                status: 4,
                stderr: stderr.to_string(),
            }),
            Reply::SpawnFailure => Err(ConfigureError::Spawn {
                program: "nmcli".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}
