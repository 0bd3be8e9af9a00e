//! NetworkManager backend: shells out to `nmcli`.
use super::NetworkConfigurator;
use crate::errors::ConfigureError;
use crate::provisioning::Credentials;
use async_trait::async_trait;
use log::{debug, info};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone)]
pub struct NmcliConfigurator {
    program: String,
    use_sudo: bool,
    command_timeout: Option<Duration>,
}

impl Default for NmcliConfigurator {
    fn default() -> Self {
        Self {
            program: "nmcli".to_string(),
            use_sudo: true,
            command_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl NmcliConfigurator {
    pub fn new(program: impl Into<String>, use_sudo: bool, command_timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            use_sudo,
            command_timeout,
        }
    }

    /// Arguments for removing a stale profile of the same name.
    pub fn delete_args(ssid: &str) -> Vec<String> {
        vec!["connection".into(), "delete".into(), ssid.into()]
    }

    /// Arguments for creating and activating the new profile.
    pub fn connect_args(credentials: &Credentials) -> Vec<String> {
        vec![
            "device".into(),
            "wifi".into(),
            "connect".into(),
            credentials.ssid().into(),
            "password".into(),
            credentials.password().into(),
        ]
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg(&self.program);
            c
        } else {
            Command::new(&self.program)
        };
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn program_label(&self) -> String {
        if self.use_sudo {
            format!("sudo {}", self.program)
        } else {
            self.program.clone()
        }
    }

    async fn run(&self, mut cmd: Command) -> Result<std::process::Output, ConfigureError> {
        let program = self.program_label();
        let fut = cmd.output();
        let res = match self.command_timeout {
            Some(limit) => timeout(limit, fut).await.map_err(|_| ConfigureError::Timeout {
                program: program.clone(),
                secs: limit.as_secs(),
            })?,
            None => fut.await,
        };
        res.map_err(|source| ConfigureError::Spawn { program, source })
    }
}

#[async_trait]
impl NetworkConfigurator for NmcliConfigurator {
    async fn apply(&self, credentials: &Credentials) -> Result<(), ConfigureError> {
        let ssid = credentials.ssid();

        // A missing profile makes delete fail; that is the normal first-time case.
        let mut delete = self.command(&Self::delete_args(ssid));
        delete.stdout(Stdio::null()).stderr(Stdio::null());
        let removed = self.run(delete).await?;
        debug!(
            "Removed existing profile for {}: {}",
            ssid,
            removed.status.success()
        );

        let mut connect = self.command(&Self::connect_args(credentials));
        connect.stdout(Stdio::piped()).stderr(Stdio::piped());
        let output = self.run(connect).await?;
        if output.status.success() {
            info!("Successfully connected to {}", ssid);
            Ok(())
        } else {
            Err(ConfigureError::Rejected {
                program: self.program_label(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
