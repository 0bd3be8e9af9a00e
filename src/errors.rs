use thiserror::Error;

/// Errors raised by the serial session.
#[derive(Debug, Error)]
pub enum SerialError {
    /// The device could not be opened (absent, busy, permission denied).
    #[error("failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    /// I/O failure on an open link; the session must be torn down and reopened.
    #[error("serial i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// `poll_line` called while no handle is held.
    #[error("serial session is not open")]
    NotOpen,

    /// A bounded retry policy ran out of attempts.
    #[error("gave up opening {port} after {attempts} attempts")]
    RetriesExhausted { port: String, attempts: u32 },

    /// Shutdown was requested while waiting to retry.
    #[error("shutdown requested")]
    Shutdown,
}

/// Errors raised while extracting credentials from a provisioning line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("line does not carry provisioned credentials")]
    MissingMarker,

    #[error("malformed credentials line: {0}")]
    Malformed(String),
}

/// Errors raised while applying credentials to the host network stack.
#[derive(Debug, Error)]
pub enum ConfigureError {
    /// The network tool ran and reported failure.
    #[error("{program} exited with status {status}: {stderr}")]
    Rejected {
        program: String,
        status: i32,
        stderr: String,
    },

    /// The network tool could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The network tool did not finish within the configured timeout.
    #[error("{program} did not finish within {secs}s")]
    Timeout { program: String, secs: u64 },
}

impl ConfigureError {
    /// `true` for failures the tool itself reported; `false` for anything unexpected
    /// (missing binary, hung process).
    pub fn is_expected(&self) -> bool {
        matches!(self, ConfigureError::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_is_expected_spawn_is_not() {
        let rejected = ConfigureError::Rejected {
            program: "nmcli".into(),
            status: 10,
            stderr: "No network with SSID 'x' found.".into(),
        };
        assert!(rejected.is_expected());
        assert!(rejected.to_string().contains("status 10"));

        let spawn = ConfigureError::Spawn {
            program: "nmcli".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!spawn.is_expected());

        let timeout = ConfigureError::Timeout {
            program: "nmcli".into(),
            secs: 60,
        };
        assert!(!timeout.is_expected());
    }
}
