//! # Provisioning Line Protocol
//!
//! The provisioning board announces credentials as a single text line:
//!
//! ```text
//! Provisioned Credentials: SSID: <name>, Password: <password>
//! ```
//!
//! `<name>` runs up to the first comma, `<password>` is the run of non-whitespace that
//! immediately follows `Password: `. The match is not anchored, so surrounding text
//! (log prefixes, trailing fields after whitespace) is tolerated. Lines without the
//! marker are ignored; lines with the marker that fail extraction are malformed.
//!
//! ```rust
//! use credbridge::provisioning::parse_credentials;
//!
//! let creds = parse_credentials("I (512) prov: Provisioned Credentials: SSID: MyNet, Password: secret123").unwrap();
//! assert_eq!(creds.ssid(), "MyNet");
//! assert_eq!(creds.password(), "secret123");
//! ```

use crate::errors::ProvisioningError;
use crate::logutil::{mask_secret, redact_after};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Literal text every provisioning line carries.
pub const MARKER: &str = "Provisioned Credentials: SSID:";

static CREDENTIALS_RE: OnceLock<Regex> = OnceLock::new();

fn credentials_re() -> &'static Regex {
    CREDENTIALS_RE.get_or_init(|| {
        Regex::new(r"SSID: ([^,]+), Password: (\S+)").expect("credentials pattern is valid")
    })
}

/// A WiFi network name and password pair. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: String,
    password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &mask_secret(&self.password))
            .finish()
    }
}

pub fn contains_marker(line: &str) -> bool {
    line.contains(MARKER)
}

/// Extract credentials from a line that carries [`MARKER`].
pub fn parse_credentials(line: &str) -> Result<Credentials, ProvisioningError> {
    if !contains_marker(line) {
        return Err(ProvisioningError::MissingMarker);
    }
    let caps = credentials_re()
        .captures(line)
        .ok_or_else(|| ProvisioningError::Malformed(redact_after(line, "Password:")))?;
    Ok(Credentials::new(&caps[1], &caps[2]))
}
