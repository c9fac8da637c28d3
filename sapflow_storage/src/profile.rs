use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A user-named automation target: which environment to connect to, who logs
/// in, and where the surrounding pipelines read and write.
///
/// The login secret is deliberately absent; it lives in the system keyring
/// (see [`crate::SecretVault`]) and is only joined with the profile at call
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Unique, human-readable identifier (also the file name).
    pub name: String,
    /// Connection description as shown by the client, e.g.
    /// `"1.01 - SAP PRD - S/4"`. Matched exactly during acquisition.
    pub environment: String,
    pub username: String,
    /// Client executable to launch on a cold start; `None` uses the
    /// default install location.
    #[serde(default)]
    pub client_executable: Option<PathBuf>,
    /// SQLite database the load pipeline appends to.
    #[serde(default)]
    pub warehouse: Option<PathBuf>,
    /// SMTP relay for the notification pipeline.
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// The From mailbox, e.g. `"Accounts Payable <ap@example.com>"`.
    pub sender: String,
}

fn default_smtp_port() -> u16 {
    25
}
