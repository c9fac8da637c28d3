use std::io;
use std::path::PathBuf;
use std::process::Command;

use log::info;

/// Default install location of the SAP logon executable.
pub const DEFAULT_CLIENT_EXECUTABLE: &str =
    r"C:\Program Files (x86)\SAP\FrontEnd\SAPgui\saplogon.exe";

/// Starts the external client process when no scripting engine is running.
///
/// Success only means the spawn succeeded; whether the client actually came
/// up is inferred by the subsequent engine lookup.
pub trait ClientLauncher {
    fn launch(&self) -> io::Result<()>;
}

/// Launches the SAP logon executable, detached, with no arguments.
#[derive(Debug, Clone)]
pub struct SapLogonLauncher {
    executable: PathBuf,
}

impl SapLogonLauncher {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into() }
    }
}

impl Default for SapLogonLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_EXECUTABLE)
    }
}

impl ClientLauncher for SapLogonLauncher {
    fn launch(&self) -> io::Result<()> {
        info!("Starting client: {}", self.executable.display());
        // The child is left running on its own; the engine lookup is the
        // only success signal we get.
        Command::new(&self.executable).spawn().map(|_| ())
    }
}
