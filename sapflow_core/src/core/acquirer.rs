//! Session acquisition: decide whether to launch the client, which active
//! connection to reuse, which session window is free, and how to recover a
//! partially-logged-in session.
//!
//! Each call re-derives the state of the world by reading the live object
//! tree; nothing is cached between calls. The busy-flag check is
//! observe-then-act: another script or a human can still grab the session
//! between the check and our first use of it.

use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;

use crate::core::launcher::ClientLauncher;
use crate::gui::{
    controls, EngineProvider, GuiConnection, GuiEngine, GuiError, GuiSession, GuiWindow, VKey,
    LOGIN_SCREEN, SESSION_MANAGER,
};

/// How long the freshly-launched client gets before the single engine-handle
/// retry. Empirical; the client has no readiness signal.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Username and secret for the two well-known login fields.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

#[derive(Debug, Error)]
pub enum AcquireError {
    /// No running engine, even after launching the client once.
    #[error("no scripting engine available, even after launching the client")]
    EngineUnavailable,

    /// Opening a connection failed, or the connection has no session windows.
    #[error("no usable connection to '{0}'")]
    ConnectionUnavailable(String),

    /// Every session is busy; nothing idle, at the login screen, or free.
    #[error("no idle or free session on '{0}'")]
    SessionUnavailable(String),

    /// The login submit left the session sitting at the login screen.
    #[error("login for '{username}' was rejected at the login screen")]
    AuthenticationFailed { username: String },

    #[error(transparent)]
    Gui(#[from] GuiError),
}

/// Produces one ready-to-use session for a target environment, minimizing
/// redundant logins and new-connection creation and tolerating a cold start.
pub struct SessionAcquirer<P, L> {
    provider: P,
    launcher: L,
    settle_delay: Duration,
}

impl<P: EngineProvider, L: ClientLauncher> SessionAcquirer<P, L> {
    pub fn new(provider: P, launcher: L) -> Self {
        Self { provider, launcher, settle_delay: DEFAULT_SETTLE_DELAY }
    }

    /// Override the post-launch settle delay. Tests set this to zero.
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Acquire a session on the connection whose description equals
    /// `environment`, logging in where needed.
    pub fn acquire(
        &self,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn GuiSession>, AcquireError> {
        info!("Acquiring session for '{environment}'");
        let engine = self.obtain_engine()?;

        match find_connection(engine.as_ref(), environment)? {
            Some(connection) => {
                debug!("Reusing connection '{environment}'");
                self.select_session(connection.as_ref(), environment, credentials)
            }
            None => {
                info!("Connection '{environment}' not found. Opening a new one");
                self.open_and_authenticate(engine.as_ref(), environment, credentials)
            }
        }
    }

    /// Step 1: engine discovery with a single launch-and-recheck.
    fn obtain_engine(&self) -> Result<Box<dyn GuiEngine>, AcquireError> {
        if let Some(engine) = self.provider.running_engine()? {
            return Ok(engine);
        }

        info!("Scripting engine not running. Launching the client");
        match self.launcher.launch() {
            // No readiness signal exists, only the settle delay.
            Ok(()) => thread::sleep(self.settle_delay),
            // Best effort: the lookup below still gets its one retry.
            Err(e) => error!("Failed to launch the client: {e}"),
        }

        self.provider
            .running_engine()?
            .ok_or(AcquireError::EngineUnavailable)
    }

    /// Step 2, fresh path: open a connection, take its first child, log in.
    fn open_and_authenticate(
        &self,
        engine: &dyn GuiEngine,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn GuiSession>, AcquireError> {
        let connection = engine.open_connection(environment, true)?;
        let session = connection
            .sessions()?
            .into_iter()
            .next()
            .ok_or_else(|| AcquireError::ConnectionUnavailable(environment.to_string()))?;
        self.authenticate(session.as_ref(), credentials)?;
        Ok(session)
    }

    /// Step 3: pick a session on a reused connection.
    ///
    /// Preference order: an idle session-manager window anywhere in the list,
    /// then the first window still at the login screen (logged in in place),
    /// then the first window that is not busy.
    fn select_session(
        &self,
        connection: &dyn GuiConnection,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<Box<dyn GuiSession>, AcquireError> {
        let mut sessions = connection.sessions()?;
        if sessions.is_empty() {
            return Err(AcquireError::ConnectionUnavailable(environment.to_string()));
        }

        if sessions.len() == 1 {
            // Keep one window free for whoever else is using this client.
            debug!("Single session on '{environment}'. Requesting a sibling");
            sessions[0].create_session()?;
            // The new window may not have materialized yet; scan whatever
            // the engine reports now.
            sessions = connection.sessions()?;
        }

        let mut idle = None;
        let mut login = None;
        for (index, session) in sessions.iter().enumerate() {
            let transaction = session.transaction()?;
            debug!("Session {} is in '{transaction}'", index + 1);
            if transaction == SESSION_MANAGER {
                idle = Some(index);
                break;
            }
            if transaction == LOGIN_SCREEN && login.is_none() {
                login = Some(index);
            }
        }

        if let Some(index) = idle {
            info!("Session {} is free", index + 1);
            return Ok(sessions.swap_remove(index));
        }
        if let Some(index) = login {
            info!("Session {} is at the login screen. Signing in", index + 1);
            let session = sessions.swap_remove(index);
            self.authenticate(session.as_ref(), credentials)?;
            return Ok(session);
        }

        let mut free = None;
        for (index, session) in sessions.iter().enumerate() {
            if session.is_busy()? {
                debug!("Session {} is busy. Skipping", index + 1);
            } else {
                info!("Session {} is not busy. Using it", index + 1);
                free = Some(index);
                break;
            }
        }
        match free {
            Some(index) => Ok(sessions.swap_remove(index)),
            None => Err(AcquireError::SessionUnavailable(environment.to_string())),
        }
    }

    /// Fill the two login fields, submit, and verify the session actually
    /// left the login screen.
    fn authenticate(
        &self,
        session: &dyn GuiSession,
        credentials: &Credentials,
    ) -> Result<(), AcquireError> {
        session.field(controls::LOGIN_USERNAME)?.set_text(&credentials.username)?;
        session.field(controls::LOGIN_PASSWORD)?.set_text(&credentials.secret)?;
        session.send_vkey(GuiWindow::Main, VKey::Enter)?;

        if session.transaction()? == LOGIN_SCREEN {
            return Err(AcquireError::AuthenticationFailed {
                username: credentials.username.clone(),
            });
        }
        Ok(())
    }
}

/// First connection whose description equals `environment`, in engine order.
fn find_connection(
    engine: &dyn GuiEngine,
    environment: &str,
) -> Result<Option<Box<dyn GuiConnection>>, AcquireError> {
    for connection in engine.connections()? {
        if connection.description()? == environment {
            return Ok(Some(connection));
        }
    }
    Ok(None)
}
