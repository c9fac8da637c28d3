//! A deterministic in-process stand-in for the SAP GUI scripting engine.
//!
//! * **From the test's perspective**
//!   * Seed the object tree (`with_connection`, `with_engine_running`, ...)
//!     before calling the acquirer.
//!   * Inspect everything the code under test did via `journal()`, and the
//!     resulting tree via `connection_count()` / `session_state()`.
//!
//! * **Why this exists**: it lets integration tests exercise the real
//!   acquisition state machine (launch, connection reuse, session scan,
//!   login) without a Windows box or a running SAP client.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use sapflow_core::core::launcher::ClientLauncher;
use sapflow_core::gui::{
    ControlId, EngineProvider, Field, FieldId, GuiConnection, GuiEngine, GuiResult, GuiSession,
    GuiWindow, VKey, LOGIN_SCREEN, SESSION_MANAGER,
};

#[derive(Clone)]
pub struct SessionState {
    pub transaction: String,
    pub busy: bool,
    pub fields: HashMap<String, String>,
}

pub fn idle_session() -> SessionState {
    SessionState { transaction: SESSION_MANAGER.to_string(), busy: false, fields: HashMap::new() }
}

pub fn login_session() -> SessionState {
    SessionState { transaction: LOGIN_SCREEN.to_string(), busy: false, fields: HashMap::new() }
}

pub fn busy_session(transaction: &str) -> SessionState {
    SessionState { transaction: transaction.to_string(), busy: true, fields: HashMap::new() }
}

pub struct ConnectionState {
    pub description: String,
    pub sessions: Vec<SessionState>,
}

pub struct EngineState {
    engine_running: bool,
    launch_starts_engine: bool,
    launch_fails: bool,
    pub launch_attempts: u32,
    connections: Vec<ConnectionState>,
    journal: Vec<String>,
    /// Credentials the backend accepts; `None` accepts anything.
    valid_credentials: Option<(String, String)>,
    /// Sessions a freshly opened connection starts with.
    fresh_connection_sessions: Vec<SessionState>,
    /// Whether a sibling-session request materializes a new window.
    sibling_materializes: bool,
}

/// Owner of the scripted object tree. Clone handles out of it for the
/// acquirer; every handle shares the same state.
#[derive(Clone)]
pub struct FakeGui {
    state: Rc<RefCell<EngineState>>,
}

impl FakeGui {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EngineState {
                engine_running: true,
                launch_starts_engine: true,
                launch_fails: false,
                launch_attempts: 0,
                connections: Vec::new(),
                journal: Vec::new(),
                valid_credentials: None,
                fresh_connection_sessions: vec![login_session()],
                sibling_materializes: true,
            })),
        }
    }

    pub fn with_engine_running(self, running: bool) -> Self {
        self.state.borrow_mut().engine_running = running;
        self
    }

    pub fn with_launch_starting_engine(self, starts: bool) -> Self {
        self.state.borrow_mut().launch_starts_engine = starts;
        self
    }

    pub fn with_failing_launch(self) -> Self {
        self.state.borrow_mut().launch_fails = true;
        self
    }

    pub fn with_connection(self, description: &str, sessions: Vec<SessionState>) -> Self {
        self.state
            .borrow_mut()
            .connections
            .push(ConnectionState { description: description.to_string(), sessions });
        self
    }

    pub fn with_valid_credentials(self, username: &str, secret: &str) -> Self {
        self.state.borrow_mut().valid_credentials =
            Some((username.to_string(), secret.to_string()));
        self
    }

    pub fn with_fresh_connection_sessions(self, sessions: Vec<SessionState>) -> Self {
        self.state.borrow_mut().fresh_connection_sessions = sessions;
        self
    }

    pub fn provider(&self) -> FakeProvider {
        FakeProvider { state: self.state.clone() }
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher { state: self.state.clone() }
    }

    /// Direct handle to one scripted session, bypassing acquisition.
    pub fn session_handle(&self, connection: usize, session: usize) -> Box<dyn GuiSession> {
        Box::new(FakeSession { state: self.state.clone(), connection, session })
    }

    pub fn journal(&self) -> Vec<String> {
        self.state.borrow().journal.clone()
    }

    pub fn launch_attempts(&self) -> u32 {
        self.state.borrow().launch_attempts
    }

    pub fn connection_count(&self) -> usize {
        self.state.borrow().connections.len()
    }

    pub fn session_count(&self, connection: usize) -> usize {
        self.state.borrow().connections[connection].sessions.len()
    }

    pub fn session_state(&self, connection: usize, session: usize) -> SessionState {
        self.state.borrow().connections[connection].sessions[session].clone()
    }
}

pub struct FakeProvider {
    state: Rc<RefCell<EngineState>>,
}

impl EngineProvider for FakeProvider {
    fn running_engine(&self) -> GuiResult<Option<Box<dyn GuiEngine>>> {
        if self.state.borrow().engine_running {
            Ok(Some(Box::new(FakeEngine { state: self.state.clone() })))
        } else {
            Ok(None)
        }
    }
}

pub struct FakeLauncher {
    state: Rc<RefCell<EngineState>>,
}

impl ClientLauncher for FakeLauncher {
    fn launch(&self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.launch_attempts += 1;
        state.journal.push("launch".to_string());
        if state.launch_fails {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no client executable"));
        }
        if state.launch_starts_engine {
            state.engine_running = true;
        }
        Ok(())
    }
}

struct FakeEngine {
    state: Rc<RefCell<EngineState>>,
}

impl GuiEngine for FakeEngine {
    fn connections(&self) -> GuiResult<Vec<Box<dyn GuiConnection>>> {
        let count = self.state.borrow().connections.len();
        Ok((0..count)
            .map(|index| {
                Box::new(FakeConnection { state: self.state.clone(), connection: index })
                    as Box<dyn GuiConnection>
            })
            .collect())
    }

    fn open_connection(&self, description: &str, visible: bool) -> GuiResult<Box<dyn GuiConnection>> {
        let mut state = self.state.borrow_mut();
        state.journal.push(format!("open-connection {description} visible={visible}"));
        let sessions = state.fresh_connection_sessions.clone();
        state.connections.push(ConnectionState { description: description.to_string(), sessions });
        let index = state.connections.len() - 1;
        drop(state);
        Ok(Box::new(FakeConnection { state: self.state.clone(), connection: index }))
    }
}

struct FakeConnection {
    state: Rc<RefCell<EngineState>>,
    connection: usize,
}

impl GuiConnection for FakeConnection {
    fn description(&self) -> GuiResult<String> {
        Ok(self.state.borrow().connections[self.connection].description.clone())
    }

    fn sessions(&self) -> GuiResult<Vec<Box<dyn GuiSession>>> {
        let count = self.state.borrow().connections[self.connection].sessions.len();
        Ok((0..count)
            .map(|index| {
                Box::new(FakeSession {
                    state: self.state.clone(),
                    connection: self.connection,
                    session: index,
                }) as Box<dyn GuiSession>
            })
            .collect())
    }
}

struct FakeSession {
    state: Rc<RefCell<EngineState>>,
    connection: usize,
    session: usize,
}

impl FakeSession {
    fn with_session<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.borrow_mut();
        f(&mut state.connections[self.connection].sessions[self.session])
    }
}

impl GuiSession for FakeSession {
    fn transaction(&self) -> GuiResult<String> {
        Ok(self.with_session(|s| s.transaction.clone()))
    }

    fn is_busy(&self) -> GuiResult<bool> {
        Ok(self.with_session(|s| s.busy))
    }

    fn create_session(&self) -> GuiResult<()> {
        let mut state = self.state.borrow_mut();
        state.journal.push("create-session".to_string());
        if state.sibling_materializes {
            state.connections[self.connection].sessions.push(idle_session());
        }
        Ok(())
    }

    fn start_transaction(&self, code: &str) -> GuiResult<()> {
        self.state.borrow_mut().journal.push(format!("start-transaction {code}"));
        self.with_session(|s| s.transaction = code.to_string());
        Ok(())
    }

    fn field(&self, id: FieldId) -> GuiResult<Box<dyn Field>> {
        Ok(Box::new(FakeField {
            state: self.state.clone(),
            connection: self.connection,
            session: self.session,
            key: id.0,
        }))
    }

    fn press(&self, id: ControlId) -> GuiResult<()> {
        self.state.borrow_mut().journal.push(format!("press {}", id.0));
        Ok(())
    }

    fn set_checkbox(&self, id: ControlId, selected: bool) -> GuiResult<()> {
        self.state.borrow_mut().journal.push(format!("checkbox {}={selected}", id.0));
        Ok(())
    }

    fn send_vkey(&self, window: GuiWindow, key: VKey) -> GuiResult<()> {
        let window_name = match window {
            GuiWindow::Main => "main",
            GuiWindow::Dialog => "dialog",
        };
        self.state.borrow_mut().journal.push(format!("vkey {} {window_name}", key.code()));

        // Submitting the login screen either signs the session in or leaves
        // it where it is, exactly like the backend would.
        if window == GuiWindow::Main && key == VKey::Enter {
            let accepted = {
                let state = self.state.borrow();
                let session = &state.connections[self.connection].sessions[self.session];
                session.transaction == LOGIN_SCREEN
                    && match &state.valid_credentials {
                        Some((user, secret)) => {
                            session.fields.get("login.username") == Some(user)
                                && session.fields.get("login.password") == Some(secret)
                        }
                        None => true,
                    }
            };
            if accepted {
                self.with_session(|s| s.transaction = SESSION_MANAGER.to_string());
            }
        }
        Ok(())
    }
}

struct FakeField {
    state: Rc<RefCell<EngineState>>,
    connection: usize,
    session: usize,
    key: &'static str,
}

impl Field for FakeField {
    fn text(&self) -> GuiResult<String> {
        let state = self.state.borrow();
        Ok(state.connections[self.connection].sessions[self.session]
            .fields
            .get(self.key)
            .cloned()
            .unwrap_or_default())
    }

    fn set_text(&self, value: &str) -> GuiResult<()> {
        let mut state = self.state.borrow_mut();
        state.journal.push(format!("set {}={value}", self.key));
        state.connections[self.connection].sessions[self.session]
            .fields
            .insert(self.key.to_string(), value.to_string());
        Ok(())
    }
}
