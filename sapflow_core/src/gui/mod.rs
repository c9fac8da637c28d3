//! The boundary to the SAP GUI scripting engine.
//!
//! Everything the rest of the crate knows about the external client lives in
//! these traits: enumerate children, read/set field text, send virtual keys,
//! press buttons, start a transaction. Controls are addressed by stable
//! logical identifiers ([`FieldId`], [`ControlId`]); each implementation owns
//! the mapping to its native addressing scheme, so none of the engine's
//! opaque path strings leak into the acquisition or pipeline logic.
//!
//! Every call is a blocking round-trip into the external client process, and
//! the underlying COM objects are apartment-bound, so none of the boundary
//! objects are `Send`.

pub mod errors;

#[cfg(windows)]
pub mod com;

pub use errors::GuiError;

pub type GuiResult<T> = Result<T, GuiError>;

/// Transaction code shown by a session that sits on the idle session-manager
/// screen and is free to run any transaction.
pub const SESSION_MANAGER: &str = "SESSION_MANAGER";

/// Transaction code shown by a session that is still at the login screen.
pub const LOGIN_SCREEN: &str = "S000";

/// Stable logical identifier of a text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub &'static str);

/// Stable logical identifier of a pressable or toggleable control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(pub &'static str);

/// The window a virtual key is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiWindow {
    /// The main application window (`wnd[0]` in SAP terms).
    Main,
    /// The topmost modal dialog (`wnd[1]`).
    Dialog,
}

/// Virtual keys used by the automation, named after their SAP GUI meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum VKey {
    /// Enter / confirm.
    Enter = 0,
    /// F8, executes the current report or dialog action.
    Execute = 8,
    /// Ctrl+S, saves/confirms a file dialog.
    Save = 11,
}

impl VKey {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Looks up the process-wide scripting engine, if the client is running.
pub trait EngineProvider {
    fn running_engine(&self) -> GuiResult<Option<Box<dyn GuiEngine>>>;
}

/// The automation entry point of the external client. At most one exists per
/// machine.
pub trait GuiEngine {
    /// The engine's open connections, in the order the engine reports them.
    fn connections(&self) -> GuiResult<Vec<Box<dyn GuiConnection>>>;

    /// Open a new connection to the environment named by `description`.
    /// `visible` controls whether the new window is shown interactively.
    fn open_connection(&self, description: &str, visible: bool) -> GuiResult<Box<dyn GuiConnection>>;
}

/// A named link to one backend environment.
pub trait GuiConnection {
    fn description(&self) -> GuiResult<String>;

    /// The connection's session windows, in the order the engine reports
    /// them. The first child is the session created with the connection.
    fn sessions(&self) -> GuiResult<Vec<Box<dyn GuiSession>>>;
}

/// One interactive window/transaction context within a connection.
pub trait GuiSession {
    /// The session's current transaction code.
    fn transaction(&self) -> GuiResult<String>;

    /// Whether the session is mid-navigation and unsafe to interrupt.
    fn is_busy(&self) -> GuiResult<bool>;

    /// Ask the connection to duplicate this session into a sibling window.
    /// The new window may take a moment to materialize.
    fn create_session(&self) -> GuiResult<()>;

    fn start_transaction(&self, code: &str) -> GuiResult<()>;

    fn field(&self, id: FieldId) -> GuiResult<Box<dyn Field>>;

    fn press(&self, id: ControlId) -> GuiResult<()>;

    fn set_checkbox(&self, id: ControlId, selected: bool) -> GuiResult<()>;

    fn send_vkey(&self, window: GuiWindow, key: VKey) -> GuiResult<()>;
}

impl std::fmt::Debug for dyn GuiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GuiSession")
    }
}

/// Capability handle to one text field.
pub trait Field {
    fn text(&self) -> GuiResult<String>;
    fn set_text(&self, value: &str) -> GuiResult<()>;
}

/// Logical identifiers for every control the automation touches.
pub mod controls {
    use super::{ControlId, FieldId};

    pub const LOGIN_USERNAME: FieldId = FieldId("login.username");
    pub const LOGIN_PASSWORD: FieldId = FieldId("login.password");

    pub const VARIANT_NAME: FieldId = FieldId("variant.name");
    pub const VARIANT_CREATED_BY: FieldId = FieldId("variant.created-by");
    pub const POSTING_DATE_FROM: FieldId = FieldId("selection.posting-date-from");
    pub const POSTING_DATE_TO: FieldId = FieldId("selection.posting-date-to");
    pub const EXPORT_FILE_NAME: FieldId = FieldId("export.file-name");
    pub const EXPORT_DIRECTORY: FieldId = FieldId("export.directory");

    pub const VARIANT_PICKER: ControlId = ControlId("toolbar.variant-picker");
    pub const SPECIAL_GL_ITEMS: ControlId = ControlId("selection.special-gl-items");
    pub const GRID_TOOLBAR_EXPAND: ControlId = ControlId("grid.toolbar-expand");
    pub const GRID_EXPORT_MENU: ControlId = ControlId("grid.export-menu");
    pub const GRID_EXPORT_SPREADSHEET: ControlId = ControlId("grid.export-spreadsheet");
    pub const EXPORT_CONTINUE: ControlId = ControlId("export.continue");
}
