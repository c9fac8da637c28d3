use thiserror::Error;

/// A central error enum for scripting-boundary failures.
#[derive(Debug, Error)]
pub enum GuiError {
    /// A call into the external client failed.
    #[error("scripting call failed: {0}")]
    Call(String),

    /// A logical control id has no mapping in the active engine
    /// implementation.
    #[error("unknown control id '{0}'")]
    UnknownControl(&'static str),

    /// The engine returned a value of an unexpected shape.
    #[error("unexpected value from the scripting engine for {0}")]
    UnexpectedValue(&'static str),
}
