pub mod core;
pub mod gui;
pub mod jobs;
pub mod report;
pub mod utils;

// re-export ergonomic entry points
pub use core::acquirer::{AcquireError, Credentials, SessionAcquirer};
pub use core::launcher::{ClientLauncher, SapLogonLauncher};
