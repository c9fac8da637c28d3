//! The pipeline jobs layered on an acquired session: report export, and
//! review-notification mail. Both are sequential glue; every branch worth
//! testing lives in the acquirer or the report transform.

pub mod export;
pub mod notify;

use thiserror::Error;

use crate::gui::GuiError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Gui(#[from] GuiError),

    #[error("no such month: {year}-{month:02}")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("invalid mail address '{0}'")]
    Address(String),

    #[error("failed to compose mail: {0}")]
    Compose(String),

    #[error("smtp transport failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
