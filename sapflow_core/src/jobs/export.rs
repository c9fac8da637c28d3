//! Drives an acquired session through a vendor line-item report and exports
//! the result grid to a spreadsheet file on the client machine.

use chrono::NaiveDate;
use log::info;

use super::JobError;
use crate::gui::{controls, GuiSession, GuiWindow, VKey};

/// SAP GUI date entry format.
const DATE_FORMAT: &str = "%d.%m.%Y";

/// What to run and where the export lands. `directory` is a path on the
/// machine the client runs on, so it stays a plain string.
#[derive(Debug, Clone)]
pub struct ExportSpec {
    pub transaction: String,
    pub variant: String,
    pub posting_from: NaiveDate,
    pub posting_to: NaiveDate,
    pub directory: String,
    pub file_name: String,
}

impl ExportSpec {
    /// Spec covering one calendar month, with the conventional
    /// `YYYYMM_<transaction>.xlsx` file name.
    pub fn monthly(
        transaction: &str,
        variant: &str,
        year: i32,
        month: u32,
        directory: &str,
    ) -> Result<Self, JobError> {
        let (posting_from, posting_to) =
            month_bounds(year, month).ok_or(JobError::InvalidPeriod { year, month })?;
        Ok(Self {
            transaction: transaction.to_string(),
            variant: variant.to_string(),
            posting_from,
            posting_to,
            directory: directory.to_string(),
            file_name: format!("{year}{month:02}_{transaction}.xlsx"),
        })
    }
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_month.pred_opt()?))
}

/// Run the report and export its grid. The session must be idle; the caller
/// obtained it from the acquirer.
pub fn run_export(session: &dyn GuiSession, spec: &ExportSpec) -> Result<(), JobError> {
    info!("Exporting {} ({} .. {})", spec.transaction, spec.posting_from, spec.posting_to);
    session.start_transaction(&spec.transaction)?;

    // Recall the stored selection variant; the created-by filter is cleared
    // so variants owned by other users are found too.
    session.press(controls::VARIANT_PICKER)?;
    session.field(controls::VARIANT_NAME)?.set_text(&spec.variant)?;
    session.field(controls::VARIANT_CREATED_BY)?.set_text("")?;
    session.send_vkey(GuiWindow::Dialog, VKey::Execute)?;

    session
        .field(controls::POSTING_DATE_FROM)?
        .set_text(&spec.posting_from.format(DATE_FORMAT).to_string())?;
    session
        .field(controls::POSTING_DATE_TO)?
        .set_text(&spec.posting_to.format(DATE_FORMAT).to_string())?;
    session.send_vkey(GuiWindow::Main, VKey::Enter)?;

    session.set_checkbox(controls::SPECIAL_GL_ITEMS, true)?;
    session.send_vkey(GuiWindow::Main, VKey::Enter)?;
    session.send_vkey(GuiWindow::Main, VKey::Execute)?;

    // Export the result grid as a spreadsheet.
    session.press(controls::GRID_TOOLBAR_EXPAND)?;
    session.press(controls::GRID_EXPORT_MENU)?;
    session.press(controls::GRID_EXPORT_SPREADSHEET)?;

    session.field(controls::EXPORT_FILE_NAME)?.set_text(&spec.file_name)?;
    session.press(controls::EXPORT_CONTINUE)?;
    session.field(controls::EXPORT_DIRECTORY)?.set_text(&spec.directory)?;
    session.send_vkey(GuiWindow::Dialog, VKey::Save)?;

    info!("Export written to {}\\{}", spec.directory, spec.file_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_month_lengths() {
        assert_eq!(
            month_bounds(2024, 7),
            Some((
                NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 31).unwrap()
            ))
        );
        assert_eq!(
            month_bounds(2024, 2).map(|(_, last)| last),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            month_bounds(2023, 12).map(|(_, last)| last),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(month_bounds(2024, 13), None);
    }

    #[test]
    fn monthly_spec_derives_file_name() {
        let spec = ExportSpec::monthly("FBL1H", "APC_DB", 2024, 7, r"D:\inputs").unwrap();
        assert_eq!(spec.file_name, "202407_FBL1H.xlsx");
        assert_eq!(spec.posting_to, NaiveDate::from_ymd_opt(2024, 7, 31).unwrap());
    }
}
