//! Reading and normalizing the spreadsheets this tool consumes: the vendor
//! line-item export produced by the report transaction, and the review sheet
//! that drives mail notifications.
//!
//! Everything is read as text first. SAP exports amounts with thousands
//! separators and dates in day-first order, and pads cells with whitespace,
//! so each cell is trimmed before any typed parsing. Cells that fail to
//! parse degrade to `None`; a workbook that cannot be read at all is an
//! error.

use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use chrono::NaiveDate;
use thiserror::Error;

/// Column count of the vendor line-item export layout.
const LINE_ITEM_COLUMNS: usize = 13;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not read workbook: {0}")]
    Workbook(#[from] XlsxError),

    #[error("workbook has no sheets")]
    NoSheet,

    #[error("row {row} has {found} columns, expected {expected}")]
    ShortRow { row: usize, found: usize, expected: usize },

    #[error("review sheet has no '{0}' column")]
    MissingColumn(&'static str),
}

/// One typed row of the vendor line-item export, ready for the warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorLineItem {
    /// Accounting period `YYYYMM`, derived from the export file name.
    pub period: Option<u32>,
    pub company_code: String,
    pub gl_account: String,
    pub vendor_code: String,
    pub vendor_name: String,
    pub reference: String,
    pub purchasing_document: String,
    pub item: String,
    pub currency: String,
    pub amount_document: Option<f64>,
    pub amount_local: Option<f64>,
    pub posting_date: Option<NaiveDate>,
    pub document_date: Option<NaiveDate>,
    pub baseline_date: Option<NaiveDate>,
}

/// Read the first worksheet of a vendor line-item export into typed rows.
/// The header row is skipped; columns are positional.
pub fn load_vendor_line_items(path: &Path) -> Result<Vec<VendorLineItem>, ReportError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range_at(0).ok_or(ReportError::NoSheet)??;

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let period = period_from_file_name(file_name);

    let mut items = Vec::new();
    for (index, row) in range.rows().enumerate().skip(1) {
        items.push(line_item_from_row(index + 1, row, period)?);
    }
    Ok(items)
}

fn line_item_from_row(
    row_number: usize,
    row: &[Data],
    period: Option<u32>,
) -> Result<VendorLineItem, ReportError> {
    if row.len() < LINE_ITEM_COLUMNS {
        return Err(ReportError::ShortRow {
            row: row_number,
            found: row.len(),
            expected: LINE_ITEM_COLUMNS,
        });
    }
    let cell = |index: usize| text_cell(row, index);
    Ok(VendorLineItem {
        period,
        company_code: cell(0),
        gl_account: cell(1),
        vendor_code: cell(2),
        vendor_name: cell(3),
        reference: cell(4),
        purchasing_document: cell(5),
        item: cell(6),
        currency: cell(7),
        amount_document: parse_amount(&cell(8)),
        amount_local: parse_amount(&cell(9)),
        posting_date: parse_date(&cell(10)),
        document_date: parse_date(&cell(11)),
        baseline_date: parse_date(&cell(12)),
    })
}

fn text_cell(row: &[Data], index: usize) -> String {
    row.get(index).map(|c| c.to_string().trim().to_string()).unwrap_or_default()
}

/// `202407_FBL1H.xlsx` -> `202407`.
pub fn period_from_file_name(file_name: &str) -> Option<u32> {
    let prefix = file_name.get(..6)?;
    if prefix.bytes().all(|b| b.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

/// Amounts arrive as text with thousands separators (`1,234.56`).
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Dates arrive day-first; the separator depends on the GUI locale.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

/// The review sheet behind mail notifications: arbitrary invoice columns
/// plus the responsible user's name and address.
#[derive(Debug, Clone)]
pub struct ReviewSheet {
    pub headers: Vec<String>,
    pub rows: Vec<ReviewRow>,
}

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub user: String,
    pub mail: String,
    /// The full row, in header order.
    pub cells: Vec<String>,
}

/// Read the review sheet. Rows without a mail address are dropped.
pub fn load_review_sheet(path: &Path) -> Result<ReviewSheet, ReportError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range_at(0).ok_or(ReportError::NoSheet)??;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();

    let mail_column = find_column(&headers, "mail").ok_or(ReportError::MissingColumn("mail"))?;
    let user_column = find_column(&headers, "user").ok_or(ReportError::MissingColumn("user"))?;

    let mut rows = Vec::new();
    for row in rows_iter {
        let cells: Vec<String> =
            (0..headers.len()).map(|index| text_cell(row, index)).collect();
        let mail = cells[mail_column].clone();
        if mail.is_empty() {
            continue;
        }
        rows.push(ReviewRow { user: cells[user_column].clone(), mail, cells });
    }
    Ok(ReviewSheet { headers, rows })
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_requires_six_leading_digits() {
        assert_eq!(period_from_file_name("202407_FBL1H.xlsx"), Some(202407));
        assert_eq!(period_from_file_name("FBL1H_202407.xlsx"), None);
        assert_eq!(period_from_file_name("2024.xlsx"), None);
    }

    #[test]
    fn amounts_lose_thousands_separators() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("-42.00"), Some(-42.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn dates_accept_both_locale_separators() {
        let expected = NaiveDate::from_ymd_opt(2024, 7, 31).unwrap();
        assert_eq!(parse_date("31.07.2024"), Some(expected));
        assert_eq!(parse_date("31/07/2024"), Some(expected));
        assert_eq!(parse_date("2024-07-31"), None);
    }

    #[test]
    fn line_items_parse_positionally() {
        let row: Vec<Data> = [
            "1000", "2100000", "700123", " ACME GMBH ", "INV-1", "45001", "10", "EUR",
            "1,500.00", "1,650.75", "15.07.2024", "01.07.2024", "30.08.2024",
        ]
        .iter()
        .map(|s| Data::String((*s).to_string()))
        .collect();

        let item = line_item_from_row(2, &row, Some(202407)).unwrap();
        assert_eq!(item.period, Some(202407));
        assert_eq!(item.vendor_name, "ACME GMBH");
        assert_eq!(item.amount_document, Some(1500.0));
        assert_eq!(item.amount_local, Some(1650.75));
        assert_eq!(item.posting_date, NaiveDate::from_ymd_opt(2024, 7, 15));
    }

    #[test]
    fn short_rows_are_rejected() {
        let row = vec![Data::String("1000".into())];
        let err = line_item_from_row(3, &row, None).unwrap_err();
        assert!(matches!(err, ReportError::ShortRow { row: 3, found: 1, .. }));
    }
}
