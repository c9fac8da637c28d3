//! Append-only SQLite loading of normalized vendor line items.

use std::path::Path;

use log::info;
use rusqlite::{params, Connection};
use sapflow_core::report::VendorLineItem;

use super::errors::StorageError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS vendor_line_items (
    period            INTEGER,
    company_code      TEXT NOT NULL,
    gl_account        TEXT NOT NULL,
    vendor_code       TEXT NOT NULL,
    vendor_name       TEXT NOT NULL,
    reference         TEXT NOT NULL,
    purchasing_document TEXT NOT NULL,
    item              TEXT NOT NULL,
    currency          TEXT NOT NULL,
    amount_document   REAL,
    amount_local      REAL,
    posting_date      TEXT,
    document_date     TEXT,
    baseline_date     TEXT
)";

const INSERT_ROW: &str = "INSERT INTO vendor_line_items (
    period, company_code, gl_account, vendor_code, vendor_name, reference,
    purchasing_document, item, currency, amount_document, amount_local,
    posting_date, document_date, baseline_date
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

pub struct Warehouse {
    connection: Connection,
}

impl Warehouse {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self { connection: Connection::open(path)? })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self { connection: Connection::open_in_memory()? })
    }

    /// Append rows to `vendor_line_items`, creating the table when missing.
    /// The whole batch commits or rolls back as one transaction.
    pub fn append(&mut self, items: &[VendorLineItem]) -> Result<usize, StorageError> {
        self.connection.execute(CREATE_TABLE, [])?;

        let tx = self.connection.transaction()?;
        {
            let mut insert = tx.prepare(INSERT_ROW)?;
            for item in items {
                insert.execute(params![
                    item.period,
                    item.company_code,
                    item.gl_account,
                    item.vendor_code,
                    item.vendor_name,
                    item.reference,
                    item.purchasing_document,
                    item.item,
                    item.currency,
                    item.amount_document,
                    item.amount_local,
                    item.posting_date,
                    item.document_date,
                    item.baseline_date,
                ])?;
            }
        }
        tx.commit()?;

        info!("Appended {} rows to vendor_line_items", items.len());
        Ok(items.len())
    }

    /// Total row count; used by the CLI to report what a load changed.
    pub fn row_count(&self) -> Result<u64, StorageError> {
        let count =
            self.connection.query_row("SELECT COUNT(*) FROM vendor_line_items", [], |row| {
                row.get::<_, u64>(0)
            })?;
        Ok(count)
    }
}
