//! Review-notification mail: one message per responsible user, with an HTML
//! table of their flagged invoices and a CSV extract attached.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Message, SmtpTransport, Transport};
use log::{error, info};

use super::JobError;
use crate::report::{ReviewRow, ReviewSheet};

/// SMTP relay parameters; part of the connection profile.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// The From mailbox, e.g. `"Accounts Payable <ap@example.com>"`.
    pub sender: String,
}

/// Seam to the mail transport, so the notification flow can be exercised
/// without a relay.
pub trait MailTransport {
    fn send(&self, message: &Message) -> Result<(), JobError>;
}

/// Plain SMTP relay, as used inside a corporate network.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Self {
        let transport =
            SmtpTransport::builder_dangerous(&settings.smtp_host).port(settings.smtp_port).build();
        Self { transport }
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, message: &Message) -> Result<(), JobError> {
        self.transport.send(message).map(|_| ()).map_err(JobError::from)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct NotifySummary {
    pub sent: usize,
    pub failed: usize,
}

/// Sends one notification per distinct address in a review sheet.
pub struct ReviewNotifier<T> {
    settings: MailSettings,
    transport: T,
    attachments_dir: PathBuf,
}

impl<T: MailTransport> ReviewNotifier<T> {
    pub fn new(settings: MailSettings, transport: T, attachments_dir: impl Into<PathBuf>) -> Self {
        Self { settings, transport, attachments_dir: attachments_dir.into() }
    }

    /// Notify every recipient in the sheet. A failure for one recipient is
    /// logged and counted; the remaining recipients are still processed.
    pub fn notify_all(&self, sheet: &ReviewSheet) -> Result<NotifySummary, JobError> {
        fs::create_dir_all(&self.attachments_dir)?;

        let mut summary = NotifySummary::default();
        for (mail, rows) in group_by_mail(sheet) {
            info!("Sending notification to {mail} ({} invoices)", rows.len());
            match self.notify_one(&sheet.headers, &mail, &rows) {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    error!("Notification to {mail} failed: {e}");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    fn notify_one(
        &self,
        headers: &[String],
        mail: &str,
        rows: &[&ReviewRow],
    ) -> Result<(), JobError> {
        let user = rows[0].user.as_str();
        let attachment_name = format!("Invoices - {}.csv", user.to_uppercase());
        let attachment_path = self.attachments_dir.join(&attachment_name);

        write_extract(&attachment_path, headers, rows)?;
        let attachment = fs::read(&attachment_path)?;

        let message = self.build_message(mail, user, headers, rows, attachment_name, attachment)?;
        self.transport.send(&message)?;

        // The extract only exists to be attached; keep it when the send
        // failed so the run can be retried by hand.
        fs::remove_file(&attachment_path)?;
        Ok(())
    }

    fn build_message(
        &self,
        mail: &str,
        user: &str,
        headers: &[String],
        rows: &[&ReviewRow],
        attachment_name: String,
        attachment: Vec<u8>,
    ) -> Result<Message, JobError> {
        let from: Mailbox = self
            .settings
            .sender
            .parse()
            .map_err(|_| JobError::Address(self.settings.sender.clone()))?;
        let to: Mailbox = mail.parse().map_err(|_| JobError::Address(mail.to_string()))?;

        let subject = format!(
            "Observed invoices - {} - [{}]",
            user.to_uppercase(),
            Local::now().format("%Y-%m-%d")
        );
        let csv_type = ContentType::parse("text/csv")
            .map_err(|e| JobError::Compose(e.to_string()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(notification_body(user, rows.len(), headers, rows)))
                    .singlepart(Attachment::new(attachment_name).body(attachment, csv_type)),
            )
            .map_err(|e| JobError::Compose(e.to_string()))
    }
}

/// Distinct addresses in first-appearance order, each with its rows.
fn group_by_mail(sheet: &ReviewSheet) -> Vec<(String, Vec<&ReviewRow>)> {
    let mut groups: Vec<(String, Vec<&ReviewRow>)> = Vec::new();
    for row in &sheet.rows {
        match groups.iter_mut().find(|(mail, _)| mail == &row.mail) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((row.mail.clone(), vec![row])),
        }
    }
    groups
}

fn write_extract(path: &Path, headers: &[String], rows: &[&ReviewRow]) -> Result<(), JobError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row.cells)?;
    }
    writer.flush()?;
    Ok(())
}

fn notification_body(user: &str, total: usize, headers: &[String], rows: &[&ReviewRow]) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<body>\n\
         <p>Dear User,</p>\n\
         <p>You currently have {total} invoice(s) under review. Below is the reason for the \
         review; a file with the details of the observed documents is attached.</p>\n\
         {}\n\
         <p>Best regards,<br><strong>{}</strong></p>\n\
         </body>\n</html>\n",
        review_table_html(headers, rows),
        escape_html(user),
    )
}

fn review_table_html(headers: &[String], rows: &[&ReviewRow]) -> String {
    let mut html = String::from("<table border=\"1\">\n<tr>");
    for header in headers {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr>\n");
    for row in rows {
        html.push_str("<tr>");
        for cell in &row.cells {
            html.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>");
    html
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
