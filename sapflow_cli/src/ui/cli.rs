use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use sapflow_core::gui::GuiSession;
use sapflow_core::jobs::export::{run_export, ExportSpec};
use sapflow_core::jobs::notify::{MailSettings, ReviewNotifier, SmtpMailer};
use sapflow_core::report;
use sapflow_storage::{ConnectionProfile, ProfileStore, SecretVault, SmtpSettings, Warehouse};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "sapflow", version, subcommand_required = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a report in the SAP client and export its grid to a spreadsheet
    Export {
        #[arg(long)]
        profile: String,
        /// Report transaction code
        #[arg(long, default_value = "FBL1H")]
        transaction: String,
        /// Stored selection variant to recall
        #[arg(long)]
        variant: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        /// Directory (on the client machine) the export is written to
        #[arg(long)]
        directory: String,
    },
    /// Normalize an exported workbook and append it to the warehouse
    Load {
        #[arg(long)]
        profile: String,
        #[arg(long)]
        workbook: PathBuf,
        /// Overrides the profile's warehouse path
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Export a report and immediately load the result
    Run {
        #[arg(long)]
        profile: String,
        #[arg(long, default_value = "FBL1H")]
        transaction: String,
        #[arg(long)]
        variant: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        directory: String,
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Mail every user listed in a review sheet their flagged invoices
    Notify {
        #[arg(long)]
        profile: String,
        #[arg(long)]
        workbook: PathBuf,
        /// Where per-user extracts are written before being attached
        #[arg(long, default_value = "attachments")]
        attachments_dir: PathBuf,
    },
    /// Manage connection profiles
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Manage login secrets in the system keyring
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Create or overwrite a profile
    Save {
        #[arg(long)]
        name: String,
        /// Connection description as shown by the client
        #[arg(long)]
        environment: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        client_executable: Option<PathBuf>,
        #[arg(long)]
        warehouse: Option<PathBuf>,
        #[arg(long)]
        smtp_host: Option<String>,
        #[arg(long, default_value_t = 25)]
        smtp_port: u16,
        #[arg(long)]
        smtp_sender: Option<String>,
    },
    /// List stored profiles
    List,
    /// Delete a profile
    Delete {
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Read a secret from stdin and store it for a profile's user
    Set {
        #[arg(long)]
        profile: String,
    },
    /// Remove the stored secret
    Clear {
        #[arg(long)]
        profile: String,
    },
}

pub fn run_cli(args: Args) -> Result<()> {
    let store = ProfileStore::new().context("could not open the profile store")?;

    match args.command {
        Command::Export { profile, transaction, variant, year, month, directory } => {
            let profile = load_profile(&store, &profile)?;
            let spec = ExportSpec::monthly(&transaction, &variant, year, month, &directory)?;
            let session = acquire_session(&profile)?;
            run_export(session.as_ref(), &spec)?;
            println!("Exported {} to {}\\{}", spec.transaction, spec.directory, spec.file_name);
        }
        Command::Load { profile, workbook, database } => {
            let profile = load_profile(&store, &profile)?;
            load_workbook(&profile, &workbook, database)?;
        }
        Command::Run { profile, transaction, variant, year, month, directory, database } => {
            let profile = load_profile(&store, &profile)?;
            let spec = ExportSpec::monthly(&transaction, &variant, year, month, &directory)?;
            let session = acquire_session(&profile)?;
            run_export(session.as_ref(), &spec)?;

            let workbook = PathBuf::from(&spec.directory).join(&spec.file_name);
            load_workbook(&profile, &workbook, database)?;
        }
        Command::Notify { profile, workbook, attachments_dir } => {
            let profile = load_profile(&store, &profile)?;
            let smtp = profile
                .smtp
                .clone()
                .ok_or_else(|| anyhow!("profile '{}' has no smtp settings", profile.name))?;
            let settings = MailSettings {
                smtp_host: smtp.host,
                smtp_port: smtp.port,
                sender: smtp.sender,
            };
            let sheet = report::load_review_sheet(&workbook)?;
            let mailer = SmtpMailer::new(&settings);
            let notifier = ReviewNotifier::new(settings, mailer, attachments_dir);

            let summary = notifier.notify_all(&sheet)?;
            println!("Sent {} notification(s), {} failed", summary.sent, summary.failed);
            if summary.failed > 0 {
                bail!("{} notification(s) failed", summary.failed);
            }
        }
        Command::Profile { action } => run_profile_action(&store, action)?,
        Command::Secret { action } => run_secret_action(&store, action)?,
    }
    Ok(())
}

fn run_profile_action(store: &ProfileStore, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Save {
            name,
            environment,
            username,
            client_executable,
            warehouse,
            smtp_host,
            smtp_port,
            smtp_sender,
        } => {
            let smtp = match (smtp_host, smtp_sender) {
                (Some(host), Some(sender)) => {
                    Some(SmtpSettings { host, port: smtp_port, sender })
                }
                (None, None) => None,
                _ => bail!("--smtp-host and --smtp-sender must be given together"),
            };
            let profile = ConnectionProfile {
                name: name.clone(),
                environment,
                username,
                client_executable,
                warehouse,
                smtp,
            };
            store.save(&profile)?;
            println!("Saved profile '{name}'");
        }
        ProfileAction::List => {
            for profile in store.list()? {
                println!("{}\t{}\t{}", profile.name, profile.environment, profile.username);
            }
        }
        ProfileAction::Delete { name } => {
            if store.delete(&name)? {
                println!("Deleted profile '{name}'");
            } else {
                println!("No profile named '{name}'");
            }
        }
    }
    Ok(())
}

fn run_secret_action(store: &ProfileStore, action: SecretAction) -> Result<()> {
    match action {
        SecretAction::Set { profile } => {
            let profile = load_profile(store, &profile)?;
            print!("Secret for {}/{}: ", profile.name, profile.username);
            io::stdout().flush()?;
            let mut secret = String::new();
            io::stdin().lock().read_line(&mut secret)?;
            let secret = secret.trim_end_matches(['\r', '\n']);
            if secret.is_empty() {
                bail!("empty secret");
            }
            SecretVault::set(&profile.name, &profile.username, secret)?;
            println!("Stored secret for '{}'", profile.name);
        }
        SecretAction::Clear { profile } => {
            let profile = load_profile(store, &profile)?;
            SecretVault::delete(&profile.name, &profile.username)?;
            println!("Cleared secret for '{}'", profile.name);
        }
    }
    Ok(())
}

fn load_profile(store: &ProfileStore, name: &str) -> Result<ConnectionProfile> {
    store
        .get(name)?
        .ok_or_else(|| anyhow!("no profile named '{name}'; create one with `sapflow profile save`"))
}

fn load_workbook(
    profile: &ConnectionProfile,
    workbook: &PathBuf,
    database: Option<PathBuf>,
) -> Result<()> {
    let database = database
        .or_else(|| profile.warehouse.clone())
        .ok_or_else(|| anyhow!("no database path; pass --database or set `warehouse` in the profile"))?;

    info!("Loading {} into {}", workbook.display(), database.display());
    let items = report::load_vendor_line_items(workbook)?;
    let mut warehouse = Warehouse::open(&database)?;
    let appended = warehouse.append(&items)?;
    println!(
        "Loaded {appended} row(s) into {} ({} total)",
        database.display(),
        warehouse.row_count()?
    );
    Ok(())
}

/// Acquire a ready session for the profile's environment, joining the
/// profile with its keyring secret at the last moment.
#[cfg(windows)]
fn acquire_session(profile: &ConnectionProfile) -> Result<Box<dyn GuiSession>> {
    use sapflow_core::gui::com::ComEngineProvider;
    use sapflow_core::{Credentials, SapLogonLauncher, SessionAcquirer};

    let launcher = profile
        .client_executable
        .as_ref()
        .map(|path| SapLogonLauncher::new(path.clone()))
        .unwrap_or_default();
    let credentials = Credentials {
        username: profile.username.clone(),
        secret: SecretVault::get(&profile.name, &profile.username)?,
    };

    let acquirer = SessionAcquirer::new(ComEngineProvider::new()?, launcher);
    Ok(acquirer.acquire(&profile.environment, &credentials)?)
}

#[cfg(not(windows))]
fn acquire_session(_profile: &ConnectionProfile) -> Result<Box<dyn GuiSession>> {
    bail!("driving the SAP client requires Windows; `load` and `notify` work on any platform")
}
