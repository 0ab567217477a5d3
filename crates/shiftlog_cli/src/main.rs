//! Command-line front end for the shift timeline.
//!
//! # Responsibility
//! - Translate subcommands into `Intent`s and print the resulting view.
//! - Own process concerns: configuration, logging, clipboard, exit codes.

mod render;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use shiftlog_core::db::{open_db, DbError};
use shiftlog_core::model::legacy::replacement_for;
use shiftlog_core::{
    init_logging, ActivityKind, BlockId, ConfigError, CoreConfig,
    DeleteRequestOutcome, EditRequest, HttpTransport, Intent, IntentResponse, RepairStrategy,
    RepoError, ServiceError, SqliteTimelineRepository, SyncClient, SystemClock, TimelineService,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

type Service<'conn> = TimelineService<SqliteTimelineRepository<'conn>, SystemClock, Local>;

#[derive(Parser)]
#[command(name = "shiftlog")]
#[command(about = "Track a continuous work timeline from the terminal", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "SHIFTLOG_DB_PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an activity, closing the running one
    Start {
        #[arg(value_parser = parse_kind)]
        kind: ActivityKind,
    },
    /// Stop the running activity
    Stop,
    /// Show the timeline (default)
    Status,
    /// Show or change one block's kind and times
    Edit(EditArgs),
    /// Delete a block and repair the gap
    Delete {
        id: BlockId,
        /// undo-current | merge | stretch-prev | pull-next | none
        #[arg(long)]
        strategy: Option<RepairStrategy>,
    },
    /// Split a block in two; defaults to its midpoint
    Split {
        id: BlockId,
        /// Split time as HH:MM
        #[arg(long)]
        at: Option<String>,
    },
    /// Revert the last delete or split
    Undo,
    /// Delete all blocks and history; sync settings are kept
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Export the timeline as comma-separated text
    Export {
        /// Also write the export to this file
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        no_clipboard: bool,
    },
    /// Upload the timeline to the configured endpoint
    Sync {
        #[arg(long, env = "SHIFTLOG_SYNC_CREDENTIAL", hide_env_values = true)]
        credential: Option<String>,
    },
    /// Show the running activity with a live timer
    Watch,
    /// List built-in activity kinds
    Kinds,
}

#[derive(Args)]
struct EditArgs {
    id: BlockId,
    #[arg(long, value_parser = parse_kind)]
    kind: Option<ActivityKind>,
    /// New start as HH:MM
    #[arg(long)]
    start: Option<String>,
    /// New end as HH:MM; closes a running block
    #[arg(long)]
    end: Option<String>,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Db(DbError),
    Repo(RepoError),
    Service(ServiceError),
    Http(String),
    Io(std::io::Error),
    Usage(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Http(message) => write!(f, "{message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Usage(message) => write!(f, "{message}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Http(_) | Self::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let command = cli.command.unwrap_or(Commands::Status);
    if let Commands::Kinds = command {
        print!("{}", render::kinds());
        return Ok(());
    }

    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    if let Err(err) = init_logging(&config) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let conn = open_db(config.resolved_db_path())?;
    let repo = SqliteTimelineRepository::try_new(&conn)?;
    let mut service = TimelineService::open(repo, SystemClock, Local, &config)?;
    if config.gatekeeper_url.is_some() {
        let transport = HttpTransport::new(config.sync_timeout()).map_err(CliError::Http)?;
        service = service.with_sync_client(SyncClient::new(
            Box::new(transport),
            config.gatekeeper_url.clone(),
        ));
    }

    execute(&mut service, command)
}

fn execute(service: &mut Service<'_>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Start { kind } => {
            let response = service.dispatch(Intent::Start(kind.clone()))?;
            if let IntentResponse::Started(outcome) = response {
                println!("{}", render::start(&outcome, &kind));
            }
            print_status(service);
        }
        Commands::Stop => {
            if let IntentResponse::Stopped(outcome) = service.dispatch(Intent::Stop)? {
                println!("{}", render::stop(&outcome));
            }
            print_status(service);
        }
        Commands::Status | Commands::Kinds => print_status(service),
        Commands::Edit(args) => edit(service, args)?,
        Commands::Delete { id, strategy } => delete(service, id, strategy)?,
        Commands::Split { id, at } => split(service, id, at)?,
        Commands::Undo => {
            if !service.undo_available() {
                println!("nothing to undo");
                return Ok(());
            }
            if let IntentResponse::Undone(outcome) = service.dispatch(Intent::Undo)? {
                println!("{}", render::undo(&outcome));
            }
            print_status(service);
        }
        Commands::Reset { yes } => {
            if !yes {
                return Err(CliError::Usage(
                    "reset deletes every block; rerun with --yes to confirm".to_string(),
                ));
            }
            service.dispatch(Intent::Reset)?;
            println!("timeline cleared");
        }
        Commands::Export {
            output,
            no_clipboard,
        } => {
            let IntentResponse::Exported(text) = service.dispatch(Intent::Export)? else {
                return Ok(());
            };
            print!("{text}");
            if let Some(path) = output {
                std::fs::write(&path, &text)?;
                eprintln!("written to {}", path.display());
            }
            if !no_clipboard {
                copy_to_clipboard(&text);
            }
        }
        Commands::Sync { credential } => {
            if let IntentResponse::Synced(report) = service.dispatch(Intent::Sync { credential })? {
                println!("{}", render::sync(&report));
            }
        }
        Commands::Watch => watch(service),
    }
    Ok(())
}

fn edit(service: &mut Service<'_>, args: EditArgs) -> Result<(), CliError> {
    let IntentResponse::EditForm(form) = service.dispatch(Intent::EditRequest(args.id))? else {
        return Ok(());
    };
    let Some(form) = form else {
        println!("block not found");
        return Ok(());
    };
    if args.kind.is_none() && args.start.is_none() && args.end.is_none() {
        println!("{}", render::edit_form(&form));
        return Ok(());
    }

    let request = EditRequest {
        id: form.id,
        kind: args.kind.unwrap_or(form.kind),
        start: args.start.unwrap_or(form.start),
        end: args.end.or(form.end),
    };
    if let IntentResponse::Edited(outcome) = service.dispatch(Intent::SaveEdit(request))? {
        println!("{}", render::edit(&outcome));
    }
    print_status(service);
    Ok(())
}

fn delete(
    service: &mut Service<'_>,
    id: BlockId,
    strategy: Option<RepairStrategy>,
) -> Result<(), CliError> {
    let response = match strategy {
        Some(strategy) => service.dispatch(Intent::DeleteStrategy { id, strategy })?,
        None => service.dispatch(Intent::DeleteRequest(id))?,
    };
    match response {
        IntentResponse::Deleted(outcome)
        | IntentResponse::DeleteRequested(DeleteRequestOutcome::Done(outcome)) => {
            println!("{}", render::delete(&outcome));
            print_status(service);
        }
        IntentResponse::DeleteRequested(DeleteRequestOutcome::Choose(plan)) => {
            println!("{}", render::delete_plan(&plan));
        }
        _ => {}
    }
    Ok(())
}

fn split(service: &mut Service<'_>, id: BlockId, at: Option<String>) -> Result<(), CliError> {
    let intent = match at {
        Some(time) => Intent::SplitConfirm { id, time },
        None => {
            let IntentResponse::SplitProposed(proposal) =
                service.dispatch(Intent::SplitRequest(id))?
            else {
                return Ok(());
            };
            let Some(proposal) = proposal else {
                println!("block not found");
                return Ok(());
            };
            println!("{}", render::split_proposal(&proposal));
            Intent::SplitAt {
                id,
                at: proposal.at,
            }
        }
    };
    if let IntentResponse::Split(outcome) = service.dispatch(intent)? {
        println!("{}", render::split(&outcome));
    }
    print_status(service);
    Ok(())
}

fn print_status(service: &Service<'_>) {
    print!("{}", render::view(&service.view(), service.undo_available()));
}

/// Redraws the running block once per second until interrupted.
fn watch(service: &Service<'_>) {
    info!("event=watch module=cli status=start");
    loop {
        let view = service.view();
        match &view.active {
            Some(active) => {
                let rest = if active.rest_satisfied { " [rest ok]" } else { "" };
                print!("\r{} {}{}   ", active.label, active.elapsed_label, rest);
            }
            None => print!("\ridle 00:00:00   "),
        }
        let _ = std::io::Write::flush(&mut std::io::stdout());
        std::thread::sleep(Duration::from_secs(1));
    }
}

fn copy_to_clipboard(text: &str) {
    let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
    match result {
        Ok(()) => eprintln!("copied to clipboard"),
        Err(err) => warn!("event=clipboard_copy module=cli status=error error={err}"),
    }
}

/// Accepts current labels, display names and retired labels.
fn parse_kind(raw: &str) -> Result<ActivityKind, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("activity kind cannot be empty".to_string());
    }
    if let Some(kind) = replacement_for(trimmed) {
        return Ok(kind);
    }
    let normalized = trimmed.to_lowercase().replace([' ', '-'], "_");
    if let Some(kind) = ActivityKind::BUILTIN
        .into_iter()
        .find(|kind| kind.as_label() == normalized)
    {
        return Ok(kind);
    }
    Ok(ActivityKind::from_label(trimmed))
}
