use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};

use crate::api::{self, RecordBackend};
use crate::config::Config;
use crate::db::Database;
use crate::models::Column;
use crate::session::Session;

pub mod add;
pub mod config;
pub mod delete;
pub mod display;
pub mod export;
pub mod import;
pub mod list;
pub mod login;
pub mod show;
pub mod ui;
pub mod update;
pub mod values;

pub use add::run_add;
pub use config::run_config;
pub use delete::run_delete;
pub use export::run_export;
pub use import::run_import;
pub use list::{run_browse, run_list};
pub use login::{forget_rejected_session, run_login, run_logout, run_whoami};
pub use show::{run_history, run_show};
pub use update::run_edit;
pub use values::run_values;

#[derive(Parser)]
#[command(name = "registroscmd")]
#[command(about = "Inspection device records from the command line")]
#[command(version)]
pub struct Cli {
    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session token
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List records with filters, sort and pagination
    List(ListArgs),
    /// Interactive record table
    Browse(BrowseArgs),
    /// Show one record
    Show(ShowArgs),
    /// Change history for an inspector number
    History(HistoryArgs),
    /// Create a record
    Add(AddArgs),
    /// Edit a record
    Edit(EditArgs),
    /// Delete records by id
    Delete(DeleteArgs),
    /// Validate and upload a CSV file
    Import(ImportArgs),
    /// Export records to CSV
    Export(ExportArgs),
    /// Distinct values of a column
    Values(ValuesArgs),
    /// Read or change stored settings
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    pub username: Option<String>,
    /// Password (prompted when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short, long, default_value = "1")]
    pub page: u32,
    /// Rows per page (defaults to the configured page size)
    #[arg(short, long)]
    pub limit: Option<u32>,
    #[arg(short, long, value_parser = parse_column)]
    pub sort: Option<Column>,
    #[arg(short, long, default_value = "asc")]
    pub order: String,
    /// Column filter, repeatable: --filter ciudad=Cali
    #[arg(short, long, value_name = "COL=VALUE", value_parser = parse_assignment)]
    pub filter: Vec<(Column, String)>,
    /// Match this filtered column as a whole value
    #[arg(short, long, value_name = "COL", value_parser = parse_column)]
    pub exact: Vec<Column>,
    /// Search every column
    #[arg(long)]
    pub search: Option<String>,
    /// Match the search term as a whole value
    #[arg(long)]
    pub exact_search: bool,
}

#[derive(Args)]
pub struct BrowseArgs {
    /// Rows per page (defaults to the configured page size)
    #[arg(short, long)]
    pub limit: Option<u32>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: i64,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub numero_inspector: i64,
}

#[derive(Args)]
pub struct AddArgs {
    /// Field value, repeatable: --set nombre="ins12 Nodo". Prompts when omitted.
    #[arg(long, value_name = "COL=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(Column, String)>,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: i64,
    /// Field value, repeatable. Prompts for every field when omitted.
    #[arg(long, value_name = "COL=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(Column, String)>,
}

#[derive(Args)]
pub struct DeleteArgs {
    #[arg(required = true)]
    pub ids: Vec<i64>,
    /// Skip confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// CSV file (opens a file picker when omitted)
    pub file: Option<String>,
    /// Validate only, do not upload
    #[arg(long)]
    pub check: bool,
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Server-rendered export of every record (the default without --ids)
    #[arg(long, conflicts_with = "ids")]
    pub server: bool,
    /// Export only these record ids
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub ids: Vec<i64>,
    /// Output file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ValuesArgs {
    #[arg(value_parser = parse_column)]
    pub column: Column,
    #[arg(short, long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Store a setting
    Set { key: String, value: String },
    /// Show one setting, or every effective setting
    Get { key: Option<String> },
    /// Remove a stored setting
    Unset { key: String },
}

/// Everything a command needs, built once in `main`.
pub struct App {
    pub db: Database,
    pub config: Config,
    pub session: Session,
    pub backend: Box<dyn RecordBackend>,
}

impl App {
    pub fn open(db: Database) -> Result<Self> {
        let config = Config::load(&db)?;
        let session = Session::load(&db)?;
        let backend = api::connect(&config, &session)?;
        Ok(Self {
            db,
            config,
            session,
            backend,
        })
    }

    /// Rebuild the backend after the session changed.
    pub fn reconnect(&mut self) -> Result<()> {
        self.backend = api::connect(&self.config, &self.session)?;
        Ok(())
    }

    pub fn backend(&self) -> &dyn RecordBackend {
        self.backend.as_ref()
    }
}

pub fn parse_column(s: &str) -> Result<Column, String> {
    Column::parse(s).ok_or_else(|| {
        let known: Vec<&str> = Column::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown column '{}' (expected one of: {})", s, known.join(", "))
    })
}

/// Parse `column=value`. The value may be empty or contain `=`.
pub fn parse_assignment(s: &str) -> Result<(Column, String), String> {
    let (column, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COL=VALUE, got '{}'", s))?;
    Ok((parse_column(column)?, value.trim().to_string()))
}

/// Page size from a flag, else the configured default.
pub(crate) fn effective_limit(flag: Option<u32>, config: &Config) -> Result<u32> {
    let limit = flag.unwrap_or(config.page_size);
    if limit == 0 || limit > crate::config::MAX_PAGE_SIZE {
        return Err(anyhow!(
            "limit must be between 1 and {}",
            crate::config::MAX_PAGE_SIZE
        ));
    }
    Ok(limit)
}

/// An app on the demo backend with a fresh in-memory store, optionally
/// logged in with `role`.
#[cfg(test)]
pub(crate) fn test_app(role: Option<crate::models::Role>) -> App {
    use crate::config::BackendKind;
    use crate::models::{LoginResponse, User};

    let db = Database::open_memory().unwrap();
    let session = match role {
        Some(rol) => Session::establish(
            &db,
            LoginResponse {
                access_token: "tok-test".into(),
                token_type: "bearer".into(),
                user: User {
                    id: 1,
                    username: "ana".into(),
                    rol,
                    foto: None,
                },
            },
        )
        .unwrap(),
        None => Session::default(),
    };
    App {
        db,
        config: Config {
            backend: BackendKind::Demo,
            ..Config::default()
        },
        session,
        backend: Box::new(api::MemoryBackend::with_demo_data()),
    }
}
