//! Record backends.
//!
//! [`RecordBackend`] is the seam between the commands and wherever the
//! records live: the REST API ([`HttpBackend`]) or the in-memory demo store
//! ([`MemoryBackend`]).

use serde::Deserialize;
use thiserror::Error;

use crate::config::{BackendKind, Config};
use crate::models::{
    Column, Credentials, HistorialItem, LoginResponse, Registro, RegistroInput, RegistroUpdate,
};
use crate::query::{FetchPlan, Filters, SortDirection};
use crate::session::Session;

mod http;
mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Sesión expirada o sin permisos. Inicia sesión de nuevo.")]
    Unauthorized,

    #[error("{detail}")]
    Http { status: u16, detail: String },

    #[error("Connection failed")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Http {
            status: 404,
            detail: format!("{} no encontrado", what),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::Http {
            status: 400,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Listing request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u64,
    pub sort_by: Option<Column>,
    pub sort_dir: SortDirection,
    pub filters: Filters,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: crate::config::DEFAULT_PAGE_SIZE,
            offset: 0,
            sort_by: None,
            sort_dir: SortDirection::Asc,
            filters: Filters::new(),
        }
    }
}

impl From<&FetchPlan> for ListQuery {
    fn from(plan: &FetchPlan) -> Self {
        Self {
            limit: plan.limit,
            offset: plan.offset,
            sort_by: plan.sort.map(|s| s.key),
            sort_dir: plan.sort.map(|s| s.direction).unwrap_or_default(),
            filters: plan.filters.clone(),
        }
    }
}

/// Result of a bulk CSV upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadSummary {
    #[serde(default, alias = "total_registros")]
    pub registros_creados: u64,
    #[serde(default)]
    pub mensaje: Option<String>,
}

pub trait RecordBackend {
    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse>;

    fn list(&self, query: &ListQuery) -> ApiResult<Vec<Registro>>;

    /// Total number of records matching `filters`.
    fn count(&self, filters: &Filters) -> ApiResult<u64>;

    fn get(&self, id: i64) -> ApiResult<Registro>;

    fn create(&self, input: &RegistroInput) -> ApiResult<Registro>;

    fn update(&self, id: i64, changes: &RegistroUpdate) -> ApiResult<Registro>;

    fn delete(&self, id: i64) -> ApiResult<()>;

    fn history(&self, numero_inspector: i64) -> ApiResult<Vec<HistorialItem>>;

    /// Distinct values of a column, optionally narrowed by substring.
    fn unique_values(&self, column: Column, search: Option<&str>) -> ApiResult<Vec<String>>;

    /// Send a validated CSV file as-is.
    fn upload_csv(&self, file_name: &str, bytes: &[u8]) -> ApiResult<UploadSummary>;

    /// Server-rendered CSV export of every record.
    fn export_csv(&self) -> ApiResult<Vec<u8>>;
}

/// Build the backend selected by configuration.
pub fn connect(config: &Config, session: &Session) -> anyhow::Result<Box<dyn RecordBackend>> {
    match config.backend {
        BackendKind::Http => {
            tracing::debug!(url = %config.api_url, "using HTTP backend");
            let backend = HttpBackend::new(&config.api_url, session.token().map(str::to_string))?;
            Ok(Box::new(backend))
        }
        BackendKind::Demo => {
            tracing::debug!("using in-memory demo backend");
            Ok(Box::new(MemoryBackend::with_demo_data()))
        }
    }
}
