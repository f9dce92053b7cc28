//! Bulk CSV import.
//!
//! A file goes through the shape gate, parsing, the duplicate check and the
//! per-row checks, in that order. Only a file that passes all of them is sent
//! to the backend, unmodified. Nothing is uploaded otherwise.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::api::{ApiResult, RecordBackend, UploadSummary};

mod progress;
mod validate;

pub use progress::{ProgressTicker, TICK_INTERVAL};
pub use validate::{
    check_file_shape, find_duplicates, validate_rows, COL_CELULAR, COL_CORREO, COL_NOMBRE,
    COL_NUMERO, MAX_FILE_SIZE,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Solo se permiten archivos CSV.")]
    NotCsv,

    #[error("El archivo es demasiado grande. Máximo 10MB.")]
    TooLarge,

    #[error("Error al leer el archivo CSV. Verifica el formato.")]
    Parse(#[source] csv::Error),

    #[error(
        "No se permite cargar el archivo porque hay valores duplicados en la columna '{column}': {}",
        values.join(", ")
    )]
    Duplicates { column: String, values: Vec<String> },

    #[error("Errores de validación:\n{}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),

    #[error("No se pudo leer el archivo")]
    Io(#[from] std::io::Error),
}

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub row: usize,
    pub column: String,
    pub value: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(row: usize, column: &str, value: &str, message: &str) -> Self {
        Self {
            row,
            column: column.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fila {} - {}: {} ({})",
            self.row, self.column, self.value, self.message
        )
    }
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ValidationIssue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A parsed CSV row: header -> raw value, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    fields: Vec<(String, String)>,
}

impl ImportRow {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            fields: pairs.into_iter().collect(),
        }
    }

    /// Raw value under `header`, if the file has that column.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

/// A file that passed every check, ready to upload.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// Parse CSV bytes with a header row. Blank lines are skipped; a row whose
/// field count differs from the header is an error.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<ImportRow>, ImportError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(ImportError::Parse)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(ImportError::Parse)?;
        rows.push(ImportRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string())),
        ));
    }
    Ok(rows)
}

/// Run every check on file contents already in memory.
pub fn validate_bytes(file_name: &str, bytes: Vec<u8>) -> Result<ValidatedFile, ImportError> {
    check_file_shape(Path::new(file_name), bytes.len() as u64)?;

    let rows = parse_rows(&bytes)?;
    debug!(file = file_name, rows = rows.len(), "parsed import file");

    let duplicates = find_duplicates(&rows, COL_NUMERO);
    if !duplicates.is_empty() {
        return Err(ImportError::Duplicates {
            column: COL_NUMERO.to_string(),
            values: duplicates,
        });
    }

    let issues = validate_rows(&rows);
    if !issues.is_empty() {
        return Err(ImportError::Validation(issues));
    }

    Ok(ValidatedFile {
        file_name: file_name.to_string(),
        rows: rows.len(),
        bytes,
    })
}

/// Check shape from metadata, then read and validate the file.
pub fn validate_file(path: &Path) -> Result<ValidatedFile, ImportError> {
    let size = fs::metadata(path)?.len();
    check_file_shape(path, size)?;

    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "registros.csv".to_string());
    validate_bytes(&file_name, bytes)
}

/// Send a validated file, reporting simulated progress while in flight.
pub fn upload<F>(
    backend: &dyn RecordBackend,
    file: &ValidatedFile,
    on_progress: F,
) -> ApiResult<UploadSummary>
where
    F: FnMut(u8) + Send + 'static,
{
    let ticker = ProgressTicker::start(on_progress);
    let result = backend.upload_csv(&file.file_name, &file.bytes);
    ticker.finish();

    if let Ok(ref summary) = result {
        info!(file = %file.file_name, created = summary.registros_creados, "upload accepted");
    }
    result
}

pub fn success_message(summary: &UploadSummary) -> String {
    format!(
        "Archivo subido exitosamente. {} registros procesados.",
        summary.registros_creados
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::RecordingBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const VALID: &str = "Número de inspector,Nombre,Celular,Correo,Status\n\
                         1,ins01 Nodo,3001234567,a@b.co,activo\n\
                         \n\
                         22,ins22 Hub,,,activo\n\
                         333,Equipo ins333,3109876543,x.y@z.org,inactivo\n";

    #[test]
    fn parse_skips_blank_lines() {
        let rows = parse_rows(VALID.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].get(COL_NUMERO), Some("22"));
        assert_eq!(rows[1].get("Columna"), None);
    }

    #[test]
    fn parse_strips_bom_from_first_header() {
        let text = format!("\u{feff}{}", VALID);
        let rows = parse_rows(text.as_bytes()).unwrap();
        assert_eq!(rows[0].get(COL_NUMERO), Some("1"));
    }

    #[test]
    fn ragged_rows_are_parse_errors() {
        let err = parse_rows(b"a,b\n1,2,3\n").unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
        assert_eq!(err.to_string(), "Error al leer el archivo CSV. Verifica el formato.");
    }

    #[test]
    fn txt_file_is_rejected_before_parsing() {
        let err = validate_bytes("datos.txt", VALID.as_bytes().to_vec()).unwrap_err();
        assert!(matches!(err, ImportError::NotCsv));
    }

    #[test]
    fn duplicate_message_lists_each_value() {
        let csv = "Número de inspector,Nombre\n4,ins04\n9,ins09\n4,ins04\n9,ins09\n4,ins04\n";
        let err = validate_bytes("a.csv", csv.as_bytes().to_vec()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No se permite cargar el archivo porque hay valores duplicados en la columna \
             'Número de inspector': 4, 9"
        );
    }

    #[test]
    fn validation_message_has_one_line_per_issue() {
        let csv = "Número de inspector,Nombre,Celular\n5,Nodo,123\n";
        let err = validate_bytes("a.csv", csv.as_bytes().to_vec()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Errores de validación:\n\
             Fila 2 - Celular: 123 (Debe ser numérico de 10 dígitos)\n\
             Fila 2 - Nombre: Nodo (Debe contener 'ins5' o 'ins05')"
        );
    }

    #[test]
    fn validating_twice_gives_same_verdict() {
        let csv = "Número de inspector,Nombre,Correo\n5,Nodo,x\n6,ins06,y@z.co\n";
        let first = validate_bytes("a.csv", csv.as_bytes().to_vec()).unwrap_err();
        let second = validate_bytes("a.csv", csv.as_bytes().to_vec()).unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn validate_file_reads_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let validated = validate_file(file.path()).unwrap();
        assert_eq!(validated.rows, 3);
        assert_eq!(validated.bytes, VALID.as_bytes());
    }

    #[test]
    fn validate_file_checks_extension_first() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not,csv\n").unwrap();
        assert!(matches!(validate_file(file.path()), Err(ImportError::NotCsv)));
    }

    #[test]
    fn invalid_file_is_never_uploaded() {
        let backend = RecordingBackend::new();
        let csv = "Número de inspector,Nombre\n1,ins01\n1,ins01\n";
        assert!(validate_bytes("a.csv", csv.as_bytes().to_vec()).is_err());
        assert_eq!(backend.calls("upload_csv"), 0);
    }

    #[test]
    fn valid_file_uploads_once_with_original_bytes() {
        let backend = RecordingBackend::new();
        let file = validate_bytes("carga.csv", VALID.as_bytes().to_vec()).unwrap();

        let summary = upload(&backend, &file, |_| {}).unwrap();
        assert_eq!(backend.calls("upload_csv"), 1);
        assert_eq!(backend.last_upload().unwrap(), ("carga.csv".to_string(), VALID.as_bytes().to_vec()));
        assert!(success_message(&summary).contains('3'));
    }
}
