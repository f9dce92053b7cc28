use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{ImportError, ImportRow, ValidationIssue};

pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const COL_NUMERO: &str = "Número de inspector";
pub const COL_CELULAR: &str = "Celular";
pub const COL_CORREO: &str = "Correo";
pub const COL_NOMBRE: &str = "Nombre";

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("numeric regex"));
static CELULAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("celular regex"));
static CORREO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+@[A-Za-z0-9_.-]+\.[A-Za-z0-9_]+$").expect("correo regex"));

/// Extension and size gate, checked before reading the contents.
pub fn check_file_shape(path: &Path, size: u64) -> Result<(), ImportError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return Err(ImportError::NotCsv);
    }
    if size > MAX_FILE_SIZE {
        return Err(ImportError::TooLarge);
    }
    Ok(())
}

/// Every value of `column` seen more than once, in first-seen order.
pub fn find_duplicates(rows: &[ImportRow], column: &str) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for value in rows.iter().filter_map(|r| r.get(column)) {
        if value.is_empty() {
            continue;
        }
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    order
        .into_iter()
        .filter(|v| counts.get(v).copied().unwrap_or(0) > 1)
        .map(str::to_string)
        .collect()
}

/// Format and naming checks over rows that carry an inspector number.
///
/// Row numbers are the position in that scoped list plus 2 (header line).
/// Format issues for every row come before naming issues.
pub fn validate_rows(rows: &[ImportRow]) -> Vec<ValidationIssue> {
    let scoped: Vec<&ImportRow> = rows
        .iter()
        .filter(|r| r.get(COL_NUMERO).map(|v| !v.is_empty()).unwrap_or(false))
        .collect();

    let mut issues = Vec::new();

    for (idx, row) in scoped.iter().enumerate() {
        let fila = idx + 2;
        let checks: [(&str, &Regex, &str); 3] = [
            (COL_NUMERO, &*NUMERIC, "Debe ser numérico"),
            (COL_CELULAR, &*CELULAR, "Debe ser numérico de 10 dígitos"),
            (COL_CORREO, &*CORREO, "Debe ser un correo válido"),
        ];
        for (column, re, message) in checks {
            let value = row.get(column).map(str::trim).unwrap_or("");
            if !value.is_empty() && !re.is_match(value) {
                issues.push(ValidationIssue::new(fila, column, value, message));
            }
        }
    }

    for (idx, row) in scoped.iter().enumerate() {
        let fila = idx + 2;
        let numero = row.get(COL_NUMERO).map(str::trim).unwrap_or("");
        if !NUMERIC.is_match(numero) {
            continue;
        }
        let nombre = row.get(COL_NOMBRE).map(str::trim).unwrap_or("");
        if let Some(message) = naming_violation(numero, nombre) {
            issues.push(ValidationIssue::new(fila, COL_NOMBRE, nombre, &message));
        }
    }

    issues
}

/// The name must embed `ins{N}`, or `ins0{N}` for a single-digit N.
fn naming_violation(numero: &str, nombre: &str) -> Option<String> {
    let expected = format!("ins{}", numero);
    if numero.len() == 1 {
        let padded = format!("ins0{}", numero);
        if nombre.contains(&expected) || nombre.contains(&padded) {
            return None;
        }
        return Some(format!("Debe contener '{}' o '{}'", expected, padded));
    }
    if nombre.contains(&expected) {
        None
    } else {
        Some(format!("Debe contener '{}'", expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> ImportRow {
        ImportRow::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    fn numbered(numero: &str, nombre: &str) -> ImportRow {
        row(&[(COL_NUMERO, numero), (COL_NOMBRE, nombre)])
    }

    #[test]
    fn rejects_non_csv_extension() {
        let err = check_file_shape(Path::new("datos.txt"), 10).unwrap_err();
        assert!(matches!(err, ImportError::NotCsv));
        assert_eq!(err.to_string(), "Solo se permiten archivos CSV.");
        assert!(check_file_shape(Path::new("DATOS.CSV"), 10).is_ok());
    }

    #[test]
    fn rejects_oversized_file() {
        let err = check_file_shape(Path::new("a.csv"), MAX_FILE_SIZE + 1).unwrap_err();
        assert_eq!(err.to_string(), "El archivo es demasiado grande. Máximo 10MB.");
        assert!(check_file_shape(Path::new("a.csv"), MAX_FILE_SIZE).is_ok());
    }

    #[test]
    fn duplicates_listed_once_each() {
        let rows = vec![
            numbered("5", "ins05"),
            numbered("7", "ins07"),
            numbered("5", "ins05"),
            numbered("7", "ins07"),
            numbered("5", "ins05"),
            numbered("", ""),
            numbered("", ""),
        ];
        assert_eq!(find_duplicates(&rows, COL_NUMERO), vec!["5", "7"]);
    }

    #[test]
    fn celular_must_be_ten_digits() {
        let rows = vec![
            row(&[(COL_NUMERO, "10"), (COL_NOMBRE, "ins10"), (COL_CELULAR, "123")]),
            row(&[(COL_NUMERO, "11"), (COL_NOMBRE, "ins11"), (COL_CELULAR, "12345678901")]),
            row(&[(COL_NUMERO, "12"), (COL_NOMBRE, "ins12"), (COL_CELULAR, "3001234567")]),
        ];
        let issues = validate_rows(&rows);
        assert_eq!(issues.len(), 2);
        assert_eq!((issues[0].row, issues[0].value.as_str()), (2, "123"));
        assert_eq!((issues[1].row, issues[1].value.as_str()), (3, "12345678901"));
        assert!(issues.iter().all(|i| i.message == "Debe ser numérico de 10 dígitos"));
    }

    #[test]
    fn correo_shape() {
        let rows = vec![
            row(&[(COL_NUMERO, "10"), (COL_NOMBRE, "ins10"), (COL_CORREO, "a.b@c.co")]),
            row(&[(COL_NUMERO, "11"), (COL_NOMBRE, "ins11"), (COL_CORREO, "sin-arroba.com")]),
        ];
        let issues = validate_rows(&rows);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, COL_CORREO);
        assert_eq!(issues[0].row, 3);
    }

    #[test]
    fn correo_word_characters_are_ascii_only() {
        let rows = vec![row(&[
            (COL_NUMERO, "10"),
            (COL_NOMBRE, "ins10"),
            (COL_CORREO, "josé@compañía.co"),
        ])];
        let issues = validate_rows(&rows);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, COL_CORREO);
        assert_eq!(issues[0].message, "Debe ser un correo válido");
    }

    #[test]
    fn naming_rule_single_digit_accepts_padding() {
        assert!(validate_rows(&[numbered("5", "ins5 Nodo")]).is_empty());
        assert!(validate_rows(&[numbered("5", "ins05 Nodo")]).is_empty());

        let issues = validate_rows(&[numbered("5", "Nodo")]);
        assert_eq!(issues[0].message, "Debe contener 'ins5' o 'ins05'");
    }

    #[test]
    fn naming_rule_multi_digit_has_no_padding() {
        assert!(validate_rows(&[numbered("12", "ins12 Nodo")]).is_empty());

        let issues = validate_rows(&[numbered("12", "ins012 Nodo")]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Debe contener 'ins12'");
    }

    #[test]
    fn non_numeric_inspector_skips_naming_check() {
        let issues = validate_rows(&[numbered("1a", "Nodo")]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Debe ser numérico");
    }

    #[test]
    fn rows_without_inspector_are_out_of_scope() {
        let rows = vec![
            row(&[(COL_NOMBRE, "x"), (COL_CELULAR, "1")]),
            numbered("", "y"),
            row(&[(COL_NUMERO, "20"), (COL_NOMBRE, "z")]),
        ];
        let issues = validate_rows(&rows);
        // Only the third row is validated, and it is the first scoped row.
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].row, 2);
    }

    #[test]
    fn format_issues_precede_naming_issues() {
        let rows = vec![
            row(&[(COL_NUMERO, "30"), (COL_NOMBRE, "bad")]),
            row(&[(COL_NUMERO, "31"), (COL_NOMBRE, "ins31"), (COL_CELULAR, "9")]),
        ];
        let issues = validate_rows(&rows);
        assert_eq!(issues[0].column, COL_CELULAR);
        assert_eq!(issues[1].column, COL_NOMBRE);
    }

    #[test]
    fn validation_is_idempotent() {
        let rows = vec![
            row(&[(COL_NUMERO, "7"), (COL_NOMBRE, "Nodo"), (COL_CORREO, "x")]),
            numbered("x", "y"),
        ];
        assert_eq!(validate_rows(&rows), validate_rows(&rows));
    }
}
