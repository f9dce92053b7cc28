//! CSV export of records.

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::{Column, Registro};

/// File name for a server export taken on `date`.
pub fn default_export_file_name(date: NaiveDate) -> String {
    format!("registros_{}.csv", date.format("%Y-%m-%d"))
}

/// Render records with every column, rows joined by `\n`. The header line is
/// bare column names; every data value is quoted.
pub fn records_to_csv(records: &[Registro]) -> Result<String> {
    let header: Vec<&str> = Column::ALL.iter().map(|c| c.as_str()).collect();
    let mut text = header.join(",");
    if records.is_empty() {
        return Ok(text);
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for record in records {
        writer.write_record(Column::ALL.iter().map(|c| record.field(*c)))?;
    }

    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
    text.push('\n');
    text.push_str(&String::from_utf8(bytes)?);
    // No terminator after the last row.
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistroInput;

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(default_export_file_name(date), "registros_2024-03-09.csv");
    }

    #[test]
    fn data_values_quoted_and_inner_quotes_doubled() {
        let record = Registro::from_input(
            1,
            RegistroInput {
                numero_inspector: 5,
                nombre: "ins05 \"Norte\"".into(),
                ..Default::default()
            },
        );
        let csv = records_to_csv(&[record]).unwrap();
        let lines: Vec<&str> = csv.split('\n').collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("numero_inspector,uuid,nombre,"));
        assert!(!lines[0].contains('"'));
        assert!(lines[1].starts_with("\"5\",\"\",\"ins05 \"\"Norte\"\"\","));
    }

    #[test]
    fn empty_selection_is_header_only() {
        let csv = records_to_csv(&[]).unwrap();
        assert!(!csv.contains('\n'));
        assert!(csv.starts_with("numero_inspector,"));
        assert!(csv.ends_with(",mac_sn"));
    }
}
