use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use super::ui::status;
use super::{App, ExportArgs};
use crate::export::{default_export_file_name, records_to_csv};
use crate::models::Registro;

pub fn run_export(app: &App, args: ExportArgs) -> Result<()> {
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_export_file_name(Local::now().date_naive())));

    let (bytes, rows) = if args.ids.is_empty() {
        app.session.require_admin()?;
        let bytes = app.backend().export_csv()?;
        (bytes, None)
    } else {
        app.session.require_login()?;
        let records = fetch_records(app, &args.ids)?;
        (records_to_csv(&records)?.into_bytes(), Some(records.len()))
    };

    write_csv(&path, &bytes)?;
    match rows {
        Some(n) => status(&format!("Exported {} records to {}.", n, path.display())),
        None => status(&format!("Exported to {}.", path.display())),
    }
    Ok(())
}

fn fetch_records(app: &App, ids: &[i64]) -> Result<Vec<Registro>> {
    ids.iter()
        .map(|id| {
            app.backend()
                .get(*id)
                .with_context(|| format!("Could not load record #{}", id))
        })
        .collect()
}

pub fn write_csv(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("Could not write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_app;
    use crate::models::Role;
    use tempfile::TempDir;

    #[test]
    fn selected_ids_export_client_side() {
        let app = test_app(Some(Role::User));
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("sel.csv");
        run_export(
            &app,
            ExportArgs {
                server: false,
                ids: vec![2, 5],
                output: Some(out.clone()),
            },
        )
        .unwrap();

        let text = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("numero_inspector,"));
        assert!(lines[2].starts_with("\"1005\""));
    }

    #[test]
    fn server_export_needs_admin() {
        let app = test_app(Some(Role::User));
        let dir = TempDir::new().unwrap();
        let args = ExportArgs {
            server: true,
            ids: Vec::new(),
            output: Some(dir.path().join("all.csv")),
        };
        assert!(run_export(&app, args).is_err());
    }

    #[test]
    fn server_export_writes_backend_bytes() {
        let app = test_app(Some(Role::Admin));
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("all.csv");
        run_export(
            &app,
            ExportArgs {
                server: true,
                ids: Vec::new(),
                output: Some(out.clone()),
            },
        )
        .unwrap();
        assert_eq!(fs::read(&out).unwrap(), app.backend().export_csv().unwrap());
    }

    #[test]
    fn unknown_id_names_the_record() {
        let app = test_app(Some(Role::User));
        let err = fetch_records(&app, &[1, 77]).unwrap_err();
        assert!(err.to_string().contains("#77"));
    }
}
