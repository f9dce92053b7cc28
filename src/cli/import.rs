use std::io::Write;
use std::path::Path;

use anyhow::Result;
use rfd::FileDialog;

use super::ui::{confirm, status};
use super::{App, ImportArgs};
use crate::api::UploadSummary;
use crate::import::{self, ValidatedFile};

/// Opens a native file picker dialog to select a CSV file.
/// Returns `None` if the user cancels the dialog.
pub fn pick_csv_file() -> Option<String> {
    FileDialog::new()
        .add_filter("CSV files", &["csv"])
        .set_title("Select CSV file to upload")
        .pick_file()
        .map(|p| p.to_string_lossy().to_string())
}

pub fn run_import(app: &App, args: ImportArgs) -> Result<()> {
    if !args.check {
        app.session.require_admin()?;
    }

    let path = match args.file.or_else(pick_csv_file) {
        Some(p) => p,
        None => {
            status("Cancelled.");
            return Ok(());
        }
    };

    let file = import::validate_file(Path::new(&path))?;
    status(&format!("{}: {} rows, no errors.", file.file_name, file.rows));
    if args.check {
        return Ok(());
    }

    if !args.yes
        && !confirm(&format!(
            "Replace all records with the {} rows in {}?",
            file.rows,
            file.file_name
        ))?
    {
        status("Cancelled.");
        return Ok(());
    }

    let summary = upload_with_progress(app, &file)?;
    status(&import::success_message(&summary));
    Ok(())
}

/// Upload, drawing the progress percentage on one stderr line.
fn upload_with_progress(app: &App, file: &ValidatedFile) -> Result<UploadSummary> {
    let result = import::upload(app.backend(), file, |pct| {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\rUploading... {:>3}%", pct);
        let _ = stderr.flush();
    });
    eprintln!();
    Ok(result?)
}
