use anyhow::{bail, Result};

use super::ui::{confirm, error, status};
use super::{App, DeleteArgs};
use crate::table::{delete_batch, BatchDeleteReport};

pub fn run_delete(app: &App, args: DeleteArgs) -> Result<()> {
    app.session.require_admin()?;

    let n = args.ids.len();
    if !args.force {
        let prompt = if n == 1 {
            format!("Delete record #{}?", args.ids[0])
        } else {
            format!("Delete {} records?", n)
        };
        if !confirm(&prompt)? {
            status("Cancelled.");
            return Ok(());
        }
    }

    let report = delete_batch(app.backend(), &args.ids)?;
    report_outcome(&report)
}

/// Print the summary; partial failure is an error so the exit code shows it.
fn report_outcome(report: &BatchDeleteReport) -> Result<()> {
    status(&report.summary());
    for (id, reason) in &report.failed {
        error(&format!("#{}: {}", id, reason));
    }
    if !report.is_complete() {
        bail!("{} of {} deletions failed", report.failed.len(), report.requested);
    }
    Ok(())
}
