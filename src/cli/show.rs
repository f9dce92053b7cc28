use anyhow::Result;

use super::display::{print_history, print_record};
use super::{App, HistoryArgs, ShowArgs};
use crate::models::HistorialItem;

pub fn run_show(app: &App, args: ShowArgs) -> Result<()> {
    app.session.require_login()?;
    show_record(app, args.id)
}

/// Print one record, with its history when the user may see it.
pub(crate) fn show_record(app: &App, id: i64) -> Result<()> {
    let record = app.backend().get(id)?;
    print_record(&record);

    if app.session.is_admin() {
        let items = history(app, record.numero_inspector)?;
        if !items.is_empty() {
            println!("\nHistory");
            print_history(&items);
        }
    }
    Ok(())
}

pub fn run_history(app: &App, args: HistoryArgs) -> Result<()> {
    app.session.require_admin()?;
    let items = history(app, args.numero_inspector)?;
    print_history(&items);
    Ok(())
}

fn history(app: &App, numero_inspector: i64) -> Result<Vec<HistorialItem>> {
    Ok(app
        .backend()
        .history(numero_inspector)?
        .into_iter()
        .map(|item| item.normalize(numero_inspector))
        .collect())
}
