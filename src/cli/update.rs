use anyhow::Result;

use super::ui::{prompt_field, status, FormResult};
use super::{App, EditArgs};
use crate::models::{Column, Registro, RegistroUpdate};

pub fn run_edit(app: &App, args: EditArgs) -> Result<()> {
    app.session.require_admin()?;
    let record = app.backend().get(args.id)?;

    let pairs = if args.set.is_empty() {
        println!("{}  #{}\n", record.nombre, record.id);
        match prompt_changes(&record)? {
            Some(pairs) => pairs,
            None => {
                status("Cancelled.");
                return Ok(());
            }
        }
    } else {
        args.set
    };

    let changes = changes_for(&record, &pairs)?;
    if changes.is_empty() {
        status("No changes.");
        return Ok(());
    }
    app.backend().update(record.id, &changes)?;
    status("Saved.");
    Ok(())
}

/// Only values that differ from the record are sent.
pub(crate) fn changes_for(record: &Registro, pairs: &[(Column, String)]) -> Result<RegistroUpdate> {
    let mut changes = RegistroUpdate::default();
    for (column, value) in pairs {
        if record.field(*column) == value.trim() {
            continue;
        }
        changes.set(*column, value)?;
    }
    Ok(changes)
}

fn prompt_changes(record: &Registro) -> Result<Option<Vec<(Column, String)>>> {
    let mut pairs = Vec::new();
    for column in Column::ALL {
        if column == Column::Uuid {
            continue;
        }
        let label = column.label().unwrap_or(column.as_str());
        let current = record.field(column);
        match prompt_field(label, Some(&current))? {
            FormResult::Value(v) => pairs.push((column, v)),
            FormResult::Cancelled => return Ok(None),
        }
    }
    Ok(Some(pairs))
}
