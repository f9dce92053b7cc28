use anyhow::{bail, Result};

use super::ui::{prompt_field, status, FormResult};
use super::{AddArgs, App};
use crate::models::{Column, Registro, RegistroInput};

pub fn run_add(app: &App, args: AddArgs) -> Result<()> {
    app.session.require_admin()?;

    let pairs = if args.set.is_empty() {
        match prompt_new_record()? {
            Some(pairs) => pairs,
            None => {
                status("Cancelled.");
                return Ok(());
            }
        }
    } else {
        args.set
    };

    let created = add_record(app, &pairs)?;
    status(&format!("Created #{} ({}).", created.id, created.nombre));
    Ok(())
}

/// Build the creation input and send it.
pub(crate) fn add_record(app: &App, pairs: &[(Column, String)]) -> Result<Registro> {
    let input = build_input(pairs)?;
    Ok(app.backend().create(&input)?)
}

pub(crate) fn build_input(pairs: &[(Column, String)]) -> Result<RegistroInput> {
    let mut input = RegistroInput::default();
    let mut has_numero = false;
    for (column, value) in pairs {
        input.set(*column, value)?;
        if *column == Column::NumeroInspector {
            has_numero = true;
        }
    }
    if !has_numero {
        bail!("numero_inspector is required.");
    }
    if input.nombre.is_empty() {
        bail!("nombre is required.");
    }
    Ok(input)
}

fn prompt_new_record() -> Result<Option<Vec<(Column, String)>>> {
    let mut pairs = Vec::new();
    for column in Column::ALL {
        if column == Column::Uuid {
            continue;
        }
        let label = column.label().unwrap_or(column.as_str());
        match prompt_field(label, None)? {
            FormResult::Value(v) if !v.is_empty() => pairs.push((column, v)),
            FormResult::Value(_) => {}
            FormResult::Cancelled => return Ok(None),
        }
    }
    Ok(Some(pairs))
}
