use anyhow::Result;

use super::{App, ValuesArgs};

pub fn run_values(app: &App, args: ValuesArgs) -> Result<()> {
    app.session.require_login()?;
    let search = args.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let values = app.backend().unique_values(args.column, search)?;

    if values.is_empty() {
        println!("No values.");
        return Ok(());
    }
    for value in &values {
        println!("{}", value);
    }
    Ok(())
}
