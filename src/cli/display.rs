use std::io;

use crossterm::{
    style::{Attribute, SetAttribute},
    ExecutableCommand,
};

use super::ui::{cell, term_size, truncate};
use crate::models::{Column, HistorialItem, Registro};
use crate::query::{SortConfig, SortDirection};

/// Columns shown in the table for a given terminal width.
pub struct TableLayout {
    columns: Vec<(Column, usize)>,
}

impl TableLayout {
    pub fn for_width(width: usize) -> Self {
        let columns = if width >= 110 {
            vec![
                (Column::NumeroInspector, 8),
                (Column::Nombre, 24),
                (Column::Status, 9),
                (Column::Region, 8),
                (Column::Ciudad, 14),
                (Column::Tecnologia, 10),
                (Column::Encargado, 20),
            ]
        } else if width >= 80 {
            vec![
                (Column::NumeroInspector, 8),
                (Column::Nombre, 24),
                (Column::Status, 9),
                (Column::Ciudad, 14),
                (Column::Tecnologia, 10),
            ]
        } else {
            vec![
                (Column::NumeroInspector, 8),
                (Column::Nombre, width.saturating_sub(34).max(10)),
                (Column::Status, 9),
            ]
        };
        Self { columns }
    }

    pub fn current() -> Self {
        Self::for_width(term_size().0)
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().map(|(c, _)| *c)
    }

    /// Header row. The sorted column carries an arrow, the active one is
    /// bracketed.
    pub fn header(&self, sort: Option<SortConfig>, active: Option<Column>) -> String {
        let cells: Vec<String> = self
            .columns
            .iter()
            .map(|(column, width)| {
                let mut name = column.display_name().to_uppercase();
                if let Some(s) = sort.filter(|s| s.key == *column) {
                    name.push_str(match s.direction {
                        SortDirection::Asc => " ↑",
                        SortDirection::Desc => " ↓",
                    });
                }
                if active == Some(*column) {
                    name = format!("[{}]", name);
                }
                cell(&name, *width)
            })
            .collect();
        format!("    {}", cells.join("  ").trim_end())
    }

    pub fn row(&self, record: &Registro, checked: bool) -> String {
        let cells: Vec<String> = self
            .columns
            .iter()
            .map(|(column, width)| cell(&record.field(*column), *width))
            .collect();
        let mark = if checked { "[x] " } else { "[ ] " };
        format!("{}{}", mark, cells.join("  ").trim_end())
    }
}

/// Print a line, in reverse video when highlighted.
pub fn print_line(line: &str, highlighted: bool) {
    if highlighted {
        let mut stdout = io::stdout();
        let _ = stdout.execute(SetAttribute(Attribute::Reverse));
        print!("{}", line);
        let _ = stdout.execute(SetAttribute(Attribute::Reset));
        println!();
    } else {
        println!("{}", line);
    }
}

/// Non-interactive table.
pub fn print_table(records: &[Registro], sort: Option<SortConfig>) {
    let layout = TableLayout::current();
    println!("{}", layout.header(sort, None));
    for record in records {
        println!("{}", layout.row(record, false));
    }
}

/// Full record, non-empty fields only.
pub fn print_record(record: &Registro) {
    let title = if record.nombre.is_empty() {
        "(sin nombre)"
    } else {
        record.nombre.as_str()
    };
    println!("{}  #{}\n", title, record.id);

    let width = Column::ALL
        .iter()
        .map(|c| c.display_name().chars().count())
        .max()
        .unwrap_or(0);
    for column in Column::ALL {
        if column == Column::Nombre {
            continue;
        }
        let value = record.field(column);
        if value.is_empty() {
            continue;
        }
        println!("  {:<width$}  {}", column.display_name(), value, width = width);
    }
}

/// One history entry per line, newest first as received.
pub fn history_line(item: &HistorialItem) -> String {
    let mut line = format!("{}  {}", item.fecha, item.descripcion);
    if let Some(campo) = item.campo.as_deref().filter(|c| !c.is_empty()) {
        let old = item.valor_anterior.as_deref().unwrap_or("");
        let new = item.valor_nuevo.as_deref().unwrap_or("");
        line.push_str(&format!(
            "  {}: {} → {}",
            campo,
            truncate(old, 30),
            truncate(new, 30)
        ));
    }
    line.push_str(&format!("  ({})", item.autor));
    line
}

pub fn print_history(items: &[HistorialItem]) {
    if items.is_empty() {
        println!("No history.");
        return;
    }
    for item in items {
        println!("{}", history_line(item));
    }
}
