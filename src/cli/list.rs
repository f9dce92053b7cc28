use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use super::display::{print_line, print_table, TableLayout};
use super::export::write_csv;
use super::show::show_record;
use super::ui::{clear_screen, confirm, error, status, visible_lines, RawModeGuard, StatusBar};
use super::{effective_limit, App, BrowseArgs, ListArgs};
use crate::api::ListQuery;
use crate::models::Column;
use crate::query::{
    build_combined_filters, page_offset, total_pages, FilterMode, QueryEvent, SortConfig,
    SortDirection,
};
use crate::table::TableSession;

/// Poll timeout when no debounce timer is pending.
const IDLE_POLL: Duration = Duration::from_secs(60);

pub fn run_list(app: &App, args: ListArgs) -> Result<()> {
    app.session.require_login()?;
    let limit = effective_limit(args.limit, &app.config)?;
    let query = list_query(&args, limit)?;

    let records = app.backend().list(&query)?;
    let total = app.backend().count(&query.filters)?;

    if total == 0 {
        println!("No records.");
        return Ok(());
    }

    let sort = query.sort_by.map(|key| SortConfig {
        key,
        direction: query.sort_dir,
    });
    print_table(&records, sort);
    println!(
        "\nPage {}/{}  ({} total)",
        args.page.max(1),
        total_pages(total, limit),
        total
    );
    Ok(())
}

/// Translate list flags into one listing request.
pub(crate) fn list_query(args: &ListArgs, limit: u32) -> Result<ListQuery> {
    let sort_dir = SortDirection::parse(&args.order)
        .ok_or_else(|| anyhow!("order must be 'asc' or 'desc', got '{}'", args.order))?;

    let column_filters: BTreeMap<Column, String> = args.filter.iter().cloned().collect();
    let mut modes = BTreeMap::new();
    for column in &args.exact {
        if !column_filters.contains_key(column) {
            bail!("--exact {} needs a --filter for that column", column);
        }
        modes.insert(*column, FilterMode::Exact);
    }

    let global_mode = if args.exact_search {
        FilterMode::Exact
    } else {
        FilterMode::Partial
    };
    let term = args.search.as_deref().unwrap_or("").trim();

    Ok(ListQuery {
        limit,
        offset: page_offset(args.page, limit),
        sort_by: args.sort,
        sort_dir,
        filters: build_combined_filters(&column_filters, &modes, term, global_mode),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Rows,
    ColumnInput(Column),
    GlobalInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Open(i64),
    DeleteSelected,
    ExportSelected,
}

/// Cursor, active column and input focus of the interactive table.
struct Browser {
    cursor: usize,
    active: usize,
    focus: Focus,
    flash: Option<String>,
}

impl Browser {
    fn new() -> Self {
        Self {
            cursor: 0,
            // Start on nombre, the most filtered column.
            active: 2,
            focus: Focus::Rows,
            flash: None,
        }
    }

    fn active_column(&self) -> Column {
        Column::ALL[self.active]
    }

    fn on_key(&mut self, table: &mut TableSession, key: KeyEvent, now: Instant) -> Result<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(Action::Quit);
        }
        let action = match self.focus {
            Focus::Rows => self.on_row_key(table, key.code, now)?,
            Focus::ColumnInput(column) => {
                self.on_column_key(table, column, key.code, now)?;
                Action::None
            }
            Focus::GlobalInput => {
                self.on_global_key(table, key.code, now)?;
                Action::None
            }
        };
        self.cursor = self.cursor.min(table.records().len().saturating_sub(1));
        Ok(action)
    }

    fn on_row_key(&mut self, table: &mut TableSession, code: KeyCode, now: Instant) -> Result<Action> {
        match code {
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < table.records().len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Left => {
                if table.page() > 1 {
                    table.handle(QueryEvent::Page(table.page() - 1), now)?;
                    self.cursor = 0;
                }
            }
            KeyCode::Right => {
                if u64::from(table.page()) < table.total_pages() {
                    table.handle(QueryEvent::Page(table.page() + 1), now)?;
                    self.cursor = 0;
                }
            }
            KeyCode::Char('[') => {
                self.active = (self.active + Column::ALL.len() - 1) % Column::ALL.len();
            }
            KeyCode::Char(']') => {
                self.active = (self.active + 1) % Column::ALL.len();
            }
            KeyCode::Char('f') => self.focus = Focus::ColumnInput(self.active_column()),
            KeyCode::Char('/') => self.focus = Focus::GlobalInput,
            KeyCode::Char('s') => {
                table.handle(QueryEvent::Sort(self.active_column()), now)?;
                self.cursor = 0;
            }
            KeyCode::Char(' ') => {
                if let Some(id) = table.records().get(self.cursor).map(|r| r.id) {
                    table.toggle(id);
                }
            }
            KeyCode::Char('a') => table.toggle_all(),
            KeyCode::Char('r') => table.refresh()?,
            KeyCode::Char('d') if table.selected_count() > 0 => return Ok(Action::DeleteSelected),
            KeyCode::Char('x') if table.selected_count() > 0 => return Ok(Action::ExportSelected),
            KeyCode::Enter => {
                if let Some(record) = table.records().get(self.cursor) {
                    return Ok(Action::Open(record.id));
                }
            }
            KeyCode::Esc | KeyCode::Char('q') => return Ok(Action::Quit),
            _ => {}
        }
        Ok(Action::None)
    }

    fn on_column_key(
        &mut self,
        table: &mut TableSession,
        column: Column,
        code: KeyCode,
        now: Instant,
    ) -> Result<()> {
        let event = match code {
            KeyCode::Char(c) => {
                let mut value = table.query().column_filter(column).to_string();
                value.push(c);
                QueryEvent::ColumnInput { column, value }
            }
            KeyCode::Backspace => {
                let mut value = table.query().column_filter(column).to_string();
                value.pop();
                QueryEvent::ColumnInput { column, value }
            }
            KeyCode::Enter => {
                self.focus = Focus::Rows;
                QueryEvent::ColumnEnter(column)
            }
            KeyCode::Esc => {
                self.focus = Focus::Rows;
                QueryEvent::ColumnEscape(column)
            }
            KeyCode::Tab => {
                self.focus = Focus::Rows;
                QueryEvent::ColumnBlur(column)
            }
            _ => return Ok(()),
        };
        table.handle(event, now)
    }

    fn on_global_key(&mut self, table: &mut TableSession, code: KeyCode, now: Instant) -> Result<()> {
        let event = match code {
            KeyCode::Char(c) => {
                let mut value = table.query().global_pending().to_string();
                value.push(c);
                QueryEvent::GlobalInput(value)
            }
            KeyCode::Backspace => {
                let mut value = table.query().global_pending().to_string();
                value.pop();
                QueryEvent::GlobalInput(value)
            }
            KeyCode::Enter => {
                self.focus = Focus::Rows;
                QueryEvent::GlobalEnter
            }
            KeyCode::Esc => {
                self.focus = Focus::Rows;
                QueryEvent::GlobalEscape
            }
            KeyCode::Tab => {
                self.focus = Focus::Rows;
                QueryEvent::GlobalBlur
            }
            _ => return Ok(()),
        };
        table.handle(event, now)
    }

    fn render(&self, table: &TableSession) -> Result<()> {
        clear_screen()?;
        let layout = TableLayout::current();
        let query = table.query();

        println!("{}", self.filter_line(table));
        println!("{}", layout.header(query.sort(), Some(self.active_column())));

        let visible = visible_lines();
        let scroll = self.cursor.saturating_sub(visible.saturating_sub(1));
        if table.records().is_empty() {
            println!("    No records.");
        }
        for (i, record) in table.records().iter().enumerate().skip(scroll).take(visible) {
            let line = layout.row(record, table.is_selected(record.id));
            print_line(&line, i == self.cursor && self.focus == Focus::Rows);
        }

        println!();
        if let Some(msg) = table.last_error() {
            println!("Error: {}", msg);
        }
        if let Some(msg) = &self.flash {
            println!("{}", msg);
        }

        let bar = match self.focus {
            Focus::Rows => StatusBar::new()
                .counter(u64::from(table.page()), table.total_pages().max(1))
                .action("↑/↓", "")
                .action("←/→", "page")
                .action("[/]", "column")
                .action("f", "ilter")
                .action("s", "ort")
                .action("/", "search")
                .action("space", "select")
                .action("a", "ll")
                .action("d", "elete")
                .action("x", "export")
                .action("q", "uit")
                .render(),
            Focus::ColumnInput(_) | Focus::GlobalInput => StatusBar::new()
                .action("enter", "exact")
                .action("tab", "partial")
                .action("esc", "clear")
                .render(),
        };
        println!("{}  {} total, {} selected", bar, table.total(), table.selected_count());
        Ok(())
    }

    /// Active filters, or the input line being edited.
    fn filter_line(&self, table: &TableSession) -> String {
        let query = table.query();
        match self.focus {
            Focus::ColumnInput(column) => {
                format!("{}: {}_", column.display_name(), query.column_filter(column))
            }
            Focus::GlobalInput => format!("search: {}_", query.global_pending()),
            Focus::Rows => {
                let mut parts: Vec<String> = Column::ALL
                    .iter()
                    .filter(|c| !query.column_filter(**c).is_empty())
                    .map(|c| {
                        let value = query.column_filter(*c);
                        match query.column_mode(*c) {
                            FilterMode::Exact => format!("{}=\"{}\"", c.display_name(), value),
                            FilterMode::Partial => format!("{}~{}", c.display_name(), value),
                        }
                    })
                    .collect();
                if !query.global_term().is_empty() {
                    let marker = match query.global_mode() {
                        FilterMode::Exact => "=",
                        FilterMode::Partial => "~",
                    };
                    parts.push(format!("search{}{}", marker, query.global_term()));
                }
                if parts.is_empty() {
                    "Registros".to_string()
                } else {
                    format!("Registros  {}", parts.join("  "))
                }
            }
        }
    }
}

pub fn run_browse(app: &App, args: BrowseArgs) -> Result<()> {
    app.session.require_login()?;
    let limit = effective_limit(args.limit, &app.config)?;
    let mut table = TableSession::open(app.backend(), &app.db, limit)?;
    let mut browser = Browser::new();

    loop {
        browser.render(&table)?;

        let timeout = table
            .next_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_POLL);

        let key = {
            let _guard = RawModeGuard::new()?;
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) => Some(key),
                    _ => None,
                }
            } else {
                None
            }
        };

        let now = Instant::now();
        let Some(key) = key else {
            table.tick(now)?;
            continue;
        };
        browser.flash = None;

        match browser.on_key(&mut table, key, now)? {
            Action::None => {}
            Action::Quit => break,
            Action::Open(id) => {
                clear_screen()?;
                show_record(app, id)?;
                println!("\n[any key] back");
                let _guard = RawModeGuard::new()?;
                let _ = event::read()?;
            }
            Action::DeleteSelected => {
                if !app.session.is_admin() {
                    browser.flash = Some("Deleting requires the admin role.".to_string());
                    continue;
                }
                let n = table.selected_count();
                if confirm(&format!("Delete {} record{}?", n, if n == 1 { "" } else { "s" }))? {
                    let report = table.delete_selected()?;
                    let mut msg = report.summary();
                    for (id, reason) in &report.failed {
                        msg.push_str(&format!("\n  #{}: {}", id, reason));
                    }
                    browser.flash = Some(msg);
                }
            }
            Action::ExportSelected => {
                let csv = table.export_selected()?;
                let path = std::path::PathBuf::from(crate::export::default_export_file_name(
                    chrono::Local::now().date_naive(),
                ));
                match write_csv(&path, csv.as_bytes()) {
                    Ok(()) => browser.flash = Some(format!("Exported to {}.", path.display())),
                    Err(e) => error(&e.to_string()),
                }
            }
        }
    }

    clear_screen()?;
    status(&format!("{} records.", table.total()));
    Ok(())
}
