use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::trace;

use super::{
    build_combined_filters, page_offset, Debouncer, FilterMode, Filters, SortConfig,
};
use crate::models::Column;

/// Quiet period before a column filter change fetches.
pub const COLUMN_DEBOUNCE: Duration = Duration::from_millis(400);
/// Quiet period before typed global search text becomes authoritative.
pub const GLOBAL_DEBOUNCE: Duration = Duration::from_millis(1000);

/// User input that can change the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    ColumnInput { column: Column, value: String },
    ColumnEnter(Column),
    ColumnEscape(Column),
    ColumnBlur(Column),
    GlobalInput(String),
    GlobalEnter,
    GlobalEscape,
    GlobalBlur,
    Sort(Column),
    Page(u32),
}

/// One snapshot of the query, ready to be sent.
///
/// The page request and the total-count request of a plan share the same
/// `filters`, so the total always describes the page it is shown with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub generation: u64,
    pub page: u32,
    pub limit: u32,
    pub offset: u64,
    pub sort: Option<SortConfig>,
    pub filters: Filters,
}

/// Outcome of handling one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub fetch: Option<FetchPlan>,
    pub clears_selection: bool,
    pub sort_changed: bool,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct QueryState {
    column_filters: BTreeMap<Column, String>,
    filter_mode: BTreeMap<Column, FilterMode>,
    global_term: String,
    global_pending: String,
    global_mode: FilterMode,
    sort: Option<SortConfig>,
    page: u32,
    limit: u32,
    column_timer: Debouncer,
    global_timer: Debouncer,
    generation: u64,
}

impl QueryState {
    pub fn new(limit: u32) -> Self {
        Self {
            column_filters: BTreeMap::new(),
            filter_mode: BTreeMap::new(),
            global_term: String::new(),
            global_pending: String::new(),
            global_mode: FilterMode::Partial,
            sort: None,
            page: 1,
            limit: limit.max(1),
            column_timer: Debouncer::new(COLUMN_DEBOUNCE),
            global_timer: Debouncer::new(GLOBAL_DEBOUNCE),
            generation: 0,
        }
    }

    pub fn with_sort(mut self, sort: Option<SortConfig>) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn sort(&self) -> Option<SortConfig> {
        self.sort
    }

    pub fn column_filter(&self, column: Column) -> &str {
        self.column_filters.get(&column).map(String::as_str).unwrap_or("")
    }

    pub fn column_mode(&self, column: Column) -> FilterMode {
        self.filter_mode.get(&column).copied().unwrap_or_default()
    }

    pub fn global_term(&self) -> &str {
        &self.global_term
    }

    /// Typed global text, committed or not.
    pub fn global_pending(&self) -> &str {
        &self.global_pending
    }

    pub fn global_mode(&self) -> FilterMode {
        self.global_mode
    }

    pub fn any_exact_column(&self) -> bool {
        self.filter_mode.values().any(|m| *m == FilterMode::Exact)
    }

    /// The filter map the next fetch would send.
    pub fn combined_filters(&self) -> Filters {
        build_combined_filters(
            &self.column_filters,
            &self.filter_mode,
            &self.global_term,
            self.global_mode,
        )
    }

    /// Earliest pending debounce deadline, for event-loop poll timeouts.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.column_timer.deadline(), self.global_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Snapshot the current state into a new plan.
    ///
    /// Any pending column-filter timer is dropped: its change is part of
    /// this snapshot.
    pub fn plan(&mut self) -> FetchPlan {
        self.column_timer.cancel();
        self.generation += 1;
        FetchPlan {
            generation: self.generation,
            page: self.page,
            limit: self.limit,
            offset: page_offset(self.page, self.limit),
            sort: self.sort,
            filters: self.combined_filters(),
        }
    }

    pub fn handle(&mut self, event: QueryEvent, now: Instant) -> Transition {
        trace!(?event, "query event");
        match event {
            QueryEvent::ColumnInput { column, value } => {
                self.column_filters.insert(column, value);
                self.filter_mode.insert(column, FilterMode::Partial);
                if self.any_exact_column() {
                    self.fetch_now()
                } else {
                    self.column_timer.schedule(now);
                    Transition::none()
                }
            }
            QueryEvent::ColumnEnter(column) => {
                self.filter_mode.insert(column, FilterMode::Exact);
                self.fetch_now()
            }
            QueryEvent::ColumnEscape(column) => {
                self.column_filters.insert(column, String::new());
                self.filter_mode.insert(column, FilterMode::Partial);
                self.fetch_now()
            }
            QueryEvent::ColumnBlur(column) => {
                let previous = self.filter_mode.insert(column, FilterMode::Exact);
                if previous == Some(FilterMode::Exact) && !self.column_timer.is_pending() {
                    Transition::none()
                } else {
                    self.fetch_now()
                }
            }
            QueryEvent::GlobalInput(value) => {
                self.global_pending = value;
                self.global_mode = FilterMode::Partial;
                self.global_timer.schedule(now);
                Transition::none()
            }
            QueryEvent::GlobalEnter => {
                self.global_timer.cancel();
                self.global_term = self.global_pending.clone();
                self.global_mode = FilterMode::Exact;
                self.fetch_now()
            }
            QueryEvent::GlobalEscape => {
                self.global_timer.cancel();
                self.global_term.clear();
                self.global_pending.clear();
                self.global_mode = FilterMode::Partial;
                self.page = 1;
                self.fetch_now()
            }
            QueryEvent::GlobalBlur => {
                self.global_timer.cancel();
                let unchanged = self.global_term == self.global_pending
                    && self.global_mode == FilterMode::Exact;
                self.global_term = self.global_pending.clone();
                self.global_mode = FilterMode::Exact;
                if unchanged {
                    Transition::none()
                } else {
                    self.fetch_now()
                }
            }
            QueryEvent::Sort(column) => {
                self.sort = Some(SortConfig::clicked(self.sort, column));
                self.page = 1;
                Transition {
                    fetch: Some(self.plan()),
                    clears_selection: true,
                    sort_changed: true,
                }
            }
            QueryEvent::Page(page) => {
                self.page = page.max(1);
                Transition {
                    fetch: Some(self.plan()),
                    clears_selection: true,
                    sort_changed: false,
                }
            }
        }
    }

    /// Fire due debounce timers. Returns at most one plan even when both
    /// timers are due.
    pub fn poll(&mut self, now: Instant) -> Option<FetchPlan> {
        let mut due = false;

        if self.global_timer.fire(now) && self.global_term != self.global_pending {
            trace!(term = %self.global_pending, "global search committed");
            self.global_term = self.global_pending.clone();
            due = true;
        }
        if self.column_timer.fire(now) {
            due = true;
        }

        due.then(|| self.plan())
    }

    fn fetch_now(&mut self) -> Transition {
        Transition {
            fetch: Some(self.plan()),
            clears_selection: false,
            sort_changed: false,
        }
    }
}
