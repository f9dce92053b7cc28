//! One interactive table session: query state, the page on screen, and the
//! row selection.

use std::collections::BTreeSet;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiResult, ListQuery, RecordBackend};
use crate::db::Database;
use crate::export::records_to_csv;
use crate::models::Registro;
use crate::query::{total_pages, FetchPlan, QueryEvent, QueryState, SortConfig};

/// Settings key for the persisted sort.
pub const SETTING_SORT: &str = "sort_config";

/// A fetched page together with the total it was counted against.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub generation: u64,
    pub page: u32,
    pub records: Vec<Registro>,
    pub total: u64,
}

/// Issue the page and count requests for one plan, sequentially, from the
/// same filter snapshot.
pub fn execute(backend: &dyn RecordBackend, plan: &FetchPlan) -> ApiResult<PageSnapshot> {
    let records = backend.list(&ListQuery::from(plan))?;
    let total = backend.count(&plan.filters)?;
    debug!(
        generation = plan.generation,
        rows = records.len(),
        total,
        "fetched page"
    );
    Ok(PageSnapshot {
        generation: plan.generation,
        page: plan.page,
        records,
        total,
    })
}

/// Outcome of deleting several records one by one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDeleteReport {
    pub requested: usize,
    pub deleted: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

impl BatchDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("Deleted {} of {}.", self.deleted.len(), self.requested)
    }
}

/// Delete each id independently. Failures are collected and the rest still
/// run; an expired session stops the batch.
pub fn delete_batch(backend: &dyn RecordBackend, ids: &[i64]) -> Result<BatchDeleteReport> {
    let mut report = BatchDeleteReport {
        requested: ids.len(),
        ..Default::default()
    };
    for &id in ids {
        match backend.delete(id) {
            Ok(()) => report.deleted.push(id),
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
            Err(e) => {
                warn!(id, error = %e, "delete failed");
                report.failed.push((id, e.to_string()));
            }
        }
    }
    Ok(report)
}

pub struct TableSession<'a> {
    backend: &'a dyn RecordBackend,
    db: &'a Database,
    query: QueryState,
    records: Vec<Registro>,
    total: u64,
    page: u32,
    selected: BTreeSet<i64>,
    applied_generation: u64,
    last_error: Option<String>,
}

impl<'a> TableSession<'a> {
    /// Start a session with the stored sort and load the first page.
    pub fn open(backend: &'a dyn RecordBackend, db: &'a Database, limit: u32) -> Result<Self> {
        let sort = match db.get_json::<SortConfig>(SETTING_SORT) {
            Ok(sort) => sort,
            Err(e) => {
                warn!(error = %e, "ignoring stored sort");
                None
            }
        };

        let mut session = Self {
            backend,
            db,
            query: QueryState::new(limit).with_sort(sort),
            records: Vec::new(),
            total: 0,
            page: 1,
            selected: BTreeSet::new(),
            applied_generation: 0,
            last_error: None,
        };
        session.refresh()?;
        Ok(session)
    }

    pub fn handle(&mut self, event: QueryEvent, now: Instant) -> Result<()> {
        let transition = self.query.handle(event, now);
        if transition.clears_selection {
            self.selected.clear();
        }
        if transition.sort_changed {
            self.persist_sort();
        }
        if let Some(plan) = transition.fetch {
            self.run(plan)?;
        }
        Ok(())
    }

    /// Fire due debounce timers. Returns whether a fetch ran.
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        match self.query.poll(now) {
            Some(plan) => {
                self.run(plan)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-fetch the current page with the current query.
    pub fn refresh(&mut self) -> Result<()> {
        let plan = self.query.plan();
        self.run(plan)
    }

    fn run(&mut self, plan: FetchPlan) -> Result<()> {
        match execute(self.backend, &plan) {
            Ok(snapshot) => {
                self.apply(snapshot);
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
            Err(e) => {
                warn!(generation = plan.generation, error = %e, "fetch failed, keeping previous page");
                self.last_error = Some(e.to_string());
                Ok(())
            }
        }
    }

    /// Show a snapshot unless a newer one is already on screen.
    pub fn apply(&mut self, snapshot: PageSnapshot) -> bool {
        if snapshot.generation < self.applied_generation {
            debug!(
                stale = snapshot.generation,
                current = self.applied_generation,
                "discarding stale page"
            );
            return false;
        }
        self.applied_generation = snapshot.generation;
        self.records = snapshot.records;
        self.total = snapshot.total;
        self.page = snapshot.page;
        self.last_error = None;
        true
    }

    fn persist_sort(&self) {
        if let Some(sort) = self.query.sort() {
            if let Err(e) = self.db.set_json(SETTING_SORT, &sort) {
                warn!(error = %e, "could not store sort");
            }
        }
    }

    pub fn records(&self) -> &[Registro] {
        &self.records
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u64 {
        total_pages(self.total, self.query.limit())
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.query.next_deadline()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn toggle(&mut self, id: i64) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    /// Select every row on the page, or clear when all already are.
    pub fn toggle_all(&mut self) {
        let all_selected =
            !self.records.is_empty() && self.records.iter().all(|r| self.selected.contains(&r.id));
        if all_selected {
            self.selected.clear();
        } else {
            self.selected.extend(self.records.iter().map(|r| r.id));
        }
    }

    /// Delete the selected rows, clear the selection, and reload the page.
    pub fn delete_selected(&mut self) -> Result<BatchDeleteReport> {
        let ids: Vec<i64> = self.selected.iter().copied().collect();
        let report = delete_batch(self.backend, &ids)?;
        self.selected.clear();
        self.refresh()?;
        Ok(report)
    }

    /// CSV of the selected rows on the current page.
    pub fn export_selected(&self) -> Result<String> {
        let rows: Vec<Registro> = self
            .records
            .iter()
            .filter(|r| self.selected.contains(&r.id))
            .cloned()
            .collect();
        records_to_csv(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::RecordingBackend;
    use crate::import;
    use crate::models::Column;
    use crate::query::{SortDirection, EXACT_PREFIX};

    fn setup() -> (RecordingBackend, Database) {
        (RecordingBackend::with_demo_data(), Database::open_memory().unwrap())
    }

    #[test]
    fn open_loads_first_page_and_total() {
        let (backend, db) = setup();
        let table = TableSession::open(&backend, &db, 3).unwrap();
        assert_eq!(table.records().len(), 3);
        assert_eq!(table.total(), 8);
        assert_eq!(table.total_pages(), 3);
        assert_eq!(backend.calls("list"), 1);
        assert_eq!(backend.calls("count"), 1);
    }

    #[test]
    fn stored_sort_is_reapplied() {
        let (backend, db) = setup();
        db.set_json(
            SETTING_SORT,
            &SortConfig {
                key: Column::Ciudad,
                direction: SortDirection::Desc,
            },
        )
        .unwrap();

        let table = TableSession::open(&backend, &db, 20).unwrap();
        let query = &backend.list_queries()[0];
        assert_eq!(query.sort_by, Some(Column::Ciudad));
        assert_eq!(query.sort_dir, SortDirection::Desc);
        assert_eq!(table.query().sort().unwrap().key, Column::Ciudad);
    }

    #[test]
    fn sort_change_is_persisted() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        table.handle(QueryEvent::Sort(Column::Nombre), Instant::now()).unwrap();

        let stored: SortConfig = db.get_json(SETTING_SORT).unwrap().unwrap();
        assert_eq!(stored.key, Column::Nombre);
        assert_eq!(stored.direction, SortDirection::Asc);
    }

    #[test]
    fn page_and_count_share_one_filter_snapshot() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        let now = Instant::now();
        table
            .handle(
                QueryEvent::ColumnInput {
                    column: Column::Status,
                    value: "activo".into(),
                },
                now,
            )
            .unwrap();
        table.handle(QueryEvent::ColumnEnter(Column::Status), now).unwrap();

        let list = backend.list_queries().last().unwrap().filters.clone();
        let count = backend.count_filters().last().unwrap().clone();
        assert_eq!(list, count);
        assert_eq!(list[&Column::Status], format!("{}activo", EXACT_PREFIX));
        assert_eq!(table.total(), 6);
    }

    #[test]
    fn debounced_filter_fetches_on_tick() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        let now = Instant::now();
        table
            .handle(
                QueryEvent::ColumnInput {
                    column: Column::Ciudad,
                    value: "cali".into(),
                },
                now,
            )
            .unwrap();
        assert_eq!(backend.calls("list"), 1);

        assert!(!table.tick(now).unwrap());
        assert!(table.tick(now + crate::query::COLUMN_DEBOUNCE).unwrap());
        assert_eq!(backend.calls("list"), 2);
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();

        let mut query = QueryState::new(20);
        let older = query.plan();
        let newer = query.plan();
        let older = execute(&backend, &older).unwrap();
        let mut newer = execute(&backend, &newer).unwrap();
        newer.generation += 10;
        newer.total = 99;

        assert!(table.apply(newer));
        assert!(!table.apply(older));
        assert_eq!(table.total(), 99);
    }

    #[test]
    fn failed_fetch_keeps_previous_page() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        backend.fail_next_list(ApiError::Http {
            status: 500,
            detail: "Error al obtener registros".into(),
        });

        table.handle(QueryEvent::Page(2), Instant::now()).unwrap();
        assert_eq!(table.records().len(), 8);
        assert_eq!(table.page(), 1);
        assert_eq!(table.last_error(), Some("Error al obtener registros"));

        table.refresh().unwrap();
        assert!(table.last_error().is_none());
    }

    #[test]
    fn unauthorized_fetch_propagates() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        backend.fail_next_list(ApiError::Unauthorized);

        let err = table.refresh().unwrap_err();
        assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));
    }

    #[test]
    fn selection_cleared_on_page_and_sort_change() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 4).unwrap();
        let now = Instant::now();

        table.toggle_all();
        assert_eq!(table.selected_count(), 4);
        table.handle(QueryEvent::Page(2), now).unwrap();
        assert_eq!(table.selected_count(), 0);

        table.toggle(table.records()[0].id);
        table.handle(QueryEvent::Sort(Column::Region), now).unwrap();
        assert_eq!(table.selected_count(), 0);
        assert_eq!(table.page(), 1);
    }

    #[test]
    fn toggle_all_twice_clears() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        table.toggle_all();
        table.toggle_all();
        assert_eq!(table.selected_count(), 0);
    }

    #[test]
    fn batch_delete_reports_partial_failure() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        backend.fail_delete(2);
        table.toggle(1);
        table.toggle(2);
        table.toggle(3);

        let report = table.delete_selected().unwrap();
        assert_eq!(report.deleted, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert!(!report.is_complete());
        assert_eq!(report.summary(), "Deleted 2 of 3.");
        assert_eq!(table.total(), 6);
        assert_eq!(table.selected_count(), 0);
    }

    #[test]
    fn export_selected_rows_only() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        table.toggle(2);
        let csv = table.export_selected().unwrap();
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("\"1002\""));
    }

    #[test]
    fn valid_import_uploads_once_and_refreshes_listing() {
        let (backend, db) = setup();
        let mut table = TableSession::open(&backend, &db, 20).unwrap();
        let csv = "Número de inspector,Nombre,Status,Celular\n\
                   1,ins01 A,activo,3001234567\n\
                   2,ins2 B,activo,\n\
                   30,ins30 C,inactivo,3109876543\n";

        let file = import::validate_bytes("carga.csv", csv.as_bytes().to_vec()).unwrap();
        let summary = import::upload(&backend, &file, |_| {}).unwrap();
        table.refresh().unwrap();

        assert_eq!(backend.calls("upload_csv"), 1);
        assert!(import::success_message(&summary).contains('3'));
        assert_eq!(backend.calls("list"), 2);
        assert_eq!(table.total(), 3);
    }
}
