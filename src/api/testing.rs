//! Backend double that records calls and can be told to fail.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use super::{ApiError, ApiResult, ListQuery, MemoryBackend, RecordBackend, UploadSummary};
use crate::models::{
    Column, Credentials, HistorialItem, LoginResponse, Registro, RegistroInput, RegistroUpdate,
};
use crate::query::Filters;

#[derive(Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    calls: Mutex<HashMap<&'static str, usize>>,
    last_upload: Mutex<Option<(String, Vec<u8>)>>,
    list_queries: Mutex<Vec<ListQuery>>,
    count_filters: Mutex<Vec<Filters>>,
    failing_deletes: Mutex<BTreeSet<i64>>,
    fail_lists: Mutex<Option<ApiError>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_demo_data() -> Self {
        Self {
            inner: MemoryBackend::with_demo_data(),
            ..Self::default()
        }
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn last_upload(&self) -> Option<(String, Vec<u8>)> {
        self.last_upload.lock().unwrap().clone()
    }

    pub fn list_queries(&self) -> Vec<ListQuery> {
        self.list_queries.lock().unwrap().clone()
    }

    pub fn count_filters(&self) -> Vec<Filters> {
        self.count_filters.lock().unwrap().clone()
    }

    pub fn fail_delete(&self, id: i64) {
        self.failing_deletes.lock().unwrap().insert(id);
    }

    /// Make the next listing request fail with `err`.
    pub fn fail_next_list(&self, err: ApiError) {
        *self.fail_lists.lock().unwrap() = Some(err);
    }

    fn hit(&self, name: &'static str) {
        *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
    }
}

impl RecordBackend for RecordingBackend {
    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        self.hit("login");
        self.inner.login(credentials)
    }

    fn list(&self, query: &ListQuery) -> ApiResult<Vec<Registro>> {
        self.hit("list");
        self.list_queries.lock().unwrap().push(query.clone());
        if let Some(err) = self.fail_lists.lock().unwrap().take() {
            return Err(err);
        }
        self.inner.list(query)
    }

    fn count(&self, filters: &Filters) -> ApiResult<u64> {
        self.hit("count");
        self.count_filters.lock().unwrap().push(filters.clone());
        self.inner.count(filters)
    }

    fn get(&self, id: i64) -> ApiResult<Registro> {
        self.hit("get");
        self.inner.get(id)
    }

    fn create(&self, input: &RegistroInput) -> ApiResult<Registro> {
        self.hit("create");
        self.inner.create(input)
    }

    fn update(&self, id: i64, changes: &RegistroUpdate) -> ApiResult<Registro> {
        self.hit("update");
        self.inner.update(id, changes)
    }

    fn delete(&self, id: i64) -> ApiResult<()> {
        self.hit("delete");
        if self.failing_deletes.lock().unwrap().contains(&id) {
            return Err(ApiError::Http {
                status: 500,
                detail: "Error al eliminar registro".to_string(),
            });
        }
        self.inner.delete(id)
    }

    fn history(&self, numero_inspector: i64) -> ApiResult<Vec<HistorialItem>> {
        self.hit("history");
        self.inner.history(numero_inspector)
    }

    fn unique_values(&self, column: Column, search: Option<&str>) -> ApiResult<Vec<String>> {
        self.hit("unique_values");
        self.inner.unique_values(column, search)
    }

    fn upload_csv(&self, file_name: &str, bytes: &[u8]) -> ApiResult<UploadSummary> {
        self.hit("upload_csv");
        *self.last_upload.lock().unwrap() = Some((file_name.to_string(), bytes.to_vec()));
        self.inner.upload_csv(file_name, bytes)
    }

    fn export_csv(&self) -> ApiResult<Vec<u8>> {
        self.hit("export_csv");
        self.inner.export_csv()
    }
}
