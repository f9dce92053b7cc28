//! REST client for the records API.

use std::time::Duration;

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{ApiError, ApiResult, ListQuery, RecordBackend, UploadSummary};
use crate::models::{
    Column, Credentials, HistorialItem, LoginResponse, Registro, RegistroInput, RegistroUpdate,
};
use crate::query::Filters;

pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TotalResponse {
    total: u64,
}

#[derive(Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Value>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| anyhow::anyhow!("Invalid API URL '{}': {}", base_url, e))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Decode(format!("bad path '{}': {}", path, e)))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder) -> ApiResult<Response> {
        let response = self.authorized(req).send()?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "response");

        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().unwrap_or_default();
        let detail = error_detail(status, &body);
        warn!(status = status.as_u16(), %detail, "request failed");
        Err(ApiError::Http {
            status: status.as_u16(),
            detail,
        })
    }

    fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let response = self.send(req)?;
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl RecordBackend for HttpBackend {
    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        let url = self.url("auth/login")?;
        // No bearer header on login.
        let response = self.client.post(url).json(credentials).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                detail: error_detail(status, &body),
            });
        }
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn list(&self, query: &ListQuery) -> ApiResult<Vec<Registro>> {
        let url = list_url(&self.url("registros")?, query);
        self.json(self.client.get(url))
    }

    fn count(&self, filters: &Filters) -> ApiResult<u64> {
        let mut url = self.url("registros/total")?;
        append_filters(&mut url, filters);
        let total: TotalResponse = self.json(self.client.get(url))?;
        Ok(total.total)
    }

    fn get(&self, id: i64) -> ApiResult<Registro> {
        let url = self.url(&format!("registros/{}", id))?;
        self.json(self.client.get(url))
    }

    fn create(&self, input: &RegistroInput) -> ApiResult<Registro> {
        let url = self.url("registros")?;
        self.json(self.client.post(url).json(input))
    }

    fn update(&self, id: i64, changes: &RegistroUpdate) -> ApiResult<Registro> {
        let url = self.url(&format!("registros/{}", id))?;
        self.json(self.client.put(url).json(changes))
    }

    fn delete(&self, id: i64) -> ApiResult<()> {
        let url = self.url(&format!("registros/{}", id))?;
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn history(&self, numero_inspector: i64) -> ApiResult<Vec<HistorialItem>> {
        let url = self.url(&format!("registros/{}/historial", numero_inspector))?;
        let items: Vec<HistorialItem> = self.json(self.client.get(url))?;
        Ok(items
            .into_iter()
            .map(|item| item.normalize(numero_inspector))
            .collect())
    }

    fn unique_values(&self, column: Column, search: Option<&str>) -> ApiResult<Vec<String>> {
        let mut url = self.url("registros/unique_values")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("col", column.as_str());
            if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
                pairs.append_pair("search", search);
            }
        }
        let response: ValuesResponse = self.json(self.client.get(url))?;
        Ok(response
            .values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect())
    }

    fn upload_csv(&self, file_name: &str, bytes: &[u8]) -> ApiResult<UploadSummary> {
        let url = self.url("upload_csv")?;
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);
        // Server-side processing of large files can exceed the default timeout.
        let req = self
            .client
            .post(url)
            .multipart(form)
            .timeout(Duration::from_secs(300));
        self.json(req)
    }

    fn export_csv(&self) -> ApiResult<Vec<u8>> {
        let url = self.url("export_excel")?;
        let response = self.send(self.client.get(url))?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Listing URL with paging, sort, and non-empty filters as query parameters.
fn list_url(base: &Url, query: &ListQuery) -> Url {
    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("limit", &query.limit.to_string());
        pairs.append_pair("offset", &query.offset.to_string());
        if let Some(column) = query.sort_by {
            pairs.append_pair("sort_by", column.as_str());
            pairs.append_pair("sort_dir", query.sort_dir.as_str());
        }
    }
    append_filters(&mut url, &query.filters);
    url
}

fn append_filters(url: &mut Url, filters: &Filters) {
    let present: Vec<_> = filters
        .iter()
        .map(|(column, value)| (column, value.trim()))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    if present.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (column, value) in present {
        pairs.append_pair(column.as_str(), value);
    }
}

/// Human-readable message from an error response body.
///
/// `detail` may be a string, an object carrying `message`/`error`, or a
/// list of validation entries.
fn error_detail(status: StatusCode, body: &str) -> String {
    let fallback = || {
        format!(
            "Error {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
    };

    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    match json.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("message")
            .or_else(|| obj.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(fallback),
        Some(Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other
                    .get("msg")
                    .or_else(|| other.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => fallback(),
    }
}
