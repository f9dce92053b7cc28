//! In-memory record store used for demo mode and tests.
//!
//! Matching, sorting and bulk upload follow the server: `__EXACT__` values
//! compare whole values, anything else is a case-insensitive substring, and a
//! set of filters that all carry the same value (a global search) is OR-ed.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiError, ApiResult, ListQuery, RecordBackend, UploadSummary};
use crate::models::{
    Column, Credentials, HistorialItem, LoginResponse, Registro, RegistroInput, RegistroUpdate,
    Role, User,
};
use crate::query::{split_exact, FilterMode, Filters, SortDirection};

const DEMO_USERNAME: &str = "demo";
const DEMO_PASSWORD: &str = "demo123";
const DEMO_TOKEN: &str = "demo-token";

/// Columns the bulk upload cannot do without.
const REQUIRED_UPLOAD_COLUMNS: [Column; 3] = [Column::NumeroInspector, Column::Nombre, Column::Status];

struct Store {
    records: Vec<Registro>,
    history: Vec<(i64, HistorialItem)>,
    next_id: i64,
}

pub struct MemoryBackend {
    store: Mutex<Store>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::from_records(Vec::new())
    }

    pub fn from_records(records: Vec<Registro>) -> Self {
        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Self {
            store: Mutex::new(Store {
                records,
                history: Vec::new(),
                next_id,
            }),
        }
    }

    pub fn with_demo_data() -> Self {
        Self::from_records(demo_records())
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // A panic while holding the lock leaves the data intact.
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn matching(&self, filters: &Filters) -> Vec<Registro> {
        self.lock()
            .records
            .iter()
            .filter(|r| matches_filters(r, filters))
            .cloned()
            .collect()
    }
}

impl Store {
    fn record(&mut self, numero_inspector: i64, item: HistorialItem) {
        self.history.push((numero_inspector, item));
    }
}

fn history_entry(accion: &str, descripcion: String) -> HistorialItem {
    HistorialItem {
        fecha: chrono::Local::now().format("%d/%m/%Y %H:%M").to_string(),
        descripcion,
        autor: DEMO_USERNAME.to_string(),
        accion: Some(accion.to_string()),
        usuario: Some(DEMO_USERNAME.to_string()),
        ..Default::default()
    }
}

impl RecordBackend for MemoryBackend {
    fn login(&self, credentials: &Credentials) -> ApiResult<LoginResponse> {
        if credentials.username == DEMO_USERNAME && credentials.password == DEMO_PASSWORD {
            return Ok(LoginResponse {
                access_token: DEMO_TOKEN.to_string(),
                token_type: "bearer".to_string(),
                user: User {
                    id: 0,
                    username: "Demo Admin".to_string(),
                    rol: Role::Admin,
                    foto: None,
                },
            });
        }
        Err(ApiError::Http {
            status: 401,
            detail: "Credenciales incorrectas".to_string(),
        })
    }

    fn list(&self, query: &ListQuery) -> ApiResult<Vec<Registro>> {
        let mut records = self.matching(&query.filters);
        match query.sort_by {
            Some(column) => records.sort_by(|a, b| compare_by(a, b, column)),
            None => records.sort_by_key(|r| r.id),
        }
        if query.sort_dir == SortDirection::Desc && query.sort_by.is_some() {
            records.reverse();
        }
        debug!(matched = records.len(), offset = query.offset, "memory list");

        Ok(records
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(query.limit as usize)
            .collect())
    }

    fn count(&self, filters: &Filters) -> ApiResult<u64> {
        Ok(self.matching(filters).len() as u64)
    }

    fn get(&self, id: i64) -> ApiResult<Registro> {
        self.lock()
            .records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Registro"))
    }

    fn create(&self, input: &RegistroInput) -> ApiResult<Registro> {
        let mut store = self.lock();
        if store
            .records
            .iter()
            .any(|r| r.numero_inspector == input.numero_inspector)
        {
            return Err(ApiError::bad_request(format!(
                "Ya existe un registro con el número de inspector {}",
                input.numero_inspector
            )));
        }

        let mut input = input.clone();
        if input.uuid.is_none() {
            input.uuid = Some(Uuid::new_v4().to_string());
        }
        let id = store.next_id;
        store.next_id += 1;
        let registro = Registro::from_input(id, input);
        store.records.push(registro.clone());

        let numero = registro.numero_inspector;
        store.record(
            numero,
            history_entry("crear", format!("Registro creado para el inspector {}", numero)),
        );
        info!(id, numero, "record created");
        Ok(registro)
    }

    fn update(&self, id: i64, changes: &RegistroUpdate) -> ApiResult<Registro> {
        let mut store = self.lock();
        if let Some(numero) = changes.numero_inspector {
            if store
                .records
                .iter()
                .any(|r| r.id != id && r.numero_inspector == numero)
            {
                return Err(ApiError::bad_request(format!(
                    "Ya existe un registro con el número de inspector {}",
                    numero
                )));
            }
        }

        let registro = store
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ApiError::not_found("Registro"))?;
        let changed = registro.apply(changes);
        let updated = registro.clone();

        for (column, old, new) in changed {
            let mut item = history_entry(
                "editar",
                format!("Campo '{}' actualizado", column.display_name()),
            );
            item.campo = Some(column.as_str().to_string());
            item.valor_anterior = Some(old);
            item.valor_nuevo = Some(new);
            store.record(updated.numero_inspector, item);
        }
        Ok(updated)
    }

    fn delete(&self, id: i64) -> ApiResult<()> {
        let mut store = self.lock();
        let pos = store
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ApiError::not_found("Registro"))?;
        let removed = store.records.remove(pos);
        store.record(
            removed.numero_inspector,
            history_entry("eliminar", format!("Registro con ID={} eliminado", id)),
        );
        info!(id, "record deleted");
        Ok(())
    }

    fn history(&self, numero_inspector: i64) -> ApiResult<Vec<HistorialItem>> {
        // Newest first.
        Ok(self
            .lock()
            .history
            .iter()
            .rev()
            .filter(|(numero, _)| *numero == numero_inspector)
            .map(|(_, item)| item.clone().normalize(numero_inspector))
            .collect())
    }

    fn unique_values(&self, column: Column, search: Option<&str>) -> ApiResult<Vec<String>> {
        if !column.has_unique_values() {
            return Err(ApiError::bad_request(format!(
                "Columna no permitida: '{}'",
                column
            )));
        }
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let values: BTreeSet<String> = self
            .lock()
            .records
            .iter()
            .map(|r| r.field(column))
            .filter(|v| !v.is_empty())
            .filter(|v| match needle {
                Some(ref n) => v.to_lowercase().contains(n),
                None => true,
            })
            .collect();
        Ok(values.into_iter().collect())
    }

    fn upload_csv(&self, file_name: &str, bytes: &[u8]) -> ApiResult<UploadSummary> {
        let records = parse_upload(bytes)?;
        let total = records.len() as u64;

        let mut store = self.lock();
        store.next_id = 1;
        store.records.clear();
        for mut input in records {
            if input.uuid.is_none() {
                input.uuid = Some(Uuid::new_v4().to_string());
            }
            let id = store.next_id;
            store.next_id += 1;
            store.records.push(Registro::from_input(id, input));
        }
        info!(file = file_name, total, "records replaced by bulk upload");

        Ok(UploadSummary {
            registros_creados: total,
            mensaje: Some("Carga masiva exitosa. Se reemplazaron todos los registros.".to_string()),
        })
    }

    fn export_csv(&self) -> ApiResult<Vec<u8>> {
        let store = self.lock();
        let columns: Vec<Column> = Column::ALL
            .into_iter()
            .filter(|c| c.label().is_some())
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        let write_err = |e: csv::Error| ApiError::Decode(e.to_string());
        writer
            .write_record(columns.iter().filter_map(|c| c.label()))
            .map_err(write_err)?;
        for record in &store.records {
            writer
                .write_record(columns.iter().map(|c| record.field(*c)))
                .map_err(write_err)?;
        }
        writer
            .into_inner()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Whether a record passes the filter set.
fn matches_filters(record: &Registro, filters: &Filters) -> bool {
    let active: Vec<(Column, &str)> = filters
        .iter()
        .map(|(c, v)| (*c, v.trim()))
        .filter(|(_, v)| !v.is_empty())
        .collect();
    if active.is_empty() {
        return true;
    }

    let first = active[0].1;
    let global = active.len() > 1 && active.iter().all(|(_, v)| *v == first);

    let hit = |(column, value): &(Column, &str)| matches_value(&record.field(*column), value);
    if global {
        active.iter().any(hit)
    } else {
        active.iter().all(hit)
    }
}

fn matches_value(field: &str, filter: &str) -> bool {
    match split_exact(filter) {
        (FilterMode::Exact, value) => field == value,
        (FilterMode::Partial, value) => field.to_lowercase().contains(&value.to_lowercase()),
    }
}

fn compare_by(a: &Registro, b: &Registro, column: Column) -> Ordering {
    let ordering = match column {
        Column::NumeroInspector => a.numero_inspector.cmp(&b.numero_inspector),
        other => a
            .field(other)
            .to_lowercase()
            .cmp(&b.field(other).to_lowercase()),
    };
    ordering.then(a.id.cmp(&b.id))
}

/// Parse an upload body into record inputs, mapping label or API headers.
fn parse_upload(bytes: &[u8]) -> ApiResult<Vec<RegistroInput>> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::Reader::from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|_| ApiError::bad_request("Error al procesar archivo CSV"))?
        .clone();
    let mapping: Vec<Option<Column>> = headers
        .iter()
        .map(|h| Column::from_label(h).or_else(|| Column::parse(h)))
        .collect();

    let missing: Vec<&str> = REQUIRED_UPLOAD_COLUMNS
        .iter()
        .filter(|c| !mapping.contains(&Some(**c)))
        .map(|c| c.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Columnas requeridas faltantes: {}",
            missing.join(", ")
        )));
    }

    let mut inputs = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.map_err(|_| ApiError::bad_request("Error al procesar archivo CSV"))?;
        let mut input = RegistroInput::default();
        for (column, value) in mapping.iter().zip(row.iter()) {
            if let Some(column) = column {
                input.set(*column, value).map_err(|e| {
                    ApiError::bad_request(format!("Fila {}: {}", idx + 2, e))
                })?;
            }
        }
        inputs.push(input);
    }
    Ok(inputs)
}

fn demo_records() -> Vec<Registro> {
    #[rustfmt::skip]
    let rows: [(&str, &str, &str, &str, &str, &str, &str, &str, &str, &str, &str, &str); 8] = [
        ("Equipo Principal", "Equipo en buen estado, requiere mantenimiento preventivo", "activo", "Norte", "Flota A", "Juan Pérez", "3001234567", "juan.perez@example.com", "Residencial", "Antioquia", "Medellín", "FTTH"),
        ("Estación Central", "Instalación nueva, funcionando correctamente", "activo", "Sur", "Flota B", "María García", "3009876543", "maria.garcia@example.com", "Comercial", "Valle del Cauca", "Cali", "HFC"),
        ("Punto de Acceso", "Requiere revisión técnica urgente", "inactivo", "Centro", "Flota C", "Carlos Rodríguez", "3015551234", "carlos.rodriguez@example.com", "Residencial", "Cundinamarca", "Bogotá", "FTTH"),
        ("Terminal Remoto", "Equipo en mantenimiento programado", "activo", "Norte", "Flota A", "Ana López", "3026667890", "ana.lopez@example.com", "Comercial", "Antioquia", "Medellín", "HFC"),
        ("Nodo Distrital", "Operación normal, sin incidencias", "activo", "Sur", "Flota B", "Luis Martínez", "3037778901", "luis.martinez@example.com", "Residencial", "Valle del Cauca", "Cali", "FTTH"),
        ("Hub Regional", "Actualización de firmware pendiente", "activo", "Centro", "Flota C", "Sofia Hernández", "3048889012", "sofia.hernandez@example.com", "Comercial", "Cundinamarca", "Bogotá", "HFC"),
        ("Estación Satelital", "Nueva instalación, en fase de pruebas", "activo", "Norte", "Flota A", "Diego Ramírez", "3059990123", "diego.ramirez@example.com", "Residencial", "Antioquia", "Medellín", "FTTH"),
        ("Terminal Local", "Requiere cambio de cableado", "inactivo", "Centro", "Flota C", "Roberto Sánchez", "3072223456", "roberto.sanchez@example.com", "Residencial", "Cundinamarca", "Bogotá", "FTTH"),
    ];

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let n = i as i64 + 1;
            let numero = 1000 + n;
            let (nombre, obs, status, region, flota, encargado, celular, correo, uso, depto, ciudad, tec) =
                *row;
            let prefix = if tec == "FTTH" { "OLT" } else { "CMTS" };
            Registro::from_input(
                n,
                RegistroInput {
                    numero_inspector: numero,
                    uuid: Some(format!("uuid-demo-{:03}", n)),
                    nombre: format!("ins{} {}", numero, nombre),
                    observaciones: obs.to_string(),
                    status: status.to_string(),
                    region: region.to_string(),
                    flota: flota.to_string(),
                    encargado: encargado.to_string(),
                    celular: celular.to_string(),
                    correo: correo.to_string(),
                    direccion: format!("Calle {} #{}-{}", 100 + n * 11, 10 + n, 20 + n),
                    uso: uso.to_string(),
                    departamento: depto.to_string(),
                    ciudad: ciudad.to_string(),
                    tecnologia: tec.to_string(),
                    cmts_olt: format!("{}-{:03}", prefix, n),
                    id_servicio: format!("SERV-{:03}", n),
                    mac_sn: format!("AA:BB:CC:DD:EE:{:02X}", n),
                },
            )
        })
        .collect()
}
