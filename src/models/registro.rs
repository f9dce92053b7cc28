use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// A column of the record table.
///
/// Declaration order is the display and export order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    NumeroInspector,
    Uuid,
    Nombre,
    Observaciones,
    Status,
    Region,
    Flota,
    Encargado,
    Celular,
    Correo,
    Direccion,
    Uso,
    Departamento,
    Ciudad,
    Tecnologia,
    CmtsOlt,
    IdServicio,
    MacSn,
}

impl Column {
    pub const ALL: [Column; 18] = [
        Self::NumeroInspector,
        Self::Uuid,
        Self::Nombre,
        Self::Observaciones,
        Self::Status,
        Self::Region,
        Self::Flota,
        Self::Encargado,
        Self::Celular,
        Self::Correo,
        Self::Direccion,
        Self::Uso,
        Self::Departamento,
        Self::Ciudad,
        Self::Tecnologia,
        Self::CmtsOlt,
        Self::IdServicio,
        Self::MacSn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NumeroInspector => "numero_inspector",
            Self::Uuid => "uuid",
            Self::Nombre => "nombre",
            Self::Observaciones => "observaciones",
            Self::Status => "status",
            Self::Region => "region",
            Self::Flota => "flota",
            Self::Encargado => "encargado",
            Self::Celular => "celular",
            Self::Correo => "correo",
            Self::Direccion => "direccion",
            Self::Uso => "uso",
            Self::Departamento => "departamento",
            Self::Ciudad => "ciudad",
            Self::Tecnologia => "tecnologia",
            Self::CmtsOlt => "cmts_olt",
            Self::IdServicio => "id_servicio",
            Self::MacSn => "mac_sn",
        }
    }

    /// Parse a column name. Accepts the API name (`cmts_olt`) and the
    /// display form with spaces (`cmts olt`), case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace(' ', "_");
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }

    /// Header used by the bulk-import CSV and the server export.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::NumeroInspector => Some("Número de inspector"),
            Self::Uuid => None,
            Self::Nombre => Some("Nombre"),
            Self::Observaciones => Some("Observaciones"),
            Self::Status => Some("Status"),
            Self::Region => Some("Región"),
            Self::Flota => Some("Flota"),
            Self::Encargado => Some("Encargado"),
            Self::Celular => Some("Celular"),
            Self::Correo => Some("Correo"),
            Self::Direccion => Some("Dirección"),
            Self::Uso => Some("Uso"),
            Self::Departamento => Some("Departamento"),
            Self::Ciudad => Some("Ciudad"),
            Self::Tecnologia => Some("Tecnología"),
            Self::CmtsOlt => Some("CMTS/OLT"),
            Self::IdServicio => Some("ID Servicio"),
            Self::MacSn => Some("MAC/SN"),
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|c| c.label() == Some(label))
    }

    /// Column name for table headers (`cmts_olt` -> `cmts olt`).
    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Whether the server offers distinct values for this column.
    pub fn has_unique_values(&self) -> bool {
        !matches!(self, Self::Uuid)
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inspection device record as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registro {
    pub id: i64,
    pub numero_inspector: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nombre: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub observaciones: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub region: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub flota: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub encargado: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub celular: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub correo: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub direccion: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub uso: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub departamento: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ciudad: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tecnologia: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cmts_olt: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id_servicio: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub mac_sn: String,
}

impl Registro {
    /// Build a record from creation input and a server-assigned id.
    pub fn from_input(id: i64, input: RegistroInput) -> Self {
        Self {
            id,
            numero_inspector: input.numero_inspector,
            uuid: input.uuid,
            nombre: input.nombre,
            observaciones: input.observaciones,
            status: input.status,
            region: input.region,
            flota: input.flota,
            encargado: input.encargado,
            celular: input.celular,
            correo: input.correo,
            direccion: input.direccion,
            uso: input.uso,
            departamento: input.departamento,
            ciudad: input.ciudad,
            tecnologia: input.tecnologia,
            cmts_olt: input.cmts_olt,
            id_servicio: input.id_servicio,
            mac_sn: input.mac_sn,
        }
    }

    /// String value of a column, empty when unset.
    pub fn field(&self, column: Column) -> String {
        match column {
            Column::NumeroInspector => self.numero_inspector.to_string(),
            Column::Uuid => self.uuid.clone().unwrap_or_default(),
            other => self.text_field(other).cloned().unwrap_or_default(),
        }
    }

    fn text_field(&self, column: Column) -> Option<&String> {
        Some(match column {
            Column::Nombre => &self.nombre,
            Column::Observaciones => &self.observaciones,
            Column::Status => &self.status,
            Column::Region => &self.region,
            Column::Flota => &self.flota,
            Column::Encargado => &self.encargado,
            Column::Celular => &self.celular,
            Column::Correo => &self.correo,
            Column::Direccion => &self.direccion,
            Column::Uso => &self.uso,
            Column::Departamento => &self.departamento,
            Column::Ciudad => &self.ciudad,
            Column::Tecnologia => &self.tecnologia,
            Column::CmtsOlt => &self.cmts_olt,
            Column::IdServicio => &self.id_servicio,
            Column::MacSn => &self.mac_sn,
            Column::NumeroInspector | Column::Uuid => return None,
        })
    }

    fn text_field_mut(&mut self, column: Column) -> Option<&mut String> {
        Some(match column {
            Column::Nombre => &mut self.nombre,
            Column::Observaciones => &mut self.observaciones,
            Column::Status => &mut self.status,
            Column::Region => &mut self.region,
            Column::Flota => &mut self.flota,
            Column::Encargado => &mut self.encargado,
            Column::Celular => &mut self.celular,
            Column::Correo => &mut self.correo,
            Column::Direccion => &mut self.direccion,
            Column::Uso => &mut self.uso,
            Column::Departamento => &mut self.departamento,
            Column::Ciudad => &mut self.ciudad,
            Column::Tecnologia => &mut self.tecnologia,
            Column::CmtsOlt => &mut self.cmts_olt,
            Column::IdServicio => &mut self.id_servicio,
            Column::MacSn => &mut self.mac_sn,
            Column::NumeroInspector | Column::Uuid => return None,
        })
    }

    /// Apply a partial update, returning the columns whose value changed
    /// together with the old and new values.
    pub fn apply(&mut self, changes: &RegistroUpdate) -> Vec<(Column, String, String)> {
        let mut changed = Vec::new();
        for (column, value) in changes.entries() {
            let old = self.field(column);
            if old == value {
                continue;
            }
            match column {
                Column::NumeroInspector => {
                    if let Ok(n) = value.parse() {
                        self.numero_inspector = n;
                    } else {
                        continue;
                    }
                }
                Column::Uuid => self.uuid = Some(value.clone()),
                other => {
                    if let Some(slot) = self.text_field_mut(other) {
                        *slot = value.clone();
                    }
                }
            }
            changed.push((column, old, value));
        }
        changed
    }
}

/// Fields for creating a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistroInput {
    pub numero_inspector: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub nombre: String,
    pub observaciones: String,
    pub status: String,
    pub region: String,
    pub flota: String,
    pub encargado: String,
    pub celular: String,
    pub correo: String,
    pub direccion: String,
    pub uso: String,
    pub departamento: String,
    pub ciudad: String,
    pub tecnologia: String,
    pub cmts_olt: String,
    pub id_servicio: String,
    pub mac_sn: String,
}

impl RegistroInput {
    /// Set a field from its string form.
    pub fn set(&mut self, column: Column, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match column {
            Column::NumeroInspector => self.numero_inspector = parse_numero(&value)?,
            Column::Uuid => self.uuid = Some(value).filter(|v| !v.is_empty()),
            Column::Nombre => self.nombre = value,
            Column::Observaciones => self.observaciones = value,
            Column::Status => self.status = value,
            Column::Region => self.region = value,
            Column::Flota => self.flota = value,
            Column::Encargado => self.encargado = value,
            Column::Celular => self.celular = value,
            Column::Correo => self.correo = value,
            Column::Direccion => self.direccion = value,
            Column::Uso => self.uso = value,
            Column::Departamento => self.departamento = value,
            Column::Ciudad => self.ciudad = value,
            Column::Tecnologia => self.tecnologia = value,
            Column::CmtsOlt => self.cmts_olt = value,
            Column::IdServicio => self.id_servicio = value,
            Column::MacSn => self.mac_sn = value,
        }
        Ok(())
    }
}

/// Partial update: only present fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistroUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero_inspector: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flota: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encargado: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub celular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direccion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departamento: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciudad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tecnologia: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmts_olt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_servicio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_sn: Option<String>,
}

impl RegistroUpdate {
    pub fn set(&mut self, column: Column, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match column {
            Column::NumeroInspector => self.numero_inspector = Some(parse_numero(&value)?),
            Column::Uuid => self.uuid = Some(value),
            Column::Nombre => self.nombre = Some(value),
            Column::Observaciones => self.observaciones = Some(value),
            Column::Status => self.status = Some(value),
            Column::Region => self.region = Some(value),
            Column::Flota => self.flota = Some(value),
            Column::Encargado => self.encargado = Some(value),
            Column::Celular => self.celular = Some(value),
            Column::Correo => self.correo = Some(value),
            Column::Direccion => self.direccion = Some(value),
            Column::Uso => self.uso = Some(value),
            Column::Departamento => self.departamento = Some(value),
            Column::Ciudad => self.ciudad = Some(value),
            Column::Tecnologia => self.tecnologia = Some(value),
            Column::CmtsOlt => self.cmts_olt = Some(value),
            Column::IdServicio => self.id_servicio = Some(value),
            Column::MacSn => self.mac_sn = Some(value),
        }
        Ok(())
    }

    /// Present fields in column order.
    pub fn entries(&self) -> Vec<(Column, String)> {
        let text = |v: &Option<String>| v.clone();
        Column::ALL
            .into_iter()
            .filter_map(|column| {
                let value = match column {
                    Column::NumeroInspector => self.numero_inspector.map(|n| n.to_string()),
                    Column::Uuid => text(&self.uuid),
                    Column::Nombre => text(&self.nombre),
                    Column::Observaciones => text(&self.observaciones),
                    Column::Status => text(&self.status),
                    Column::Region => text(&self.region),
                    Column::Flota => text(&self.flota),
                    Column::Encargado => text(&self.encargado),
                    Column::Celular => text(&self.celular),
                    Column::Correo => text(&self.correo),
                    Column::Direccion => text(&self.direccion),
                    Column::Uso => text(&self.uso),
                    Column::Departamento => text(&self.departamento),
                    Column::Ciudad => text(&self.ciudad),
                    Column::Tecnologia => text(&self.tecnologia),
                    Column::CmtsOlt => text(&self.cmts_olt),
                    Column::IdServicio => text(&self.id_servicio),
                    Column::MacSn => text(&self.mac_sn),
                };
                value.map(|v| (column, v))
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// One entry of a record's change history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorialItem {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fecha: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub descripcion: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub autor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valor_anterior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valor_nuevo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usuario: Option<String>,
}

impl HistorialItem {
    /// Fill in fields the server may omit.
    pub fn normalize(mut self, numero_inspector: i64) -> Self {
        if self.descripcion.is_empty() {
            self.descripcion = format!("Registro del inspector {}", numero_inspector);
        }
        let usuario = self
            .usuario
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "Sistema".to_string());
        if self.autor.is_empty() {
            self.autor = usuario.clone();
        }
        self.usuario = Some(usuario);
        if self.fecha.is_empty() {
            self.fecha = chrono::Local::now().format("%d/%m/%Y").to_string();
        }
        self
    }
}

fn parse_numero(value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| anyhow!("numero_inspector must be numeric, got '{}'", value))
}

/// Deserialize `null` as an empty string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.unwrap_or_default())
}
