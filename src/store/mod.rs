// 🗄️ Persisted store - worker/driver/vehicle lookups and requirement updates

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::StoreSettings;
use crate::error::StoreResult;

pub mod rest;
pub mod sqlite;

pub use rest::RestStore;
pub use sqlite::SqliteStore;

/// Table names of the accreditation schema.
pub mod tables {
    pub const WORKER: &str = "fct_acreditacion_solicitud_trabajador_manual";
    pub const DRIVER: &str = "fct_acreditacion_solicitud_conductor_manual";
    pub const VEHICLE: &str = "fct_acreditacion_solicitud_vehiculos";
    pub const REQUIREMENT: &str = "brg_acreditacion_solicitud_requerimiento";
}

/// Partial update of a requirement row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementUpdate {
    #[serde(rename = "drive_folder_id", skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(rename = "parent_drive_id", skip_serializing_if = "Option::is_none")]
    pub parent_container_id: Option<String>,
}

impl RequirementUpdate {
    pub fn new(folder_id: Option<&str>, parent_container_id: Option<&str>) -> Self {
        RequirementUpdate {
            folder_id: folder_id.map(str::to_string),
            parent_container_id: parent_container_id.map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.folder_id.is_none() && self.parent_container_id.is_none()
    }
}

#[async_trait]
pub trait PersistedStore: Send + Sync {
    async fn worker_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>>;

    async fn driver_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>>;

    async fn vehicle_folder_id(&self, project_id: i64, plate: &str) -> StoreResult<Option<String>>;

    /// Apply `update` to requirement `id`; returns the number of rows affected.
    async fn update_requirement(&self, id: i64, update: &RequirementUpdate) -> StoreResult<usize>;
}

/// Build the backend named by the settings.
pub fn open_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn PersistedStore>> {
    match settings {
        StoreSettings::Sqlite { path } => Ok(Arc::new(SqliteStore::open(path)?)),
        StoreSettings::Rest { url, api_key } => Ok(Arc::new(RestStore::new(url, api_key)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_serializes_only_present_fields() {
        let update = RequirementUpdate::new(None, Some("drive-1"));
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"parent_drive_id": "drive-1"})
        );
        assert!(!update.is_empty());
        assert!(RequirementUpdate::new(None, None).is_empty());
    }
}
