use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{tables, PersistedStore, RequirementUpdate};
use crate::error::{StoreError, StoreResult};

/// SQLite-backed store. One connection, serialised behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                codigo_proyecto TEXT NOT NULL,
                nombre_trabajador TEXT NOT NULL,
                drive_folder_id TEXT
            )",
            tables::WORKER
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                codigo_proyecto TEXT NOT NULL,
                nombre_trabajador TEXT NOT NULL,
                drive_folder_id TEXT
            )",
            tables::DRIVER
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                id_proyecto INTEGER NOT NULL,
                patente TEXT NOT NULL,
                drive_folder_id TEXT
            )",
            tables::VEHICLE
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                drive_folder_id TEXT,
                parent_drive_id TEXT,
                updated_at DATETIME
            )",
            tables::REQUIREMENT
        ),
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        &format!(
            "CREATE INDEX IF NOT EXISTS idx_worker_lookup ON {}(codigo_proyecto, nombre_trabajador)",
            tables::WORKER
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE INDEX IF NOT EXISTS idx_driver_lookup ON {}(codigo_proyecto, nombre_trabajador)",
            tables::DRIVER
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE INDEX IF NOT EXISTS idx_vehicle_lookup ON {}(id_proyecto, patente)",
            tables::VEHICLE
        ),
        [],
    )?;

    Ok(())
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ========================================================================
    // SEEDING (local runs and tests)
    // ========================================================================

    pub fn insert_worker(&self, project_code: &str, person_name: &str, folder_id: Option<&str>) -> StoreResult<()> {
        self.insert_person(tables::WORKER, project_code, person_name, folder_id)
    }

    pub fn insert_driver(&self, project_code: &str, person_name: &str, folder_id: Option<&str>) -> StoreResult<()> {
        self.insert_person(tables::DRIVER, project_code, person_name, folder_id)
    }

    fn insert_person(
        &self,
        table: &str,
        project_code: &str,
        person_name: &str,
        folder_id: Option<&str>,
    ) -> StoreResult<()> {
        self.conn()?.execute(
            &format!(
                "INSERT INTO {} (codigo_proyecto, nombre_trabajador, drive_folder_id) VALUES (?1, ?2, ?3)",
                table
            ),
            params![project_code, person_name, folder_id],
        )?;
        Ok(())
    }

    pub fn insert_vehicle(&self, project_id: i64, plate: &str, folder_id: Option<&str>) -> StoreResult<()> {
        self.conn()?.execute(
            &format!(
                "INSERT INTO {} (id_proyecto, patente, drive_folder_id) VALUES (?1, ?2, ?3)",
                tables::VEHICLE
            ),
            params![project_id, plate, folder_id],
        )?;
        Ok(())
    }

    pub fn insert_requirement(&self, id: i64) -> StoreResult<()> {
        self.conn()?.execute(
            &format!("INSERT INTO {} (id) VALUES (?1)", tables::REQUIREMENT),
            params![id],
        )?;
        Ok(())
    }

    /// (drive_folder_id, parent_drive_id) of a requirement row.
    pub fn requirement(&self, id: i64) -> StoreResult<Option<(Option<String>, Option<String>)>> {
        let row = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT drive_folder_id, parent_drive_id FROM {} WHERE id = ?1",
                    tables::REQUIREMENT
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn person_folder_id(&self, table: &str, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
        let folder_id: Option<Option<String>> = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT drive_folder_id FROM {} WHERE codigo_proyecto = ?1 AND nombre_trabajador = ?2 LIMIT 1",
                    table
                ),
                params![project_code, person_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(folder_id.flatten())
    }
}

#[async_trait]
impl PersistedStore for SqliteStore {
    async fn worker_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
        self.person_folder_id(tables::WORKER, project_code, person_name)
    }

    async fn driver_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
        self.person_folder_id(tables::DRIVER, project_code, person_name)
    }

    async fn vehicle_folder_id(&self, project_id: i64, plate: &str) -> StoreResult<Option<String>> {
        let folder_id: Option<Option<String>> = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT drive_folder_id FROM {} WHERE id_proyecto = ?1 AND patente = ?2 LIMIT 1",
                    tables::VEHICLE
                ),
                params![project_id, plate.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(folder_id.flatten())
    }

    async fn update_requirement(&self, id: i64, update: &RequirementUpdate) -> StoreResult<usize> {
        let affected = self.conn()?.execute(
            &format!(
                "UPDATE {}
                 SET drive_folder_id = COALESCE(?1, drive_folder_id),
                     parent_drive_id = COALESCE(?2, parent_drive_id),
                     updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?3",
                tables::REQUIREMENT
            ),
            params![update.folder_id, update.parent_container_id, id],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_person_lookups() {
        let store = store();
        store.insert_worker("MY-000-2026", "Alan Flores", Some("w-1")).unwrap();
        store.insert_driver("MY-000-2026", "Pedrito", Some("d-1")).unwrap();

        assert_eq!(
            store.worker_folder_id("MY-000-2026", "Alan Flores").await.unwrap(),
            Some("w-1".to_string())
        );
        assert_eq!(store.worker_folder_id("MY-000-2026", "Pedrito").await.unwrap(), None);
        assert_eq!(
            store.driver_folder_id("MY-000-2026", "Pedrito").await.unwrap(),
            Some("d-1".to_string())
        );
        assert_eq!(store.driver_folder_id("MY-001-2026", "Pedrito").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_null_folder_id_reads_as_absent() {
        let store = store();
        store.insert_worker("MY-000-2026", "Angel Galaz", None).unwrap();
        assert_eq!(store.worker_folder_id("MY-000-2026", "Angel Galaz").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_vehicle_lookup_trims_plate() {
        let store = store();
        store.insert_vehicle(12, "ABCD12", Some("v-1")).unwrap();

        assert_eq!(store.vehicle_folder_id(12, " ABCD12 ").await.unwrap(), Some("v-1".to_string()));
        assert_eq!(store.vehicle_folder_id(13, "ABCD12").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_column() {
        let store = store();
        store.insert_requirement(1).unwrap();

        let affected = store
            .update_requirement(1, &RequirementUpdate::new(Some("f-1"), Some("drive-1")))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        store
            .update_requirement(1, &RequirementUpdate::new(None, Some("drive-2")))
            .await
            .unwrap();
        assert_eq!(
            store.requirement(1).unwrap(),
            Some((Some("f-1".to_string()), Some("drive-2".to_string())))
        );
    }

    #[tokio::test]
    async fn test_update_missing_row_affects_nothing() {
        let store = store();
        let affected = store
            .update_requirement(404, &RequirementUpdate::new(Some("f-1"), None))
            .await
            .unwrap();
        assert_eq!(affected, 0);
        assert_eq!(store.requirement(404).unwrap(), None);
    }
}
