// 🔁 Assignment Engine - one request, start to finish
//
// validate → parent context (once) → per record: resolve → write → summary

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::FolderLayout;
use crate::directory::FolderDirectory;
use crate::error::ValidationError;
use crate::models::{AssignFolderRequest, AssignFolderResponse, RecordOutcome, Summary, ValidatedRequest};
use crate::reconciliation::ReconciliationWriter;
use crate::rules::{FolderRulesEngine, RequestScope};
use crate::store::PersistedStore;

pub struct AssignmentEngine {
    rules: FolderRulesEngine,
    writer: ReconciliationWriter,
}

impl AssignmentEngine {
    pub fn new(directory: Arc<dyn FolderDirectory>, store: Arc<dyn PersistedStore>, layout: FolderLayout) -> Self {
        AssignmentEngine {
            rules: FolderRulesEngine::new(directory, store.clone(), layout),
            writer: ReconciliationWriter::new(store),
        }
    }

    pub fn layout(&self) -> &FolderLayout {
        self.rules.resolver().layout()
    }

    /// Resolve and persist a folder id for every record of the request.
    ///
    /// Only validation fails the call; per-record problems end up in the
    /// summary.
    pub async fn assign(&self, request: AssignFolderRequest) -> Result<AssignFolderResponse, ValidationError> {
        let validated = request.validate(self.rules.resolver().code_pattern())?;

        let span = info_span!(
            "assign_folder",
            request_id = %Uuid::new_v4(),
            project_code = %validated.project_code,
            records = validated.records.len()
        );
        Ok(self.process(validated).instrument(span).await)
    }

    async fn process(&self, request: ValidatedRequest) -> AssignFolderResponse {
        let parent = self
            .rules
            .resolver()
            .resolve_parent_context(request.project_code.as_str())
            .await;
        if parent.is_none() {
            warn!("Yearly container unavailable; will try to recover it from the accreditation route");
        }

        let mut scope = RequestScope::new(request.project_code.clone(), request.project_id, parent);
        let mut summary = Summary {
            total: request.records.len(),
            ..Summary::default()
        };
        let mut outcomes = Vec::with_capacity(request.records.len());

        for record in &request.records {
            let resolved = self.rules.resolve(record, &mut scope).await;

            let updated = match resolved.folder_id.as_deref() {
                Some(folder_id) => {
                    let written = self
                        .writer
                        .apply_resolution(record.id, Some(folder_id), scope.parent_container_id())
                        .await;
                    if written {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    written
                }
                None => {
                    summary.unresolved += 1;
                    warn!(
                        record_id = record.id,
                        category = %record.raw_category,
                        "No folder id found for record"
                    );
                    if let Some(parent_id) = scope.parent_container_id() {
                        self.writer.apply_resolution(record.id, None, Some(parent_id)).await;
                    }
                    false
                }
            };

            outcomes.push(RecordOutcome {
                id: record.id,
                person_name: record.person_name.clone(),
                folder_id_worker: resolved.worker_folder_id,
                folder_id_driver: resolved.driver_folder_id,
                folder_id_vehicle: resolved.vehicle_folder_id,
                folder_id_final: resolved.folder_id,
                source: resolved.source,
                updated,
            });
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            unresolved = summary.unresolved,
            "Assignment finished"
        );

        AssignFolderResponse {
            project_code: request.project_code.to_string(),
            parent_container_id: scope.parent_container_id().map(str::to_string),
            message: summary.message(),
            records: outcomes,
            summary,
            processed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::error::StoreResult;
    use crate::models::{FolderSource, RecordRequest};
    use crate::store::{RequirementUpdate, SqliteStore};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// SQLite store that also keeps every requirement update it was sent.
    struct RecordingStore {
        inner: SqliteStore,
        updates: Mutex<Vec<(i64, RequirementUpdate)>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            RecordingStore {
                inner: SqliteStore::open_in_memory().unwrap(),
                updates: Mutex::new(Vec::new()),
            }
        }

        fn updates(&self) -> Vec<(i64, RequirementUpdate)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PersistedStore for RecordingStore {
        async fn worker_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
            self.inner.worker_folder_id(project_code, person_name).await
        }

        async fn driver_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
            self.inner.driver_folder_id(project_code, person_name).await
        }

        async fn vehicle_folder_id(&self, project_id: i64, plate: &str) -> StoreResult<Option<String>> {
            self.inner.vehicle_folder_id(project_id, plate).await
        }

        async fn update_requirement(&self, id: i64, update: &RequirementUpdate) -> StoreResult<usize> {
            self.updates.lock().unwrap().push((id, update.clone()));
            self.inner.update_requirement(id, update).await
        }
    }

    struct Fixture {
        dir: Arc<InMemoryDirectory>,
        store: Arc<RecordingStore>,
        engine: AssignmentEngine,
        drive: String,
        accreditation: String,
    }

    fn fixture() -> Fixture {
        let dir = Arc::new(InMemoryDirectory::new());
        let drive = dir.add_container("Proyectos 2026");
        let accreditation = dir.add_path(
            &drive,
            &["MY-000-2026", "08 Terrenos", "03 Acreditación y Arranque", "01 Acreditación"],
        );
        let store = Arc::new(RecordingStore::new());
        for id in 1..=5 {
            store.inner.insert_requirement(id).unwrap();
        }
        let engine = AssignmentEngine::new(dir.clone(), store.clone(), FolderLayout::default());
        Fixture {
            dir,
            store,
            engine,
            drive,
            accreditation,
        }
    }

    fn record(id: i64, category: &str, company: &str, person: Option<&str>) -> RecordRequest {
        RecordRequest {
            id,
            category: category.to_string(),
            company_name: company.to_string(),
            person_name: person.map(str::to_string),
            plate: None,
        }
    }

    fn request(records: Vec<RecordRequest>) -> AssignFolderRequest {
        AssignFolderRequest {
            project_code: "MY-000-2026".to_string(),
            project_id: None,
            records,
        }
    }

    #[tokio::test]
    async fn test_internal_company_end_to_end() {
        let fx = fixture();
        let myma = fx.dir.add_folder("02 MYMA", &fx.accreditation);

        let response = fx
            .engine
            .assign(request(vec![record(1, "Empresa", "Myma", Some("Alan Flores"))]))
            .await
            .unwrap();

        assert_eq!(response.summary.succeeded, 1);
        assert_eq!(response.records[0].folder_id_final.as_deref(), Some(myma.as_str()));
        assert_eq!(response.records[0].source, FolderSource::CompanyFolder);
        assert!(response.records[0].updated);
        assert_eq!(response.parent_container_id.as_deref(), Some(fx.drive.as_str()));
        assert_eq!(response.message, "All records were updated successfully");
        assert_eq!(
            fx.store.inner.requirement(1).unwrap(),
            Some((Some(myma), Some(fx.drive.clone())))
        );
        assert_eq!(fx.dir.calls_targeting("01 Externos"), 0);
    }

    #[tokio::test]
    async fn test_unmatched_person_gets_parent_only_write() {
        let fx = fixture();

        let response = fx
            .engine
            .assign(request(vec![record(2, "Trabajador", "AGQ", Some("Nadie"))]))
            .await
            .unwrap();

        assert_eq!(response.summary.unresolved, 1);
        assert_eq!(response.summary.succeeded, 0);
        assert!(response.records[0].folder_id_final.is_none());
        assert!(!response.records[0].updated);
        assert_eq!(response.records[0].source, FolderSource::None);

        let updates = fx.store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0], (2, RequirementUpdate::new(None, Some(fx.drive.as_str()))));
    }

    #[tokio::test]
    async fn test_unresolved_without_parent_writes_nothing() {
        let dir = Arc::new(InMemoryDirectory::new());
        let store = Arc::new(RecordingStore::new());
        let engine = AssignmentEngine::new(dir.clone(), store.clone(), FolderLayout::default());

        let response = engine
            .assign(request(vec![record(3, "Conductor", "AGQ", Some("Nadie"))]))
            .await
            .unwrap();

        assert!(response.parent_container_id.is_none());
        assert_eq!(response.summary.unresolved, 1);
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_worker_beats_driver() {
        let fx = fixture();
        fx.store.inner.insert_worker("MY-000-2026", "Alan Flores", Some("w-1")).unwrap();
        fx.store.inner.insert_driver("MY-000-2026", "Alan Flores", Some("d-1")).unwrap();

        let response = fx
            .engine
            .assign(request(vec![record(1, "Trabajador", "Myma", Some("Alan Flores"))]))
            .await
            .unwrap();

        let outcome = &response.records[0];
        assert_eq!(outcome.folder_id_final.as_deref(), Some("w-1"));
        assert_eq!(outcome.folder_id_worker.as_deref(), Some("w-1"));
        assert_eq!(outcome.folder_id_driver.as_deref(), Some("d-1"));
        assert_eq!(outcome.source, FolderSource::PersistedWorker);
    }

    #[tokio::test]
    async fn test_parent_context_resolved_once_per_request() {
        let fx = fixture();
        fx.dir.add_folder("02 MYMA", &fx.accreditation);
        let externos = fx.dir.add_folder("01 Externos", &fx.accreditation);
        fx.dir.add_folder("AGQ", &externos);

        let response = fx
            .engine
            .assign(request(vec![
                record(1, "Empresa", "Myma", None),
                record(2, "Empresa", "AGQ", None),
                record(3, "Trabajador", "AGQ", Some("Nadie")),
                record(4, "Empresa", " myma ", None),
            ]))
            .await
            .unwrap();

        assert_eq!(response.summary.total, 4);
        assert_eq!(response.summary.succeeded, 3);
        assert_eq!(response.summary.unresolved, 1);
        assert_eq!(response.message, "Updated 3 of 4 records");
        assert_eq!(fx.dir.calls_targeting("Proyectos 2026"), 1);
        assert_eq!(fx.dir.calls_targeting("MY-000-2026"), 1);
    }

    #[tokio::test]
    async fn test_exhausted_lookup_only_affects_its_record() {
        let fx = fixture();
        let myma = fx.dir.add_folder("02 MYMA", &fx.accreditation);
        let externos = fx.dir.add_folder("01 Externos", &fx.accreditation);
        fx.dir.add_folder("AGQ", &externos);
        fx.dir.fail_under(&externos);

        let response = fx
            .engine
            .assign(request(vec![
                record(1, "Empresa", "AGQ", None),
                record(2, "Empresa", "Myma", None),
            ]))
            .await
            .unwrap();

        assert!(response.records[0].folder_id_final.is_none());
        assert_eq!(response.records[1].folder_id_final, Some(myma));
        assert_eq!(response.summary.succeeded, 1);
        assert_eq!(response.summary.unresolved, 1);
    }

    #[tokio::test]
    async fn test_missing_requirement_row_counts_as_failed() {
        let fx = fixture();
        fx.dir.add_folder("02 MYMA", &fx.accreditation);

        let response = fx
            .engine
            .assign(request(vec![record(99, "Empresa", "Myma", None)]))
            .await
            .unwrap();

        assert_eq!(response.summary.failed, 1);
        assert!(!response.records[0].updated);
        assert!(response.records[0].folder_id_final.is_some());
        assert_eq!(response.message, "No record could be updated");
    }

    #[tokio::test]
    async fn test_unavailable_container_leaves_records_unresolved() {
        let fx = fixture();
        fx.dir.add_folder("02 MYMA", &fx.accreditation);
        fx.dir.fail_container_lookups();

        let response = fx
            .engine
            .assign(request(vec![record(1, "Empresa", "Myma", None)]))
            .await
            .unwrap();

        assert!(response.parent_container_id.is_none());
        assert_eq!(response.summary.unresolved, 1);
        assert!(fx.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_remote_call() {
        let fx = fixture();
        let mut bad = request(vec![record(1, "Vehiculo", "AGQ", None)]);
        bad.project_code = "INVALID-CODE".to_string();

        let err = fx.engine.assign(bad).await.unwrap_err();
        assert_eq!(err.problems.len(), 3);
        assert_eq!(fx.dir.call_count(), 0);
        assert!(fx.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_company_without_name_is_rejected() {
        let fx = fixture();
        let externos = fx.dir.add_folder("01 Externos", &fx.accreditation);
        fx.dir.add_folder("AGQ", &externos);
        let json = r#"{"project_code": "MY-000-2026", "records": [{"id": 1, "category": "Empresa"}]}"#;
        let req: AssignFolderRequest = serde_json::from_str(json).unwrap();

        let err = fx.engine.assign(req).await.unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("company_name"));
        assert_eq!(fx.dir.call_count(), 0);
        assert!(fx.store.updates().is_empty());
        assert_eq!(fx.store.inner.requirement(1).unwrap(), Some((None, None)));
    }

    #[tokio::test]
    async fn test_repeated_request_is_stable() {
        let fx = fixture();
        let externos = fx.dir.add_folder("01 Externos", &fx.accreditation);
        fx.dir.add_folder("AGQ Ltda", &externos);
        fx.store.inner.insert_driver("MY-000-2026", "Diego", Some("d-2")).unwrap();
        let records = || {
            vec![
                record(1, "Empresa", "AGQ", None),
                record(2, "Conductor", "AGQ", Some("Diego")),
            ]
        };

        let first = fx.engine.assign(request(records())).await.unwrap();
        let second = fx.engine.assign(request(records())).await.unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(first.summary, second.summary);
    }
}
