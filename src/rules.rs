// 🏷️ Entity Folder Rules - which lookup strategy applies to which record
//
// Company records resolve through the folder tree under the accreditation
// root; people and vehicles resolve through rows already persisted in the
// store. Every outcome carries the source that produced it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::FolderLayout;
use crate::directory::FolderDirectory;
use crate::models::{normalize, Category, FolderSource, InputRecord};
use crate::project::{AccreditationRoot, ParentContext, ProjectCode, ProjectPathResolver};
use crate::store::PersistedStore;

// ============================================================================
// REQUEST SCOPE
// ============================================================================

/// Per-request cache of the resolved project path. Owned by one request and
/// only touched by its sequential record loop.
#[derive(Debug)]
pub struct RequestScope {
    pub project_code: ProjectCode,
    pub project_id: Option<i64>,
    parent: Option<ParentContext>,
    parent_container_id: Option<String>,
    accreditation: Option<Option<AccreditationRoot>>,
    accreditation_lookups: usize,
}

impl RequestScope {
    pub fn new(project_code: ProjectCode, project_id: Option<i64>, parent: Option<ParentContext>) -> Self {
        let parent_container_id = parent.as_ref().map(|p| p.yearly_container_id.clone());
        RequestScope {
            project_code,
            project_id,
            parent,
            parent_container_id,
            accreditation: None,
            accreditation_lookups: 0,
        }
    }

    pub fn parent(&self) -> Option<&ParentContext> {
        self.parent.as_ref()
    }

    /// Yearly container id, possibly recovered while resolving the accreditation root.
    pub fn parent_container_id(&self) -> Option<&str> {
        self.parent_container_id.as_deref()
    }

    /// How many times the accreditation root was looked up (0 or 1).
    pub fn accreditation_lookups(&self) -> usize {
        self.accreditation_lookups
    }
}

// ============================================================================
// RESOLVED FOLDER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFolder {
    pub source: FolderSource,
    pub folder_id: Option<String>,
    pub worker_folder_id: Option<String>,
    pub driver_folder_id: Option<String>,
    pub vehicle_folder_id: Option<String>,
}

impl ResolvedFolder {
    pub fn unresolved() -> Self {
        ResolvedFolder {
            source: FolderSource::None,
            folder_id: None,
            worker_folder_id: None,
            driver_folder_id: None,
            vehicle_folder_id: None,
        }
    }

    fn company(folder_id: Option<String>) -> Self {
        ResolvedFolder {
            source: if folder_id.is_some() {
                FolderSource::CompanyFolder
            } else {
                FolderSource::None
            },
            folder_id,
            ..Self::unresolved()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.folder_id.is_some()
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub struct FolderRulesEngine {
    resolver: ProjectPathResolver,
    directory: Arc<dyn FolderDirectory>,
    store: Arc<dyn PersistedStore>,
}

impl FolderRulesEngine {
    pub fn new(directory: Arc<dyn FolderDirectory>, store: Arc<dyn PersistedStore>, layout: FolderLayout) -> Self {
        FolderRulesEngine {
            resolver: ProjectPathResolver::new(directory.clone(), layout),
            directory,
            store,
        }
    }

    pub fn resolver(&self) -> &ProjectPathResolver {
        &self.resolver
    }

    fn layout(&self) -> &FolderLayout {
        self.resolver.layout()
    }

    /// Resolve one record. Lookup failures degrade to "unresolved".
    pub async fn resolve(&self, record: &InputRecord, scope: &mut RequestScope) -> ResolvedFolder {
        match record.category {
            Category::Company => self.resolve_company(record, scope).await,
            Category::Vehicle => {
                let vehicle_folder_id = match (scope.project_id, record.plate.as_deref()) {
                    (Some(project_id), Some(plate)) => self.vehicle_folder_id(project_id, plate).await,
                    _ => {
                        warn!(record_id = record.id, "Vehicle record without project id or plate");
                        None
                    }
                };
                ResolvedFolder {
                    source: if vehicle_folder_id.is_some() {
                        FolderSource::PersistedVehicle
                    } else {
                        FolderSource::None
                    },
                    folder_id: vehicle_folder_id.clone(),
                    vehicle_folder_id,
                    ..ResolvedFolder::unresolved()
                }
            }
            Category::Person => self.resolve_person(record, scope).await,
        }
    }

    /// Accreditation root, looked up at most once per request.
    pub async fn accreditation_root(&self, scope: &mut RequestScope) -> Option<AccreditationRoot> {
        if scope.accreditation.is_none() {
            scope.accreditation_lookups += 1;
            let root = self
                .resolver
                .resolve_accreditation_root(scope.project_code.as_str(), scope.parent.as_ref())
                .await;

            if let Some(root) = &root {
                if scope.parent_container_id.is_none() {
                    debug!(
                        project_code = %scope.project_code,
                        container_id = %root.yearly_container_id,
                        "Parent container recovered from accreditation route"
                    );
                    scope.parent_container_id = Some(root.yearly_container_id.clone());
                }
            }
            scope.accreditation = Some(root);
        }
        scope.accreditation.clone().flatten()
    }

    async fn resolve_company(&self, record: &InputRecord, scope: &mut RequestScope) -> ResolvedFolder {
        let Some(root) = self.accreditation_root(scope).await else {
            warn!(
                project_code = %scope.project_code,
                record_id = record.id,
                "Accreditation root unavailable; company record left unresolved"
            );
            return ResolvedFolder::unresolved();
        };
        let container = Some(root.yearly_container_id.as_str());
        let layout = self.layout();

        let folder_id = if normalize(&record.company_name) == normalize(&layout.internal_company) {
            self.lookup(&layout.internal_folder, &root.accreditation_folder_id, container)
                .await
        } else {
            match self
                .lookup_with_hint(
                    &layout.externals_folder,
                    &layout.externals_folder_hint,
                    &root.accreditation_folder_id,
                    container,
                )
                .await
            {
                Some(externals_id) => self.lookup(&record.company_name, &externals_id, container).await,
                None => {
                    warn!(
                        project_code = %scope.project_code,
                        folder = %layout.externals_folder,
                        "Externals folder not found"
                    );
                    None
                }
            }
        };

        if folder_id.is_none() {
            warn!(record_id = record.id, company = %record.company_name, "Company folder not found");
        }
        ResolvedFolder::company(folder_id)
    }

    async fn resolve_person(&self, record: &InputRecord, scope: &mut RequestScope) -> ResolvedFolder {
        let Some(person_name) = record.person_name.as_deref() else {
            return ResolvedFolder::unresolved();
        };
        let project_code = scope.project_code.as_str();

        let worker_folder_id = self
            .store
            .worker_folder_id(project_code, person_name)
            .await
            .unwrap_or_else(|e| {
                error!(person_name, error = %e, "Worker lookup failed");
                None
            });
        let driver_folder_id = self
            .store
            .driver_folder_id(project_code, person_name)
            .await
            .unwrap_or_else(|e| {
                error!(person_name, error = %e, "Driver lookup failed");
                None
            });

        let mut resolved = ResolvedFolder {
            worker_folder_id: worker_folder_id.clone(),
            driver_folder_id: driver_folder_id.clone(),
            ..ResolvedFolder::unresolved()
        };

        if let Some(id) = worker_folder_id {
            resolved.source = FolderSource::PersistedWorker;
            resolved.folder_id = Some(id);
        } else if let Some(id) = driver_folder_id {
            resolved.source = FolderSource::PersistedDriver;
            resolved.folder_id = Some(id);
        } else if let (Some(plate), Some(project_id)) = (record.plate.as_deref(), scope.project_id) {
            resolved.vehicle_folder_id = self.vehicle_folder_id(project_id, plate).await;
            if let Some(id) = resolved.vehicle_folder_id.clone() {
                resolved.source = FolderSource::PersistedVehicle;
                resolved.folder_id = Some(id);
            }
        }
        resolved
    }

    async fn vehicle_folder_id(&self, project_id: i64, plate: &str) -> Option<String> {
        self.store
            .vehicle_folder_id(project_id, plate)
            .await
            .unwrap_or_else(|e| {
                error!(project_id, plate, error = %e, "Vehicle lookup failed");
                None
            })
    }

    async fn lookup(&self, name: &str, parent_id: &str, container_id: Option<&str>) -> Option<String> {
        self.lookup_with_hint(name, name, parent_id, container_id).await
    }

    async fn lookup_with_hint(
        &self,
        name: &str,
        hint: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> Option<String> {
        // An empty needle is a substring of every folder name.
        if name.trim().is_empty() || hint.trim().is_empty() {
            warn!(parent_id, "Blank folder name; lookup skipped");
            return None;
        }
        self.directory
            .find_folder_exact_or_hint(name, hint, parent_id, container_id)
            .await
            .unwrap_or_else(|e| {
                warn!(folder = name, parent_id, error = %e, "Folder lookup failed; treating as not found");
                None
            })
    }
}
