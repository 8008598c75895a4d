// 🏗️ Folder Provisioning - build the per-company / per-person folder tree
//
// External companies get their whole subtree created on demand. The internal
// company folder and its category folders must already exist; only the
// per-person and per-vehicle folders below them are created.
//
// Every create is check-then-create, so two concurrent requests for the same
// project can both create a folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::FolderLayout;
use crate::directory::FolderDirectory;
use crate::error::ProvisionError;
use crate::models::{ExternalRosterRequest, ProvisionRequest, Roster, RosterEntry};
use crate::project::{ProjectCode, ProjectPathResolver};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFolder {
    pub name: String,
    pub folder_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFolders {
    pub company: String,
    pub externals_folder_id: String,
    pub company_folder_id: String,
    pub category_folders: Vec<CategoryFolder>,
    pub roster: Roster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalFolders {
    /// None when the internal folder does not exist; nothing is created then.
    pub internal_folder_id: Option<String>,
    pub category_folders: Vec<CategoryFolder>,
    pub roster: Roster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub project_code: String,
    pub year: String,
    pub container_name: String,
    pub parent_container_id: String,
    pub accreditation_folder_id: String,
    pub external: Option<ExternalFolders>,
    pub internal: Option<InternalFolders>,
    pub message: String,
    pub processed_at: DateTime<Utc>,
}

pub struct FolderProvisioner {
    directory: Arc<dyn FolderDirectory>,
    resolver: ProjectPathResolver,
}

impl FolderProvisioner {
    pub fn new(directory: Arc<dyn FolderDirectory>, layout: FolderLayout) -> Self {
        FolderProvisioner {
            resolver: ProjectPathResolver::new(directory.clone(), layout),
            directory,
        }
    }

    fn layout(&self) -> &FolderLayout {
        self.resolver.layout()
    }

    pub async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionResponse, ProvisionError> {
        let code = self.resolver.code_pattern().parse(request.project_code.trim())?;
        let span = info_span!("provision_folders", request_id = %Uuid::new_v4(), project_code = %code);
        self.run(code, request).instrument(span).await
    }

    async fn run(&self, code: ProjectCode, request: ProvisionRequest) -> Result<ProvisionResponse, ProvisionError> {
        let parent = self
            .resolver
            .resolve_parent_context(code.as_str())
            .await
            .ok_or_else(|| ProvisionError::ContainerNotFound(self.resolver.container_name(code.year())))?;
        let root = self
            .resolver
            .resolve_accreditation_root(code.as_str(), Some(&parent))
            .await
            .ok_or_else(|| ProvisionError::RouteNotFound(code.to_string()))?;
        let container = parent.yearly_container_id.as_str();

        let external = match request.external {
            Some(external) if !external.company.trim().is_empty() => Some(
                self.provision_external(external, &root.accreditation_folder_id, container)
                    .await?,
            ),
            _ => None,
        };

        let internal_roster = Roster::from(request.internal);
        let internal = if internal_roster.is_empty() {
            None
        } else {
            Some(
                self.provision_internal(internal_roster, &root.accreditation_folder_id, container)
                    .await?,
            )
        };

        info!(
            external = external.is_some(),
            internal = internal.is_some(),
            "Folder provisioning finished"
        );

        Ok(ProvisionResponse {
            project_code: code.to_string(),
            year: parent.year.clone(),
            container_name: parent.container_name.clone(),
            parent_container_id: parent.yearly_container_id.clone(),
            accreditation_folder_id: root.accreditation_folder_id,
            external,
            internal,
            message: "Folders provisioned".to_string(),
            processed_at: Utc::now(),
        })
    }

    async fn provision_external(
        &self,
        request: ExternalRosterRequest,
        accreditation_id: &str,
        container: &str,
    ) -> Result<ExternalFolders, ProvisionError> {
        let layout = self.layout();
        let container = Some(container);

        let externals_folder_id = match self
            .directory
            .find_folder_exact_or_hint(
                &layout.externals_folder,
                &layout.externals_folder_hint,
                accreditation_id,
                container,
            )
            .await?
        {
            Some(id) => id,
            None => {
                info!(folder = %layout.externals_folder, "Creating externals folder");
                self.directory
                    .create_folder(&layout.externals_folder, accreditation_id, container)
                    .await?
            }
        };

        let company = request.company.trim().to_string();
        let company_folder_id = self
            .directory
            .find_or_create_folder(&company, &externals_folder_id, container)
            .await?;

        let mut category_folders = Vec::with_capacity(layout.company_category_folders.len());
        for name in &layout.company_category_folders {
            let folder_id = self
                .directory
                .find_or_create_folder(name, &company_folder_id, container)
                .await?;
            category_folders.push(CategoryFolder {
                name: name.clone(),
                folder_id,
            });
        }

        // First category folder holds company documents; the rest map onto
        // the roster groups.
        let mut roster = Roster::from(request.roster);
        for (group, category) in roster.groups_mut().into_iter().zip(category_folders.iter().skip(1)) {
            self.fill_group(group, &category.folder_id, container).await?;
        }

        info!(%company, company_folder_id = %company_folder_id, "External company folders ready");
        Ok(ExternalFolders {
            company,
            externals_folder_id,
            company_folder_id,
            category_folders,
            roster,
        })
    }

    async fn provision_internal(
        &self,
        mut roster: Roster,
        accreditation_id: &str,
        container: &str,
    ) -> Result<InternalFolders, ProvisionError> {
        let layout = self.layout();
        let container = Some(container);

        let Some(internal_folder_id) = self
            .directory
            .find_folder_contains(&layout.internal_folder_hint, accreditation_id, container)
            .await?
        else {
            warn!(hint = %layout.internal_folder_hint, "Internal company folder not found; nothing provisioned");
            return Ok(InternalFolders {
                internal_folder_id: None,
                category_folders: Vec::new(),
                roster,
            });
        };

        let mut category_folders = Vec::new();
        for (group, hint) in roster.groups_mut().into_iter().zip(layout.internal_category_hints.iter()) {
            if group.is_empty() {
                continue;
            }
            match self
                .directory
                .find_folder_contains(hint, &internal_folder_id, container)
                .await?
            {
                Some(folder_id) => {
                    self.fill_group(group, &folder_id, container).await?;
                    category_folders.push(CategoryFolder {
                        name: hint.clone(),
                        folder_id,
                    });
                }
                None => warn!(%hint, "Internal category folder not found; entries skipped"),
            }
        }

        Ok(InternalFolders {
            internal_folder_id: Some(internal_folder_id),
            category_folders,
            roster,
        })
    }

    async fn fill_group(
        &self,
        group: &mut [RosterEntry],
        parent_id: &str,
        container: Option<&str>,
    ) -> Result<(), ProvisionError> {
        for entry in group.iter_mut() {
            let folder_id = self
                .directory
                .find_or_create_folder(&entry.name, parent_id, container)
                .await?;
            entry.folder_id = Some(folder_id);
        }
        Ok(())
    }
}
