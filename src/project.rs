// 🗂️ Project Path Resolver
//
// Project code → yearly container → project folder → fixed route down to the
// accreditation folder.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FolderLayout;
use crate::directory::FolderDirectory;
use crate::error::ValidationError;

// ============================================================================
// PROJECT CODE
// ============================================================================

/// A validated `{PREFIX}-NNN-YYYY` project code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCode {
    code: String,
    year: String,
}

impl ProjectCode {
    /// One-off parse. Hot paths hold a [`ProjectCodePattern`] instead.
    pub fn parse(raw: &str, prefix: &str) -> Result<Self, ValidationError> {
        ProjectCodePattern::new(prefix).parse(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn year(&self) -> &str {
        &self.year
    }
}

impl std::fmt::Display for ProjectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code)
    }
}

/// `^{PREFIX}-NNN-(YYYY)$`, compiled once per layout.
#[derive(Debug, Clone)]
pub struct ProjectCodePattern {
    prefix: String,
    re: Result<Regex, regex::Error>,
}

impl ProjectCodePattern {
    pub fn new(prefix: &str) -> Self {
        let pattern = format!(r"^{}-\d{{3}}-(\d{{4}})$", regex::escape(prefix));
        ProjectCodePattern {
            prefix: prefix.to_string(),
            re: Regex::new(&pattern),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn parse(&self, raw: &str) -> Result<ProjectCode, ValidationError> {
        let re = self
            .re
            .as_ref()
            .map_err(|e| ValidationError::single(format!("invalid project code prefix: {}", e)))?;

        let captures = re.captures(raw).ok_or_else(|| {
            ValidationError::single(format!(
                "project_code '{}' must match the format {}-NNN-YYYY",
                raw, self.prefix
            ))
        })?;

        Ok(ProjectCode {
            code: raw.to_string(),
            year: captures[1].to_string(),
        })
    }
}

// ============================================================================
// RESOLVED CONTEXTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentContext {
    pub yearly_container_id: String,
    pub container_name: String,
    pub year: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccreditationRoot {
    pub yearly_container_id: String,
    pub accreditation_folder_id: String,
    pub project_code: String,
    pub year: String,
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct ProjectPathResolver {
    directory: Arc<dyn FolderDirectory>,
    layout: FolderLayout,
    code_pattern: ProjectCodePattern,
}

impl ProjectPathResolver {
    pub fn new(directory: Arc<dyn FolderDirectory>, layout: FolderLayout) -> Self {
        let code_pattern = ProjectCodePattern::new(&layout.project_code_prefix);
        ProjectPathResolver {
            directory,
            layout,
            code_pattern,
        }
    }

    pub fn layout(&self) -> &FolderLayout {
        &self.layout
    }

    pub fn code_pattern(&self) -> &ProjectCodePattern {
        &self.code_pattern
    }

    pub fn container_name(&self, year: &str) -> String {
        format!("{} {}", self.layout.container_prefix, year)
    }

    /// Yearly container for a project code. Malformed codes never reach the
    /// folder service.
    pub async fn resolve_parent_context(&self, project_code: &str) -> Option<ParentContext> {
        let code = match self.code_pattern.parse(project_code) {
            Ok(code) => code,
            Err(e) => {
                warn!(project_code, error = %e, "Project code rejected");
                return None;
            }
        };

        let container_name = self.container_name(code.year());
        match self.directory.find_container_by_name(&container_name).await {
            Ok(Some(id)) => {
                debug!(project_code, container = %container_name, container_id = %id, "Yearly container resolved");
                Some(ParentContext {
                    yearly_container_id: id,
                    container_name,
                    year: code.year().to_string(),
                })
            }
            Ok(None) => {
                warn!(project_code, container = %container_name, "Yearly container not found");
                None
            }
            Err(e) => {
                warn!(project_code, container = %container_name, error = %e, "Yearly container lookup failed");
                None
            }
        }
    }

    /// Walk project folder → route segments. Reuses `parent` when given.
    pub async fn resolve_accreditation_root(
        &self,
        project_code: &str,
        parent: Option<&ParentContext>,
    ) -> Option<AccreditationRoot> {
        let resolved;
        let parent = match parent {
            Some(parent) => parent,
            None => {
                resolved = self.resolve_parent_context(project_code).await?;
                &resolved
            }
        };
        let container_id = parent.yearly_container_id.as_str();

        let project_folder = self
            .resolve_segment(&[project_code.to_string()], container_id, container_id)
            .await;
        let Some(mut current) = project_folder else {
            warn!(project_code, container = %parent.container_name, "Project folder not found");
            return None;
        };

        for (level, variants) in self.layout.route.iter().enumerate() {
            match self.resolve_segment(variants, &current, container_id).await {
                Some(id) => {
                    debug!(project_code, level = level + 1, segment = ?variants, folder_id = %id, "Route segment resolved");
                    current = id;
                }
                None => {
                    warn!(project_code, level = level + 1, segment = ?variants, "Route segment not found");
                    return None;
                }
            }
        }

        info!(project_code, accreditation_folder_id = %current, "Accreditation root resolved");
        Some(AccreditationRoot {
            yearly_container_id: container_id.to_string(),
            accreditation_folder_id: current,
            project_code: project_code.to_string(),
            year: parent.year.clone(),
        })
    }

    /// Every spelling exactly, then every spelling as a substring.
    async fn resolve_segment(
        &self,
        variants: &[String],
        parent_id: &str,
        container_id: &str,
    ) -> Option<String> {
        for variant in variants {
            match self
                .directory
                .find_folder_exact(variant, parent_id, Some(container_id))
                .await
            {
                Ok(Some(id)) => return Some(id),
                Ok(None) => {}
                Err(e) => {
                    warn!(segment = %variant, parent_id, error = %e, "Segment lookup failed");
                    return None;
                }
            }
        }
        for variant in variants {
            match self
                .directory
                .find_folder_contains(variant, parent_id, Some(container_id))
                .await
            {
                Ok(Some(id)) => return Some(id),
                Ok(None) => {}
                Err(e) => {
                    warn!(segment = %variant, parent_id, error = %e, "Segment lookup failed");
                    return None;
                }
            }
        }
        None
    }
}
