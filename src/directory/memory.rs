// 🧪 In-memory folder tree
//
// Behaves like the remote service (name-ordered listings, exact/contains
// lookups, non-idempotent creates) and records every call so callers can
// assert on what was asked of the service.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{first_containing, FolderDirectory, FolderEntry, MAX_LIST_RESULTS};
use crate::error::{DirectoryError, DirectoryResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    FindContainer { name: String },
    ListFolders { parent_id: String },
    FindExact { name: String, parent_id: String },
    FindContains { needle: String, parent_id: String },
    Create { name: String, parent_id: String },
}

impl DirectoryCall {
    /// Name or needle the call searched for / created, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            DirectoryCall::FindContainer { name }
            | DirectoryCall::FindExact { name, .. }
            | DirectoryCall::Create { name, .. } => Some(name),
            DirectoryCall::FindContains { needle, .. } => Some(needle),
            DirectoryCall::ListFolders { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    name: String,
    parent_id: String,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<FolderEntry>,
    folders: Vec<Node>,
    next_id: u64,
    created: usize,
    calls: Vec<DirectoryCall>,
    failing_parents: HashSet<String>,
    containers_failing: bool,
}

impl State {
    fn allocate(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", kind, self.next_id)
    }

    fn children(&self, parent_id: &str) -> Vec<FolderEntry> {
        let mut entries: Vec<FolderEntry> = self
            .folders
            .iter()
            .filter(|node| node.parent_id == parent_id)
            .map(|node| FolderEntry {
                name: node.name.clone(),
                id: node.id.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.truncate(MAX_LIST_RESULTS);
        entries
    }

    fn check_parent(&self, operation: &str, parent_id: &str) -> DirectoryResult<()> {
        if self.failing_parents.contains(parent_id) {
            return Err(exhausted(operation));
        }
        Ok(())
    }
}

fn exhausted(operation: &str) -> DirectoryError {
    DirectoryError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: 5,
        last: Box::new(DirectoryError::RateLimited { status: 429 }),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<State>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a container and return its id.
    pub fn add_container(&self, name: &str) -> String {
        let mut state = self.state();
        let id = state.allocate("drive");
        state.containers.push(FolderEntry {
            name: name.to_string(),
            id: id.clone(),
        });
        id
    }

    /// Add a folder under `parent_id` (a container or folder id) and return its id.
    pub fn add_folder(&self, name: &str, parent_id: &str) -> String {
        let mut state = self.state();
        let id = state.allocate("folder");
        state.folders.push(Node {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        });
        id
    }

    /// Add a chain of nested folders and return the id of the last one.
    pub fn add_path(&self, parent_id: &str, names: &[&str]) -> String {
        names
            .iter()
            .fold(parent_id.to_string(), |parent, name| self.add_folder(name, &parent))
    }

    /// Every operation under `parent_id` fails as if retries were exhausted.
    pub fn fail_under(&self, parent_id: &str) {
        self.state().failing_parents.insert(parent_id.to_string());
    }

    /// Container lookups fail as if retries were exhausted.
    pub fn fail_container_lookups(&self) {
        self.state().containers_failing = true;
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Calls whose searched/created name equals `target`.
    pub fn calls_targeting(&self, target: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.target() == Some(target))
            .count()
    }

    pub fn created_count(&self) -> usize {
        self.state().created
    }

    /// Names of the direct children of `parent_id`, in listing order.
    pub fn child_names(&self, parent_id: &str) -> Vec<String> {
        self.state()
            .children(parent_id)
            .into_iter()
            .map(|entry| entry.name)
            .collect()
    }
}

#[async_trait]
impl FolderDirectory for InMemoryDirectory {
    async fn find_container_by_name(&self, name: &str) -> DirectoryResult<Option<String>> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::FindContainer {
            name: name.to_string(),
        });
        if state.containers_failing {
            return Err(exhausted("drives.list"));
        }
        Ok(state
            .containers
            .iter()
            .find(|container| container.name == name)
            .map(|container| container.id.clone()))
    }

    async fn list_folders(
        &self,
        parent_id: &str,
        _container_id: Option<&str>,
    ) -> DirectoryResult<Vec<FolderEntry>> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::ListFolders {
            parent_id: parent_id.to_string(),
        });
        state.check_parent("files.list", parent_id)?;
        Ok(state.children(parent_id))
    }

    async fn find_folder_exact(
        &self,
        name: &str,
        parent_id: &str,
        _container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::FindExact {
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        });
        state.check_parent("files.list", parent_id)?;
        Ok(state
            .children(parent_id)
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id))
    }

    async fn find_folder_contains(
        &self,
        needle: &str,
        parent_id: &str,
        _container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::FindContains {
            needle: needle.to_string(),
            parent_id: parent_id.to_string(),
        });
        state.check_parent("files.list", parent_id)?;
        let entries = state.children(parent_id);
        Ok(first_containing(&entries, needle).map(|entry| entry.id.clone()))
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
        _container_id: Option<&str>,
    ) -> DirectoryResult<String> {
        let mut state = self.state();
        state.calls.push(DirectoryCall::Create {
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        });
        state.check_parent("files.create", parent_id)?;
        let id = state.allocate("folder");
        state.folders.push(Node {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.to_string(),
        });
        state.created += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_is_name_ordered() {
        let dir = InMemoryDirectory::new();
        let drive = dir.add_container("Proyectos 2026");
        dir.add_folder("Zeta", &drive);
        dir.add_folder("Alfa", &drive);

        let names: Vec<String> = dir
            .list_folders(&drive, Some(&drive))
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["Alfa", "Zeta"]);
    }

    #[tokio::test]
    async fn test_create_is_not_idempotent() {
        let dir = InMemoryDirectory::new();
        let drive = dir.add_container("Proyectos 2026");

        let first = dir.create_folder("AGQ", &drive, Some(&drive)).await.unwrap();
        let second = dir.create_folder("AGQ", &drive, Some(&drive)).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(dir.child_names(&drive), vec!["AGQ", "AGQ"]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let dir = InMemoryDirectory::new();
        let drive = dir.add_container("Proyectos 2026");
        dir.fail_under(&drive);

        let result = dir.find_folder_exact("MY-000-2026", &drive, Some(&drive)).await;
        assert!(matches!(result, Err(DirectoryError::RetriesExhausted { .. })));
        assert_eq!(dir.calls_targeting("MY-000-2026"), 1);
    }

    #[test]
    fn test_add_path_nests() {
        let dir = InMemoryDirectory::new();
        let drive = dir.add_container("Proyectos 2026");
        let leaf = dir.add_path(&drive, &["MY-000-2026", "08 Terrenos"]);

        let project = dir.state().children(&drive)[0].id.clone();
        assert_eq!(dir.child_names(&project), vec!["08 Terrenos"]);
        assert_eq!(dir.state().children(&project)[0].id, leaf);
    }
}
