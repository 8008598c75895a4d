// 📁 Folder Directory - read/search/create against the remote folder tree
//
// Containers are shared drives; folders live inside one container and may be
// nested. `container_id` scopes a query to one container when known.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryResult;

pub mod drive;
pub mod memory;
pub mod retry;

pub use drive::{DriveClient, DriveSession};
pub use memory::{DirectoryCall, InMemoryDirectory};
pub use retry::RetryPolicy;

/// Upper bound on entries returned by `list_folders`.
pub const MAX_LIST_RESULTS: usize = 1000;

/// Page size requested from the folder service.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    pub id: String,
}

/// Case-insensitive substring match, first entry wins.
///
/// Ties resolve to listing order, which is whatever name ordering the
/// server applied.
pub fn first_containing<'a>(entries: &'a [FolderEntry], needle: &str) -> Option<&'a FolderEntry> {
    let needle = needle.to_lowercase();
    entries
        .iter()
        .find(|entry| entry.name.to_lowercase().contains(&needle))
}

#[async_trait]
pub trait FolderDirectory: Send + Sync {
    /// Root-level container with exactly this name.
    async fn find_container_by_name(&self, name: &str) -> DirectoryResult<Option<String>>;

    /// Child folders of `parent_id`, ordered by name, at most `MAX_LIST_RESULTS`.
    async fn list_folders(
        &self,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Vec<FolderEntry>>;

    /// Child folder of `parent_id` named exactly `name`.
    async fn find_folder_exact(
        &self,
        name: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>>;

    /// Not idempotent: two calls create two folders.
    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<String>;

    async fn find_folder_contains(
        &self,
        needle: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>> {
        let entries = self.list_folders(parent_id, container_id).await?;
        Ok(first_containing(&entries, needle).map(|entry| entry.id.clone()))
    }

    async fn find_folder_exact_or_contains(
        &self,
        name: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>> {
        self.find_folder_exact_or_hint(name, name, parent_id, container_id).await
    }

    /// `name` exactly, else the first folder containing `hint`.
    async fn find_folder_exact_or_hint(
        &self,
        name: &str,
        hint: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>> {
        if let Some(id) = self.find_folder_exact(name, parent_id, container_id).await? {
            return Ok(Some(id));
        }
        self.find_folder_contains(hint, parent_id, container_id).await
    }

    /// Exact lookup, creating the folder when it is missing.
    ///
    /// Check-then-create: concurrent callers can both miss and both create.
    async fn find_or_create_folder(
        &self,
        name: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<String> {
        match self.find_folder_exact(name, parent_id, container_id).await? {
            Some(id) => Ok(id),
            None => self.create_folder(name, parent_id, container_id).await,
        }
    }
}
