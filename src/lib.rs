// Drive Folder Sync - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod directory;      // Remote folder tree: trait, Drive client, in-memory tree, retry
pub mod engine;         // Per-request assignment loop
pub mod error;
pub mod logging;
pub mod models;
pub mod project;        // Project code → yearly container → accreditation root
pub mod provisioning;   // Check-then-create of company / person folders
pub mod reconciliation; // Writes resolved ids back to the store
pub mod rules;          // Which lookup applies to which record
pub mod store;          // SQLite and PostgREST backends

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{FolderLayout, Settings};
pub use directory::{DriveClient, DriveSession, FolderDirectory, InMemoryDirectory, RetryPolicy};
pub use engine::AssignmentEngine;
pub use error::{DirectoryError, ProvisionError, StoreError, ValidationError};
pub use models::{AssignFolderRequest, AssignFolderResponse, FolderSource, ProvisionRequest, Summary};
pub use project::{AccreditationRoot, ParentContext, ProjectCode, ProjectCodePattern, ProjectPathResolver};
pub use provisioning::{FolderProvisioner, ProvisionResponse};
pub use reconciliation::ReconciliationWriter;
pub use rules::{FolderRulesEngine, RequestScope, ResolvedFolder};
pub use store::{open_store, PersistedStore, RestStore, SqliteStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
