// Drive Folder Sync - Web Server
// Folder assignment and provisioning over HTTP with Axum

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use drive_folder_sync::api::{router, AppState};
use drive_folder_sync::logging::init_logging;
use drive_folder_sync::{open_store, AssignmentEngine, DriveClient, FolderProvisioner, Settings};

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings.log)?;

    // One directory client and one store for the whole process
    let directory = Arc::new(DriveClient::from_settings(&settings.drive));
    let store = open_store(&settings.store)?;

    let state = AppState {
        engine: Arc::new(AssignmentEngine::new(
            directory.clone(),
            store,
            settings.layout.clone(),
        )),
        provisioner: Arc::new(FolderProvisioner::new(directory, settings.layout.clone())),
    };
    let app = router(state);

    let addr = settings.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, "🌐 Drive Folder Sync server running");

    axum::serve(listener, app).await.context("Server stopped unexpectedly")?;
    Ok(())
}
