use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::path::Path;
use std::sync::Arc;

// Use library instead of local modules
use drive_folder_sync::logging::init_logging;
use drive_folder_sync::store::sqlite::setup_database;
use drive_folder_sync::{open_store, AssignFolderRequest, AssignmentEngine, DriveClient, Settings};

const USAGE: &str = "usage:
  folder-sync init-db <path>          create the SQLite schema
  folder-sync assign <request.json>   run one folder assignment and print the result";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("init-db"), Some(path)) => run_init_db(Path::new(path)),
        (Some("assign"), Some(path)) => run_assign(Path::new(path)).await,
        _ => {
            eprintln!("{}", USAGE);
            bail!("missing or unknown command");
        }
    }
}

fn run_init_db(db_path: &Path) -> Result<()> {
    println!("🗄️  Setting up database at {:?}", db_path);

    let conn = Connection::open(db_path).with_context(|| format!("Failed to open {:?}", db_path))?;
    setup_database(&conn)?;

    println!("✓ Database initialized with WAL mode");
    Ok(())
}

async fn run_assign(request_path: &Path) -> Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings.log)?;

    let raw = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read {:?}", request_path))?;
    let request: AssignFolderRequest =
        serde_json::from_str(&raw).with_context(|| format!("Invalid request in {:?}", request_path))?;

    let directory = Arc::new(DriveClient::from_settings(&settings.drive));
    let store = open_store(&settings.store)?;
    let engine = AssignmentEngine::new(directory, store, settings.layout.clone());

    let response = engine.assign(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
