// ⚙️ Settings - defaults, TOML file, then FOLDER_SYNC_* environment variables

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::directory::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "folder-sync.toml";
pub const CONFIG_PATH_VAR: &str = "FOLDER_SYNC_CONFIG";
pub const ENV_PREFIX: &str = "FOLDER_SYNC_";

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub drive: DriveSettings,
    pub store: StoreSettings,
    pub layout: FolderLayout,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    pub api_base_url: String,
    /// Bearer token for the folder service; obtaining it is someone else's job.
    pub access_token: String,
    pub request_timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for DriveSettings {
    fn default() -> Self {
        DriveSettings {
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            access_token: String::new(),
            request_timeout_secs: 30,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 32_000,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreSettings {
    Sqlite { path: PathBuf },
    Rest { url: String, api_key: String },
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings::Sqlite {
            path: PathBuf::from("folder-sync.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            filter: "drive_folder_sync=info,folder_sync_server=info,tower_http=info".to_string(),
        }
    }
}

// ============================================================================
// FOLDER LAYOUT
// ============================================================================

/// Naming conventions of the remote folder tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderLayout {
    /// `{prefix}-NNN-YYYY`
    pub project_code_prefix: String,
    /// Yearly container is named `"{container_prefix} {year}"`
    pub container_prefix: String,
    /// Segments under the project folder; each lists accepted spellings.
    pub route: Vec<Vec<String>>,
    pub internal_company: String,
    pub internal_folder: String,
    pub externals_folder: String,
    /// Substring locating an existing externals folder under another name.
    pub externals_folder_hint: String,
    /// Folders created under each external company folder, in order:
    /// company, specialists, drivers, vehicles.
    pub company_category_folders: Vec<String>,
    /// Substrings locating the internal company's category folders:
    /// specialists, drivers, vehicles.
    pub internal_category_hints: Vec<String>,
    /// Substring locating the internal folder during provisioning.
    pub internal_folder_hint: String,
}

impl Default for FolderLayout {
    fn default() -> Self {
        FolderLayout {
            project_code_prefix: "MY".to_string(),
            container_prefix: "Proyectos".to_string(),
            route: vec![
                vec!["08 Terrenos".to_string()],
                vec![
                    "03 Acreditación y Arranque".to_string(),
                    "03 Acreditacion y Arranque".to_string(),
                ],
                vec!["01 Acreditación".to_string(), "01 Acreditacion".to_string()],
            ],
            internal_company: "Myma".to_string(),
            internal_folder: "02 MYMA".to_string(),
            externals_folder: "01 Externos".to_string(),
            externals_folder_hint: "Externos".to_string(),
            company_category_folders: vec![
                "01 Empresa".to_string(),
                "02 Especialistas".to_string(),
                "03 Conductores".to_string(),
                "04 Vehiculos".to_string(),
            ],
            internal_category_hints: vec![
                "Especialistas".to_string(),
                "Conductores".to_string(),
                "Vehiculos".to_string(),
            ],
            internal_folder_hint: "MYMA".to_string(),
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

impl Settings {
    /// Load from the file named by `FOLDER_SYNC_CONFIG` (or `folder-sync.toml`)
    /// and the environment.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load settings from {:?}", path))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.server.bind_address(), "0.0.0.0:8000");
        assert_eq!(settings.drive.retry.max_attempts, 5);
        assert_eq!(settings.drive.retry.to_policy().max_attempts, 5);
        assert_eq!(settings.layout.container_prefix, "Proyectos");
        assert_eq!(settings.layout.route.len(), 3);
        assert!(matches!(settings.store, StoreSettings::Sqlite { .. }));
    }

    #[test]
    fn test_toml_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "folder-sync.toml",
                r#"
                [server]
                port = 9100

                [store]
                kind = "rest"
                url = "https://db.example.com"
                api_key = "from-file"

                [layout]
                internal_company = "Acme"
                "#,
            )?;
            jail.set_env("FOLDER_SYNC_STORE__API_KEY", "from-env");
            jail.set_env("FOLDER_SYNC_DRIVE__RETRY__MAX_ATTEMPTS", "2");

            let settings = Settings::load_from(Path::new("folder-sync.toml"))
                .map_err(|e| e.to_string())?;

            assert_eq!(settings.server.port, 9100);
            assert_eq!(settings.server.host, "0.0.0.0");
            assert_eq!(settings.drive.retry.max_attempts, 2);
            assert_eq!(settings.layout.internal_company, "Acme");
            assert_eq!(settings.layout.internal_folder, "02 MYMA");
            assert_eq!(settings.layout.externals_folder_hint, "Externos");
            assert_eq!(
                settings.store,
                StoreSettings::Rest {
                    url: "https://db.example.com".to_string(),
                    api_key: "from-env".to_string(),
                }
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let settings = Settings::load_from(Path::new("absent.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.drive.api_base_url, "https://www.googleapis.com/drive/v3");
            Ok(())
        });
    }
}
