//! Google Drive v3 implementation of [`FolderDirectory`].
//!
//! Shared drives are the containers. The session (an authenticated
//! `reqwest::Client`) is built on first use and reused for the lifetime of
//! the `DriveClient`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{FolderDirectory, FolderEntry, RetryPolicy, MAX_LIST_RESULTS, PAGE_SIZE};
use crate::config::DriveSettings;
use crate::error::{DirectoryError, DirectoryResult};

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Ready-to-use credentials for the folder service.
#[derive(Clone)]
pub struct DriveSession {
    pub access_token: String,
}

impl std::fmt::Debug for DriveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveSession").field("access_token", &"<redacted>").finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveList {
    #[serde(default)]
    drives: Vec<RemoteDrive>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteDrive {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    id: String,
    name: String,
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Escape a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query for non-trashed folders directly under `parent_id`, optionally by exact name.
pub fn folder_query(parent_id: &str, name: Option<&str>) -> String {
    let scope = format!(
        "mimeType = '{}' and '{}' in parents and trashed = false",
        FOLDER_MIME_TYPE,
        escape_query_value(parent_id)
    );
    match name {
        Some(name) => format!("name = '{}' and {}", escape_query_value(name), scope),
        None => scope,
    }
}

/// Whether a file returned for an exact-name query really sits under `parent_id`.
fn is_child_of(file: &RemoteFile, parent_id: &str, container_id: Option<&str>) -> bool {
    if container_id == Some(parent_id) {
        file.parents.is_empty() || file.parents.iter().any(|p| p == parent_id)
    } else {
        file.parents.iter().any(|p| p == parent_id)
    }
}

pub struct DriveClient {
    base_url: String,
    session: DriveSession,
    timeout: Duration,
    retry: RetryPolicy,
    http: OnceCell<Client>,
}

impl DriveClient {
    pub fn new(base_url: impl Into<String>, session: DriveSession, retry: RetryPolicy) -> Self {
        DriveClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
            timeout: Duration::from_secs(30),
            retry,
            http: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &DriveSettings) -> Self {
        let mut client = DriveClient::new(
            settings.api_base_url.clone(),
            DriveSession {
                access_token: settings.access_token.clone(),
            },
            settings.retry.to_policy(),
        );
        client.timeout = Duration::from_secs(settings.request_timeout_secs);
        client
    }

    async fn http(&self) -> DirectoryResult<&Client> {
        self.http
            .get_or_try_init(|| async {
                let mut headers = HeaderMap::new();
                let bearer = HeaderValue::from_str(&format!("Bearer {}", self.session.access_token))
                    .map_err(|e| DirectoryError::Rejected {
                        status: 401,
                        message: format!("invalid access token: {}", e),
                    })?;
                headers.insert(AUTHORIZATION, bearer);

                let client = Client::builder()
                    .default_headers(headers)
                    .timeout(self.timeout)
                    .user_agent(concat!("drive-folder-sync/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .map_err(|e| DirectoryError::Transport(format!("failed to build HTTP client: {}", e)))?;
                info!(base_url = %self.base_url, "Folder service session initialised");
                Ok::<Client, DirectoryError>(client)
            })
            .await
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> DirectoryResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::from_status(status.as_u16(), &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }

    async fn drives_page(&self, page_token: Option<&str>) -> DirectoryResult<DriveList> {
        let http = self.http().await?;
        let mut request = http
            .get(format!("{}/drives", self.base_url))
            .query(&[("pageSize", PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        Self::send_json(request).await
    }

    async fn files_page(
        &self,
        query: &str,
        container_id: Option<&str>,
        ordered: bool,
        page_token: Option<&str>,
    ) -> DirectoryResult<FileList> {
        let http = self.http().await?;
        let mut request = http.get(format!("{}/files", self.base_url)).query(&[
            ("q", query),
            ("spaces", "drive"),
            ("fields", "nextPageToken, files(id, name, parents)"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ]);
        request = request.query(&[("pageSize", PAGE_SIZE.to_string())]);
        if ordered {
            request = request.query(&[("orderBy", "name")]);
        }
        if let Some(drive_id) = container_id {
            request = request.query(&[("driveId", drive_id), ("corpora", "drive")]);
        }
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        Self::send_json(request).await
    }
}

#[async_trait]
impl FolderDirectory for DriveClient {
    async fn find_container_by_name(&self, name: &str) -> DirectoryResult<Option<String>> {
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .retry
                .execute("drives.list", || self.drives_page(page_token.as_deref()))
                .await?;

            if let Some(drive) = page.drives.into_iter().find(|d| d.name == name) {
                return Ok(Some(drive.id));
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }

    async fn list_folders(
        &self,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Vec<FolderEntry>> {
        let query = folder_query(parent_id, None);
        let mut folders = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .retry
                .execute("files.list", || {
                    self.files_page(&query, container_id, true, page_token.as_deref())
                })
                .await?;

            for file in page.files {
                folders.push(FolderEntry {
                    name: file.name,
                    id: file.id,
                });
                if folders.len() >= MAX_LIST_RESULTS {
                    debug!(parent_id, "Folder listing truncated at cap");
                    return Ok(folders);
                }
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(folders),
            }
        }
    }

    async fn find_folder_exact(
        &self,
        name: &str,
        parent_id: &str,
        container_id: Option<&str>,
    ) -> DirectoryResult<Option<String>> {
        let query = folder_query(parent_id, Some(name));
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .retry
                .execute("files.list", || {
                    self.files_page(&query, container_id, false, page_token.as_deref())
                })
                .await?;

            let hit = page
                .files
                .into_iter()
                .find(|file| file.name == name && is_child_of(file, parent_id, container_id));
            if let Some(file) = hit {
                return Ok(Some(file.id));
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(None),
            }
        }
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &str,
        _container_id: Option<&str>,
    ) -> DirectoryResult<String> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });

        let body = &body;
        let created: CreatedFile = self
            .retry
            .execute("files.create", move || async move {
                let http = self.http().await?;
                let request = http
                    .post(format!("{}/files", self.base_url))
                    .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                    .json(body);
                Self::send_json(request).await
            })
            .await?;

        info!(name, parent_id, folder_id = %created.id, "Created folder");
        Ok(created.id)
    }
}
