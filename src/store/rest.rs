//! PostgREST-style HTTP backend (the hosted accreditation database).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{tables, PersistedStore, RequirementUpdate};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Deserialize)]
struct FolderRow {
    drive_folder_id: Option<String>,
}

pub struct RestStore {
    base_url: String,
    http: Client,
}

/// `eq.` filter value for a PostgREST query string.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

impl RestStore {
    pub fn new(url: &str, api_key: &str) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).map_err(|e| StoreError::Rejected {
            status: 401,
            message: format!("invalid api key: {}", e),
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| StoreError::Rejected {
            status: 401,
            message: format!("invalid api key: {}", e),
        })?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder().default_headers(headers).build()?;
        Ok(RestStore {
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            http,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn first_folder_id(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<Option<String>> {
        let response = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "drive_folder_id"), ("limit", "1")])
            .query(filters)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let rows: Vec<FolderRow> = response.json().await?;
        Ok(rows.into_iter().next().and_then(|row| row.drive_folder_id))
    }
}

#[async_trait]
impl PersistedStore for RestStore {
    async fn worker_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
        self.first_folder_id(
            tables::WORKER,
            &[("codigo_proyecto", eq(project_code)), ("nombre_trabajador", eq(person_name))],
        )
        .await
    }

    async fn driver_folder_id(&self, project_code: &str, person_name: &str) -> StoreResult<Option<String>> {
        self.first_folder_id(
            tables::DRIVER,
            &[("codigo_proyecto", eq(project_code)), ("nombre_trabajador", eq(person_name))],
        )
        .await
    }

    async fn vehicle_folder_id(&self, project_id: i64, plate: &str) -> StoreResult<Option<String>> {
        self.first_folder_id(
            tables::VEHICLE,
            &[("id_proyecto", eq(project_id)), ("patente", eq(plate.trim()))],
        )
        .await
    }

    async fn update_requirement(&self, id: i64, update: &RequirementUpdate) -> StoreResult<usize> {
        let response = self
            .http
            .patch(self.table_url(tables::REQUIREMENT))
            .query(&[("id", eq(id))])
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        debug!(id, rows = rows.len(), "Requirement PATCH returned");
        Ok(rows.len())
    }
}
