// src/edinet/client.rs
use chrono::NaiveDate;

use crate::edinet::models::{DocumentListResponse, EdinetDocument};
use crate::jquants::client::{build_http_client, check_status};
use crate::utils::error::ApiError;

/// `type=2` asks for the document list together with its metadata.
const LIST_WITH_METADATA: &str = "2";

#[derive(Debug, Clone)]
pub struct EdinetClient {
    http: reqwest::Client,
    base_url: String,
}

impl EdinetClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Lists every document submitted on `date`.
    pub async fn documents(&self, date: NaiveDate) -> Result<Vec<EdinetDocument>, ApiError> {
        let url = format!("{}/documents.json", self.base_url);
        let date = date.format("%Y-%m-%d").to_string();
        tracing::info!("Fetching EDINET document list for {}", date);

        let response = self
            .http
            .get(&url)
            .query(&[("date", date.as_str()), ("type", LIST_WITH_METADATA)])
            .send()
            .await?;
        let response = check_status(response, "/documents.json").await?;

        let body: DocumentListResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(format!("EDINET document list: {}", e)))?;

        if let Some(meta) = &body.metadata {
            tracing::debug!(
                "EDINET metadata: title={:?}, status={:?}, message={:?}",
                meta.title,
                meta.status,
                meta.message
            );
        }
        tracing::info!("Fetched {} EDINET documents", body.results.len());
        Ok(body.results)
    }
}
