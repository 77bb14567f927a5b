// src/edinet/models.rs
use serde::{Deserialize, Serialize};

/// Response of EDINET `GET /documents.json`
/// Example: https://disclosure.edinet-fsa.go.jp/api/v1/documents.json?date=2023-06-12&type=2
#[derive(Debug, Deserialize)]
pub struct DocumentListResponse {
    #[serde(default)]
    pub metadata: Option<DocumentListMetadata>,
    #[serde(default)]
    pub results: Vec<EdinetDocument>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentListMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One submitted document. EDINET leaves most fields null for withdrawn filings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdinetDocument {
    #[serde(rename = "docID")]
    pub doc_id: String,
    #[serde(default)]
    pub edinet_code: Option<String>,
    #[serde(default)]
    pub sec_code: Option<String>,
    #[serde(default)]
    pub filer_name: Option<String>,
    #[serde(default)]
    pub doc_description: Option<String>,
    #[serde(default)]
    pub submit_date_time: Option<String>,
}

impl EdinetDocument {
    /// One-line summary for terminal output.
    pub fn summary(&self) -> String {
        format!(
            "docID: {}, edinetCode: {}, secCode: {}, filerName: {}, description: {}, submitted: {}",
            self.doc_id,
            self.edinet_code.as_deref().unwrap_or("-"),
            self.sec_code.as_deref().unwrap_or("-"),
            self.filer_name.as_deref().unwrap_or("-"),
            self.doc_description.as_deref().unwrap_or("-"),
            self.submit_date_time.as_deref().unwrap_or("-"),
        )
    }
}
