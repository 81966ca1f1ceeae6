use std::time::Duration;

use async_trait::async_trait;
use pipeline::{RegistryEntry, RegistryError, RegistrySource};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::rows_to_entries;

pub const DEFAULT_SHEETS_BASE: &str = "https://sheets.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SheetsRegistryError {
    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Registry backed by a spreadsheet range, read with an API key.
pub struct SheetsRegistry {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsRegistry {
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, SheetsRegistryError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl RegistrySource for SheetsRegistry {
    async fn load(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| RegistryError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RegistryError::Transport(format!("invalid base URL {}", self.base_url)))?
            .extend(["v4", "spreadsheets", &self.spreadsheet_id, "values", &self.range]);

        let response = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))?;
        let mut rows = range.values.into_iter();
        let Some(header) = rows.next() else {
            return Ok(Vec::new());
        };
        let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();
        let entries = rows_to_entries(&header, rows.collect());
        debug!(spreadsheet = %self.spreadsheet_id, entries = entries.len(), "Loaded registry sheet");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_first_row_is_header_and_ragged_rows_pad() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/sheet-1/values/Contacts!A1:G")
                .query_param("key", "gkey");
            then.status(200).json_body(json!({
                "range": "Contacts!A1:G3",
                "values": [
                    ["Company", "Person", "Ranking"],
                    ["Acme Games", "Ann"],
                    ["Zephyr Capital", "Dan", "2"]
                ]
            }));
        });

        let registry =
            SheetsRegistry::new(server.base_url(), "sheet-1", "Contacts!A1:G", "gkey").unwrap();
        let entries = registry.load().await.unwrap();

        mock.assert();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].field(RegistryEntry::PERSON), Some("Ann"));
        assert_eq!(entries[0].field(RegistryEntry::RANKING), None);
        assert_eq!(entries[1].field(RegistryEntry::RANKING), Some("2"));
    }

    #[tokio::test]
    async fn test_empty_sheet_has_no_entries() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path_contains("/values/");
            then.status(200).json_body(json!({ "range": "A1:G1" }));
        });

        let registry = SheetsRegistry::new(server.base_url(), "s", "A1:G", "k").unwrap();
        assert!(registry.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path_contains("/values/");
            then.status(403).body("API key not valid");
        });

        let registry = SheetsRegistry::new(server.base_url(), "s", "A1:G", "bad").unwrap();
        assert!(matches!(
            registry.load().await,
            Err(RegistryError::Status { status: 403, .. })
        ));
    }
}
