//! HTTP lookup provider adapter.
//!
//! Speaks a small JSON API exposed by the upstream lookup gateway. The wire
//! shapes here are our own adapter boundary; the remote side is free to proxy
//! whichever vendor it fronts as long as it answers in this format.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderConfig;

use super::{
    Candidate, DetailFetch, PersonRecord, PhoneInfo, ProviderClient, ProviderError, SearchPage,
};

/// HTTP-backed lookup provider.
pub struct HttpProviderClient {
    client: Client,
    config: ProviderConfig,
}

impl HttpProviderClient {
    /// Create a new client from configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_search_url(&self, name: &str, location: Option<&str>, page: u32) -> String {
        let mut url = format!(
            "{}/v1/search?token={}&name={}&page={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.token),
            urlencoding::encode(name),
            page
        );

        if let Some(location) = location {
            url.push_str(&format!("&location={}", urlencoding::encode(location)));
        }

        url
    }

    fn build_detail_url(&self, link: &str) -> String {
        format!(
            "{}/v1/detail?token={}&link={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.token),
            urlencoding::encode(link)
        )
    }

    fn map_request_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::ConnectionFailed(e.to_string())
        } else {
            ProviderError::ApiError(e.to_string())
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn search(
        &self,
        name: &str,
        location: Option<&str>,
        page: u32,
        subtask_index: usize,
    ) -> Result<SearchPage, ProviderError> {
        let url = self.build_search_url(name, location, page);
        debug!(name = name, page = page, "Searching lookup provider");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        let candidates = body
            .candidates
            .into_iter()
            .map(|c| Candidate {
                detail_link: c.link,
                subtask_index,
                search_name: name.to_string(),
                search_location: location.map(|l| l.to_string()),
            })
            .collect();

        Ok(SearchPage {
            candidates,
            pages_used: body.pages_used.max(1),
            has_more: body.has_more,
        })
    }

    async fn fetch_detail(&self, link: &str) -> Result<DetailFetch, ProviderError> {
        let url = self.build_detail_url(link);
        debug!(link = link, "Fetching detail record");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        if response.status().as_u16() == 404 {
            return Err(ProviderError::NotFound(link.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: DetailResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(DetailFetch {
            record: body.record.into_person_record(),
            requests_used: body.requests_used.max(1),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    pages_used: u32,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct WireCandidate {
    link: String,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    record: WireRecord,
    #[serde(default)]
    requests_used: u32,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    name: String,
    age: Option<u8>,
    location: Option<String>,
    phone: Option<String>,
    phone_type: Option<String>,
    carrier: Option<String>,
    marital_status: Option<String>,
    deceased: Option<bool>,
    #[serde(default)]
    relatives: Vec<String>,
    #[serde(default)]
    emails: Vec<String>,
    report_year: Option<u16>,
}

impl WireRecord {
    fn into_person_record(self) -> PersonRecord {
        let phone = self.phone.map(|number| PhoneInfo {
            number,
            phone_type: self.phone_type,
            carrier: self.carrier,
        });

        PersonRecord {
            name: self.name,
            age: self.age,
            location: self.location,
            phone,
            marital_status: self.marital_status,
            deceased: self.deceased,
            relatives: self.relatives,
            emails: self.emails,
            report_year: self.report_year,
            from_cache: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig {
            url: "http://localhost:9200/".to_string(),
            token: "secret token".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_build_search_url_encodes_query() {
        let client = HttpProviderClient::new(test_config()).unwrap();
        let url = client.build_search_url("Jane Doe", Some("Austin, TX"), 2);

        assert!(url.starts_with("http://localhost:9200/v1/search?"));
        assert!(url.contains("name=Jane%20Doe"));
        assert!(url.contains("location=Austin%2C%20TX"));
        assert!(url.contains("page=2"));
        assert!(url.contains("token=secret%20token"));
    }

    #[test]
    fn test_build_search_url_without_location() {
        let client = HttpProviderClient::new(test_config()).unwrap();
        let url = client.build_search_url("Jane Doe", None, 1);
        assert!(!url.contains("location="));
    }

    #[test]
    fn test_build_detail_url() {
        let client = HttpProviderClient::new(test_config()).unwrap();
        let url = client.build_detail_url("link/with/slashes");
        assert!(url.contains("link=link%2Fwith%2Fslashes"));
    }

    #[test]
    fn test_wire_record_conversion() {
        let wire = WireRecord {
            name: "Jane Doe".to_string(),
            age: Some(60),
            location: None,
            phone: Some("555-0142".to_string()),
            phone_type: Some("landline".to_string()),
            carrier: None,
            marital_status: None,
            deceased: None,
            relatives: vec![],
            emails: vec![],
            report_year: Some(2021),
        };

        let record = wire.into_person_record();
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.phone.as_ref().unwrap().number, "555-0142");
        assert_eq!(
            record.phone.as_ref().unwrap().phone_type.as_deref(),
            Some("landline")
        );
        assert!(!record.from_cache);
    }
}
