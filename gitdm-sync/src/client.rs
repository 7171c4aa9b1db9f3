//! Affiliation data service client.

use gitdm_core::{BulkUpdate, Profile, ProfilePage, StatusText};
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

pub const FETCH_ALL_PATH: &str = "/v1/affiliation/all";
pub const BULK_UPDATE_PATH: &str = "/v1/affiliation/bulk_update";

/// Remote store holding the authoritative profile set.
pub trait AffiliationService {
    /// Every profile the service knows about.
    fn fetch_all(&self) -> Result<Vec<Profile>, ServiceError>;

    /// Submit additions and removals; returns the service's status text.
    fn bulk_update(&self, update: &BulkUpdate) -> Result<String, ServiceError>;
}

/// Blocking HTTP client for the affiliation API.
///
/// Requests carry no timeout; a run waits as long as the service does.
#[derive(Debug, Clone)]
pub struct HttpAffiliationService {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpAffiliationService {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl AffiliationService for HttpAffiliationService {
    fn fetch_all(&self) -> Result<Vec<Profile>, ServiceError> {
        let url = self.url(FETCH_ALL_PATH);
        tracing::info!("GET {url}");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| request_error("GET", &url, e))?;
        let page: ProfilePage = decode_response("GET", &url, response)?;
        tracing::info!("fetched {} profile(s)", page.profiles.len());
        Ok(page.profiles)
    }

    fn bulk_update(&self, update: &BulkUpdate) -> Result<String, ServiceError> {
        let url = self.url(BULK_UPDATE_PATH);
        let body = serde_yaml::to_string(update).map_err(ServiceError::Encode)?;
        tracing::info!(
            "POST {url}: {} addition(s), {} removal(s)",
            update.additions.len(),
            update.removals.len()
        );
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/yaml")
            .send_string(&body)
            .map_err(|e| request_error("POST", &url, e))?;
        let status: StatusText = decode_response("POST", &url, response)?;
        tracing::info!("bulk update status: {}", status.text);
        Ok(status.text)
    }
}

fn request_error(method: &'static str, url: &str, err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(status, response) => ServiceError::Status {
            method,
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => ServiceError::Transport {
            method,
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

fn decode_response<T: DeserializeOwned>(
    method: &'static str,
    url: &str,
    response: ureq::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.into_string().map_err(|e| ServiceError::Transport {
        method,
        url: url.to_string(),
        message: format!("failed reading response body: {e}"),
    })?;
    if status != 200 {
        return Err(ServiceError::Status {
            method,
            url: url.to_string(),
            status,
            body,
        });
    }
    decode_body(method, url, body)
}

fn decode_body<T: DeserializeOwned>(method: &'static str, url: &str, body: String) -> Result<T, ServiceError> {
    serde_yaml::from_str(&body).map_err(|source| ServiceError::Decode {
        method,
        url: url.to_string(),
        body,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let svc = HttpAffiliationService::new("http://api.local/");
        assert_eq!(svc.url(FETCH_ALL_PATH), "http://api.local/v1/affiliation/all");
    }

    #[test]
    fn decodes_profile_page_body() {
        let page: ProfilePage =
            decode_body("GET", "http://x", "P:\n- U: A\n  E: a@x\n".to_string()).unwrap();
        assert_eq!(page.profiles.len(), 1);
        assert_eq!(page.profiles[0].email.as_deref(), Some("a@x"));
    }

    #[test]
    fn decodes_status_text_body() {
        let status: StatusText = decode_body("POST", "http://x", "text: ok\n".to_string()).unwrap();
        assert_eq!(status.text, "ok");
    }

    #[test]
    fn undecodable_body_keeps_the_body() {
        let err = decode_body::<ProfilePage>("GET", "http://x", "P: [unclosed".to_string()).unwrap_err();
        assert!(matches!(err, ServiceError::Decode { .. }));
        assert!(err.to_string().contains("P: [unclosed"), "got: {err}");
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let svc = HttpAffiliationService::new("http://127.0.0.1:9");
        let err = svc.fetch_all().unwrap_err();
        assert!(matches!(err, ServiceError::Transport { method: "GET", .. }), "got: {err}");
    }
}
