use async_trait::async_trait;
use common::config::ApiConfig;
use common::{
    Health, Incident, IncidentPatch, NewIncident, NewOrganization, NewService, Organization,
    PublicStatus, Service, ServicePatch,
};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Backend answered with a non-2xx status.
    #[error("API Error: {text}")]
    Status { status: u16, text: String },

    #[error("API request failed: {0}")]
    Transport(String),

    #[error("API response could not be decoded: {0}")]
    Decode(String),

    /// Request body could not be serialized; nothing was sent.
    #[error("API request could not be encoded: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Every backend action the application performs. Implementations make
/// exactly one request per call and keep no state of their own.
#[async_trait]
pub trait StatusBackend: Send + Sync {
    async fn list_services(&self, org_id: &str) -> Result<Vec<Service>, ApiError>;
    async fn get_service(&self, service_id: &str) -> Result<Service, ApiError>;
    async fn create_service(&self, input: &NewService) -> Result<Service, ApiError>;
    async fn update_service(&self, service_id: &str, patch: &ServicePatch) -> Result<Service, ApiError>;
    async fn delete_service(&self, service_id: &str) -> Result<(), ApiError>;

    async fn list_incidents(&self, org_id: &str) -> Result<Vec<Incident>, ApiError>;
    async fn create_incident(&self, input: &NewIncident) -> Result<Incident, ApiError>;
    async fn update_incident(&self, incident_id: &str, patch: &IncidentPatch) -> Result<Incident, ApiError>;

    async fn get_public_status(&self, org_slug: &str) -> Result<PublicStatus, ApiError>;

    async fn create_organization(&self, input: &NewOrganization) -> Result<Organization, ApiError>;
    async fn get_organization(&self, org_id: &str) -> Result<Organization, ApiError>;

    async fn health(&self) -> Result<Health, ApiError>;
}

/// HTTP gateway to the status backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Transport(format!("invalid base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Transport(format!("invalid base url '{}'", base_url)));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Joins path segments onto the base url, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(segments);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            let payload = serde_json::to_vec(body).map_err(|e| ApiError::Encode(e.to_string()))?;
            request = request.body(payload);
        }

        let response = request.send().await.map_err(|e| {
            warn!("{} {} failed: {}", method, url, e);
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} {} returned status {}", method, url, status);
            let text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            return Err(ApiError::Status { status: status.as_u16(), text });
        }

        Ok(response)
    }

    async fn request<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, segments, body).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        self.request::<T, ()>(Method::GET, segments, None).await
    }
}

#[async_trait]
impl StatusBackend for ApiClient {
    async fn list_services(&self, org_id: &str) -> Result<Vec<Service>, ApiError> {
        self.get(&["api", "organizations", org_id, "services"]).await
    }

    async fn get_service(&self, service_id: &str) -> Result<Service, ApiError> {
        self.get(&["api", "services", service_id]).await
    }

    async fn create_service(&self, input: &NewService) -> Result<Service, ApiError> {
        self.request(Method::POST, &["api", "organizations", input.org_id.as_str(), "services"], Some(input))
            .await
    }

    async fn update_service(&self, service_id: &str, patch: &ServicePatch) -> Result<Service, ApiError> {
        self.request(Method::PUT, &["api", "services", service_id], Some(patch)).await
    }

    async fn delete_service(&self, service_id: &str) -> Result<(), ApiError> {
        // body is a confirmation message we have no use for
        self.send::<()>(Method::DELETE, &["api", "services", service_id], None)
            .await
            .map(|_| ())
    }

    async fn list_incidents(&self, org_id: &str) -> Result<Vec<Incident>, ApiError> {
        self.get(&["api", "organizations", org_id, "incidents"]).await
    }

    async fn create_incident(&self, input: &NewIncident) -> Result<Incident, ApiError> {
        self.request(Method::POST, &["api", "organizations", input.org_id.as_str(), "incidents"], Some(input))
            .await
    }

    async fn update_incident(&self, incident_id: &str, patch: &IncidentPatch) -> Result<Incident, ApiError> {
        self.request(Method::PUT, &["api", "incidents", incident_id], Some(patch)).await
    }

    async fn get_public_status(&self, org_slug: &str) -> Result<PublicStatus, ApiError> {
        self.get(&["api", "public", "status", org_slug]).await
    }

    async fn create_organization(&self, input: &NewOrganization) -> Result<Organization, ApiError> {
        self.request(Method::POST, &["api", "organizations"], Some(input)).await
    }

    async fn get_organization(&self, org_id: &str) -> Result<Organization, ApiError> {
        self.get(&["api", "organizations", org_id]).await
    }

    async fn health(&self) -> Result<Health, ApiError> {
        self.get(&["health"]).await
    }
}
