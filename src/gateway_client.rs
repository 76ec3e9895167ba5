use crate::errors::AppError;
use crate::models::{
    CreatedLead, InteractionRequest, Lead, LeadId, MessageResponse, NewLead, ScoreRequest,
    ScoreResponse, Weights,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Per-call request options for [`LeadApiClient::call`].
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// HTTP method, `GET` by default.
    pub method: Method,
    /// Extra headers. These override the defaults on name clashes.
    pub headers: Vec<(String, String)>,
    /// JSON body, serialized as-is.
    pub body: Option<Value>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl CallOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    /// Serializes `body` as the request's JSON payload.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, AppError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Client for the lead backend's REST API.
///
/// Every call goes through [`LeadApiClient::call`], which joins the configured
/// base address with the endpoint path, applies a JSON `Content-Type` unless the
/// caller overrides it, and treats any non-2xx status as
/// [`AppError::RequestFailed`]. There is no retry and no client-side timeout.
#[derive(Clone)]
pub struct LeadApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl LeadApiClient {
    /// Creates a new `LeadApiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the lead backend, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().build().map_err(|e| {
            AppError::InternalError(format!("Failed to create lead API client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a request against the backend and returns the decoded JSON body.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Path (and optional query) appended to the base URL.
    /// * `options` - Method, extra headers and body.
    ///
    /// # Returns
    ///
    /// * `Result<Value, AppError>` - The response body, `Value::Null` when empty.
    pub async fn call(&self, endpoint: &str, options: CallOptions) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let headers = merge_headers(&options.headers)?;
        tracing::debug!("{} {}", options.method, url);

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Request to {} failed: {}", url, e);
            AppError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} {} returned {}", options.method, url, status);
            return Err(AppError::RequestFailed {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to read response body: {}", e)))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Decode(format!("Failed to parse response from {}: {}", url, e)))
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: CallOptions,
    ) -> Result<T, AppError> {
        let body = self.call(endpoint, options).await?;
        serde_json::from_value(body).map_err(|e| {
            AppError::Decode(format!("Unexpected response shape from {}: {}", endpoint, e))
        })
    }

    /// Fetches the lead collection, optionally filtered server-side.
    ///
    /// # Arguments
    ///
    /// * `search` - Search term; blank means the full collection.
    pub async fn fetch_leads(&self, search: Option<&str>) -> Result<Vec<Lead>, AppError> {
        let endpoint = leads_endpoint(search);
        tracing::info!("Fetching leads from backend: {}", endpoint);

        let leads: Vec<Lead> = self.call_as(&endpoint, CallOptions::get()).await?;
        tracing::info!("Leads fetched successfully: {} lead(s)", leads.len());
        Ok(leads)
    }

    /// Asks the backend to recompute a lead's score with the given weighting hints.
    pub async fn rescore_lead(
        &self,
        lead_id: LeadId,
        weights: Weights,
    ) -> Result<ScoreResponse, AppError> {
        tracing::info!("Rescoring lead {} with weights: {:?}", lead_id, weights);
        let options = CallOptions::post().json(&ScoreRequest { weights })?;
        self.call_as(&format!("/leads/{}/score", lead_id), options)
            .await
    }

    /// Asks the backend to generate an outreach message for a lead.
    pub async fn generate_message(&self, lead_id: LeadId) -> Result<MessageResponse, AppError> {
        tracing::info!("Generating message for lead {}", lead_id);
        self.call_as(&format!("/leads/{}/message", lead_id), CallOptions::post())
            .await
    }

    /// Records an interaction. Only the HTTP status matters; the body is ignored.
    pub async fn add_interaction(
        &self,
        lead_id: LeadId,
        interaction: &InteractionRequest,
    ) -> Result<(), AppError> {
        tracing::info!(
            "Adding {:?} interaction for lead {}",
            interaction.direction,
            lead_id
        );
        let options = CallOptions::post().json(interaction)?;
        match self
            .call(&format!("/add_interaction/{}", lead_id), options)
            .await
        {
            Ok(_) => Ok(()),
            Err(AppError::Decode(e)) => {
                tracing::debug!("Ignoring unreadable interaction response body: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Creates a lead. The backend scores it on creation.
    pub async fn create_lead(&self, lead: &NewLead) -> Result<CreatedLead, AppError> {
        tracing::info!("Creating new lead: {} ({})", lead.name, lead.company);
        let options = CallOptions::post().json(lead)?;
        let created: CreatedLead = self.call_as("/leads", options).await?;
        tracing::info!("✓ Lead created successfully: {}", created.id);
        Ok(created)
    }

    /// Backend liveness probe.
    pub async fn health(&self) -> Result<Value, AppError> {
        self.call("/health", CallOptions::get()).await
    }
}

/// Builds the list endpoint, URL-encoding the search term.
pub fn leads_endpoint(search: Option<&str>) -> String {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        None => "/leads".to_string(),
        Some(term) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("search", term)
                .finish();
            format!("/leads?{}", query)
        }
    }
}

fn merge_headers(extra: &[(String, String)]) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::BadRequest(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::BadRequest(format!("Invalid header value: {}", e)))?;
        headers.insert(name, value);
    }

    Ok(headers)
}
