// # CSC Domain Manager HTTP API
//
// This crate provides the REST implementation of `ZoneApi` for the
// CSC Domain Manager, plus convenience constructors for a ready-to-use
// `CscdmClient`.
//
// ## Responsibilities
//
// - ✅ One HTTP request per trait call
// - ✅ Credentials sent as default headers, never logged
// - ✅ HTTP timeout configured (30 seconds by default)
// - ✅ Status code mapping (401/403, 404, 429, 5xx, structured error bodies)
// - ✅ OPEN_ZONE_EDITS reported as a distinct outcome, not an error
// - ❌ NO retry or polling (owned by the dispatcher in `cscdm-core`)
// - ❌ NO caching (owned by `ZoneCache`)
// - ❌ NO background tasks
//
// ## API Reference
//
// Every path is resolved against the base URL
// (default `https://apis.cscglobal.com/dbs/api/v2/`):
//
// ```http
// POST   zones/edits               201 {links: {status: ".../status/{id}"}}
//                                  4xx {code: "OPEN_ZONE_EDITS", description: ...}
// GET    zones/edits/status/{id}   {content: {status: "PENDING" | "COMPLETED" | "FAILED"}}
// DELETE zones/edits/{id}          204
// GET    zones/{zoneName}          zone snapshot
// GET    zones                     {zones: [...]}
// ```
//
// Headers on every request: `accept: application/json`, `apikey: <key>`,
// `Authorization: Bearer <token>`.

use async_trait::async_trait;
use cscdm_core::config::{ApiConfig, CscdmConfig};
use cscdm_core::traits::{EditStatus, SubmitOutcome, ZoneApi};
use cscdm_core::{CscdmClient, Error, Result, Zone, ZoneEditRequest};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Error code returned while another edit is open on the zone
const OPEN_ZONE_EDITS: &str = "OPEN_ZONE_EDITS";

#[derive(Debug, Deserialize)]
struct ZoneEditResponse {
    #[serde(default)]
    links: ZoneEditLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ZoneEditLinks {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct EditStatusResponse {
    content: EditStatusContent,
}

#[derive(Debug, Deserialize)]
struct EditStatusContent {
    status: EditStatus,
}

#[derive(Debug, Deserialize)]
struct ZoneList {
    #[serde(default)]
    zones: Vec<Zone>,
}

/// `ZoneApi` over the Domain Manager REST API
///
/// # Security
///
/// The API key and token live only in the HTTP client's default headers,
/// marked sensitive. The Debug implementation does not expose them.
pub struct HttpZoneApi {
    /// HTTP client carrying the auth headers
    client: reqwest::Client,

    /// Base every request path is resolved against (always ends in `/`)
    base_url: Url,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for HttpZoneApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpZoneApi")
            .field("base_url", &self.base_url.as_str())
            .field("credentials", &"<REDACTED>")
            .finish()
    }
}

impl HttpZoneApi {
    /// Create a new API client
    ///
    /// Fails if the configuration is invalid or a credential cannot be sent
    /// as a header value.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| Error::config(format!("Invalid API base URL {}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("apikey", sensitive_header(&config.api_key, "API key")?);
        headers.insert(
            AUTHORIZATION,
            sensitive_header(&format!("Bearer {}", config.api_token), "API token")?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::invalid_input(format!("Invalid request path {}: {}", path, e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))
    }

    /// GET `path` and decode a JSON body, mapping non-success statuses
    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.url(path)?;
        tracing::debug!("GET {}", url.path());

        let response = self.send(self.client.get(url)).await?;
        let status = response.status();
        let body = read_body(response).await?;

        if !status.is_success() {
            return Err(status_error(status, &body, what));
        }
        parse(&body, what)
    }
}

fn sensitive_header(value: &str, name: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| Error::config(format!("{} contains characters not allowed in a header", name)))?;
    header.set_sensitive(true);
    Ok(header)
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| Error::transport(format!("Failed to read response body: {}", e)))
}

fn parse<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| Error::Json(format!("Failed to parse {} response: {}", what, e)))
}

/// Last path segment of an edit status link
fn edit_id_from_link(link: &str) -> Option<&str> {
    link.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

/// Map a non-success response to an error
fn status_error(status: StatusCode, body: &str, what: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::http(
            status.as_u16(),
            "Authentication failed: invalid API key or token, or insufficient permissions",
        ),
        404 => Error::not_found(format!("{} not found", what)),
        429 => Error::http(429, "Rate limit exceeded. Please retry later"),
        500..=599 => Error::http(
            status.as_u16(),
            format!("Domain Manager server error (transient): {}", body),
        ),
        _ => match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) if !err.code.is_empty() => Error::api(err.code, err.description),
            _ => Error::http(status.as_u16(), format!("{} request failed: {}", what, body)),
        },
    }
}

#[async_trait]
impl ZoneApi for HttpZoneApi {
    async fn submit_zone_edit(&self, request: &ZoneEditRequest) -> Result<SubmitOutcome> {
        tracing::info!(
            "Submitting {} edit(s) for zone {}",
            request.edits.len(),
            request.zone_name
        );

        let url = self.url("zones/edits")?;
        let response = self.send(self.client.post(url).json(request)).await?;
        let status = response.status();
        let body = read_body(response).await?;

        if status != StatusCode::CREATED {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                if err.code == OPEN_ZONE_EDITS {
                    tracing::debug!("Zone {} has open edits", request.zone_name);
                    return Ok(SubmitOutcome::OpenZoneEdits);
                }
            }
            return Err(status_error(status, &body, "zone edit"));
        }

        let created: ZoneEditResponse = parse(&body, "zone edit")?;
        let edit_id = edit_id_from_link(&created.links.status).ok_or_else(|| {
            Error::Json("Zone edit response carried no status link".to_string())
        })?;

        Ok(SubmitOutcome::Accepted {
            edit_id: edit_id.to_string(),
        })
    }

    async fn zone_edit_status(&self, edit_id: &str) -> Result<EditStatus> {
        let response: EditStatusResponse = self
            .get_json(&format!("zones/edits/status/{}", edit_id), "zone edit status")
            .await?;
        Ok(response.content.status)
    }

    async fn cancel_zone_edit(&self, edit_id: &str) -> Result<()> {
        tracing::info!("Cancelling zone edit {}", edit_id);

        let url = self.url(&format!("zones/edits/{}", edit_id))?;
        let response = self.send(self.client.delete(url)).await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let body = read_body(response).await?;
        Err(status_error(status, &body, "zone edit cancellation"))
    }

    async fn fetch_zone(&self, zone_name: &str) -> Result<Zone> {
        self.get_json(&format!("zones/{}", zone_name), &format!("zone {}", zone_name))
            .await
    }

    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let list: ZoneList = self.get_json("zones", "zone list").await?;
        Ok(list.zones)
    }

    fn api_name(&self) -> &'static str {
        "cscdm"
    }
}

/// Configure a client against the default endpoint with default settings
///
/// Must be called from within a tokio runtime.
pub fn configure(api_key: impl Into<String>, api_token: impl Into<String>) -> Result<CscdmClient> {
    configure_with(&CscdmConfig::new(api_key, api_token))
}

/// Configure a client from a full configuration
pub fn configure_with(config: &CscdmConfig) -> Result<CscdmClient> {
    config.validate()?;
    let api = Arc::new(HttpZoneApi::new(&config.api)?);
    CscdmClient::configure(api, config.client.clone())
}
