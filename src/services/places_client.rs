use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::configuration::PlacesApiSettings;

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;
const PHOTO_MAX_WIDTH: &str = "800";
const DETAILS_FIELDS: &str = "place_id,name,formatted_address,geometry,types,rating,\
user_ratings_total,price_level,formatted_phone_number,website,opening_hours,\
editorial_summary,reviews,photos";
const FIND_PLACE_FIELDS: &str = "place_id,name,formatted_address,geometry,photos";

/// Terminal failure of one API call, after any retries are spent.
#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    #[error("http status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("service status {status}: {message:?}")]
    Service {
        status: String,
        message: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Empty,
    Retryable,
    Terminal,
}

/// Service-level `status` classification. `ZERO_RESULTS` is an empty result,
/// not a failure; quota and unknown errors are worth a retry.
pub fn classify_status(status: &str) -> StatusClass {
    match status {
        "OK" => StatusClass::Success,
        "ZERO_RESULTS" => StatusClass::Empty,
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => StatusClass::Retryable,
        _ => StatusClass::Terminal,
    }
}

pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * (1u64 << attempt))
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub place_id: String,
    pub name: String,
    pub formatted_address: Option<String>,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u32>,
    pub price_level: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextSearchPage {
    #[serde(default)]
    pub results: Vec<SearchResult>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpeningHours {
    #[serde(default)]
    pub weekday_text: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiReview {
    pub author_name: Option<String>,
    pub rating: Option<f64>,
    pub text: Option<String>,
    pub relative_time_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPhoto {
    pub photo_reference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorialSummary {
    pub overview: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceDetails {
    #[serde(default)]
    pub types: Vec<String>,
    pub formatted_phone_number: Option<String>,
    pub website: Option<String>,
    pub opening_hours: Option<OpeningHours>,
    pub editorial_summary: Option<EditorialSummary>,
    #[serde(default)]
    pub reviews: Vec<ApiReview>,
    #[serde(default)]
    pub photos: Vec<ApiPhoto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoundPlace {
    pub place_id: String,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub photos: Vec<ApiPhoto>,
}

/// Seam between the pipeline stages and the live HTTP client, so stages can
/// be driven by a stub in tests.
#[allow(async_fn_in_trait)]
pub trait PlacesApi {
    async fn text_search(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<Option<TextSearchPage>, ApiFailure>;

    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>, ApiFailure>;

    async fn find_place(&self, query: &str) -> Result<Option<FoundPlace>, ApiFailure>;

    /// Retrieval URL for a photo reference; pure, no network call.
    fn photo_url(&self, photo_reference: &str) -> Option<String>;
}

/// The only component that performs outbound I/O. Every caller treats a
/// failed call as "no data for this candidate" and keeps going.
pub struct PlacesClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    pub fn new(settings: PlacesApiSettings) -> Self {
        PlacesClient {
            http: reqwest::Client::new(),
            api_key: settings.api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ApiFailure> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| ApiFailure::Network(e.to_string()))
    }

    /// One GET against the service, with the retry taxonomy applied:
    /// non-2xx is terminal at once, retryable statuses and transport errors
    /// back off exponentially, everything else fails on first sight.
    async fn request(&self, url: Url) -> Result<Option<Value>, ApiFailure> {
        let mut attempt: u32 = 0;

        loop {
            let failure = match self.http.get(url.clone()).send().await {
                Ok(response) if !response.status().is_success() => {
                    return Err(ApiFailure::Http(response.status().as_u16()));
                }
                Ok(response) => match response.json::<Value>().await {
                    Ok(body) => {
                        let status = body
                            .get("status")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        match classify_status(&status) {
                            StatusClass::Success => return Ok(Some(body)),
                            StatusClass::Empty => return Ok(None),
                            StatusClass::Terminal => return Err(service_failure(status, &body)),
                            StatusClass::Retryable => service_failure(status, &body),
                        }
                    }
                    Err(e) => ApiFailure::Network(e.to_string()),
                },
                Err(e) => ApiFailure::Network(e.to_string()),
            };

            if attempt >= MAX_RETRIES {
                return Err(failure);
            }
            let delay = backoff_delay(attempt);
            log::warn!("retryable failure ({failure}), backing off for {delay:?}");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn request_field<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        field: &str,
    ) -> Result<Option<T>, ApiFailure> {
        match self.request(url).await? {
            None => Ok(None),
            Some(body) => {
                let value = body.get(field).cloned().unwrap_or(Value::Null);
                serde_json::from_value(value)
                    .map(Some)
                    .map_err(|e| ApiFailure::Network(e.to_string()))
            }
        }
    }
}

fn service_failure(status: String, body: &Value) -> ApiFailure {
    ApiFailure::Service {
        status,
        message: body
            .get("error_message")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

impl PlacesApi for PlacesClient {
    async fn text_search(
        &self,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<Option<TextSearchPage>, ApiFailure> {
        let mut params = vec![("key", self.api_key.as_str()), ("query", query)];
        if let Some(token) = page_token {
            params.push(("pagetoken", token));
        }
        let url = self.endpoint("textsearch/json", &params)?;

        match self.request(url).await? {
            None => Ok(None),
            Some(body) => serde_json::from_value(body)
                .map(Some)
                .map_err(|e| ApiFailure::Network(e.to_string())),
        }
    }

    async fn details(&self, place_id: &str) -> Result<Option<PlaceDetails>, ApiFailure> {
        let url = self.endpoint(
            "details/json",
            &[
                ("key", self.api_key.as_str()),
                ("place_id", place_id),
                ("fields", DETAILS_FIELDS),
            ],
        )?;
        self.request_field(url, "result").await
    }

    async fn find_place(&self, query: &str) -> Result<Option<FoundPlace>, ApiFailure> {
        let url = self.endpoint(
            "findplacefromtext/json",
            &[
                ("key", self.api_key.as_str()),
                ("input", query),
                ("inputtype", "textquery"),
                ("fields", FIND_PLACE_FIELDS),
            ],
        )?;
        let candidates: Option<Vec<FoundPlace>> = self.request_field(url, "candidates").await?;
        Ok(candidates.and_then(|mut c| {
            if c.is_empty() {
                None
            } else {
                Some(c.remove(0))
            }
        }))
    }

    fn photo_url(&self, photo_reference: &str) -> Option<String> {
        Url::parse_with_params(
            &format!("{}/photo", self.base_url),
            &[
                ("maxwidth", PHOTO_MAX_WIDTH),
                ("photoreference", photo_reference),
                ("key", self.api_key.as_str()),
            ],
        )
        .map(Into::into)
        .ok()
    }
}
