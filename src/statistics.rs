use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::FetchError;
use crate::settings::{LensSettings, PLUGIN_GUID};

/// The backend's predicate id for "number of calls".
const CALL_COUNT_PREDICATE: u32 = 1;

const READ_ENDPOINT: &str = "api/read";

/// Call statistics for one method over the reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatistics {
    pub count: u64,
    #[serde(default)]
    pub window_days: Option<u32>,
    /// Percentages in `[0, 100]`, oldest first.
    #[serde(default)]
    pub history: Option<Vec<f64>>,
}

/// Key of the envelope form `{ "result": ... }`.
const ENVELOPE_KEY: &str = "result";

/// Decodes a response body; `Ok(None)` means no calls were recorded.
///
/// A bare object is the canonical form. A `null` body or an envelope whose
/// `result` is `null` means the method was never called. Anything else must
/// decode as statistics or it's an error.
pub fn parse_response(body: &str) -> Result<Option<CallStatistics>, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    let response: Value = serde_json::from_str(body)?;
    let statistics = match response {
        Value::Null => None,
        Value::Object(mut map) if map.contains_key(ENVELOPE_KEY) => {
            let result = map.remove(ENVELOPE_KEY).unwrap_or_default();
            serde_json::from_value(result)?
        }
        bare => Some(serde_json::from_value(bare)?),
    };
    Ok(statistics)
}

/// Everything that identifies one statistics lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsQuery {
    pub subject: String,
    pub days: u32,
    pub bars: u32,
    pub topic: String,
}

impl StatisticsQuery {
    pub fn new(qualified_name: &str, settings: &LensSettings) -> Self {
        Self {
            subject: qualified_name.to_string(),
            days: settings.number_of_days,
            bars: settings.number_of_bars(),
            topic: settings.topic.clone(),
        }
    }

    pub fn to_url(&self, hostname: &str) -> Result<Url, FetchError> {
        let endpoint = format!("{}/{}", hostname.trim_end_matches('/'), READ_ENDPOINT);
        let url = Url::parse_with_params(
            &endpoint,
            &[
                ("source", PLUGIN_GUID.to_string()),
                ("days", self.days.to_string()),
                ("bars", self.bars.to_string()),
                ("predicate", CALL_COUNT_PREDICATE.to_string()),
                ("subject", self.subject.clone()),
                ("topic", self.topic.clone()),
            ],
        )?;
        Ok(url)
    }
}

/// HTTP access to the statistics backend.
#[derive(Debug, Clone)]
pub struct StatisticsClient {
    http: reqwest::Client,
    hostname: Option<String>,
}

impl StatisticsClient {
    pub fn new(settings: &LensSettings) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(FetchError::Http)?;
        Ok(Self {
            http,
            hostname: settings.hostname.clone(),
        })
    }

    pub async fn fetch(&self, query: &StatisticsQuery) -> Result<Option<CallStatistics>, FetchError> {
        let hostname = self.hostname.as_deref().ok_or(FetchError::NotConfigured)?;
        let url = query.to_url(hostname)?;
        tracing::debug!(subject = %query.subject, "requesting call statistics");

        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        parse_response(&body)
    }
}
