use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::types::{LiveFixtureState, MatchStatus, Score};

/// Source of live fixture state.
#[async_trait]
pub trait LiveDataSource: Send + Sync {
    /// Current state of a fixture, `None` when the provider has no data for it.
    /// Timeouts surface as `FetchError`.
    async fn find_live_state(
        &self,
        fixture_id: &str,
    ) -> Result<Option<LiveFixtureState>, FetchError>;
}

/// football-data.org v4 match payload (only the fields we read).
#[derive(Debug, Deserialize)]
pub struct MatchPayload {
    pub status: MatchStatus,
    #[serde(default)]
    pub minute: Option<MinuteField>,
    #[serde(default)]
    pub score: Option<ScorePayload>,
}

/// The provider reports the minute as a number, or as a string such as `"45+2"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MinuteField {
    Number(u32),
    Text(String),
}

impl MinuteField {
    fn minutes(&self) -> u32 {
        match self {
            MinuteField::Number(m) => *m,
            MinuteField::Text(s) => s
                .split('+')
                .map(|part| part.trim().parse::<u32>().unwrap_or(0))
                .fold(0u32, |total, part| total.saturating_add(part)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    #[serde(default)]
    pub full_time: GoalsPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalsPayload {
    #[serde(default)]
    pub home: Option<u32>,
    #[serde(default)]
    pub away: Option<u32>,
}

impl MatchPayload {
    /// Normalise the provider payload into a `LiveFixtureState`.
    pub fn into_live_state(self, fixture_id: &str) -> LiveFixtureState {
        let goals = self.score.unwrap_or_default().full_time;
        LiveFixtureState {
            fixture_id: fixture_id.to_string(),
            status: self.status,
            score: Score {
                home: goals.home.unwrap_or(0),
                away: goals.away.unwrap_or(0),
            },
            minute: self.minute.map(|m| m.minutes()).unwrap_or(0),
        }
    }
}

/// HTTP client for the football-data.org REST API.
pub struct FootballDataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FootballDataClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn match_url(&self, fixture_id: &str) -> String {
        format!("{}/matches/{}", self.base_url, fixture_id)
    }

    /// Raw JSON for a fixture, for probing the provider.
    pub async fn fetch_raw(&self, fixture_id: &str) -> Result<serde_json::Value, FetchError> {
        let resp = self.send(fixture_id).await?;
        resp.json().await.map_err(|e| FetchError::Malformed {
            fixture_id: fixture_id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send(&self, fixture_id: &str) -> Result<reqwest::Response, FetchError> {
        let mut req = self.http.get(self.match_url(fixture_id));
        if let Some(key) = &self.api_key {
            req = req.header("X-Auth-Token", key);
        }
        req.send().await.map_err(|source| FetchError::Transport {
            fixture_id: fixture_id.to_string(),
            source,
        })
    }
}

#[async_trait]
impl LiveDataSource for FootballDataClient {
    async fn find_live_state(
        &self,
        fixture_id: &str,
    ) -> Result<Option<LiveFixtureState>, FetchError> {
        let resp = self.send(fixture_id).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Fixture {fixture_id} not found at provider");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                fixture_id: fixture_id.to_string(),
                status: status.as_u16(),
            });
        }
        let payload: MatchPayload = resp.json().await.map_err(|e| FetchError::Malformed {
            fixture_id: fixture_id.to_string(),
            reason: e.to_string(),
        })?;
        let state = payload.into_live_state(fixture_id);
        debug!(
            "Fixture {fixture_id}: {} {} ({}')",
            state.status, state.score, state.minute
        );
        Ok(Some(state))
    }
}
