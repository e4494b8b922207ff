use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Longest identifier accepted by [`WatchedEntityId::parse`].
const MAX_ID_LEN: usize = 128;

/// Identifier of a watched betting form. Registry key and broadcast topic key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatchedEntityId(String);

impl WatchedEntityId {
    /// Validate a raw identifier.
    ///
    /// Accepts 1-128 characters from `[A-Za-z0-9_-]`, which covers Mongo
    /// ObjectIds as well as slug-style ids.
    pub fn parse(raw: &str) -> Result<Self, MonitorError> {
        let invalid = |reason: &str| MonitorError::InvalidId {
            id: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(invalid("empty"));
        }
        if raw.len() > MAX_ID_LEN {
            return Err(invalid("too long"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("unexpected character"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Broadcast topic for this form: `form-{id}`.
    pub fn topic(&self) -> String {
        format!("form-{}", self.0)
    }
}

impl fmt::Display for WatchedEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WatchedEntityId {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WatchedEntityId> for String {
    fn from(id: WatchedEntityId) -> Self {
        id.0
    }
}

/// Match status as reported by the football data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Scheduled,
    Timed,
    InPlay,
    Paused,
    Finished,
    Suspended,
    Postponed,
    Cancelled,
    Awarded,
    #[serde(other)]
    Unknown,
}

impl MatchStatus {
    /// Only `IN_PLAY` and `PAUSED` matches are recomputed.
    pub fn is_live(self) -> bool {
        matches!(self, MatchStatus::InPlay | MatchStatus::Paused)
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Timed => "TIMED",
            MatchStatus::InPlay => "IN_PLAY",
            MatchStatus::Paused => "PAUSED",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Suspended => "SUSPENDED",
            MatchStatus::Postponed => "POSTPONED",
            MatchStatus::Cancelled => "CANCELLED",
            MatchStatus::Awarded => "AWARDED",
            MatchStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Current score of a fixture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

fn default_specific_bet() -> String {
    "home_win".to_string()
}

/// How a bet was classified at upload time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetClassification {
    #[serde(default)]
    pub category: String,
    /// Specific bet type, e.g. `home_win`, `draw`, `away_win`.
    #[serde(default = "default_specific_bet")]
    pub specific: String,
}

impl Default for BetClassification {
    fn default() -> Self {
        Self {
            category: String::new(),
            specific: default_specific_bet(),
        }
    }
}

/// Cached historical form for a fixture. Results are `W`, `D` or `L`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchHistory {
    #[serde(default)]
    pub home_form: Vec<String>,
    #[serde(default)]
    pub away_form: Vec<String>,
    /// Head-to-head results from the home team's point of view.
    #[serde(default)]
    pub h2h: Vec<String>,
}

/// Output of the win-probability model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Probability in percent (0-100).
    pub win_probability: f64,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub factors: Vec<String>,
}

/// Output of the expected-value calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedValue {
    pub expected_value: f64,
    pub expected_return: f64,
    pub roi: f64,
    pub is_value_bet: bool,
}

/// A prediction together with the expected value derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSnapshot {
    pub prediction: Prediction,
    pub expected_value: ExpectedValue,
}

impl PredictionSnapshot {
    pub fn win_probability(&self) -> f64 {
        self.prediction.win_probability
    }
}

/// One bet line inside a betting form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Provider fixture id. Games without one are never polled.
    #[serde(default)]
    pub fixture_id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub stake: f64,
    pub odds: f64,
    #[serde(default)]
    pub bet_classification: BetClassification,
    #[serde(default)]
    pub history: MatchHistory,
    #[serde(default)]
    pub initial_prediction: Option<PredictionSnapshot>,
    #[serde(default)]
    pub current_prediction: Option<PredictionSnapshot>,
    #[serde(default)]
    pub live_score: Option<Score>,
    #[serde(default)]
    pub minute: Option<u32>,
    #[serde(default)]
    pub status: Option<MatchStatus>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl GameRecord {
    /// Initial win probability, 50 when the game was never scored.
    pub fn initial_probability(&self) -> f64 {
        self.initial_prediction
            .as_ref()
            .map(PredictionSnapshot::win_probability)
            .unwrap_or(50.0)
    }

    /// Overwrite the live fields from a poll cycle.
    pub fn apply_live_update(&mut self, update: &LiveGameUpdate) {
        self.current_prediction = Some(update.prediction.clone());
        self.live_score = Some(update.live_score);
        self.minute = Some(update.minute);
        self.status = Some(update.status);
        self.last_updated = Some(update.last_updated);
    }
}

/// A watched betting form and its games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDocument {
    pub id: WatchedEntityId,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub games: Vec<GameRecord>,
}

/// Live state of a fixture, fetched fresh every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFixtureState {
    pub fixture_id: String,
    pub status: MatchStatus,
    pub score: Score,
    /// Elapsed minute, 0 when the provider does not report it.
    pub minute: u32,
}

/// Fields written into a nested game by the poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveGameUpdate {
    pub prediction: PredictionSnapshot,
    pub live_score: Score,
    pub minute: u32,
    pub status: MatchStatus,
    pub last_updated: DateTime<Utc>,
}

/// Change in one game's prediction, as broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDelta {
    pub fixture_id: String,
    pub home_team: String,
    pub away_team: String,
    /// Formatted as `home-away`.
    pub current_score: String,
    pub minute: u32,
    pub status: MatchStatus,
    pub updated_prediction: PredictionSnapshot,
    pub initial_probability: f64,
    /// `updated - initial` win probability, rounded to 2 decimals.
    pub change: f64,
    pub timestamp: DateTime<Utc>,
}

/// Payload broadcast once per cycle when at least one game changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub form_id: WatchedEntityId,
    pub updates: Vec<GameDelta>,
    pub timestamp: DateTime<Utc>,
}

impl UpdateEvent {
    pub fn live_update(
        form_id: WatchedEntityId,
        updates: Vec<GameDelta>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: "live_update".to_string(),
            form_id,
            updates,
            timestamp,
        }
    }
}
