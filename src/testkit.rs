//! In-crate fakes for the poll loop's collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::api::LiveDataSource;
use crate::clock::FixedClock;
use crate::engine::{BaselineModel, PredictionInput, PredictionModel};
use crate::error::{FetchError, StoreError};
use crate::poller::Collaborators;
use crate::registry::WatcherRegistry;
use crate::reporter::Broadcaster;
use crate::store::{FormStore, MemoryStore};
use crate::types::{
    BetClassification, ExpectedValue, FormDocument, GameRecord, LiveFixtureState,
    LiveGameUpdate, MatchHistory, MatchStatus, Prediction, PredictionSnapshot, Score,
    UpdateEvent, WatchedEntityId,
};

pub fn id(raw: &str) -> WatchedEntityId {
    WatchedEntityId::parse(raw).expect("valid test id")
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 16, 15, 0, 0).unwrap()
}

/// A game with stake 10 at odds 2.0 and the given initial probability.
pub fn game(fixture_id: Option<&str>, initial_probability: f64) -> GameRecord {
    let tag = fixture_id.unwrap_or("none");
    GameRecord {
        fixture_id: fixture_id.map(str::to_string),
        home_team: format!("Home {tag}"),
        away_team: format!("Away {tag}"),
        stake: 10.0,
        odds: 2.0,
        bet_classification: BetClassification::default(),
        history: MatchHistory::default(),
        initial_prediction: Some(PredictionSnapshot {
            prediction: Prediction {
                win_probability: initial_probability,
                ..Prediction::default()
            },
            expected_value: ExpectedValue::default(),
        }),
        current_prediction: None,
        live_score: None,
        minute: None,
        status: None,
        last_updated: None,
    }
}

pub fn live(fixture_id: &str, status: MatchStatus, score: Score, minute: u32) -> LiveFixtureState {
    LiveFixtureState {
        fixture_id: fixture_id.to_string(),
        status,
        score,
        minute,
    }
}

enum Scripted {
    Live(LiveFixtureState),
    Fail,
}

/// Data source answering from a per-fixture script and recording every call.
/// Unscripted fixtures return `Ok(None)`.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn set(&self, fixture_id: &str, state: LiveFixtureState) {
        self.script
            .lock()
            .unwrap()
            .insert(fixture_id.to_string(), Scripted::Live(state));
    }

    pub fn fail(&self, fixture_id: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(fixture_id.to_string(), Scripted::Fail);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LiveDataSource for ScriptedSource {
    async fn find_live_state(
        &self,
        fixture_id: &str,
    ) -> Result<Option<LiveFixtureState>, FetchError> {
        self.calls.lock().unwrap().push(fixture_id.to_string());
        match self.script.lock().unwrap().get(fixture_id) {
            Some(Scripted::Live(state)) => Ok(Some(state.clone())),
            Some(Scripted::Fail) => Err(FetchError::Status {
                fixture_id: fixture_id.to_string(),
                status: 503,
            }),
            None => Ok(None),
        }
    }
}

/// Data source whose every fetch panics.
pub struct PanickingSource;

#[async_trait]
impl LiveDataSource for PanickingSource {
    async fn find_live_state(
        &self,
        fixture_id: &str,
    ) -> Result<Option<LiveFixtureState>, FetchError> {
        panic!("provider client blew up on fixture {fixture_id}");
    }
}

/// Model that always predicts the same probability. EV uses the baseline formula.
pub struct FixedModel(pub f64);

impl PredictionModel for FixedModel {
    fn compute_prediction(&self, _input: &PredictionInput<'_>) -> Prediction {
        Prediction {
            win_probability: self.0,
            confidence: "fixed".to_string(),
            factors: vec![],
        }
    }

    fn compute_expected_value(&self, probability: f64, odds: f64, stake: f64) -> ExpectedValue {
        BaselineModel.compute_expected_value(probability, odds, stake)
    }
}

/// `MemoryStore` wrapper that records nested updates and can fail reads.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    updates: Mutex<Vec<(WatchedEntityId, String)>>,
    fail_reads: AtomicBool,
}

impl RecordingStore {
    pub fn updates(&self) -> Vec<(WatchedEntityId, String)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FormStore for RecordingStore {
    async fn get(&self, id: &WatchedEntityId) -> Result<Option<FormDocument>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".to_string()));
        }
        self.inner.get(id).await
    }

    async fn update_nested_game(
        &self,
        id: &WatchedEntityId,
        fixture_id: &str,
        update: &LiveGameUpdate,
    ) -> Result<(), StoreError> {
        self.updates
            .lock()
            .unwrap()
            .push((id.clone(), fixture_id.to_string()));
        self.inner.update_nested_game(id, fixture_id, update).await
    }

    async fn insert(&self, doc: FormDocument) -> Result<(), StoreError> {
        self.inner.insert(doc).await
    }

    async fn remove(&self, id: &WatchedEntityId) -> Result<Option<FormDocument>, StoreError> {
        self.inner.remove(id).await
    }
}

#[derive(Default)]
pub struct RecordingBroadcaster {
    published: Mutex<Vec<(String, UpdateEvent)>>,
}

impl RecordingBroadcaster {
    pub fn published(&self) -> Vec<(String, UpdateEvent)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn publish(&self, topic: &str, event: &UpdateEvent) {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), event.clone()));
    }
}

/// Fakes wired together, with handles kept for assertions.
pub struct Harness {
    pub store: Arc<RecordingStore>,
    pub source: Arc<ScriptedSource>,
    pub broadcaster: Arc<RecordingBroadcaster>,
    pub model: Arc<FixedModel>,
    pub registry: Arc<WatcherRegistry>,
}

impl Harness {
    pub fn with_probability(probability: f64) -> Self {
        Self {
            store: Arc::new(RecordingStore::default()),
            source: Arc::new(ScriptedSource::default()),
            broadcaster: Arc::new(RecordingBroadcaster::default()),
            model: Arc::new(FixedModel(probability)),
            registry: Arc::new(WatcherRegistry::new()),
        }
    }

    pub async fn insert_form(&self, form: &str, games: Vec<GameRecord>) {
        self.store
            .insert(FormDocument {
                id: id(form),
                user_id: "user-1".to_string(),
                games,
            })
            .await
            .unwrap();
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            source: self.source.clone(),
            model: self.model.clone(),
            broadcaster: self.broadcaster.clone(),
            clock: Arc::new(FixedClock(test_now())),
        }
    }
}
