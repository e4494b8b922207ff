//! Per-form poll loop.
//!
//! Each cycle loads the form, fetches live state for every game that has a
//! fixture id, recomputes predictions for games that are in progress,
//! writes them back one game at a time, and broadcasts one event with all
//! deltas. Cycles for one form are strictly sequential, so there is at most
//! one in-flight store write per form.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::api::LiveDataSource;
use crate::clock::Clock;
use crate::engine::{PredictionInput, PredictionModel, probability_change};
use crate::error::{CycleError, StoreError};
use crate::registry::{WatcherHandle, WatcherRegistry};
use crate::reporter::Broadcaster;
use crate::store::FormStore;
use crate::types::{
    GameDelta, GameRecord, LiveFixtureState, LiveGameUpdate, PredictionSnapshot, UpdateEvent,
    WatchedEntityId,
};

/// External services a poll loop talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn FormStore>,
    pub source: Arc<dyn LiveDataSource>,
    pub model: Arc<dyn PredictionModel>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The handle's token was cancelled (stop request or shutdown).
    Cancelled,
    /// The registry no longer holds this loop's generation.
    Unregistered,
    /// The form was deleted from the store.
    EntityGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    Stopped(StopReason),
}

/// Outcome of one completed cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Games with a fixture id that were fetched.
    pub polled: usize,
    /// Fetched games that produced no delta (fetch failed, no data, not live).
    pub skipped: usize,
    pub deltas: Vec<GameDelta>,
}

/// Recompute one in-progress game.
///
/// Returns the fields to persist and the delta to broadcast.
pub fn evaluate_game(
    model: &dyn PredictionModel,
    game: &GameRecord,
    live: &LiveFixtureState,
    now: DateTime<Utc>,
) -> (LiveGameUpdate, GameDelta) {
    let prediction = model.compute_prediction(&PredictionInput {
        history: &game.history,
        home_team: &game.home_team,
        bet_type: &game.bet_classification.specific,
        current_score: Some(live.score),
        minute: Some(live.minute),
    });
    let expected_value =
        model.compute_expected_value(prediction.win_probability / 100.0, game.odds, game.stake);
    let snapshot = PredictionSnapshot {
        prediction,
        expected_value,
    };

    let initial = game.initial_probability();
    let delta = GameDelta {
        fixture_id: live.fixture_id.clone(),
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        current_score: live.score.to_string(),
        minute: live.minute,
        status: live.status,
        change: probability_change(snapshot.win_probability(), initial),
        initial_probability: initial,
        updated_prediction: snapshot.clone(),
        timestamp: now,
    };
    let update = LiveGameUpdate {
        prediction: snapshot,
        live_score: live.score,
        minute: live.minute,
        status: live.status,
        last_updated: now,
    };
    (update, delta)
}

/// Frees this loop's registry entry however the loop exits, unwinding
/// included. A no-op once the entry was removed or handed to a newer
/// generation.
struct ReleaseOnExit {
    registry: Arc<WatcherRegistry>,
    id: WatchedEntityId,
    generation: u64,
}

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        let released = self.registry.release(&self.id, self.generation);
        if std::thread::panicking() {
            error!("[{}] Poll loop panicked, monitor released", self.id);
        } else if released {
            debug!("[{}] Released monitor entry", self.id);
        }
    }
}

pub struct PollLoop {
    id: WatchedEntityId,
    handle: WatcherHandle,
    registry: Arc<WatcherRegistry>,
    deps: Collaborators,
    interval: Duration,
}

impl PollLoop {
    pub fn new(
        id: WatchedEntityId,
        handle: WatcherHandle,
        registry: Arc<WatcherRegistry>,
        deps: Collaborators,
        interval: Duration,
    ) -> Self {
        Self {
            id,
            handle,
            registry,
            deps,
            interval,
        }
    }

    /// Drive the loop until it stops. Never returns early on a transient error.
    pub async fn run(self) -> StopReason {
        info!(
            "[{}] Poll loop started (interval: {}s)",
            self.id,
            self.interval.as_secs()
        );
        let _release = ReleaseOnExit {
            registry: Arc::clone(&self.registry),
            id: self.id.clone(),
            generation: self.handle.generation(),
        };

        let mut state = PollState::Running;
        let reason = loop {
            match state {
                PollState::Running => state = self.step().await,
                PollState::Stopped(reason) => break reason,
            }
        };

        info!("[{}] Poll loop stopped ({reason:?})", self.id);
        reason
    }

    /// Termination check: cancelled, or no longer the registered loop for this id.
    fn termination(&self) -> Option<StopReason> {
        if self.handle.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if !self.registry.is_current(&self.id, self.handle.generation()) {
            return Some(StopReason::Unregistered);
        }
        None
    }

    async fn step(&self) -> PollState {
        if let Some(reason) = self.termination() {
            return PollState::Stopped(reason);
        }

        match self.run_cycle().await {
            Ok(report) => debug!(
                "[{}] Cycle done: polled={} skipped={} updated={}",
                self.id,
                report.polled,
                report.skipped,
                report.deltas.len()
            ),
            Err(CycleError::EntityGone(_)) => {
                warn!("[{}] Form not found, stopping monitor", self.id);
                return PollState::Stopped(StopReason::EntityGone);
            }
            Err(e) => warn!(
                "[{}] Cycle error: {e} (retrying in {}s)",
                self.id,
                self.interval.as_secs()
            ),
        }

        self.pause().await
    }

    /// Sleep one interval, waking early on cancellation.
    async fn pause(&self) -> PollState {
        tokio::select! {
            biased;
            _ = self.handle.token().cancelled() => PollState::Stopped(StopReason::Cancelled),
            _ = self.deps.clock.sleep(self.interval) => PollState::Running,
        }
    }

    /// One fetch, evaluate, persist, broadcast pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let doc = self
            .deps
            .store
            .get(&self.id)
            .await?
            .ok_or_else(|| CycleError::EntityGone(self.id.clone()))?;

        let mut report = CycleReport::default();
        for game in &doc.games {
            let Some(fixture_id) = game.fixture_id.as_deref() else {
                continue;
            };
            report.polled += 1;

            let live = match self.deps.source.find_live_state(fixture_id).await {
                Ok(Some(live)) => live,
                Ok(None) => {
                    debug!("[{}] No live data for fixture {fixture_id}", self.id);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("[{}] Skipping fixture {fixture_id}: {e}", self.id);
                    report.skipped += 1;
                    continue;
                }
            };

            if !live.status.is_live() {
                debug!(
                    "[{}] Fixture {fixture_id} is {}, not live",
                    self.id, live.status
                );
                report.skipped += 1;
                continue;
            }

            let now = self.deps.clock.now();
            let (update, delta) = evaluate_game(self.deps.model.as_ref(), game, &live, now);

            match self
                .deps
                .store
                .update_nested_game(&self.id, fixture_id, &update)
                .await
            {
                Ok(()) => {}
                Err(StoreError::GameNotFound { .. }) => {
                    warn!(
                        "[{}] Fixture {fixture_id} removed from form mid-cycle, skipping",
                        self.id
                    );
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            info!(
                "[{}] {} vs {} {} ({}'): {:.2}% ({:+.2})",
                self.id,
                delta.home_team,
                delta.away_team,
                delta.current_score,
                delta.minute,
                delta.updated_prediction.win_probability(),
                delta.change
            );
            report.deltas.push(delta);
        }

        if !report.deltas.is_empty() {
            let event = UpdateEvent::live_update(
                self.id.clone(),
                report.deltas.clone(),
                self.deps.clock.now(),
            );
            self.deps.broadcaster.publish(&self.id.topic(), &event).await;
            info!(
                "[{}] Broadcast {} update(s) to {}",
                self.id,
                report.deltas.len(),
                self.id.topic()
            );
        }

        Ok(report)
    }
}
