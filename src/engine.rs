use crate::types::{ExpectedValue, MatchHistory, Prediction, Score};

/// Probability bounds, in percent. The model never claims certainty.
const MIN_PROBABILITY: f64 = 1.0;
const MAX_PROBABILITY: f64 = 99.0;

/// Regulation time used to scale live adjustments.
const FULL_TIME_MINUTES: f64 = 90.0;

/// Inputs to a single win-probability computation.
#[derive(Debug, Clone, Copy)]
pub struct PredictionInput<'a> {
    pub history: &'a MatchHistory,
    pub home_team: &'a str,
    pub bet_type: &'a str,
    pub current_score: Option<Score>,
    pub minute: Option<u32>,
}

/// Win-probability and expected-value model.
///
/// Implementations must be pure: the same input always yields the same
/// output, and neither call may block.
pub trait PredictionModel: Send + Sync {
    fn compute_prediction(&self, input: &PredictionInput<'_>) -> Prediction;

    /// `probability` is a fraction in `0.0..=1.0`.
    fn compute_expected_value(&self, probability: f64, odds: f64, stake: f64) -> ExpectedValue;
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Change between an updated and an initial win probability, in points.
pub fn probability_change(updated: f64, initial: f64) -> f64 {
    round2(updated - initial)
}

/// Form-based model with a live score adjustment.
///
/// Recent form is scored W=3, D=1, L=0 and normalised; head-to-head results
/// and a small home advantage shift the pre-match split. Once the match is
/// running, the side ahead (or the draw, when level) absorbs probability in
/// proportion to goal margin and elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineModel;

/// Pre-match or live outcome split: (home, draw, away), summing to 1.
#[derive(Debug, Clone, Copy)]
struct OutcomeSplit {
    home: f64,
    draw: f64,
    away: f64,
}

impl OutcomeSplit {
    /// Move `pull` of the remaining mass onto one outcome, scaling the rest.
    fn pull_towards(self, target: Outcome, pull: f64) -> Self {
        let current = self.get(target);
        let boosted = current + (1.0 - current) * pull;
        let rest = 1.0 - current;
        let scale = if rest > 0.0 { (1.0 - boosted) / rest } else { 0.0 };
        let mut out = Self {
            home: self.home * scale,
            draw: self.draw * scale,
            away: self.away * scale,
        };
        match target {
            Outcome::Home => out.home = boosted,
            Outcome::Draw => out.draw = boosted,
            Outcome::Away => out.away = boosted,
        }
        out
    }

    fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    fn from_bet_type(bet_type: &str) -> Option<Self> {
        match bet_type {
            "home_win" | "1" => Some(Outcome::Home),
            "draw" | "x" | "X" => Some(Outcome::Draw),
            "away_win" | "2" => Some(Outcome::Away),
            _ => None,
        }
    }
}

fn result_points(result: &str) -> Option<f64> {
    match result {
        "W" | "w" => Some(3.0),
        "D" | "d" => Some(1.0),
        "L" | "l" => Some(0.0),
        _ => None,
    }
}

/// Normalised form strength in `0.0..=1.0`; 0.5 without usable data.
fn form_strength(form: &[String]) -> f64 {
    let points: Vec<f64> = form.iter().filter_map(|r| result_points(r)).collect();
    if points.is_empty() {
        return 0.5;
    }
    points.iter().sum::<f64>() / (3.0 * points.len() as f64)
}

/// Home share of head-to-head results; draws count half.
fn h2h_share(h2h: &[String]) -> f64 {
    let scored: Vec<f64> = h2h
        .iter()
        .filter_map(|r| match r.as_str() {
            "W" | "w" => Some(1.0),
            "D" | "d" => Some(0.5),
            "L" | "l" => Some(0.0),
            _ => None,
        })
        .collect();
    if scored.is_empty() {
        return 0.5;
    }
    scored.iter().sum::<f64>() / scored.len() as f64
}

impl BaselineModel {
    fn pre_match_split(history: &MatchHistory) -> OutcomeSplit {
        let gap = form_strength(&history.home_form) - form_strength(&history.away_form);
        let h2h = h2h_share(&history.h2h);
        let home = 0.45 + 0.35 * gap + 0.15 * (h2h - 0.5);
        let draw = 0.27 - 0.10 * gap.abs();
        let home = home.clamp(0.02, 0.90);
        let draw = draw.clamp(0.02, 0.96 - home);
        OutcomeSplit {
            home,
            draw,
            away: 1.0 - home - draw,
        }
    }

    fn live_split(split: OutcomeSplit, score: Score, minute: u32) -> OutcomeSplit {
        let progress = (minute as f64 / FULL_TIME_MINUTES).min(1.0);
        let margin = score.home as i64 - score.away as i64;
        if margin == 0 {
            return split.pull_towards(Outcome::Draw, 0.6 * progress);
        }
        let leader = if margin > 0 { Outcome::Home } else { Outcome::Away };
        let goals = margin.unsigned_abs().min(3) as f64;
        let pull = (0.25 * goals + 0.5 * progress).min(0.95);
        split.pull_towards(leader, pull)
    }

    fn confidence(history: &MatchHistory, minute: Option<u32>) -> &'static str {
        let known = history.home_form.len().min(history.away_form.len());
        match (known, minute) {
            (_, Some(m)) if m >= 70 => "high",
            (k, _) if k >= 5 => "high",
            (k, _) if k > 0 => "medium",
            _ => "low",
        }
    }
}

impl PredictionModel for BaselineModel {
    fn compute_prediction(&self, input: &PredictionInput<'_>) -> Prediction {
        let mut factors = Vec::new();
        let mut split = Self::pre_match_split(input.history);
        factors.push(format!(
            "{} pre-match split {:.0}/{:.0}/{:.0}",
            input.home_team,
            split.home * 100.0,
            split.draw * 100.0,
            split.away * 100.0
        ));

        if let (Some(score), Some(minute)) = (input.current_score, input.minute) {
            split = Self::live_split(split, score, minute);
            factors.push(format!("live {score} at {minute}'"));
        }

        let probability = match Outcome::from_bet_type(input.bet_type) {
            Some(outcome) => split.get(outcome),
            None => {
                factors.push(format!("unsupported bet type {}", input.bet_type));
                0.5
            }
        };

        Prediction {
            win_probability: round2((probability * 100.0).clamp(MIN_PROBABILITY, MAX_PROBABILITY)),
            confidence: Self::confidence(input.history, input.minute).to_string(),
            factors,
        }
    }

    fn compute_expected_value(&self, probability: f64, odds: f64, stake: f64) -> ExpectedValue {
        let p = probability.clamp(0.0, 1.0);
        let expected_value = p * (odds - 1.0) * stake - (1.0 - p) * stake;
        let roi = if stake > 0.0 {
            expected_value / stake * 100.0
        } else {
            0.0
        };
        ExpectedValue {
            expected_value: round2(expected_value),
            expected_return: round2(p * odds * stake),
            roi: round2(roi),
            is_value_bet: expected_value > 0.0,
        }
    }
}
