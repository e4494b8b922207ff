use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{PredictionInput, PredictionModel, round2};
use crate::types::{FormDocument, PredictionSnapshot};

/// Overall probability above which a form is considered reasonable.
const CAUTION_THRESHOLD: f64 = 55.0;

/// Aggregate view of a form's pre-match predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSummary {
    pub total_stake: f64,
    /// Sum of `stake * odds` over games predicted more likely than not.
    pub expected_return: f64,
    pub expected_profit: f64,
    pub overall_win_probability: f64,
    pub recommendation: String,
    pub total_games: usize,
}

/// Fill in the pre-match prediction for every game that has a fixture id and
/// no initial prediction yet. Returns how many games were scored.
pub fn initialize_predictions(doc: &mut FormDocument, model: &dyn PredictionModel) -> usize {
    let mut scored = 0;
    for game in doc.games.iter_mut() {
        if game.fixture_id.is_none() || game.initial_prediction.is_some() {
            continue;
        }
        let prediction = model.compute_prediction(&PredictionInput {
            history: &game.history,
            home_team: &game.home_team,
            bet_type: &game.bet_classification.specific,
            current_score: None,
            minute: None,
        });
        let expected_value =
            model.compute_expected_value(prediction.win_probability / 100.0, game.odds, game.stake);
        game.initial_prediction = Some(PredictionSnapshot {
            prediction,
            expected_value,
        });
        scored += 1;
    }
    debug!("[{}] Initialized {scored} prediction(s)", doc.id);
    scored
}

pub fn summarize(doc: &FormDocument) -> FormSummary {
    let total_stake: f64 = doc.games.iter().map(|g| g.stake).sum();
    let expected_return: f64 = doc
        .games
        .iter()
        .filter(|g| g.initial_prediction.is_some() && g.initial_probability() > 50.0)
        .map(|g| g.stake * g.odds)
        .sum();
    let overall = if doc.games.is_empty() {
        50.0
    } else {
        doc.games.iter().map(|g| g.initial_probability()).sum::<f64>() / doc.games.len() as f64
    };
    let recommendation = if overall > CAUTION_THRESHOLD {
        "Proceed with caution"
    } else {
        "High risk bets"
    };

    FormSummary {
        total_stake: round2(total_stake),
        expected_return: round2(expected_return),
        expected_profit: round2(expected_return - total_stake),
        overall_win_probability: round2(overall),
        recommendation: recommendation.to_string(),
        total_games: doc.games.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BaselineModel;
    use crate::testkit::{FixedModel, game, id};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    fn form(games: Vec<crate::types::GameRecord>) -> FormDocument {
        FormDocument {
            id: id("F1"),
            user_id: String::new(),
            games,
        }
    }

    #[test]
    fn initialize_scores_only_unscored_fixtures() {
        let mut unscored = game(Some("X"), 0.0);
        unscored.initial_prediction = None;
        let mut no_fixture = game(None, 0.0);
        no_fixture.initial_prediction = None;
        let already = game(Some("Y"), 70.0);
        let mut doc = form(vec![unscored, no_fixture, already]);

        let scored = initialize_predictions(&mut doc, &FixedModel(62.0));

        assert_eq!(scored, 1);
        assert!(approx_eq(doc.games[0].initial_probability(), 62.0));
        assert!(doc.games[1].initial_prediction.is_none());
        assert!(approx_eq(doc.games[2].initial_probability(), 70.0));
    }

    #[test]
    fn initialize_uses_pre_match_model() {
        let mut g = game(Some("X"), 0.0);
        g.initial_prediction = None;
        let mut doc = form(vec![g]);

        initialize_predictions(&mut doc, &BaselineModel);

        let snapshot = doc.games[0].initial_prediction.as_ref().unwrap();
        assert!(approx_eq(snapshot.win_probability(), 45.0));
        assert!(approx_eq(snapshot.expected_value.expected_value, -1.0));
    }

    #[test]
    fn summary_counts_likely_winners() {
        let doc = form(vec![game(Some("A"), 60.0), game(Some("B"), 40.0)]);
        let summary = summarize(&doc);

        assert!(approx_eq(summary.total_stake, 20.0));
        assert!(approx_eq(summary.expected_return, 20.0));
        assert!(approx_eq(summary.expected_profit, 0.0));
        assert!(approx_eq(summary.overall_win_probability, 50.0));
        assert_eq!(summary.recommendation, "High risk bets");
        assert_eq!(summary.total_games, 2);
    }

    #[test]
    fn summary_recommends_caution_above_threshold() {
        let doc = form(vec![game(Some("A"), 70.0), game(Some("B"), 60.0)]);
        assert_eq!(summarize(&doc).recommendation, "Proceed with caution");
    }

    #[test]
    fn summary_of_empty_form() {
        let summary = summarize(&form(vec![]));
        assert!(approx_eq(summary.overall_win_probability, 50.0));
        assert_eq!(summary.total_games, 0);
    }
}
