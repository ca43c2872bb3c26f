//! Signal Engine
//!
//! Pure mapping from a `Deltas` bundle to a score, a discrete signal and the
//! ordered reasons behind it.
//!
//! ## Rules (fixed order, cumulative)
//!
//! | # | Rule              | Score                                   |
//! |---|-------------------|-----------------------------------------|
//! | 1 | 15m price move    | ±2 at ±`price_move_pct`                 |
//! | 2 | 4h open interest  | +2 / +1 rising, +1 falling w/ price up  |
//! | 3 | funding sign flip | +1                                      |
//! | 4 | funding crowding  | -1 longs, +1 shorts                     |
//! | 5 | net taker flow    | 0 (reason only)                         |
//!
//! ## Classification
//!
//! ```text
//! score >= 3  -> BUY
//! score <= -2 -> SELL
//! otherwise   -> NEUTRAL
//! ```
//!
//! The bands are asymmetric on purpose: bullish calls need more evidence.

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::delta::Deltas;
use rules::{RULES, RuleOutcome};

pub const BUY_SCORE: i32 = 3;
pub const SELL_SCORE: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalResult {
    pub signal: Signal,
    pub score: i32,
    pub reasons: Vec<String>,
}

/// Fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Absolute 15m price move, percent.
    pub price_move_pct: f64,
    /// Absolute 4h open-interest move, percent.
    pub open_interest_move_pct: f64,
    /// Per-8h funding rate (fraction) that marks longs as crowded.
    pub long_crowding_rate: f64,
    /// Per-8h funding rate (fraction) that marks shorts as crowded.
    pub short_crowding_rate: f64,
    /// Crowding fires beyond `multiplier * rate`.
    pub crowding_multiplier: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            price_move_pct: 3.0,
            open_interest_move_pct: 5.0,
            long_crowding_rate: 0.0005,
            short_crowding_rate: -0.0005,
            crowding_multiplier: 3.0,
        }
    }
}

pub fn classify(score: i32) -> Signal {
    if score >= BUY_SCORE {
        Signal::Buy
    } else if score <= SELL_SCORE {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}

/// Fold every rule left to right. No hidden state: identical input always
/// yields an identical result.
pub fn score(deltas: &Deltas, thresholds: &SignalThresholds) -> SignalResult {
    let (score, reasons) = RULES
        .iter()
        .map(|rule| (rule.evaluate)(deltas, thresholds))
        .fold((0, Vec::new()), |(score, mut reasons), outcome: RuleOutcome| {
            reasons.extend(outcome.reason);
            (score + outcome.score, reasons)
        });

    SignalResult {
        signal: classify(score),
        score,
        reasons,
    }
}
