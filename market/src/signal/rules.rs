//! Individual scoring rules. Each is a pure function of the delta bundle.

use crate::delta::Deltas;

use super::SignalThresholds;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub score: i32,
    pub reason: Option<String>,
}

impl RuleOutcome {
    fn none() -> Self {
        Self::default()
    }

    fn scored(score: i32, reason: String) -> Self {
        Self {
            score,
            reason: Some(reason),
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    pub evaluate: fn(&Deltas, &SignalThresholds) -> RuleOutcome,
}

/// Evaluation order; only affects the order of reasons.
pub const RULES: [Rule; 5] = [
    Rule {
        name: "price_momentum",
        evaluate: price_momentum,
    },
    Rule {
        name: "open_interest",
        evaluate: open_interest,
    },
    Rule {
        name: "funding_flip",
        evaluate: funding_flip,
    },
    Rule {
        name: "funding_crowding",
        evaluate: funding_crowding,
    },
    Rule {
        name: "net_flow",
        evaluate: net_flow,
    },
];

fn price_rising(d: &Deltas) -> bool {
    d.price_change_15m_pct.is_some_and(|p| p > 0.0)
}

pub fn price_momentum(d: &Deltas, t: &SignalThresholds) -> RuleOutcome {
    match d.price_change_15m_pct {
        Some(p) if p >= t.price_move_pct => {
            RuleOutcome::scored(2, format!("price {p:+.2}% in 15m (breakout)"))
        }
        Some(p) if p <= -t.price_move_pct => {
            RuleOutcome::scored(-2, format!("price {p:+.2}% in 15m (breakdown)"))
        }
        _ => RuleOutcome::none(),
    }
}

/// Rising OI confirms the move; falling OI only counts with rising price
/// (short covering). Falling OI with falling or unknown price is ignored.
pub fn open_interest(d: &Deltas, t: &SignalThresholds) -> RuleOutcome {
    match d.open_interest_change_4h_pct {
        Some(oi) if oi >= t.open_interest_move_pct => {
            if price_rising(d) {
                RuleOutcome::scored(
                    2,
                    format!("open interest {oi:+.2}% in 4h with rising price"),
                )
            } else {
                RuleOutcome::scored(1, format!("open interest {oi:+.2}% in 4h"))
            }
        }
        Some(oi) if oi <= -t.open_interest_move_pct && price_rising(d) => RuleOutcome::scored(
            1,
            format!("open interest {oi:+.2}% in 4h with rising price (short covering)"),
        ),
        _ => RuleOutcome::none(),
    }
}

/// Direction-agnostic: any reversal of crowd positioning scores.
pub fn funding_flip(d: &Deltas, _t: &SignalThresholds) -> RuleOutcome {
    match (d.funding_rate_prev, d.funding_rate_now) {
        (Some(prev), Some(now)) if (prev > 0.0 && now < 0.0) || (prev < 0.0 && now > 0.0) => {
            RuleOutcome::scored(
                1,
                format!(
                    "funding flipped from {:+.4}% to {:+.4}%",
                    prev * 100.0,
                    now * 100.0
                ),
            )
        }
        _ => RuleOutcome::none(),
    }
}

pub fn funding_crowding(d: &Deltas, t: &SignalThresholds) -> RuleOutcome {
    let Some(rate) = d.funding_rate_now else {
        return RuleOutcome::none();
    };

    if rate > t.crowding_multiplier * t.long_crowding_rate {
        RuleOutcome::scored(
            -1,
            format!("funding {:+.4}% (crowded longs)", rate * 100.0),
        )
    } else if rate < t.crowding_multiplier * t.short_crowding_rate {
        RuleOutcome::scored(
            1,
            format!("funding {:+.4}% (crowded shorts)", rate * 100.0),
        )
    } else {
        RuleOutcome::none()
    }
}

/// Informational only.
pub fn net_flow(d: &Deltas, _t: &SignalThresholds) -> RuleOutcome {
    let Some(flow) = d.net_flow else {
        return RuleOutcome::none();
    };

    let bias = if flow > 0.0 {
        "buy-dominant"
    } else if flow < 0.0 {
        "sell-dominant"
    } else {
        "balanced"
    };

    RuleOutcome::scored(0, format!("net taker flow {flow:+.2} ({bias})"))
}
