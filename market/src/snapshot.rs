use serde::{Deserialize, Serialize};

use crate::delta::Deltas;
use crate::error::SnapshotError;
use crate::signal::SignalResult;
use crate::types::{FundingPoint, Liquidation, OpenInterestPoint, SpotAggregates};
use crate::venues::VenueMembership;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    InvalidInstrument,
    Aborted,
}

/// Why a snapshot is degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFault {
    pub kind: FaultKind,
    pub message: String,
}

impl From<&SnapshotError> for SnapshotFault {
    fn from(e: &SnapshotError) -> Self {
        let kind = match e {
            // An empty request never yields a snapshot; per instrument it
            // can only mean the symbol was unusable.
            SnapshotError::NoInstruments | SnapshotError::InvalidInstrument(_) => {
                FaultKind::InvalidInstrument
            }
            SnapshotError::Aborted(_) => FaultKind::Aborted,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// One instrument at one fetch time.
///
/// A snapshot with `error` set is a degraded but valid record: it carries
/// only the instrument, the timestamp and the fault.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    /// Epoch milliseconds.
    pub fetched_at_ms: u64,

    pub price: Option<f64>,
    pub mark_price: Option<f64>,
    pub funding_rate: Option<f64>,
    pub next_funding_time_ms: Option<u64>,
    pub open_interest: Option<f64>,
    pub spot: Option<SpotAggregates>,

    pub deltas: Deltas,

    /// Last 6 settled funding rates, oldest first.
    pub funding_history: Vec<FundingPoint>,
    /// Last 6 4h open-interest buckets, oldest first.
    pub open_interest_history: Vec<OpenInterestPoint>,
    /// Last 10 forced liquidations, oldest first.
    pub liquidations: Vec<Liquidation>,

    pub signal: Option<SignalResult>,
    pub venues: Option<VenueMembership>,

    pub error: Option<SnapshotFault>,
}

impl Snapshot {
    pub fn degraded(symbol: impl Into<String>, fetched_at_ms: u64, error: &SnapshotError) -> Self {
        Self {
            symbol: symbol.into(),
            fetched_at_ms,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}
