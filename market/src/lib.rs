//! Snapshot aggregation and signal engine.
//!
//! Data flow for one instrument:
//!
//! ```text
//! VenueRegistry -> fetchers -> delta -> signal -> HistoryStore
//!        \___________ orchestrator::SnapshotService ____________/
//! ```
//!
//! The transport is abstract (`transport::MarketDataTransport`); the binary
//! crate plugs in the REST implementation.

pub mod delta;
pub mod error;
pub mod fetchers;
pub mod history;
pub mod orchestrator;
pub mod poller;
pub mod signal;
pub mod snapshot;
pub mod transport;
pub mod types;
pub mod venues;

pub use error::SnapshotError;
pub use history::HistoryStore;
pub use orchestrator::SnapshotService;
pub use poller::{PollCycle, Poller};
pub use signal::{Signal, SignalResult, SignalThresholds};
pub use snapshot::{FaultKind, Snapshot, SnapshotFault};
pub use transport::{MarketDataTransport, TransportError};
pub use types::{CandleInterval, Venue};
pub use venues::{VenueMembership, VenueRegistry};
