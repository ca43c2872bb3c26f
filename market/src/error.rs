use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("no instruments supplied")]
    NoInstruments,

    #[error("invalid instrument: {0:?}")]
    InvalidInstrument(String),

    #[error("assembly aborted: {0}")]
    Aborted(String),
}
