pub mod client;
pub mod errors;
pub mod types;

pub use client::BinanceClient;
pub use errors::BinanceError;
