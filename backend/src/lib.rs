pub mod binance;
pub mod config;
