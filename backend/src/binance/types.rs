//! Wire shapes that need more than a plain `Deserialize`.

use market::Venue;
use market::transport::{InverseContract, RawCandle};
use serde::Deserialize;
use serde_json::Value;

use super::errors::BinanceError;

#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<InverseContract>,
}

/// Inverse endpoints answer a single-symbol query with a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_first(self) -> Result<T, BinanceError> {
        match self {
            OneOrMany::One(v) => Ok(v),
            OneOrMany::Many(v) => v
                .into_iter()
                .next()
                .ok_or_else(|| BinanceError::InvalidResponse("empty array".into())),
        }
    }
}

/// Column positions inside a kline row.
struct KlineLayout {
    volume: usize,
    taker_buy_volume: usize,
}

/// Spot and linear rows report base volume at 5 and taker-buy base at 9.
/// Inverse rows report contracts there and base volume at 7 and 10.
fn layout(venue: Venue) -> KlineLayout {
    match venue {
        Venue::InverseFutures => KlineLayout {
            volume: 7,
            taker_buy_volume: 10,
        },
        _ => KlineLayout {
            volume: 5,
            taker_buy_volume: 9,
        },
    }
}

pub fn decode_klines(venue: Venue, rows: Vec<Vec<Value>>) -> Result<Vec<RawCandle>, BinanceError> {
    let cols = layout(venue);
    rows.iter()
        .map(|row| {
            Ok(RawCandle {
                open_time: int_at(row, 0)?,
                close: str_at(row, 4)?,
                volume: str_at(row, cols.volume)?,
                close_time: int_at(row, 6)?,
                taker_buy_base_volume: str_at(row, cols.taker_buy_volume)?,
            })
        })
        .collect()
}

fn int_at(row: &[Value], idx: usize) -> Result<u64, BinanceError> {
    row.get(idx)
        .and_then(Value::as_u64)
        .ok_or_else(|| BinanceError::InvalidResponse(format!("kline column {idx} is not a timestamp")))
}

fn str_at(row: &[Value], idx: usize) -> Result<String, BinanceError> {
    match row.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(BinanceError::InvalidResponse(format!(
            "kline column {idx} missing"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use market::transport::RawPrice;

    use super::*;

    fn rows(json: &str) -> Vec<Vec<Value>> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn linear_klines_use_base_volume_columns() {
        let json = r#"[[1700000000000,"100.0","101.0","99.0","100.5","12.5",1700000899999,"1256.0",42,"7.5","753.0","0"]]"#;
        let c = decode_klines(Venue::LinearFutures, rows(json)).unwrap();

        assert_eq!(c.len(), 1);
        assert_eq!(c[0].open_time, 1_700_000_000_000);
        assert_eq!(c[0].close, "100.5");
        assert_eq!(c[0].volume, "12.5");
        assert_eq!(c[0].close_time, 1_700_000_899_999);
        assert_eq!(c[0].taker_buy_base_volume, "7.5");
    }

    #[test]
    fn inverse_klines_use_base_asset_columns() {
        let json = r#"[[1700000000000,"100.0","101.0","99.0","100.5","1200",1700000899999,"11.9",42,"700","6.9","0"]]"#;
        let c = decode_klines(Venue::InverseFutures, rows(json)).unwrap();

        assert_eq!(c[0].volume, "11.9");
        assert_eq!(c[0].taker_buy_base_volume, "6.9");
    }

    #[test]
    fn short_rows_are_rejected() {
        let json = r#"[[1700000000000,"100.0"]]"#;
        assert!(decode_klines(Venue::Spot, rows(json)).is_err());
    }

    #[test]
    fn one_or_many_takes_the_first_element() {
        let one: OneOrMany<RawPrice> = serde_json::from_str(r#"{"price":"1.5"}"#).unwrap();
        let many: OneOrMany<RawPrice> =
            serde_json::from_str(r#"[{"symbol":"BTCUSD_PERP","price":"2.5"}]"#).unwrap();
        let empty: OneOrMany<RawPrice> = serde_json::from_str("[]").unwrap();

        assert_eq!(one.into_first().unwrap().price, "1.5");
        assert_eq!(many.into_first().unwrap().price, "2.5");
        assert!(empty.into_first().is_err());
    }

    #[test]
    fn exchange_info_decodes_integer_contract_sizes() {
        let json = r#"{"timezone":"UTC","symbols":[
            {"symbol":"BTCUSD_PERP","pair":"BTCUSD","contractType":"PERPETUAL","baseAsset":"BTC","contractSize":100},
            {"symbol":"BTCUSD_251226","pair":"BTCUSD","contractType":"CURRENT_QUARTER","baseAsset":"BTC","contractSize":100}
        ]}"#;
        let info: ExchangeInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.symbols.len(), 2);
        assert!(info.symbols[0].is_perpetual());
        assert!(!info.symbols[1].is_perpetual());
        assert_eq!(info.symbols[0].contract_size, 100.0);
    }
}
