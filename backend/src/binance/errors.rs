use market::{TransportError, Venue};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinanceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("binance returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from binance: {0}")]
    InvalidResponse(String),

    #[error("{capability} is not offered on {venue}")]
    Unsupported {
        venue: Venue,
        capability: &'static str,
    },
}

impl From<BinanceError> for TransportError {
    fn from(err: BinanceError) -> Self {
        match err {
            BinanceError::Http(e) if e.is_timeout() => TransportError::Timeout,
            BinanceError::Http(e) if e.is_decode() => TransportError::Decode(e.to_string()),
            BinanceError::Http(e) => match e.status() {
                Some(status) => TransportError::Http {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => TransportError::Network(e.to_string()),
            },
            BinanceError::Status { status, body } => TransportError::Http {
                status,
                message: body,
            },
            BinanceError::InvalidResponse(msg) => TransportError::Decode(msg),
            BinanceError::Unsupported { venue, capability } => {
                TransportError::Unsupported { venue, capability }
            }
        }
    }
}
