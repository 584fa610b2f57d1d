//! Binance spot price feed
//!
//! `GET /api/v3/ticker/price?symbol=BTCUSDT`. Any failure (transport,
//! non-2xx status, unparseable price) surfaces as `PriceUnavailable`,
//! which callers treat as an unresolvable round rather than an error.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::config::PriceFeedConfig;
use crate::error::{GameError, Result};
use crate::game::traits::PriceFeed;

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

pub struct BinancePriceFeed {
    client: reqwest::Client,
    base_url: String,
    symbol: String,
}

impl BinancePriceFeed {
    pub fn new(config: &PriceFeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbol: config.symbol.clone(),
        })
    }
}

#[async_trait]
impl PriceFeed for BinancePriceFeed {
    async fn current_price(&self) -> Result<Decimal> {
        let url = format!(
            "{}/api/v3/ticker/price?symbol={}",
            self.base_url, self.symbol
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GameError::PriceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GameError::PriceUnavailable(format!(
                "Binance API error: {}",
                response.status()
            )));
        }

        let ticker: TickerPrice = response
            .json()
            .await
            .map_err(|e| GameError::PriceUnavailable(e.to_string()))?;

        Decimal::from_str(&ticker.price).map_err(|e| {
            GameError::PriceUnavailable(format!("invalid price {:?}: {e}", ticker.price))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_payload_parses() {
        let ticker: TickerPrice =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","price":"50123.45000000"}"#).unwrap();
        assert_eq!(
            Decimal::from_str(&ticker.price).unwrap(),
            Decimal::from_str("50123.45").unwrap()
        );
    }
}
