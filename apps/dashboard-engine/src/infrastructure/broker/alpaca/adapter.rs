//! Alpaca broker adapter implementing BrokerPort.

use async_trait::async_trait;

use crate::application::ports::{BrokerError, BrokerPort, OrderAck, SubmitOrderRequest};
use crate::domain::execution::Venue;
use crate::domain::market::{Account, Position, Quote};
use crate::domain::shared::Symbol;

use super::api_types::{
    AlpacaAccountResponse, AlpacaLatestQuotesResponse, AlpacaOrderRequest, AlpacaOrderResponse,
    AlpacaPositionResponse,
};
use super::config::AlpacaConfig;
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Alpaca Markets broker adapter.
///
/// Bound to exactly one venue for its lifetime: the paper endpoint or the
/// live endpoint, never both.
#[derive(Debug, Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
    venue: Venue,
    data_feed: String,
}

impl AlpacaBrokerAdapter {
    /// Create a new Alpaca broker adapter.
    pub fn new(config: AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(&config)?;
        Ok(Self {
            client,
            venue: config.venue,
            data_feed: config.data_feed,
        })
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    fn venue(&self) -> Venue {
        self.venue
    }

    fn name(&self) -> &'static str {
        "alpaca"
    }

    async fn get_account(&self) -> Result<Account, BrokerError> {
        let response: AlpacaAccountResponse = self.client.get("/v2/account").await?;
        Ok(Account::try_from(response)?)
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let response: Vec<AlpacaPositionResponse> = self.client.get("/v2/positions").await?;
        let positions = response
            .into_iter()
            .map(Position::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    async fn get_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, BrokerError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut response: AlpacaLatestQuotesResponse = self
            .client
            .data_get(
                "/v2/stocks/quotes/latest",
                &[("symbols", joined.as_str()), ("feed", self.data_feed.as_str())],
            )
            .await?;

        // Keep the caller's order; symbols the venue does not know are absent.
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(raw) = response.quotes.remove(symbol.as_str()) {
                quotes.push(raw.to_quote(symbol.clone())?);
            }
        }

        Ok(quotes)
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        if self.venue.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                symbol = %request.symbol,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        let alpaca_request = AlpacaOrderRequest::from(&request);

        tracing::info!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = alpaca_request.side,
            order_type = alpaca_request.order_type,
            qty = %alpaca_request.qty,
            limit_price = ?alpaca_request.limit_price,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse =
            self.client.post_once("/v2/orders", &alpaca_request).await?;

        tracing::info!(
            client_order_id = %request.client_order_id,
            broker_order_id = %response.id,
            status = %response.status,
            "Order submitted"
        );

        Ok(response.to_order_ack())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_reports_configured_venue() {
        let adapter =
            AlpacaBrokerAdapter::new(AlpacaConfig::new("key", "secret", Venue::Live)).unwrap();
        assert_eq!(adapter.venue(), Venue::Live);
        assert_eq!(adapter.name(), "alpaca");
    }

    #[test]
    fn adapter_requires_credentials() {
        let result = AlpacaBrokerAdapter::new(AlpacaConfig::new("key", "", Venue::Paper));
        assert!(matches!(result, Err(AlpacaError::MissingCredentials)));
    }
}
