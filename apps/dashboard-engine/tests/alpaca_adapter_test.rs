//! Alpaca adapter against a mock HTTP server.
//!
//! Covers wire parsing, read retries and the no-retry rule for order POSTs.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dashboard_engine::application::ports::{AckStatus, BrokerError, BrokerPort, SubmitOrderRequest};
use dashboard_engine::domain::execution::{OrderSide, OrderSpec, Venue};
use dashboard_engine::domain::shared::{RequestId, Symbol};
use dashboard_engine::application::retry::RetryPolicy;
use dashboard_engine::infrastructure::broker::alpaca::{AlpacaBrokerAdapter, AlpacaConfig};

fn adapter(server: &MockServer) -> AlpacaBrokerAdapter {
    let config = AlpacaConfig::new("test-key", "test-secret", Venue::Paper)
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5))
        .with_retry(RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        });
    AlpacaBrokerAdapter::new(config).unwrap()
}

fn order_request() -> SubmitOrderRequest {
    let spec = OrderSpec::limit("AAPL", OrderSide::Buy, dec!(10), dec!(190.50));
    SubmitOrderRequest::from_spec(&RequestId::new("req-1"), 0, &spec)
}

#[tokio::test]
async fn account_is_parsed_from_string_numerics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .and(header("APCA-API-KEY-ID", "test-key"))
        .and(header("APCA-API-SECRET-KEY", "test-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acct-1",
            "status": "ACTIVE",
            "currency": "USD",
            "equity": "100250.75",
            "cash": "50000",
            "buying_power": "200000",
            "portfolio_value": "100250.75",
            "daytrade_count": 1,
            "pattern_day_trader": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let account = adapter(&server).get_account().await.unwrap();

    assert_eq!(account.account_id, "acct-1");
    assert_eq!(account.equity, dec!(100250.75));
    assert_eq!(account.buying_power, dec!(200000));
    assert_eq!(account.daytrade_count, 1);
}

#[tokio::test]
async fn reads_retry_on_service_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/positions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "code": 50300000,
            "message": "service unavailable"
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "symbol": "MSFT",
            "qty": "12",
            "side": "long",
            "avg_entry_price": "400",
            "market_value": "4920",
            "current_price": "410",
            "unrealized_pl": "120"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let positions = adapter(&server).get_positions().await.unwrap();

    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol.as_str(), "MSFT");
    assert_eq!(positions[0].quantity, dec!(12));
}

#[tokio::test]
async fn reads_give_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = adapter(&server).get_account().await.unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn quotes_follow_requested_order_and_skip_unknown_symbols() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/stocks/quotes/latest"))
        .and(query_param("symbols", "SPY,NOPE,AAPL"))
        .and(query_param("feed", "iex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quotes": {
                "AAPL": {"ap": 190.12, "as": 3, "bp": 190.1, "bs": 5, "t": "2026-03-02T15:30:00Z"},
                "SPY": {"ap": 500.5, "as": 1, "bp": 500.4, "bs": 2, "t": "2026-03-02T15:30:01Z"}
            }
        })))
        .mount(&server)
        .await;

    let symbols = [Symbol::new("SPY"), Symbol::new("NOPE"), Symbol::new("AAPL")];
    let quotes = adapter(&server).get_quotes(&symbols).await.unwrap();

    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].symbol.as_str(), "SPY");
    assert_eq!(quotes[1].symbol.as_str(), "AAPL");
    assert_eq!(quotes[1].bid, dec!(190.1));
}

#[tokio::test]
async fn order_is_acknowledged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ord-42",
            "client_order_id": "req-1-0",
            "symbol": "AAPL",
            "filled_qty": "0",
            "filled_avg_price": null,
            "status": "accepted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = adapter(&server).submit_order(order_request()).await.unwrap();

    assert_eq!(ack.broker_order_id.as_str(), "ord-42");
    assert_eq!(ack.client_order_id, "req-1-0");
    assert_eq!(ack.status, AckStatus::Accepted);
    assert_eq!(ack.avg_fill_price, None);
}

#[tokio::test]
async fn order_rejection_reason_is_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 42210000,
            "message": "qty must be > 0"
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).submit_order(order_request()).await.unwrap_err();

    assert_eq!(
        err,
        BrokerError::OrderRejected {
            reason: "qty must be > 0".to_string()
        }
    );
}

#[tokio::test]
async fn order_post_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter(&server).submit_order(order_request()).await.unwrap_err();

    assert!(matches!(err, BrokerError::ConnectionError { .. }));
}
