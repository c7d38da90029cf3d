//! Simulated venue.
//!
//! An in-process broker with a cash balance, long-only holdings and
//! random-walk quotes. Marketable orders fill immediately at the current
//! price; resting orders are acknowledged and never fill. Used as the
//! default broker in PAPER mode without credentials, and in tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;

use crate::application::ports::{AckStatus, BrokerError, BrokerPort, OrderAck, SubmitOrderRequest};
use crate::domain::execution::{OrderSide, OrderType, Venue};
use crate::domain::market::{Account, Position, PositionSide, Quote};
use crate::domain::shared::{BrokerOrderId, Symbol, Timestamp};

/// Simulated venue settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedBrokerConfig {
    /// Venue the simulator reports.
    pub venue: Venue,
    /// Opening cash balance.
    pub starting_cash: Decimal,
    /// Artificial delay applied to every call.
    pub latency: Duration,
    /// First price for a symbol the simulator has not seen.
    pub default_price: Decimal,
    /// Maximum move per quote request, in basis points.
    pub volatility_bps: u32,
    /// Symbols whose orders are always rejected.
    pub reject_symbols: Vec<Symbol>,
}

impl Default for SimulatedBrokerConfig {
    fn default() -> Self {
        Self {
            venue: Venue::Paper,
            starting_cash: Decimal::new(100_000, 0),
            latency: Duration::ZERO,
            default_price: Decimal::new(100, 0),
            volatility_bps: 5,
            reject_symbols: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    quantity: Decimal,
    avg_entry_price: Decimal,
}

#[derive(Debug, Default)]
struct Book {
    cash: Decimal,
    holdings: BTreeMap<Symbol, Holding>,
    prices: HashMap<Symbol, Decimal>,
    client_order_ids: HashSet<String>,
}

impl Book {
    fn price(&mut self, symbol: &Symbol, default_price: Decimal) -> Decimal {
        *self.prices.entry(symbol.clone()).or_insert(default_price)
    }
}

/// In-process [`BrokerPort`] implementation.
#[derive(Debug)]
pub struct SimulatedBroker {
    config: SimulatedBrokerConfig,
    book: Mutex<Book>,
    failing: AtomicBool,
    orders_received: AtomicU64,
    next_order_id: AtomicU64,
}

impl Default for SimulatedBroker {
    fn default() -> Self {
        Self::new(SimulatedBrokerConfig::default())
    }
}

impl SimulatedBroker {
    /// Create a simulator with no holdings.
    #[must_use]
    pub fn new(config: SimulatedBrokerConfig) -> Self {
        let book = Book {
            cash: config.starting_cash,
            ..Book::default()
        };

        Self {
            config,
            book: Mutex::new(book),
            failing: AtomicBool::new(false),
            orders_received: AtomicU64::new(0),
            next_order_id: AtomicU64::new(1),
        }
    }

    /// Seed a long holding, also setting the symbol's current price.
    #[must_use]
    pub fn with_position(self, symbol: Symbol, quantity: Decimal, price: Decimal) -> Self {
        {
            let mut book = self.book.lock();
            book.prices.insert(symbol.clone(), price);
            book.holdings.insert(
                symbol,
                Holding {
                    quantity,
                    avg_entry_price: price,
                },
            );
        }
        self
    }

    /// Set the current price of `symbol`.
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) {
        self.book.lock().prices.insert(symbol.clone(), price);
    }

    /// While set, every call fails with a connection error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Orders received, including rejected ones.
    #[must_use]
    pub fn order_count(&self) -> u64 {
        self.orders_received.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) -> Result<(), BrokerError> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectionError {
                message: "simulated venue unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn random_walk(&self, price: Decimal) -> Decimal {
        if self.config.volatility_bps == 0 {
            return price;
        }

        let bps = i64::from(self.config.volatility_bps);
        let step = rand::rng().random_range(-bps..=bps);
        let moved = price * (Decimal::ONE + Decimal::new(step, 4));
        moved.round_dp(2).max(Decimal::new(1, 2))
    }

    fn fill(
        book: &mut Book,
        request: &SubmitOrderRequest,
        price: Decimal,
    ) -> Result<(), BrokerError> {
        match request.side {
            OrderSide::Buy => {
                let cost = request.quantity * price;
                if cost > book.cash {
                    return Err(BrokerError::OrderRejected {
                        reason: "insufficient buying power".to_string(),
                    });
                }
                book.cash -= cost;

                let holding = book.holdings.entry(request.symbol.clone()).or_insert(Holding {
                    quantity: Decimal::ZERO,
                    avg_entry_price: price,
                });
                let total = holding.quantity + request.quantity;
                holding.avg_entry_price =
                    (holding.avg_entry_price * holding.quantity + cost) / total;
                holding.quantity = total;
            }
            OrderSide::Sell => {
                let available = book
                    .holdings
                    .get(&request.symbol)
                    .map_or(Decimal::ZERO, |h| h.quantity);
                if available < request.quantity {
                    return Err(BrokerError::OrderRejected {
                        reason: format!(
                            "insufficient qty available for order (requested: {}, available: {available})",
                            request.quantity
                        ),
                    });
                }
                book.cash += request.quantity * price;

                if available == request.quantity {
                    book.holdings.remove(&request.symbol);
                } else if let Some(holding) = book.holdings.get_mut(&request.symbol) {
                    holding.quantity -= request.quantity;
                }
            }
        }
        Ok(())
    }
}

fn is_marketable(request: &SubmitOrderRequest, price: Decimal) -> bool {
    match request.order_type {
        OrderType::Market => true,
        OrderType::Limit => match (request.side, request.limit_price) {
            (OrderSide::Buy, Some(limit)) => limit >= price,
            (OrderSide::Sell, Some(limit)) => limit <= price,
            (_, None) => false,
        },
        OrderType::Stop | OrderType::StopLimit => false,
    }
}

#[async_trait]
impl BrokerPort for SimulatedBroker {
    fn venue(&self) -> Venue {
        self.config.venue
    }

    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn get_account(&self) -> Result<Account, BrokerError> {
        self.simulate_call().await?;
        let book = self.book.lock();

        let holdings_value: Decimal = book
            .holdings
            .iter()
            .map(|(symbol, h)| {
                h.quantity * book.prices.get(symbol).copied().unwrap_or(h.avg_entry_price)
            })
            .sum();
        let equity = book.cash + holdings_value;

        Ok(Account {
            account_id: "SIMULATED".to_string(),
            status: "ACTIVE".to_string(),
            currency: "USD".to_string(),
            equity,
            cash: book.cash,
            buying_power: book.cash,
            portfolio_value: equity,
            daytrade_count: 0,
            pattern_day_trader: false,
        })
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.simulate_call().await?;
        let book = self.book.lock();

        Ok(book
            .holdings
            .iter()
            .map(|(symbol, h)| {
                let current_price = book.prices.get(symbol).copied().unwrap_or(h.avg_entry_price);
                Position {
                    symbol: symbol.clone(),
                    quantity: h.quantity,
                    side: PositionSide::Long,
                    avg_entry_price: h.avg_entry_price,
                    market_value: h.quantity * current_price,
                    current_price,
                    unrealized_pl: h.quantity * (current_price - h.avg_entry_price),
                }
            })
            .collect())
    }

    async fn get_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, BrokerError> {
        self.simulate_call().await?;
        let mut book = self.book.lock();
        let half_spread = Decimal::new(1, 2);
        let quoted_at = Timestamp::now();

        Ok(symbols
            .iter()
            .filter(|s| s.validate().is_ok())
            .map(|symbol| {
                let current = book.price(symbol, self.config.default_price);
                let price = self.random_walk(current);
                book.prices.insert(symbol.clone(), price);

                Quote {
                    symbol: symbol.clone(),
                    bid: price - half_spread,
                    ask: price + half_spread,
                    bid_size: Decimal::ONE_HUNDRED,
                    ask_size: Decimal::ONE_HUNDRED,
                    quoted_at,
                }
            })
            .collect())
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<OrderAck, BrokerError> {
        self.orders_received.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;

        if self.config.reject_symbols.contains(&request.symbol) {
            return Err(BrokerError::OrderRejected {
                reason: format!("asset {} is not tradable", request.symbol),
            });
        }

        let mut book = self.book.lock();
        if !book.client_order_ids.insert(request.client_order_id.clone()) {
            return Err(BrokerError::OrderRejected {
                reason: "client_order_id must be unique".to_string(),
            });
        }

        let price = book.price(&request.symbol, self.config.default_price);
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let broker_order_id = BrokerOrderId::new(format!("sim-{order_id:08}"));

        if !is_marketable(&request, price) {
            tracing::debug!(client_order_id = %request.client_order_id, "Simulated order resting");
            return Ok(OrderAck {
                broker_order_id,
                client_order_id: request.client_order_id,
                status: AckStatus::Accepted,
                filled_qty: Decimal::ZERO,
                avg_fill_price: None,
            });
        }

        Self::fill(&mut book, &request, price)?;
        tracing::debug!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            qty = %request.quantity,
            price = %price,
            "Simulated fill"
        );

        Ok(OrderAck {
            broker_order_id,
            client_order_id: request.client_order_id,
            status: AckStatus::Filled,
            filled_qty: request.quantity,
            avg_fill_price: Some(price),
        })
    }
}
