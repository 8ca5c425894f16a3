//! Concrete implementations of the relay's external-boundary traits, wired
//! together in `main`. Grounded on the REST/WS client this crate is modeled
//! on: plain `reqwest` GETs with a status check before decoding, and a
//! `tokio-tungstenite` read loop that forwards parsed frames over a channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use relay_core::db::NotificationRepository;
use relay_core::interfaces::{Cursor, ExchangeAck, ExchangeOrder, StreamFrame, WalletStats};
use relay_core::types::{LeaderTrade, Notification, OutcomeIndex};
use relay_core::{Error, Exchange, MarketDataSource, Notifier, Result, StreamSource};

/// REST access to the upstream market/wallet data API.
pub struct HttpMarketDataSource {
    base_url: String,
    http: reqwest::Client,
}

impl HttpMarketDataSource {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().expect("failed to build http client");
        Self { base_url, http }
    }
}

#[derive(Debug, Deserialize)]
struct WalletStatsResponse {
    total_volume: Decimal,
    total_trades: u64,
    win_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TradeResponse {
    trade_id: String,
    market_id: String,
    outcome: String,
    side: String,
    price: Decimal,
    quantity: Decimal,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct RecentTradesResponse {
    trades: Vec<TradeResponse>,
    cursor: String,
}

#[async_trait]
impl MarketDataSource for HttpMarketDataSource {
    async fn wallet_stats(&self, address: &str) -> Result<WalletStats> {
        let url = format!("{}/wallets/{address}/stats", self.base_url);
        let response = self.http.get(&url).send().await.map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(Error::UpstreamUnavailable(format!("{} returned {}", url, response.status())));
        }
        if !response.status().is_success() {
            return Err(Error::UpstreamBadData(format!("{} returned {}", url, response.status())));
        }

        let body: WalletStatsResponse = response.json().await.map_err(|e| Error::UpstreamBadData(e.to_string()))?;
        Ok(WalletStats { total_volume: body.total_volume, total_trades: body.total_trades, win_rate: body.win_rate })
    }

    async fn recent_trades(&self, address: &str, since: Option<Cursor>) -> Result<(Vec<LeaderTrade>, Cursor)> {
        let mut url = format!("{}/wallets/{address}/trades", self.base_url);
        if let Some(cursor) = &since {
            url.push_str("?since=");
            url.push_str(&cursor.0);
        }

        let response = self.http.get(&url).send().await.map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;
        if response.status().is_server_error() {
            return Err(Error::UpstreamUnavailable(format!("{} returned {}", url, response.status())));
        }
        if !response.status().is_success() {
            return Err(Error::UpstreamBadData(format!("{} returned {}", url, response.status())));
        }

        let body: RecentTradesResponse = response.json().await.map_err(|e| Error::UpstreamBadData(e.to_string()))?;

        let mut trades = Vec::with_capacity(body.trades.len());
        for t in body.trades {
            trades.push(LeaderTrade {
                leader_trade_id: t.trade_id,
                leader_address: address.to_string(),
                market_id: t.market_id,
                outcome: parse_outcome(&t.outcome)?,
                side: parse_side(&t.side)?,
                price: t.price,
                quantity: t.quantity,
                notional: t.price * t.quantity,
                observed_at: t.timestamp,
            });
        }

        Ok((trades, Cursor(body.cursor)))
    }
}

fn parse_outcome(s: &str) -> Result<OutcomeIndex> {
    match s {
        "yes" => Ok(OutcomeIndex::Yes),
        "no" => Ok(OutcomeIndex::No),
        other => Err(Error::UpstreamBadData(format!("unknown outcome '{other}'"))),
    }
}

fn parse_side(s: &str) -> Result<relay_core::types::Side> {
    match s {
        "buy" => Ok(relay_core::types::Side::Buy),
        "sell" => Ok(relay_core::types::Side::Sell),
        other => Err(Error::UpstreamBadData(format!("unknown side '{other}'"))),
    }
}

/// Streaming subscription over the upstream's trade feed.
pub struct WsStreamSource {
    ws_url: String,
}

impl WsStreamSource {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    Trade { trade: TradeResponse, leader_address: String },
    Heartbeat,
}

#[async_trait]
impl StreamSource for WsStreamSource {
    async fn subscribe(&self, addresses: &[String]) -> Result<mpsc::Receiver<StreamFrame>> {
        let (ws_stream, _) = connect_async(&self.ws_url).await?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe_msg = serde_json::json!({ "type": "subscribe", "wallets": addresses });
        write.send(Message::Text(subscribe_msg.to_string())).await?;

        let (tx, rx) = mpsc::channel(256);
        let addresses: Vec<String> = addresses.to_vec();

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(err) => {
                        warn!(error = %err, "websocket read error");
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<WsMessage>(&text) {
                        Ok(WsMessage::Heartbeat) => {
                            if tx.send(StreamFrame::Heartbeat).await.is_err() {
                                break;
                            }
                        }
                        Ok(WsMessage::Trade { trade, leader_address }) => {
                            let frame = match (parse_outcome(&trade.outcome), parse_side(&trade.side)) {
                                (Ok(outcome), Ok(side)) => StreamFrame::Trade(LeaderTrade {
                                    leader_trade_id: trade.trade_id,
                                    leader_address,
                                    market_id: trade.market_id,
                                    outcome,
                                    side,
                                    price: trade.price,
                                    quantity: trade.quantity,
                                    notional: trade.price * trade.quantity,
                                    observed_at: trade.timestamp,
                                }),
                                _ => {
                                    debug!("dropped malformed trade frame");
                                    continue;
                                }
                            };
                            if tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => debug!(error = %err, "unparseable websocket frame"),
                    },
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Close(_) => {
                        info!(addresses = ?addresses, "websocket closed by upstream");
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(rx)
    }
}

/// REST order submission and price lookup against the exchange.
pub struct HttpExchange {
    base_url: String,
    http: reqwest::Client,
}

impl HttpExchange {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder().timeout(timeout).build().expect("failed to build http client");
        Self { base_url, http }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    order_ref: String,
    executed_price: Decimal,
    executed_shares: Decimal,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Decimal,
}

#[async_trait]
impl Exchange for HttpExchange {
    async fn submit(&self, order: ExchangeOrder) -> Result<ExchangeAck> {
        let url = format!("{}/orders", self.base_url);
        let body = serde_json::json!({
            "idempotency_key": order.idempotency_key,
            "follower_address": order.follower_address,
            "market_id": order.market_id,
            "outcome": match order.outcome { OutcomeIndex::Yes => "yes", OutcomeIndex::No => "no" },
            "side": match order.side { relay_core::types::Side::Buy => "buy", relay_core::types::Side::Sell => "sell" },
            "limit_price": order.limit_price,
            "shares": order.shares,
        });

        let response = self.http.post(&url).json(&body).send().await.map_err(|e| Error::ExchangeTransient(e.to_string()))?;

        if response.status().as_u16() == 429 || response.status().is_server_error() {
            return Err(Error::ExchangeTransient(format!("{} returned {}", url, response.status())));
        }
        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::ExchangeRejected(detail));
        }

        let body: SubmitResponse = response.json().await.map_err(|e| Error::ExchangeTransient(e.to_string()))?;
        Ok(ExchangeAck {
            exchange_order_ref: body.order_ref,
            executed_price: body.executed_price,
            executed_shares: body.executed_shares,
        })
    }

    async fn current_price(&self, market_id: &str, outcome: OutcomeIndex) -> Result<Decimal> {
        let outcome_str = match outcome {
            OutcomeIndex::Yes => "yes",
            OutcomeIndex::No => "no",
        };
        let url = format!("{}/markets/{market_id}/price?outcome={outcome_str}", self.base_url);

        let response = self.http.get(&url).send().await.map_err(|e| Error::ExchangeTransient(e.to_string()))?;
        if response.status().is_server_error() {
            return Err(Error::ExchangeTransient(format!("{} returned {}", url, response.status())));
        }
        if !response.status().is_success() {
            return Err(Error::ExchangeRejected(format!("{} returned {}", url, response.status())));
        }

        let body: PriceResponse = response.json().await.map_err(|e| Error::ExchangeTransient(e.to_string()))?;
        Ok(body.price)
    }
}

/// Persists notifications to the `notification` table (spec §6) and logs
/// them via `tracing`, matching the spec's preference for a persisted
/// follower-facing record over standing up a separate push service. Best
/// effort from the executor's point of view: a store failure here is logged
/// and swallowed rather than propagated, since a lost notification must
/// never block order submission or retry the already-terminal intent.
pub struct PgNotifier {
    repo: NotificationRepository,
}

impl PgNotifier {
    pub fn new(repo: NotificationRepository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            follower_address = %notification.follower_address,
            intent_id = %notification.intent_id,
            kind = ?notification.kind,
            "notification"
        );
        self.repo.insert(&notification).await
    }
}

/// Convenience constructor bundling the four REST/WS/DB adapters behind `Arc`s.
pub fn build_adapters(
    config: &relay_core::Config,
    notification_repo: NotificationRepository,
) -> (Arc<HttpMarketDataSource>, Arc<WsStreamSource>, Arc<HttpExchange>, Arc<PgNotifier>) {
    let http_timeout = Duration::from_secs(config.upstream.http_timeout_secs);
    let exchange_timeout = Duration::from_secs(config.upstream.exchange_timeout_secs);

    (
        Arc::new(HttpMarketDataSource::new(config.upstream.rest_base_url.clone(), http_timeout)),
        Arc::new(WsStreamSource::new(config.upstream.stream_url.clone())),
        Arc::new(HttpExchange::new(config.upstream.rest_base_url.clone(), exchange_timeout)),
        Arc::new(PgNotifier::new(notification_repo)),
    )
}
