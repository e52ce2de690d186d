/// Higher-level broker operations on top of the streaming client:
/// symbol catalog, spot subscriptions, paced candle history, order
/// placement with confirmation, and position reconciliation.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broker::client::{BrokerClient, BrokerEvent};
use crate::broker::codec::{decode_payload, encode_payload, trendbar_to_bar, PayloadType};
use crate::broker::messages::{
    AmendPositionSltpReq, ClosePositionReq, ExecutionEvent, GetTrendbarsReq, GetTrendbarsRes,
    NewOrderReq, ProtoPosition, ReconcileReq, ReconcileRes, SubscribeSpotsReq, SymbolsListReq,
    SymbolsListRes, TraderReq, TraderRes, UnsubscribeSpotsReq, EXECUTION_TYPE_ORDER_ACCEPTED,
    EXECUTION_TYPE_ORDER_FILLED, EXECUTION_TYPE_ORDER_REJECTED, ORDER_TYPE_LIMIT,
    ORDER_TYPE_MARKET, POSITION_STATUS_CLOSED, TRADE_SIDE_BUY, TRADE_SIDE_SELL,
};
use crate::error::{BotError, Result};
use crate::types::{
    AccountInfo, Bar, OrderRequest, OrderResult, OrderType, Position, PositionStatus, SymbolInfo,
    Tick, Timeframe, TradeDirection, VolumeSpecs,
};
use crate::utils::pip::{
    broker_volume_to_lots, distance_pips, lots_to_broker_volume, pip_size, price_from_wire,
};

/// Broker-mandated minimum spacing between catalog/history requests
const REQUEST_PACING: Duration = Duration::from_secs(1);
const ORDER_CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Enforces a minimum interval between consecutive requests on the same
/// broker connection
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        RequestPacer {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep until the minimum interval since the previous call elapsed
    pub async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        let now = Instant::now();
        if let Some(previous) = *last {
            let elapsed = now.duration_since(previous);
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    info: SymbolInfo,
    volume: Option<VolumeSpecs>,
}

#[derive(Default)]
struct SymbolCatalog {
    by_id: HashMap<i64, CatalogEntry>,
    by_name: HashMap<String, i64>,
}

pub struct BrokerAdapter {
    client: Arc<BrokerClient>,
    catalog: RwLock<SymbolCatalog>,
    subscriptions: RwLock<HashSet<i64>>,
    last_ticks: RwLock<HashMap<i64, Tick>>,
    positions: RwLock<Vec<Position>>,
    tick_tx: broadcast::Sender<Tick>,
    pacer: RequestPacer,
}

impl BrokerAdapter {
    /// Builds the adapter and spawns the event pump that routes broker
    /// events into the typed tick stream and position cache.
    pub fn new(client: Arc<BrokerClient>) -> Arc<Self> {
        let (tick_tx, _) = broadcast::channel(4096);
        let adapter = Arc::new(BrokerAdapter {
            client,
            catalog: RwLock::new(SymbolCatalog::default()),
            subscriptions: RwLock::new(HashSet::new()),
            last_ticks: RwLock::new(HashMap::new()),
            positions: RwLock::new(Vec::new()),
            tick_tx,
            pacer: RequestPacer::new(REQUEST_PACING),
        });

        let pump = Arc::clone(&adapter);
        tokio::spawn(async move {
            let mut events = pump.client.subscribe_events();
            loop {
                match events.recv().await {
                    Ok(BrokerEvent::Spot(spot)) => {
                        pump.handle_spot(spot.symbol_id, spot.bid, spot.ask, spot.timestamp)
                            .await;
                    }
                    Ok(BrokerEvent::Execution(exec)) => {
                        pump.handle_execution(&exec).await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Adapter event pump lagged, dropped {} events", missed);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Adapter event pump ended");
        });

        adapter
    }

    /// Typed spot stream, one `Tick` per routed spot event
    pub fn tick_stream(&self) -> broadcast::Receiver<Tick> {
        self.tick_tx.subscribe()
    }

    /// Raw broker event stream (trader updates, disconnects)
    pub fn client_events(&self) -> broadcast::Receiver<BrokerEvent> {
        self.client.subscribe_events()
    }

    pub async fn latest_tick(&self, symbol: &str) -> Option<Tick> {
        let id = {
            let catalog = self.catalog.read().await;
            catalog.by_name.get(symbol).copied()
        }?;
        let ticks = self.last_ticks.read().await;
        ticks.get(&id).cloned()
    }

    /// Resolve a symbol, populating the catalog on miss
    pub async fn resolve_symbol(&self, name: &str) -> Result<SymbolInfo> {
        self.ensure_catalog().await?;
        let catalog = self.catalog.read().await;
        catalog
            .by_name
            .get(name)
            .and_then(|id| catalog.by_id.get(id))
            .map(|entry| entry.info.clone())
            .ok_or_else(|| BotError::SymbolNotFound(name.to_string()))
    }

    pub async fn get_symbol_info(&self, name: &str) -> Result<(SymbolInfo, Option<VolumeSpecs>)> {
        self.ensure_catalog().await?;
        let catalog = self.catalog.read().await;
        catalog
            .by_name
            .get(name)
            .and_then(|id| catalog.by_id.get(id))
            .map(|entry| (entry.info.clone(), entry.volume))
            .ok_or_else(|| BotError::SymbolNotFound(name.to_string()))
    }

    /// Idempotent spot subscription
    pub async fn subscribe_price(&self, symbol: &str) -> Result<()> {
        let info = self.resolve_symbol(symbol).await?;

        {
            let subs = self.subscriptions.read().await;
            if subs.contains(&info.id) {
                return Ok(());
            }
        }

        let account_id = self.account_id().await?;
        let req = SubscribeSpotsReq {
            ctid_trader_account_id: account_id,
            symbol_id: vec![info.id],
        };
        self.client
            .request(PayloadType::SubscribeSpotsReq, encode_payload(&req))
            .await?;

        {
            let mut subs = self.subscriptions.write().await;
            subs.insert(info.id);
        }
        info!("📡 Subscribed to spots for {}", symbol);
        Ok(())
    }

    pub async fn unsubscribe_price(&self, symbol: &str) -> Result<()> {
        let info = self.resolve_symbol(symbol).await?;

        {
            let subs = self.subscriptions.read().await;
            if !subs.contains(&info.id) {
                return Ok(());
            }
        }

        let account_id = self.account_id().await?;
        let req = UnsubscribeSpotsReq {
            ctid_trader_account_id: account_id,
            symbol_id: vec![info.id],
        };
        self.client
            .request(PayloadType::UnsubscribeSpotsReq, encode_payload(&req))
            .await?;

        {
            let mut subs = self.subscriptions.write().await;
            subs.remove(&info.id);
        }
        info!("📡 Unsubscribed from spots for {}", symbol);
        Ok(())
    }

    pub async fn unsubscribe_all(&self) {
        let symbols: Vec<i64> = {
            let subs = self.subscriptions.read().await;
            subs.iter().copied().collect()
        };
        if symbols.is_empty() {
            return;
        }
        if let Ok(account_id) = self.account_id().await {
            let req = UnsubscribeSpotsReq {
                ctid_trader_account_id: account_id,
                symbol_id: symbols,
            };
            let _ = self
                .client
                .request(PayloadType::UnsubscribeSpotsReq, encode_payload(&req))
                .await;
        }
        let mut subs = self.subscriptions.write().await;
        subs.clear();
    }

    /// Fetch `count` recent bars. Broker frequency rejections are mapped
    /// to `BotError::RateLimit`; the caller owns the backoff policy.
    pub async fn get_candle_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: u32,
    ) -> Result<Vec<Bar>> {
        let info = self.resolve_symbol(symbol).await?;
        let account_id = self.account_id().await?;

        self.pacer.pace().await;

        let now_ms = Utc::now().timestamp_millis();
        let span_ms = (count as i64 + 5) * timeframe.duration_ms();
        let req = GetTrendbarsReq {
            ctid_trader_account_id: account_id,
            from_timestamp: now_ms - span_ms,
            to_timestamp: now_ms,
            period: timeframe.period_id(),
            symbol_id: info.id,
            count: Some(count),
        };

        let res = self
            .client
            .request(PayloadType::GetTrendbarsReq, encode_payload(&req))
            .await
            .map_err(classify_history_error)?;

        let body: GetTrendbarsRes = decode_payload(res.payload.as_deref().unwrap_or_default())?;
        let mut bars: Vec<Bar> = body.trendbar.iter().filter_map(trendbar_to_bar).collect();
        bars.sort_by_key(|b| b.timestamp_ms);

        debug!(
            "📥 {} {} bars for {} ({} requested)",
            bars.len(),
            timeframe.as_str(),
            symbol,
            count
        );
        Ok(bars)
    }

    /// Place an order and wait for the broker's confirmation. Every
    /// outcome leaves the caller able to reconcile.
    pub async fn place_order(&self, order: &OrderRequest, max_spread_pips: f64) -> Result<OrderResult> {
        let info = self.resolve_symbol(&order.symbol).await?;
        let account_id = self.account_id().await?;

        let tick = self.latest_tick(&order.symbol).await.ok_or_else(|| {
            BotError::InsufficientData(format!("no quote for {}", order.symbol))
        })?;

        let spread_pips = distance_pips(&order.symbol, tick.ask, tick.bid);
        if spread_pips > max_spread_pips {
            return Ok(OrderResult {
                success: false,
                error_message: Some(format!(
                    "spread {:.1} pips exceeds max {:.1}",
                    spread_pips, max_spread_pips
                )),
                ..Default::default()
            });
        }

        let entry_price = match order.direction {
            TradeDirection::Buy => tick.ask,
            TradeDirection::Sell => tick.bid,
        };
        let pip = pip_size(&order.symbol);
        let stop_loss = order.stop_loss_pips.map(|pips| match order.direction {
            TradeDirection::Buy => entry_price - pips * pip,
            TradeDirection::Sell => entry_price + pips * pip,
        });
        let take_profit = order.take_profit_pips.map(|pips| match order.direction {
            TradeDirection::Buy => entry_price + pips * pip,
            TradeDirection::Sell => entry_price - pips * pip,
        });

        let req = NewOrderReq {
            ctid_trader_account_id: account_id,
            symbol_id: info.id,
            order_type: match order.order_type {
                OrderType::Market => ORDER_TYPE_MARKET,
                OrderType::Limit => ORDER_TYPE_LIMIT,
            },
            trade_side: match order.direction {
                TradeDirection::Buy => TRADE_SIDE_BUY,
                TradeDirection::Sell => TRADE_SIDE_SELL,
            },
            volume: lots_to_broker_volume(order.lots),
            limit_price: None,
            stop_loss,
            take_profit,
            comment: Some(order.comment.clone()),
            label: None,
        };

        // Subscribe before writing so the confirmation cannot race past us
        let mut events = self.client.subscribe_events();
        self.client
            .send(PayloadType::NewOrderReq, encode_payload(&req))
            .await?;

        info!(
            "📤 Order sent: {} {} {:.2} lots @ ~{:.5}",
            order.direction.as_str(),
            order.symbol,
            order.lots,
            entry_price
        );

        let deadline = tokio::time::sleep(ORDER_CONFIRM_TIMEOUT);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    return Ok(OrderResult {
                        success: false,
                        error_message: Some("no broker confirmation within deadline".to_string()),
                        ..Default::default()
                    });
                }
                event = events.recv() => {
                    match event {
                        Ok(BrokerEvent::Execution(exec)) => {
                            if let Some(outcome) = match_execution(&exec, info.id) {
                                return Ok(outcome);
                            }
                        }
                        Ok(BrokerEvent::OrderError(err)) => {
                            return Ok(OrderResult {
                                success: false,
                                order_id: err.order_id,
                                error_message: Some(format!(
                                    "{}: {}",
                                    err.error_code,
                                    err.description.unwrap_or_default()
                                )),
                                ..Default::default()
                            });
                        }
                        Ok(BrokerEvent::Disconnected { reason }) => {
                            return Err(BotError::Disconnected(reason));
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(BotError::Disconnected("event stream closed".to_string()));
                        }
                    }
                }
            }
        }
    }

    /// Close an open position (fully or partially). Confirmation
    /// arrives as an execution event; the cache catches up on the next
    /// reconcile.
    pub async fn close_position(&self, position_id: i64, lots: f64) -> Result<()> {
        let account_id = self.account_id().await?;
        let req = ClosePositionReq {
            ctid_trader_account_id: account_id,
            position_id,
            volume: lots_to_broker_volume(lots),
        };
        self.client
            .send(PayloadType::ClosePositionReq, encode_payload(&req))
            .await?;
        info!("📤 Close requested for position {}", position_id);
        Ok(())
    }

    /// Amend stop loss / take profit on an open position
    pub async fn amend_position_sltp(
        &self,
        position_id: i64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<()> {
        let account_id = self.account_id().await?;
        let req = AmendPositionSltpReq {
            ctid_trader_account_id: account_id,
            position_id,
            stop_loss,
            take_profit,
        };
        self.client
            .send(PayloadType::AmendPositionSltpReq, encode_payload(&req))
            .await?;
        Ok(())
    }

    /// Cached view of open positions
    pub async fn get_open_positions(&self) -> Vec<Position> {
        let positions = self.positions.read().await;
        positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect()
    }

    /// Force a reconcile round-trip and refresh the cache
    pub async fn reconcile_positions(&self) -> Result<Vec<Position>> {
        let account_id = self.account_id().await?;
        let req = ReconcileReq {
            ctid_trader_account_id: account_id,
        };
        let res = self
            .client
            .request(PayloadType::ReconcileReq, encode_payload(&req))
            .await?;
        let body: ReconcileRes = decode_payload(res.payload.as_deref().unwrap_or_default())?;

        let catalog = self.catalog.read().await;
        let mapped: Vec<Position> = body
            .position
            .iter()
            .filter_map(|p| map_position(p, &catalog))
            .collect();
        drop(catalog);

        {
            let mut positions = self.positions.write().await;
            *positions = mapped.clone();
        }
        debug!("🔄 Reconciled {} positions", mapped.len());
        Ok(mapped)
    }

    pub async fn get_account_info(&self) -> Result<AccountInfo> {
        let account_id = self.account_id().await?;
        let req = TraderReq {
            ctid_trader_account_id: account_id,
        };
        let res = self
            .client
            .request(PayloadType::TraderReq, encode_payload(&req))
            .await?;
        let body: TraderRes = decode_payload(res.payload.as_deref().unwrap_or_default())?;
        let trader = body
            .trader
            .ok_or_else(|| BotError::Codec("trader response without trader".to_string()))?;

        let scale = 10f64.powi(trader.money_digits.unwrap_or(2) as i32);
        let balance = trader.balance as f64 / scale;
        let equity = trader.equity.map(|e| e as f64 / scale).unwrap_or(balance);
        Ok(AccountInfo { balance, equity })
    }

    // ---- internals ----

    async fn account_id(&self) -> Result<i64> {
        self.client
            .account_id()
            .await
            .ok_or_else(|| BotError::Auth("not authenticated".to_string()))
    }

    async fn ensure_catalog(&self) -> Result<()> {
        {
            let catalog = self.catalog.read().await;
            if !catalog.by_id.is_empty() {
                return Ok(());
            }
        }

        let account_id = self.account_id().await?;
        self.pacer.pace().await;

        let req = SymbolsListReq {
            ctid_trader_account_id: account_id,
        };
        let res = self
            .client
            .request(PayloadType::SymbolsListReq, encode_payload(&req))
            .await?;
        let body: SymbolsListRes = decode_payload(res.payload.as_deref().unwrap_or_default())?;

        let mut catalog = self.catalog.write().await;
        for symbol in &body.symbol {
            let Some(name) = symbol.symbol_name.clone() else {
                continue;
            };
            let entry = CatalogEntry {
                info: SymbolInfo {
                    id: symbol.symbol_id,
                    name: name.clone(),
                    digits: symbol.digits.unwrap_or(5),
                    pip_position: symbol.pip_position.unwrap_or(4),
                    base_asset_id: symbol.base_asset_id.unwrap_or(0),
                    quote_asset_id: symbol.quote_asset_id.unwrap_or(0),
                },
                volume: match (symbol.min_volume, symbol.max_volume, symbol.step_volume) {
                    (Some(min), Some(max), Some(step)) => Some(VolumeSpecs {
                        min_volume: broker_volume_to_lots(min),
                        max_volume: broker_volume_to_lots(max),
                        step_volume: broker_volume_to_lots(step),
                    }),
                    _ => None,
                },
            };
            catalog.by_name.insert(name, symbol.symbol_id);
            catalog.by_id.insert(symbol.symbol_id, entry);
        }
        info!("📚 Symbol catalog loaded: {} symbols", catalog.by_id.len());
        Ok(())
    }

    async fn handle_spot(
        &self,
        symbol_id: i64,
        bid: Option<u64>,
        ask: Option<u64>,
        timestamp: Option<i64>,
    ) {
        let name = {
            let catalog = self.catalog.read().await;
            match catalog.by_id.get(&symbol_id) {
                Some(entry) => entry.info.name.clone(),
                None => return,
            }
        };

        let mut ticks = self.last_ticks.write().await;
        let previous = ticks.get(&symbol_id);

        // Partial updates carry only one side; merge with the last quote
        let bid_price = bid
            .map(|raw| price_from_wire(raw as i64))
            .or_else(|| previous.map(|t| t.bid));
        let ask_price = ask
            .map(|raw| price_from_wire(raw as i64))
            .or_else(|| previous.map(|t| t.ask));
        let (Some(bid_price), Some(ask_price)) = (bid_price, ask_price) else {
            return;
        };

        let tick = Tick {
            symbol_id,
            symbol: name,
            bid: bid_price,
            ask: ask_price,
            timestamp_ms: timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        };
        ticks.insert(symbol_id, tick.clone());
        drop(ticks);

        let _ = self.tick_tx.send(tick);
    }

    async fn handle_execution(&self, exec: &ExecutionEvent) {
        let Some(proto) = &exec.position else { return };
        let catalog = self.catalog.read().await;
        let Some(position) = map_position(proto, &catalog) else {
            return;
        };
        drop(catalog);

        let mut positions = self.positions.write().await;
        positions.retain(|p| p.position_id != position.position_id);
        if position.status == PositionStatus::Open {
            positions.push(position);
        }
    }
}

/// Interpret an execution event as a terminal order outcome for the
/// given symbol, or None when it belongs to something else.
fn match_execution(exec: &ExecutionEvent, symbol_id: i64) -> Option<OrderResult> {
    let event_symbol = exec
        .position
        .as_ref()
        .and_then(|p| p.trade_data.as_ref())
        .map(|td| td.symbol_id)
        .or_else(|| {
            exec.order
                .as_ref()
                .and_then(|o| o.trade_data.as_ref())
                .map(|td| td.symbol_id)
        })?;
    if event_symbol != symbol_id {
        return None;
    }

    match exec.execution_type {
        t if t == EXECUTION_TYPE_ORDER_FILLED || t == EXECUTION_TYPE_ORDER_ACCEPTED => {
            let execution_price = exec
                .position
                .as_ref()
                .and_then(|p| p.price)
                .or_else(|| exec.order.as_ref().and_then(|o| o.execution_price));
            Some(OrderResult {
                success: true,
                order_id: exec.order.as_ref().map(|o| o.order_id),
                position_id: exec.position.as_ref().map(|p| p.position_id),
                execution_price,
                error_message: None,
                safety_latch_triggered: false,
            })
        }
        t if t == EXECUTION_TYPE_ORDER_REJECTED => Some(OrderResult {
            success: false,
            order_id: exec.order.as_ref().map(|o| o.order_id),
            error_message: Some(
                exec.error_code
                    .clone()
                    .unwrap_or_else(|| "ORDER_REJECTED".to_string()),
            ),
            ..Default::default()
        }),
        _ => None,
    }
}

fn map_position(proto: &ProtoPosition, catalog: &SymbolCatalog) -> Option<Position> {
    let trade_data = proto.trade_data.as_ref()?;
    let entry = catalog.by_id.get(&trade_data.symbol_id)?;

    Some(Position {
        position_id: proto.position_id,
        symbol: entry.info.name.clone(),
        direction: if trade_data.trade_side == TRADE_SIDE_SELL {
            TradeDirection::Sell
        } else {
            TradeDirection::Buy
        },
        volume_lots: broker_volume_to_lots(trade_data.volume),
        entry_price: proto.price.unwrap_or(0.0),
        stop_loss: proto.stop_loss,
        take_profit: proto.take_profit,
        opened_at_ms: trade_data.open_timestamp.unwrap_or(0),
        status: if proto.position_status == Some(POSITION_STATUS_CLOSED) {
            PositionStatus::Closed
        } else {
            PositionStatus::Open
        },
    })
}

/// History fetch failures that look like frequency rejections become
/// `RateLimit` so the refresh loop can back off and retry.
fn classify_history_error(e: BotError) -> BotError {
    if let BotError::Broker { code, description } = &e {
        let text = format!("{} {}", code, description);
        if BotError::is_rate_limit_text(&text) {
            return BotError::RateLimit(text);
        }
    }
    e
}
