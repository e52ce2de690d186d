/// cTrader Open API payload messages, hand-written prost structs.
///
/// The authoritative shape on the wire is the envelope
/// `{payload_type, payload: bytes, client_msg_id}`; each payload below
/// is the protobuf body carried inside it.

/// Transport envelope, one per WebSocket binary frame
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoMessage {
    #[prost(uint32, tag = "1")]
    pub payload_type: u32,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub payload: Option<Vec<u8>>,
    #[prost(string, optional, tag = "3")]
    pub client_msg_id: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoErrorRes {
    #[prost(string, tag = "1")]
    pub error_code: String,
    #[prost(string, optional, tag = "2")]
    pub description: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoHeartbeatEvent {}

// ---- Authentication ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplicationAuthReq {
    #[prost(string, tag = "1")]
    pub client_id: String,
    #[prost(string, tag = "2")]
    pub client_secret: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ApplicationAuthRes {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAccountsByTokenReq {
    #[prost(string, tag = "1")]
    pub access_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CtidAccount {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(bool, optional, tag = "2")]
    pub is_live: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAccountsByTokenRes {
    #[prost(message, repeated, tag = "1")]
    pub accounts: Vec<CtidAccount>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountAuthReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(string, tag = "2")]
    pub access_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountAuthRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

// ---- Symbol catalog ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SymbolsListReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LightSymbol {
    #[prost(int64, tag = "1")]
    pub symbol_id: i64,
    #[prost(string, optional, tag = "2")]
    pub symbol_name: Option<String>,
    #[prost(uint32, optional, tag = "3")]
    pub digits: Option<u32>,
    #[prost(int32, optional, tag = "4")]
    pub pip_position: Option<i32>,
    #[prost(int64, optional, tag = "5")]
    pub base_asset_id: Option<i64>,
    #[prost(int64, optional, tag = "6")]
    pub quote_asset_id: Option<i64>,
    /// Volume constraints, broker units (hundredths of a lot)
    #[prost(int64, optional, tag = "7")]
    pub min_volume: Option<i64>,
    #[prost(int64, optional, tag = "8")]
    pub max_volume: Option<i64>,
    #[prost(int64, optional, tag = "9")]
    pub step_volume: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SymbolsListRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(message, repeated, tag = "2")]
    pub symbol: Vec<LightSymbol>,
}

// ---- Spot subscriptions ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeSpotsReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, repeated, tag = "2")]
    pub symbol_id: Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeSpotsRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnsubscribeSpotsReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, repeated, tag = "2")]
    pub symbol_id: Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnsubscribeSpotsRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

/// Bid/ask in wire price units (price x 100000)
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpotEvent {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, tag = "2")]
    pub symbol_id: i64,
    #[prost(uint64, optional, tag = "3")]
    pub bid: Option<u64>,
    #[prost(uint64, optional, tag = "4")]
    pub ask: Option<u64>,
    #[prost(int64, optional, tag = "5")]
    pub timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeLiveTrendbarReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int32, tag = "2")]
    pub period: i32,
    #[prost(int64, tag = "3")]
    pub symbol_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscribeLiveTrendbarRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

// ---- Candle history ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTrendbarsReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, tag = "2")]
    pub from_timestamp: i64,
    #[prost(int64, tag = "3")]
    pub to_timestamp: i64,
    #[prost(int32, tag = "4")]
    pub period: i32,
    #[prost(int64, tag = "5")]
    pub symbol_id: i64,
    #[prost(uint32, optional, tag = "6")]
    pub count: Option<u32>,
}

/// Delta-coded bar: `low` absolute, open/high/close as deltas from low,
/// timestamp in whole UTC minutes
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Trendbar {
    #[prost(int64, tag = "1")]
    pub volume: i64,
    #[prost(int32, optional, tag = "2")]
    pub period: Option<i32>,
    #[prost(int64, optional, tag = "3")]
    pub low: Option<i64>,
    #[prost(uint64, optional, tag = "4")]
    pub delta_open: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub delta_close: Option<u64>,
    #[prost(uint64, optional, tag = "6")]
    pub delta_high: Option<u64>,
    #[prost(uint32, optional, tag = "7")]
    pub utc_timestamp_in_minutes: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetTrendbarsRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int32, optional, tag = "2")]
    pub period: Option<i32>,
    #[prost(int64, optional, tag = "3")]
    pub symbol_id: Option<i64>,
    #[prost(message, repeated, tag = "4")]
    pub trendbar: Vec<Trendbar>,
}

// ---- Account ----

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraderReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

/// Balance/equity are integers scaled by 10^money_digits
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoTrader {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, tag = "2")]
    pub balance: i64,
    #[prost(int64, optional, tag = "3")]
    pub equity: Option<i64>,
    #[prost(uint32, optional, tag = "4")]
    pub money_digits: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraderRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(message, optional, tag = "2")]
    pub trader: Option<ProtoTrader>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TraderUpdateEvent {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(message, optional, tag = "2")]
    pub trader: Option<ProtoTrader>,
}

// ---- Orders & positions ----

pub const TRADE_SIDE_BUY: i32 = 1;
pub const TRADE_SIDE_SELL: i32 = 2;

pub const ORDER_TYPE_MARKET: i32 = 1;
pub const ORDER_TYPE_LIMIT: i32 = 2;

pub const POSITION_STATUS_OPEN: i32 = 1;
pub const POSITION_STATUS_CLOSED: i32 = 2;

pub const EXECUTION_TYPE_ORDER_ACCEPTED: i32 = 2;
pub const EXECUTION_TYPE_ORDER_FILLED: i32 = 3;
pub const EXECUTION_TYPE_ORDER_REJECTED: i32 = 7;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NewOrderReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, tag = "2")]
    pub symbol_id: i64,
    #[prost(int32, tag = "3")]
    pub order_type: i32,
    #[prost(int32, tag = "4")]
    pub trade_side: i32,
    /// Broker volume units (hundredths of a lot)
    #[prost(int64, tag = "5")]
    pub volume: i64,
    #[prost(double, optional, tag = "6")]
    pub limit_price: Option<f64>,
    #[prost(double, optional, tag = "7")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "8")]
    pub take_profit: Option<f64>,
    #[prost(string, optional, tag = "9")]
    pub comment: Option<String>,
    #[prost(string, optional, tag = "10")]
    pub label: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoTradeData {
    #[prost(int64, tag = "1")]
    pub symbol_id: i64,
    #[prost(int64, tag = "2")]
    pub volume: i64,
    #[prost(int32, tag = "3")]
    pub trade_side: i32,
    #[prost(int64, optional, tag = "4")]
    pub open_timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoOrder {
    #[prost(int64, tag = "1")]
    pub order_id: i64,
    #[prost(message, optional, tag = "2")]
    pub trade_data: Option<ProtoTradeData>,
    #[prost(int32, optional, tag = "3")]
    pub order_type: Option<i32>,
    #[prost(double, optional, tag = "4")]
    pub execution_price: Option<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoPosition {
    #[prost(int64, tag = "1")]
    pub position_id: i64,
    #[prost(message, optional, tag = "2")]
    pub trade_data: Option<ProtoTradeData>,
    #[prost(int32, optional, tag = "3")]
    pub position_status: Option<i32>,
    #[prost(double, optional, tag = "4")]
    pub price: Option<f64>,
    #[prost(double, optional, tag = "5")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "6")]
    pub take_profit: Option<f64>,
    #[prost(int64, optional, tag = "7")]
    pub utc_last_update_timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecutionEvent {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int32, tag = "2")]
    pub execution_type: i32,
    #[prost(message, optional, tag = "3")]
    pub position: Option<ProtoPosition>,
    #[prost(message, optional, tag = "4")]
    pub order: Option<ProtoOrder>,
    #[prost(string, optional, tag = "5")]
    pub error_code: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OrderErrorEvent {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(string, tag = "2")]
    pub error_code: String,
    #[prost(int64, optional, tag = "3")]
    pub order_id: Option<i64>,
    #[prost(string, optional, tag = "4")]
    pub description: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClosePositionReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, tag = "2")]
    pub position_id: i64,
    #[prost(int64, tag = "3")]
    pub volume: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AmendPositionSltpReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(int64, tag = "2")]
    pub position_id: i64,
    #[prost(double, optional, tag = "3")]
    pub stop_loss: Option<f64>,
    #[prost(double, optional, tag = "4")]
    pub take_profit: Option<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReconcileReq {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReconcileRes {
    #[prost(int64, tag = "1")]
    pub ctid_trader_account_id: i64,
    #[prost(message, repeated, tag = "2")]
    pub position: Vec<ProtoPosition>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientDisconnectEvent {
    #[prost(string, optional, tag = "1")]
    pub reason: Option<String>,
}
