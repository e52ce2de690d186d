/// Envelope codec and payload-type registry for the cTrader wire protocol
use prost::Message;

use crate::broker::messages::{ProtoErrorRes, ProtoMessage, Trendbar};
use crate::error::{BotError, Result};
use crate::types::Bar;
use crate::utils::pip::price_from_wire;

/// Every payload type the engine speaks. The numeric ids are part of the
/// broker contract and must not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PayloadType {
    HeartbeatEvent = 51,
    ApplicationAuthReq = 2100,
    ApplicationAuthRes = 2101,
    AccountAuthReq = 2102,
    AccountAuthRes = 2103,
    NewOrderReq = 2106,
    AmendPositionSltpReq = 2110,
    ClosePositionReq = 2111,
    SymbolsListReq = 2114,
    SymbolsListRes = 2115,
    TraderReq = 2121,
    TraderRes = 2122,
    TraderUpdateEvent = 2123,
    ReconcileReq = 2124,
    ReconcileRes = 2125,
    ExecutionEvent = 2126,
    SubscribeSpotsReq = 2127,
    SubscribeSpotsRes = 2128,
    UnsubscribeSpotsReq = 2129,
    UnsubscribeSpotsRes = 2130,
    SpotEvent = 2131,
    OrderErrorEvent = 2132,
    SubscribeLiveTrendbarReq = 2135,
    GetTrendbarsReq = 2137,
    GetTrendbarsRes = 2138,
    ErrorRes = 2142,
    ClientDisconnectEvent = 2148,
    GetAccountsByTokenReq = 2149,
    GetAccountsByTokenRes = 2150,
    SubscribeLiveTrendbarRes = 2165,
}

impl PayloadType {
    pub fn id(&self) -> u32 {
        *self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        use PayloadType::*;
        let pt = match id {
            51 => HeartbeatEvent,
            2100 => ApplicationAuthReq,
            2101 => ApplicationAuthRes,
            2102 => AccountAuthReq,
            2103 => AccountAuthRes,
            2106 => NewOrderReq,
            2110 => AmendPositionSltpReq,
            2111 => ClosePositionReq,
            2114 => SymbolsListReq,
            2115 => SymbolsListRes,
            2121 => TraderReq,
            2122 => TraderRes,
            2123 => TraderUpdateEvent,
            2124 => ReconcileReq,
            2125 => ReconcileRes,
            2126 => ExecutionEvent,
            2127 => SubscribeSpotsReq,
            2128 => SubscribeSpotsRes,
            2129 => UnsubscribeSpotsReq,
            2130 => UnsubscribeSpotsRes,
            2131 => SpotEvent,
            2132 => OrderErrorEvent,
            2135 => SubscribeLiveTrendbarReq,
            2137 => GetTrendbarsReq,
            2138 => GetTrendbarsRes,
            2142 => ErrorRes,
            2148 => ClientDisconnectEvent,
            2149 => GetAccountsByTokenReq,
            2150 => GetAccountsByTokenRes,
            2165 => SubscribeLiveTrendbarRes,
            _ => return None,
        };
        Some(pt)
    }

    /// The response type a request waits for; None for fire-and-forget
    pub fn response_type(&self) -> Option<PayloadType> {
        use PayloadType::*;
        match self {
            ApplicationAuthReq => Some(ApplicationAuthRes),
            AccountAuthReq => Some(AccountAuthRes),
            GetAccountsByTokenReq => Some(GetAccountsByTokenRes),
            SymbolsListReq => Some(SymbolsListRes),
            SubscribeSpotsReq => Some(SubscribeSpotsRes),
            UnsubscribeSpotsReq => Some(UnsubscribeSpotsRes),
            SubscribeLiveTrendbarReq => Some(SubscribeLiveTrendbarRes),
            GetTrendbarsReq => Some(GetTrendbarsRes),
            TraderReq => Some(TraderRes),
            ReconcileReq => Some(ReconcileRes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        use PayloadType::*;
        match self {
            HeartbeatEvent => "HEARTBEAT_EVENT",
            ApplicationAuthReq => "APPLICATION_AUTH_REQ",
            ApplicationAuthRes => "APPLICATION_AUTH_RES",
            AccountAuthReq => "ACCOUNT_AUTH_REQ",
            AccountAuthRes => "ACCOUNT_AUTH_RES",
            NewOrderReq => "NEW_ORDER_REQ",
            AmendPositionSltpReq => "AMEND_POSITION_SLTP_REQ",
            ClosePositionReq => "CLOSE_POSITION_REQ",
            SymbolsListReq => "SYMBOLS_LIST_REQ",
            SymbolsListRes => "SYMBOLS_LIST_RES",
            TraderReq => "TRADER_REQ",
            TraderRes => "TRADER_RES",
            TraderUpdateEvent => "TRADER_UPDATE_EVENT",
            ReconcileReq => "RECONCILE_REQ",
            ReconcileRes => "RECONCILE_RES",
            ExecutionEvent => "EXECUTION_EVENT",
            SubscribeSpotsReq => "SUBSCRIBE_SPOTS_REQ",
            SubscribeSpotsRes => "SUBSCRIBE_SPOTS_RES",
            UnsubscribeSpotsReq => "UNSUBSCRIBE_SPOTS_REQ",
            UnsubscribeSpotsRes => "UNSUBSCRIBE_SPOTS_RES",
            SpotEvent => "SPOT_EVENT",
            OrderErrorEvent => "ORDER_ERROR_EVENT",
            SubscribeLiveTrendbarReq => "SUBSCRIBE_LIVE_TRENDBAR_REQ",
            GetTrendbarsReq => "GET_TRENDBARS_REQ",
            GetTrendbarsRes => "GET_TRENDBARS_RES",
            ErrorRes => "ERROR_RES",
            ClientDisconnectEvent => "CLIENT_DISCONNECT_EVENT",
            GetAccountsByTokenReq => "GET_ACCOUNTS_BY_TOKEN_REQ",
            GetAccountsByTokenRes => "GET_ACCOUNTS_BY_TOKEN_RES",
            SubscribeLiveTrendbarRes => "SUBSCRIBE_LIVE_TRENDBAR_RES",
        }
    }
}

/// All ids the registry knows, for round-trip checks
pub const ALL_PAYLOAD_TYPES: &[PayloadType] = &[
    PayloadType::HeartbeatEvent,
    PayloadType::ApplicationAuthReq,
    PayloadType::ApplicationAuthRes,
    PayloadType::AccountAuthReq,
    PayloadType::AccountAuthRes,
    PayloadType::NewOrderReq,
    PayloadType::AmendPositionSltpReq,
    PayloadType::ClosePositionReq,
    PayloadType::SymbolsListReq,
    PayloadType::SymbolsListRes,
    PayloadType::TraderReq,
    PayloadType::TraderRes,
    PayloadType::TraderUpdateEvent,
    PayloadType::ReconcileReq,
    PayloadType::ReconcileRes,
    PayloadType::ExecutionEvent,
    PayloadType::SubscribeSpotsReq,
    PayloadType::SubscribeSpotsRes,
    PayloadType::UnsubscribeSpotsReq,
    PayloadType::UnsubscribeSpotsRes,
    PayloadType::SpotEvent,
    PayloadType::OrderErrorEvent,
    PayloadType::SubscribeLiveTrendbarReq,
    PayloadType::GetTrendbarsReq,
    PayloadType::GetTrendbarsRes,
    PayloadType::ErrorRes,
    PayloadType::ClientDisconnectEvent,
    PayloadType::GetAccountsByTokenReq,
    PayloadType::GetAccountsByTokenRes,
    PayloadType::SubscribeLiveTrendbarRes,
];

/// Encode an envelope ready for a binary WS frame
pub fn encode_envelope(
    payload_type: PayloadType,
    payload: Vec<u8>,
    client_msg_id: Option<String>,
) -> Vec<u8> {
    let envelope = ProtoMessage {
        payload_type: payload_type.id(),
        payload: Some(payload),
        client_msg_id,
    };
    envelope.encode_to_vec()
}

/// Decode a binary WS frame into an envelope
pub fn decode_envelope(frame: &[u8]) -> Result<ProtoMessage> {
    ProtoMessage::decode(frame).map_err(|e| BotError::Codec(format!("bad envelope: {}", e)))
}

/// Encode any payload message body
pub fn encode_payload<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Decode a payload body into a concrete message
pub fn decode_payload<M: Message + Default>(bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|e| BotError::Codec(format!("bad payload: {}", e)))
}

/// Decode the distinguished error-response payload
pub fn decode_error_res(bytes: &[u8]) -> (String, String) {
    match ProtoErrorRes::decode(bytes) {
        Ok(err) => {
            let description = err.description.unwrap_or_default();
            (err.error_code, description)
        }
        Err(_) => ("UNKNOWN".to_string(), "undecodable error response".to_string()),
    }
}

/// Expand a delta-coded trendbar into an absolute-price bar.
/// Returns None when the mandatory fields are missing.
pub fn trendbar_to_bar(tb: &Trendbar) -> Option<Bar> {
    let low_raw = tb.low?;
    let minutes = tb.utc_timestamp_in_minutes?;

    let low = price_from_wire(low_raw);
    let open = price_from_wire(low_raw + tb.delta_open.unwrap_or(0) as i64);
    let close = price_from_wire(low_raw + tb.delta_close.unwrap_or(0) as i64);
    let high = price_from_wire(low_raw + tb.delta_high.unwrap_or(0) as i64);

    Some(Bar {
        timestamp_ms: minutes as i64 * 60 * 1000,
        open,
        high,
        low,
        close,
        volume: tb.volume,
    })
}
