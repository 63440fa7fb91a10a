//! JSON wire shapes for the input (order commands) and output (engine events)
//! streams, and the conversions to/from the in-process `Command`/`Event` types.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::book::{Order, OrderType, RejectReason, Side, TimeInForce};
use crate::control::validate_symbol;
use crate::engine::{Command, Event, EventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireKind {
    #[serde(rename = "NEW")]
    New,
    #[serde(rename = "CANCEL")]
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum WireSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum WireOrderType {
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "MARKET")]
    Market,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum WireTimeInForce {
    #[serde(rename = "GTC")]
    Gtc,
    #[serde(rename = "IOC")]
    Ioc,
    #[serde(rename = "FOK")]
    Fok,
    #[serde(rename = "POST_ONLY")]
    PostOnly,
}

/// The shape carried in the input stream's `data` field. NEW commands use
/// every field; CANCEL only needs `order_id`/`user_id`/`symbol`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandWire {
    #[serde(rename = "type")]
    pub kind: WireKind,
    pub order_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    pub user_id: u64,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<WireSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<WireOrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<WireTimeInForce>,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub qty: i64,
}

/// Parses a raw JSON payload into a `Command`, also returning the symbol it
/// targets so the caller can route it without re-parsing.
pub fn parse_command(payload: &[u8]) -> Result<(String, Command), String> {
    let wire: CommandWire =
        serde_json::from_slice(payload).map_err(|e| format!("invalid command JSON: {e}"))?;

    if wire.price < 0 {
        return Err("negative price".to_string());
    }
    if wire.qty < 0 {
        return Err("negative quantity".to_string());
    }
    validate_symbol(&wire.symbol).map_err(|e| e.to_string())?;

    let symbol = wire.symbol.clone();
    match wire.kind {
        WireKind::Cancel => Ok((
            symbol,
            Command::Cancel {
                order_id: wire.order_id,
                user_id: wire.user_id,
            },
        )),
        WireKind::New => {
            let side = match wire.side.ok_or("missing side for NEW command")? {
                WireSide::Buy => Side::Buy,
                WireSide::Sell => Side::Sell,
            };
            let order_type = match wire.order_type.ok_or("missing orderType for NEW command")? {
                WireOrderType::Limit => OrderType::Limit,
                WireOrderType::Market => OrderType::Market,
            };
            let time_in_force = match order_type {
                OrderType::Market => TimeInForce::Ioc,
                OrderType::Limit => match wire
                    .time_in_force
                    .ok_or("missing timeInForce for NEW limit command")?
                {
                    WireTimeInForce::Gtc => TimeInForce::Gtc,
                    WireTimeInForce::Ioc => TimeInForce::Ioc,
                    WireTimeInForce::Fok => TimeInForce::Fok,
                    WireTimeInForce::PostOnly => TimeInForce::PostOnly,
                },
            };
            let qty = wire.qty as u64;
            let order = Order {
                order_id: wire.order_id,
                client_order_id: wire.client_order_id,
                user_id: wire.user_id,
                symbol: symbol.clone(),
                side,
                order_type,
                time_in_force,
                price: wire.price as u64,
                orig_qty: qty,
                leaves_qty: qty,
                timestamp_ns: 0,
            };
            Ok((symbol, Command::New(order)))
        }
    }
}

fn reason_code(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::Halted => "HALTED",
        RejectReason::CancelOnly => "REASON_CANCEL_ONLY",
        RejectReason::InvalidQty => "INVALID_QTY",
        RejectReason::InvalidPrice => "INVALID_PRICE",
        RejectReason::WouldTake => "REASON_WOULD_TAKE",
        RejectReason::FokUnfillable => "REASON_FOK_UNFILLABLE",
        RejectReason::DuplicateOrder => "REJECT_DUPLICATE_ORDER",
        RejectReason::UnknownOrder => "UNKNOWN_ORDER",
        RejectReason::NotOwner => "NOT_OWNER",
    }
}

fn side_code(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn event_type_and_data(event: &Event) -> (&'static str, Value) {
    match &event.kind {
        EventKind::OrderAccepted {
            order_id,
            user_id,
            side,
            price,
            qty,
        } => (
            "ORDER_ACCEPTED",
            json!({
                "orderId": order_id,
                "userId": user_id,
                "side": side_code(*side),
                "price": price,
                "qty": qty,
            }),
        ),
        EventKind::OrderRejected { order_id, reason } => (
            "ORDER_REJECTED",
            json!({ "orderId": order_id, "reasonCode": reason_code(*reason) }),
        ),
        EventKind::OrderCanceled {
            order_id,
            user_id,
            leaves_qty,
        } => (
            "ORDER_CANCELED",
            json!({ "orderId": order_id, "userId": user_id, "leavesQty": leaves_qty }),
        ),
        EventKind::TradeCreated {
            trade_id,
            maker_order_id,
            taker_order_id,
            maker_user_id,
            taker_user_id,
            price,
            qty,
            taker_side,
        } => (
            "TRADE_CREATED",
            json!({
                "tradeId": trade_id,
                "makerOrderId": maker_order_id,
                "takerOrderId": taker_order_id,
                "makerUserId": maker_user_id,
                "takerUserId": taker_user_id,
                "price": price,
                "qty": qty,
                "takerSide": side_code(*taker_side),
            }),
        ),
        EventKind::OrderPartiallyFilled {
            order_id,
            executed_qty,
            leaves_qty,
        } => (
            "ORDER_PARTIALLY_FILLED",
            json!({ "orderId": order_id, "executedQty": executed_qty, "leavesQty": leaves_qty }),
        ),
        EventKind::OrderFilled { order_id } => {
            ("ORDER_FILLED", json!({ "orderId": order_id }))
        }
    }
}

/// Serializes an `Event` into the output stream's wire shape.
pub fn event_to_wire(event: &Event) -> Value {
    let (kind, data) = event_type_and_data(event);
    json!({
        "type": kind,
        "symbol": event.symbol,
        "seq": event.seq,
        "timestamp": event.timestamp_ns,
        "data": data,
    })
}

pub fn event_to_bytes(event: &Event) -> Result<Vec<u8>, String> {
    serde_json::to_vec(&event_to_wire(event)).map_err(|e| e.to_string())
}

fn side_from_code(code: &str) -> Result<Side, String> {
    match code {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(format!("unknown side code {other:?}")),
    }
}

fn reason_from_code(code: &str) -> Result<RejectReason, String> {
    match code {
        "HALTED" => Ok(RejectReason::Halted),
        "REASON_CANCEL_ONLY" => Ok(RejectReason::CancelOnly),
        "INVALID_QTY" => Ok(RejectReason::InvalidQty),
        "INVALID_PRICE" => Ok(RejectReason::InvalidPrice),
        "REASON_WOULD_TAKE" => Ok(RejectReason::WouldTake),
        "REASON_FOK_UNFILLABLE" => Ok(RejectReason::FokUnfillable),
        "REJECT_DUPLICATE_ORDER" => Ok(RejectReason::DuplicateOrder),
        "UNKNOWN_ORDER" => Ok(RejectReason::UnknownOrder),
        "NOT_OWNER" => Ok(RejectReason::NotOwner),
        other => Err(format!("unknown reason code {other:?}")),
    }
}

fn field_u64(data: &Value, key: &str) -> Result<u64, String> {
    data.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("missing or invalid field {key:?}"))
}

fn field_str<'a>(data: &'a Value, key: &str) -> Result<&'a str, String> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing or invalid field {key:?}"))
}

/// Parses an event back out of the output stream's wire shape. Used by the
/// market-data projector, which reads the same durable stream the publisher
/// writes rather than sharing in-process state with the engine hosts.
pub fn parse_event(payload: &[u8]) -> Result<Event, String> {
    let envelope: Value =
        serde_json::from_slice(payload).map_err(|e| format!("invalid event JSON: {e}"))?;

    let symbol = field_str(&envelope, "symbol")?.to_string();
    let seq = field_u64(&envelope, "seq")?;
    let timestamp_ns = field_u64(&envelope, "timestamp")?;
    let kind_name = field_str(&envelope, "type")?;
    let data = envelope
        .get("data")
        .ok_or_else(|| "missing field \"data\"".to_string())?;

    let kind = match kind_name {
        "ORDER_ACCEPTED" => EventKind::OrderAccepted {
            order_id: field_u64(data, "orderId")?,
            user_id: field_u64(data, "userId")?,
            side: side_from_code(field_str(data, "side")?)?,
            price: field_u64(data, "price")?,
            qty: field_u64(data, "qty")?,
        },
        "ORDER_REJECTED" => EventKind::OrderRejected {
            order_id: field_u64(data, "orderId")?,
            reason: reason_from_code(field_str(data, "reasonCode")?)?,
        },
        "ORDER_CANCELED" => EventKind::OrderCanceled {
            order_id: field_u64(data, "orderId")?,
            user_id: field_u64(data, "userId")?,
            leaves_qty: field_u64(data, "leavesQty")?,
        },
        "TRADE_CREATED" => EventKind::TradeCreated {
            trade_id: field_u64(data, "tradeId")?,
            maker_order_id: field_u64(data, "makerOrderId")?,
            taker_order_id: field_u64(data, "takerOrderId")?,
            maker_user_id: field_u64(data, "makerUserId")?,
            taker_user_id: field_u64(data, "takerUserId")?,
            price: field_u64(data, "price")?,
            qty: field_u64(data, "qty")?,
            taker_side: side_from_code(field_str(data, "takerSide")?)?,
        },
        "ORDER_PARTIALLY_FILLED" => EventKind::OrderPartiallyFilled {
            order_id: field_u64(data, "orderId")?,
            executed_qty: field_u64(data, "executedQty")?,
            leaves_qty: field_u64(data, "leavesQty")?,
        },
        "ORDER_FILLED" => EventKind::OrderFilled {
            order_id: field_u64(data, "orderId")?,
        },
        other => return Err(format!("unknown event type {other:?}")),
    };

    Ok(Event {
        symbol,
        seq,
        timestamp_ns,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_limit_order() {
        let payload = br#"{
            "type": "NEW", "orderId": 1, "userId": 100, "symbol": "BTCUSDT",
            "side": "BUY", "orderType": "LIMIT", "timeInForce": "GTC",
            "price": 50000, "qty": 10
        }"#;
        let (symbol, command) = parse_command(payload).unwrap();
        assert_eq!(symbol, "BTCUSDT");
        match command {
            Command::New(order) => {
                assert_eq!(order.order_id, 1);
                assert_eq!(order.price, 50000);
                assert_eq!(order.leaves_qty, 10);
            }
            _ => panic!("expected NEW"),
        }
    }

    #[test]
    fn parses_cancel() {
        let payload =
            br#"{"type":"CANCEL","orderId":1,"userId":100,"symbol":"BTCUSDT"}"#;
        let (symbol, command) = parse_command(payload).unwrap();
        assert_eq!(symbol, "BTCUSDT");
        assert!(matches!(command, Command::Cancel { order_id: 1, user_id: 100 }));
    }

    #[test]
    fn market_order_forces_ioc() {
        let payload = br#"{
            "type": "NEW", "orderId": 1, "userId": 100, "symbol": "BTCUSDT",
            "side": "BUY", "orderType": "MARKET", "price": 0, "qty": 10
        }"#;
        let (_, command) = parse_command(payload).unwrap();
        match command {
            Command::New(order) => assert!(matches!(order.time_in_force, TimeInForce::Ioc)),
            _ => panic!("expected NEW"),
        }
    }

    #[test]
    fn event_round_trips_through_wire_format() {
        let event = Event {
            symbol: "BTCUSDT".to_string(),
            seq: 4,
            timestamp_ns: 123,
            kind: EventKind::TradeCreated {
                trade_id: 1,
                maker_order_id: 1,
                taker_order_id: 2,
                maker_user_id: 100,
                taker_user_id: 200,
                price: 50000,
                qty: 50,
                taker_side: Side::Buy,
            },
        };
        let bytes = event_to_bytes(&event).unwrap();
        let parsed = parse_event(&bytes).unwrap();
        assert_eq!(parsed.symbol, "BTCUSDT");
        assert_eq!(parsed.seq, 4);
        match parsed.kind {
            EventKind::TradeCreated { qty, price, .. } => {
                assert_eq!(qty, 50);
                assert_eq!(price, 50000);
            }
            _ => panic!("expected TradeCreated"),
        }
    }

    #[test]
    fn rejects_negative_quantity() {
        let payload = br#"{
            "type": "NEW", "orderId": 1, "userId": 100, "symbol": "BTCUSDT",
            "side": "BUY", "orderType": "LIMIT", "timeInForce": "GTC",
            "price": 50000, "qty": -10
        }"#;
        assert!(parse_command(payload).is_err());
    }

    #[test]
    fn rejects_invalid_symbol() {
        let payload = br#"{
            "type": "NEW", "orderId": 1, "userId": 100, "symbol": "btc-usdt",
            "side": "BUY", "orderType": "LIMIT", "timeInForce": "GTC",
            "price": 50000, "qty": 10
        }"#;
        assert!(parse_command(payload).is_err());
    }
}
