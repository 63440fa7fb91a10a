//! Concrete command-sequence scenarios exercising the matching engine end to
//! end, independent of any durable-log transport.

use exchange_engine::book::{Order, OrderType, RejectReason, Side, TimeInForce};
use exchange_engine::control::ControlPlane;
use exchange_engine::engine::{Command, Event, EventKind, MatchingEngine};

fn control() -> ControlPlane {
    ControlPlane::new()
}

fn limit_order(
    id: u64,
    user: u64,
    side: Side,
    price: u64,
    qty: u64,
    tif: TimeInForce,
) -> Order {
    Order {
        order_id: id,
        client_order_id: None,
        user_id: user,
        symbol: "BTCUSDT".to_string(),
        side,
        order_type: OrderType::Limit,
        time_in_force: tif,
        price,
        orig_qty: qty,
        leaves_qty: qty,
        timestamp_ns: 0,
    }
}

fn market_order(id: u64, user: u64, side: Side, qty: u64) -> Order {
    Order {
        order_id: id,
        client_order_id: None,
        user_id: user,
        symbol: "BTCUSDT".to_string(),
        side,
        order_type: OrderType::Market,
        time_in_force: TimeInForce::Ioc,
        price: 0,
        orig_qty: qty,
        leaves_qty: qty,
        timestamp_ns: 0,
    }
}

fn apply(engine: &mut MatchingEngine, control: &ControlPlane, order: Order) -> Vec<Event> {
    engine.apply(Command::New(order), control)
}

#[test]
fn s1_simple_cross() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    apply(
        &mut engine,
        &control,
        limit_order(1, 100, Side::Sell, 50000, 100, TimeInForce::Gtc),
    );
    let events = apply(
        &mut engine,
        &control,
        limit_order(2, 200, Side::Buy, 50000, 50, TimeInForce::Gtc),
    );

    assert!(matches!(
        events[0].kind,
        EventKind::OrderAccepted { order_id: 2, .. }
    ));
    match &events[1].kind {
        EventKind::TradeCreated {
            trade_id,
            price,
            qty,
            taker_side,
            ..
        } => {
            assert_eq!(*trade_id, 1);
            assert_eq!(*price, 50000);
            assert_eq!(*qty, 50);
            assert!(matches!(taker_side, Side::Buy));
        }
        other => panic!("expected TradeCreated, got {other:?}"),
    }
    assert!(matches!(
        events[2].kind,
        EventKind::OrderPartiallyFilled { order_id: 1, leaves_qty: 50, .. }
    ));
    assert!(matches!(
        events[3].kind,
        EventKind::OrderFilled { order_id: 2 }
    ));

    let (bids, asks) = engine.book.depth(10);
    assert_eq!(bids, Vec::<(u64, u64)>::new());
    assert_eq!(asks, vec![(50000, 50)]);
}

#[test]
fn s2_self_trade_skip() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    apply(
        &mut engine,
        &control,
        limit_order(1, 100, Side::Sell, 50000, 100, TimeInForce::Gtc),
    );
    let events = apply(
        &mut engine,
        &control,
        limit_order(2, 100, Side::Buy, 50000, 50, TimeInForce::Gtc),
    );

    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0].kind,
        EventKind::OrderAccepted { order_id: 2, .. }
    ));

    let (bids, asks) = engine.book.depth(10);
    assert_eq!(bids, vec![(50000, 50)]);
    assert_eq!(asks, vec![(50000, 100)]);
}

#[test]
fn s3_post_only_crosses() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    apply(
        &mut engine,
        &control,
        limit_order(1, 100, Side::Sell, 50000, 10, TimeInForce::Gtc),
    );
    let events = apply(
        &mut engine,
        &control,
        limit_order(2, 200, Side::Buy, 50000, 5, TimeInForce::PostOnly),
    );

    assert_eq!(events.len(), 1);
    match &events[0].kind {
        EventKind::OrderRejected { reason, .. } => {
            assert_eq!(*reason, RejectReason::WouldTake);
        }
        other => panic!("expected OrderRejected, got {other:?}"),
    }

    let (bids, asks) = engine.book.depth(10);
    assert_eq!(bids, Vec::<(u64, u64)>::new());
    assert_eq!(asks, vec![(50000, 10)]);
}

#[test]
fn s4_fok_unfillable() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    apply(
        &mut engine,
        &control,
        limit_order(1, 100, Side::Sell, 50000, 10, TimeInForce::Gtc),
    );
    apply(
        &mut engine,
        &control,
        limit_order(2, 100, Side::Sell, 50100, 5, TimeInForce::Gtc),
    );
    let events = apply(
        &mut engine,
        &control,
        limit_order(3, 200, Side::Buy, 50100, 20, TimeInForce::Fok),
    );

    assert_eq!(events.len(), 1);
    match &events[0].kind {
        EventKind::OrderRejected { reason, .. } => {
            assert_eq!(*reason, RejectReason::FokUnfillable);
        }
        other => panic!("expected OrderRejected, got {other:?}"),
    }
}

#[test]
fn s5_market_sweeps_and_cancels_residue() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    apply(
        &mut engine,
        &control,
        limit_order(1, 100, Side::Sell, 50000, 10, TimeInForce::Gtc),
    );
    apply(
        &mut engine,
        &control,
        limit_order(2, 100, Side::Sell, 50100, 5, TimeInForce::Gtc),
    );
    let events = apply(&mut engine, &control, market_order(3, 200, Side::Buy, 20));

    let trades: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::TradeCreated { price, qty, .. } => Some((*price, *qty)),
            _ => None,
        })
        .collect();
    assert_eq!(trades, vec![(50000, 10), (50100, 5)]);

    let last = events.last().unwrap();
    assert!(matches!(
        last.kind,
        EventKind::OrderCanceled { order_id: 3, leaves_qty: 5, .. }
    ));
}

#[test]
fn s6_cancel_removes_from_level() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    apply(
        &mut engine,
        &control,
        limit_order(1, 100, Side::Buy, 50000, 10, TimeInForce::Gtc),
    );
    apply(
        &mut engine,
        &control,
        limit_order(2, 100, Side::Buy, 50000, 20, TimeInForce::Gtc),
    );
    apply(
        &mut engine,
        &control,
        limit_order(3, 100, Side::Buy, 50000, 5, TimeInForce::Gtc),
    );

    let events = engine.apply(
        Command::Cancel {
            order_id: 2,
            user_id: 100,
        },
        &control,
    );
    assert!(matches!(
        events[0].kind,
        EventKind::OrderCanceled { order_id: 2, leaves_qty: 20, .. }
    ));

    let (bids, _) = engine.book.depth(10);
    assert_eq!(bids, vec![(50000, 15)]);
}

#[test]
fn duplicate_new_command_is_idempotent() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");
    let order = limit_order(1, 100, Side::Buy, 50000, 10, TimeInForce::Gtc);

    let first = apply(&mut engine, &control, order.clone());
    assert!(matches!(first[0].kind, EventKind::OrderAccepted { .. }));

    let (bids_before, _) = engine.book.depth(10);

    let second = apply(&mut engine, &control, order);
    assert_eq!(second.len(), 1);
    match &second[0].kind {
        EventKind::OrderRejected { reason, .. } => assert_eq!(*reason, RejectReason::DuplicateOrder),
        other => panic!("expected OrderRejected, got {other:?}"),
    }

    let (bids_after, _) = engine.book.depth(10);
    assert_eq!(bids_before, bids_after);
}

#[test]
fn cancel_unknown_order_is_rejected() {
    let control = control();
    let mut engine = MatchingEngine::new("BTCUSDT");

    let events = engine.apply(
        Command::Cancel {
            order_id: 999,
            user_id: 1,
        },
        &control,
    );
    match &events[0].kind {
        EventKind::OrderRejected { reason, .. } => assert_eq!(*reason, RejectReason::UnknownOrder),
        other => panic!("expected OrderRejected, got {other:?}"),
    }
}
