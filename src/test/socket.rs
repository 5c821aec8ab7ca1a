use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use super::harness::{Pair, Side};
use crate::net::{Handshake, Keepalive, Payload};
use crate::proto::{Socket, SocketConfig, SocketHost, SocketState};

fn syn(seq: u32) -> Payload {
    Payload::Handshake(Handshake::Syn { seq })
}

fn syn_ack(seq: u32, ack: u32) -> Payload {
    Payload::Handshake(Handshake::SynAck { seq, ack })
}

fn ack(ack: u32) -> Payload {
    Payload::Handshake(Handshake::Ack { ack })
}

fn connected_pair() -> Pair {
    let mut pair = Pair::new(SocketConfig::default());
    pair.connect();
    assert_eq!(pair.a.state(), SocketState::Connected);
    assert_eq!(pair.b.state(), SocketState::Connected);
    pair
}

fn recorder(socket: &mut Socket) -> Rc<RefCell<Vec<Value>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    socket.add_packet_handler(Box::new(
        move |_: &mut Socket, _: &mut dyn SocketHost, data: &Value| {
            sink.borrow_mut().push(data.clone());
        },
    ));
    seen
}

#[test]
fn three_way_handshake() {
    let mut pair = Pair::new(SocketConfig::default());
    pair.connect();

    assert_eq!(
        pair.log,
        vec![
            (Side::A, syn(10)),
            (Side::B, syn_ack(20, 11)),
            (Side::A, ack(21)),
        ]
    );
    assert_eq!(pair.a.state(), SocketState::Connected);
    assert_eq!(pair.b.state(), SocketState::Connected);
    assert_eq!(pair.a.current_seq(), 10);
    assert_eq!(pair.b.current_seq(), 20);
    // 只剩保活定时器
    assert_eq!(pair.a.pending_timers(), 1);
    assert_eq!(pair.b.pending_timers(), 1);
}

#[test]
fn handshake_times_out_without_a_peer() {
    let mut pair = Pair::new(SocketConfig::default());
    pair.b_reachable = false;
    pair.connect();
    assert_eq!(pair.a.state(), SocketState::Connecting);

    pair.ticks(SocketConfig::CONNECTION_TIMEOUT - 1);
    assert_eq!(pair.a.state(), SocketState::Connecting);
    assert_eq!(pair.log.len(), 1);

    pair.tick();
    assert_eq!(pair.log, vec![(Side::A, syn(10)), (Side::A, Payload::Teardown)]);
    assert_eq!(pair.a.state(), SocketState::Disconnected);
    assert!(pair.a.is_closed());
    assert_eq!(pair.a.pending_timers(), 0);
}

#[test]
fn syn_ack_with_wrong_ack_is_ignored() {
    let mut pair = Pair::new(SocketConfig::default());
    pair.b_reachable = false;
    pair.connect();

    pair.a.handle(&mut pair.host_a, syn_ack(5, 99));
    pair.pump();

    assert_eq!(pair.a.state(), SocketState::Connecting);
    assert_eq!(pair.log.len(), 1);
}

#[test]
fn connect_twice_is_a_no_op() {
    let mut pair = connected_pair();
    let before = pair.log.len();

    pair.a.connect(&mut pair.host_a);
    pair.pump();

    assert_eq!(pair.log.len(), before);
    assert_eq!(pair.a.state(), SocketState::Connected);
}

#[test]
fn keepalive_round_trip_keeps_both_sides_connected() {
    let mut pair = connected_pair();
    let start = pair.log.len();

    pair.ticks(SocketConfig::KEEPALIVE_PERIOD + SocketConfig::KEEPALIVE_RESPONSE_TIMEOUT);

    assert_eq!(
        pair.log_since(start),
        &[
            (Side::A, Payload::Keepalive(Keepalive::Req)),
            (Side::B, Payload::Keepalive(Keepalive::Rsp)),
        ]
    );
    assert_eq!(pair.a.state(), SocketState::Connected);
    assert_eq!(pair.b.state(), SocketState::Connected);
}

#[test]
fn unanswered_keepalive_tears_the_socket_down() {
    let mut pair = connected_pair();
    let start = pair.log.len();
    pair.b_reachable = false;

    pair.ticks(SocketConfig::KEEPALIVE_PERIOD + SocketConfig::KEEPALIVE_RESPONSE_TIMEOUT - 1);
    assert_eq!(pair.a.state(), SocketState::Connected);

    pair.tick();
    assert_eq!(
        pair.log_since(start),
        &[
            (Side::A, Payload::Keepalive(Keepalive::Req)),
            (Side::A, Payload::Teardown),
        ]
    );
    assert_eq!(pair.a.state(), SocketState::Disconnected);
    assert_eq!(pair.a.pending_timers(), 0);
}

#[test]
fn data_traffic_postpones_keepalive() {
    let mut pair = connected_pair();
    let start = pair.log.len();

    pair.ticks(50);
    pair.b.send(&mut pair.host_b, json!("ping"));
    pair.pump();
    // A 在第 50 tick 收到数据，周期重新计时；B 的周期照旧在第 100 tick 到期
    pair.ticks(60);

    assert_eq!(
        pair.log_since(start),
        &[
            (Side::B, Payload::Data(json!("ping"))),
            (Side::B, Payload::Keepalive(Keepalive::Req)),
            (Side::A, Payload::Keepalive(Keepalive::Rsp)),
        ]
    );
}

#[test]
fn queued_data_is_delivered_in_order_on_update() {
    let mut pair = connected_pair();
    let seen = recorder(&mut pair.a);

    for i in 0..4 {
        pair.a.handle(&mut pair.host_a, Payload::Data(json!(i)));
    }
    assert_eq!(pair.a.pending_data(), 4);
    assert!(seen.borrow().is_empty());

    pair.tick();
    assert_eq!(*seen.borrow(), vec![json!(0), json!(1), json!(2), json!(3)]);
    assert_eq!(pair.a.pending_data(), 0);
}

#[test]
fn every_handler_sees_every_item() {
    let mut pair = connected_pair();
    let first = recorder(&mut pair.a);
    let second = recorder(&mut pair.a);
    assert_eq!(pair.a.packet_handler_count(), 2);

    pair.a.handle(&mut pair.host_a, Payload::Data(json!("x")));
    pair.a.handle(&mut pair.host_a, Payload::Data(json!("y")));
    pair.tick();

    assert_eq!(*first.borrow(), vec![json!("x"), json!("y")]);
    assert_eq!(*second.borrow(), vec![json!("x"), json!("y")]);
}

#[test]
fn disconnect_inside_a_handler_stops_delivery() {
    let mut pair = connected_pair();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    pair.a.add_packet_handler(Box::new(
        move |socket: &mut Socket, host: &mut dyn SocketHost, data: &Value| {
            sink.borrow_mut().push(data.clone());
            socket.disconnect(host);
        },
    ));

    for i in 0..4 {
        pair.a.handle(&mut pair.host_a, Payload::Data(json!(i)));
    }
    pair.tick();

    assert_eq!(*seen.borrow(), vec![json!(0)]);
    assert_eq!(pair.a.state(), SocketState::Disconnected);
    assert_eq!(pair.a.pending_data(), 0);
    // 对端收到拆除通知
    assert_eq!(pair.b.state(), SocketState::Disconnected);
    // 处理器保留，可在重连后继续使用
    assert_eq!(pair.a.packet_handler_count(), 1);
}

#[test]
fn handler_can_reply_through_the_socket() {
    let mut pair = connected_pair();
    pair.b.add_packet_handler(Box::new(
        |socket: &mut Socket, host: &mut dyn SocketHost, data: &Value| {
            socket.send(host, json!({ "echo": data }));
        },
    ));
    let replies = recorder(&mut pair.a);

    pair.a.send(&mut pair.host_a, json!(7));
    pair.pump();
    pair.tick(); // B 交付并回复
    pair.tick(); // A 交付回复

    assert_eq!(*replies.borrow(), vec![json!({ "echo": 7 })]);
}

#[test]
fn nothing_flows_while_disconnected() {
    let mut pair = Pair::new(SocketConfig::default());
    let seen = recorder(&mut pair.a);

    pair.a.send(&mut pair.host_a, json!("early"));
    pair.a.handle(&mut pair.host_a, Payload::Data(json!("stray")));
    pair.pump();
    pair.tick();

    assert!(pair.log.is_empty());
    assert_eq!(pair.a.pending_data(), 0);
    assert!(seen.borrow().is_empty());
}

#[test]
fn disconnect_notifies_the_peer() {
    let mut pair = connected_pair();
    let start = pair.log.len();

    pair.a.disconnect(&mut pair.host_a);
    pair.pump();

    assert_eq!(pair.log_since(start), &[(Side::A, Payload::Teardown)]);
    assert_eq!(pair.a.state(), SocketState::Disconnected);
    assert_eq!(pair.b.state(), SocketState::Disconnected);
    assert_eq!(pair.a.pending_timers(), 0);
    assert_eq!(pair.b.pending_timers(), 0);

    // 已断开时再次断开不发任何东西
    pair.a.disconnect(&mut pair.host_a);
    pair.pump();
    assert_eq!(pair.log.len(), start + 1);
}

#[test]
fn socket_can_reconnect_after_teardown() {
    let mut pair = connected_pair();
    pair.a.disconnect(&mut pair.host_a);
    pair.pump();
    let start = pair.log.len();

    pair.connect();

    assert_eq!(pair.log_since(start).len(), 3);
    assert_eq!(pair.a.state(), SocketState::Connected);
    assert_eq!(pair.b.state(), SocketState::Connected);
}

#[test]
fn socket_state_survives_serde() {
    let pair = connected_pair();
    let text = serde_json::to_string(&pair.a).unwrap();
    let back: Socket = serde_json::from_str(&text).unwrap();

    assert_eq!(back.state(), SocketState::Connected);
    assert_eq!(back.local_port(), Some(10));
    assert_eq!(back.destination(), pair.a.destination());
    assert_eq!(back.pending_timers(), pair.a.pending_timers());
    assert_eq!(back.packet_handler_count(), 0);
}
