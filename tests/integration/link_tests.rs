//! End-to-end link tests: station and node talking through a recorded
//! radio, with the test playing the (lossy) air in between.

use fieldlink::config::LinkConfig;
use fieldlink::keystore::key_from_material;
use fieldlink::node::Node;
use fieldlink::station::Station;
use fieldlink::wire::cipher::Aes128Ecb;
use fieldlink::wire::frame::{self, FrameVersion};
use fieldlink::wire::message::VehicleId;
use fieldlink::wire::tag::Mix32;

use crate::mock_radio::{QueueRadio, RecordingSink};

const TRANSPORT_KEY: [u8; 16] = *b"shared-cipher-k1";
const KEY_TEXT: &str = "KeySecret!!!!";

fn test_cfg() -> LinkConfig {
    LinkConfig {
        ack_timeout_ms: 100,
        jitter_max_ms: 50,
        ..LinkConfig::default()
    }
}

fn make_station() -> Station<4> {
    Station::new(test_cfg(), &TRANSPORT_KEY, 0x1234)
}

fn make_node(id: &str) -> Node {
    Node::new(
        test_cfg(),
        VehicleId::parse(id).unwrap(),
        key_from_material(KEY_TEXT.as_bytes()).unwrap(),
        &TRANSPORT_KEY,
        0x5678,
    )
}

fn bind(station: &mut Station<4>, sink: &mut RecordingSink, id: &str) {
    station.handle_serial_line(&format!("CFG:{id}:{KEY_TEXT}"), sink);
}

#[test]
fn telemetry_report_is_exported_and_acknowledged() {
    let mut station = make_station();
    let mut node = make_node("AA100AA");
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    bind(&mut station, &mut sink, "AA100AA");
    assert_eq!(sink.logs(), vec!["LOG: key bound for AA100AA"]);

    node.press_button();
    node.submit_telemetry("Geo:45.1,4.8;Res:Eau=80;", "10:00:00", &mut node_radio, 0)
        .unwrap();

    let report = node_radio.pop().expect("telemetry frame transmitted");
    station.handle_frame(&report, &mut post_radio, &mut sink);

    // Authenticated receipt turned into an EXP: line for the gateway.
    let exports = sink.exports();
    assert_eq!(exports.len(), 1);
    let v: serde_json::Value = serde_json::from_str(&exports[0][4..]).unwrap();
    assert_eq!(v["id"], "AA100AA");
    assert_eq!(v["lat"], 45.1);
    assert_eq!(v["lon"], 4.8);
    assert_eq!(v["raw_res"], "Eau=80");
    assert_eq!(v["btn"], 1);
    assert_eq!(v["seq"], 0);
    assert_eq!(v["timestamp"], "10:00:00");

    // The station's ACK closes the node's delivery cycle.
    let ack = post_radio.pop().expect("ACK frame transmitted");
    node.handle_frame(&ack, &mut node_radio, 10);
    assert_eq!(node.record().outbound_seq, 1);
    assert!(!node.record().pending_event, "confirmed report clears the event flag");
    assert!(!node.is_reporting());
}

#[test]
fn sequence_advances_once_per_confirmed_round() {
    let mut station = make_station();
    let mut node = make_node("AA100AA");
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    bind(&mut station, &mut sink, "AA100AA");

    for round in 0u64..5 {
        let now = round * 1000;
        node.submit_telemetry("Geo:1,2;Res:5;", "10:00:00", &mut node_radio, now)
            .unwrap();
        let report = node_radio.pop().unwrap();
        station.handle_frame(&report, &mut post_radio, &mut sink);
        let ack = post_radio.pop().unwrap();
        node.handle_frame(&ack, &mut node_radio, now + 10);
    }

    assert_eq!(node.record().outbound_seq, 5);
    assert_eq!(sink.exports().len(), 5);
}

#[test]
fn duplicate_telemetry_is_reacked_but_not_reexported() {
    let mut station = make_station();
    let mut node = make_node("AA100AA");
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    bind(&mut station, &mut sink, "AA100AA");
    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut node_radio, 0)
        .unwrap();
    let report = node_radio.pop().unwrap();

    // The same report arrives twice — a retransmission after a lost ACK.
    station.handle_frame(&report, &mut post_radio, &mut sink);
    station.handle_frame(&report, &mut post_radio, &mut sink);

    assert_eq!(sink.exports().len(), 1, "duplicate must not re-export");
    assert_eq!(post_radio.sent_count(), 2, "both copies are acknowledged");
}

#[test]
fn telemetry_from_unbound_vehicle_is_dropped() {
    let mut station = make_station();
    let mut node = make_node("ZZ999ZZ"); // no CFG binding on the post
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut node_radio, 0)
        .unwrap();
    let report = node_radio.pop().unwrap();
    station.handle_frame(&report, &mut post_radio, &mut sink);

    assert!(sink.exports().is_empty());
    assert_eq!(post_radio.sent_count(), 0, "unknown vehicles are never acked");
    assert!(
        sink.logs().iter().any(|l| l.contains("unbound")),
        "drop is visible on the log channel: {:?}",
        sink.logs()
    );
}

#[test]
fn report_exhausts_after_three_sends_and_keeps_its_sequence() {
    let mut node = make_node("AA100AA");
    let mut node_radio = QueueRadio::new();

    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut node_radio, 0)
        .unwrap();

    let mut exhausted_at = None;
    for t in (0..2000).step_by(10) {
        if let fieldlink::delivery::PollStep::Exhausted { seq, .. } =
            node.poll(t, &mut node_radio)
        {
            exhausted_at = Some((t, seq));
            break;
        }
    }

    let (_, seq) = exhausted_at.expect("delivery must exhaust without ACKs");
    assert_eq!(seq, 0);
    assert_eq!(node_radio.sent_count(), 3, "first send plus two retries");
    assert_eq!(node.record().outbound_seq, 0, "sequence unchanged on failure");

    // The next sampling tick restarts the whole cycle with the same
    // sequence, so the post can deduplicate a late success.
    node.submit_telemetry("Geo:1,2;", "10:00:01", &mut node_radio, 5000)
        .unwrap();
    assert_eq!(node_radio.sent_count(), 4);
}

#[test]
fn command_is_retried_delivered_and_deduplicated() {
    let mut station = make_station();
    let mut node = make_node("AA100AA");
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    bind(&mut station, &mut sink, "AA100AA");

    // Activate the vehicle with one confirmed report.
    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut node_radio, 0)
        .unwrap();
    let report = node_radio.pop().unwrap();
    station.handle_frame(&report, &mut post_radio, &mut sink);
    node.handle_frame(&post_radio.pop().unwrap(), &mut node_radio, 10);

    // The upstream process asks for a new display order.
    station.handle_serial_line("ID:AA100AA;Ord:PLTH;", &mut sink);
    station.poll(1000, &mut post_radio, &mut sink);
    let _lost = post_radio.pop().expect("command frame transmitted");

    // Past the deadline the identical frame goes out again.
    station.poll(1200, &mut post_radio, &mut sink);
    let retry = post_radio.pop().expect("command frame retransmitted");
    node.handle_frame(&retry, &mut node_radio, 1210);
    assert_eq!(node.display_order(), "PLTH");

    // The node's ACK completes the delivery and advances the post's
    // sequence for this vehicle.
    let ack = node_radio.pop().expect("node acknowledges the command");
    station.handle_frame(&ack, &mut post_radio, &mut sink);
    assert_eq!(station.fleet().get("AA100AA").unwrap().outbound_seq, 1);
    assert!(sink.logs().iter().any(|l| l.contains("delivered")));

    // A straggler copy of the command is re-acked, not re-applied.
    node.handle_frame(&retry, &mut node_radio, 1500);
    assert_eq!(node.display_order(), "PLTH");
    assert_eq!(node_radio.sent_count(), 1, "duplicate answered with an ACK");

    // Nothing further is scheduled once the queue is drained.
    station.poll(2000, &mut post_radio, &mut sink);
    assert_eq!(post_radio.sent_count(), 0);
}

#[test]
fn command_delivery_exhausts_then_retries_next_pass() {
    let mut station = make_station();
    let mut node = make_node("AA100AA");
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    bind(&mut station, &mut sink, "AA100AA");
    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut node_radio, 0)
        .unwrap();
    station.handle_frame(&node_radio.pop().unwrap(), &mut post_radio, &mut sink);
    node.handle_frame(&post_radio.pop().unwrap(), &mut node_radio, 10);

    station.handle_serial_line("ID:AA100AA;Ord:HPLT;", &mut sink);

    // Let the whole cycle time out: three sends, no ACKs.
    let mut t = 1000;
    station.poll(t, &mut post_radio, &mut sink);
    for _ in 0..40 {
        t += 50;
        station.poll(t, &mut post_radio, &mut sink);
        if sink.logs().iter().any(|l| l.contains("timed out")) {
            break;
        }
    }
    assert!(sink.logs().iter().any(|l| l.contains("timed out")));
    assert_eq!(station.fleet().get("AA100AA").unwrap().outbound_seq, 0);

    // The command is still queued; the cycle restarts with the same
    // sequence on a later pass and succeeds this time.
    post_radio.sent.clear();
    t += 1000;
    station.poll(t, &mut post_radio, &mut sink);
    let frame = post_radio.pop().expect("cycle restarted");
    node.handle_frame(&frame, &mut node_radio, t + 10);
    station.handle_frame(&node_radio.pop().unwrap(), &mut post_radio, &mut sink);
    assert_eq!(station.fleet().get("AA100AA").unwrap().outbound_seq, 1);
    assert_eq!(node.display_order(), "HPLT");
}

#[test]
fn key_table_capacity_is_reported_not_fatal() {
    let mut station: Station<2> = Station::new(test_cfg(), &TRANSPORT_KEY, 0x1234);
    let mut sink = RecordingSink::new();

    station.handle_serial_line("CFG:AA100AA:Key1", &mut sink);
    station.handle_serial_line("CFG:BB200BB:Key2", &mut sink);
    station.handle_serial_line("CFG:CC300CC:Key3", &mut sink);

    assert!(station.keys().lookup("AA100AA").is_some());
    assert!(station.keys().lookup("BB200BB").is_some());
    assert!(station.keys().lookup("CC300CC").is_none());
    assert!(sink.logs().iter().any(|l| l.contains("key table full")));

    // Rebinding an existing vehicle still works on a full table.
    station.handle_serial_line("CFG:AA100AA:Key1b", &mut sink);
    assert_eq!(
        station.keys().lookup("AA100AA"),
        Some(*b"Key1b\0\0\0\0\0\0\0\0\0\0\0")
    );
}

#[test]
fn pass_delay_tightens_once_the_fleet_is_active() {
    let mut station = make_station();
    let mut node = make_node("AA100AA");
    let mut post_radio = QueueRadio::new();
    let mut node_radio = QueueRadio::new();
    let mut sink = RecordingSink::new();

    bind(&mut station, &mut sink, "AA100AA");
    let idle_delay = station.poll(0, &mut post_radio, &mut sink);
    assert_eq!(idle_delay, test_cfg().idle_pass_delay_ms);

    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut node_radio, 0)
        .unwrap();
    station.handle_frame(&node_radio.pop().unwrap(), &mut post_radio, &mut sink);

    let active_delay = station.poll(10, &mut post_radio, &mut sink);
    assert_eq!(active_delay, test_cfg().active_pass_delay_ms);
}

#[test]
fn canonical_scenario_round_trip_and_key_mismatch() {
    // The reference exchange: vehicle AA100AA, per-vehicle key K1,
    // transport key T.
    let k1 = key_from_material(b"K1").unwrap();
    let cipher = Aes128Ecb::new(&TRANSPORT_KEY);
    let msg = "ID:AA100AA;Geo:1,2;Res:5;Btn:0;Seq:3;Time:10:00:00;";

    let encoded = frame::encode(msg, &k1, &cipher, &Mix32, FrameVersion::Extended, 0x20);
    assert_eq!(encoded.len(), FrameVersion::Extended.wire_len());

    let lookup = |id: &str| (id == "AA100AA").then_some(k1);
    let decoded = frame::decode(&encoded, &cipher, &Mix32, &lookup, 0x20).unwrap();
    assert_eq!(decoded.message.as_str(), msg);
    assert_eq!(decoded.vehicle.as_str(), "AA100AA");

    // The same frame against a different per-vehicle key must fail
    // verification, not decode to something plausible.
    let k2 = key_from_material(b"K2").unwrap();
    let wrong = |id: &str| (id == "AA100AA").then_some(k2);
    assert_eq!(
        frame::decode(&encoded, &cipher, &Mix32, &wrong, 0x20),
        Err(fieldlink::error::FrameError::BadTag)
    );
}
