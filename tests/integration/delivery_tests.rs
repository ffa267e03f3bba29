//! Delivery-engine timing and ACK tie-break behaviour, driven through a
//! node with a recorded radio.

use fieldlink::config::LinkConfig;
use fieldlink::delivery::PollStep;
use fieldlink::keystore::key_from_material;
use fieldlink::node::Node;
use fieldlink::wire::cipher::Aes128Ecb;
use fieldlink::wire::frame::{self, FrameVersion};
use fieldlink::wire::message::VehicleId;
use fieldlink::wire::tag::Mix32;

use crate::mock_radio::QueueRadio;

const TRANSPORT_KEY: [u8; 16] = *b"shared-cipher-k1";

fn cfg() -> LinkConfig {
    LinkConfig {
        ack_timeout_ms: 100,
        jitter_max_ms: 50,
        ..LinkConfig::default()
    }
}

fn make_node(seed: u32) -> Node {
    Node::new(
        cfg(),
        VehicleId::parse("AA100AA").unwrap(),
        key_from_material(b"K1").unwrap(),
        &TRANSPORT_KEY,
        seed,
    )
}

/// Forge the station's ACK for the given sequence.
fn ack_frame(seq: u16) -> Vec<u8> {
    let cipher = Aes128Ecb::new(&TRANSPORT_KEY);
    let key = key_from_material(b"K1").unwrap();
    frame::encode(
        &format!("ACK:AA100AA;Seq:{seq};"),
        &key,
        &cipher,
        &Mix32,
        FrameVersion::Standard,
        0x20,
    )
    .to_vec()
}

#[test]
fn retransmissions_respect_timeout_and_jitter_bounds() {
    // Across several cycles and seeds, the first retransmission must
    // land inside [timeout, timeout + jitter_max].
    for seed in [1u32, 7, 99, 12345] {
        let mut node = make_node(seed);
        let mut radio = QueueRadio::new();
        node.submit_telemetry("Geo:1,2;", "10:00:00", &mut radio, 0)
            .unwrap();

        // Strictly before the base timeout nothing may be re-sent.
        for t in 0..100 {
            assert_eq!(node.poll(t, &mut radio), PollStep::Waiting, "seed {seed}");
        }
        assert_eq!(radio.sent_count(), 1);

        // Walk past the jitter window: the retry must happen by then.
        let mut resent_at = None;
        for t in 100..=151 {
            if node.poll(t, &mut radio) == PollStep::Resent {
                resent_at = Some(t);
                break;
            }
        }
        let t = resent_at.expect("retry within timeout + jitter_max");
        assert!((100..=150).contains(&t), "seed {seed}: resent at {t}");
    }
}

#[test]
fn ack_for_a_different_sequence_never_matches() {
    let mut node = make_node(3);
    let mut radio = QueueRadio::new();
    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut radio, 0)
        .unwrap();

    // A stale ACK (wrong sequence) authenticates but is left alone.
    node.handle_frame(&ack_frame(7), &mut radio, 10);
    assert!(node.is_reporting());
    assert_eq!(node.record().outbound_seq, 0);

    // The matching ACK completes the cycle.
    node.handle_frame(&ack_frame(0), &mut radio, 20);
    assert!(!node.is_reporting());
    assert_eq!(node.record().outbound_seq, 1);
}

#[test]
fn late_ack_after_exhaustion_is_ignored() {
    let mut node = make_node(4);
    let mut radio = QueueRadio::new();
    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut radio, 0)
        .unwrap();

    let mut exhausted = false;
    for t in (0..2000).step_by(10) {
        if matches!(node.poll(t, &mut radio), PollStep::Exhausted { .. }) {
            exhausted = true;
            break;
        }
    }
    assert!(exhausted);

    // The cycle is over; a straggler ACK must not advance the sequence.
    node.handle_frame(&ack_frame(0), &mut radio, 3000);
    assert_eq!(node.record().outbound_seq, 0);
}

#[test]
fn submit_is_refused_while_a_report_is_in_flight() {
    let mut node = make_node(5);
    let mut radio = QueueRadio::new();
    node.submit_telemetry("Geo:1,2;", "10:00:00", &mut radio, 0)
        .unwrap();
    assert_eq!(
        node.submit_telemetry("Geo:3,4;", "10:00:01", &mut radio, 50),
        Err(fieldlink::error::DeliveryError::Busy)
    );
    assert_eq!(radio.sent_count(), 1);
}
