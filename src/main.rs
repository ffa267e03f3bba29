//! Host simulation — one command post, one vehicle node, lossy loopback
//! radio.
//!
//! Wires both ends of the link inside a single process so the whole
//! protocol can be watched end to end without radio hardware: a thread
//! per direction plays the receive-notification context, pulling frames
//! off the simulated medium and publishing them into the consumer's
//! one-slot mailbox. The medium deliberately drops a frame now and then
//! to show the retry cycle doing its job.
//!
//! Build with `--features sim`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::info;

use fieldlink::config::LinkConfig;
use fieldlink::mailbox::{RadioMailbox, SerialLine, SerialQueue};
use fieldlink::node::Node;
use fieldlink::station::Station;
use fieldlink::transport::RadioTransport;
use fieldlink::wire::frame::FrameBuf;
use fieldlink::wire::message::VehicleId;
use fieldlink::serial::LineSink;

const TRANSPORT_KEY: [u8; 16] = *b"shared-cipher-k1";
const VEHICLE_KEY_TEXT: &str = "KeySecret!!!!";

// ── Simulated medium ─────────────────────────────────────────

/// One direction of the air: a queue of datagrams, dropping every
/// `drop_every`-th frame to exercise retries.
struct Medium {
    queue: Mutex<VecDeque<Vec<u8>>>,
    sent: Mutex<u32>,
    drop_every: u32,
}

impl Medium {
    fn new(drop_every: u32) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            sent: Mutex::new(0),
            drop_every,
        }
    }

    fn transmit(&self, frame: &[u8]) {
        let mut sent = self.sent.lock().unwrap();
        *sent += 1;
        if self.drop_every != 0 && *sent % self.drop_every == 0 {
            info!("medium: dropped a {} byte frame", frame.len());
            return;
        }
        self.queue.lock().unwrap().push_back(frame.to_vec());
    }

    fn receive(&self) -> Option<Vec<u8>> {
        self.queue.lock().unwrap().pop_front()
    }
}

/// Transmit half handed to a service.
struct MediumTx(Arc<Medium>);

impl RadioTransport for MediumTx {
    type Error = ();

    fn send(&mut self, frame: &[u8]) -> Result<(), ()> {
        self.0.transmit(frame);
        Ok(())
    }
}

/// Receive-notification context: pulls datagrams off the medium and
/// publishes them into the consumer's one-slot mailbox.
fn spawn_rx_context(medium: Arc<Medium>, mailbox: Arc<RadioMailbox>, stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            if let Some(raw) = medium.receive() {
                let mut frame = FrameBuf::new();
                if frame.extend_from_slice(&raw).is_ok() {
                    mailbox.publish(frame);
                }
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    });
}

/// Serial sink that prints to stdout the way the gateway reads it.
struct StdoutSink;

impl LineSink for StdoutSink {
    fn line(&mut self, line: &str) {
        println!("{line}");
    }
}

// ── Main loop ────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();
    info!("fieldlink sim v{}", env!("CARGO_PKG_VERSION"));

    let cfg = LinkConfig {
        ack_timeout_ms: 60,
        jitter_max_ms: 20,
        active_pass_delay_ms: 10,
        idle_pass_delay_ms: 50,
        ..LinkConfig::default()
    };
    cfg.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    let vehicle = VehicleId::parse("AA100AA").expect("valid id");

    // Two half-duplex directions; drop every 4th frame node→post.
    let to_post = Arc::new(Medium::new(4));
    let to_node = Arc::new(Medium::new(0));

    let post_mailbox = Arc::new(RadioMailbox::new());
    let node_mailbox = Arc::new(RadioMailbox::new());
    let stop = Arc::new(AtomicBool::new(false));
    spawn_rx_context(to_post.clone(), post_mailbox.clone(), stop.clone());
    spawn_rx_context(to_node.clone(), node_mailbox.clone(), stop.clone());

    let mut station: Station<8> = Station::new(cfg.clone(), &TRANSPORT_KEY, 0xC0FF_EE01);
    let mut node = Node::new(
        cfg.clone(),
        vehicle.clone(),
        fieldlink::keystore::key_from_material(VEHICLE_KEY_TEXT.as_bytes())
            .map_err(|e| anyhow::anyhow!("{e}"))?,
        &TRANSPORT_KEY,
        0xBEEF_0002,
    );

    let mut post_radio = MediumTx(to_node.clone());
    let mut node_radio = MediumTx(to_post.clone());
    let mut sink = StdoutSink;

    // Gateway boot: inject the key binding, then queue one display-order
    // command for delivery.
    let serial_in = SerialQueue::new();
    for line in [
        format!("CFG:{vehicle}:{VEHICLE_KEY_TEXT}"),
        format!("ID:{vehicle};Ord:PLTH;"),
    ] {
        let mut l = SerialLine::new();
        l.push_str(&line)
            .map_err(|()| anyhow::anyhow!("serial line too long"))?;
        serial_in.push(l);
    }

    let started = Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;
    let mut next_report_ms = 0u64;
    let mut reports = 0u32;

    node.press_button();

    let mut confirmed = 0u16;
    while reports < 5 || node.is_reporting() {
        let now = now_ms();

        // Field node: periodic sampling tick.
        if now >= next_report_ms && !node.is_reporting() {
            let fields = format!("Geo:45.7{reports},4.8{reports};Res:Eau={};", 80 - reports);
            if node
                .submit_telemetry(&fields, "10:00:00", &mut node_radio, now)
                .is_ok()
            {
                reports += 1;
                next_report_ms = now + 300;
            }
        }
        if let Some(frame) = node_mailbox.take() {
            node.handle_frame(&frame, &mut node_radio, now);
        }
        node.poll(now, &mut node_radio);
        confirmed = node.record().outbound_seq;

        // Command post: serial first (never starved), then radio, then
        // the scheduling pass.
        station.drain_serial(&serial_in, &mut sink);
        station.drain_radio(&post_mailbox, &mut post_radio, &mut sink);
        let delay = station.poll(now, &mut post_radio, &mut sink);

        std::thread::sleep(Duration::from_millis(u64::from(delay.min(10))));
    }

    stop.store(true, Ordering::Relaxed);
    info!(
        "sim done: {confirmed} reports confirmed, display order now {}",
        node.display_order()
    );
    Ok(())
}
