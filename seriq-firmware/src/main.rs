//! Seriq - serial transport demo firmware
//!
//! Runs the buffered UART transport on an RP2040: prints a banner, can run a
//! receive self-check, answers configured input patterns with configured
//! replies, and optionally echoes everything it receives. All settings come
//! from serial.toml at build time.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::interrupt;
use embassy_rp::interrupt::InterruptExt;
use embassy_time::Timer;
use seriq_core::{IsrContext, MatchTable, Uart};
use seriq_hal_rp2040::UartPort;
use {defmt_rtt as _, panic_probe as _};

mod tasks;

/// Settings generated from serial.toml by build.rs
mod config {
    include!(concat!(env!("OUT_DIR"), "/serial_config.rs"));
}

/// Text a matched pattern answers with
type Reply = &'static [u8];

type Serial = Uart<
    UartPort,
    { config::RX_CAPACITY },
    { config::TX_CAPACITY },
    MatchTable<Reply, { config::MAX_PATTERNS }, { config::MAX_SEQ_LEN }>,
>;

/// The one serial transport, shared with the UART interrupt vector
pub static SERIAL: Serial = Uart::with_matching(UartPort::new(config::UART_ID));

const BANNER: &[u8] = b"seriq ready\0";

const RECV_OK: &[u8] = b"recv OK";
const RECV_ER: &[u8] = b"recv ER";

/// Longest self-check text; build.rs caps it at the RX capacity
const CHECK_LEN: usize = config::RX_CAPACITY;

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Seriq firmware starting...");

    // The configured UART and its pins are driven through the PAC from here
    // on; nothing else may claim them from the peripherals struct
    let _p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    if let Err(e) = SERIAL.port().power_up(config::TX_PIN, config::RX_PIN) {
        error!("UART pin setup rejected: {}", e);
        return;
    }
    SERIAL.setup(&config::LINE);

    let irq = config::UART_ID.interrupt();
    irq.unpend();
    // SAFETY: the vector only reaches SERIAL through an IsrContext, and both
    // UART vectors run at the same priority
    unsafe { irq.enable() };
    info!(
        "{} up at {} baud",
        config::UART_ID,
        config::LINE.effective_baudrate()
    );

    SERIAL.clear_screen();
    SERIAL.send_static(BANNER);
    SERIAL.newline();

    // Before echo and matching start, so the returning text is ours alone
    if let Some(text) = config::SELF_CHECK {
        self_check(text);
    }

    for &(pattern, reply) in config::REPLIES {
        match SERIAL.register_match(pattern, send_reply, reply) {
            Ok(()) => debug!("Watching for {=[u8]:a}", pattern),
            Err(e) => warn!("Pattern {=[u8]:a} not registered: {}", pattern, e),
        }
    }

    spawner
        .spawn(tasks::match_task(config::MATCH_POLL_MS))
        .unwrap();
    if config::ECHO {
        spawner.spawn(tasks::echo_task()).unwrap();
    }

    info!("All tasks spawned, firmware running");

    let mut reported = 0;
    loop {
        Timer::after_secs(60).await;
        let overruns = SERIAL.rx_overruns();
        if overruns != reported {
            warn!("RX overruns: {}", overruns);
            reported = overruns;
        }
        trace!("Main loop heartbeat");
    }
}

/// Send `text`, then check it comes back through peek and through recv
///
/// Needs TX looped back to RX, or a host echoing the text unchanged.
fn self_check(text: &[u8]) {
    info!("Self-check: waiting for {} bytes to return", text.len());
    SERIAL.send(text);

    let mut buf = [0u8; CHECK_LEN];
    let len = text.len().min(CHECK_LEN);
    let buf = &mut buf[..len];

    let peeked = SERIAL.peek(buf);
    let peek_ok = buf[..peeked] == text[..len];

    // Consume what was peeked, then read the first half of a repeat
    SERIAL.recv(buf);
    SERIAL.send(text);
    let half = &mut buf[..len / 2];
    SERIAL.recv(half);
    let recv_ok = *half == text[..len / 2];
    // Leave nothing of the repeat for echo or matching
    SERIAL.recv(&mut buf[len / 2..]);

    // Reported last: on a loopback wire the replies come back as input
    report_check("peek", peek_ok);
    report_check("recv", recv_ok);
}

fn report_check(stage: &str, ok: bool) {
    if ok {
        info!("Self-check {}: OK", stage);
        SERIAL.sendln(RECV_OK);
    } else {
        warn!("Self-check {}: mismatch", stage);
        SERIAL.sendln(RECV_ER);
    }
}

/// Match handler: answer with the reply registered alongside the pattern
fn send_reply(reply: Reply) {
    SERIAL.sendln(reply);
}

#[interrupt]
fn UART0_IRQ() {
    on_uart_interrupt();
}

#[interrupt]
fn UART1_IRQ() {
    on_uart_interrupt();
}

/// Route the pending UART events to the transport
fn on_uart_interrupt() {
    // SAFETY: only reached from the UART vectors, which never preempt each
    // other, and the context is dropped before returning
    let cx = unsafe { IsrContext::new() };
    let events = SERIAL.port().pending();
    if events.rx {
        SERIAL.on_rx_complete(&cx);
    }
    if events.tx {
        SERIAL.on_tx_ready(&cx);
    }
}
