//! Echo task
//!
//! Sends back every received byte. Polls instead of calling the blocking
//! receive so the executor keeps running other tasks.

use defmt::*;
use embassy_time::{Duration, Ticker};

use crate::SERIAL;

/// Poll interval in milliseconds
pub const ECHO_INTERVAL_MS: u64 = 2;

#[embassy_executor::task]
pub async fn echo_task() {
    info!("Echo task started");

    let mut ticker = Ticker::every(Duration::from_millis(ECHO_INTERVAL_MS));

    loop {
        ticker.next().await;

        while SERIAL.available() > 0 {
            let byte = SERIAL.recv_byte();
            SERIAL.send_byte(byte);
        }
    }
}
