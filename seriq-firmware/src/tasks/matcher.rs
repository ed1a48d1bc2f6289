//! Pattern dispatch task
//!
//! Runs the dispatch sweep on a fixed tick. Reply handlers execute here,
//! outside the receive interrupt.

use defmt::*;
use embassy_time::{Duration, Ticker};

use crate::SERIAL;

#[embassy_executor::task]
pub async fn match_task(poll_ms: u64) {
    info!("Match task started ({} ms)", poll_ms);

    let mut ticker = Ticker::every(Duration::from_millis(poll_ms));

    loop {
        ticker.next().await;
        SERIAL.check_match();
    }
}
