use std::{thread, time::Duration};

use log::{error, info};

use crate::clock::{LocalTime, WallClock};

pub const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Anything earlier is the power-on default, not network time.
pub const MIN_SYNCHRONIZED_YEAR: i32 = 2000;
const PROGRESS_LOG_EVERY: u32 = 300;

pub fn is_synchronized(time: &LocalTime) -> bool {
    time.year >= MIN_SYNCHRONIZED_YEAR
}

/// Blocks until the clock reports a post-2000 date. There is no timeout.
pub fn wait_until_synchronized<C: WallClock + ?Sized>(
    clock: &C,
    poll_interval: Duration,
) -> LocalTime {
    let mut polls: u32 = 0;

    loop {
        match clock.now() {
            Ok(now) if is_synchronized(&now) => return now,
            Ok(_) => {}
            Err(err) => error!("clock read failed while waiting for sync: {err}"),
        }

        polls = polls.wrapping_add(1);
        if polls % PROGRESS_LOG_EVERY == 0 {
            info!("still waiting for network time ({polls} polls)");
        }

        thread::sleep(poll_interval);
    }
}
