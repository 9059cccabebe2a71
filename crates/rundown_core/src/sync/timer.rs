//! Timer collaborator contract.
//!
//! The core never computes remaining time; it only tells the timer to reload
//! its cached now/next snapshot.

use log::info;
use std::sync::Arc;

/// Receiver of resync requests.
pub trait TimerSync {
    /// Reloads the timer's cached snapshot for the running entry `now_id`.
    ///
    /// Called after the mutation committed and the service released its write
    /// gate; implementations may read or edit the rundown again.
    fn sync_loaded(&self, now_id: &str);
}

impl<T: TimerSync + ?Sized> TimerSync for Arc<T> {
    fn sync_loaded(&self, now_id: &str) {
        (**self).sync_loaded(now_id);
    }
}

/// Timer stand-in that only records resync requests in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTimer;

impl TimerSync for LogTimer {
    fn sync_loaded(&self, now_id: &str) {
        info!("event=timer_sync module=sync status=requested now_id={now_id}");
    }
}
