//! The proactive-renewal timer slot.
//!
//! Holds at most one armed timer task. Each arm gets a fresh generation
//! number; when a timer fires it claims the slot with its own generation,
//! so a timer that was superseded (but raced past `abort`) knows to stand
//! down instead of renewing against a token it no longer tracks.

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct RenewalTimer {
    armed: Option<(u64, JoinHandle<()>)>,
    generation: u64,
}

impl RenewalTimer {
    /// Reserves the generation number for the next timer.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Installs a freshly spawned timer, aborting any previous one.
    pub(crate) fn arm(&mut self, generation: u64, handle: JoinHandle<()>) {
        self.cancel();
        self.armed = Some((generation, handle));
    }

    /// Aborts the armed timer. Returns `true` if there was one.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some((generation, handle)) => {
                handle.abort();
                debug!(generation, "renewal timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Called by a firing timer. Empties the slot without aborting (the
    /// caller *is* that task) and returns `true` if `generation` is still
    /// the armed one.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some((armed, _)) if *armed == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.as_ref().is_some_and(|(_, handle)| !handle.is_finished())
    }
}
