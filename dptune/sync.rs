//! Barrier & decision hand-off: a two-phase rendezvous that
//! gives the sample→decide→apply pipeline a strict per-tick
//! happens-before ordering without a parking primitive. Busy-wait is
//! intentional — tick interval is O(seconds), rendezvous skew is
//! O(microseconds).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct Barrier {
    active_threads: usize,
    sync_counter: AtomicUsize,
}

impl Barrier {
    pub fn new(active_threads: usize) -> Self {
        Self {
            active_threads,
            sync_counter: AtomicUsize::new(0),
        }
    }

    /// Called by every worker once its sample phase is done. Returns the
    /// arrival index (0-based) this call observed, which workers can use
    /// to decide if they are the one that completed the rendezvous.
    pub fn arrive(&self) -> usize {
        self.sync_counter.fetch_add(1, Ordering::AcqRel)
    }

    /// Called only by the primary worker: busy-waits until every enabled
    /// core has arrived this tick.
    pub fn wait_for_all_arrived(&self) {
        while self.sync_counter.load(Ordering::Acquire) < self.active_threads {
            std::hint::spin_loop();
        }
    }

    /// Same as [`Barrier::wait_for_all_arrived`], but also breaks out early
    /// once `quit` is set, so a peer that died mid-tick can't wedge the
    /// primary forever.
    pub fn wait_for_all_arrived_or_quit(&self, quit: &AtomicBool) {
        while self.sync_counter.load(Ordering::Acquire) < self.active_threads {
            if quit.load(Ordering::Acquire) {
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Called only by the primary worker, after running the tuner: resets
    /// the counter, which releases every module-lead waiting in
    /// [`Barrier::wait_for_release`].
    pub fn release(&self) {
        self.sync_counter.store(0, Ordering::Release);
    }

    /// Called by module-lead workers other than the primary: busy-waits
    /// until the primary calls [`Barrier::release`].
    pub fn wait_for_release(&self) {
        while self.sync_counter.load(Ordering::Acquire) != 0 {
            std::hint::spin_loop();
        }
    }

    /// Same as [`Barrier::wait_for_release`], but also breaks out early
    /// once `quit` is set, so a dead primary can't wedge module leads
    /// forever.
    pub fn wait_for_release_or_quit(&self, quit: &AtomicBool) {
        while self.sync_counter.load(Ordering::Acquire) != 0 {
            if quit.load(Ordering::Acquire) {
                return;
            }
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn all_arrivals_release_waiters() {
        let barrier = Arc::new(Barrier::new(4));
        let decided = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let b = Arc::clone(&barrier);
            let d = Arc::clone(&decided);
            handles.push(thread::spawn(move || {
                b.arrive();
                b.wait_for_release();
                assert!(d.load(Ordering::Acquire));
            }));
        }

        barrier.arrive();
        barrier.wait_for_all_arrived();
        decided.store(true, Ordering::Release);
        barrier.release();

        for h in handles {
            h.join().unwrap();
        }
    }
}
