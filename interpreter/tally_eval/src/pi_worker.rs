//! Background recomputation of pi, e and phi.
//!
//! Recomputing pi at a few thousand digits takes long enough that it
//! must not stall the prompt. A worker thread owns the series math and
//! publishes finished values in a snapshot cell; the evaluator reads
//! whatever snapshot is current, which may briefly lag a precision
//! change. `sync` blocks until the worker has caught up with the last
//! request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use bigdecimal::BigDecimal;
use parking_lot::{Condvar, Mutex};
use tally_num::{compute_e, compute_phi, compute_pi, MathContext};
use tracing::{debug, warn};

/// Published constants, tagged with the precision and request
/// generation they were computed for.
#[derive(Clone, Debug)]
pub struct ConstantsSnapshot {
    pub generation: u64,
    pub precision: u64,
    pub pi: BigDecimal,
    pub e: BigDecimal,
    pub phi: BigDecimal,
}

struct Shared {
    snapshot: Mutex<ConstantsSnapshot>,
    ready: Condvar,
    requested: AtomicU64,
}

pub struct ConstantsWorker {
    shared: Arc<Shared>,
    sender: Option<Sender<(u64, u64)>>,
    handle: Option<JoinHandle<()>>,
}

impl ConstantsWorker {
    /// Compute the initial snapshot synchronously, then hand further
    /// requests to the worker thread.
    pub fn start(precision: u64) -> Self {
        let snapshot = compute_snapshot(0, precision);
        let shared = Arc::new(Shared {
            snapshot: Mutex::new(snapshot),
            ready: Condvar::new(),
            requested: AtomicU64::new(0),
        });
        let (sender, receiver) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("tally-constants".into())
            .spawn(move || worker_loop(&worker_shared, &receiver));
        let handle = match handle {
            Ok(h) => Some(h),
            Err(err) => {
                // Degraded but functional: requests recompute inline.
                warn!(%err, "constants worker thread unavailable");
                None
            }
        };
        ConstantsWorker {
            shared,
            sender: Some(sender),
            handle,
        }
    }

    /// Ask for the constants at a new precision. Returns immediately;
    /// readers see the old snapshot until the worker finishes.
    pub fn request(&self, precision: u64) {
        let generation = self.shared.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let sent = self
            .sender
            .as_ref()
            .is_some_and(|s| s.send((generation, precision)).is_ok());
        if !sent || self.handle.is_none() {
            // No worker thread; compute on the caller's thread.
            let snapshot = compute_snapshot(generation, precision);
            *self.shared.snapshot.lock() = snapshot;
            self.shared.ready.notify_all();
        }
    }

    /// The current snapshot. Never blocks on computation; the values
    /// may be at a previous precision while the worker catches up.
    pub fn snapshot(&self) -> ConstantsSnapshot {
        self.shared.snapshot.lock().clone()
    }

    /// Block until every request issued so far has been published.
    pub fn sync(&self) -> ConstantsSnapshot {
        let target = self.shared.requested.load(Ordering::SeqCst);
        let mut guard = self.shared.snapshot.lock();
        while guard.generation < target {
            self.shared.ready.wait(&mut guard);
        }
        guard.clone()
    }
}

impl Drop for ConstantsWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: &Shared, receiver: &Receiver<(u64, u64)>) {
    while let Ok((mut generation, mut precision)) = receiver.recv() {
        // Coalesce a burst of precision changes to the latest one.
        while let Ok((g, p)) = receiver.try_recv() {
            generation = g;
            precision = p;
        }
        debug!(precision, "recomputing constants");
        let snapshot = compute_snapshot(generation, precision);
        *shared.snapshot.lock() = snapshot;
        shared.ready.notify_all();
    }
}

fn compute_snapshot(generation: u64, precision: u64) -> ConstantsSnapshot {
    let ctx = if precision == 0 {
        MathContext::DEFAULT
    } else {
        MathContext::with_precision(precision)
    };
    let pi = compute_pi(ctx);
    let e = compute_e(ctx);
    let phi = match compute_phi(ctx) {
        Ok(v) => v,
        Err(err) => {
            // dec_sqrt of five cannot fail; keep going if it ever does.
            warn!(%err, "phi computation failed");
            BigDecimal::from(0)
        }
    };
    ConstantsSnapshot {
        generation,
        precision,
        pi,
        e,
        phi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn initial_snapshot_is_ready_immediately() {
        let worker = ConstantsWorker::start(20);
        let snap = worker.snapshot();
        assert!(snap.pi.to_string().starts_with("3.14159265358979323846"));
        assert!(snap.e.to_string().starts_with("2.718281828459045235"));
    }

    #[test]
    fn precision_change_is_visible_after_sync() {
        let worker = ConstantsWorker::start(10);
        worker.request(40);
        let snap = worker.sync();
        assert_eq!(snap.precision, 40);
        assert!(snap.pi.to_string().len() > 35);
    }

    #[test]
    fn requests_coalesce_to_the_latest() {
        let worker = ConstantsWorker::start(10);
        for p in [15, 20, 25, 30] {
            worker.request(p);
        }
        let snap = worker.sync();
        assert_eq!(snap.precision, 30);
    }
}
