//! Background deletion of expired rows.
//!
//! Reads, lists and scans never delete inline. They hand expired keys to the
//! reaper, a single worker thread fed by a bounded queue. Jobs carry only the
//! namespace and key; the handle is looked up in the registry when the job
//! runs, so a namespace closed in the meantime is simply skipped.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Weak};
use std::thread;

use super::query;
use super::registry::Registry;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::namespace::Namespace;

/// A pending lazy deletion.
#[derive(Debug)]
struct Job {
    ns: Namespace,
    key: String,
}

/// Handle to the background deletion worker.
///
/// Dropping the last `Reaper` closes the queue and lets the worker exit.
#[derive(Debug, Clone)]
pub(crate) struct Reaper {
    tx: SyncSender<Job>,
}

impl Reaper {
    /// Starts the worker thread.
    pub(crate) fn spawn(
        registry: Weak<Registry>,
        clock: Arc<dyn Clock>,
        capacity: usize,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        thread::Builder::new()
            .name("kvlite-reaper".to_string())
            .spawn(move || run(&rx, &registry, clock.as_ref()))
            .map_err(|e| Error::io("spawning reaper thread", e))?;
        Ok(Self { tx })
    }

    /// Queues deletion of an expired key. Never blocks.
    ///
    /// A full queue drops the job; the key is queued again the next time a
    /// read observes it.
    pub(crate) fn schedule(&self, ns: &Namespace, key: String) {
        let job = Job {
            ns: ns.clone(),
            key,
        };
        match self.tx.try_send(job) {
            Ok(()) => {},
            Err(TrySendError::Full(job)) => {
                tracing::debug!(namespace = %job.ns, key = %job.key, "Reaper queue full, dropping job");
            },
            Err(TrySendError::Disconnected(job)) => {
                tracing::warn!(namespace = %job.ns, key = %job.key, "Reaper stopped, dropping job");
            },
        }
    }
}

fn run(rx: &Receiver<Job>, registry: &Weak<Registry>, clock: &dyn Clock) {
    while let Ok(job) = rx.recv() {
        let Some(registry) = registry.upgrade() else {
            break;
        };
        reap(&registry, clock, &job);
    }
    tracing::debug!("Reaper stopped");
}

fn reap(registry: &Registry, clock: &dyn Clock, job: &Job) {
    let Some(handle) = registry.get(&job.ns) else {
        tracing::debug!(namespace = %job.ns, key = %job.key, "Namespace closed, skipping expired key");
        return;
    };

    match query::delete_expired(&handle, &job.ns, &job.key, clock.now()) {
        Ok(true) => {
            tracing::debug!(namespace = %job.ns, key = %job.key, "Deleted expired key");
        },
        Ok(false) => {},
        Err(e) => {
            let err = Error::background_deletion(&job.ns, &job.key, e);
            tracing::warn!(error = %err, "Lazy deletion failed");
        },
    }
}
