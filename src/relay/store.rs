//! Attempt storage and persistence.
//!
//! The orchestrator owns each attempt while it runs and publishes a copy here
//! after every transition; readers only ever see published snapshots.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use crate::relay::attempt::{RelayAttempt, RelayState};
use crate::relay::error::RelayError;
use crate::relay::request::{AttemptId, RelayRequest};

/// Result of admitting a request.
#[derive(Debug, Clone)]
pub enum Admission {
    /// No live attempt existed; the caller now owns this one and must drive it.
    New(RelayAttempt),
    /// An attempt with the same id is in flight or already succeeded.
    Existing(RelayAttempt),
}

/// Counts by coarse state, for health and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub in_flight: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A thread-safe map of attempt id to the latest published attempt.
#[derive(Debug, Clone, Default)]
pub struct AttemptStore {
    inner: Arc<DashMap<AttemptId, RelayAttempt>>,
    persistence_path: Option<String>,
}

impl AttemptStore {
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
        }
    }

    /// Load from file if it exists.
    ///
    /// Attempts that were still running when the file was written can never
    /// be resumed; they are closed with an `Interrupted` error.
    pub fn load_from_file(path: &str) -> std::io::Result<Self> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<AttemptId, RelayAttempt> = serde_json::from_reader(reader)?;

            let mut interrupted = 0usize;
            for (id, mut attempt) in map {
                if let Some(failed) = attempt.state.interrupted() {
                    let record = RelayError::Interrupted.to_record(attempt.state.phase());
                    if attempt.fail(failed, record).is_ok() {
                        interrupted += 1;
                    }
                }
                store.inner.insert(id, attempt);
            }
            tracing::info!(
                loaded = store.inner.len(),
                interrupted,
                "Loaded relay attempts from snapshot"
            );
        }
        Ok(store)
    }

    /// Write every attempt to the configured path, if any.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.persistence_path {
            let writer = BufWriter::new(File::create(path)?);
            let map: HashMap<AttemptId, RelayAttempt> = self
                .inner
                .iter()
                .map(|r| (*r.key(), r.value().clone()))
                .collect();
            serde_json::to_writer(writer, &map)?;
            tracing::info!(saved = map.len(), "Saved relay attempts to snapshot");
        }
        Ok(())
    }

    /// Atomically claim the attempt id for `request`.
    ///
    /// A failed attempt is replaced by a fresh one so that a corrected request
    /// can be relayed; anything else is returned untouched. The replacement
    /// keeps the hashes its predecessor sent.
    pub fn admit(&self, request: RelayRequest) -> Admission {
        let id = request.attempt_id();
        match self.inner.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().state.is_failure() {
                    let prior = entry.get();
                    let attempt = RelayAttempt::superseding(request, prior);
                    if !attempt.previous_tx_hashes.is_empty() {
                        tracing::warn!(
                            attempt_id = %id,
                            prior_state = %prior.state,
                            previous_tx_hashes = ?attempt.previous_tx_hashes,
                            "Replacing failed attempt that already sent transactions"
                        );
                    }
                    entry.insert(attempt.clone());
                    Admission::New(attempt)
                } else {
                    Admission::Existing(entry.get().clone())
                }
            }
            Entry::Vacant(entry) => {
                let attempt = RelayAttempt::new(request);
                entry.insert(attempt.clone());
                Admission::New(attempt)
            }
        }
    }

    /// Replace the stored copy with the owner's latest view.
    pub fn publish(&self, attempt: &RelayAttempt) {
        self.inner.insert(attempt.id, attempt.clone());
    }

    pub fn get(&self, id: &AttemptId) -> Option<RelayAttempt> {
        self.inner.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn summary(&self) -> StoreSummary {
        let mut summary = StoreSummary::default();
        for r in self.inner.iter() {
            match r.value().state {
                RelayState::TransferConfirmed => summary.succeeded += 1,
                s if s.is_terminal() => summary.failed += 1,
                _ => summary.in_flight += 1,
            }
        }
        summary
    }
}
