use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use crate::common::data::ExpectationSet;
use crate::server::handler::Error;

/// State shared between the background dispatch path and the test thread.
///
/// `dispatched` hands out expectation indexes; `completed` is the observable request count.
/// Both only ever grow.
pub(crate) struct ServerState {
    pub expectations: ExpectationSet,
    prefix_path: String,
    active: AtomicBool,
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    errors: Mutex<Vec<Arc<Error>>>,
}

impl ServerState {
    pub fn new(expectations: ExpectationSet, prefix_path: String) -> Self {
        Self {
            expectations,
            prefix_path,
            active: AtomicBool::new(true),
            dispatched: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Whether a request path falls under the configured prefix. The prefix always ends with
    /// `/`; the prefix without its trailing slash also matches.
    pub fn in_prefix(&self, path: &str) -> bool {
        path.starts_with(&self.prefix_path)
            || self.prefix_path.strip_suffix('/') == Some(path)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns `true` if this call switched the state from active to inactive.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    /// Reserves the expectation index for the next request in arrival order.
    pub fn claim_index(&self) -> usize {
        self.dispatched.fetch_add(1, Ordering::SeqCst)
    }

    pub fn complete(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn record(&self, error: Error) {
        tracing::warn!("recorded dispatch failure: {}", error);
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.push(Arc::new(error));
    }

    pub fn last_error(&self) -> Option<Arc<Error>> {
        let errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.last().cloned()
    }

    pub fn errors(&self) -> Vec<Arc<Error>> {
        let errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.clone()
    }
}
