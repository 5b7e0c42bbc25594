//! Listener chain observing every bulk execution.
//!
//! Listeners compose by wrapping: a [`RetryListener`] wraps an
//! [`ErrorCountingListener`] which wraps a [`LoggingListener`]. Each does its
//! own work, then forwards to the listener it wraps.
//!
//! `after_bulk` returns the operations to re-submit. The processor re-adds
//! them once the execution lock is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::BulkError;
use crate::operation::{BulkFailure, BulkOperation, BulkRequest, BulkResponse};

/// Hooks called around every transport invocation.
///
/// `execution_id` increases monotonically per transport call.
pub trait BulkListener<O: BulkOperation>: Send + Sync {
    /// Called before the request is handed to the transport.
    fn before_bulk(&self, execution_id: u64, request: &BulkRequest<O>);

    /// Called when the transport returned a response.
    ///
    /// Returns operations that should be added to the processor again.
    fn after_bulk(
        &self,
        execution_id: u64,
        request: &BulkRequest<O>,
        response: &BulkResponse,
    ) -> Vec<O>;

    /// Called when the transport failed for the whole request.
    fn after_bulk_error(&self, execution_id: u64, request: &BulkRequest<O>, error: &BulkError);

    /// Number of consecutive executions that reported failures.
    fn successive_errors(&self) -> u64 {
        0
    }
}

/// Logs every execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl<O: BulkOperation> BulkListener<O> for LoggingListener {
    fn before_bulk(&self, execution_id: u64, request: &BulkRequest<O>) {
        debug!(execution_id, actions = request.len(), "Going to execute bulk");
    }

    fn after_bulk(
        &self,
        execution_id: u64,
        request: &BulkRequest<O>,
        response: &BulkResponse,
    ) -> Vec<O> {
        debug!(execution_id, actions = request.len(), "Executed bulk");
        if response.has_failures() {
            warn!(
                execution_id,
                failed = response.failures().count(),
                "There was failures while executing bulk"
            );
            for item in response.failures() {
                if let Some(failure) = &item.failure {
                    debug!(
                        execution_id,
                        index = %item.index,
                        id = %item.id,
                        failure = %failure,
                        "Failed bulk item"
                    );
                }
            }
        }
        Vec::new()
    }

    fn after_bulk_error(&self, execution_id: u64, request: &BulkRequest<O>, error: &BulkError) {
        error!(
            execution_id,
            actions = request.len(),
            error = %error,
            "Error executing bulk"
        );
    }
}

/// Tracks how many executions in a row reported failures.
///
/// The counter is reset the moment a response without failures arrives,
/// so callers can throttle producers while errors persist.
#[derive(Debug)]
pub struct ErrorCountingListener<L> {
    inner: L,
    successive_errors: Arc<AtomicU64>,
}

impl<L> ErrorCountingListener<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            successive_errors: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared handle on the counter.
    pub fn counter(&self) -> Arc<AtomicU64> {
        self.successive_errors.clone()
    }
}

impl<O: BulkOperation, L: BulkListener<O>> BulkListener<O> for ErrorCountingListener<L> {
    fn before_bulk(&self, execution_id: u64, request: &BulkRequest<O>) {
        self.inner.before_bulk(execution_id, request);
    }

    fn after_bulk(
        &self,
        execution_id: u64,
        request: &BulkRequest<O>,
        response: &BulkResponse,
    ) -> Vec<O> {
        if response.has_failures() {
            let errors = self.successive_errors.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(execution_id, successive_errors = errors, "Bulk reported failures");
        } else {
            self.successive_errors.store(0, Ordering::SeqCst);
        }
        self.inner.after_bulk(execution_id, request, response)
    }

    fn after_bulk_error(&self, execution_id: u64, request: &BulkRequest<O>, error: &BulkError) {
        self.successive_errors.fetch_add(1, Ordering::SeqCst);
        self.inner.after_bulk_error(execution_id, request, error);
    }

    fn successive_errors(&self) -> u64 {
        self.successive_errors.load(Ordering::SeqCst)
    }
}

/// Decides which failures are worth retrying.
///
/// An entry matches a failure whose structured code equals it; failures
/// without a matching code fall back to substring search in the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    retryable: Vec<String>,
}

impl RetryPolicy {
    pub fn new(retryable: Vec<String>) -> Self {
        Self {
            retryable: retryable.into_iter().filter(|r| !r.is_empty()).collect(),
        }
    }

    pub fn is_retryable(&self, failure: &BulkFailure) -> bool {
        self.retryable.iter().any(|pattern| {
            failure.code.as_deref() == Some(pattern.as_str()) || failure.message.contains(pattern)
        })
    }
}

/// Re-submits individual failed operations that match a [`RetryPolicy`].
///
/// Non-matching failures are dropped: retrying them blindly would loop
/// forever on permanent errors such as malformed documents.
#[derive(Debug)]
pub struct RetryListener<L> {
    inner: L,
    policy: RetryPolicy,
}

impl<L> RetryListener<L> {
    pub fn new(inner: L, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<O: BulkOperation, L: BulkListener<O>> BulkListener<O> for RetryListener<L> {
    fn before_bulk(&self, execution_id: u64, request: &BulkRequest<O>) {
        self.inner.before_bulk(execution_id, request);
    }

    fn after_bulk(
        &self,
        execution_id: u64,
        request: &BulkRequest<O>,
        response: &BulkResponse,
    ) -> Vec<O> {
        let mut retries = Vec::new();

        for item in response.failures() {
            let Some(failure) = &item.failure else {
                continue;
            };
            if !self.policy.is_retryable(failure) {
                debug!(execution_id, id = %item.id, failure = %failure, "Failure is not retryable");
                continue;
            }
            match request.find(item) {
                Some(operation) => {
                    debug!(execution_id, index = %item.index, id = %item.id, "Retrying failed operation");
                    retries.push(operation.clone());
                }
                None => {
                    warn!(
                        execution_id,
                        index = %item.index,
                        id = %item.id,
                        "Can not find failed operation in the original request, dropping it"
                    );
                }
            }
        }

        retries.extend(self.inner.after_bulk(execution_id, request, response));
        retries
    }

    fn after_bulk_error(&self, execution_id: u64, request: &BulkRequest<O>, error: &BulkError) {
        self.inner.after_bulk_error(execution_id, request, error);
    }

    fn successive_errors(&self) -> u64 {
        self.inner.successive_errors()
    }
}

/// The standard chain: retry → error counting → logging.
pub fn default_listener(
    retryable: Vec<String>,
) -> RetryListener<ErrorCountingListener<LoggingListener>> {
    RetryListener::new(
        ErrorCountingListener::new(LoggingListener),
        RetryPolicy::new(retryable),
    )
}
