//! Bulk processor: buffering, size/interval flushing and graceful close.
//!
//! The current request is a single slot guarded by a mutex. A flush swaps a
//! fresh empty request into the slot and hands the old one to the transport
//! after releasing the slot lock, so producers keep adding while the network
//! call is in flight. Transport calls are serialised by a separate execution
//! lock: one in-flight request per processor.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::BulkError;
use crate::listener::BulkListener;
use crate::operation::{BulkOperation, BulkRequest};
use crate::transport::BulkTransport;

/// Configuration for a [`BulkProcessor`].
#[derive(Debug, Clone)]
pub struct BulkProcessorConfig {
    /// Flush as soon as this many operations are buffered
    pub bulk_actions: usize,
    /// Background flush period; `None` disables the timer
    pub flush_interval: Option<Duration>,
    /// How long `close()` waits for the timer task to stop
    pub close_timeout: Duration,
}

impl Default for BulkProcessorConfig {
    fn default() -> Self {
        Self {
            bulk_actions: 100,
            flush_interval: Some(Duration::from_secs(5)),
            close_timeout: Duration::from_secs(10),
        }
    }
}

impl BulkProcessorConfig {
    /// Set the size threshold (values below 1 are treated as 1).
    pub fn with_bulk_actions(mut self, bulk_actions: usize) -> Self {
        self.bulk_actions = bulk_actions.max(1);
        self
    }

    /// Enable the background flush timer.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Disable the background flush timer.
    pub fn without_flush_interval(mut self) -> Self {
        self.flush_interval = None;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

struct Inner<O: BulkOperation> {
    config: BulkProcessorConfig,
    transport: Arc<dyn BulkTransport<O>>,
    listener: Box<dyn BulkListener<O>>,
    current: Mutex<BulkRequest<O>>,
    execution: Mutex<()>,
    execution_id: AtomicU64,
    closed: AtomicBool,
}

impl<O: BulkOperation> Inner<O> {
    /// Append `operation`; returns the swapped-out request once it is full.
    ///
    /// The closed flag is checked under the slot lock, so nothing lands in
    /// the slot after `close()` drained it.
    async fn push(&self, operation: O) -> Result<Option<BulkRequest<O>>, BulkError> {
        let mut current = self.current.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(BulkError::Closed);
        }
        current.add(operation);
        if current.len() >= self.config.bulk_actions {
            Ok(Some(std::mem::take(&mut *current)))
        } else {
            Ok(None)
        }
    }

    /// Swap out the current request if it holds anything.
    async fn take_current(&self) -> Option<BulkRequest<O>> {
        let mut current = self.current.lock().await;
        if current.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut *current))
        }
    }

    /// Execute `request`, then re-add whatever the listeners asked to retry.
    async fn execute(&self, request: BulkRequest<O>) {
        let mut queue = VecDeque::from([request]);

        while let Some(request) = queue.pop_front() {
            let retries = self.execute_once(request).await;
            let mut dropped = 0usize;
            for operation in retries {
                match self.push(operation).await {
                    Ok(Some(full)) => queue.push_back(full),
                    Ok(None) => {}
                    Err(_) => dropped += 1,
                }
            }
            if dropped > 0 {
                warn!(
                    count = dropped,
                    "Bulk processor is closed, dropping operations to retry"
                );
            }
        }
    }

    async fn execute_once(&self, request: BulkRequest<O>) -> Vec<O> {
        let _execution = self.execution.lock().await;
        let execution_id = self.execution_id.fetch_add(1, Ordering::SeqCst) + 1;

        self.listener.before_bulk(execution_id, &request);
        match self.transport.bulk(&request).await {
            Ok(response) => self.listener.after_bulk(execution_id, &request, &response),
            Err(e) => {
                self.listener.after_bulk_error(execution_id, &request, &e);
                Vec::new()
            }
        }
    }
}

/// Accumulates operations and flushes them through a [`BulkTransport`].
///
/// When a flush interval is configured the processor spawns its timer task,
/// so it must be created inside a Tokio runtime.
pub struct BulkProcessor<O: BulkOperation> {
    inner: Arc<Inner<O>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
}

impl<O: BulkOperation> BulkProcessor<O> {
    pub fn new(
        config: BulkProcessorConfig,
        transport: Arc<dyn BulkTransport<O>>,
        listener: impl BulkListener<O> + 'static,
    ) -> Self {
        let config = BulkProcessorConfig {
            bulk_actions: config.bulk_actions.max(1),
            ..config
        };
        let flush_interval = config.flush_interval.filter(|d| !d.is_zero());

        let inner = Arc::new(Inner {
            config,
            transport,
            listener: Box::new(listener),
            current: Mutex::new(BulkRequest::new()),
            execution: Mutex::new(()),
            execution_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        let shutdown_token = CancellationToken::new();
        let flusher = flush_interval.map(|interval| {
            spawn_flusher(Arc::downgrade(&inner), interval, shutdown_token.clone())
        });

        debug!(
            bulk_actions = inner.config.bulk_actions,
            flush_interval_ms = flush_interval.map(|d| d.as_millis() as u64),
            "Bulk processor created"
        );

        Self {
            inner,
            flusher: Mutex::new(flusher),
            shutdown_token,
        }
    }

    /// Buffer `operation`, flushing immediately once the size threshold is reached.
    ///
    /// # Errors
    ///
    /// Returns `BulkError::Closed` after [`close`](Self::close).
    pub async fn add(&self, operation: O) -> Result<(), BulkError> {
        if let Some(full) = self.inner.push(operation).await? {
            self.inner.execute(full).await;
        }
        Ok(())
    }

    /// Execute the buffered operations now, whatever their number.
    pub async fn flush(&self) -> Result<(), BulkError> {
        self.ensure_open()?;
        if let Some(request) = self.inner.take_current().await {
            self.inner.execute(request).await;
        }
        Ok(())
    }

    /// Stop the timer, then execute the remaining operations once.
    ///
    /// Calling `close` again is a no-op.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown_token.cancel();

        if let Some(handle) = self.flusher.lock().await.take() {
            match tokio::time::timeout(self.inner.config.close_timeout, handle).await {
                Ok(Ok(())) => debug!("Flush timer stopped"),
                Ok(Err(e)) => warn!(error = %e, "Flush timer ended abnormally"),
                Err(_) => warn!(
                    timeout_ms = self.inner.config.close_timeout.as_millis() as u64,
                    "Flush timer did not stop in time"
                ),
            }
        }

        if let Some(request) = self.inner.take_current().await {
            info!(actions = request.len(), "Flushing remaining operations on close");
            self.inner.execute(request).await;
        }
        debug!("Bulk processor closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of buffered operations not yet handed to the transport.
    pub async fn pending(&self) -> usize {
        self.inner.current.lock().await.len()
    }

    /// Number of transport calls so far.
    pub fn execution_count(&self) -> u64 {
        self.inner.execution_id.load(Ordering::SeqCst)
    }

    /// Consecutive executions with failures, as tracked by the listener chain.
    pub fn successive_errors(&self) -> u64 {
        self.inner.listener.successive_errors()
    }

    fn ensure_open(&self) -> Result<(), BulkError> {
        if self.is_closed() {
            Err(BulkError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<O: BulkOperation> Drop for BulkProcessor<O> {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        if self.is_closed() {
            return;
        }
        let pending = self
            .inner
            .current
            .try_lock()
            .map(|current| current.len())
            .unwrap_or(0);
        if pending > 0 {
            warn!(
                actions = pending,
                "Bulk processor dropped without close, buffered operations are lost"
            );
        }
    }
}

/// The timer only holds a weak reference: dropping the processor releases
/// the transport even if the task has not observed the cancellation yet.
fn spawn_flusher<O: BulkOperation>(
    inner: Weak<Inner<O>>,
    interval: Duration,
    shutdown_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else {
                        break;
                    };
                    if inner.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Some(request) = inner.take_current().await {
                        debug!(actions = request.len(), "Scheduled flush");
                        inner.execute(request).await;
                    }
                }
            }
        }
    })
}
