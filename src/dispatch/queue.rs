//! Work queue between application threads and the UI thread

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::ActionPanic;

/// Boxed closure executed on the UI thread
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// How a work item ended, as seen by a waiting caller
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The action ran to completion
    Finished,
    /// The action panicked
    Panicked(ActionPanic),
    /// The item was dropped without running (display disposed)
    Cancelled,
}

#[derive(Debug)]
enum CompletionState {
    Pending,
    Done(Outcome),
}

/// Completion signal plus captured panic slot of one work item
#[derive(Debug)]
pub struct Completion {
    state: Mutex<CompletionState>,
    signal: Condvar,
}

impl Completion {
    fn new() -> Self {
        Self {
            state: Mutex::new(CompletionState::Pending),
            signal: Condvar::new(),
        }
    }

    fn finish(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        if matches!(*state, CompletionState::Pending) {
            *state = CompletionState::Done(outcome);
            self.signal.notify_all();
        }
    }

    /// Block until the item has finished, panicked or been cancelled
    pub fn wait(&self) -> Outcome {
        let mut state = self.state.lock();
        loop {
            if let CompletionState::Done(outcome) = &*state {
                return outcome.clone();
            }
            self.signal.wait(&mut state);
        }
    }
}

/// One queued unit of work
pub struct WorkItem {
    action: Option<Action>,
    completion: Option<Arc<Completion>>,
}

impl WorkItem {
    /// Fire-and-forget item; a panic is logged and swallowed
    pub fn detached<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Some(Box::new(action)),
            completion: None,
        }
    }

    /// Item whose end can be awaited through the returned completion
    pub fn awaited<F>(action: F) -> (Self, Arc<Completion>)
    where
        F: FnOnce() + Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let item = Self {
            action: Some(Box::new(action)),
            completion: Some(Arc::clone(&completion)),
        };
        (item, completion)
    }

    /// Whether a caller is blocked on this item
    pub fn is_awaited(&self) -> bool {
        self.completion.is_some()
    }

    /// Run the action, catching any panic
    ///
    /// Returns false if the action panicked.
    pub fn run(mut self) -> bool {
        let Some(action) = self.action.take() else {
            return true;
        };
        let completion = self.completion.take();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(()) => Outcome::Finished,
            Err(payload) => Outcome::Panicked(ActionPanic::from_payload(payload.as_ref())),
        };
        let ok = matches!(outcome, Outcome::Finished);

        match (completion, outcome) {
            (Some(completion), outcome) => completion.finish(outcome),
            (None, Outcome::Panicked(panic)) => {
                error!("async action panicked, continuing: {}", panic.message);
            }
            (None, _) => {}
        }
        ok
    }
}

impl Drop for WorkItem {
    fn drop(&mut self) {
        // Never ran: release whoever waits on it
        if let Some(completion) = self.completion.take() {
            completion.finish(Outcome::Cancelled);
        }
    }
}

/// Thread-safe FIFO of work items with blocking dequeue
///
/// Every successful push calls the wake hook so a UI thread parked in a
/// native wait notices the new work.
#[derive(Clone)]
pub struct DispatchQueue {
    tx: Sender<WorkItem>,
    rx: Receiver<WorkItem>,
    closed: Arc<Mutex<bool>>,
    waker: Arc<dyn Fn() + Send + Sync>,
}

impl DispatchQueue {
    /// Create a queue that calls `waker` after every push
    pub fn new<W>(waker: W) -> Self
    where
        W: Fn() + Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            closed: Arc::new(Mutex::new(false)),
            waker: Arc::new(waker),
        }
    }

    /// Enqueue an item; hands it back if the queue is closed
    #[allow(clippy::result_large_err)]
    pub fn push(&self, item: WorkItem) -> Result<(), WorkItem> {
        {
            let closed = self.closed.lock();
            if *closed {
                return Err(item);
            }
            // Both ends live in self, so the channel cannot be disconnected
            self.tx.send(item).map_err(|e| e.into_inner())?;
        }
        (self.waker)();
        Ok(())
    }

    /// Dequeue without blocking
    pub fn try_pop(&self) -> Option<WorkItem> {
        self.rx.try_recv().ok()
    }

    /// Items waiting to run
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Refuse further pushes and hand back whatever is still queued
    pub fn close(&self) -> Vec<WorkItem> {
        let mut closed = self.closed.lock();
        *closed = true;
        self.rx.try_iter().collect()
    }
}
