use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, warn};

/// Submission buffer depth for every scheduler unless overridden.
pub const SUBMISSION_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Complete,
}

/// A per-step unit of work polled against the scheduler's state.
pub type Task<S> = Box<dyn FnMut(&mut S) -> TaskStatus + Send>;

thread_local! {
    static POLLING: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside a scheduler's poll pass.
pub fn on_step_thread() -> bool {
    POLLING.with(Cell::get)
}

struct PollingGuard {
    previous: bool,
}

impl PollingGuard {
    fn enter() -> Self {
        let previous = POLLING.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for PollingGuard {
    fn drop(&mut self) {
        POLLING.with(|flag| flag.set(self.previous));
    }
}

/// Cooperative tick scheduler.
///
/// Submissions land in a bounded buffer and join the active list at the
/// start of the next [`Scheduler::step`]. Every active task is polled exactly
/// once per step, in submission order, and is dropped once it reports
/// [`TaskStatus::Complete`].
pub struct Scheduler<S: 'static> {
    receiver: Receiver<Task<S>>,
    submitter: Submitter<S>,
    active: Vec<Task<S>>,
    steps: u64,
}

impl<S: 'static> Scheduler<S> {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_capacity(label, SUBMISSION_CAPACITY)
    }

    pub fn with_capacity(label: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let label: String = label.into();
        Self {
            receiver,
            submitter: Submitter {
                label: Arc::from(label),
                sender,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            active: Vec::new(),
            steps: 0,
        }
    }

    pub fn submitter(&self) -> Submitter<S> {
        self.submitter.clone()
    }

    pub fn label(&self) -> &str {
        &self.submitter.label
    }

    pub fn step(&mut self, state: &mut S) {
        self.active.extend(self.receiver.try_iter());
        {
            let _polling = PollingGuard::enter();
            self.active
                .retain_mut(|task| task(state) == TaskStatus::Pending);
        }
        self.steps = self.steps.saturating_add(1);
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.receiver.len()
    }

    pub fn dropped_submissions(&self) -> u64 {
        self.submitter.dropped_submissions()
    }
}

/// Cloneable, thread-safe entry point into a [`Scheduler`].
pub struct Submitter<S: 'static> {
    label: Arc<str>,
    sender: Sender<Task<S>>,
    dropped: Arc<AtomicU64>,
}

impl<S: 'static> Clone for Submitter<S> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<S: 'static> Submitter<S> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking and lossy: a full buffer drops `task` without telling the caller.
    pub fn submit(&self, task: Task<S>) {
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(scheduler = %self.label, "task_submission_dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(scheduler = %self.label, "task_submission_after_shutdown");
            }
        }
    }

    /// Submits a poll body that nobody waits on. `Some` completes the task.
    pub fn spawn<R, F>(&self, mut poll: F)
    where
        F: FnMut(&mut S) -> Option<R> + Send + 'static,
    {
        self.submit(Box::new(move |state: &mut S| match poll(state) {
            Some(_) => TaskStatus::Complete,
            None => TaskStatus::Pending,
        }));
    }

    /// Submits `poll` and blocks the calling thread until it yields a value.
    ///
    /// The poll body runs on the step-polling thread, once per step. Its
    /// value is handed back over a single-slot rendezvous, so the stepping
    /// thread never waits on the caller.
    ///
    /// # Panics
    ///
    /// Panics when called from inside a poll pass: the step-polling thread
    /// would be waiting on itself.
    pub fn call<R, F>(&self, mut poll: F) -> R
    where
        R: Send + 'static,
        F: FnMut(&mut S) -> Option<R> + Send + 'static,
    {
        assert!(
            !on_step_thread(),
            "blocking script primitive on `{}` invoked from a step-polling thread; \
             run script bodies on their own thread",
            self.label
        );
        let (done_tx, done_rx) = crossbeam_channel::bounded::<R>(1);
        self.submit(Box::new(move |state: &mut S| match poll(state) {
            Some(value) => {
                let _ = done_tx.send(value);
                TaskStatus::Complete
            }
            None => TaskStatus::Pending,
        }));

        // A task rejected at submission takes its sender with it; nothing will
        // ever complete this rendezvous, so the caller stays parked.
        loop {
            match done_rx.recv() {
                Ok(value) => return value,
                Err(_) => thread::park(),
            }
        }
    }

    pub fn dropped_submissions(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
