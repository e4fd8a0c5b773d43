//! Simulated threads.
//!
//! A [`Thread`] owns a saved register file ([`ThreadContext`]) and a suspend counter
//! driving a small state machine:
//!
//! ```text
//!  Initialized --start--> Running --suspend--> Waiting --resume (count 0)--> Ready
//!       |                                                          |
//!       +------------- resume (count 0) --------------------------+
//!
//!  any state --terminate / wait--> Terminated   (final)
//! ```
//!
//! Nothing ever executes: a thread is bookkeeping that the kernel updates on behalf
//! of suspend, resume, terminate, wait and context calls.

mod context;

use log::debug;
use strum::Display;

pub use context::{
    ContextFlags, ThreadContext, DEFAULT_MXCSR, FLOAT_SAVE_SIZE, M128A, VECTOR_REGISTER_COUNT,
};

/// Exit code reported for a thread or process that has not terminated (`STILL_ACTIVE`).
pub const STILL_ACTIVE: u32 = 259;

/// Lifecycle state of a simulated thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum ThreadState {
    /// Created but never started.
    Initialized,
    /// Runnable after being resumed.
    Ready,
    /// Started and not suspended.
    Running,
    /// Suspended.
    Waiting,
    /// Terminated. Final.
    Terminated,
}

/// A simulated thread owned by a process.
#[derive(Clone, Debug)]
pub struct Thread {
    id: u32,
    owner: u32,
    state: ThreadState,
    suspend_count: u32,
    context: ThreadContext,
    exit_code: Option<u32>,
}

impl Thread {
    /// Creates an initialized, never-started thread.
    #[must_use]
    pub fn new(id: u32, owner: u32, context: ThreadContext) -> Self {
        Self {
            id,
            owner,
            state: ThreadState::Initialized,
            suspend_count: 0,
            context,
            exit_code: None,
        }
    }

    /// Returns the thread id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the id of the owning process.
    #[must_use]
    pub fn owner(&self) -> u32 {
        self.owner
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Returns the suspend counter.
    #[must_use]
    pub fn suspend_count(&self) -> u32 {
        self.suspend_count
    }

    /// Returns `true` once the thread has terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state == ThreadState::Terminated
    }

    /// Returns the exit code, or [`STILL_ACTIVE`] while the thread has not terminated.
    #[must_use]
    pub fn exit_code(&self) -> u32 {
        self.exit_code.unwrap_or(STILL_ACTIVE)
    }

    /// Returns the saved register file.
    #[must_use]
    pub fn context(&self) -> &ThreadContext {
        &self.context
    }

    /// Returns the saved register file for modification.
    pub fn context_mut(&mut self) -> &mut ThreadContext {
        &mut self.context
    }

    /// Moves an initialized thread to running. Other states are left alone.
    pub fn start(&mut self) {
        if self.state == ThreadState::Initialized {
            self.state = ThreadState::Running;
        }
    }

    /// Increments the suspend counter and returns its previous value.
    ///
    /// A running thread moves to waiting. Any other state, including
    /// terminated, keeps its state and only counts.
    pub fn suspend(&mut self) -> u32 {
        let previous = self.suspend_count;
        self.suspend_count = self.suspend_count.saturating_add(1);
        if self.state == ThreadState::Running {
            self.state = ThreadState::Waiting;
        }
        previous
    }

    /// Decrements the suspend counter (if positive) and returns the new value.
    ///
    /// When the counter reaches zero a non-terminated thread becomes ready.
    pub fn resume(&mut self) -> u32 {
        if self.suspend_count > 0 {
            self.suspend_count -= 1;
            if self.suspend_count == 0 && self.state != ThreadState::Terminated {
                self.state = ThreadState::Ready;
            }
        }
        self.suspend_count
    }

    /// Terminates the thread with `exit_code`.
    ///
    /// Returns `false` if the thread had already terminated; the first exit code stays.
    pub fn terminate(&mut self, exit_code: u32) -> bool {
        if self.is_terminated() {
            return false;
        }

        debug!("thread {} of process {} exited with {exit_code}", self.id, self.owner);
        self.state = ThreadState::Terminated;
        self.exit_code = Some(exit_code);
        true
    }

    /// Completes a wait on this thread.
    ///
    /// There is no scheduler to wait for, so the wait finishes the thread with exit code 0
    /// unless it already terminated.
    pub fn wait(&mut self) {
        self.terminate(0);
    }
}
