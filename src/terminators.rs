//! Terminators for controlling and interrupting long-running solves.
//!
//! The simplex and branch-and-bound drivers poll a [`Terminator`] at
//! iteration boundaries, the only points where a solve may stop early.
//! Implementations include:
//! - [`InterruptTerminator`]: responds to Ctrl-C (SIGINT) or programmatic
//!   interrupts.
//! - [`TimeOutTerminator`]: stops after a wall-clock limit.
//! - [`IterationTerminator`]: stops after an iteration budget.
//! - [`MultipleTerminators`]: combines several terminators.
//!
//! # Note
//! [`InterruptTerminator`] installs a global signal handler and can only be
//! constructed once per process; creating a second one panics.

use std::sync::{Arc, atomic::AtomicBool};

use crate::Status;

pub trait Terminator {
    /// Called once when a solve starts.
    fn initialize(&mut self) {}

    /// Returns the terminal status to stop with, or `None` to continue.
    fn terminate(&mut self) -> Option<Status>;
}

/// Never terminates. Used when no limits are configured.
#[derive(Debug, Default)]
pub struct NoOpTerminator;

impl Terminator for NoOpTerminator {
    fn terminate(&mut self) -> Option<Status> {
        None
    }
}

/// Terminator that responds to Ctrl-C (SIGINT) or programmatic interrupts.
pub struct InterruptTerminator {
    interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let interrupted_clone = interrupted.clone();
            move || {
                interrupted_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .expect("Error setting Ctrl-C handler");
        Self { interrupted }
    }

    pub fn interrupt(&mut self) {
        self.interrupted
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Terminator for InterruptTerminator {
    fn terminate(&mut self) -> Option<Status> {
        if self.interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            Some(Status::UserAbort)
        } else {
            None
        }
    }
}

/// Terminator that triggers after a wall-clock limit in seconds.
#[derive(Debug)]
pub struct TimeOutTerminator {
    max_secs: f64,
    start_time: std::time::Instant,
}

impl TimeOutTerminator {
    pub fn new(max_secs: f64) -> Self {
        Self {
            max_secs,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Terminator for TimeOutTerminator {
    fn initialize(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    fn terminate(&mut self) -> Option<Status> {
        if self.max_secs > 0.0 && self.elapsed() >= self.max_secs {
            Some(Status::Timeout)
        } else {
            None
        }
    }
}

/// Terminator that triggers after a fixed number of polls.
#[derive(Debug)]
pub struct IterationTerminator {
    budget: usize,
    used: usize,
}

impl IterationTerminator {
    pub fn new(budget: usize) -> Self {
        Self { budget, used: 0 }
    }
}

impl Terminator for IterationTerminator {
    fn initialize(&mut self) {
        self.used = 0;
    }

    fn terminate(&mut self) -> Option<Status> {
        self.used += 1;
        if self.budget > 0 && self.used > self.budget {
            Some(Status::Suboptimal)
        } else {
            None
        }
    }
}

/// Terminator that combines multiple terminators and triggers if any of
/// them do.
pub struct MultipleTerminators {
    terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
    pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
        Self { terminators }
    }

    pub fn push(&mut self, t: Box<dyn Terminator>) {
        self.terminators.push(t);
    }
}

impl Terminator for MultipleTerminators {
    fn initialize(&mut self) {
        for terminator in &mut self.terminators {
            terminator.initialize();
        }
    }

    fn terminate(&mut self) -> Option<Status> {
        for terminator in &mut self.terminators {
            if let Some(status) = terminator.as_mut().terminate() {
                return Some(status);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_fires_after_limit() {
        let mut t = TimeOutTerminator::new(0.01);
        t.initialize();
        assert_eq!(t.terminate(), None);
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(t.terminate(), Some(Status::Timeout));
    }

    #[test]
    fn zero_timeout_never_fires() {
        let mut t = TimeOutTerminator::new(0.0);
        t.initialize();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(t.terminate(), None);
    }

    #[test]
    fn iteration_budget() {
        let mut t = IterationTerminator::new(3);
        t.initialize();
        assert_eq!(t.terminate(), None);
        assert_eq!(t.terminate(), None);
        assert_eq!(t.terminate(), None);
        assert_eq!(t.terminate(), Some(Status::Suboptimal));
    }

    #[test]
    fn multiple_reports_first_trigger() {
        let mut t = MultipleTerminators::new(vec![
            Box::new(NoOpTerminator),
            Box::new(IterationTerminator::new(1)),
        ]);
        t.initialize();
        assert_eq!(t.terminate(), None);
        assert_eq!(t.terminate(), Some(Status::Suboptimal));
    }

    #[cfg(unix)]
    mod platform {
        pub fn send_sigint() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = std::process::id() as i32;
            signal::kill(Pid::from_raw(pid), Signal::SIGINT).expect("Failed to send SIGINT");
        }
    }

    #[test]
    #[ignore = "installs a process-global SIGINT handler"]
    #[cfg(unix)]
    fn interrupt_terminator_ctrlc() {
        let mut terminator = InterruptTerminator::new();

        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(100));
            platform::send_sigint();
        });

        loop {
            if let Some(status) = terminator.terminate() {
                assert_eq!(status, Status::UserAbort);
                break;
            }
        }
    }
}
