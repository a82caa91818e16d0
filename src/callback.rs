//! User hooks invoked by the solver during long-running operations.
//!
//! Hooks are trait objects owned by the session; a hook implementation
//! carries whatever user context it needs, so no raw function pointers or
//! opaque handles flow through the solver's data structures. Plain closures
//! implement the single-method traits directly.

use crate::{E, Verbosity};

/// Polled at iteration boundaries; returning `true` cancels the solve with
/// status `UserAbort`, preserving the best incumbent.
pub trait AbortHook {
    fn abort(&mut self) -> bool;
}

impl<F: FnMut() -> bool> AbortHook for F {
    fn abort(&mut self) -> bool {
        self()
    }
}

/// Receives log lines at or below the session's verbosity.
pub trait LogHook {
    fn log(&mut self, verbosity: Verbosity, message: &str);
}

impl<F: FnMut(Verbosity, &str)> LogHook for F {
    fn log(&mut self, verbosity: Verbosity, message: &str) {
        self(verbosity, message)
    }
}

/// Solver progress events, delivered to [`MsgHook`] subject to its mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MsgEvent {
    /// Presolve finished; payload is the number of eliminated rows+columns.
    Presolve(usize),
    /// A simplex iteration completed.
    Iteration(usize),
    /// The basis was refactorized.
    Invert(usize),
    /// Phase 1 reached primal feasibility.
    LpFeasible(E),
    /// The LP relaxation reached optimality.
    LpOptimal(E),
    /// An LP solution matching the previous best was found.
    LpEqual(E),
    /// An improved LP solution was found.
    LpBetter(E),
    /// A first integer-feasible solution was found.
    MilpFeasible(E),
    /// An integer solution equal to the incumbent was found.
    MilpEqual(E),
    /// An improved integer solution was found.
    MilpBetter(E),
    /// The branch-and-bound strategy changed.
    MilpStrategy(usize),
    /// The branch-and-bound search proved optimality.
    MilpOptimal(E),
    /// Periodic performance report; payload is the node count.
    Performance(usize),
    /// Pseudo-cost initialization completed.
    InitPseudocost(usize),
}

/// Mask bits selecting which [`MsgEvent`]s a message hook receives.
pub mod msg_mask {
    pub const PRESOLVE: i64 = 1 << 0;
    pub const ITERATION: i64 = 1 << 1;
    pub const INVERT: i64 = 1 << 2;
    pub const LP_FEASIBLE: i64 = 1 << 3;
    pub const LP_OPTIMAL: i64 = 1 << 4;
    pub const LP_EQUAL: i64 = 1 << 5;
    pub const LP_BETTER: i64 = 1 << 6;
    pub const MILP_FEASIBLE: i64 = 1 << 7;
    pub const MILP_EQUAL: i64 = 1 << 8;
    pub const MILP_BETTER: i64 = 1 << 9;
    pub const MILP_STRATEGY: i64 = 1 << 10;
    pub const MILP_OPTIMAL: i64 = 1 << 11;
    pub const PERFORMANCE: i64 = 1 << 12;
    pub const INIT_PSEUDOCOST: i64 = 1 << 13;
    pub const ALL: i64 = (1 << 14) - 1;
}

impl MsgEvent {
    pub fn mask_bit(&self) -> i64 {
        match self {
            MsgEvent::Presolve(_) => msg_mask::PRESOLVE,
            MsgEvent::Iteration(_) => msg_mask::ITERATION,
            MsgEvent::Invert(_) => msg_mask::INVERT,
            MsgEvent::LpFeasible(_) => msg_mask::LP_FEASIBLE,
            MsgEvent::LpOptimal(_) => msg_mask::LP_OPTIMAL,
            MsgEvent::LpEqual(_) => msg_mask::LP_EQUAL,
            MsgEvent::LpBetter(_) => msg_mask::LP_BETTER,
            MsgEvent::MilpFeasible(_) => msg_mask::MILP_FEASIBLE,
            MsgEvent::MilpEqual(_) => msg_mask::MILP_EQUAL,
            MsgEvent::MilpBetter(_) => msg_mask::MILP_BETTER,
            MsgEvent::MilpStrategy(_) => msg_mask::MILP_STRATEGY,
            MsgEvent::MilpOptimal(_) => msg_mask::MILP_OPTIMAL,
            MsgEvent::Performance(_) => msg_mask::PERFORMANCE,
            MsgEvent::InitPseudocost(_) => msg_mask::INIT_PSEUDOCOST,
        }
    }
}

/// Receives masked progress events.
pub trait MsgHook {
    fn msg(&mut self, event: MsgEvent);
}

impl<F: FnMut(MsgEvent)> MsgHook for F {
    fn msg(&mut self, event: MsgEvent) {
        self(event)
    }
}

/// Compact description of an open branch-and-bound node, as shown to the
/// node selection hook.
#[derive(Debug, Clone, Copy)]
pub struct NodeSummary {
    pub id: usize,
    pub depth: usize,
    /// Relaxation bound in the user's sense.
    pub bound: E,
}

/// Chooses the next node to process; returning `None` falls back to the
/// configured rule.
pub trait NodeHook {
    fn select(&mut self, open: &[NodeSummary]) -> Option<usize>;
}

/// Branch direction override returned by [`BranchHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchChoice {
    Ceiling,
    Floor,
}

/// Overrides the branching direction for a candidate variable; returning
/// `None` falls back to the configured rule.
pub trait BranchHook {
    fn branch(&mut self, col: usize, fractional_value: E) -> Option<BranchChoice>;
}

/// The session's hook table. All event delivery goes through here so the
/// façade is the single mediator.
#[derive(Default)]
pub struct HookTable {
    pub abort: Option<Box<dyn AbortHook>>,
    pub log: Option<Box<dyn LogHook>>,
    pub msg: Option<Box<dyn MsgHook>>,
    pub msg_mask: i64,
    pub node: Option<Box<dyn NodeHook>>,
    pub branch: Option<Box<dyn BranchHook>>,
}

impl HookTable {
    pub fn should_abort(&mut self) -> bool {
        self.abort.as_mut().is_some_and(|h| h.abort())
    }

    pub fn emit_log(&mut self, session_level: Verbosity, level: Verbosity, message: &str) {
        if level <= session_level {
            if let Some(h) = self.log.as_mut() {
                h.log(level, message);
            }
        }
    }

    pub fn emit_msg(&mut self, event: MsgEvent) {
        if self.msg_mask & event.mask_bit() != 0 {
            if let Some(h) = self.msg.as_mut() {
                h.msg(event);
            }
        }
    }
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("abort", &self.abort.is_some())
            .field("log", &self.log.is_some())
            .field("msg", &self.msg.is_some())
            .field("msg_mask", &self.msg_mask)
            .field("node", &self.node.is_some())
            .field("branch", &self.branch.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn closures_are_hooks() {
        let mut calls = 0;
        let mut hook: Box<dyn AbortHook> = Box::new(move || {
            calls += 1;
            calls > 2
        });
        assert!(!hook.abort());
        assert!(!hook.abort());
        assert!(hook.abort());
    }

    #[test]
    fn msg_mask_filters_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut table = HookTable {
            msg: Some(Box::new(move |e: MsgEvent| sink.borrow_mut().push(e))),
            msg_mask: msg_mask::MILP_BETTER,
            ..Default::default()
        };
        table.emit_msg(MsgEvent::Iteration(1));
        table.emit_msg(MsgEvent::MilpBetter(5.0));
        assert_eq!(&*seen.borrow(), &[MsgEvent::MilpBetter(5.0)]);
    }

    #[test]
    fn log_respects_session_verbosity() {
        let lines = Rc::new(RefCell::new(0));
        let sink = lines.clone();
        let mut table = HookTable {
            log: Some(Box::new(move |_: Verbosity, _: &str| {
                *sink.borrow_mut() += 1
            })),
            ..Default::default()
        };
        table.emit_log(Verbosity::Important, Verbosity::Full, "hidden");
        table.emit_log(Verbosity::Important, Verbosity::Critical, "shown");
        assert_eq!(*lines.borrow(), 1);
    }
}
