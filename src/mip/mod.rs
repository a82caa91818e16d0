//! Branch and bound: repeatedly solves LP relaxations with tightened
//! bounds, branching on fractional integers, semi-continuous band
//! violations, and violated SOS sets, with pseudo-cost driven variable
//! selection, reduced-cost fixing, and incumbent management.
//!
//! Everything here works in the engine's internal maximization sense; the
//! session flips signs at its boundary.

pub mod node;
pub mod pseudocost;

use crate::callback::{BranchChoice, HookTable, MsgEvent, NodeSummary};
use crate::mip::node::{BoundDelta, Node, NodePool, SelectOrder};
use crate::mip::pseudocost::PseudoCosts;
use crate::model::BranchDir;
use crate::params::{Params, floor_first};
use crate::simplex::{LpInstance, Simplex, SimplexResult};
use crate::terminators::Terminator;
use crate::{E, I, SolverError, Status, is_infinite};

/// Branching-variable rule and strategy bits for the `bb_rule` parameter.
pub mod node_rule {
    /// Lowest indexed violated variable.
    pub const FIRST_SELECT: i64 = 0;
    /// Largest room between the relaxation value and its nearest bound.
    pub const GAP_SELECT: i64 = 1;
    /// Largest bound range.
    pub const RANGE_SELECT: i64 = 2;
    /// Most fractional relaxation value.
    pub const FRACTION_SELECT: i64 = 3;
    /// Pseudo-cost product score.
    pub const PSEUDO_COST_SELECT: i64 = 4;
    /// Pseudo-cost score favoring uninitialized variables.
    pub const PSEUDO_NONINT_SELECT: i64 = 5;
    /// Pseudo-cost direction-asymmetry score.
    pub const PSEUDO_RATIO_SELECT: i64 = 6;
    /// Defer to the user branch hook, first-index otherwise.
    pub const USER_SELECT: i64 = 7;
    pub const RULE_MASK: i64 = 7;

    /// Flip the preferred child order.
    pub const REVERSE: i64 = 1 << 4;
    /// Greedy best-bound node selection.
    pub const GREEDY: i64 = 1 << 5;
    /// Dive: newest node first (the default order).
    pub const DEPTH_FIRST: i64 = 1 << 6;
    /// Random tie-breaking between equal scores.
    pub const RANDOM: i64 = 1 << 7;
    /// Re-prune and restart from the best open nodes after an improvement.
    pub const RESTART: i64 = 1 << 8;
    /// Oldest node first.
    pub const BREADTH_FIRST: i64 = 1 << 9;
    /// Exploit generalized-upper-bound structure in tie-breaking.
    pub const GUB: i64 = 1 << 10;
    /// Order candidates by declared priority automatically.
    pub const AUTO_ORDER: i64 = 1 << 11;
    /// Reduced-cost fixing at every node.
    pub const RCOST_FIXING: i64 = 1 << 12;
    /// Strong-branching initialization of pseudo-costs at the root.
    pub const STRONG_INIT: i64 = 1 << 13;
    /// Switch to pseudo-cost selection when progress stalls.
    pub const DYNAMIC: i64 = 1 << 14;
}

/// An SOS set in solve-space indices.
#[derive(Debug, Clone)]
pub struct SosBranchSet {
    pub type2: bool,
    pub priority: i32,
    /// `(column, weight)` ordered by ascending weight.
    pub members: Vec<(I, E)>,
}

/// A linking structure in solve-space indices.
#[derive(Debug, Clone)]
pub struct LinkBranch {
    pub int_var: I,
    pub offset: i64,
    /// Binary copy per domain value, when materialized.
    pub binaries: Vec<Option<I>>,
}

/// Discrete structure of the instance being solved.
#[derive(Debug, Clone, Default)]
pub struct MipMeta {
    /// Integrality flag per structural column.
    pub int_var: Vec<bool>,
    /// Semi-continuous band edge per structural column.
    pub sc_lower: Vec<Option<E>>,
    pub branch_dir: Vec<BranchDir>,
    pub priority: Vec<i32>,
    pub sos: Vec<SosBranchSet>,
    pub linking: Vec<LinkBranch>,
    /// Columns appearing in generalized-upper-bound rows.
    pub gub_var: Vec<bool>,
}

impl MipMeta {
    pub fn has_discrete(&self) -> bool {
        self.int_var.iter().any(|&b| b)
            || self.sc_lower.iter().any(|s| s.is_some())
            || !self.sos.is_empty()
            || !self.linking.is_empty()
    }
}

/// Options consumed by the driver, extracted from [`Params`].
#[derive(Debug, Clone)]
pub struct MipOptions {
    pub bb_rule: i64,
    pub floor_first: i64,
    pub depth_limit: i64,
    pub mip_gap_abs: E,
    pub mip_gap_rel: E,
    pub eps_int: E,
    pub eps_b: E,
    pub break_at_first: bool,
    /// Internal-sense break value; NaN disables.
    pub break_at_value: E,
    /// Internal-sense initial cutoff; NaN disables.
    pub initial_cutoff: E,
}

impl MipOptions {
    pub fn from_params(params: &Params, sense_sign: E) -> Self {
        Self {
            bb_rule: params.bb_rule,
            floor_first: params.bb_floorfirst,
            depth_limit: params.bb_depthlimit,
            mip_gap_abs: params.mip_gap_abs,
            mip_gap_rel: params.mip_gap_rel,
            eps_int: params.eps_int,
            eps_b: params.eps_b,
            break_at_first: params.break_at_first,
            break_at_value: params.break_at_value * sense_sign,
            initial_cutoff: if params.obj_bound.is_finite() {
                params.obj_bound * sense_sign
            } else {
                E::NAN
            },
        }
    }
}

/// Result of a branch-and-bound run (internal maximization sense).
#[derive(Debug, Clone)]
pub struct MipResult {
    pub status: Status,
    /// Incumbent values over all `n + m` variables, when one exists.
    pub x: Option<Vec<E>>,
    pub obj: E,
    /// Duals of the incumbent's relaxation.
    pub y: Vec<E>,
    /// Reduced costs of the incumbent's relaxation.
    pub d: Vec<E>,
    pub total_nodes: usize,
    pub total_iter: usize,
    pub max_level: usize,
    pub improved: usize,
}

/// What the current relaxation still violates.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Violation {
    Fractional { var: I, value: E },
    ScGap { var: I, value: E },
    Sos { set: usize },
}

/// The branch-and-bound driver.
pub struct BranchAndBound {
    opts: MipOptions,
    pool: NodePool,
    pseudo: PseudoCosts,
    incumbent: Option<(Vec<E>, E, Vec<E>, Vec<E>)>,
    cutoff: E,
    cutoff_is_artificial: bool,
    truncated: bool,
    total_iter: usize,
    max_level: usize,
    improved: usize,
    nodes_since_improve: usize,
    dynamic_pseudo: bool,
}

impl BranchAndBound {
    pub fn new(opts: MipOptions, n_structural: usize) -> Self {
        let cutoff = opts.initial_cutoff;
        Self {
            opts,
            pool: NodePool::new(),
            pseudo: PseudoCosts::new(n_structural),
            incumbent: None,
            cutoff: if cutoff.is_nan() { -E::INFINITY } else { cutoff },
            cutoff_is_artificial: !cutoff.is_nan(),
            truncated: false,
            total_iter: 0,
            max_level: 0,
            improved: 0,
            nodes_since_improve: 0,
            dynamic_pseudo: false,
        }
    }

    fn select_order(&self) -> SelectOrder {
        if self.opts.bb_rule & node_rule::BREADTH_FIRST != 0 {
            SelectOrder::BreadthFirst
        } else if self.opts.bb_rule & node_rule::GREEDY != 0 {
            SelectOrder::BestBound
        } else {
            SelectOrder::DepthFirst
        }
    }

    fn depth_limit(&self, lp: &LpInstance) -> usize {
        match self.opts.depth_limit {
            0 => usize::MAX,
            d if d > 0 => d as usize,
            d => {
                let rel = (-d) as usize;
                rel * ((lp.total() as f64).sqrt().ceil() as usize).max(1)
            }
        }
    }

    /// Gap-aware pruning threshold over the current cutoff.
    fn prune_bound(&self) -> E {
        if self.cutoff == -E::INFINITY {
            -E::INFINITY
        } else {
            self.cutoff + self.opts.mip_gap_abs.max(self.cutoff.abs() * self.opts.mip_gap_rel)
        }
    }

    /// Collects everything the relaxation still violates.
    fn violations(&self, meta: &MipMeta, x: &[E]) -> Vec<Violation> {
        let mut out = Vec::new();
        for (j, &is_int) in meta.int_var.iter().enumerate() {
            if is_int {
                let frac = x[j] - x[j].floor();
                if frac > self.opts.eps_int && frac < 1.0 - self.opts.eps_int {
                    out.push(Violation::Fractional { var: j, value: x[j] });
                }
            }
            if let Some(edge) = meta.sc_lower[j] {
                if x[j] > self.opts.eps_b && x[j] < edge - self.opts.eps_b {
                    out.push(Violation::ScGap { var: j, value: x[j] });
                }
            }
        }
        for (s, set) in meta.sos.iter().enumerate() {
            let nonzero: Vec<usize> = set
                .members
                .iter()
                .enumerate()
                .filter(|&(_, &(j, _))| x[j].abs() > self.opts.eps_b)
                .map(|(pos, _)| pos)
                .collect();
            let violated = if set.type2 {
                nonzero.len() > 2
                    || (nonzero.len() == 2 && nonzero[1] != nonzero[0] + 1)
            } else {
                nonzero.len() > 1
            };
            if violated {
                out.push(Violation::Sos { set: s });
            }
        }
        out
    }

    /// Scores a violated variable for the configured rule; larger wins.
    fn variable_score(
        &self,
        rule: i64,
        j: usize,
        value: E,
        lb: E,
        ub: E,
    ) -> E {
        let frac = value - value.floor();
        let frac_dist = frac.min(1.0 - frac);
        match rule {
            node_rule::GAP_SELECT => {
                let room_down = if is_infinite(lb) { E::INFINITY } else { value - lb };
                let room_up = if is_infinite(ub) { E::INFINITY } else { ub - value };
                room_down.min(room_up)
            }
            node_rule::RANGE_SELECT => {
                if is_infinite(lb) || is_infinite(ub) {
                    E::INFINITY
                } else {
                    ub - lb
                }
            }
            node_rule::FRACTION_SELECT => frac_dist,
            node_rule::PSEUDO_COST_SELECT => self.pseudo.score(j, frac),
            node_rule::PSEUDO_NONINT_SELECT => self.pseudo.noninit_score(j, frac),
            node_rule::PSEUDO_RATIO_SELECT => self.pseudo.ratio_score(j, frac),
            // First-index and user-select: scan order decides.
            _ => 1.0 / (j as E + 2.0),
        }
    }

    /// Picks the branching object: violated SOS sets first by priority,
    /// then variables by the configured rule, ties by priority then index.
    fn pick_branch(
        &mut self,
        meta: &MipMeta,
        violations: &[Violation],
        lb: &[E],
        ub: &[E],
        rng_tick: &mut u64,
    ) -> Violation {
        if let Some(sos) = violations
            .iter()
            .filter_map(|v| match v {
                Violation::Sos { set } => Some(*set),
                _ => None,
            })
            .max_by_key(|&s| meta.sos[s].priority)
        {
            return Violation::Sos { set: sos };
        }

        let mut rule = self.opts.bb_rule & node_rule::RULE_MASK;
        if self.dynamic_pseudo {
            rule = node_rule::PSEUDO_COST_SELECT;
        }
        let mut best: Option<(Violation, E, i32)> = None;
        for v in violations {
            let (j, value) = match *v {
                Violation::Fractional { var, value } | Violation::ScGap { var, value } => {
                    (var, value)
                }
                Violation::Sos { .. } => continue,
            };
            let mut score = self.variable_score(rule, j, value, lb[j], ub[j]);
            if self.opts.bb_rule & node_rule::GUB != 0 && meta.gub_var.get(j) == Some(&true) {
                score *= 2.0;
            }
            if self.opts.bb_rule & node_rule::RANDOM != 0 {
                // Cheap deterministic jitter; the session seed feeds the
                // simplex, node ordering stays reproducible.
                *rng_tick = rng_tick.wrapping_mul(6364136223846793005).wrapping_add(1);
                score *= 1.0 + ((*rng_tick >> 60) as E) * 1e-3;
            }
            let prio = meta.priority.get(j).copied().unwrap_or(0);
            let better = match &best {
                None => true,
                Some((_, bs, bp)) => {
                    let auto = self.opts.bb_rule & node_rule::AUTO_ORDER != 0;
                    if auto && prio != *bp {
                        prio > *bp
                    } else {
                        score > *bs
                    }
                }
            };
            if better {
                best = Some((*v, score, prio));
            }
        }
        best.map(|(v, _, _)| v).unwrap_or(violations[0])
    }

    /// Child order for an integer branch: `true` puts the ceiling child
    /// first.
    fn ceiling_first(
        &self,
        meta: &MipMeta,
        hooks: &mut HookTable,
        j: usize,
        value: E,
    ) -> bool {
        if let Some(hook) = hooks.branch.as_mut() {
            if let Some(choice) = hook.branch(j, value) {
                return choice == BranchChoice::Ceiling;
            }
        }
        let mut ceiling = match meta.branch_dir.get(j).copied().unwrap_or_default() {
            BranchDir::Ceiling => true,
            BranchDir::Floor => false,
            BranchDir::Auto => value - value.floor() > 0.5,
            BranchDir::Default => match self.opts.floor_first {
                floor_first::FLOOR => false,
                floor_first::AUTOMATIC => value - value.floor() > 0.5,
                _ => true,
            },
        };
        if self.opts.bb_rule & node_rule::REVERSE != 0 {
            ceiling = !ceiling;
        }
        ceiling
    }

    /// Reduced-cost fixing: with an incumbent at hand, nonbasic integer
    /// variables whose reduced cost already pays the whole gap can be
    /// nailed to their bound for the subtree.
    fn reduced_cost_deltas(
        &self,
        meta: &MipMeta,
        res: &SimplexResult,
        lb: &[E],
        ub: &[E],
    ) -> Vec<BoundDelta> {
        let mut out = Vec::new();
        if self.cutoff == -E::INFINITY {
            return out;
        }
        let slack_gap = res.obj - self.cutoff;
        if slack_gap <= 0.0 {
            return out;
        }
        for (j, &is_int) in meta.int_var.iter().enumerate() {
            if !is_int || is_infinite(lb[j]) || is_infinite(ub[j]) || lb[j] == ub[j] {
                continue;
            }
            let d = res.d[j];
            if d.abs() < 1e-12 {
                continue;
            }
            let allowed = (slack_gap / d.abs() + self.opts.eps_int).floor();
            let width = ub[j] - lb[j];
            if allowed < width {
                if d < 0.0 && (res.x[j] - lb[j]).abs() <= self.opts.eps_int {
                    out.push(BoundDelta {
                        var: j,
                        lb: lb[j],
                        ub: lb[j] + allowed,
                    });
                } else if d > 0.0 && (res.x[j] - ub[j]).abs() <= self.opts.eps_int {
                    out.push(BoundDelta {
                        var: j,
                        lb: ub[j] - allowed,
                        ub: ub[j],
                    });
                }
            }
        }
        out
    }

    /// Builds the two children of a branching decision.
    #[allow(clippy::too_many_arguments)]
    fn branch(
        &mut self,
        meta: &MipMeta,
        hooks: &mut HookTable,
        parent: usize,
        depth: usize,
        decision: Violation,
        bound: E,
        snapshot: crate::simplex::BasisSnapshot,
        x: &[E],
        lb: &[E],
        ub: &[E],
        extra: &[BoundDelta],
    ) {
        let mk = |deltas: Vec<BoundDelta>, var: Option<I>, up: bool, dist: E| Node {
            parent: Some(parent),
            depth: depth + 1,
            deltas,
            bound,
            snapshot: Some(snapshot.clone()),
            branch_var: var,
            branch_up: up,
            frac_dist: dist,
        };
        let with_extra = |mut deltas: Vec<BoundDelta>| {
            deltas.extend_from_slice(extra);
            deltas
        };

        match decision {
            Violation::Fractional { var, value } => {
                let frac = value - value.floor();
                let mut floor_child = mk(
                    with_extra(vec![BoundDelta {
                        var,
                        lb: lb[var],
                        ub: value.floor(),
                    }]),
                    Some(var),
                    false,
                    frac,
                );
                let mut ceil_child = mk(
                    with_extra(vec![BoundDelta {
                        var,
                        lb: value.ceil(),
                        ub: ub[var],
                    }]),
                    Some(var),
                    true,
                    1.0 - frac,
                );
                // Linking sets tie the integer's window to its binary
                // copies in both directions.
                for link in &meta.linking {
                    if link.int_var != var {
                        continue;
                    }
                    Self::link_fixings(link, &mut floor_child.deltas);
                    Self::link_fixings(link, &mut ceil_child.deltas);
                }
                // Depth-first pops the last push: push the preferred child
                // last.
                if self.ceiling_first(meta, hooks, var, value) {
                    self.pool.push(floor_child);
                    self.pool.push(ceil_child);
                } else {
                    self.pool.push(ceil_child);
                    self.pool.push(floor_child);
                }
            }
            Violation::ScGap { var, value } => {
                // Off branch: pin to zero. On branch: enter the band.
                let off = mk(
                    with_extra(vec![BoundDelta {
                        var,
                        lb: lb[var].min(0.0),
                        ub: 0.0,
                    }]),
                    Some(var),
                    false,
                    value.max(self.opts.eps_int),
                );
                let edge = meta.sc_lower[var].unwrap_or(0.0);
                let on = mk(
                    with_extra(vec![BoundDelta {
                        var,
                        lb: edge,
                        ub: ub[var],
                    }]),
                    Some(var),
                    true,
                    (edge - value).max(self.opts.eps_int),
                );
                if value < edge / 2.0 {
                    self.pool.push(on);
                    self.pool.push(off);
                } else {
                    self.pool.push(off);
                    self.pool.push(on);
                }
            }
            Violation::Sos { set } => {
                let sos = &meta.sos[set];
                let zero = |j: usize| BoundDelta {
                    var: j,
                    lb: lb[j].min(0.0),
                    ub: 0.0,
                };
                let n = sos.members.len();
                // Split on the current nonzero support so each child cuts
                // off at least one offending member.
                let nz: Vec<usize> = (0..n)
                    .filter(|&p| x[sos.members[p].0].abs() > self.opts.eps_b)
                    .collect();
                let (left_zeroed, right_zeroed): (Vec<usize>, Vec<usize>) = if sos.type2 {
                    // Keep a consecutive window on either side of the
                    // interior pivot position.
                    let k = nz.first().map_or(n / 2, |&p| p + 1);
                    (
                        (0..n).filter(|&p| p > k).collect(),
                        (0..n).filter(|&p| p < k).collect(),
                    )
                } else {
                    let split = nz.get(nz.len() / 2).copied().unwrap_or(n / 2);
                    ((split..n).collect(), (0..split).collect())
                };
                let left = mk(
                    with_extra(
                        left_zeroed
                            .iter()
                            .map(|&p| zero(sos.members[p].0))
                            .collect(),
                    ),
                    None,
                    false,
                    1.0,
                );
                let right = mk(
                    with_extra(
                        right_zeroed
                            .iter()
                            .map(|&p| zero(sos.members[p].0))
                            .collect(),
                    ),
                    None,
                    true,
                    1.0,
                );
                self.pool.push(left);
                self.pool.push(right);
            }
        }
    }

    /// Zero the binary copies outside the integer window carried by the
    /// deltas, and pin the integer when one binary is forced.
    fn link_fixings(link: &LinkBranch, deltas: &mut Vec<BoundDelta>) {
        let Some(window) = deltas
            .iter()
            .find(|d| d.var == link.int_var)
            .map(|d| (d.lb, d.ub))
        else {
            return;
        };
        for (i, b) in link.binaries.iter().enumerate() {
            let Some(bvar) = *b else { continue };
            let value = link.offset + i as i64;
            if (value as E) < window.0 - 1e-9 || (value as E) > window.1 + 1e-9 {
                deltas.push(BoundDelta {
                    var: bvar,
                    lb: 0.0,
                    ub: 0.0,
                });
            }
        }
    }

    /// Strong-branching initialization of the pseudo-costs at the root.
    fn strong_init(
        &mut self,
        lp: &mut LpInstance,
        meta: &MipMeta,
        simplex: &mut Simplex,
        hooks: &mut HookTable,
        term: &mut dyn Terminator,
        root: &SimplexResult,
        base_lb: &[E],
        base_ub: &[E],
    ) -> Result<(), SolverError> {
        const MAX_CANDIDATES: usize = 10;
        const TRIAL_ITER: usize = 25;
        let saved_iter = simplex.opts.max_iter;
        simplex.opts.max_iter = TRIAL_ITER;
        let snapshot = simplex.snapshot();
        let mut initialized = 0;
        for (j, &is_int) in meta.int_var.iter().enumerate() {
            if initialized >= MAX_CANDIDATES {
                break;
            }
            if !is_int || self.pseudo.is_initialized(j) {
                continue;
            }
            let value = root.x[j];
            let frac = value - value.floor();
            if frac <= self.opts.eps_int || frac >= 1.0 - self.opts.eps_int {
                continue;
            }
            for up in [false, true] {
                lp.lb.copy_from_slice(base_lb);
                lp.ub.copy_from_slice(base_ub);
                if up {
                    lp.lb[j] = value.ceil();
                } else {
                    lp.ub[j] = value.floor();
                }
                simplex.load_statuses(lp, &snapshot.restore());
                let trial = simplex.solve(lp, hooks, term)?;
                self.total_iter += trial.iterations;
                if trial.status == Status::Optimal {
                    let loss = (root.obj - trial.obj).max(0.0);
                    let dist = if up { 1.0 - frac } else { frac };
                    self.pseudo.update(j, up, loss, dist);
                }
            }
            initialized += 1;
        }
        lp.lb.copy_from_slice(base_lb);
        lp.ub.copy_from_slice(base_ub);
        simplex.opts.max_iter = saved_iter;
        hooks.emit_msg(MsgEvent::InitPseudocost(initialized));
        Ok(())
    }

    fn accept_incumbent(
        &mut self,
        hooks: &mut HookTable,
        res: &SimplexResult,
    ) -> Option<Status> {
        let obj = res.obj;
        let improved = match &self.incumbent {
            None => true,
            Some((_, best, _, _)) => obj > *best,
        };
        let equal = self
            .incumbent
            .as_ref()
            .is_some_and(|(_, best, _, _)| (obj - best).abs() <= self.opts.mip_gap_abs);
        if improved {
            let first = self.incumbent.is_none();
            self.incumbent = Some((res.x.clone(), obj, res.y.clone(), res.d.clone()));
            self.cutoff = obj;
            self.cutoff_is_artificial = false;
            self.improved += 1;
            self.nodes_since_improve = 0;
            if first {
                hooks.emit_msg(MsgEvent::MilpFeasible(obj));
            } else {
                hooks.emit_msg(MsgEvent::MilpBetter(obj));
            }
            let pruned = self.pool.prune(self.prune_bound());
            if pruned > 0 && self.opts.bb_rule & node_rule::RESTART != 0 {
                hooks.emit_msg(MsgEvent::MilpStrategy(pruned));
            }
            if self.opts.break_at_first {
                return Some(Status::ProcBreak);
            }
            if !self.opts.break_at_value.is_nan() && obj >= self.opts.break_at_value {
                return Some(Status::ProcBreak);
            }
        } else if equal {
            hooks.emit_msg(MsgEvent::MilpEqual(obj));
        }
        None
    }

    /// Runs the search. `lp` carries the root bounds and is mutated per
    /// node; it is left with the root bounds restored.
    pub fn solve(
        &mut self,
        lp: &mut LpInstance,
        meta: &MipMeta,
        simplex: &mut Simplex,
        hooks: &mut HookTable,
        term: &mut dyn Terminator,
    ) -> Result<MipResult, SolverError> {
        let base_lb = lp.lb.clone();
        let base_ub = lp.ub.clone();
        let depth_limit = self.depth_limit(lp);
        let mut rng_tick: u64 = 0x9e3779b97f4a7c15;
        simplex.in_branch_and_bound = true;
        term.initialize();

        self.pool.push(Node {
            parent: None,
            depth: 0,
            deltas: Vec::new(),
            bound: E::INFINITY,
            snapshot: None,
            branch_var: None,
            branch_up: false,
            frac_dist: 0.0,
        });

        let mut exit_status: Option<Status> = None;
        let mut strong_done = false;

        while let Some(id) = {
            // The node hook may override the configured order.
            let choice = hooks.node.as_mut().and_then(|hook| {
                let open: Vec<NodeSummary> = self
                    .pool
                    .open_ids()
                    .iter()
                    .map(|&k| NodeSummary {
                        id: k,
                        depth: self.pool.node(k).depth,
                        bound: self.pool.node(k).bound,
                    })
                    .collect();
                if open.is_empty() { None } else { hook.select(&open) }
            });
            match choice {
                Some(id) => self.pool.take_id(id),
                None => self.pool.take(self.select_order()),
            }
        } {
            if let Some(status) = term.terminate() {
                exit_status = Some(status);
                break;
            }
            if hooks.should_abort() {
                exit_status = Some(Status::UserAbort);
                break;
            }

            let (depth, parent_bound, parent_var, parent_up, parent_dist, snapshot) = {
                let node = self.pool.node(id);
                (
                    node.depth,
                    node.bound,
                    node.branch_var,
                    node.branch_up,
                    node.frac_dist,
                    node.snapshot.clone(),
                )
            };
            if parent_bound <= self.prune_bound() {
                continue; // fathomed since it was queued
            }
            self.max_level = self.max_level.max(depth);

            // Install the node's bounds and warm basis.
            lp.lb.copy_from_slice(&base_lb);
            lp.ub.copy_from_slice(&base_ub);
            self.pool.resolve_bounds(id, &mut lp.lb, &mut lp.ub);
            if let Some(snap) = &snapshot {
                simplex.load_statuses(lp, &snap.restore());
            }

            let res = simplex.solve(lp, hooks, term)?;
            self.total_iter += res.iterations;
            self.nodes_since_improve += 1;
            if self.opts.bb_rule & node_rule::DYNAMIC != 0 && self.nodes_since_improve > 50 {
                self.dynamic_pseudo = true;
            }
            if self.pool.created() % 64 == 0 {
                hooks.emit_msg(MsgEvent::Performance(self.pool.created()));
            }

            match res.status {
                Status::Infeasible => {
                    // Pseudo-cost signal: the branch was maximally costly.
                    if let Some(var) = parent_var {
                        self.pseudo
                            .update(var, parent_up, parent_bound.abs().max(1.0), parent_dist);
                    }
                    continue;
                }
                Status::Unbounded => {
                    if depth == 0 {
                        exit_status = Some(Status::Unbounded);
                        break;
                    }
                    continue;
                }
                Status::Timeout | Status::UserAbort => {
                    exit_status = Some(res.status);
                    break;
                }
                Status::Optimal => {}
                Status::Suboptimal => {
                    // Iteration budget inside the node: keep its bound but
                    // remember the search is truncated.
                    self.truncated = true;
                }
                _ => {
                    exit_status = Some(Status::ProcFail);
                    break;
                }
            }

            if let Some(var) = parent_var {
                let loss = (parent_bound - res.obj).max(0.0);
                self.pseudo.update(var, parent_up, loss, parent_dist);
            }

            if res.obj <= self.prune_bound() {
                continue; // bounding
            }

            let violations = self.violations(meta, &res.x);
            if violations.is_empty() {
                if let Some(status) = self.accept_incumbent(hooks, &res) {
                    exit_status = Some(status);
                    break;
                }
                continue;
            }

            if depth >= depth_limit {
                self.truncated = true;
                continue;
            }

            if !strong_done && self.opts.bb_rule & node_rule::STRONG_INIT != 0 {
                strong_done = true;
                let node_lb = lp.lb.clone();
                let node_ub = lp.ub.clone();
                self.strong_init(
                    lp, meta, simplex, hooks, term, &res, &node_lb, &node_ub,
                )?;
                lp.lb.copy_from_slice(&node_lb);
                lp.ub.copy_from_slice(&node_ub);
            }

            let extra = if self.opts.bb_rule & node_rule::RCOST_FIXING != 0 {
                self.reduced_cost_deltas(meta, &res, &lp.lb, &lp.ub)
            } else {
                Vec::new()
            };

            let node_lb = lp.lb.clone();
            let node_ub = lp.ub.clone();
            let decision = self.pick_branch(meta, &violations, &node_lb, &node_ub, &mut rng_tick);
            let snapshot = simplex.snapshot();
            self.branch(
                meta, hooks, id, depth, decision, res.obj, snapshot, &res.x, &node_lb, &node_ub,
                &extra,
            );
        }

        simplex.in_branch_and_bound = false;
        lp.lb.copy_from_slice(&base_lb);
        lp.ub.copy_from_slice(&base_ub);

        let status = match exit_status {
            // Aborts and timeouts keep the best incumbent available.
            Some(s) => s,
            None => {
                if let Some((_, obj, _, _)) = &self.incumbent {
                    hooks.emit_msg(MsgEvent::MilpOptimal(*obj));
                    if self.truncated {
                        Status::Suboptimal
                    } else {
                        Status::Optimal
                    }
                } else if self.truncated || self.cutoff_is_artificial {
                    Status::NoFeasFound
                } else {
                    Status::Infeasible
                }
            }
        };

        let (x, obj, y, d) = match &self.incumbent {
            Some((x, obj, y, d)) => (Some(x.clone()), *obj, y.clone(), d.clone()),
            None => (None, 0.0, vec![0.0; lp.m()], vec![0.0; lp.total()]),
        };
        Ok(MipResult {
            status,
            x,
            obj,
            y,
            d,
            total_nodes: self.pool.created(),
            total_iter: self.total_iter,
            max_level: self.max_level,
            improved: self.improved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::eta::UpdateMode;
    use crate::matrix::SparseMatrix;
    use crate::simplex::SimplexOptions;
    use crate::terminators::NoOpTerminator;

    const INF: E = crate::INFINITY;

    fn knapsack_lp() -> (LpInstance, MipMeta) {
        // max 10a + 13b + 7c s.t. 3a + 5b + 2c <= 7, binaries.
        let mut mat = SparseMatrix::new(1, 3, 1e-12);
        mat.set(0, 0, 3.0).unwrap();
        mat.set(0, 1, 5.0).unwrap();
        mat.set(0, 2, 2.0).unwrap();
        let lp = LpInstance {
            mat,
            obj: vec![10.0, 13.0, 7.0],
            lb: vec![0.0, 0.0, 0.0, -INF],
            ub: vec![1.0, 1.0, 1.0, 7.0],
            obj_const: 0.0,
        };
        let meta = MipMeta {
            int_var: vec![true, true, true],
            sc_lower: vec![None, None, None],
            branch_dir: vec![BranchDir::Default; 3],
            priority: vec![0; 3],
            sos: Vec::new(),
            linking: Vec::new(),
            gub_var: vec![false; 3],
        };
        (lp, meta)
    }

    fn run(lp: &mut LpInstance, meta: &MipMeta, params: &Params) -> MipResult {
        let opts = SimplexOptions::from_params(params);
        let mut simplex = Simplex::new(opts, UpdateMode::ForestTomlin);
        let mut bb = BranchAndBound::new(MipOptions::from_params(params, 1.0), lp.n());
        let mut hooks = HookTable::default();
        let mut term = NoOpTerminator;
        bb.solve(lp, meta, &mut simplex, &mut hooks, &mut term)
            .unwrap()
    }

    #[test]
    fn knapsack_optimum() {
        let (mut lp, meta) = knapsack_lp();
        let params = Params::default();
        let res = run(&mut lp, &meta, &params);
        assert_eq!(res.status, Status::Optimal);
        // Best subset: a + c (weight 5, value 17); a+b exceeds, b+c = 20
        // weight 7 value 20 -> feasible and better.
        assert!((res.obj - 20.0).abs() < 1e-6, "obj = {}", res.obj);
        let x = res.x.unwrap();
        assert!(x[1] > 0.5 && x[2] > 0.5 && x[0] < 0.5);
        assert!(res.total_nodes >= 1);
    }

    #[test]
    fn integer_infeasible_detected() {
        // 2x = 1 with x integer in [0, 1] has no integer solution.
        let mut mat = SparseMatrix::new(1, 1, 1e-12);
        mat.set(0, 0, 2.0).unwrap();
        let mut lp = LpInstance {
            mat,
            obj: vec![1.0],
            lb: vec![0.0, 1.0],
            ub: vec![1.0, 1.0],
            obj_const: 0.0,
        };
        let meta = MipMeta {
            int_var: vec![true],
            sc_lower: vec![None],
            branch_dir: vec![BranchDir::Default],
            priority: vec![0],
            sos: Vec::new(),
            linking: Vec::new(),
            gub_var: vec![false],
        };
        let params = Params::default();
        let res = run(&mut lp, &meta, &params);
        assert_eq!(res.status, Status::Infeasible);
        assert!(res.x.is_none());
    }

    #[test]
    fn break_at_first_stops_early() {
        let (mut lp, meta) = knapsack_lp();
        let mut params = Params::default();
        params.break_at_first = true;
        let res = run(&mut lp, &meta, &params);
        assert_eq!(res.status, Status::ProcBreak);
        assert!(res.x.is_some());
    }

    #[test]
    fn sos1_branching_enforces_single_nonzero() {
        // max x0 + x1 + x2, each <= 4, SOS1 over all three, and a coupling
        // row x0 + x1 + x2 <= 6 keeps the LP interior.
        let mut mat = SparseMatrix::new(1, 3, 1e-12);
        mat.set(0, 0, 1.0).unwrap();
        mat.set(0, 1, 1.0).unwrap();
        mat.set(0, 2, 1.0).unwrap();
        let mut lp = LpInstance {
            mat,
            obj: vec![1.0, 1.0, 3.0],
            lb: vec![0.0, 0.0, 0.0, -INF],
            ub: vec![4.0, 4.0, 4.0, 6.0],
            obj_const: 0.0,
        };
        let meta = MipMeta {
            int_var: vec![false, false, false],
            sc_lower: vec![None, None, None],
            branch_dir: vec![BranchDir::Default; 3],
            priority: vec![0; 3],
            sos: vec![SosBranchSet {
                type2: false,
                priority: 1,
                members: vec![(0, 1.0), (1, 2.0), (2, 3.0)],
            }],
            linking: Vec::new(),
            gub_var: vec![false; 3],
        };
        let params = Params::default();
        let res = run(&mut lp, &meta, &params);
        assert_eq!(res.status, Status::Optimal);
        let x = res.x.unwrap();
        let nonzero = (0..3).filter(|&j| x[j].abs() > 1e-6).count();
        assert!(nonzero <= 1, "SOS1 violated: {:?}", &x[..3]);
        assert!((res.obj - 12.0).abs() < 1e-6); // x2 = 4 at its bound
    }

    #[test]
    fn semicontinuous_band_respected() {
        // max x with x semi-continuous, band [2, 5], but row x <= 1.5
        // forbids the band: optimum is the off state x = 0.
        let mut mat = SparseMatrix::new(1, 1, 1e-12);
        mat.set(0, 0, 1.0).unwrap();
        let mut lp = LpInstance {
            mat,
            obj: vec![1.0],
            lb: vec![0.0, -INF],
            ub: vec![5.0, 1.5],
            obj_const: 0.0,
        };
        let meta = MipMeta {
            int_var: vec![false],
            sc_lower: vec![Some(2.0)],
            branch_dir: vec![BranchDir::Default],
            priority: vec![0],
            sos: Vec::new(),
            linking: Vec::new(),
            gub_var: vec![false],
        };
        let params = Params::default();
        let res = run(&mut lp, &meta, &params);
        assert_eq!(res.status, Status::Optimal);
        let x = res.x.unwrap();
        assert!(x[0].abs() < 1e-6, "x = {}", x[0]);
    }

    #[test]
    fn depth_limit_truncates() {
        let (mut lp, meta) = knapsack_lp();
        let mut params = Params::default();
        params.bb_depthlimit = 1;
        let res = run(&mut lp, &meta, &params);
        // With depth 1 the knapsack may or may not close; the status must
        // still be a defined terminal.
        assert!(matches!(
            res.status,
            Status::Optimal | Status::Suboptimal | Status::NoFeasFound
        ));
    }

    #[test]
    fn pseudocost_rules_reach_the_same_optimum() {
        for rule in [
            node_rule::FIRST_SELECT,
            node_rule::FRACTION_SELECT,
            node_rule::PSEUDO_COST_SELECT,
            node_rule::PSEUDO_COST_SELECT | node_rule::STRONG_INIT,
            node_rule::FRACTION_SELECT | node_rule::BREADTH_FIRST,
            node_rule::FRACTION_SELECT | node_rule::GREEDY | node_rule::RCOST_FIXING,
        ] {
            let (mut lp, meta) = knapsack_lp();
            let mut params = Params::default();
            params.bb_rule = rule;
            let res = run(&mut lp, &meta, &params);
            assert_eq!(res.status, Status::Optimal, "rule {}", rule);
            assert!((res.obj - 20.0).abs() < 1e-6, "rule {}", rule);
        }
    }
}
