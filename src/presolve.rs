//! Presolve: shrinks a model into an equivalent reduced model plus a tape
//! of inverse transformations.
//!
//! Techniques are enabled individually through the `presolve` parameter
//! bits and iterate to a fixed point (bounded by `presolve_maxloops`).
//! Every elimination pushes a [`TapeEntry`]; `postsolve` replays the tape
//! backwards to recover a full original-space solution from a reduced one,
//! exactly on the feasible set.

use crate::model::{Model, SosKind, VarKind};
use crate::{E, I, INFINITY, Status, is_infinite};

/// Presolve technique bits for the `presolve` parameter.
pub mod presolve_ops {
    pub const NONE: i64 = 0;
    /// Empty, singleton, redundant and forcing row elimination.
    pub const ROWS: i64 = 1 << 0;
    /// Empty and fixed column elimination.
    pub const COLS: i64 = 1 << 1;
    /// Proportional (linearly dependent) duplicate row removal.
    pub const LINDEP: i64 = 1 << 2;
    /// Substitution of free singleton columns out of equality rows.
    pub const AGGREGATE: i64 = 1 << 3;
    /// Row combination that cancels coefficients of equality pairs.
    pub const SPARSER: i64 = 1 << 4;
    /// SOS pruning driven by fixed members.
    pub const SOS: i64 = 1 << 5;
    /// Integer bound rounding.
    pub const REDUCE_MIP: i64 = 1 << 6;
    /// Coefficient-driven bound reduction on knapsack rows.
    pub const KNAPSACK: i64 = 1 << 7;
    /// Two-variable equality elimination.
    pub const ELIM_EQ2: i64 = 1 << 8;
    /// Implied-free detection feeding aggregation.
    pub const IMPLIED_FREE: i64 = 1 << 9;
    /// GCD reduction of all-integer rows.
    pub const REDUCE_GCD: i64 = 1 << 10;
    /// Probing: fix binaries whose opposite setting is infeasible.
    pub const PROBE_FIX: i64 = 1 << 11;
    /// Probing: keep tightenings implied by both binary settings.
    pub const PROBE_REDUCE: i64 = 1 << 12;
    /// Drop rows dominated coefficient-wise by another row.
    pub const ROW_DOMINATE: i64 = 1 << 13;
    /// Fix columns dominated coefficient-wise by another column.
    pub const COL_DOMINATE: i64 = 1 << 14;
    /// Merge parallel rows into one range row.
    pub const MERGE_ROWS: i64 = 1 << 15;
    /// Fold zero-cost singleton columns of inequalities into the row
    /// bounds.
    pub const IMPLIED_SLACK: i64 = 1 << 16;
    /// Dual sign-based column fixing.
    pub const COL_FIX_DUAL: i64 = 1 << 17;
    /// Interval-arithmetic bound strengthening.
    pub const BOUNDS: i64 = 1 << 18;
    /// Recover dual values through postsolve.
    pub const DUALS: i64 = 1 << 19;
    /// Recover sensitivity duals through postsolve.
    pub const SENS_DUALS: i64 = 1 << 20;

    /// Everything that reduces the model.
    pub const ALL_REDUCTIONS: i64 = ROWS
        | COLS
        | LINDEP
        | AGGREGATE
        | SPARSER
        | SOS
        | REDUCE_MIP
        | KNAPSACK
        | ELIM_EQ2
        | IMPLIED_FREE
        | REDUCE_GCD
        | PROBE_FIX
        | PROBE_REDUCE
        | ROW_DOMINATE
        | COL_DOMINATE
        | MERGE_ROWS
        | IMPLIED_SLACK
        | COL_FIX_DUAL
        | BOUNDS;
}

/// One inverse transformation, in original index space.
#[derive(Debug, Clone)]
pub enum TapeEntry {
    /// The column was fixed; restore the stored value.
    FixedCol { col: I, value: E },
    /// The column was substituted out of an equality row:
    /// `x = (rhs - sum(terms)) / self_coef`.
    Substituted {
        col: I,
        row: I,
        rhs: E,
        self_coef: E,
        terms: Vec<(I, E)>,
    },
    /// A zero-cost singleton column folded into its row; restore any value
    /// keeping the row inside its original bounds.
    ImpliedSlack {
        col: I,
        row: I,
        coef: E,
        lhs: E,
        rhs: E,
        lb: E,
        ub: E,
        terms: Vec<(I, E)>,
    },
    /// The row was dropped as redundant; its dual is zero.
    DroppedRow { row: I },
}

/// The inverse map produced by a presolve pass.
#[derive(Debug, Clone, Default)]
pub struct Tape {
    entries: Vec<TapeEntry>,
    /// Surviving original column per reduced column.
    pub col_of_reduced: Vec<I>,
    /// Surviving original row per reduced row.
    pub row_of_reduced: Vec<I>,
    pub orig_cols: usize,
    pub orig_rows: usize,
}

/// Outcome of a presolve pass.
#[derive(Debug)]
pub struct PresolveResult {
    pub model: Model,
    pub tape: Tape,
    /// Objective value carried by the eliminated part (user sense applied
    /// by the session).
    pub obj_const: E,
    /// Terminal status detected during reduction, if any.
    pub verdict: Option<Status>,
    pub eliminated_rows: usize,
    pub eliminated_cols: usize,
    pub loops: usize,
}

/// Mutable working image of the model during reduction.
struct Work {
    cols: Vec<Vec<(usize, E)>>,
    lhs: Vec<E>,
    rhs: Vec<E>,
    lb: Vec<E>,
    ub: Vec<E>,
    obj: Vec<E>,
    is_int: Vec<bool>,
    /// Semi-continuous columns carry their hull `[min(lb, 0), ub]` here;
    /// the band edge stays on the model.
    is_sc: Vec<bool>,
    sos: Vec<(SosKind, Vec<usize>)>,
    row_alive: Vec<bool>,
    col_alive: Vec<bool>,
    obj_const: E,
    tape: Vec<TapeEntry>,
    changed: bool,
    eps: E,
}

impl Work {
    fn from_model(model: &Model) -> Self {
        let n = model.n_cols();
        let m = model.n_rows();
        let cols = (0..n)
            .map(|j| model.get_column_ex(j).unwrap_or_default())
            .collect();
        let is_sc: Vec<bool> = (0..n)
            .map(|j| model.var(j).kind == VarKind::SemiContinuous)
            .collect();
        Self {
            cols,
            lhs: (0..m).map(|i| model.row(i).lhs).collect(),
            rhs: (0..m).map(|i| model.row(i).rhs).collect(),
            lb: (0..n)
                .map(|j| {
                    let lb = model.var(j).lb;
                    if is_sc[j] { lb.min(0.0) } else { lb }
                })
                .collect(),
            ub: (0..n).map(|j| model.var(j).ub).collect(),
            obj: (0..n).map(|j| model.var(j).obj).collect(),
            is_int: (0..n).map(|j| model.var(j).is_integral()).collect(),
            is_sc,
            sos: model
                .sos_sets()
                .iter()
                .map(|set| (set.kind, set.members.iter().map(|&(j, _)| j).collect()))
                .collect(),
            row_alive: vec![true; m],
            col_alive: vec![true; n],
            obj_const: 0.0,
            tape: Vec::new(),
            changed: false,
            eps: 1e-11,
        }
    }

    fn n(&self) -> usize {
        self.cols.len()
    }

    fn m(&self) -> usize {
        self.lhs.len()
    }

    fn live_entries(&self, j: usize) -> impl Iterator<Item = (usize, E)> + '_ {
        self.cols[j]
            .iter()
            .copied()
            .filter(move |&(r, _)| self.row_alive[r])
    }

    fn col_len(&self, j: usize) -> usize {
        self.live_entries(j).count()
    }

    /// Live row image: `(col, coef)` pairs of row `r`.
    fn row_entries(&self, r: usize) -> Vec<(usize, E)> {
        let mut out = Vec::new();
        for j in 0..self.n() {
            if !self.col_alive[j] {
                continue;
            }
            if let Some(&(_, v)) = self.cols[j].iter().find(|&&(row, _)| row == r) {
                if v != 0.0 {
                    out.push((j, v));
                }
            }
        }
        out
    }

    /// Interval of possible activities from the current bounds. Infinite
    /// bounds contribute the conventional-infinity marker directly so a
    /// small coefficient cannot shrink them into the finite range.
    fn activity_bounds(&self, entries: &[(usize, E)]) -> (E, E) {
        let mut lo = 0.0;
        let mut hi = 0.0;
        for &(j, v) in entries {
            let (blo, bhi) = if v >= 0.0 {
                (self.lb[j], self.ub[j])
            } else {
                (self.ub[j], self.lb[j])
            };
            lo += if is_infinite(blo) { -INFINITY } else { blo * v };
            hi += if is_infinite(bhi) { INFINITY } else { bhi * v };
        }
        (lo, hi)
    }

    fn in_sos(&self, j: usize) -> bool {
        self.sos.iter().any(|(_, members)| members.contains(&j))
    }

    fn fix_col(&mut self, j: usize, value: E) {
        // Move the column into the row bounds and the objective constant.
        for &(r, v) in &self.cols[j].clone() {
            if !self.row_alive[r] {
                continue;
            }
            if !is_infinite(self.lhs[r]) {
                self.lhs[r] -= v * value;
            }
            if !is_infinite(self.rhs[r]) {
                self.rhs[r] -= v * value;
            }
        }
        self.obj_const += self.obj[j] * value;
        self.col_alive[j] = false;
        self.tape.push(TapeEntry::FixedCol { col: j, value });
        self.changed = true;
    }

    fn drop_row(&mut self, r: usize) {
        self.row_alive[r] = false;
        self.tape.push(TapeEntry::DroppedRow { row: r });
        self.changed = true;
    }

    fn tighten(&mut self, j: usize, lb: E, ub: E) -> Result<(), Status> {
        let mut new_lb = self.lb[j].max(lb);
        let mut new_ub = self.ub[j].min(ub);
        if self.is_sc[j] && new_lb > 0.0 {
            // Raising the hull floor above zero would cut the off state;
            // leave that decision to branching.
            new_lb = self.lb[j];
        }
        if self.is_int[j] {
            if !is_infinite(new_lb) {
                new_lb = (new_lb - 1e-9).ceil();
            }
            if !is_infinite(new_ub) {
                new_ub = (new_ub + 1e-9).floor();
            }
        }
        if new_lb > new_ub + self.eps {
            return Err(Status::Infeasible);
        }
        if new_lb > self.lb[j] + self.eps || new_ub < self.ub[j] - self.eps {
            self.changed = true;
        }
        self.lb[j] = new_lb;
        self.ub[j] = new_ub.max(new_lb);
        Ok(())
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// The presolver: applies the enabled techniques until a fixed point or
/// the loop cap, producing the reduced model and the inverse tape.
pub struct Presolver {
    ops: i64,
    max_loops: usize,
}

impl Presolver {
    pub fn new(ops: i64, max_loops: i64) -> Self {
        Self {
            ops,
            max_loops: if max_loops <= 0 {
                20
            } else {
                max_loops as usize
            },
        }
    }

    pub fn ops(&self) -> i64 {
        self.ops
    }

    /// Runs the reduction. The returned model is equivalent to the input
    /// on the feasible set; `verdict` short-circuits the solve when the
    /// reduction already decided the instance.
    pub fn presolve(&self, model: &Model) -> PresolveResult {
        let mut work = Work::from_model(model);
        let mut loops = 0;
        let mut verdict = None;

        if self.ops != presolve_ops::NONE {
            'outer: while loops < self.max_loops {
                loops += 1;
                work.changed = false;

                let passes: &[(i64, fn(&Self, &mut Work) -> Result<(), Status>)] = &[
                    (presolve_ops::ROWS, Self::pass_rows),
                    (presolve_ops::COLS, Self::pass_cols),
                    (presolve_ops::BOUNDS, Self::pass_bounds),
                    (presolve_ops::REDUCE_MIP, Self::pass_reduce_mip),
                    (presolve_ops::REDUCE_GCD, Self::pass_gcd),
                    (presolve_ops::KNAPSACK, Self::pass_knapsack),
                    (
                        presolve_ops::LINDEP | presolve_ops::MERGE_ROWS,
                        Self::pass_parallel_rows,
                    ),
                    (presolve_ops::ELIM_EQ2, Self::pass_eq2),
                    (
                        presolve_ops::AGGREGATE | presolve_ops::IMPLIED_FREE,
                        Self::pass_aggregate,
                    ),
                    (presolve_ops::IMPLIED_SLACK, Self::pass_implied_slack),
                    (presolve_ops::SPARSER, Self::pass_sparser),
                    (presolve_ops::SOS, Self::pass_sos),
                    (presolve_ops::COL_FIX_DUAL, Self::pass_col_fix_dual),
                    (presolve_ops::ROW_DOMINATE, Self::pass_row_dominate),
                    (presolve_ops::COL_DOMINATE, Self::pass_col_dominate),
                    (
                        presolve_ops::PROBE_FIX | presolve_ops::PROBE_REDUCE,
                        Self::pass_probe,
                    ),
                ];
                for &(bit, pass) in passes {
                    if self.ops & bit != 0 {
                        if let Err(status) = pass(self, &mut work) {
                            verdict = Some(status);
                            break 'outer;
                        }
                    }
                }

                if !work.changed {
                    break;
                }
            }
        }

        self.materialize(model, work, loops, verdict)
    }

    /// Empty, singleton, redundant and forcing rows.
    fn pass_rows(&self, work: &mut Work) -> Result<(), Status> {
        for r in 0..work.m() {
            if !work.row_alive[r] {
                continue;
            }
            let entries = work.row_entries(r);
            let (lhs, rhs) = (work.lhs[r], work.rhs[r]);
            if entries.is_empty() {
                if lhs > work.eps || rhs < -work.eps {
                    return Err(Status::Infeasible);
                }
                work.drop_row(r);
                continue;
            }
            if entries.len() == 1 {
                let (j, v) = entries[0];
                let (mut lo, mut hi) = (-INFINITY, INFINITY);
                if !is_infinite(lhs) {
                    if v > 0.0 {
                        lo = lhs / v;
                    } else {
                        hi = lhs / v;
                    }
                }
                if !is_infinite(rhs) {
                    if v > 0.0 {
                        hi = hi.min(rhs / v);
                    } else {
                        lo = lo.max(rhs / v);
                    }
                }
                work.tighten(j, lo, hi)?;
                work.drop_row(r);
                continue;
            }
            let (act_lo, act_hi) = work.activity_bounds(&entries);
            // Redundant: the bounds can never cut.
            if (is_infinite(lhs) || act_lo >= lhs - work.eps)
                && (is_infinite(rhs) || act_hi <= rhs + work.eps)
            {
                work.drop_row(r);
                continue;
            }
            // Infeasible: the bounds can never be met.
            if (!is_infinite(rhs) && act_lo > rhs + work.eps)
                || (!is_infinite(lhs) && act_hi < lhs - work.eps)
            {
                return Err(Status::Infeasible);
            }
            // Forcing: only one extreme activity is admissible. Integer
            // members must land on integral bounds for the fixing to be
            // valid in the discrete problem.
            let int_safe = |work: &Work, entries: &[(usize, E)], low_side: bool| {
                entries.iter().all(|&(j, v)| {
                    if !work.is_int[j] {
                        return true;
                    }
                    let value = if (v >= 0.0) == low_side {
                        work.lb[j]
                    } else {
                        work.ub[j]
                    };
                    (value - value.round()).abs() <= 1e-9
                })
            };
            if !is_infinite(rhs)
                && (act_lo - rhs).abs() <= work.eps
                && int_safe(work, &entries, true)
            {
                for (j, v) in entries {
                    let value = if v >= 0.0 { work.lb[j] } else { work.ub[j] };
                    work.fix_col(j, value);
                }
                work.drop_row(r);
                continue;
            }
            if !is_infinite(lhs)
                && (act_hi - lhs).abs() <= work.eps
                && int_safe(work, &entries, false)
            {
                for (j, v) in entries {
                    let value = if v >= 0.0 { work.ub[j] } else { work.lb[j] };
                    work.fix_col(j, value);
                }
                work.drop_row(r);
            }
        }
        Ok(())
    }

    /// Empty and fixed columns.
    fn pass_cols(&self, work: &mut Work) -> Result<(), Status> {
        for j in 0..work.n() {
            if !work.col_alive[j] {
                continue;
            }
            if work.lb[j] == work.ub[j] {
                work.fix_col(j, work.lb[j]);
                continue;
            }
            if work.col_len(j) == 0 {
                // Unconstrained column: settles on its favorable bound
                // (internal maximization).
                let c = work.obj[j];
                let mut value = if c > 0.0 {
                    work.ub[j]
                } else if c < 0.0 {
                    work.lb[j]
                } else if !is_infinite(work.lb[j]) {
                    work.lb[j]
                } else if !is_infinite(work.ub[j]) {
                    work.ub[j]
                } else {
                    0.0
                };
                if is_infinite(value) && c != 0.0 {
                    return Err(Status::Unbounded);
                }
                if is_infinite(value) {
                    value = 0.0;
                }
                if work.is_int[j] {
                    // Settle on the best integer point inside the bounds.
                    value = if c > 0.0 { value.floor() } else { value.ceil() };
                    if value < work.lb[j] - work.eps || value > work.ub[j] + work.eps {
                        return Err(Status::Infeasible);
                    }
                }
                work.fix_col(j, value);
            }
        }
        Ok(())
    }

    /// Interval-arithmetic bound strengthening row by row. Residual
    /// activities are kept as finite sums plus infinite-contribution
    /// counters so removing one term never mixes markers with arithmetic.
    fn pass_bounds(&self, work: &mut Work) -> Result<(), Status> {
        for r in 0..work.m() {
            if !work.row_alive[r] {
                continue;
            }
            let entries = work.row_entries(r);
            if entries.len() < 2 {
                continue;
            }
            let mut inf_lo = 0usize;
            let mut inf_hi = 0usize;
            let mut sum_lo = 0.0;
            let mut sum_hi = 0.0;
            let term = |work: &Work, j: usize, v: E| -> (E, E) {
                if v >= 0.0 {
                    (work.lb[j], work.ub[j])
                } else {
                    (work.ub[j], work.lb[j])
                }
            };
            for &(j, v) in &entries {
                let (blo, bhi) = term(work, j, v);
                if is_infinite(blo) {
                    inf_lo += 1;
                } else {
                    sum_lo += blo * v;
                }
                if is_infinite(bhi) {
                    inf_hi += 1;
                } else {
                    sum_hi += bhi * v;
                }
            }
            for &(j, v) in &entries {
                let (blo, bhi) = term(work, j, v);
                let rest_lo = if inf_lo > usize::from(is_infinite(blo)) {
                    None
                } else {
                    Some(sum_lo - if is_infinite(blo) { 0.0 } else { blo * v })
                };
                let rest_hi = if inf_hi > usize::from(is_infinite(bhi)) {
                    None
                } else {
                    Some(sum_hi - if is_infinite(bhi) { 0.0 } else { bhi * v })
                };
                let mut lo = -INFINITY;
                let mut hi = INFINITY;
                if !is_infinite(work.rhs[r]) {
                    if let Some(rest) = rest_lo {
                        let limit = (work.rhs[r] - rest) / v;
                        if v > 0.0 {
                            hi = hi.min(limit);
                        } else {
                            lo = lo.max(limit);
                        }
                    }
                }
                if !is_infinite(work.lhs[r]) {
                    if let Some(rest) = rest_hi {
                        let limit = (work.lhs[r] - rest) / v;
                        if v > 0.0 {
                            lo = lo.max(limit);
                        } else {
                            hi = hi.min(limit);
                        }
                    }
                }
                if !is_infinite(lo) || !is_infinite(hi) {
                    work.tighten(j, lo, hi)?;
                }
            }
        }
        Ok(())
    }

    /// Round integer bounds to integers.
    fn pass_reduce_mip(&self, work: &mut Work) -> Result<(), Status> {
        for j in 0..work.n() {
            if work.col_alive[j] && work.is_int[j] {
                work.tighten(j, work.lb[j], work.ub[j])?;
            }
        }
        Ok(())
    }

    /// Divide all-integer rows by the coefficient GCD and round the sides.
    fn pass_gcd(&self, work: &mut Work) -> Result<(), Status> {
        for r in 0..work.m() {
            if !work.row_alive[r] {
                continue;
            }
            let entries = work.row_entries(r);
            if entries.is_empty() || entries.iter().any(|&(j, _)| !work.is_int[j]) {
                continue;
            }
            let mut g: u64 = 0;
            let mut ok = true;
            for &(_, v) in &entries {
                let rounded = v.round();
                if (v - rounded).abs() > 1e-9 || rounded == 0.0 {
                    ok = false;
                    break;
                }
                g = gcd(g, rounded.abs() as u64);
            }
            if !ok || g <= 1 {
                continue;
            }
            let g = g as E;
            for &(j, v) in &entries {
                if let Some(e) = work.cols[j].iter_mut().find(|e| e.0 == r) {
                    e.1 = v / g;
                }
            }
            if !is_infinite(work.lhs[r]) {
                let t = (work.lhs[r] / g - 1e-9).ceil();
                if t > work.lhs[r] / g + 1e-9 {
                    work.changed = true;
                }
                work.lhs[r] = t;
            }
            if !is_infinite(work.rhs[r]) {
                let t = (work.rhs[r] / g + 1e-9).floor();
                if t < work.rhs[r] / g - 1e-9 {
                    work.changed = true;
                }
                work.rhs[r] = t;
            }
            if !is_infinite(work.lhs[r])
                && !is_infinite(work.rhs[r])
                && work.lhs[r] > work.rhs[r] + work.eps
            {
                return Err(Status::Infeasible);
            }
        }
        Ok(())
    }

    /// Knapsack rows: positive coefficients over nonnegative integers give
    /// `x_j <= floor(rhs / a_j)`.
    fn pass_knapsack(&self, work: &mut Work) -> Result<(), Status> {
        for r in 0..work.m() {
            if !work.row_alive[r] || !is_infinite(work.lhs[r]) || is_infinite(work.rhs[r]) {
                continue;
            }
            let entries = work.row_entries(r);
            if entries.len() < 2 {
                continue;
            }
            let knapsack = entries
                .iter()
                .all(|&(j, v)| v > 0.0 && work.is_int[j] && work.lb[j] >= 0.0);
            if !knapsack || work.rhs[r] < 0.0 {
                continue;
            }
            for &(j, v) in &entries {
                work.tighten(j, -INFINITY, (work.rhs[r] / v + 1e-9).floor())?;
            }
        }
        Ok(())
    }

    /// Proportional rows merge into a single range row.
    fn pass_parallel_rows(&self, work: &mut Work) -> Result<(), Status> {
        let m = work.m();
        let rows: Vec<Option<Vec<(usize, E)>>> = (0..m)
            .map(|r| work.row_alive[r].then(|| work.row_entries(r)))
            .collect();
        for a in 0..m {
            let Some(ref ra) = rows[a] else { continue };
            if !work.row_alive[a] || ra.is_empty() {
                continue;
            }
            for b in a + 1..m {
                let Some(ref rb) = rows[b] else { continue };
                if !work.row_alive[b] || rb.len() != ra.len() {
                    continue;
                }
                // Same support and proportional coefficients?
                let Some(&(j0, va0)) = ra.first() else { continue };
                let Some(&(_, vb0)) = rb.iter().find(|&&(j, _)| j == j0) else {
                    continue;
                };
                let ratio = vb0 / va0;
                if ratio == 0.0 || !ratio.is_finite() {
                    continue;
                }
                let proportional = ra.iter().all(|&(j, va)| {
                    rb.iter()
                        .find(|&&(jb, _)| jb == j)
                        .is_some_and(|&(_, vb)| (vb - ratio * va).abs() <= 1e-9 * vb.abs().max(1.0))
                });
                if !proportional {
                    continue;
                }
                // Fold b's bounds into a (dividing by the ratio, flipping
                // on negative).
                let (mut blo, mut bhi) = (work.lhs[b], work.rhs[b]);
                if ratio < 0.0 {
                    std::mem::swap(&mut blo, &mut bhi);
                }
                let scaled_lo = if is_infinite(blo) { -INFINITY } else { blo / ratio };
                let scaled_hi = if is_infinite(bhi) { INFINITY } else { bhi / ratio };
                let new_lo = work.lhs[a].max(scaled_lo.min(scaled_hi));
                let new_hi = work.rhs[a].min(scaled_lo.max(scaled_hi));
                if new_lo > new_hi + work.eps {
                    return Err(Status::Infeasible);
                }
                work.lhs[a] = new_lo;
                work.rhs[a] = new_hi;
                work.drop_row(b);
            }
        }
        Ok(())
    }

    /// Equalities with exactly two variables: substitute one out.
    fn pass_eq2(&self, work: &mut Work) -> Result<(), Status> {
        for r in 0..work.m() {
            if !work.row_alive[r] {
                continue;
            }
            if is_infinite(work.lhs[r]) || work.lhs[r] != work.rhs[r] {
                continue;
            }
            let entries = work.row_entries(r);
            if entries.len() != 2 {
                continue;
            }
            if entries
                .iter()
                .any(|&(j, _)| work.is_sc[j] || work.in_sos(j))
            {
                continue;
            }
            // Substitute the continuous one if mixed; either if both agree.
            let (keep, gone) = match (work.is_int[entries[0].0], work.is_int[entries[1].0]) {
                (false, true) => (entries[1], entries[0]),
                (true, false) => (entries[0], entries[1]),
                (true, true) => continue, // integrality not preserved
                (false, false) => (entries[0], entries[1]),
            };
            self.substitute(work, r, gone, &[keep])?;
        }
        Ok(())
    }

    /// Free (or implied-free) singleton columns in equality rows.
    fn pass_aggregate(&self, work: &mut Work) -> Result<(), Status> {
        for j in 0..work.n() {
            if !work.col_alive[j] || work.is_int[j] || work.is_sc[j] || work.in_sos(j) {
                continue;
            }
            let live: Vec<(usize, E)> = work.live_entries(j).collect();
            if live.len() != 1 {
                continue;
            }
            let (r, v) = live[0];
            if is_infinite(work.lhs[r]) || work.lhs[r] != work.rhs[r] {
                continue;
            }
            let naturally_free = is_infinite(work.lb[j]) && is_infinite(work.ub[j]);
            let implied_free = if naturally_free {
                true
            } else if self.ops & presolve_ops::IMPLIED_FREE != 0 {
                // Range the row permits for x_j given the other bounds.
                let others: Vec<(usize, E)> = work
                    .row_entries(r)
                    .into_iter()
                    .filter(|&(k, _)| k != j)
                    .collect();
                let (lo, hi) = work.activity_bounds(&others);
                let (a, b) = ((work.rhs[r] - hi) / v, (work.rhs[r] - lo) / v);
                let (implied_lo, implied_hi) = (a.min(b), a.max(b));
                implied_lo >= work.lb[j] - work.eps && implied_hi <= work.ub[j] + work.eps
            } else {
                false
            };
            if !implied_free || self.ops & presolve_ops::AGGREGATE == 0 {
                continue;
            }
            let others: Vec<(usize, E)> = work
                .row_entries(r)
                .into_iter()
                .filter(|&(k, _)| k != j)
                .collect();
            self.substitute(work, r, (j, v), &others)?;
        }
        Ok(())
    }

    /// Removes `gone = (col, coef)` using equality row `r`, rewriting every
    /// other row and the objective.
    fn substitute(
        &self,
        work: &mut Work,
        r: usize,
        gone: (usize, E),
        others: &[(usize, E)],
    ) -> Result<(), Status> {
        let (j, a) = gone;
        if a.abs() < 1e-10 {
            return Ok(());
        }
        let b = work.rhs[r];
        // x_j = (b - sum(others)) / a; bounds of x_j become bounds on the
        // combination, folded into the kept variables via the row itself:
        // replace row r by  lhs' <= sum(others) <= rhs' from x_j's bounds.
        let (mut new_lo, mut new_hi) = (-INFINITY, INFINITY);
        let (xl, xu) = (work.lb[j], work.ub[j]);
        // sum(others) = b - a * x_j
        let (c1, c2) = (
            if is_infinite(xu) { -INFINITY } else { b - a * xu },
            if is_infinite(xl) { INFINITY } else { b - a * xl },
        );
        let (lo_cand, hi_cand) = if a > 0.0 { (c1, c2) } else { (c2, c1) };
        if !is_infinite(lo_cand) {
            new_lo = lo_cand;
        }
        if !is_infinite(hi_cand) {
            new_hi = hi_cand;
        }

        // Rewrite every other row containing x_j: row_k += (v_k / a) *
        // (row_r_others - b)... i.e. eliminate via the equality.
        let col_entries = work.cols[j].clone();
        for &(k, vk) in &col_entries {
            if k == r || !work.row_alive[k] {
                continue;
            }
            let factor = vk / a;
            for &(jo, vo) in others {
                let delta = -factor * vo;
                match work.cols[jo].iter_mut().find(|e| e.0 == k) {
                    Some(e) => e.1 += delta,
                    None => work.cols[jo].push((k, delta)),
                }
            }
            if !is_infinite(work.lhs[k]) {
                work.lhs[k] -= factor * b;
            }
            if !is_infinite(work.rhs[k]) {
                work.rhs[k] -= factor * b;
            }
            work.cols[j].retain(|e| e.0 != k);
        }
        // Objective: c_j * x_j = c_j/a * (b - sum(others)).
        let cj = work.obj[j];
        if cj != 0.0 {
            let factor = cj / a;
            work.obj_const += factor * b;
            for &(jo, vo) in others {
                work.obj[jo] -= factor * vo;
            }
            work.obj[j] = 0.0;
        }

        // Row r becomes the bound carrier for the eliminated variable.
        work.lhs[r] = new_lo;
        work.rhs[r] = new_hi;
        // Remove x_j from row r.
        work.cols[j].retain(|e| e.0 != r);
        work.col_alive[j] = false;
        work.tape.push(TapeEntry::Substituted {
            col: j,
            row: r,
            rhs: b,
            self_coef: a,
            terms: others.to_vec(),
        });
        if is_infinite(new_lo) && is_infinite(new_hi) {
            work.drop_row(r);
        } else {
            work.changed = true;
        }
        Ok(())
    }

    /// Zero-cost continuous singleton columns of inequality rows fold into
    /// the row bounds.
    fn pass_implied_slack(&self, work: &mut Work) -> Result<(), Status> {
        for j in 0..work.n() {
            if !work.col_alive[j]
                || work.is_int[j]
                || work.is_sc[j]
                || work.in_sos(j)
                || work.obj[j] != 0.0
            {
                continue;
            }
            let live: Vec<(usize, E)> = work.live_entries(j).collect();
            if live.len() != 1 {
                continue;
            }
            let (r, v) = live[0];
            if work.lhs[r] == work.rhs[r] {
                continue; // equalities belong to aggregation
            }
            if is_infinite(work.lb[j]) || is_infinite(work.ub[j]) {
                continue;
            }
            let terms: Vec<(usize, E)> = work
                .row_entries(r)
                .into_iter()
                .filter(|&(k, _)| k != j)
                .collect();
            let (lhs, rhs) = (work.lhs[r], work.rhs[r]);
            // Widen the row bounds by the contribution range of v * x_j.
            let (clo, chi) = if v >= 0.0 {
                (v * work.lb[j], v * work.ub[j])
            } else {
                (v * work.ub[j], v * work.lb[j])
            };
            if !is_infinite(work.lhs[r]) {
                work.lhs[r] -= chi;
            }
            if !is_infinite(work.rhs[r]) {
                work.rhs[r] -= clo;
            }
            work.cols[j].retain(|e| e.0 != r);
            work.col_alive[j] = false;
            work.tape.push(TapeEntry::ImpliedSlack {
                col: j,
                row: r,
                coef: v,
                lhs,
                rhs,
                lb: work.lb[j],
                ub: work.ub[j],
                terms,
            });
            work.changed = true;
        }
        Ok(())
    }

    /// SOS transformation: a member forced nonzero zeroes the rest of a
    /// type-1 set, or everything outside the adjacent window of a type-2
    /// set.
    fn pass_sos(&self, work: &mut Work) -> Result<(), Status> {
        for (kind, members) in work.sos.clone() {
            let forced: Vec<usize> = members
                .iter()
                .enumerate()
                .filter(|&(_, &j)| work.col_alive[j] && work.lb[j] > work.eps)
                .map(|(pos, _)| pos)
                .collect();
            let Some(&first) = forced.first() else { continue };
            match kind {
                SosKind::Type1 => {
                    if forced.len() > 1 {
                        return Err(Status::Infeasible);
                    }
                    for (pos, &j) in members.iter().enumerate() {
                        if pos != first && work.col_alive[j] {
                            work.tighten(j, 0.0, 0.0)?;
                        }
                    }
                }
                SosKind::Type2 => {
                    let last = *forced.last().unwrap();
                    if last > first + 1 || forced.len() > 2 {
                        return Err(Status::Infeasible);
                    }
                    for (pos, &j) in members.iter().enumerate() {
                        if pos + 1 < first || pos > first + 1 {
                            if work.col_alive[j] {
                                work.tighten(j, 0.0, 0.0)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Cancel coefficients between equality rows with nested support.
    fn pass_sparser(&self, work: &mut Work) -> Result<(), Status> {
        let m = work.m();
        for a in 0..m {
            if !work.row_alive[a] || is_infinite(work.lhs[a]) || work.lhs[a] != work.rhs[a] {
                continue;
            }
            let ra = work.row_entries(a);
            if ra.len() < 2 {
                continue;
            }
            for b in 0..m {
                if b == a || !work.row_alive[b] {
                    continue;
                }
                let rb = work.row_entries(b);
                if rb.len() <= ra.len() {
                    continue;
                }
                // Support of a must be contained in b.
                if !ra
                    .iter()
                    .all(|&(j, _)| rb.iter().any(|&(k, _)| k == j))
                {
                    continue;
                }
                let (j0, va0) = ra[0];
                let vb0 = rb.iter().find(|&&(k, _)| k == j0).unwrap().1;
                let factor = vb0 / va0;
                // Count cancellations: every shared coefficient must
                // cancel for the combination to sparsify.
                let cancels = ra.iter().all(|&(j, va)| {
                    rb.iter()
                        .find(|&&(k, _)| k == j)
                        .is_some_and(|&(_, vb)| (vb - factor * va).abs() <= 1e-9 * vb.abs().max(1.0))
                });
                if !cancels || factor == 0.0 {
                    continue;
                }
                // row_b -= factor * row_a
                for &(j, va) in &ra {
                    if let Some(e) = work.cols[j].iter_mut().find(|e| e.0 == b) {
                        e.1 -= factor * va;
                    }
                    work.cols[j].retain(|e| !(e.0 == b && e.1.abs() <= 1e-11));
                }
                let shift = factor * work.rhs[a];
                if !is_infinite(work.lhs[b]) {
                    work.lhs[b] -= shift;
                }
                if !is_infinite(work.rhs[b]) {
                    work.rhs[b] -= shift;
                }
                work.changed = true;
            }
        }
        Ok(())
    }

    /// Dual sign fixing: a column whose objective disfavors movement and
    /// whose coefficients never relax any finite row side settles on its
    /// bound (internal maximization).
    fn pass_col_fix_dual(&self, work: &mut Work) -> Result<(), Status> {
        for j in 0..work.n() {
            if !work.col_alive[j] || work.lb[j] == work.ub[j] || work.is_sc[j] || work.in_sos(j) {
                continue;
            }
            let live: Vec<(usize, E)> = work.live_entries(j).collect();
            if live.is_empty() {
                continue;
            }
            // Fix at lower when the objective disfavors movement and every
            // coefficient only consumes slack of an upper-bounded row, so
            // the implied dual sign is certain.
            let tightens_only = live
                .iter()
                .all(|&(r, v)| v >= 0.0 && is_infinite(work.lhs[r]) && !is_infinite(work.rhs[r]));
            if work.obj[j] <= 0.0 && tightens_only && !is_infinite(work.lb[j]) {
                work.fix_col(j, work.lb[j]);
            }
        }
        Ok(())
    }

    /// Rows dominated coefficient-wise by another row over nonnegative
    /// variables.
    fn pass_row_dominate(&self, work: &mut Work) -> Result<(), Status> {
        let m = work.m();
        for a in 0..m {
            if !work.row_alive[a] || !is_infinite(work.lhs[a]) || is_infinite(work.rhs[a]) {
                continue;
            }
            let ra = work.row_entries(a);
            if ra.is_empty() || ra.iter().any(|&(j, _)| work.lb[j] < 0.0) {
                continue;
            }
            for b in 0..m {
                if b == a || !work.row_alive[b] || !is_infinite(work.lhs[b]) || is_infinite(work.rhs[b])
                {
                    continue;
                }
                let rb = work.row_entries(b);
                if rb.len() != ra.len() {
                    continue;
                }
                // a dominates b: same support, a_j >= b_j >= 0, rhs_a <= rhs_b.
                let dominated = work.rhs[a] <= work.rhs[b]
                    && ra.iter().all(|&(j, va)| {
                        rb.iter()
                            .find(|&&(k, _)| k == j)
                            .is_some_and(|&(_, vb)| va >= vb && vb >= 0.0)
                    });
                if dominated {
                    work.drop_row(b);
                }
            }
        }
        Ok(())
    }

    /// Columns dominated by a cheaper, lighter column (internal
    /// maximization over nonnegative variables).
    fn pass_col_dominate(&self, work: &mut Work) -> Result<(), Status> {
        let n = work.n();
        for a in 0..n {
            if !work.col_alive[a] || work.lb[a] < 0.0 || !is_infinite(work.ub[a]) {
                continue;
            }
            let ca: Vec<(usize, E)> = work.live_entries(a).collect();
            if ca.is_empty() {
                continue;
            }
            // Only <=-rows qualify for the sign argument.
            if ca
                .iter()
                .any(|&(r, _)| !is_infinite(work.lhs[r]) || is_infinite(work.rhs[r]))
            {
                continue;
            }
            for b in 0..n {
                if b == a || !work.col_alive[b] || work.lb[b] < 0.0 || work.is_sc[b] || work.in_sos(b)
                {
                    continue;
                }
                let cb: Vec<(usize, E)> = work.live_entries(b).collect();
                if cb.len() != ca.len() {
                    continue;
                }
                // a dominates b: better objective, componentwise lighter
                // constraint usage on the same support.
                let dominates = work.obj[a] >= work.obj[b]
                    && ca.iter().all(|&(r, va)| {
                        cb.iter()
                            .find(|&&(rb, _)| rb == r)
                            .is_some_and(|&(_, vb)| va <= vb)
                    });
                if dominates && work.obj[a] > work.obj[b] && !is_infinite(work.lb[b]) {
                    work.fix_col(b, work.lb[b]);
                }
            }
        }
        Ok(())
    }

    /// One round of binary probing.
    fn pass_probe(&self, work: &mut Work) -> Result<(), Status> {
        for j in 0..work.n() {
            if !work.col_alive[j]
                || !work.is_int[j]
                || work.lb[j] != 0.0
                || work.ub[j] != 1.0
            {
                continue;
            }
            let mut infeasible_at = [false, false];
            for (slot, trial) in [(0usize, 0.0), (1, 1.0)] {
                for &(r, v) in &work.cols[j].clone() {
                    if !work.row_alive[r] {
                        continue;
                    }
                    let entries = work.row_entries(r);
                    let others: Vec<(usize, E)> = entries
                        .into_iter()
                        .filter(|&(k, _)| k != j)
                        .collect();
                    let (lo, hi) = work.activity_bounds(&others);
                    let contrib = v * trial;
                    if (!is_infinite(work.rhs[r]) && lo + contrib > work.rhs[r] + work.eps)
                        || (!is_infinite(work.lhs[r]) && hi + contrib < work.lhs[r] - work.eps)
                    {
                        infeasible_at[slot] = true;
                        break;
                    }
                }
            }
            match infeasible_at {
                [true, true] => return Err(Status::Infeasible),
                [true, false] => {
                    if self.ops & presolve_ops::PROBE_FIX != 0 {
                        work.tighten(j, 1.0, 1.0)?;
                    }
                }
                [false, true] => {
                    if self.ops & presolve_ops::PROBE_FIX != 0 {
                        work.tighten(j, 0.0, 0.0)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Builds the reduced model and remaps SOS structure.
    fn materialize(
        &self,
        model: &Model,
        work: Work,
        loops: usize,
        verdict: Option<Status>,
    ) -> PresolveResult {
        let col_of_reduced: Vec<I> = (0..work.n()).filter(|&j| work.col_alive[j]).collect();
        let row_of_reduced: Vec<I> = (0..work.m()).filter(|&r| work.row_alive[r]).collect();
        let mut col_map = vec![usize::MAX; work.n()];
        for (new, &old) in col_of_reduced.iter().enumerate() {
            col_map[old] = new;
        }
        let mut row_map = vec![usize::MAX; work.m()];
        for (new, &old) in row_of_reduced.iter().enumerate() {
            row_map[old] = new;
        }

        let mut reduced = Model::new(row_of_reduced.len(), col_of_reduced.len());
        reduced.set_maximize(model.is_maximize());
        for (new, &old) in row_of_reduced.iter().enumerate() {
            reduced.row_mut(new).lhs = work.lhs[old];
            reduced.row_mut(new).rhs = work.rhs[old];
            if let Some(name) = &model.row(old).name {
                let _ = reduced.set_row_name(new, name);
            }
        }
        for (new, &old) in col_of_reduced.iter().enumerate() {
            let var = reduced.var_mut(new);
            var.kind = model.var(old).kind;
            var.lb = work.lb[old];
            var.ub = work.ub[old];
            var.obj = work.obj[old];
            var.sc_lower = model.var(old).sc_lower;
            var.branch_dir = model.var(old).branch_dir;
            var.priority = model.var(old).priority;
            if let Some(name) = &model.var(old).name {
                let _ = reduced.set_col_name(new, name);
            }
            for &(r, v) in &work.cols[old] {
                if work.row_alive[r] && v.abs() > 1e-12 {
                    let _ = reduced.set_mat(row_map[r], new, v);
                }
            }
        }

        // SOS transformation: drop members fixed to zero, carry survivors.
        for set in model.sos_sets() {
            let members: Vec<(I, E)> = set
                .members
                .iter()
                .filter(|&&(j, _)| work.col_alive[j])
                .map(|&(j, w)| (col_map[j], w))
                .collect();
            let fixed_nonzero = set.members.iter().any(|&(j, _)| {
                !work.col_alive[j]
                    && work
                        .tape
                        .iter()
                        .any(|t| matches!(t, TapeEntry::FixedCol { col, value } if *col == j && value.abs() > 1e-9))
            });
            if self.ops & presolve_ops::SOS != 0 && set.kind == SosKind::Type1 && fixed_nonzero {
                // One member already committed: the rest are zero.
                continue;
            }
            if members.len() > 1 {
                let _ = reduced.add_sos(&set.name, set.kind, set.priority, &members);
            }
        }

        let eliminated_rows = work.m() - row_of_reduced.len();
        let eliminated_cols = work.n() - col_of_reduced.len();
        let orig_cols = work.n();
        let orig_rows = work.m();
        // The reduced objective constant rides on the tape.
        let tape = Tape {
            entries: work.tape,
            col_of_reduced,
            row_of_reduced,
            orig_cols,
            orig_rows,
        };
        let verdict = verdict.or_else(|| {
            if reduced.n_rows() == 0 && reduced.n_cols() == 0 {
                Some(Status::Presolved)
            } else {
                None
            }
        });
        PresolveResult {
            model: reduced,
            tape,
            obj_const: work.obj_const,
            verdict,
            eliminated_rows,
            eliminated_cols,
            loops,
        }
    }
}

/// Maps a reduced primal solution back to the original space.
pub fn postsolve_primal(tape: &Tape, reduced_x: &[E]) -> Vec<E> {
    let mut x = vec![0.0; tape.orig_cols];
    for (new, &old) in tape.col_of_reduced.iter().enumerate() {
        x[old] = reduced_x[new];
    }
    for entry in tape.entries.iter().rev() {
        match entry {
            TapeEntry::FixedCol { col, value } => x[*col] = *value,
            TapeEntry::Substituted {
                col,
                rhs,
                self_coef,
                terms,
                ..
            } => {
                let sum: E = terms.iter().map(|&(k, v)| v * x[k]).sum();
                x[*col] = (rhs - sum) / self_coef;
            }
            TapeEntry::ImpliedSlack {
                col,
                coef,
                lhs,
                rhs,
                lb,
                ub,
                terms,
                ..
            } => {
                let act: E = terms.iter().map(|&(k, v)| v * x[k]).sum();
                // Any x with lhs <= act + coef x <= rhs and lb <= x <= ub.
                let (mut lo, mut hi) = (*lb, *ub);
                if !is_infinite(*rhs) {
                    let limit = (rhs - act) / coef;
                    if *coef > 0.0 {
                        hi = hi.min(limit);
                    } else {
                        lo = lo.max(limit);
                    }
                }
                if !is_infinite(*lhs) {
                    let limit = (lhs - act) / coef;
                    if *coef > 0.0 {
                        lo = lo.max(limit);
                    } else {
                        hi = hi.min(limit);
                    }
                }
                x[*col] = if lo <= hi { lo } else { (lo + hi) / 2.0 };
            }
            TapeEntry::DroppedRow { .. } => {}
        }
    }
    x
}

/// Maps reduced row duals back to the original rows (eliminated rows carry
/// zero duals).
pub fn postsolve_duals(tape: &Tape, reduced_y: &[E]) -> Vec<E> {
    let mut y = vec![0.0; tape.orig_rows];
    for (new, &old) in tape.row_of_reduced.iter().enumerate() {
        y[old] = reduced_y[new];
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConstraintKind;

    fn presolve_all(model: &Model) -> PresolveResult {
        Presolver::new(presolve_ops::ALL_REDUCTIONS, 0).presolve(model)
    }

    #[test]
    fn fixed_and_empty_columns_vanish() {
        let mut m = Model::new(0, 3);
        m.set_maximize(true);
        m.set_obj_fn(&[1.0, 2.0, 3.0]).unwrap();
        m.set_bounds(0, 5.0, 5.0).unwrap(); // fixed
        m.set_bounds(1, 0.0, 7.0).unwrap(); // empty, favorable at ub
        m.set_bounds(2, 0.0, 9.0).unwrap();
        m.add_constraint(&[0.0, 0.0, 1.0], ConstraintKind::Le, 4.0)
            .unwrap();
        let res = presolve_all(&m);
        // Columns 0 and 1 disappear; the singleton row becomes a bound.
        assert_eq!(res.model.n_cols(), 0);
        assert_eq!(res.model.n_rows(), 0);
        let x = postsolve_primal(&res.tape, &[]);
        assert_eq!(x[0], 5.0);
        assert_eq!(x[1], 7.0);
        assert_eq!(x[2], 4.0); // tightened then fixed at favorable bound
    }

    #[test]
    fn singleton_row_tightens_bound() {
        let mut m = Model::new(0, 2);
        m.set_obj_fn(&[1.0, 1.0]).unwrap();
        m.set_bounds(0, 0.0, 100.0).unwrap();
        m.set_bounds(1, 0.0, 100.0).unwrap();
        m.add_constraint(&[2.0, 0.0], ConstraintKind::Le, 10.0)
            .unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 50.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::ROWS, 0).presolve(&m);
        assert_eq!(res.model.n_rows(), 1);
        assert_eq!(res.model.n_cols(), 2);
        assert_eq!(res.model.var(0).ub, 5.0);
    }

    #[test]
    fn infeasible_row_detected() {
        let mut m = Model::new(0, 1);
        m.set_bounds(0, 0.0, 1.0).unwrap();
        m.add_constraint(&[1.0], ConstraintKind::Ge, 5.0).unwrap();
        let res = Presolver::new(presolve_ops::ROWS, 0).presolve(&m);
        assert_eq!(res.verdict, Some(Status::Infeasible));
    }

    #[test]
    fn redundant_row_dropped() {
        let mut m = Model::new(0, 2);
        m.set_bounds(0, 0.0, 1.0).unwrap();
        m.set_bounds(1, 0.0, 1.0).unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 10.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::ROWS, 0).presolve(&m);
        assert_eq!(res.model.n_rows(), 0);
        assert_eq!(res.eliminated_rows, 1);
    }

    #[test]
    fn forcing_row_fixes_all() {
        // x + y >= 2 with x,y in [0,1] forces both to 1.
        let mut m = Model::new(0, 2);
        m.set_bounds(0, 0.0, 1.0).unwrap();
        m.set_bounds(1, 0.0, 1.0).unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Ge, 2.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::ROWS, 0).presolve(&m);
        assert_eq!(res.model.n_cols(), 0);
        let x = postsolve_primal(&res.tape, &[]);
        assert_eq!(x, vec![1.0, 1.0]);
    }

    #[test]
    fn bound_strengthening_propagates() {
        // x + y <= 4, x in [0, 10], y in [2, 10] -> x <= 2, y <= 4.
        let mut m = Model::new(0, 2);
        m.set_bounds(0, 0.0, 10.0).unwrap();
        m.set_bounds(1, 2.0, 10.0).unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 4.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::BOUNDS, 0).presolve(&m);
        assert_eq!(res.model.var(0).ub, 2.0);
        assert_eq!(res.model.var(1).ub, 4.0);
    }

    #[test]
    fn gcd_reduction_rounds_sides() {
        let mut m = Model::new(0, 2);
        m.set_int(0, true).unwrap();
        m.set_int(1, true).unwrap();
        m.set_bounds(0, 0.0, 10.0).unwrap();
        m.set_bounds(1, 0.0, 10.0).unwrap();
        m.add_constraint(&[2.0, 4.0], ConstraintKind::Le, 7.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::REDUCE_GCD, 0).presolve(&m);
        // 2x + 4y <= 7 divides to x + 2y <= 3.5 and floors to 3.
        assert_eq!(res.model.get_mat(0, 0), 1.0);
        assert_eq!(res.model.get_mat(0, 1), 2.0);
        assert_eq!(res.model.row(0).rhs, 3.0);
    }

    #[test]
    fn parallel_rows_merge() {
        let mut m = Model::new(0, 2);
        m.set_bounds(0, 0.0, 10.0).unwrap();
        m.set_bounds(1, 0.0, 10.0).unwrap();
        m.add_constraint(&[1.0, 2.0], ConstraintKind::Le, 8.0)
            .unwrap();
        m.add_constraint(&[2.0, 4.0], ConstraintKind::Le, 12.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::MERGE_ROWS, 0).presolve(&m);
        assert_eq!(res.model.n_rows(), 1);
        // Tighter of 8 and 12/2 = 6 survives.
        assert_eq!(res.model.row(0).rhs, 6.0);
    }

    #[test]
    fn eq2_substitution_preserves_solutions() {
        // x + y = 4, 2x + z <= 6, max x + 2y + z.
        let mut m = Model::new(0, 3);
        m.set_maximize(true);
        m.set_obj_fn(&[1.0, 2.0, 1.0]).unwrap();
        m.set_bounds(0, 0.0, 4.0).unwrap();
        m.set_bounds(1, 0.0, 4.0).unwrap();
        m.set_bounds(2, 0.0, 3.0).unwrap();
        m.add_constraint(&[1.0, 1.0, 0.0], ConstraintKind::Eq, 4.0)
            .unwrap();
        m.add_constraint(&[2.0, 0.0, 1.0], ConstraintKind::Le, 6.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::ELIM_EQ2, 0).presolve(&m);
        assert!(res.model.n_cols() < 3);
        // Feed a reduced solution through postsolve and check the original
        // equality holds.
        let reduced_n = res.model.n_cols();
        let x_reduced = vec![1.0; reduced_n];
        let x = postsolve_primal(&res.tape, &x_reduced);
        assert!((x[0] + x[1] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn probe_fixes_forced_binary() {
        // y binary; x in [3, 5]; x + 5y <= 6 makes y = 1 impossible.
        let mut m = Model::new(0, 2);
        m.set_bounds(0, 3.0, 5.0).unwrap();
        m.set_binary(1, true).unwrap();
        m.add_constraint(&[1.0, 5.0], ConstraintKind::Le, 6.0)
            .unwrap();
        let res =
            Presolver::new(presolve_ops::PROBE_FIX | presolve_ops::COLS, 0).presolve(&m);
        let x = postsolve_primal(&res.tape, &vec![3.0; res.model.n_cols()]);
        assert_eq!(x[1], 0.0);
    }

    #[test]
    fn loops_respect_cap() {
        let mut m = Model::new(0, 2);
        m.set_bounds(0, 0.0, 10.0).unwrap();
        m.set_bounds(1, 0.0, 10.0).unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 4.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::ALL_REDUCTIONS, 1).presolve(&m);
        assert!(res.loops <= 1);
    }

    #[test]
    fn none_is_identity() {
        let mut m = Model::new(0, 2);
        m.set_obj_fn(&[1.0, 1.0]).unwrap();
        m.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 4.0)
            .unwrap();
        let res = Presolver::new(presolve_ops::NONE, 0).presolve(&m);
        assert_eq!(res.model.n_cols(), 2);
        assert_eq!(res.model.n_rows(), 1);
        assert_eq!(res.eliminated_rows, 0);
        assert_eq!(res.eliminated_cols, 0);
    }
}
