//! Ratio tests and anti-degeneracy devices.
//!
//! The primal leaving choice is a Harris two-pass test: the first pass
//! finds the longest step any basic variable tolerates within a relaxed
//! feasibility band, the second picks the numerically largest pivot among
//! the candidates that block within that step. Boxed entering variables may
//! flip to their opposite bound instead of pivoting. The dual entering
//! choice applies the same two-pass idea to reduced-cost ratios.

use crate::E;
use crate::rng::XorShift64;

/// Anti-degeneracy strategy bits for the `anti_degen` parameter.
pub mod anti_degen {
    pub const NONE: i64 = 0;
    /// Skip fixed variables during pricing.
    pub const FIXED_VARS: i64 = 1 << 0;
    /// Re-check the entering column against the ratio-test pivot.
    pub const COLUMN_CHECK: i64 = 1 << 1;
    /// Enable the stalling detector and perturbation recovery.
    pub const STALLING: i64 = 1 << 2;
    /// Recover from numerical failures with a refactor-and-retry.
    pub const NUM_FAILURE: i64 = 1 << 3;
    /// Re-run phase 1 when feasibility is lost in phase 2.
    pub const LOST_FEAS: i64 = 1 << 4;
    /// Randomized RHS relaxation when phase 1 stalls infeasible.
    pub const INFEASIBLE: i64 = 1 << 5;
    /// Re-tune the strategy while the solve is running.
    pub const DYNAMIC: i64 = 1 << 6;
    /// Apply the devices inside branch-and-bound nodes as well.
    pub const DURING_BB: i64 = 1 << 7;
    /// Perturb the RHS rather than variable bounds.
    pub const RHS_PERTURB: i64 = 1 << 8;
    /// Allow bound flips of boxed variables in the ratio test.
    pub const BOUND_FLIP: i64 = 1 << 9;
}

/// Outcome of the primal ratio test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatioOutcome {
    /// The basic variable at `pos` blocks after `step`; it leaves toward
    /// its lower bound when `to_lower` is set.
    Leaving { pos: usize, step: E, to_lower: bool },
    /// The entering variable reaches its opposite bound first; no basis
    /// change.
    BoundFlip { step: E },
    /// Nothing blocks: the problem is unbounded in this direction.
    Unbounded,
}

/// Harris two-pass primal ratio test.
///
/// Movement model: basic values change as `x_i(t) = x_i - t * alpha[i]` for
/// step `t >= 0`. `blk_lo`/`blk_hi` are the effective blocking bounds per
/// basic position (the caller encodes phase-1 pass-through semantics by
/// widening them); `flip_limit` is the entering variable's own bound range
/// when a flip is admissible.
pub fn harris_ratio(
    xb: &[E],
    alpha: &[E],
    blk_lo: &[E],
    blk_hi: &[E],
    flip_limit: Option<E>,
    eps_b: E,
    eps_pivot: E,
) -> RatioOutcome {
    // Pass 1: longest step within the relaxed band.
    let mut t_max = E::INFINITY;
    let mut t_max_pos = usize::MAX;
    for i in 0..xb.len() {
        let a = alpha[i];
        let relaxed = if a > eps_pivot {
            if blk_lo[i] > -E::INFINITY {
                (xb[i] - (blk_lo[i] - eps_b)) / a
            } else {
                continue;
            }
        } else if a < -eps_pivot {
            if blk_hi[i] < E::INFINITY {
                (xb[i] - (blk_hi[i] + eps_b)) / a
            } else {
                continue;
            }
        } else {
            continue;
        };
        if relaxed < t_max {
            t_max = relaxed;
            t_max_pos = i;
        }
    }

    if t_max == E::INFINITY {
        return match flip_limit {
            Some(limit) => RatioOutcome::BoundFlip { step: limit },
            None => RatioOutcome::Unbounded,
        };
    }

    // Pass 2: among blockers within the relaxed step, take the largest
    // pivot magnitude for stability.
    let mut best: Option<(usize, E, E)> = None; // (pos, exact step, |pivot|)
    for i in 0..xb.len() {
        let a = alpha[i];
        let exact = if a > eps_pivot && blk_lo[i] > -E::INFINITY {
            (xb[i] - blk_lo[i]) / a
        } else if a < -eps_pivot && blk_hi[i] < E::INFINITY {
            (xb[i] - blk_hi[i]) / a
        } else {
            continue;
        };
        if exact <= t_max {
            let mag = a.abs();
            let better = match best {
                None => true,
                Some((_, _, bmag)) => mag > bmag,
            };
            if better {
                best = Some((i, exact.max(0.0), mag));
            }
        }
    }

    // The pass-1 minimizer always qualifies for pass 2, so a blocker
    // exists; fall back to it directly if rounding hid every candidate.
    let (pos, step, _) = best.unwrap_or((t_max_pos, t_max.max(0.0), alpha[t_max_pos].abs()));

    if let Some(limit) = flip_limit {
        if limit <= step {
            return RatioOutcome::BoundFlip { step: limit };
        }
    }
    RatioOutcome::Leaving {
        pos,
        step,
        to_lower: alpha[pos] > 0.0,
    }
}

/// Two-pass dual ratio test over admissible entering candidates
/// `(column, reduced cost, pivot-row entry)`. Returns the index of the
/// chosen candidate.
pub fn dual_ratio(cand: &[(usize, E, E)], eps_d: E, eps_pivot: E) -> Option<usize> {
    let mut d_max = E::INFINITY;
    for &(_, d, a) in cand {
        if a.abs() > eps_pivot {
            d_max = d_max.min((d.abs() + eps_d) / a.abs());
        }
    }
    if d_max == E::INFINITY {
        return None;
    }
    let mut best: Option<(usize, E)> = None;
    for (k, &(_, d, a)) in cand.iter().enumerate() {
        if a.abs() <= eps_pivot {
            continue;
        }
        if d.abs() / a.abs() <= d_max {
            let better = match best {
                None => true,
                Some((_, bmag)) => a.abs() > bmag,
            };
            if better {
                best = Some((k, a.abs()));
            }
        }
    }
    best.map(|(k, _)| k)
}

/// Counts consecutive epsilon-steps; a stall triggers the recovery devices.
#[derive(Debug, Clone)]
pub struct StallMonitor {
    consecutive: usize,
    threshold: usize,
}

impl StallMonitor {
    pub fn new(threshold: usize) -> Self {
        Self {
            consecutive: 0,
            threshold,
        }
    }

    /// Records a step; returns `true` when the stall threshold is reached.
    pub fn observe(&mut self, step: E, eps: E) -> bool {
        if step.abs() <= eps {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= self.threshold
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Minimally invasive randomized bound relaxation, retracted once progress
/// resumes.
#[derive(Debug, Clone, Default)]
pub struct Perturbation {
    saved: Vec<(usize, E, E)>,
}

impl Perturbation {
    pub fn is_active(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Widens the bounds of the listed variables outward by random amounts
    /// up to `eps_perturb`. Widening preserves feasibility of the current
    /// point while breaking degenerate ties.
    pub fn apply(
        &mut self,
        lb: &mut [E],
        ub: &mut [E],
        targets: &[usize],
        rng: &mut XorShift64,
        eps_perturb: E,
    ) {
        for &j in targets {
            if self.saved.iter().any(|&(k, _, _)| k == j) {
                continue;
            }
            self.saved.push((j, lb[j], ub[j]));
            if lb[j] > -E::INFINITY {
                lb[j] -= eps_perturb * (0.5 + rng.next_unit());
            }
            if ub[j] < E::INFINITY {
                ub[j] += eps_perturb * (0.5 + rng.next_unit());
            }
        }
    }

    /// Restores every perturbed bound.
    pub fn retract(&mut self, lb: &mut [E], ub: &mut [E]) {
        for (j, l, u) in self.saved.drain(..) {
            lb[j] = l;
            ub[j] = u;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_minimum_ratio() {
        // x = [4, 6, 8], alpha = [2, 3, 1]: ratios to lb=0 are 2, 2, 8.
        // Harris picks the larger pivot among the tied blockers (|3| > |2|).
        let xb = [4.0, 6.0, 8.0];
        let alpha = [2.0, 3.0, 1.0];
        let lo = [0.0, 0.0, 0.0];
        let hi = [E::INFINITY; 3];
        match harris_ratio(&xb, &alpha, &lo, &hi, None, 1e-9, 1e-9) {
            RatioOutcome::Leaving { pos, step, to_lower } => {
                assert_eq!(pos, 1);
                assert!((step - 2.0).abs() < 1e-7);
                assert!(to_lower);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn unbounded_when_nothing_blocks() {
        let xb = [1.0, 1.0];
        let alpha = [-1.0, -2.0];
        let lo = [0.0, 0.0];
        let hi = [E::INFINITY; 2];
        assert_eq!(
            harris_ratio(&xb, &alpha, &lo, &hi, None, 1e-9, 1e-9),
            RatioOutcome::Unbounded
        );
    }

    #[test]
    fn bound_flip_preempts_pivot() {
        // The entering variable's own range (1.5) is shorter than the
        // blocking ratio (2.0).
        let xb = [4.0];
        let alpha = [2.0];
        let lo = [0.0];
        let hi = [E::INFINITY];
        assert_eq!(
            harris_ratio(&xb, &alpha, &lo, &hi, Some(1.5), 1e-9, 1e-9),
            RatioOutcome::BoundFlip { step: 1.5 }
        );
    }

    #[test]
    fn blocks_at_upper_bound_for_negative_alpha() {
        // alpha < 0 moves the basic variable upward toward its upper bound.
        let xb = [1.0];
        let alpha = [-1.0];
        let lo = [0.0];
        let hi = [3.0];
        match harris_ratio(&xb, &alpha, &lo, &hi, None, 1e-9, 1e-9) {
            RatioOutcome::Leaving { pos, step, to_lower } => {
                assert_eq!(pos, 0);
                assert!((step - 2.0).abs() < 1e-7);
                assert!(!to_lower);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn dual_ratio_prefers_stable_pivot() {
        // Candidates with equal cost ratios: take the larger |alpha|.
        let cand = [(0, 1.0, 0.5), (1, 2.0, 1.0), (2, 10.0, 0.1)];
        let k = dual_ratio(&cand, 1e-9, 1e-9).unwrap();
        assert_eq!(cand[k].0, 1);
    }

    #[test]
    fn stall_monitor_triggers_and_resets() {
        let mut mon = StallMonitor::new(3);
        assert!(!mon.observe(0.0, 1e-9));
        assert!(!mon.observe(0.0, 1e-9));
        assert!(mon.observe(0.0, 1e-9));
        assert!(!mon.observe(1.0, 1e-9)); // progress resets the count
    }

    #[test]
    fn perturbation_retracts_exactly() {
        let mut lb = vec![0.0, 1.0];
        let mut ub = vec![5.0, 2.0];
        let mut rng = XorShift64::new(9);
        let mut pert = Perturbation::default();
        pert.apply(&mut lb, &mut ub, &[0, 1], &mut rng, 1e-6);
        assert!(pert.is_active());
        assert!(lb[0] < 0.0 && ub[1] > 2.0);
        pert.retract(&mut lb, &mut ub);
        assert_eq!(lb, vec![0.0, 1.0]);
        assert_eq!(ub, vec![5.0, 2.0]);
        assert!(!pert.is_active());
    }
}
