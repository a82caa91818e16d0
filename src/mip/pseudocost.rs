//! Pseudo-costs: empirical objective degradation per unit of rounding,
//! accumulated per variable and direction across past branches.

use crate::E;

#[derive(Debug, Clone, Copy, Default)]
struct Accum {
    sum: E,
    count: usize,
}

impl Accum {
    fn mean(&self, fallback: E) -> E {
        if self.count == 0 {
            fallback
        } else {
            self.sum / self.count as E
        }
    }
}

/// Per-variable (down, up) degradation accumulators with an update cap.
#[derive(Debug, Clone)]
pub struct PseudoCosts {
    down: Vec<Accum>,
    up: Vec<Accum>,
    update_limit: usize,
    /// Average over all initialized accumulators, the fallback estimate.
    global: Accum,
}

impl PseudoCosts {
    pub fn new(n: usize) -> Self {
        Self {
            down: vec![Accum::default(); n],
            up: vec![Accum::default(); n],
            update_limit: 100,
            global: Accum::default(),
        }
    }

    pub fn is_initialized(&self, var: usize) -> bool {
        self.down[var].count > 0 && self.up[var].count > 0
    }

    /// Records the observed objective degradation (internal maximization:
    /// a nonnegative loss) for branching `var` in the given direction over
    /// the given fractional distance.
    pub fn update(&mut self, var: usize, upward: bool, loss: E, frac_dist: E) {
        if frac_dist <= 1e-12 || loss < 0.0 {
            return;
        }
        let per_unit = loss / frac_dist;
        let acc = if upward {
            &mut self.up[var]
        } else {
            &mut self.down[var]
        };
        if acc.count < self.update_limit {
            acc.sum += per_unit;
            acc.count += 1;
        }
        if self.global.count < usize::MAX {
            self.global.sum += per_unit;
            self.global.count += 1;
        }
    }

    /// Estimated losses `(down, up)` of rounding a relaxation value with
    /// fractional part `frac`.
    pub fn estimate(&self, var: usize, frac: E) -> (E, E) {
        let fallback = self.global.mean(1.0).max(1e-6);
        let down = self.down[var].mean(fallback) * frac;
        let up = self.up[var].mean(fallback) * (1.0 - frac);
        (down, up)
    }

    /// The classical product score: variables whose both branches hurt are
    /// the most fruitful to branch on.
    pub fn score(&self, var: usize, frac: E) -> E {
        let (down, up) = self.estimate(var, frac);
        down.max(1e-6) * up.max(1e-6)
    }

    /// Score favoring variables with few initialized observations.
    pub fn noninit_score(&self, var: usize, frac: E) -> E {
        let obs = (self.down[var].count + self.up[var].count) as E;
        self.score(var, frac) / (1.0 + obs)
    }

    /// Ratio score: asymmetry between the two directions.
    pub fn ratio_score(&self, var: usize, frac: E) -> E {
        let (down, up) = self.estimate(var, frac);
        let (lo, hi) = if down < up { (down, up) } else { (up, down) };
        hi / lo.max(1e-9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_uses_global_fallback() {
        let mut pc = PseudoCosts::new(2);
        assert!(!pc.is_initialized(0));
        pc.update(1, true, 4.0, 0.5); // per-unit 8
        let (down, up) = pc.estimate(0, 0.5);
        // Both directions fall back to the global mean of 8.
        assert!((down - 4.0).abs() < 1e-9);
        assert!((up - 4.0).abs() < 1e-9);
    }

    #[test]
    fn directional_means_accumulate() {
        let mut pc = PseudoCosts::new(1);
        pc.update(0, false, 2.0, 0.5); // down: 4 per unit
        pc.update(0, false, 6.0, 0.5); // down: 12 per unit -> mean 8
        pc.update(0, true, 1.0, 0.25); // up: 4 per unit
        assert!(pc.is_initialized(0));
        let (down, up) = pc.estimate(0, 0.5);
        assert!((down - 4.0).abs() < 1e-9); // 8 * 0.5
        assert!((up - 2.0).abs() < 1e-9); // 4 * 0.5
    }

    #[test]
    fn product_score_prefers_balanced_pain() {
        let mut pc = PseudoCosts::new(2);
        pc.update(0, false, 10.0, 1.0);
        pc.update(0, true, 10.0, 1.0);
        pc.update(1, false, 19.0, 1.0);
        pc.update(1, true, 1.0, 1.0);
        assert!(pc.score(0, 0.5) > pc.score(1, 0.5));
    }

    #[test]
    fn negative_loss_ignored() {
        let mut pc = PseudoCosts::new(1);
        pc.update(0, true, -5.0, 0.5);
        assert!(!pc.is_initialized(0));
    }
}
