//! Eta transformations layered on top of a base LU factorization.
//!
//! A basis exchange replaces one column of `B`. Rather than refactorizing,
//! the exchange is absorbed into an update file that FTRAN/BTRAN apply
//! around the base factors:
//!
//! - **Product form** (`B_new = B_old * E`): each update appends a column
//!   eta built from the transformed entering column; solves apply the etas
//!   in sequence after (FTRAN) or before (BTRAN) the base factors.
//! - **Forest–Tomlin**: the update rewrites the upper factor itself through
//!   a permutation-and-spike step; the row elimination multipliers land
//!   here as row etas applied between `L` and `U`.

use crate::E;

/// Update strategy for basis exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    ForestTomlin,
    ProductForm,
}

/// A product-form eta: identity with column `pivot_pos` replaced by the
/// transformed entering column.
#[derive(Debug, Clone)]
pub struct ProductEta {
    /// Basis position of the replaced column.
    pub pivot_pos: usize,
    /// Pivot element `alpha[pivot_pos]`.
    pub pivot_val: E,
    /// Off-pivot nonzeros `(basis position, alpha value)`.
    pub entries: Vec<(usize, E)>,
}

impl ProductEta {
    /// Builds the eta from the FTRAN-transformed entering column.
    pub fn from_alpha(alpha: &[E], pivot_pos: usize, drop_eps: E) -> ProductEta {
        let entries = alpha
            .iter()
            .enumerate()
            .filter(|&(i, &v)| i != pivot_pos && v.abs() > drop_eps)
            .map(|(i, &v)| (i, v))
            .collect();
        ProductEta {
            pivot_pos,
            pivot_val: alpha[pivot_pos],
            entries,
        }
    }

    /// `x <- E^{-1} x` (forward direction, basis-position coordinates).
    pub fn apply(&self, x: &mut [E]) {
        let xr = x[self.pivot_pos] / self.pivot_val;
        x[self.pivot_pos] = xr;
        if xr != 0.0 {
            for &(i, v) in &self.entries {
                x[i] -= v * xr;
            }
        }
    }

    /// `y <- E^{-T} y` (backward direction).
    pub fn apply_transposed(&self, y: &mut [E]) {
        let mut acc = y[self.pivot_pos];
        for &(i, v) in &self.entries {
            acc -= v * y[i];
        }
        y[self.pivot_pos] = acc / self.pivot_val;
    }
}

/// A Forest–Tomlin row eta: `row[target] -= mult * row[source]` applied to
/// the spiked upper factor. Rows are original (unpermuted) indices.
#[derive(Debug, Clone, Copy)]
pub struct RowEta {
    pub target: usize,
    pub source: usize,
    pub mult: E,
}

impl RowEta {
    /// Forward application to a work vector in original-row coordinates.
    #[inline]
    pub fn apply(&self, z: &mut [E]) {
        let d = self.mult * z[self.source];
        if d != 0.0 {
            z[self.target] -= d;
        }
    }

    /// Transposed application (backward direction).
    #[inline]
    pub fn apply_transposed(&self, y: &mut [E]) {
        let d = self.mult * y[self.target];
        if d != 0.0 {
            y[self.source] -= d;
        }
    }
}

/// The update stack accumulated since the last full factorization.
#[derive(Debug, Clone, Default)]
pub struct EtaFile {
    pub product: Vec<ProductEta>,
    pub rows: Vec<RowEta>,
}

impl EtaFile {
    pub fn clear(&mut self) {
        self.product.clear();
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_eta_inverts_column_replacement() {
        // B_old = I (3x3); entering column a = [2, 1, 4]^T replaces
        // position 1, so alpha = a. E = I with column 1 := alpha.
        let alpha = [2.0, 1.0, 4.0];
        let eta = ProductEta::from_alpha(&alpha, 1, 1e-12);
        // Solve E x = b for b = [3, 5, 7]: x1 = 5, x0 = 3 - 2*5 = -7,
        // x2 = 7 - 4*5 = -13.
        let mut x = [3.0, 5.0, 7.0];
        eta.apply(&mut x);
        assert_eq!(x, [-7.0, 5.0, -13.0]);
    }

    #[test]
    fn product_eta_transpose_matches_explicit() {
        let alpha = [0.5, -1.0, 2.0];
        let eta = ProductEta::from_alpha(&alpha, 2, 1e-12);
        // E^T y = c with E = I except column 2 := alpha. Then
        // (E^T y)_i = y_i for i != 2, and (E^T y)_2 = alpha . y.
        // Solving for y: y_i = c_i (i != 2), y_2 = (c_2 - 0.5 c_0 + c_1)/2.
        let mut y = [1.0, 2.0, 3.0];
        eta.apply_transposed(&mut y);
        assert!((y[0] - 1.0).abs() < 1e-12);
        assert!((y[1] - 2.0).abs() < 1e-12);
        assert!((y[2] - (3.0 - 0.5 * 1.0 + 1.0 * 2.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn row_eta_forward_backward_are_transposes() {
        let eta = RowEta {
            target: 0,
            source: 2,
            mult: 1.5,
        };
        // Forward: z0 -= 1.5 z2. Matrix R = I - 1.5 e0 e2^T.
        let mut z = [4.0, 1.0, 2.0];
        eta.apply(&mut z);
        assert_eq!(z, [1.0, 1.0, 2.0]);
        // Transposed: y2 -= 1.5 y0.
        let mut y = [4.0, 1.0, 2.0];
        eta.apply_transposed(&mut y);
        assert_eq!(y, [4.0, 1.0, -4.0]);
    }
}
