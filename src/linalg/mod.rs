//! Sparse linear algebra for the simplex engine.
//!
//! [`factor::BasisFactorization`] maintains an LU factorization of the
//! current basis with dynamic Markowitz pivoting and exposes the forward
//! (FTRAN) and backward (BTRAN) transformations. Basis exchanges are
//! absorbed by [`eta`] updates (product-form or Forest–Tomlin) until a
//! refactorization trigger fires.

pub mod eta;
pub mod factor;

pub use eta::UpdateMode;
pub use factor::{BasisFactorization, BfpOptions, FactorInfo, UpdateStatus};

use crate::SolverError;

/// Named basis-factorization engines. The registry is fixed at build time
/// and read-only thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BfpKind {
    /// LU with Forest–Tomlin updates of the upper factor.
    #[default]
    ForestTomlin,
    /// LU with product-form eta updates.
    ProductForm,
}

impl BfpKind {
    /// Looks up an engine by name; unknown names surface as the `NoBfp`
    /// condition at the façade.
    pub fn from_name(name: &str) -> Result<BfpKind, SolverError> {
        match name {
            "LUSOL" | "lusol" | "forest-tomlin" | "ft" => Ok(BfpKind::ForestTomlin),
            "etaPFI" | "etapfi" | "product-form" | "pfi" => Ok(BfpKind::ProductForm),
            _ => Err(SolverError::Unsupported),
        }
    }

    pub fn update_mode(self) -> UpdateMode {
        match self {
            BfpKind::ForestTomlin => UpdateMode::ForestTomlin,
            BfpKind::ProductForm => UpdateMode::ProductForm,
        }
    }
}
