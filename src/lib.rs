use derive_more::{Display, Error};

/// Element type used throughout the solver.
pub type E = f64;
/// Index type used throughout the solver.
pub type I = usize;

/// Conventional infinity: bounds at or beyond this magnitude are treated as
/// unbounded, both on input and when reporting.
pub const INFINITY: E = 1e30;

pub mod callback;
pub mod interface;
pub mod linalg;
pub mod matrix;
pub mod mip;
pub mod model;
pub mod params;
pub mod presolve;
pub mod rng;
pub mod scale;
pub mod simplex;
pub mod solver;
pub mod terminators;

#[cfg(test)]
pub mod tests;

/// Returns `true` when `v` lies at or beyond the conventional infinity.
#[inline]
pub fn is_infinite(v: E) -> bool {
    v.abs() >= INFINITY
}

/// Status codes for the solver.
///
/// The numeric values are stable and part of the public surface; hosts that
/// store or compare raw codes can rely on them across releases.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Status {
    /// An unexpected internal error occurred.
    UnknownError,
    /// Part of the input was ignored (e.g. duplicate entries).
    DataIgnored,
    /// No basis factorization engine is available.
    NoBfp,
    /// Memory allocation failed.
    NoMemory,
    #[default]
    /// The solver has not been run on the current model.
    NotRun,
    /// An optimal solution was found.
    Optimal,
    /// A feasible but not provably optimal solution was found.
    Suboptimal,
    /// The problem is infeasible.
    Infeasible,
    /// The problem is unbounded.
    Unbounded,
    /// The solver stalled on a degenerate vertex.
    Degenerate,
    /// A numerical failure could not be recovered.
    NumFailure,
    /// The abort callback requested termination.
    UserAbort,
    /// The time limit was reached.
    Timeout,
    /// The solver is still running.
    Running,
    /// Presolve finished without invoking the simplex method.
    Presolved,
    /// A branch-and-bound procedure failed.
    ProcFail,
    /// A branch-and-bound procedure was interrupted by an early break.
    ProcBreak,
    /// An improved integer-feasible solution was found.
    FeasFound,
    /// No integer-feasible solution was found.
    NoFeasFound,
    /// The node was fathomed.
    Fathomed,
}

impl Status {
    /// The stable numeric code for this status.
    pub fn code(self) -> i32 {
        match self {
            Status::UnknownError => -5,
            Status::DataIgnored => -4,
            Status::NoBfp => -3,
            Status::NoMemory => -2,
            Status::NotRun => -1,
            Status::Optimal => 0,
            Status::Suboptimal => 1,
            Status::Infeasible => 2,
            Status::Unbounded => 3,
            Status::Degenerate => 4,
            Status::NumFailure => 5,
            Status::UserAbort => 6,
            Status::Timeout => 7,
            Status::Running => 8,
            Status::Presolved => 9,
            Status::ProcFail => 10,
            Status::ProcBreak => 11,
            Status::FeasFound => 12,
            Status::NoFeasFound => 13,
            Status::Fathomed => 14,
        }
    }

    /// Reconstructs a status from its stable numeric code.
    pub fn from_code(code: i32) -> Option<Status> {
        let all = [
            Status::UnknownError,
            Status::DataIgnored,
            Status::NoBfp,
            Status::NoMemory,
            Status::NotRun,
            Status::Optimal,
            Status::Suboptimal,
            Status::Infeasible,
            Status::Unbounded,
            Status::Degenerate,
            Status::NumFailure,
            Status::UserAbort,
            Status::Timeout,
            Status::Running,
            Status::Presolved,
            Status::ProcFail,
            Status::ProcBreak,
            Status::FeasFound,
            Status::NoFeasFound,
            Status::Fathomed,
        ];
        all.into_iter().find(|s| s.code() == code)
    }

    /// `true` for statuses that carry a usable solution vector.
    pub fn has_solution(self) -> bool {
        matches!(
            self,
            Status::Optimal | Status::Suboptimal | Status::FeasFound | Status::ProcBreak
        )
    }
}

/// Verbosity levels for log output.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub enum Verbosity {
    /// No output at all.
    Neutral,
    /// Only critical messages.
    Critical,
    /// Severe errors.
    Severe,
    /// Important warnings.
    #[default]
    Important,
    /// Normal progress output.
    Normal,
    /// Detailed progress output.
    Detailed,
    /// Everything, including per-iteration traces.
    Full,
}

impl Verbosity {
    pub fn from_level(level: i64) -> Verbosity {
        match level {
            i64::MIN..=0 => Verbosity::Neutral,
            1 => Verbosity::Critical,
            2 => Verbosity::Severe,
            3 => Verbosity::Important,
            4 => Verbosity::Normal,
            5 => Verbosity::Detailed,
            _ => Verbosity::Full,
        }
    }
}

/// Errors reported by the public surface.
///
/// Invalid input never leaves the model partially mutated: the offending
/// operation is rejected before any state change.
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum SolverError {
    #[display("row or column index out of range")]
    InvalidIndex,

    #[display("lower bound exceeds upper bound")]
    InvalidBounds,

    #[display("vector length does not match model dimensions")]
    DimensionMismatch,

    #[display("operation requires a solved model")]
    NotSolved,

    #[display("memory allocation failed")]
    OutOfMemory,

    #[display("unknown parameter name")]
    UnknownParameter,

    #[display("parameter value has the wrong type or is out of range")]
    ParameterValue,

    #[display("basis is singular and could not be repaired")]
    SingularBasis,

    #[display("numerical failure")]
    Numerical,

    #[display("operation is not supported in the current solver state")]
    Unsupported,

    #[display("i/o error: {message}")]
    Io { message: String },

    #[display("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

impl From<std::io::Error> for SolverError {
    fn from(err: std::io::Error) -> Self {
        SolverError::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(Status::NotRun.code(), -1);
        assert_eq!(Status::Optimal.code(), 0);
        assert_eq!(Status::Infeasible.code(), 2);
        assert_eq!(Status::Unbounded.code(), 3);
        assert_eq!(Status::UserAbort.code(), 6);
        assert_eq!(Status::Timeout.code(), 7);
        assert_eq!(Status::Fathomed.code(), 14);
        for code in -5..=14 {
            assert_eq!(Status::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Status::from_code(99), None);
    }

    #[test]
    fn verbosity_ordering() {
        assert!(Verbosity::Neutral < Verbosity::Important);
        assert!(Verbosity::Important < Verbosity::Full);
        assert_eq!(Verbosity::from_level(5), Verbosity::Detailed);
    }
}
