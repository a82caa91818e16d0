//! The parameter store.
//!
//! Every tunable of the solver lives here as a typed field, mirrored through
//! a tagged [`ParamValue`] so hosts can read and write parameters by name.
//! The textual format is one `key = value` pair per line with `#` comments;
//! unknown keys are rejected.

use serde::{Deserialize, Serialize};

use crate::{E, SolverError};

/// A dynamically typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Real(E),
    Bool(bool),
}

impl ParamValue {
    fn parse(text: &str) -> Option<ParamValue> {
        match text {
            "true" => return Some(ParamValue::Bool(true)),
            "false" => return Some(ParamValue::Bool(false)),
            _ => {}
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(ParamValue::Int(i));
        }
        text.parse::<E>().ok().map(ParamValue::Real)
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Real(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Consistent epsilon profiles, from strictest to loosest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpsLevel {
    Tight,
    Medium,
    Loose,
    Baggy,
}

/// Global branching direction default.
pub mod floor_first {
    /// Take the ceiling branch first.
    pub const CEILING: i64 = 0;
    /// Take the floor branch first.
    pub const FLOOR: i64 = 1;
    /// Decide per variable from the fractional part.
    pub const AUTOMATIC: i64 = 2;
}

/// Solver tunables. Field groups mirror the public `set_*` surface; rule
/// fields carrying strategy bits (`pivoting`, `bb_rule`, `scaling`,
/// `presolve`, `anti_degen`, `improve`) hold the OR of the constants defined
/// next to their consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Log verbosity level (0..=6).
    pub verbose: i64,
    /// Wall-clock limit in seconds; zero disables.
    pub timeout: E,
    /// Print the solution after solving.
    pub print_sol: bool,
    /// Enable debug output.
    pub debug: bool,
    /// Enable per-iteration trace output.
    pub trace: bool,

    /// Anti-degeneracy strategy bits (see `simplex::ratio`).
    pub anti_degen: i64,
    /// Presolve technique bits (see `presolve`).
    pub presolve: i64,
    /// Presolve fixed-point loop cap; zero picks a model-derived default.
    pub presolve_maxloops: i64,
    /// Basis updates allowed before a forced refactorization.
    pub max_pivot: i64,
    /// Objective cutoff seeding the branch-and-bound incumbent; ignored by
    /// the pure-LP path.
    pub obj_bound: E,
    /// Absolute MIP gap for pruning.
    pub mip_gap_abs: E,
    /// Relative MIP gap for pruning.
    pub mip_gap_rel: E,
    /// Node selection rule and strategy bits (see `mip`).
    pub bb_rule: i64,
    /// Global branch direction default (`floor_first` constants).
    pub bb_floorfirst: i64,
    /// Branch-and-bound depth limit; negative means a multiple of
    /// `sqrt(rows + cols)`, zero means unlimited.
    pub bb_depthlimit: i64,
    /// Stop at the first integer-feasible solution.
    pub break_at_first: bool,
    /// Stop once the incumbent reaches this value; NaN disables.
    pub break_at_value: E,
    /// Bound below which a variable is split into a negative and positive
    /// part by presolve; zero disables.
    pub neg_range: E,

    /// Perturbation magnitude for stalling recovery.
    pub eps_perturb: E,
    /// Pivot magnitude rejection threshold.
    pub eps_pivot: E,
    /// Integrality tolerance.
    pub eps_int: E,
    /// Primal (RHS/bound) feasibility tolerance.
    pub eps_b: E,
    /// Dual (reduced-cost) feasibility tolerance.
    pub eps_d: E,
    /// Matrix element drop tolerance.
    pub eps_el: E,

    /// Scaling mode and bits (see `scale`).
    pub scaling: i64,
    /// Iteration cap for iterative scaling methods.
    pub scale_limit: E,
    /// Iterative improvement bits (see `simplex`).
    pub improve: i64,
    /// Pricing rule and strategy bits (see `simplex::pricing`).
    pub pivoting: i64,
    /// Phase-1 / phase-2 method pair (see `simplex::simplex_type`).
    pub simplex_type: i64,
    /// Number of rotating partial-pricing blocks; one disables.
    pub partial_price: i64,
    /// Candidate list size for multiple pricing; zero disables.
    pub multi_price: i64,
    /// Simplex iteration budget per LP (re)solve; zero means unlimited.
    pub max_iter: i64,
    /// Seed for the session-local random generator.
    pub seed: i64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            verbose: 1,
            timeout: 0.0,
            print_sol: false,
            debug: false,
            trace: false,
            anti_degen: 0,
            presolve: 0,
            presolve_maxloops: 0,
            max_pivot: 250,
            obj_bound: E::INFINITY,
            mip_gap_abs: 1e-11,
            mip_gap_rel: 1e-9,
            bb_rule: 0,
            bb_floorfirst: floor_first::CEILING,
            bb_depthlimit: -50,
            break_at_first: false,
            break_at_value: E::NAN,
            neg_range: 0.0,
            eps_perturb: 1e-5,
            eps_pivot: 2e-7,
            eps_int: 1e-7,
            eps_b: 1e-9,
            eps_d: 1e-9,
            eps_el: 1e-12,
            scaling: 0,
            scale_limit: 5.0,
            improve: 0,
            pivoting: 0,
            simplex_type: 1,
            partial_price: 1,
            multi_price: 0,
            max_iter: 0,
            seed: 0,
        }
    }
}

/// Names accepted by [`Params::set_by_name`] and produced by
/// [`Params::write_string`], in a stable order.
pub const PARAM_NAMES: &[&str] = &[
    "verbose",
    "timeout",
    "print_sol",
    "debug",
    "trace",
    "anti_degen",
    "presolve",
    "presolve_maxloops",
    "max_pivot",
    "obj_bound",
    "mip_gap_abs",
    "mip_gap_rel",
    "bb_rule",
    "bb_floorfirst",
    "bb_depthlimit",
    "break_at_first",
    "break_at_value",
    "neg_range",
    "eps_perturb",
    "eps_pivot",
    "eps_int",
    "eps_b",
    "eps_d",
    "eps_el",
    "scaling",
    "scale_limit",
    "improve",
    "pivoting",
    "simplex_type",
    "partial_price",
    "multi_price",
    "max_iter",
    "seed",
];

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one of the consistent epsilon profiles.
    pub fn set_eps_level(&mut self, level: EpsLevel) {
        let (el, pivot, b, d, int, perturb) = match level {
            EpsLevel::Tight => (1e-12, 2e-7, 1e-9, 1e-9, 1e-7, 1e-5),
            EpsLevel::Medium => (1e-11, 2e-7, 1e-9, 1e-8, 1e-7, 1e-5),
            EpsLevel::Loose => (1e-10, 2e-6, 1e-8, 1e-7, 1e-6, 1e-4),
            EpsLevel::Baggy => (1e-9, 2e-5, 1e-7, 1e-6, 1e-5, 1e-3),
        };
        self.eps_el = el;
        self.eps_pivot = pivot;
        self.eps_b = b;
        self.eps_d = d;
        self.eps_int = int;
        self.eps_perturb = perturb;
    }

    /// Reads a parameter by canonical name.
    pub fn get_by_name(&self, name: &str) -> Result<ParamValue, SolverError> {
        use ParamValue::*;
        Ok(match name {
            "verbose" => Int(self.verbose),
            "timeout" => Real(self.timeout),
            "print_sol" => Bool(self.print_sol),
            "debug" => Bool(self.debug),
            "trace" => Bool(self.trace),
            "anti_degen" => Int(self.anti_degen),
            "presolve" => Int(self.presolve),
            "presolve_maxloops" => Int(self.presolve_maxloops),
            "max_pivot" => Int(self.max_pivot),
            "obj_bound" => Real(self.obj_bound),
            "mip_gap_abs" => Real(self.mip_gap_abs),
            "mip_gap_rel" => Real(self.mip_gap_rel),
            "bb_rule" => Int(self.bb_rule),
            "bb_floorfirst" => Int(self.bb_floorfirst),
            "bb_depthlimit" => Int(self.bb_depthlimit),
            "break_at_first" => Bool(self.break_at_first),
            "break_at_value" => Real(self.break_at_value),
            "neg_range" => Real(self.neg_range),
            "eps_perturb" => Real(self.eps_perturb),
            "eps_pivot" => Real(self.eps_pivot),
            "eps_int" => Real(self.eps_int),
            "eps_b" => Real(self.eps_b),
            "eps_d" => Real(self.eps_d),
            "eps_el" => Real(self.eps_el),
            "scaling" => Int(self.scaling),
            "scale_limit" => Real(self.scale_limit),
            "improve" => Int(self.improve),
            "pivoting" => Int(self.pivoting),
            "simplex_type" => Int(self.simplex_type),
            "partial_price" => Int(self.partial_price),
            "multi_price" => Int(self.multi_price),
            "max_iter" => Int(self.max_iter),
            "seed" => Int(self.seed),
            _ => return Err(SolverError::UnknownParameter),
        })
    }

    /// Writes a parameter by canonical name, validating type and range.
    pub fn set_by_name(&mut self, name: &str, value: ParamValue) -> Result<(), SolverError> {
        fn int(v: &ParamValue) -> Result<i64, SolverError> {
            match v {
                ParamValue::Int(i) => Ok(*i),
                _ => Err(SolverError::ParameterValue),
            }
        }
        fn real(v: &ParamValue) -> Result<E, SolverError> {
            match v {
                ParamValue::Real(r) => Ok(*r),
                ParamValue::Int(i) => Ok(*i as E),
                _ => Err(SolverError::ParameterValue),
            }
        }
        fn boolean(v: &ParamValue) -> Result<bool, SolverError> {
            match v {
                ParamValue::Bool(b) => Ok(*b),
                ParamValue::Int(i) => Ok(*i != 0),
                _ => Err(SolverError::ParameterValue),
            }
        }
        fn nonneg(v: E) -> Result<E, SolverError> {
            if v >= 0.0 {
                Ok(v)
            } else {
                Err(SolverError::ParameterValue)
            }
        }
        match name {
            "verbose" => {
                let v = int(&value)?;
                if !(0..=6).contains(&v) {
                    return Err(SolverError::ParameterValue);
                }
                self.verbose = v;
            }
            "timeout" => self.timeout = nonneg(real(&value)?)?,
            "print_sol" => self.print_sol = boolean(&value)?,
            "debug" => self.debug = boolean(&value)?,
            "trace" => self.trace = boolean(&value)?,
            "anti_degen" => self.anti_degen = int(&value)?,
            "presolve" => self.presolve = int(&value)?,
            "presolve_maxloops" => self.presolve_maxloops = int(&value)?.max(0),
            "max_pivot" => {
                let v = int(&value)?;
                if v < 1 {
                    return Err(SolverError::ParameterValue);
                }
                self.max_pivot = v;
            }
            "obj_bound" => self.obj_bound = real(&value)?,
            "mip_gap_abs" => self.mip_gap_abs = nonneg(real(&value)?)?,
            "mip_gap_rel" => self.mip_gap_rel = nonneg(real(&value)?)?,
            "bb_rule" => self.bb_rule = int(&value)?,
            "bb_floorfirst" => {
                let v = int(&value)?;
                if !(0..=2).contains(&v) {
                    return Err(SolverError::ParameterValue);
                }
                self.bb_floorfirst = v;
            }
            "bb_depthlimit" => self.bb_depthlimit = int(&value)?,
            "break_at_first" => self.break_at_first = boolean(&value)?,
            "break_at_value" => self.break_at_value = real(&value)?,
            "neg_range" => self.neg_range = real(&value)?,
            "eps_perturb" => self.eps_perturb = nonneg(real(&value)?)?,
            "eps_pivot" => self.eps_pivot = nonneg(real(&value)?)?,
            "eps_int" => self.eps_int = nonneg(real(&value)?)?,
            "eps_b" => self.eps_b = nonneg(real(&value)?)?,
            "eps_d" => self.eps_d = nonneg(real(&value)?)?,
            "eps_el" => self.eps_el = nonneg(real(&value)?)?,
            "scaling" => self.scaling = int(&value)?,
            "scale_limit" => self.scale_limit = nonneg(real(&value)?)?,
            "improve" => self.improve = int(&value)?,
            "pivoting" => self.pivoting = int(&value)?,
            "simplex_type" => {
                let v = int(&value)?;
                if !(0..=5).contains(&v) {
                    return Err(SolverError::ParameterValue);
                }
                self.simplex_type = v;
            }
            "partial_price" => {
                let v = int(&value)?;
                if v < 1 {
                    return Err(SolverError::ParameterValue);
                }
                self.partial_price = v;
            }
            "multi_price" => self.multi_price = int(&value)?.max(0),
            "max_iter" => self.max_iter = int(&value)?.max(0),
            "seed" => self.seed = int(&value)?,
            _ => return Err(SolverError::UnknownParameter),
        }
        Ok(())
    }

    /// Serializes every parameter as `key = value` lines.
    pub fn write_string(&self) -> String {
        let mut out = String::from("# milpo solver parameters\n");
        for name in PARAM_NAMES {
            // get_by_name cannot fail for names in the table
            let value = self.get_by_name(name).unwrap();
            out.push_str(&format!("{} = {}\n", name, value));
        }
        out
    }

    /// Parses `key = value` lines produced by [`Params::write_string`].
    /// Unknown keys and malformed values are rejected with the offending
    /// line number.
    pub fn read_string(&mut self, text: &str) -> Result<(), SolverError> {
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or(SolverError::Parse {
                line: lineno + 1,
                message: "expected `key = value`".to_string(),
            })?;
            let key = key.trim();
            let value = ParamValue::parse(value.trim()).ok_or(SolverError::Parse {
                line: lineno + 1,
                message: "malformed value".to_string(),
            })?;
            self.set_by_name(key, value).map_err(|e| match e {
                SolverError::UnknownParameter => SolverError::Parse {
                    line: lineno + 1,
                    message: format!("unknown parameter `{}`", key),
                },
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn write_file(&self, path: &str) -> Result<(), SolverError> {
        std::fs::write(path, self.write_string())?;
        Ok(())
    }

    pub fn read_file(&mut self, path: &str) -> Result<(), SolverError> {
        let text = std::fs::read_to_string(path)?;
        self.read_string(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_text() {
        let params = Params::default();
        let text = params.write_string();
        let mut restored = Params::default();
        restored.max_pivot = 1; // perturb, then restore from text
        restored.read_string(&text).unwrap();
        // break_at_value is NaN by default and NaN != NaN; compare the rest
        assert_eq!(restored.max_pivot, params.max_pivot);
        assert_eq!(restored.eps_int, params.eps_int);
        assert_eq!(restored.scaling, params.scaling);
    }

    #[test]
    fn unknown_keys_rejected() {
        let mut params = Params::default();
        let err = params.read_string("no_such_param = 1\n").unwrap_err();
        assert!(matches!(err, SolverError::Parse { line: 1, .. }));
    }

    #[test]
    fn type_and_range_validation() {
        let mut params = Params::default();
        assert_eq!(
            params.set_by_name("verbose", ParamValue::Int(42)),
            Err(SolverError::ParameterValue)
        );
        assert_eq!(
            params.set_by_name("eps_int", ParamValue::Real(-1.0)),
            Err(SolverError::ParameterValue)
        );
        params
            .set_by_name("eps_int", ParamValue::Real(1e-6))
            .unwrap();
        assert_eq!(params.eps_int, 1e-6);
    }

    #[test]
    fn simplex_type_accepts_all_six_methods() {
        let mut params = Params::default();
        for v in 0..=5 {
            params
                .set_by_name("simplex_type", ParamValue::Int(v))
                .unwrap();
        }
        assert_eq!(
            params.set_by_name("simplex_type", ParamValue::Int(6)),
            Err(SolverError::ParameterValue)
        );
    }

    #[test]
    fn eps_levels_scale_the_family() {
        let mut tight = Params::default();
        tight.set_eps_level(EpsLevel::Tight);
        let mut baggy = Params::default();
        baggy.set_eps_level(EpsLevel::Baggy);
        assert!(tight.eps_el < baggy.eps_el);
        assert!(tight.eps_int < baggy.eps_int);
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let mut params = Params::default();
        params
            .read_string("# comment\n\nmax_pivot = 100\n")
            .unwrap();
        assert_eq!(params.max_pivot, 100);
    }
}
