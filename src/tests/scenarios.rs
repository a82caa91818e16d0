//! End-to-end solve scenarios exercised across engine configurations.

use rstest::rstest;
use rstest_reuse::{apply, template};

use crate::model::{ConstraintKind, SosKind};
use crate::presolve::presolve_ops;
use crate::simplex::pricing::price;
use crate::simplex::simplex_type;
use crate::solver::Solver;
use crate::{E, Status};

/// Engine configurations every scenario must agree under.
#[template]
#[rstest]
#[case::dantzig_dual(price::DANTZIG, simplex_type::DUAL_PRIMAL, 0)]
#[case::devex_dual(price::DEVEX, simplex_type::DUAL_PRIMAL, 0)]
#[case::devex_primal(price::DEVEX, simplex_type::PRIMAL_PRIMAL, 0)]
#[case::bland(price::FIRST_INDEX, simplex_type::PRIMAL_PRIMAL, 0)]
#[case::steepest(
    price::STEEPEST_EDGE | price::TRUE_NORM_INIT,
    simplex_type::DUAL_PRIMAL,
    0
)]
#[case::presolved(price::DEVEX, simplex_type::DUAL_PRIMAL, presolve_ops::ALL_REDUCTIONS)]
#[case::auto_dualize(price::DEVEX, simplex_type::AUTO_DUALIZE, 0)]
fn engine_configs(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {}

fn configure(lp: &mut Solver, pivoting: i64, stype: i64, presolve: i64) {
    lp.set_pivoting(pivoting);
    lp.set_simplex_type(stype).unwrap();
    lp.set_presolve(presolve, 0);
}

/// Scenario 1: a small production LP with a fractional optimum.
#[apply(engine_configs)]
fn tiny_lp(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {
    let mut lp = Solver::new(0, 2);
    configure(&mut lp, pivoting, stype, presolve);
    lp.set_maxim();
    lp.set_obj_fn(&[143.0, 60.0]).unwrap();
    lp.add_constraint(&[120.0, 210.0], ConstraintKind::Le, 15000.0)
        .unwrap();
    lp.add_constraint(&[110.0, 30.0], ConstraintKind::Le, 4000.0)
        .unwrap();
    lp.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 75.0)
        .unwrap();

    assert_eq!(lp.solve(), Status::Optimal);
    assert!((lp.get_objective().unwrap() - 6315.625).abs() < 1e-6);
    let x = lp.get_variables().unwrap();
    assert!((x[0] - 21.875).abs() < 1e-6);
    assert!((x[1] - 53.125).abs() < 1e-6);
}

/// Scenario 2: contradictory bounds expressed through rows.
#[apply(engine_configs)]
fn infeasible(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {
    let mut lp = Solver::new(0, 1);
    configure(&mut lp, pivoting, stype, presolve);
    lp.set_maxim();
    lp.set_obj_fn(&[1.0]).unwrap();
    lp.set_unbounded(0).unwrap();
    lp.add_constraint(&[1.0], ConstraintKind::Ge, 1.0).unwrap();
    lp.add_constraint(&[1.0], ConstraintKind::Le, 0.0).unwrap();

    assert_eq!(lp.solve(), Status::Infeasible);
}

/// Scenario 3: maximize an uncapped variable.
#[apply(engine_configs)]
fn unbounded(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {
    let mut lp = Solver::new(0, 1);
    configure(&mut lp, pivoting, stype, presolve);
    lp.set_maxim();
    lp.set_obj_fn(&[1.0]).unwrap();
    lp.add_constraint(&[1.0], ConstraintKind::Ge, 0.0).unwrap();

    assert_eq!(lp.solve(), Status::Unbounded);
}

/// Reference knapsack value by dynamic programming.
fn knapsack_dp(values: &[i64], weights: &[usize], capacity: usize) -> i64 {
    let mut best = vec![0i64; capacity + 1];
    for (v, &w) in values.iter().zip(weights.iter()) {
        for cap in (w..=capacity).rev() {
            best[cap] = best[cap].max(best[cap - w] + v);
        }
    }
    best[capacity]
}

/// Scenario 4: a 10-item binary knapsack against the DP value.
#[apply(engine_configs)]
fn integer_knapsack(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {
    let values: [i64; 10] = [92, 57, 49, 68, 60, 43, 67, 84, 87, 72];
    let weights: [usize; 10] = [23, 31, 29, 44, 53, 38, 63, 85, 89, 82];
    let capacity = 165;
    let expected = knapsack_dp(&values, &weights, capacity);

    let mut lp = Solver::new(0, 10);
    configure(&mut lp, pivoting, stype, presolve);
    lp.set_maxim();
    let obj: Vec<E> = values.iter().map(|&v| v as E).collect();
    lp.set_obj_fn(&obj).unwrap();
    let row: Vec<E> = weights.iter().map(|&w| w as E).collect();
    lp.add_constraint(&row, ConstraintKind::Le, capacity as E)
        .unwrap();
    for j in 0..10 {
        lp.set_binary(j, true).unwrap();
    }

    assert_eq!(lp.solve(), Status::Optimal);
    assert!(
        (lp.get_objective().unwrap() - expected as E).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        lp.get_objective().unwrap()
    );
    // The reported subset must be binary and fit the capacity.
    let x = lp.get_variables().unwrap();
    let weight: E = x
        .iter()
        .zip(weights.iter())
        .map(|(&xi, &w)| xi * w as E)
        .sum();
    assert!(weight <= capacity as E + 1e-6);
    for &xi in x {
        assert!(xi.abs() < 1e-6 || (xi - 1.0).abs() < 1e-6);
    }
}

/// Scenario 5: an SOS1 set picks the single most profitable member.
#[apply(engine_configs)]
fn sos1_picks_best(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {
    let mut lp = Solver::new(0, 3);
    configure(&mut lp, pivoting, stype, presolve);
    lp.set_maxim();
    lp.set_obj_fn(&[2.0, 3.0, 5.0]).unwrap();
    for j in 0..3 {
        lp.set_bounds(j, 0.0, 4.0).unwrap();
    }
    lp.add_constraint(&[1.0, 1.0, 1.0], ConstraintKind::Le, 10.0)
        .unwrap();
    lp.add_sos("pick", SosKind::Type1, 1, &[(0, 1.0), (1, 2.0), (2, 3.0)])
        .unwrap();

    assert_eq!(lp.solve(), Status::Optimal);
    // The best member at its upper bound: 5 * 4.
    assert!((lp.get_objective().unwrap() - 20.0).abs() < 1e-6);
    let x = lp.get_variables().unwrap();
    assert!((x[2] - 4.0).abs() < 1e-6);
    assert!(x[0].abs() < 1e-6 && x[1].abs() < 1e-6);
}

/// Scenario 6: a semi-continuous variable lands on zero or inside its
/// band.
#[apply(engine_configs)]
fn semicontinuous_band(#[case] pivoting: i64, #[case] stype: i64, #[case] presolve: i64) {
    let mut lp = Solver::new(0, 2);
    configure(&mut lp, pivoting, stype, presolve);
    lp.set_maxim();
    lp.set_obj_fn(&[1.0, 10.0]).unwrap();
    lp.set_bounds(0, 2.0, 5.0).unwrap();
    lp.set_semicont(0, true).unwrap();
    lp.set_bounds(1, 0.0, 10.0).unwrap();
    // Shared budget: every unit of the sc variable costs the profitable
    // one, so the optimum switches it off.
    lp.add_constraint(&[1.0, 1.0], ConstraintKind::Le, 10.0)
        .unwrap();

    assert_eq!(lp.solve(), Status::Optimal);
    let x = lp.get_variables().unwrap();
    let in_band = x[0] >= 2.0 - 1e-6 && x[0] <= 5.0 + 1e-6;
    let off = x[0].abs() < 1e-6;
    assert!(off || in_band, "sc value {} outside both states", x[0]);
    assert!((lp.get_objective().unwrap() - 100.0).abs() < 1e-6);
    assert!(off, "the optimum leaves the sc variable off");
}
