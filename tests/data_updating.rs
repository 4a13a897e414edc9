#![allow(non_snake_case)]

mod common;
use common::*;
use proxal::algebra::*;
use proxal::solver::*;

fn setup_solver() -> (QpSolver<f64>, CscMatrix<f64>, Vec<f64>) {
    let n = 2;
    let H = csc_from_dense(&[vec![2.0, 0.5], vec![0.5, 2.0]]);
    let g = vec![-1.0, 1.0];
    let A = csc_from_dense(&[vec![1.0, 1.0]]);
    let b = vec![1.0];
    let C = csc_from_dense(&[vec![1.0, 0.0]]);
    let l = vec![-1.0];
    let u = vec![1.0];

    let mut solver = QpSolver::new(n, 1, 1);
    solver.settings.eps_abs = 1e-9;
    solver
        .init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();
    (solver, H, g)
}

// numeric value updates with an unchanged pattern take effect without a
// fresh setup
#[test]
fn test_numeric_update() {
    let (mut solver, H, _g) = setup_solver();
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    let x_first = solver.results.x.clone();

    // shift the linear cost and re-solve
    let g_new = vec![1.0, -1.0];
    solver
        .update(
            None,
            Some(&g_new),
            None,
            None,
            None,
            None,
            None,
            true,
            None,
            None,
            None,
        )
        .unwrap();
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!(solver.results.x.norm_inf_diff(&x_first) > 1e-6);

    // same-pattern H update
    let H_new = {
        let mut M = H.clone();
        M.nzval.iter_mut().for_each(|v| *v *= 2.0);
        M
    };
    solver
        .update(
            Some(&H_new),
            None,
            None,
            None,
            None,
            None,
            None,
            true,
            None,
            None,
            None,
        )
        .unwrap();
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    let res = kkt_residuals(
        &H_new,
        &vec![1.0, -1.0],
        &csc_from_dense(&[vec![1.0, 1.0]]),
        &[1.0],
        &csc_from_dense(&[vec![1.0, 0.0]]),
        &[-1.0],
        &[1.0],
        &solver.results.x,
        &solver.results.y,
        &solver.results.z,
    );
    assert!(res.primal <= 1e-8);
    assert!(res.dual <= 1e-8);
}

// a pattern change on update falls back to a full setup rather than
// erroring
#[test]
fn test_pattern_change_falls_back_to_setup() {
    let (mut solver, _H, _g) = setup_solver();
    solver.solve();

    // C gains an entry: different sparsity
    let C_new = csc_from_dense(&[vec![1.0, -1.0]]);
    solver
        .update(
            None,
            None,
            None,
            None,
            Some(&C_new),
            Some(&[-2.0]),
            Some(&[0.25]),
            true,
            None,
            None,
            None,
        )
        .unwrap();
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    // the new constraint binds at the solution
    let x = &solver.results.x;
    assert!(x[0] - x[1] <= 0.25 + 1e-7);
    assert!((x[0] - 0.625).abs() <= 1e-6);
    assert!((x[1] - 0.375).abs() <= 1e-6);
}

// proximal parameters survive an update unless overridden
#[test]
fn test_update_preserves_penalties() {
    let (mut solver, _H, _g) = setup_solver();
    solver.solve();
    let mu_eq_inv_before = solver.results.info.mu_eq_inv;

    solver
        .update(
            None,
            Some(&[0.5, 0.5]),
            None,
            None,
            None,
            None,
            None,
            false,
            None,
            None,
            None,
        )
        .unwrap();
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert_eq!(solver.results.info.mu_eq_inv, mu_eq_inv_before);

    // an explicit override is installed and reported
    solver
        .update(
            None,
            None,
            None,
            None,
            None,
            None,
            None,
            false,
            Some(1e-5),
            Some(1e-2),
            None,
        )
        .unwrap();
    solver.solve();
    assert_eq!(solver.results.info.rho, 1e-5);
    assert_eq!(solver.results.info.mu_eq_inv, 1e2);
}

// update on a solver with no installed model is an error
#[test]
fn test_update_requires_setup() {
    let mut solver = QpSolver::<f64>::new(2, 0, 0);
    let out = solver.update(
        None, None, None, None, None, None, None, true, None, None, None,
    );
    assert!(matches!(out, Err(SolverError::ModelNotSetup)));
}
