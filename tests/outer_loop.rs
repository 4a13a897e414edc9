#![allow(non_snake_case)]

mod common;
use common::*;
use proxal::algebra::*;
use proxal::solver::*;

// scenario: starting from a deliberately weak inequality penalty, the
// first inner solve leaves a large primal violation, which the BCL
// schedule answers by rejecting the dual step and stiffening mu
#[test]
fn test_bcl_rejection_updates_mu() {
    let n = 1;
    let H = CscMatrix::identity(n);
    let g = vec![0.0];
    let A = CscMatrix::spalloc(0, n, 0);
    let C = csc_from_dense(&[vec![1.0]]);
    // x >= 10, unconstrained minimum at 0
    let l = vec![10.0];
    let u = vec![1e20];

    let mut solver = QpSolver::new(n, 0, 1);
    solver.settings.eps_abs = 1e-9;
    // a tiny internal penalty: mu_in is passed as the dual step size
    solver
        .init(&H, &g, &A, &[], &C, &l, &u, true, None, None, Some(1e3))
        .unwrap();
    solver.solve();

    let results = &solver.results;
    assert_eq!(results.info.status, SolverStatus::Solved);
    assert!(results.info.mu_updates >= 1, "mu_updates = {}", results.info.mu_updates);
    assert!((results.x[0] - 10.0).abs() <= 1e-6);

    let res = kkt_residuals(
        &H,
        &g,
        &A,
        &[],
        &C,
        &l,
        &u,
        &results.x,
        &results.y,
        &results.z,
    );
    assert!(res.primal <= 1e-8);
    assert!(res.dual <= 1e-8);
}

// scenario: an infeasible pair of inequalities cannot make primal
// progress; with an aggressive update factor the penalty ratchets past
// the cold reset threshold and mu collapses back, visible through the
// update counter, while the solver still terminates cleanly
#[test]
fn test_cold_reset_on_stagnation() {
    let n = 1;
    let H = CscMatrix::identity(n);
    let g = vec![0.0];
    let A = CscMatrix::spalloc(0, n, 0);
    let C = csc_from_dense(&[vec![1.0], vec![-1.0]]);
    // x <= -1 and -x <= -1, i.e. x >= 1: infeasible
    let l = vec![-1e20, -1e20];
    let u = vec![-1.0, -1.0];

    let mut solver = QpSolver::new(n, 0, 2);
    solver.settings.eps_abs = 1e-9;
    solver.settings.mu_update_factor = 1e5;
    solver.settings.max_iter = 40;
    solver
        .init(&H, &g, &A, &[], &C, &l, &u, true, None, None, None)
        .unwrap();
    solver.solve();

    let results = &solver.results;
    assert_eq!(results.info.status, SolverStatus::MaxIterReached);
    // at least the initial ratchet plus the cold reset
    assert!(results.info.mu_updates >= 2, "mu_updates = {}", results.info.mu_updates);
    assert_eq!(results.info.iter_ext, 40);
    // iterates remain finite and inspectable after a failed run
    assert!(results.x.is_finite());
    assert!(results.z.is_finite());
}

// the outer iteration budget is respected and reported
#[test]
fn test_max_iter_status() {
    let mut rng = Rng::new(11);
    let n = 4;
    let H = random_strictly_convex(&mut rng, n, 1e-2);
    let g = rng.gaussian_vec(n);
    let A = csc_from_dense(&rng.gaussian_mat(1, n));
    let b = rng.gaussian_vec(1);
    let C = csc_from_dense(&rng.gaussian_mat(1, n));

    let mut solver = QpSolver::new(n, 1, 1);
    solver.settings.eps_abs = 1e-14;
    solver.settings.eps_rel = 0.0;
    solver.settings.max_iter = 1;
    solver.settings.max_iter_in = 2;
    solver
        .init(&H, &g, &A, &b, &C, &[0.0], &[0.1], true, None, None, None)
        .unwrap();
    solver.solve();

    assert_eq!(solver.results.info.status, SolverStatus::MaxIterReached);
    assert_eq!(solver.results.info.iter_ext, 1);
}
