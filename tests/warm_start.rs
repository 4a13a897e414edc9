#![allow(non_snake_case)]

mod common;
use common::*;
use proxal::algebra::*;
use proxal::solver::*;

fn sample_qp() -> (
    CscMatrix<f64>,
    Vec<f64>,
    CscMatrix<f64>,
    Vec<f64>,
    CscMatrix<f64>,
    Vec<f64>,
    Vec<f64>,
) {
    let mut rng = Rng::new(7);
    let n = 6;
    let H = random_strictly_convex(&mut rng, n, 1e-1);
    let g = rng.gaussian_vec(n);
    let A = csc_from_dense(&rng.gaussian_mat(1, n));
    let b = rng.gaussian_vec(1);
    let C = csc_from_dense(&rng.gaussian_mat(2, n));
    let l: Vec<f64> = (0..2).map(|_| -rng.uniform()).collect();
    let u: Vec<f64> = l.iter().map(|v| v + 1.0).collect();
    (H, g, A, b, C, l, u)
}

// re-solving the same QP from its own solution must converge without
// running any outer iteration, and reproduce the iterate
#[test]
fn test_warm_start_resolve() {
    let (H, g, A, b, C, l, u) = sample_qp();

    let mut solver = QpSolver::new(6, 1, 2);
    solver.settings.eps_abs = 1e-9;
    solver
        .init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    let x0 = solver.results.x.clone();
    let y0 = solver.results.y.clone();
    let z0 = solver.results.z.clone();

    solver
        .warm_start(Some(&x0), Some(&y0), Some(&z0))
        .unwrap();
    solver.solve();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert_eq!(solver.results.info.iter_ext, 0);
    assert!(solver.results.x.norm_inf_diff(&x0) <= 1e-10);
}

// the warm_start settings flag re-uses the current results without an
// explicit warm_start call
#[test]
fn test_warm_start_flag() {
    let (H, g, A, b, C, l, u) = sample_qp();

    let mut solver = QpSolver::new(6, 1, 2);
    solver.settings.eps_abs = 1e-9;
    solver.settings.warm_start = true;
    solver
        .init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();

    // first solve starts from zero results, which is a valid warm start
    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    solver.solve();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert_eq!(solver.results.info.iter_ext, 0);
}

// dimension mismatches in the warm start are API errors
#[test]
fn test_warm_start_dimension_check() {
    let (H, g, A, b, C, l, u) = sample_qp();

    let mut solver = QpSolver::new(6, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();

    let bad = vec![0.0; 5];
    assert!(matches!(
        solver.warm_start(Some(&bad), None, None),
        Err(SolverError::IncompatibleDimension)
    ));

    let mut unready = QpSolver::<f64>::new(2, 0, 0);
    assert!(matches!(
        unready.warm_start(None, None, None),
        Err(SolverError::ModelNotSetup)
    ));
}
