#![allow(non_snake_case)]

mod common;
use common::*;
use proxal::algebra::*;
use proxal::solver::*;

// an inequality with l = u must behave as an equality: solving with
// C, l = u produces the same iterates as folding the row into A
#[test]
fn test_tight_bounds_reduce_to_equality() {
    let mut rng = Rng::new(3);
    let n = 5;
    let H = random_strictly_convex(&mut rng, n, 1e-1);
    let g = rng.gaussian_vec(n);

    let a_row = rng.gaussian_vec(n);
    let c_row = rng.gaussian_vec(n);
    let b0 = rng.gaussian();
    let c0 = rng.gaussian();

    // formulation 1: one equality, one pinned inequality
    let A1 = csc_from_dense(&[a_row.clone()]);
    let C1 = csc_from_dense(&[c_row.clone()]);
    let mut s1 = QpSolver::new(n, 1, 1);
    s1.settings.eps_abs = 1e-10;
    s1.init(&H, &g, &A1, &[b0], &C1, &[c0], &[c0], true, None, None, None)
        .unwrap();
    s1.solve();
    assert_eq!(s1.results.info.status, SolverStatus::Solved);

    // formulation 2: both rows as equalities
    let A2 = csc_from_dense(&[a_row, c_row]);
    let C2 = CscMatrix::spalloc(0, n, 0);
    let mut s2 = QpSolver::new(n, 2, 0);
    s2.settings.eps_abs = 1e-10;
    s2.init(&H, &g, &A2, &[b0, c0], &C2, &[], &[], true, None, None, None)
        .unwrap();
    s2.solve();
    assert_eq!(s2.results.info.status, SolverStatus::Solved);

    assert!(s1.results.x.norm_inf_diff(&s2.results.x) <= 1e-7);
    assert!((s1.results.y[0] - s2.results.y[0]).abs() <= 1e-6);
    // the pinned inequality multiplier matches the equality multiplier
    assert!((s1.results.z[0] - s2.results.y[1]).abs() <= 1e-6);
}
