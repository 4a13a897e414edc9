#![allow(non_snake_case)]

mod common;
use common::*;
use proxal::algebra::*;
use proxal::solver::*;

// the pattern-only constructor precomputes the symbolic factorization,
// and a later init with matching patterns solves as usual
#[test]
fn test_with_sparsity_then_init() {
    let n = 3;
    let H = csc_from_dense(&[
        vec![2.0, 0.0, 0.5],
        vec![0.0, 1.0, 0.0],
        vec![0.5, 0.0, 3.0],
    ]);
    let g = vec![-1.0, 0.0, 1.0];
    let A = csc_from_dense(&[vec![1.0, 1.0, 0.0]]);
    let b = vec![1.0];
    let C = csc_from_dense(&[vec![0.0, 1.0, 1.0]]);
    let l = vec![-0.5];
    let u = vec![0.5];

    let mut solver = QpSolver::with_sparsity(&H, &A, &C).unwrap();
    solver.settings.eps_abs = 1e-9;
    solver
        .init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();
    solver.solve();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    let res = kkt_residuals(
        &H,
        &g,
        &A,
        &b,
        &C,
        &l,
        &u,
        &solver.results.x,
        &solver.results.y,
        &solver.results.z,
    );
    assert!(res.primal <= 1e-8);
    assert!(res.dual <= 1e-8);
}

// init on a fresh solver and init after with_sparsity agree
#[test]
fn test_symbolic_reuse_matches_direct_init() {
    let mut rng = Rng::new(5);
    let n = 4;
    let H = random_strictly_convex(&mut rng, n, 1e-1);
    let g = rng.gaussian_vec(n);
    let A = csc_from_dense(&rng.gaussian_mat(1, n));
    let b = rng.gaussian_vec(1);
    let C = csc_from_dense(&rng.gaussian_mat(1, n));
    let l = vec![-0.2];
    let u = vec![0.2];

    let mut s1 = QpSolver::with_sparsity(&H, &A, &C).unwrap();
    s1.settings.eps_abs = 1e-9;
    s1.init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();
    s1.solve();

    let mut s2 = QpSolver::new(n, 1, 1);
    s2.settings.eps_abs = 1e-9;
    s2.init(&H, &g, &A, &b, &C, &l, &u, true, None, None, None)
        .unwrap();
    s2.solve();

    assert_eq!(s1.results.info.status, SolverStatus::Solved);
    assert_eq!(s2.results.info.status, SolverStatus::Solved);
    assert!(s1.results.x.norm_inf_diff(&s2.results.x) <= 1e-9);
}
