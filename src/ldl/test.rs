#![allow(non_snake_case)]

use super::*;

// A small KKT-shaped fixture:
//
//   K = [ H   A'  C' ]        H = [2.0 0.5]   A = [1 1]   C = [1 2]
//       [ A   .   .  ]            [0.5 2.0]
//       [ C   .   .  ]
//
// stored as its upper triangle with the last column elastic, and the
// penalty terms supplied separately as a diagonal offset.
fn fixture() -> (ElasticCsc<f64>, Vec<f64>) {
    let mut K = ElasticCsc::<f64>::with_capacities(4, 4, &[1, 2, 2, 2]);

    // H upper triangle
    K.push_in_col(0, 0, 2.0);
    K.push_in_col(1, 0, 0.5);
    K.push_in_col(1, 1, 2.0);
    // A'
    K.push_in_col(2, 0, 1.0);
    K.push_in_col(2, 1, 1.0);
    // C', left inactive (entries staged in the capacity span)
    K.rowval[K.colptr[3]] = 0;
    K.nzval[K.colptr[3]] = 1.0;
    K.rowval[K.colptr[3] + 1] = 1;
    K.nzval[K.colptr[3] + 1] = 2.0;

    let diag = vec![1e-6, 1e-6, -1e-3, 1.0];
    (K, diag)
}

// dense symmetric expansion of the entries in use plus the diagonal offset
fn dense_of(K: &ElasticCsc<f64>, diag: &[f64]) -> Vec<Vec<f64>> {
    let n = K.n;
    let mut M = vec![vec![0.0; n]; n];
    for j in 0..n {
        for p in K.col_range(j) {
            let i = K.rowval[p];
            M[i][j] += K.nzval[p];
            if i != j {
                M[j][i] += K.nzval[p];
            }
        }
    }
    for i in 0..n {
        M[i][i] += diag[i];
    }
    M
}

// dense reconstruction of P' (L D L') P from the factors
fn reconstruct(f: &LdlFactorisation<f64>) -> Vec<Vec<f64>> {
    let n = f.ld.n;
    let mut L = vec![vec![0.0; n]; n];
    let mut D = vec![0.0; n];
    for j in 0..n {
        L[j][j] = 1.0;
        D[j] = f.ld.nzval[f.ld.colptr[j]];
        for p in (f.ld.colptr[j] + 1)..(f.ld.colptr[j] + f.ld.col_nnz[j]) {
            L[f.ld.rowval[p]][j] = f.ld.nzval[p];
        }
    }
    let mut M = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let mut acc = 0.0;
            for k in 0..n {
                acc += L[i][k] * D[k] * L[j][k];
            }
            M[i][j] = acc;
        }
    }
    // undo the permutation
    let mut out = vec![vec![0.0; n]; n];
    for r in 0..n {
        for c in 0..n {
            out[r][c] = M[f.perm_inv[r]][f.perm_inv[c]];
        }
    }
    out
}

fn assert_dense_close(A: &[Vec<f64>], B: &[Vec<f64>], tol: f64) {
    for (ra, rb) in A.iter().zip(B.iter()) {
        for (&a, &b) in ra.iter().zip(rb.iter()) {
            assert!((a - b).abs() <= tol, "{a} vs {b}");
        }
    }
}

#[test]
fn test_factor_reconstructs() {
    let (K, diag) = fixture();
    let mut f = LdlFactorisation::new(&K, 1.0).unwrap();
    f.refactor(&K, &diag);

    assert_dense_close(&reconstruct(&f), &dense_of(&K, &diag), 1e-12);
}

#[test]
fn test_solve() {
    let (K, diag) = fixture();
    let mut f = LdlFactorisation::new(&K, 1.0).unwrap();
    f.refactor(&K, &diag);

    let b = vec![1.0, -2.0, 0.5, 3.0];
    let mut x = b.clone();
    f.solve_in_place(&mut x);

    // residual b - (K + diag)x
    let M = dense_of(&K, &diag);
    for i in 0..4 {
        let mut acc = 0.0;
        for j in 0..4 {
            acc += M[i][j] * x[j];
        }
        assert!((acc - b[i]).abs() <= 1e-10);
    }
}

#[test]
fn test_add_and_delete_row() {
    let (mut K, mut diag) = fixture();
    let mut f = LdlFactorisation::new(&K, 1.0).unwrap();
    f.refactor(&K, &diag);

    // activate the trailing column incrementally
    let rows = [0usize, 1];
    let vals = [1.0, 2.0];
    f.add_row(3, &rows, &vals, -1e-1);

    K.col_nnz[3] = 2;
    diag[3] = -1e-1;
    assert_dense_close(&reconstruct(&f), &dense_of(&K, &diag), 1e-12);

    // the incremental factors agree with a from-scratch refactorization
    let mut g = LdlFactorisation::new(&K, 1.0).unwrap();
    g.refactor(&K, &diag);
    assert_dense_close(&reconstruct(&f), &reconstruct(&g), 1e-12);

    // deactivating restores the original matrix
    f.delete_row(3);
    K.col_nnz[3] = 0;
    diag[3] = 1.0;
    assert_dense_close(&reconstruct(&f), &dense_of(&K, &diag), 1e-12);
}

#[test]
fn test_rank1_update() {
    let (K, diag) = fixture();
    let mut f = LdlFactorisation::new(&K, 1.0).unwrap();
    f.refactor(&K, &diag);

    // direction drawn from the pattern of the equality column
    let rows = [0usize, 1];
    let vals = [0.3, -0.7];
    let alpha = 0.25;
    f.rank1_update(&rows, &vals, alpha);

    let mut M = dense_of(&K, &diag);
    for (&r, &vr) in rows.iter().zip(vals.iter()) {
        for (&c, &vc) in rows.iter().zip(vals.iter()) {
            M[r][c] += alpha * vr * vc;
        }
    }
    assert_dense_close(&reconstruct(&f), &M, 1e-12);
}

#[test]
fn test_refactor_after_modifications() {
    // after any sequence of modifications, a fresh numeric pass lands on
    // the same factors
    let (mut K, mut diag) = fixture();
    let mut f = LdlFactorisation::new(&K, 1.0).unwrap();
    f.refactor(&K, &diag);

    f.add_row(3, &[0, 1], &[1.0, 2.0], -1e-1);
    K.col_nnz[3] = 2;
    diag[3] = -1e-1;

    let before = reconstruct(&f);
    f.refactor(&K, &diag);
    assert_dense_close(&before, &reconstruct(&f), 1e-12);
}

#[test]
fn test_not_triu_rejected() {
    let mut K = ElasticCsc::<f64>::with_capacities(2, 2, &[1, 1]);
    K.push_in_col(0, 1, 1.0); // below the diagonal
    K.push_in_col(1, 1, 1.0);
    assert!(matches!(
        LdlFactorisation::new(&K, 1.0),
        Err(LdlError::NotUpperTriangular)
    ));
}
