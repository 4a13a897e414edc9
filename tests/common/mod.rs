#![allow(non_snake_case)]
#![allow(dead_code)]

use proxal::algebra::*;

/// xorshift64* generator with Box-Muller for gaussians, so test problems
/// are reproducible without extra dependencies
pub struct Rng {
    state: u64,
    spare: Option<f64>,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
            spare: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// uniform on (0, 1)
    pub fn uniform(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64 + 1.0) / (1u64 << 53) as f64
    }

    pub fn gaussian(&mut self) -> f64 {
        if let Some(v) = self.spare.take() {
            return v;
        }
        let u1 = self.uniform();
        let u2 = self.uniform();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = std::f64::consts::TAU * u2;
        self.spare = Some(r * theta.sin());
        r * theta.cos()
    }

    pub fn gaussian_vec(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.gaussian()).collect()
    }

    pub fn gaussian_mat(&mut self, m: usize, n: usize) -> Vec<Vec<f64>> {
        (0..m).map(|_| self.gaussian_vec(n)).collect()
    }
}

/// dense row-major data to CSC, dropping exact zeros
pub fn csc_from_dense(rows: &[Vec<f64>]) -> CscMatrix<f64> {
    let m = rows.len();
    let n = if m == 0 { 0 } else { rows[0].len() };

    let mut colptr = vec![0usize];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    for j in 0..n {
        for (i, row) in rows.iter().enumerate() {
            if row[j] != 0.0 {
                rowval.push(i);
                nzval.push(row[j]);
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(m, n, colptr, rowval, nzval)
}

/// H = M'M + delta*I for a dense gaussian M, guaranteeing strict convexity
pub fn random_strictly_convex(rng: &mut Rng, n: usize, delta: f64) -> CscMatrix<f64> {
    let M = rng.gaussian_mat(n, n);
    let mut H = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let mut acc = 0.0;
            for row in M.iter() {
                acc += row[i] * row[j];
            }
            H[i][j] = acc;
        }
        H[i][i] += delta;
    }
    csc_from_dense(&H)
}

pub struct Residuals {
    pub primal: f64,
    pub dual: f64,
}

/// unscaled KKT residuals of a candidate solution
pub fn kkt_residuals(
    H: &CscMatrix<f64>,
    g: &[f64],
    A: &CscMatrix<f64>,
    b: &[f64],
    C: &CscMatrix<f64>,
    l: &[f64],
    u: &[f64],
    x: &[f64],
    y: &[f64],
    z: &[f64],
) -> Residuals {
    let (m_eq, m_in, n) = (A.nrows(), C.nrows(), H.nrows());

    let mut r_eq = vec![0.0; m_eq];
    A.gemv(&mut r_eq, x, 1.0, 0.0);
    for (r, &bi) in r_eq.iter_mut().zip(b.iter()) {
        *r -= bi;
    }

    let mut Cx = vec![0.0; m_in];
    C.gemv(&mut Cx, x, 1.0, 0.0);
    let mut viol = 0.0f64;
    for i in 0..m_in {
        viol = viol
            .max((Cx[i] - u[i]).max(0.0))
            .max((l[i] - Cx[i]).max(0.0));
    }
    let primal = r_eq.norm_inf().max(viol);

    // H may be stored as a full matrix or as its upper triangle
    let Ht = if H.is_triu() { H.clone() } else { H.to_triu() };
    let mut r_dual = g.to_vec();
    Ht.sym().symv(&mut r_dual, x, 1.0, 1.0);
    A.t().gemv(&mut r_dual, y, 1.0, 1.0);
    C.t().gemv(&mut r_dual, z, 1.0, 1.0);
    let dual = r_dual.norm_inf();

    Residuals { primal, dual }
}
