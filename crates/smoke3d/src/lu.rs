//! LU decomposition of a 3x3 matrix with partial pivoting.

/// Row-major 3x3 matrix.
pub type Mat3 = [[f64; 3]; 3];

/// Packed `L` (unit lower, below the diagonal) and `U` factors plus the row
/// permutation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lu3 {
    lu: Mat3,
    piv: [usize; 3],
    pivot_sign: f64,
}

impl Lu3 {
    /// Crout/Doolittle elimination, column by column.
    pub fn new(a: &Mat3) -> Self {
        let mut lu = *a;
        let mut piv = [0, 1, 2];
        let mut pivot_sign = 1.0;

        for j in 0..3 {
            let mut col = [lu[0][j], lu[1][j], lu[2][j]];

            for i in 0..3 {
                let kmax = i.min(j);
                let s: f64 = (0..kmax).map(|k| lu[i][k] * col[k]).sum();
                col[i] -= s;
                lu[i][j] = col[i];
            }

            let mut p = j;
            for i in j + 1..3 {
                if col[i].abs() > col[p].abs() {
                    p = i;
                }
            }
            if p != j {
                lu.swap(p, j);
                piv.swap(p, j);
                pivot_sign = -pivot_sign;
            }

            if lu[j][j] != 0.0 {
                for i in j + 1..3 {
                    lu[i][j] /= lu[j][j];
                }
            }
        }

        Self {
            lu,
            piv,
            pivot_sign,
        }
    }

    /// False when any pivot is exactly zero.
    pub fn is_nonsingular(&self) -> bool {
        (0..3).all(|j| self.lu[j][j] != 0.0)
    }

    pub fn determinant(&self) -> f64 {
        self.pivot_sign * self.lu[0][0] * self.lu[1][1] * self.lu[2][2]
    }

    /// Solve `A x = b`. Returns `None` for a singular matrix.
    pub fn solve(&self, b: [f64; 3]) -> Option<[f64; 3]> {
        if !self.is_nonsingular() {
            return None;
        }
        let mut x = [b[self.piv[0]], b[self.piv[1]], b[self.piv[2]]];

        for k in 0..3 {
            for i in k + 1..3 {
                x[i] -= x[k] * self.lu[i][k];
            }
        }
        for k in (0..3).rev() {
            x[k] /= self.lu[k][k];
            for i in 0..k {
                x[i] -= x[k] * self.lu[i][k];
            }
        }
        Some(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mul(a: &Mat3, x: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for i in 0..3 {
            out[i] = (0..3).map(|k| a[i][k] * x[k]).sum();
        }
        out
    }

    #[test]
    fn test_rank_deficient_is_singular() {
        let a = [[1.0, 2.0, 4.0], [2.0, 4.0, 8.0], [4.0, 8.0, 16.0]];
        let lu = Lu3::new(&a);
        assert!(!lu.is_nonsingular());
        assert!(lu.solve([1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = [[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [3.0, 0.0, 1.0]];
        let lu = Lu3::new(&a);
        assert!(lu.is_nonsingular());
        let b = [3.0, 2.0, 4.0];
        let x = lu.solve(b).unwrap();
        let back = mul(&a, x);
        for i in 0..3 {
            assert!((back[i] - b[i]).abs() < 1e-12, "row {}: {} vs {}", i, back[i], b[i]);
        }
    }

    #[test]
    fn test_determinant() {
        let a = [[2.0, 0.0, 0.0], [0.0, 0.0, 3.0], [0.0, 4.0, 0.0]];
        let lu = Lu3::new(&a);
        assert!((lu.determinant() - -24.0).abs() < 1e-12);
    }
}
