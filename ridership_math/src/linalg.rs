//! Small dense linear algebra
//!
//! The state-space and regression code only ever handles matrices with a
//! handful of rows, so a row-major `Vec<f64>` with Gaussian elimination is all
//! that is needed here.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

const PIVOT_EPSILON: f64 = 1e-12;

/// Row-major dense matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Create a matrix filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Create an identity matrix
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Build a matrix from a list of equally sized rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(MathError::DimensionMismatch {
                    expected: n_cols,
                    got: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    /// Build a column vector
    pub fn column(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow the underlying row-major storage
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Borrow a single row
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t[(j, i)] = self[(i, j)];
            }
        }
        t
    }

    /// Matrix product `self * other`
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(MathError::DimensionMismatch {
                expected: self.cols,
                got: other.rows,
            });
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self[(i, k)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out[(i, j)] += a * other[(k, j)];
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>> {
        if self.cols != v.len() {
            return Err(MathError::DimensionMismatch {
                expected: self.cols,
                got: v.len(),
            });
        }
        Ok((0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Element-wise sum
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(MathError::DimensionMismatch {
                expected: self.rows * self.cols,
                got: other.rows * other.cols,
            });
        }
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    /// Replace the matrix with `(A + A') / 2` to remove rounding asymmetry
    pub fn symmetrize(&mut self) {
        for i in 0..self.rows {
            for j in (i + 1)..self.cols {
                let avg = 0.5 * (self[(i, j)] + self[(j, i)]);
                self[(i, j)] = avg;
                self[(j, i)] = avg;
            }
        }
    }

    /// Solve `self * x = b` by Gaussian elimination with partial pivoting
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        let n = self.rows;
        if self.cols != n {
            return Err(MathError::InvalidInput(
                "Only square systems can be solved".to_string(),
            ));
        }
        if b.len() != n {
            return Err(MathError::DimensionMismatch {
                expected: n,
                got: b.len(),
            });
        }

        let mut a = self.data.clone();
        let mut x = b.to_vec();

        for col in 0..n {
            let pivot = (col..n)
                .max_by(|&r1, &r2| {
                    a[r1 * n + col]
                        .abs()
                        .partial_cmp(&a[r2 * n + col].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(col);

            if a[pivot * n + col].abs() < PIVOT_EPSILON {
                return Err(MathError::Singular);
            }

            if pivot != col {
                for k in 0..n {
                    a.swap(col * n + k, pivot * n + k);
                }
                x.swap(col, pivot);
            }

            for row in (col + 1)..n {
                let factor = a[row * n + col] / a[col * n + col];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    a[row * n + k] -= factor * a[col * n + k];
                }
                x[row] -= factor * x[col];
            }
        }

        for col in (0..n).rev() {
            let tail: f64 = ((col + 1)..n).map(|k| a[col * n + k] * x[k]).sum();
            x[col] = (x[col] - tail) / a[col * n + col];
        }

        Ok(x)
    }

    /// Inverse of a square matrix
    pub fn inverse(&self) -> Result<Matrix> {
        let n = self.rows;
        let mut inv = Matrix::zeros(n, n);
        for j in 0..n {
            let mut e = vec![0.0; n];
            e[j] = 1.0;
            let col = self.solve(&e)?;
            for (i, v) in col.into_iter().enumerate() {
                inv[(i, j)] = v;
            }
        }
        Ok(inv)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

/// Solve the discrete Lyapunov equation `P = T P T' + Q`
///
/// Uses the vectorized form `(I - T ⊗ T) vec(P) = vec(Q)`. Fails with
/// [`MathError::Singular`] when `T` has an eigenvalue on the unit circle.
pub fn solve_discrete_lyapunov(t: &Matrix, q: &Matrix) -> Result<Matrix> {
    let n = t.rows();
    if t.cols() != n || q.rows() != n || q.cols() != n {
        return Err(MathError::InvalidInput(
            "Lyapunov equation needs square matrices of equal size".to_string(),
        ));
    }

    let m = n * n;
    let mut system = Matrix::identity(m);
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                for l in 0..n {
                    system[(i * n + j, k * n + l)] -= t[(i, k)] * t[(j, l)];
                }
            }
        }
    }

    let solution = system.solve(q.as_slice())?;
    let mut p = Matrix {
        rows: n,
        cols: n,
        data: solution,
    };
    p.symmetrize();
    Ok(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_known_system() {
        let a = Matrix::from_rows(&[vec![2.0, 1.0], vec![1.0, 3.0]]).unwrap();
        let x = a.solve(&[3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_rejected() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert_eq!(a.solve(&[1.0, 2.0]), Err(MathError::Singular));
    }

    #[test]
    fn test_inverse_times_matrix_is_identity() {
        let a = Matrix::from_rows(&[
            vec![4.0, 1.0, 0.5],
            vec![1.0, 3.0, 0.0],
            vec![0.5, 0.0, 2.0],
        ])
        .unwrap();
        let product = a.matmul(&a.inverse().unwrap()).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[(i, j)] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_lyapunov_ar1_variance() {
        // AR(1) with phi = 0.5 and unit innovations has variance 1 / (1 - 0.25)
        let t = Matrix::from_rows(&[vec![0.5]]).unwrap();
        let q = Matrix::from_rows(&[vec![1.0]]).unwrap();
        let p = solve_discrete_lyapunov(&t, &q).unwrap();
        assert!((p[(0, 0)] - 1.0 / 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_lyapunov_solution_satisfies_equation() {
        let t = Matrix::from_rows(&[vec![0.6, 1.0], vec![-0.2, 0.0]]).unwrap();
        let q = Matrix::from_rows(&[vec![1.0, 0.3], vec![0.3, 0.09]]).unwrap();
        let p = solve_discrete_lyapunov(&t, &q).unwrap();
        let rhs = t
            .matmul(&p)
            .unwrap()
            .matmul(&t.transpose())
            .unwrap()
            .add(&q)
            .unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert!((p[(i, j)] - rhs[(i, j)]).abs() < 1e-10);
            }
        }
    }
}
