// This code is part of the fscc-core project.
//
// (C) Copyright the fscc-core authors 2026.
//
// This code is licensed under the GNU Lesser General Public License,
// version 3 or later. You may obtain a copy of this license in the
// LICENSE.txt file in the root directory of this source tree or at
// https://www.gnu.org/licenses/lgpl-3.0.html.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

//! Thin wrapper over the dense linear-algebra backend (`faer`): general
//! complex eigendecomposition, SVD, and the Löwdin symmetric-orthogonal
//! transform, in the `num_complex::Complex64` currency the rest of the
//! engine uses. Kept to one module so a backend swap never touches
//! `heff` or `density` directly (§1: "dense linear-algebra routines ...
//! assumed available as a library").

use faer::complex_native::c64;
use faer::Mat;
use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};

fn to_faer(z: Complex64) -> c64 {
    c64::new(z.re, z.im)
}

fn from_faer(z: c64) -> Complex64 {
    Complex64::new(z.re, z.im)
}

fn to_faer_mat(rows: usize, cols: usize, data: &[Complex64]) -> Mat<c64> {
    Mat::from_fn(rows, cols, |i, j| to_faer(data[i * cols + j]))
}

/// The eigenvalues (unsorted, as the backend returns them) and
/// corresponding right eigenvectors (one per column) of a general
/// (non-Hermitian) square complex matrix, row-major `n*n`.
pub struct Eigendecomposition {
    pub eigenvalues: Vec<Complex64>,
    /// `vectors[i][k]` is the `i`-th component of eigenvector `k`.
    pub vectors: Vec<Vec<Complex64>>,
}

/// General complex eigendecomposition of a dense `n x n` matrix.
pub fn eigendecompose(n: usize, matrix: &[Complex64]) -> EngineResult<Eigendecomposition> {
    if matrix.len() != n * n {
        return Err(EngineError::configuration(
            "linalg::eigendecompose",
            format!("matrix has {} entries, expected {n}x{n}={}", matrix.len(), n * n),
        ));
    }
    if n == 0 {
        return Ok(Eigendecomposition {
            eigenvalues: Vec::new(),
            vectors: Vec::new(),
        });
    }
    let a = to_faer_mat(n, n, matrix);
    let decomp = a.eigendecomposition::<c64>();
    let s = decomp.s();
    let u = decomp.u();

    let eigenvalues: Vec<Complex64> = (0..n).map(|k| from_faer(s[(k, k)])).collect();
    let vectors: Vec<Vec<Complex64>> = (0..n)
        .map(|i| (0..n).map(|k| from_faer(u[(i, k)])).collect())
        .collect();

    Ok(Eigendecomposition { eigenvalues, vectors })
}

/// Thin SVD of a dense `m x n` matrix: `A = U diag(s) V^H`, with `U`
/// `m x k`, `s` length `k`, `V` `n x k`, `k = min(m, n)`.
pub struct Svd {
    pub u: Vec<Vec<Complex64>>,
    pub s: Vec<f64>,
    pub v: Vec<Vec<Complex64>>,
}

pub fn svd(m: usize, n: usize, matrix: &[Complex64]) -> EngineResult<Svd> {
    if matrix.len() != m * n {
        return Err(EngineError::configuration(
            "linalg::svd",
            format!("matrix has {} entries, expected {m}x{n}={}", matrix.len(), m * n),
        ));
    }
    let k = m.min(n);
    if k == 0 {
        return Ok(Svd {
            u: Vec::new(),
            s: Vec::new(),
            v: Vec::new(),
        });
    }
    let a = to_faer_mat(m, n, matrix);
    let decomp = a.thin_svd();
    let u_mat = decomp.u();
    let v_mat = decomp.v();
    let s_diag = decomp.s_diagonal();

    let s: Vec<f64> = (0..k).map(|i| from_faer(s_diag[i]).re).collect();
    let u: Vec<Vec<Complex64>> = (0..m).map(|i| (0..k).map(|j| from_faer(u_mat[(i, j)])).collect()).collect();
    let v: Vec<Vec<Complex64>> = (0..n).map(|i| (0..k).map(|j| from_faer(v_mat[(i, j)])).collect()).collect();
    Ok(Svd { u, s, v })
}

/// `M^{-1/2}` of a Hermitian positive-definite `M` (`n x n`, row-major),
/// via eigendecomposition: diagonalise, invert-and-sqrt the eigenvalues,
/// rebuild. Used by Löwdin orthonormalisation of model vectors (§4.7e).
pub fn inverse_sqrt_hermitian(n: usize, matrix: &[Complex64]) -> EngineResult<Vec<Complex64>> {
    let eig = eigendecompose(n, matrix)?;
    let mut out = vec![Complex64::new(0.0, 0.0); n * n];
    for i in 0..n {
        for j in 0..n {
            let mut acc = Complex64::new(0.0, 0.0);
            for k in 0..n {
                let lambda = eig.eigenvalues[k].re;
                if lambda <= 0.0 {
                    return Err(EngineError::invariant(
                        "inverse_sqrt_hermitian",
                        format!("non-positive eigenvalue {lambda} encountered during Löwdin orthonormalisation"),
                    ));
                }
                let inv_sqrt = 1.0 / lambda.sqrt();
                acc += eig.vectors[i][k] * inv_sqrt * eig.vectors[j][k].conj();
            }
            out[i * n + j] = acc;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eigendecompose_recovers_diagonal_matrix_eigenvalues() {
        let n = 2;
        let m = vec![
            Complex64::new(3.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(-1.0, 0.0),
        ];
        let eig = eigendecompose(n, &m).unwrap();
        let mut vals: Vec<f64> = eig.eigenvalues.iter().map(|z| z.re).collect();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((vals[0] - (-1.0)).abs() < 1e-8);
        assert!((vals[1] - 3.0).abs() < 1e-8);
    }

    #[test]
    fn inverse_sqrt_of_identity_is_identity() {
        let n = 2;
        let id = vec![
            Complex64::new(1.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
        ];
        let out = inverse_sqrt_hermitian(n, &id).unwrap();
        assert!((out[0].re - 1.0).abs() < 1e-8);
        assert!((out[3].re - 1.0).abs() < 1e-8);
        assert!(out[1].norm() < 1e-8);
    }
}
