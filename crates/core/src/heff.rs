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

//! The effective-Hamiltonian driver (§4.7): builds the block-diagonal
//! (by irrep) H_eff matrix from zero-order spinor energies plus one or
//! more effective-interaction tensors bound through `slater_rules`,
//! diagonalises each block, biorthonormalises (or Löwdin-orthonormalises)
//! the model vectors, selects roots, and assembles the merged energy
//! table of point 6.

use std::collections::HashMap;

use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};
use crate::linalg;
use crate::model_space::{enumerate_model_space, Determinant};
use crate::slater_rules::setup_slater;
use crate::spinor::SpinorRegistry;
use crate::symmetry::{IrrepId, SymmetryTable};
use crate::tensor::diagram::Scalar;

/// One effective-interaction contribution to H_eff: its operator rank
/// (1-, 2-, or 3-body) and the accessor `slater_rules` reads its matrix
/// elements through (typically `|idx| access::get(registry, diagram, idx)`
/// for one DPD diagram).
pub struct EffectiveInteraction<'a> {
    pub npart: usize,
    pub get: Box<dyn Fn(&[usize]) -> EngineResult<Scalar> + 'a>,
}

/// One irrep's H_eff block and its diagonalisation (§3.5).
pub struct HeffBlock {
    pub irrep: IrrepId,
    pub dets: Vec<Determinant>,
    /// Row-major `n x n` matrix, as serialised to the H_eff file.
    pub matrix: Vec<Complex64>,
    /// Sorted ascending by real part.
    pub eigenvalues: Vec<Complex64>,
    /// `right[k]` is the k-th right eigenvector, ordered with
    /// `eigenvalues`.
    pub right: Vec<Vec<Complex64>>,
    pub left: Vec<Vec<Complex64>>,
}

fn zero_order_energy(registry: &SpinorRegistry, det: &Determinant) -> f64 {
    let p: f64 = det.particles.iter().map(|&i| registry.energy(i)).sum();
    let h: f64 = det.holes.iter().map(|&i| registry.energy(i)).sum();
    p - h
}

fn conj_transpose(n: usize, m: &[Complex64]) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); n * n];
    for i in 0..n {
        for j in 0..n {
            out[j * n + i] = m[i * n + j].conj();
        }
    }
    out
}

fn inner(n: usize, a: &[Complex64], b: &[Complex64]) -> Complex64 {
    (0..n).map(|i| a[i].conj() * b[i]).sum()
}

/// Diagonalises one dense `n x n` H_eff block and returns biorthonormal
/// left/right eigenvectors sorted ascending by eigenvalue real part
/// (§3.5, §8's testable ordering and biorthonormality invariants).
fn diagonalize_block(n: usize, matrix: &[Complex64]) -> EngineResult<(Vec<Complex64>, Vec<Vec<Complex64>>, Vec<Vec<Complex64>>)> {
    if n == 0 {
        return Ok((Vec::new(), Vec::new(), Vec::new()));
    }
    let right_decomp = linalg::eigendecompose(n, matrix)?;
    let adjoint = conj_transpose(n, matrix);
    let left_decomp = linalg::eigendecompose(n, &adjoint)?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| right_decomp.eigenvalues[a].re.partial_cmp(&right_decomp.eigenvalues[b].re).unwrap());

    let eigenvalues: Vec<Complex64> = order.iter().map(|&k| right_decomp.eigenvalues[k]).collect();
    let right: Vec<Vec<Complex64>> = order
        .iter()
        .map(|&k| (0..n).map(|i| right_decomp.vectors[i][k]).collect())
        .collect();

    // Pair each right eigenvalue with the left-decomposition eigenvalue
    // closest to its conjugate (H^H's eigenvalues are the conjugates of
    // H's), then normalise so that left_k^H right_k == 1.
    let mut left: Vec<Vec<Complex64>> = Vec::with_capacity(n);
    let mut used = vec![false; n];
    for k in 0..n {
        let target = eigenvalues[k].conj();
        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for j in 0..n {
            if used[j] {
                continue;
            }
            let dist = (left_decomp.eigenvalues[j] - target).norm();
            if dist < best_dist {
                best_dist = dist;
                best = j;
            }
        }
        used[best] = true;
        let raw: Vec<Complex64> = (0..n).map(|i| left_decomp.vectors[i][best]).collect();
        let overlap = inner(n, &raw, &right[k]);
        if overlap.norm() < 1e-300 {
            return Err(EngineError::invariant(
                "heff::diagonalize_block",
                "left/right eigenvector pair has zero overlap; model space is defective (non-diagonalisable)",
            ));
        }
        let scale = overlap.inv();
        left.push(raw.iter().map(|&v| v * scale.conj()).collect());
    }

    Ok((eigenvalues, right, left))
}

/// Löwdin-orthonormalises the right eigenvectors in place (`right^H
/// right = I` afterwards) and sets `left := right`, per §4.7e.
fn hermitise(n: usize, right: &mut Vec<Vec<Complex64>>, left: &mut Vec<Vec<Complex64>>) -> EngineResult<()> {
    let k = right.len();
    if k == 0 {
        return Ok(());
    }
    // Gram matrix S_ij = right_i^H right_j, row-major k x k.
    let mut gram = vec![Complex64::new(0.0, 0.0); k * k];
    for i in 0..k {
        for j in 0..k {
            gram[i * k + j] = inner(n, &right[i], &right[j]);
        }
    }
    let inv_sqrt = linalg::inverse_sqrt_hermitian(k, &gram)?;
    let mut new_right = vec![vec![Complex64::new(0.0, 0.0); n]; k];
    for out_k in 0..k {
        for i in 0..n {
            let mut acc = Complex64::new(0.0, 0.0);
            for j in 0..k {
                acc += right[j][i] * inv_sqrt[j * k + out_k];
            }
            new_right[out_k][i] = acc;
        }
    }
    *right = new_right.clone();
    *left = new_right;
    Ok(())
}

/// Builds and diagonalises every irrep's H_eff block for sector
/// `(sector_h, sector_p)` (§4.7, points 1-2e). Vacuum-involving matrix
/// elements (when `include_mixed_vacuum` is set) are produced by the
/// same cross-sector Slater rules, via the interactions the caller
/// passes in.
pub fn build_heff_blocks(
    registry: &SpinorRegistry,
    symmetry: &SymmetryTable,
    sector_h: usize,
    sector_p: usize,
    include_mixed_vacuum: bool,
    interactions: &[EffectiveInteraction],
    hermitise_model_vectors: bool,
) -> EngineResult<Vec<HeffBlock>> {
    let (dets, by_irrep) = enumerate_model_space(registry, symmetry, sector_h, sector_p, include_mixed_vacuum)?;

    let mut irreps: Vec<IrrepId> = by_irrep.keys().copied().collect();
    irreps.sort_unstable();

    let mut blocks = Vec::with_capacity(irreps.len());
    for irrep in irreps {
        let idxs = &by_irrep[&irrep];
        let n = idxs.len();
        let block_dets: Vec<Determinant> = idxs.iter().map(|&i| dets[i].clone()).collect();

        let mut matrix = vec![Complex64::new(0.0, 0.0); n * n];
        for (i, d) in block_dets.iter().enumerate() {
            matrix[i * n + i] += Complex64::new(zero_order_energy(registry, d), 0.0);
        }
        for interaction in interactions {
            let rules = setup_slater(
                |idx: &[usize]| (interaction.get)(idx),
                sector_h,
                sector_p,
                sector_h,
                sector_p,
                interaction.npart,
            )?;
            for i in 0..n {
                for j in 0..n {
                    let v = rules.slater_rule(&block_dets[i], &block_dets[j])?;
                    matrix[i * n + j] += v.as_complex();
                }
            }
        }

        let (eigenvalues, mut right, mut left) = diagonalize_block(n, &matrix)?;
        if hermitise_model_vectors {
            hermitise(n, &mut right, &mut left)?;
        }

        blocks.push(HeffBlock {
            irrep,
            dets: block_dets,
            matrix,
            eigenvalues,
            right,
            left,
        });
    }
    Ok(blocks)
}

/// Point 3 of §4.7: the number of roots kept for one block, as
/// `min(nroots_config, roots_under_cutoff)`.
pub fn select_root_count(block: &HeffBlock, nroots_config: usize, roots_energy_cutoff: Option<f64>) -> usize {
    let under_cutoff = match roots_energy_cutoff {
        Some(cutoff) => block.eigenvalues.iter().filter(|e| e.re <= cutoff).count(),
        None => block.eigenvalues.len(),
    };
    nroots_config.min(under_cutoff).min(block.eigenvalues.len())
}

/// One row of the merged energy table (point 6): absolute and
/// ground-relative energies in hartree, eV, and cm^-1, plus degeneracy
/// and symmetry.
#[derive(Clone, Debug)]
pub struct EnergyRow {
    pub level: usize,
    pub irrep: IrrepId,
    pub eigenvalue: Complex64,
    pub relative_hartree: f64,
    pub relative_ev: f64,
    pub relative_cm1: f64,
    pub degeneracy: usize,
    /// Present only when IH-IMMS is active for this sector.
    pub main_weight_percent: Option<f64>,
}

pub const HARTREE_TO_EV: f64 = 27.211_386_245_988;
pub const HARTREE_TO_CM1: f64 = 219_474.631_363_2;

/// Merges every block's kept roots into one ascending-energy table,
/// grouping near-degenerate levels (within `degen_thresh` hartree) into
/// a single row whose `degeneracy` counts the group size.
pub fn merge_energy_table(
    blocks: &[HeffBlock],
    nroots_config: usize,
    roots_energy_cutoff: Option<f64>,
    degen_thresh: f64,
) -> Vec<EnergyRow> {
    let mut entries: Vec<(IrrepId, Complex64)> = Vec::new();
    for block in blocks {
        let k = select_root_count(block, nroots_config, roots_energy_cutoff);
        for &e in &block.eigenvalues[..k] {
            entries.push((block.irrep, e));
        }
    }
    entries.sort_by(|a, b| a.1.re.partial_cmp(&b.1.re).unwrap());

    let ground = entries.first().map(|(_, e)| e.re).unwrap_or(0.0);

    let mut rows: Vec<EnergyRow> = Vec::new();
    let mut level = 0usize;
    let mut i = 0usize;
    while i < entries.len() {
        let mut j = i + 1;
        while j < entries.len() && (entries[j].1.re - entries[i].1.re).abs() <= degen_thresh {
            j += 1;
        }
        let (irrep, eigenvalue) = entries[i];
        let rel = eigenvalue.re - ground;
        rows.push(EnergyRow {
            level,
            irrep,
            eigenvalue,
            relative_hartree: rel,
            relative_ev: rel * HARTREE_TO_EV,
            relative_cm1: rel * HARTREE_TO_CM1,
            degeneracy: j - i,
            main_weight_percent: None,
        });
        level += 1;
        i = j;
    }
    rows
}

/// Per-irrep determinant-index -> main/intermediate percentage weight,
/// used to fill `EnergyRow::main_weight_percent` when IH-IMMS is active.
/// `weights[k]` is `|right[k][det]|^2` summed over "main" determinant
/// rows, as a fraction of the full norm.
pub fn main_weight_percent(block: &HeffBlock, root: usize, is_main: &dyn Fn(&Determinant) -> bool) -> f64 {
    let vec = &block.right[root];
    let total: f64 = vec.iter().map(|c| c.norm_sqr()).sum();
    if total == 0.0 {
        return 0.0;
    }
    let main_norm: f64 = block
        .dets
        .iter()
        .zip(vec.iter())
        .filter(|(d, _)| is_main(d))
        .map(|(_, c)| c.norm_sqr())
        .sum();
    100.0 * main_norm / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::SymmetryTable;

    fn toy_registry() -> SpinorRegistry {
        SpinorRegistry::new(
            vec![0, 0],
            vec![-0.5, -0.3],
            vec![false, false],
            vec![true, true],
            vec![true, true],
            8,
        )
        .unwrap()
    }

    #[test]
    fn two_by_two_0h1p_matches_analytic_eigenvalues() {
        let reg = toy_registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();

        let vaa = -0.05;
        let vbb = -0.02;
        let vab = 0.01;
        let interaction = EffectiveInteraction {
            npart: 1,
            get: Box::new(move |idx: &[usize]| {
                Ok(Scalar::Real(match (idx[0], idx[1]) {
                    (0, 0) => vaa,
                    (1, 1) => vbb,
                    (0, 1) | (1, 0) => vab,
                    _ => 0.0,
                }))
            }),
        };

        let blocks = build_heff_blocks(&reg, &sym, 0, 1, false, &[interaction], false).unwrap();
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.dets.len(), 2);

        // H = [[ea+vaa, vab],[vab, eb+vbb]]
        let ea = reg.energy(0) + vaa;
        let eb = reg.energy(1) + vbb;
        let tr = ea + eb;
        let det = ea * eb - vab * vab;
        let disc = (tr * tr - 4.0 * det).sqrt();
        let lo = (tr - disc) / 2.0;
        let hi = (tr + disc) / 2.0;

        assert!((block.eigenvalues[0].re - lo).abs() < 1e-8);
        assert!((block.eigenvalues[1].re - hi).abs() < 1e-8);
        assert!(block.eigenvalues[0].re <= block.eigenvalues[1].re);

        // Biorthonormality: left_k^H right_k == 1, left_k^H right_j == 0 (j != k).
        for k in 0..2 {
            for j in 0..2 {
                let ip = inner(2, &block.left[k], &block.right[j]);
                let expected = if k == j { 1.0 } else { 0.0 };
                assert!((ip.re - expected).abs() < 1e-6, "k={k} j={j} ip={ip:?}");
                assert!(ip.im.abs() < 1e-6);
            }
        }
    }

    #[test]
    fn hermitisation_makes_right_vectors_orthonormal() {
        let reg = toy_registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let interaction = EffectiveInteraction {
            npart: 1,
            get: Box::new(|idx: &[usize]| {
                Ok(Scalar::Real(match (idx[0], idx[1]) {
                    (0, 0) => -0.05,
                    (1, 1) => -0.02,
                    (0, 1) | (1, 0) => 0.01,
                    _ => 0.0,
                }))
            }),
        };
        let blocks = build_heff_blocks(&reg, &sym, 0, 1, false, &[interaction], true).unwrap();
        let block = &blocks[0];
        for k in 0..2 {
            for j in 0..2 {
                let ip = inner(2, &block.right[k], &block.right[j]);
                let expected = if k == j { 1.0 } else { 0.0 };
                assert!((ip.re - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn root_selection_respects_cutoff_and_config() {
        let block = HeffBlock {
            irrep: 0,
            dets: vec![],
            matrix: vec![],
            eigenvalues: vec![Complex64::new(-1.0, 0.0), Complex64::new(0.0, 0.0), Complex64::new(2.0, 0.0)],
            right: vec![],
            left: vec![],
        };
        assert_eq!(select_root_count(&block, 5, Some(0.5)), 2);
        assert_eq!(select_root_count(&block, 1, Some(0.5)), 1);
    }
}
