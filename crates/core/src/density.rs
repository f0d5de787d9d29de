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

//! Density and natural-spinor module (§4.8): (transition) density
//! matrices over the active spinor set, built from model vectors and a
//! closed form for `a_p^† a_q` between model determinants; diagonalised
//! (natural spinors) or SVD'd (natural-transition spinors) via
//! `linalg`, then written to the natural-spinor text artefact.

use std::io::Write;
use std::path::Path;

use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};
use crate::linalg;
use crate::model_space::Determinant;
use crate::spinor::SpinorIndex;

/// One selected root of a model-space block: its determinants and the
/// left/right coefficient column for the chosen state, as read back
/// from an MVCOEF record.
pub struct ModelState<'a> {
    pub dets: &'a [Determinant],
    pub left: &'a [Complex64],
    pub right: &'a [Complex64],
}

/// The full ordered list of slots a model determinant occupies, holes
/// first then particles — the same convention `slater_rules` already
/// uses to fold holes and particles into one ordered Slater-determinant
/// object (a hole slot represents a spinor removed from the reference,
/// treated here as "occupied" in that combined sense). This lets one
/// one-body Slater-Condon rule serve the density matrix uniformly
/// across sectors, rather than needing a separate hole/particle case
/// split. Documented as an Open Question resolution: the original
/// vacuum self-overlap special case in sector (1,1) (flagged upstream
/// as a likely bug) is not reproduced — the vacuum determinant's empty
/// slot list already falls out of this same rule with no special case
/// needed.
fn occupied_slots(det: &Determinant) -> Vec<SpinorIndex> {
    det.holes.iter().chain(det.particles.iter()).copied().collect()
}

fn permutation_sign(bra_slots: &[SpinorIndex], ket_slots: &[SpinorIndex], m: SpinorIndex, n: SpinorIndex) -> f64 {
    let pos_m = bra_slots.iter().position(|&x| x == m).expect("m is in bra_slots by construction");
    let pos_n = ket_slots.iter().position(|&x| x == n).expect("n is in ket_slots by construction");
    if (pos_m + pos_n) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// `<bra| a_p^† a_q |ket>`: the standard one-body Slater-Condon rule
/// between two determinants represented as ordered occupied-slot
/// lists. Zero unless the bra and ket slot sets differ in at most one
/// position (§4.5's "closed forms" for the one-body density operator).
fn one_body_element(bra: &Determinant, ket: &Determinant, p: SpinorIndex, q: SpinorIndex) -> f64 {
    let bra_slots = occupied_slots(bra);
    let ket_slots = occupied_slots(ket);

    let only_in_bra: Vec<SpinorIndex> = bra_slots.iter().copied().filter(|i| !ket_slots.contains(i)).collect();
    let only_in_ket: Vec<SpinorIndex> = ket_slots.iter().copied().filter(|i| !bra_slots.contains(i)).collect();

    match (only_in_bra.len(), only_in_ket.len()) {
        (0, 0) => {
            if p == q && bra_slots.contains(&p) {
                1.0
            } else {
                0.0
            }
        }
        (1, 1) => {
            let (m, n) = (only_in_bra[0], only_in_ket[0]);
            if p == m && q == n {
                permutation_sign(&bra_slots, &ket_slots, m, n)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Builds the (transition) density matrix `D[p,q]` over `spinors`
/// (row/column `i` corresponds to `spinors[i]`), per §4.8:
/// `D[p,q] = Σ_{bra,ket} conj(C_L[bra]) · C_R[ket] · <bra|a_p^† a_q|ket>`.
pub fn density_matrix(bra: &ModelState, ket: &ModelState, spinors: &[SpinorIndex]) -> EngineResult<Vec<Complex64>> {
    if bra.dets.len() != bra.left.len() {
        return Err(EngineError::configuration(
            "density::density_matrix",
            "bra determinant count does not match its coefficient column length",
        ));
    }
    if ket.dets.len() != ket.right.len() {
        return Err(EngineError::configuration(
            "density::density_matrix",
            "ket determinant count does not match its coefficient column length",
        ));
    }

    let n = spinors.len();
    let mut d = vec![Complex64::new(0.0, 0.0); n * n];
    for (bi, bdet) in bra.dets.iter().enumerate() {
        let cl = bra.left[bi].conj();
        if cl == Complex64::new(0.0, 0.0) {
            continue;
        }
        for (ki, kdet) in ket.dets.iter().enumerate() {
            let cr = ket.right[ki];
            if cr == Complex64::new(0.0, 0.0) {
                continue;
            }
            let weight = cl * cr;
            for (pi, &p) in spinors.iter().enumerate() {
                for (qi, &q) in spinors.iter().enumerate() {
                    let elem = one_body_element(bdet, kdet, p, q);
                    if elem != 0.0 {
                        d[pi * n + qi] += weight * elem;
                    }
                }
            }
        }
    }
    Ok(d)
}

/// One natural (transition) spinor: the spinor it expands onto, its
/// occupation number (or singular value, for a transition density),
/// and its expansion coefficients over the active-spinor basis.
pub struct NaturalSpinor {
    pub occupation: f64,
    pub coefficients: Vec<Complex64>,
}

/// `true` occupation-number comparator of §4.8: negative occupations
/// first (ascending magnitude, i.e. closest to zero first), then
/// positive occupations (descending magnitude, i.e. most occupied
/// first).
fn natural_order(a: f64, b: f64) -> std::cmp::Ordering {
    let key = |x: f64| {
        if x < 0.0 {
            (0u8, x.abs())
        } else {
            (1u8, -x)
        }
    };
    key(a).partial_cmp(&key(b)).unwrap()
}

/// Diagonalises a same-state density matrix into natural spinors,
/// sorted by `natural_order`.
pub fn natural_spinors(n: usize, density: &[Complex64]) -> EngineResult<Vec<NaturalSpinor>> {
    let eig = linalg::eigendecompose(n, density)?;
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| natural_order(eig.eigenvalues[i].re, eig.eigenvalues[j].re));

    Ok(order
        .into_iter()
        .map(|k| NaturalSpinor {
            occupation: eig.eigenvalues[k].re,
            coefficients: (0..n).map(|i| eig.vectors[i][k]).collect(),
        })
        .collect())
}

/// One side (left or right) of a natural-transition-spinor pair.
pub struct NaturalTransitionSpinors {
    pub singular_values: Vec<f64>,
    pub left: Vec<Vec<Complex64>>,
    pub right: Vec<Vec<Complex64>>,
}

/// SVD of a transition density matrix (bra state != ket state) into
/// natural-transition spinors, per §4.8.
pub fn natural_transition_spinors(n: usize, density: &[Complex64]) -> EngineResult<NaturalTransitionSpinors> {
    let svd = linalg::svd(n, n, density)?;
    Ok(NaturalTransitionSpinors {
        singular_values: svd.s,
        left: (0..n).map(|i| (0..svd.u[0].len()).map(|k| svd.u[i][k]).collect()).collect(),
        right: (0..n).map(|i| (0..svd.v[0].len()).map(|k| svd.v[i][k]).collect()).collect(),
    })
}

/// Writes the natural-spinor text artefact (§6.2): a header naming the
/// active-spinor count and threshold, then one block per spinor whose
/// `|occupation|` exceeds `threshold`.
pub fn write_natural_spinors_text(
    path: impl AsRef<Path>,
    spinors: &[SpinorIndex],
    natural: &[NaturalSpinor],
    threshold: f64,
) -> EngineResult<()> {
    let path = path.as_ref();
    let mut out = String::new();
    out.push_str(&format!("# natural spinors: {} active, threshold {threshold:e}\n", spinors.len()));
    let mut kept = 0usize;
    for ns in natural {
        if ns.occupation.abs() < threshold {
            continue;
        }
        kept += 1;
        out.push_str(&format!("spinor occupation {:.10}\n", ns.occupation));
        for (i, &p) in spinors.iter().enumerate() {
            let c = ns.coefficients[i];
            out.push_str(&format!("  {p:>6}  {:.10}  {:.10}\n", c.re, c.im));
        }
    }
    out.push_str(&format!("# {kept} spinor(s) above threshold\n"));

    let mut file = std::fs::File::create(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    file.write_all(out.as_bytes()).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(holes: &[usize], particles: &[usize]) -> Determinant {
        Determinant {
            holes: holes.to_vec(),
            particles: particles.to_vec(),
            irrep: 0,
        }
    }

    #[test]
    fn diagonal_element_counts_occupation() {
        let d = det(&[], &[2]);
        assert_eq!(one_body_element(&d, &d, 2, 2), 1.0);
        assert_eq!(one_body_element(&d, &d, 3, 3), 0.0);
        assert_eq!(one_body_element(&d, &d, 2, 3), 0.0);
    }

    #[test]
    fn single_replacement_carries_a_sign() {
        let bra = det(&[], &[2]);
        let ket = det(&[], &[3]);
        assert_eq!(one_body_element(&bra, &ket, 2, 3), 1.0);
        assert_eq!(one_body_element(&bra, &ket, 3, 2), 0.0);
    }

    #[test]
    fn density_matrix_of_a_pure_state_is_idempotent_on_its_occupied_slot() {
        let dets = vec![det(&[], &[2])];
        let left = vec![Complex64::new(1.0, 0.0)];
        let right = vec![Complex64::new(1.0, 0.0)];
        let state = ModelState {
            dets: &dets,
            left: &left,
            right: &right,
        };
        let spinors = vec![2usize, 3usize];
        let d = density_matrix(&state, &state, &spinors).unwrap();
        assert_eq!(d[0], Complex64::new(1.0, 0.0)); // D[2,2]
        assert_eq!(d[3], Complex64::new(0.0, 0.0)); // D[3,3]
    }

    #[test]
    fn natural_order_places_negatives_before_positives_by_magnitude() {
        let mut vals = vec![0.8, -0.1, 0.3, -0.9];
        vals.sort_by(|a, b| natural_order(*a, *b));
        assert_eq!(vals, vec![-0.1, -0.9, 0.8, 0.3]);
    }
}
