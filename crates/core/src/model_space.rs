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

//! Slater-determinant & model-space machinery (§3.4, §4.4): enumeration
//! of the model determinants of a Fock-space sector, their irrep
//! classification, comparison, and overlap.

use crate::error::{EngineError, EngineResult};
use crate::spinor::{SpinorIndex, SpinorRegistry};
use crate::symmetry::{IrrepId, SymmetryTable};

/// A fixed-width model determinant: hole indices first, then particle
/// indices, each list strictly increasing (§3.4). The vacuum determinant
/// of a mixed (0,0)/(1,1) model space is represented by empty `holes`
/// and `particles`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Determinant {
    pub holes: Vec<SpinorIndex>,
    pub particles: Vec<SpinorIndex>,
    pub irrep: IrrepId,
}

impl Determinant {
    pub fn is_vacuum(&self) -> bool {
        self.holes.is_empty() && self.particles.is_empty()
    }

    /// The `(holes, particles)` content tuple used for equality, overlap,
    /// and the irrep-then-content comparator.
    fn content(&self) -> (&[SpinorIndex], &[SpinorIndex]) {
        (&self.holes, &self.particles)
    }
}

/// Orders determinants by irrep id first, then by content tuple
/// (holes, then particles, lexicographically) — the comparator §4.4
/// specifies for presenting a deterministic, stable model-space
/// ordering.
pub fn compare(a: &Determinant, b: &Determinant) -> std::cmp::Ordering {
    a.irrep
        .cmp(&b.irrep)
        .then_with(|| a.content().cmp(&b.content()))
}

/// `1` if the two determinants have identical content, `0` otherwise
/// (§4.4); distinct irreps already imply distinct content, so this is
/// simply content equality.
pub fn overlap(a: &Determinant, b: &Determinant) -> f64 {
    if a.content() == b.content() {
        1.0
    } else {
        0.0
    }
}

fn irrep_of(
    registry: &SpinorRegistry,
    symmetry: &SymmetryTable,
    holes: &[SpinorIndex],
    particles: &[SpinorIndex],
) -> IrrepId {
    let mut irrep = symmetry.totally_symmetric_irrep();
    for &h in holes {
        irrep = symmetry.mul(irrep, symmetry.inverse(registry.irrep(h)));
    }
    for &p in particles {
        irrep = symmetry.mul(irrep, registry.irrep(p));
    }
    irrep
}

/// Strictly increasing k-combinations of `items`, in ascending
/// lexicographic order — the enumeration order used for both the hole
/// and particle index lists of a sector's model determinants.
fn combinations(items: &[SpinorIndex], k: usize) -> Vec<Vec<SpinorIndex>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if k > items.len() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.iter().map(|&i| items[i]).collect());
        let mut i = k;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if idx[i] != i + items.len() - k {
                break;
            }
            if i == 0 {
                return out;
            }
        }
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// The model determinants of sector `(h, p)`: every strictly-increasing
/// choice of `h` active holes and `p` active particles. When
/// `include_mixed_vacuum` is set and the sector is exactly (1,1), the
/// vacuum determinant (its own irrep, the totally symmetric one) is
/// appended — the "mixed" option of §4.4.
///
/// Returns the full, unsorted list together with a per-irrep partition
/// (irrep id -> indices into the returned list), matching "per-irrep
/// counts and per-irrep arrays are returned".
pub fn enumerate_model_space(
    registry: &SpinorRegistry,
    symmetry: &SymmetryTable,
    sector_h: usize,
    sector_p: usize,
    include_mixed_vacuum: bool,
) -> EngineResult<(Vec<Determinant>, std::collections::HashMap<IrrepId, Vec<usize>>)> {
    if sector_h == 0 && sector_p == 0 {
        return Err(EngineError::configuration(
            "enumerate_model_space",
            "sector (0,0) has no active-space expansion; the vacuum determinant is handled separately",
        ));
    }
    let (_, holes) = registry.active_space(sector_h, 0);
    let (_, particles) = registry.active_space(0, sector_p);

    let hole_combos = combinations(&holes, sector_h);
    let particle_combos = combinations(&particles, sector_p);

    let mut dets = Vec::with_capacity(hole_combos.len() * particle_combos.len());
    for h in &hole_combos {
        for p in &particle_combos {
            let irrep = irrep_of(registry, symmetry, h, p);
            dets.push(Determinant {
                holes: h.clone(),
                particles: p.clone(),
                irrep,
            });
        }
    }

    if include_mixed_vacuum && sector_h == 1 && sector_p == 1 {
        dets.push(Determinant {
            holes: Vec::new(),
            particles: Vec::new(),
            irrep: symmetry.totally_symmetric_irrep(),
        });
    }

    dets.sort_by(compare);

    let mut by_irrep: std::collections::HashMap<IrrepId, Vec<usize>> = std::collections::HashMap::new();
    for (i, d) in dets.iter().enumerate() {
        by_irrep.entry(d.irrep).or_default().push(i);
    }

    Ok((dets, by_irrep))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SpinorRegistry {
        // 2 active particles irrep 0, 2 active particles irrep 1, no holes active.
        SpinorRegistry::new(
            vec![0, 0, 1, 1],
            vec![-0.5, -0.3, 0.2, 0.4],
            vec![false, false, false, false],
            vec![true, true, true, true],
            vec![true, true, true, true],
            8,
        )
        .unwrap()
    }

    fn sym() -> SymmetryTable {
        SymmetryTable::abelian_cyclic(vec!["A".into(), "Ap".into()]).unwrap()
    }

    #[test]
    fn sector_0h1p_enumerates_one_particle_determinants() {
        let reg = registry();
        let symm = sym();
        let (dets, by_irrep) = enumerate_model_space(&reg, &symm, 0, 1, false).unwrap();
        assert_eq!(dets.len(), 4);
        assert_eq!(by_irrep[&0].len(), 2);
        assert_eq!(by_irrep[&1].len(), 2);
    }

    #[test]
    fn sector_0h2p_only_keeps_strictly_increasing_pairs() {
        let reg = registry();
        let symm = sym();
        let (dets, _) = enumerate_model_space(&reg, &symm, 0, 2, false).unwrap();
        // C(4,2) = 6 combinations.
        assert_eq!(dets.len(), 6);
        for d in &dets {
            assert!(d.particles[0] < d.particles[1]);
        }
    }

    #[test]
    fn mixed_vacuum_only_appended_for_1h1p() {
        let reg = SpinorRegistry::new(
            vec![0, 0, 1, 1],
            vec![-0.5, -0.3, 0.2, 0.4],
            vec![true, true, false, false],
            vec![true, true, true, true],
            vec![true, true, true, true],
            8,
        )
        .unwrap();
        let symm = sym();
        let (dets, _) = enumerate_model_space(&reg, &symm, 1, 1, true).unwrap();
        assert!(dets.iter().any(|d| d.is_vacuum()));
        let (dets_no_mix, _) = enumerate_model_space(&reg, &symm, 1, 1, false).unwrap();
        assert!(!dets_no_mix.iter().any(|d| d.is_vacuum()));
    }

    #[test]
    fn overlap_is_one_iff_content_matches() {
        let a = Determinant {
            holes: vec![0],
            particles: vec![2],
            irrep: 0,
        };
        let b = a.clone();
        let c = Determinant {
            holes: vec![1],
            particles: vec![2],
            irrep: 0,
        };
        assert_eq!(overlap(&a, &b), 1.0);
        assert_eq!(overlap(&a, &c), 0.0);
    }
}
