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

//! `reorder`: tensor transposition across dimensions.
//!
//! A permutation that only ever redistributes positions *within* one
//! quasiparticle/valence role class is the fermionic antisymmetry of that
//! class and carries a sign; a permutation that only relabels which slot
//! holds which role (e.g. swapping a hole dimension with a particle
//! dimension) is a pure relabelling and carries none. Because the new
//! diagram's role at position `i` is defined as `qparts[pi[i]]`, the
//! positions of any one role always map bijectively old-to-new, so the
//! sign is well-defined as the product, over role classes, of the parity
//! of the induced within-class permutation.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::spinor::SpinorRegistry;
use crate::symmetry::SymmetryTable;
use crate::tensor::access;
use crate::tensor::diagram::{tmplt, Arithmetic, Diagram, Scalar, StorageClass};
use crate::tensor::signature::Signature;

fn group_positions_by_role(sig: &Signature) -> Vec<Vec<usize>> {
    let mut groups: HashMap<(bool, bool), Vec<usize>> = HashMap::new();
    for (k, (&q, &v)) in sig.qparts.iter().zip(sig.valence.iter()).enumerate() {
        groups
            .entry((q == crate::spinor::QuasiParticle::Hole, v))
            .or_default()
            .push(k);
    }
    groups.into_values().collect()
}

fn transpose_sign(old_sig: &Signature, pi: &[usize]) -> f64 {
    let groups = group_positions_by_role(old_sig);
    let mut sign = 1.0;
    for group in &groups {
        if group.len() < 2 {
            continue;
        }
        let new_positions: Vec<usize> = (0..pi.len()).filter(|&i| group.contains(&pi[i])).collect();
        let local: Vec<usize> = new_positions
            .iter()
            .map(|&i| group.iter().position(|&g| g == pi[i]).expect("membership checked above"))
            .collect();
        sign *= Signature::parity_sign(&local);
    }
    sign
}

fn qparts_string(sig: &Signature) -> String {
    sig.qparts
        .iter()
        .map(|q| if *q == crate::spinor::QuasiParticle::Hole { 'h' } else { 'p' })
        .collect()
}

fn valence_string(sig: &Signature) -> String {
    sig.valence.iter().map(|&v| if v { '1' } else { '0' }).collect()
}

/// Produces a new diagram `D'` with `qparts'[i] = qparts[pi(i)]`,
/// `valence'[i] = valence[pi(i)]`, `order'[i] = order[pi(i)]`, copying and
/// sign-adjusting every element of `src`.
pub fn reorder(
    registry: &SpinorRegistry,
    symmetry: &SymmetryTable,
    src: &Diagram,
    pi: &[usize],
    new_name: impl Into<String>,
    disk_usage_level: u8,
) -> EngineResult<Diagram> {
    let r = src.rank();
    if pi.len() != r {
        return Err(EngineError::configuration(
            "reorder",
            format!("permutation has length {}, expected rank {r}", pi.len()),
        ));
    }
    let new_sig = src.signature.permuted(pi)?;
    let sign = transpose_sign(&src.signature, pi);

    let new_name = new_name.into();
    let mut dst = tmplt(
        registry,
        symmetry,
        new_name,
        &qparts_string(&new_sig),
        &valence_string(&new_sig),
        &new_sig.order,
        src.only_unique,
        src.arithmetic,
        disk_usage_level,
    )?;
    // tmplt's own storage-class heuristic may disagree with the source's;
    // reorder always preserves the source's residency discipline instead,
    // since it is re-expressing the same physical data.
    for block in dst.blocks_mut() {
        block.storage_class = StorageClass::InMemory;
    }

    let inv_pi: Vec<usize> = {
        let mut inv = vec![0usize; r];
        for (i, &p) in pi.iter().enumerate() {
            inv[p] = i;
        }
        inv
    };

    let unique_ids: Vec<_> = dst.unique_block_ids().collect();
    for id in unique_ids {
        let shape = dst.block(id).shape.clone();
        let spinor_blocks = dst.block(id).spinor_blocks.clone();
        for local in crate::tensor::odometer(&shape) {
            let dst_global: Vec<usize> = (0..r)
                .map(|i| registry.block(spinor_blocks[i]).indices[local[i]])
                .collect();
            let src_global: Vec<usize> = (0..r).map(|j| dst_global[inv_pi[j]]).collect();
            let value = access::get(registry, src, &src_global)?;
            access::set(registry, &mut dst, &dst_global, value.scale(sign))?;
        }
    }
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::diagram::tmplt;

    fn rank2_registry() -> SpinorRegistry {
        SpinorRegistry::new(
            vec![0, 0, 0, 0],
            vec![-1.0, -0.5, 0.3, 0.4],
            vec![true, true, false, false],
            vec![true, true, true, true],
            vec![true, true, true, true],
            8,
        )
        .unwrap()
    }

    #[test]
    fn transpose_of_hp_has_no_sign_flip() {
        let reg = rank2_registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "t", "hp", "00", &[0, 1], true, Arithmetic::Real, 0).unwrap();
        // holes {0,1}, particles {2,3}; fill with [[1,2],[3,4]] (row=hole,col=particle).
        let vals = [[1.0, 2.0], [3.0, 4.0]];
        for (hi, &h) in [0usize, 1].iter().enumerate() {
            for (pi_, &p) in [2usize, 3].iter().enumerate() {
                access::set(&reg, &mut d, &[h, p], Scalar::Real(vals[hi][pi_])).unwrap();
            }
        }
        let dt = reorder(&reg, &sym, &d, &[1, 0], "t_t", 0).unwrap();
        // dt dims: [particle, hole]; dt[p,h] == d[h,p]
        for (hi, &h) in [0usize, 1].iter().enumerate() {
            for (pi_, &p) in [2usize, 3].iter().enumerate() {
                let v = access::get(&reg, &dt, &[p, h]).unwrap();
                assert_eq!(v, Scalar::Real(vals[hi][pi_]));
            }
        }
    }

    #[test]
    fn reorder_identity_is_noop() {
        let reg = rank2_registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "t", "hp", "00", &[0, 1], true, Arithmetic::Real, 0).unwrap();
        access::set(&reg, &mut d, &[0, 2], Scalar::Real(9.0)).unwrap();
        let dt = reorder(&reg, &sym, &d, &[0, 1], "t2", 0).unwrap();
        assert_eq!(access::get(&reg, &dt, &[0, 2]).unwrap(), Scalar::Real(9.0));
    }
}
