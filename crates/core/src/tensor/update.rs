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

//! `update` (axpy-style accumulation), `perm` (in-place
//! symmetrisation/antisymmetrisation), and `scalar_product`: the
//! block-parallel scalar operations of §4.3.5.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{EngineError, EngineResult};
use crate::tensor::diagram::{Buffer, Diagram, Scalar};

/// `C <- C + alpha * D`, block by block. Both diagrams must share the
/// same block structure (same name registered under `tmplt` with
/// identical signature is the intended use; this only checks block
/// counts and shapes, not spinor-block identity, since a mismatch there
/// would already show up as a shape mismatch).
///
/// Only unique blocks are touched when both diagrams are in
/// "only unique" mode; otherwise every physically stored block is
/// updated, since non-unique blocks own their own buffer in that mode.
pub fn update(c: &mut Diagram, alpha: f64, d: &Diagram) -> EngineResult<()> {
    if c.num_blocks() != d.num_blocks() {
        return Err(EngineError::invariant(
            &c.name,
            format!(
                "update: block count mismatch ({} vs {})",
                c.num_blocks(),
                d.num_blocks()
            ),
        ));
    }
    let only_unique = c.only_unique && d.only_unique;
    let ids: Vec<usize> = if only_unique {
        c.unique_block_ids().collect()
    } else {
        (0..c.num_blocks()).collect()
    };

    for id in ids {
        let (c_shape, d_shape) = (c.block(id).shape.clone(), d.block(id).shape.clone());
        if c_shape != d_shape {
            return Err(EngineError::invariant(
                &c.name,
                format!("update: shape mismatch at block {id}: {c_shape:?} vs {d_shape:?}"),
            ));
        }
        let d_buffer = d.block(id).buffer().ok_or_else(|| {
            EngineError::invariant(&d.name, format!("update: source block {id} has no resident data"))
        })?;
        let c_block = c.block_mut(id);
        let c_buffer = c_block
            .buffer_mut()
            .ok_or_else(|| EngineError::invariant(&c.name, format!("update: target block {id} has no resident data")))?;
        axpy(c_buffer, alpha, d_buffer)?;
    }
    Ok(())
}

fn axpy(c: &mut Buffer, alpha: f64, d: &Buffer) -> EngineResult<()> {
    match (c, d) {
        (Buffer::Real(cv), Buffer::Real(dv)) => {
            cv.par_iter_mut().zip(dv.par_iter()).for_each(|(ci, di)| *ci += alpha * di);
            Ok(())
        }
        (Buffer::Complex(cv), Buffer::Complex(dv)) => {
            cv.par_iter_mut().zip(dv.par_iter()).for_each(|(ci, di)| *ci += di * alpha);
            Ok(())
        }
        (Buffer::Complex(cv), Buffer::Real(dv)) => {
            cv.par_iter_mut()
                .zip(dv.par_iter())
                .for_each(|(ci, di)| *ci += Complex64::new(alpha * di, 0.0));
            Ok(())
        }
        (Buffer::Real(_), Buffer::Complex(_)) => Err(EngineError::configuration(
            "tensor::update",
            "cannot accumulate a complex diagram into a real one",
        )),
    }
}

/// A permutation operator entry: swap the two storage positions `(i, j)`
/// and scale by `weight` (typically `+1` for symmetrisation, `-1` for
/// antisymmetrisation of a fermionic pair).
#[derive(Clone, Copy, Debug)]
pub struct PermTerm {
    pub i: usize,
    pub j: usize,
    pub weight: f64,
}

/// Applies `D <- sum_term weight_term * transpose(D, swap(i,j))` in
/// place, accumulating over `spec`. Used to antisymmetrise a freshly
/// contracted diagram over a pair of equivalent indices without a round
/// trip through `reorder`'s own diagram allocation.
pub fn perm(
    registry: &crate::spinor::SpinorRegistry,
    d: &mut Diagram,
    spec: &[PermTerm],
) -> EngineResult<()> {
    use crate::tensor::access::{get, set};
    use crate::tensor::odometer;

    let rank = d.rank();
    let unique_ids: Vec<_> = d.unique_block_ids().collect();

    // Snapshot the pre-permutation element values before any writes, so
    // later terms in `spec` read the original tensor rather than a
    // partially-updated one.
    let mut snapshot: Vec<(Vec<usize>, Scalar)> = Vec::new();
    for id in &unique_ids {
        let shape = d.block(*id).shape.clone();
        let spinor_blocks = d.block(*id).spinor_blocks.clone();
        for local in odometer(&shape) {
            let global: Vec<usize> = (0..rank)
                .map(|k| registry.block(spinor_blocks[k]).indices[local[k]])
                .collect();
            let value = get(registry, d, &global)?;
            snapshot.push((global, value));
        }
    }

    for term in spec {
        if term.i >= rank || term.j >= rank {
            return Err(EngineError::configuration(
                "tensor::perm",
                format!("swap indices ({}, {}) out of range for rank {rank}", term.i, term.j),
            ));
        }
        for (global, base_value) in &snapshot {
            let mut swapped = global.clone();
            swapped.swap(term.i, term.j);
            let added = get(registry, d, &swapped)?.scale(term.weight);
            let _ = base_value;
            let current = get(registry, d, global)?;
            let sum = match (current, added) {
                (Scalar::Real(a), Scalar::Real(b)) => Scalar::Real(a + b),
                (a, b) => Scalar::Complex(a.as_complex() + b.as_complex()),
            };
            set(registry, d, global, sum)?;
        }
    }
    Ok(())
}

/// `sum conj(A_i)^(conjA) * B_i^(conjB)` over every element the two
/// diagrams have in common, restricted to unique blocks (each orbit is
/// weighted once, matching the convention that non-unique blocks carry
/// no independent information).
pub fn scalar_product(conj_a: bool, conj_b: bool, a: &Diagram, b: &Diagram) -> EngineResult<Complex64> {
    if a.num_blocks() != b.num_blocks() {
        return Err(EngineError::invariant(
            &a.name,
            "scalar_product: block count mismatch between operands",
        ));
    }
    let mut total = Complex64::new(0.0, 0.0);
    for id in a.unique_block_ids() {
        let a_buf = a
            .block(id)
            .buffer()
            .ok_or_else(|| EngineError::invariant(&a.name, format!("scalar_product: block {id} has no data")))?;
        let b_buf = b
            .block(id)
            .buffer()
            .ok_or_else(|| EngineError::invariant(&b.name, format!("scalar_product: block {id} has no data")))?;
        if a_buf.len() != b_buf.len() {
            return Err(EngineError::invariant(&a.name, "scalar_product: buffer length mismatch"));
        }
        for i in 0..a_buf.len() {
            let mut av = a_buf.get(i).as_complex();
            let mut bv = b_buf.get(i).as_complex();
            if conj_a {
                av = av.conj();
            }
            if conj_b {
                bv = bv.conj();
            }
            total += av * bv;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spinor::SpinorRegistry;
    use crate::symmetry::SymmetryTable;
    use crate::tensor::access::set;
    use crate::tensor::diagram::{tmplt, Arithmetic};

    fn registry() -> SpinorRegistry {
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
    fn update_accumulates_scaled_values() {
        let reg = registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut c = tmplt(&reg, &sym, "c", "hp", "00", &[0, 1], true, Arithmetic::Real, 0).unwrap();
        let mut d = tmplt(&reg, &sym, "d", "hp", "00", &[0, 1], true, Arithmetic::Real, 0).unwrap();
        set(&reg, &mut c, &[0, 2], Scalar::Real(1.0)).unwrap();
        set(&reg, &mut d, &[0, 2], Scalar::Real(3.0)).unwrap();
        update(&mut c, 2.0, &d).unwrap();
        assert_eq!(
            crate::tensor::access::get(&reg, &c, &[0, 2]).unwrap(),
            Scalar::Real(7.0)
        );
    }

    #[test]
    fn scalar_product_of_identical_diagrams_is_sum_of_squares() {
        let reg = registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "d", "hp", "00", &[0, 1], true, Arithmetic::Real, 0).unwrap();
        set(&reg, &mut d, &[0, 2], Scalar::Real(2.0)).unwrap();
        set(&reg, &mut d, &[1, 3], Scalar::Real(3.0)).unwrap();
        let sp = scalar_product(false, false, &d, &d).unwrap();
        assert!((sp.re - 13.0).abs() < 1e-12);
    }
}
