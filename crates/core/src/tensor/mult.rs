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

//! `mult`: general contraction over a contiguous prefix of indices.
//!
//! `C[free_A, free_B] = sum_k A[free_A, k] * B[k, free_B]`, where the
//! trailing `n` storage dimensions of `A` are contracted against the
//! leading `n` storage dimensions of `B`. Because a diagram's own
//! storage order already places free dimensions before contracted ones
//! (that is what `mult`'s contract requires of its caller), each block's
//! flat buffer is already laid out as the `(free, contract)` matrix the
//! contraction needs; the block-level work reduces to one dense GEMM per
//! matching `(A block, B block)` pair sharing a contracted spinor-block
//! tuple, exactly as the design calls for.

use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};
use crate::spinor::{BlockId as SpinorBlockId, QuasiParticle, SpinorRegistry};
use crate::symmetry::SymmetryTable;
use crate::tensor::access::restore_block;
use crate::tensor::diagram::{tmplt, Arithmetic, Buffer, DiagBlockId, Diagram};
use crate::tensor::odometer;

fn qparts_string(d: &Diagram, range: std::ops::Range<usize>) -> String {
    d.signature.qparts[range]
        .iter()
        .map(|q| if *q == QuasiParticle::Hole { 'h' } else { 'p' })
        .collect()
}

fn valence_string(d: &Diagram, range: std::ops::Range<usize>) -> String {
    d.signature.valence[range]
        .iter()
        .map(|&v| if v { '1' } else { '0' })
        .collect()
}

fn dense_real(buffer: &Buffer) -> Vec<f64> {
    match buffer {
        Buffer::Real(v) => v.clone(),
        Buffer::Complex(v) => v.iter().map(|c| c.re).collect(),
    }
}

fn dense_complex(buffer: &Buffer) -> Vec<Complex64> {
    match buffer {
        Buffer::Real(v) => v.iter().map(|&x| Complex64::new(x, 0.0)).collect(),
        Buffer::Complex(v) => v.clone(),
    }
}

/// `mult(A, B, C, n)`: builds and returns a brand-new diagram named
/// `c_name`. Callers that need to accumulate into an existing diagram use
/// `crate::tensor::update::update` on the result.
#[allow(clippy::too_many_arguments)]
pub fn mult(
    registry: &SpinorRegistry,
    symmetry: &SymmetryTable,
    a: &Diagram,
    b: &Diagram,
    n: usize,
    c_name: impl Into<String>,
    disk_usage_level: u8,
) -> EngineResult<Diagram> {
    let ra = a.rank();
    let rb = b.rank();
    if n == 0 {
        return Err(EngineError::configuration("mult", "contraction order n must be positive"));
    }
    if n > ra || n > rb {
        return Err(EngineError::configuration(
            "mult",
            format!("contraction order {n} exceeds rank of A ({ra}) or B ({rb})"),
        ));
    }
    if a.arithmetic != b.arithmetic {
        return Err(EngineError::configuration("mult", "A and B have different arithmetic modes"));
    }
    let fa = ra - n;
    let fb = rb - n;
    let rc = fa + fb;
    if rc == 0 || rc % 2 != 0 {
        return Err(EngineError::configuration(
            "mult",
            format!("resulting rank {rc} is not a positive even number"),
        ));
    }

    let qparts_c = format!("{}{}", qparts_string(a, 0..fa), qparts_string(b, n..rb));
    let valence_c = format!("{}{}", valence_string(a, 0..fa), valence_string(b, n..rb));
    let order_c: Vec<usize> = (0..rc).collect();
    let only_unique = a.only_unique && b.only_unique;

    let mut c = tmplt(
        registry,
        symmetry,
        c_name,
        &qparts_c,
        &valence_c,
        &order_c,
        only_unique,
        a.arithmetic,
        disk_usage_level,
    )?;

    // Index B's blocks by their leading n-dim spinor-block tuple so each
    // A block only scans the B blocks that can possibly share its
    // contracted leg.
    let mut b_by_head: std::collections::HashMap<Vec<SpinorBlockId>, Vec<DiagBlockId>> = std::collections::HashMap::new();
    for (id, blk) in b.blocks().iter().enumerate() {
        b_by_head.entry(blk.spinor_blocks[..n].to_vec()).or_default().push(id);
    }

    for a_id in 0..a.num_blocks() {
        let a_blk = a.block(a_id).clone();
        let k_tuple = a_blk.spinor_blocks[fa..ra].to_vec();
        let Some(b_candidates) = b_by_head.get(&k_tuple) else {
            continue;
        };
        let free_a = &a_blk.spinor_blocks[..fa];
        let m: usize = a_blk.shape[..fa].iter().product();
        let k_dim: usize = a_blk.shape[fa..].iter().product();

        for &b_id in b_candidates {
            let b_blk = b.block(b_id).clone();
            let free_b = &b_blk.spinor_blocks[n..];
            let k_dim2: usize = b_blk.shape[..n].iter().product();
            if k_dim2 != k_dim {
                // Shapes disagree even though spinor-block ids match;
                // a structural inconsistency between A and B.
                return Err(EngineError::invariant(
                    &c.name,
                    "mismatched contraction dimension between A and B blocks",
                ));
            }
            let n_dim: usize = b_blk.shape[n..].iter().product();

            let c_tuple: Vec<SpinorBlockId> = free_a.iter().chain(free_b.iter()).copied().collect();
            let Some(c_id) = c.find_block(&c_tuple) else {
                continue;
            };

            // Resolve the write target to the unique representative;
            // `mult` only ever accumulates into unique blocks, matching
            // non-unique blocks being filled by restoration afterwards.
            let (target_id, perm, out_sign) = {
                let c_blk = c.block(c_id);
                if c_blk.is_unique {
                    (c_id, None, 1.0)
                } else {
                    (
                        c_blk.unique.ok_or_else(|| {
                            EngineError::invariant(&c.name, "non-unique target block missing `unique` reference")
                        })?,
                        c_blk.perm_to_unique.clone(),
                        c_blk.sign,
                    )
                }
            };

            // Restore both operand blocks' data (no-op if already unique
            // and resident), then run the dense multiply.
            let a_data = restored_dense(a, a_id)?;
            let b_data = restored_dense(b, b_id)?;
            let result = match a.arithmetic {
                Arithmetic::Real => {
                    let av = dense_real(&a_data);
                    let bv = dense_real(&b_data);
                    Buffer::Real(gemm_real(&av, m, k_dim, &bv, n_dim))
                }
                Arithmetic::Complex => {
                    let av = dense_complex(&a_data);
                    let bv = dense_complex(&b_data);
                    Buffer::Complex(gemm_complex(&av, m, k_dim, &bv, n_dim))
                }
            };

            accumulate(&mut c, target_id, perm, out_sign, &result, &[m, n_dim])?;
        }
    }

    if !only_unique {
        let all_ids: Vec<_> = (0..c.num_blocks()).collect();
        for id in all_ids {
            restore_block(&mut c, id)?;
        }
    }

    Ok(c)
}

fn restored_dense(d: &Diagram, id: DiagBlockId) -> EngineResult<Buffer> {
    if let Some(buf) = d.block(id).buffer() {
        return Ok(buf.clone());
    }
    let mut scratch = d.clone();
    restore_block(&mut scratch, id)?;
    Ok(scratch
        .block(id)
        .buffer()
        .expect("restore_block just populated this block")
        .clone())
}

fn gemm_real(a: &[f64], m: usize, k: usize, b: &[f64], n: usize) -> Vec<f64> {
    let mut c = vec![0.0; m * n];
    for i in 0..m {
        for p in 0..k {
            let aip = a[i * k + p];
            if aip == 0.0 {
                continue;
            }
            for j in 0..n {
                c[i * n + j] += aip * b[p * n + j];
            }
        }
    }
    c
}

fn gemm_complex(a: &[Complex64], m: usize, k: usize, b: &[Complex64], n: usize) -> Vec<Complex64> {
    let mut c = vec![Complex64::new(0.0, 0.0); m * n];
    for i in 0..m {
        for p in 0..k {
            let aip = a[i * k + p];
            if aip == Complex64::new(0.0, 0.0) {
                continue;
            }
            for j in 0..n {
                c[i * n + j] += aip * b[p * n + j];
            }
        }
    }
    c
}

/// Scatter-accumulates a dense `(m, n)` result into `target_id`'s buffer,
/// applying the unique-to-non-unique permutation and sign when the
/// nominal destination block was non-unique.
fn accumulate(
    c: &mut Diagram,
    target_id: DiagBlockId,
    perm: Option<Vec<usize>>,
    sign: f64,
    result: &Buffer,
    shape: &[usize],
) -> EngineResult<()> {
    let target_shape = c.block(target_id).shape.clone();
    for local in odometer(shape) {
        let lin_src = {
            let mut idx = 0;
            for (k, &off) in local.iter().enumerate() {
                idx = idx * shape[k] + off;
            }
            idx
        };
        let target_local = match &perm {
            None => local.clone(),
            Some(perm) => {
                let mut permuted = vec![0usize; local.len()];
                for (k, &dst) in perm.iter().enumerate() {
                    permuted[dst] = local[k];
                }
                permuted
            }
        };
        let lin_dst = {
            let mut idx = 0;
            for (k, &off) in target_local.iter().enumerate() {
                idx = idx * target_shape[k] + off;
            }
            idx
        };
        let value = result.get(lin_src).scale(sign);
        let block = c.block_mut(target_id);
        let buffer = block
            .buffer_mut()
            .ok_or_else(|| EngineError::invariant(&c.name, "unique block missing buffer during mult accumulation"))?;
        let prior = buffer.get(lin_dst);
        let sum = match (prior, value) {
            (crate::tensor::diagram::Scalar::Real(p), crate::tensor::diagram::Scalar::Real(v)) => {
                crate::tensor::diagram::Scalar::Real(p + v)
            }
            (p, v) => crate::tensor::diagram::Scalar::Complex(p.as_complex() + v.as_complex()),
        };
        buffer.set(lin_dst, sum);
    }
    Ok(())
}
