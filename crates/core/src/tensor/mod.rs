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

//! The DPD tensor engine: symmetry-decomposed, permutation-compressed
//! block-sparse tensors over spinor indices, and their primitive algebra.

pub mod access;
pub mod diagram;
pub mod diveps;
pub mod io;
pub mod mult;
pub mod reorder;
pub mod signature;
pub mod stack;
pub mod update;

pub use diagram::{tmplt, Arithmetic, Block, Buffer, DiagBlockId, Diagram, Scalar, StorageClass};
pub use signature::Signature;

/// Enumerates every compound index (an "odometer": the last dimension
/// advances fastest, matching the engine's row-major buffer layout) of a
/// shape, as owned `Vec<usize>`s. Rank 0 yields a single empty vector.
pub fn odometer(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let total: usize = shape.iter().product();
    (0..total).map(move |mut lin| {
        let mut local = vec![0usize; shape.len()];
        for k in (0..shape.len()).rev() {
            local[k] = lin % shape[k];
            lin /= shape[k];
        }
        local
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odometer_enumerates_row_major() {
        let all: Vec<_> = odometer(&[2, 3]).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn odometer_rank_zero() {
        let all: Vec<_> = odometer(&[]).collect();
        assert_eq!(all, vec![Vec::<usize>::new()]);
    }
}
