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

//! The spinor registry: the ordered, immutable list of one-particle
//! functions the whole engine indexes into, and the tiling of that list
//! into fixed-irrep spinor blocks.

use crate::error::{EngineError, EngineResult};
use crate::symmetry::IrrepId;

/// A 0-based index into the global spinor list.
pub type SpinorIndex = usize;
/// A 0-based index into the list of spinor blocks (tiles).
pub type BlockId = usize;

/// One one-particle function, as handed off by the upstream mean-field
/// program: an irrep, an orbital energy, and the flags the rest of the
/// engine consults to classify it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spinor {
    pub irrep: IrrepId,
    pub energy: f64,
    /// Occupied in the closed-shell reference (a "hole"); unoccupied
    /// spinors are "particles".
    pub occupied: bool,
    pub active: bool,
    /// Whether this spinor participates in the triples excitation space;
    /// `false` for spinors a caller restricted to a lower truncation.
    pub triples_active: bool,
}

/// A contiguous tile of spinors sharing one irrep, one hole/particle
/// class, and one active/inactive class, of length at most the
/// configured `tile_size`. Homogeneity in all three is what lets the
/// tensor engine treat "does this spinor block satisfy dimension `k`'s
/// quasiparticle/valence signature" as an all-or-nothing test instead of
/// a per-member one.
#[derive(Clone, Debug)]
pub struct SpinorBlock {
    pub irrep: IrrepId,
    pub occupied: bool,
    pub active: bool,
    pub indices: Vec<SpinorIndex>,
}

impl SpinorBlock {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// The quasiparticle class a tensor dimension may be restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuasiParticle {
    Hole,
    Particle,
}

/// The full, immutable-after-setup roster of one-particle functions plus
/// the derived tiling used by the tensor engine.
#[derive(Clone, Debug)]
pub struct SpinorRegistry {
    spinors: Vec<Spinor>,
    /// Index of the block each spinor belongs to, parallel to `spinors`.
    block_of: Vec<BlockId>,
    /// Offset of each spinor within its block, parallel to `spinors`.
    offset_in_block: Vec<usize>,
    blocks: Vec<SpinorBlock>,
}

impl SpinorRegistry {
    /// Builds the registry from parallel arrays and immediately tiles it
    /// with the given `tile_size`. Spinors are tiled in registry order, so
    /// callers that want irrep-contiguous tiles must sort the input first
    /// (the upstream integral sorter does this).
    pub fn new(
        irreps: Vec<IrrepId>,
        energies: Vec<f64>,
        occupied: Vec<bool>,
        active: Vec<bool>,
        triples_active: Vec<bool>,
        tile_size: usize,
    ) -> EngineResult<Self> {
        let n = irreps.len();
        if energies.len() != n || occupied.len() != n || active.len() != n || triples_active.len() != n {
            return Err(EngineError::configuration(
                "SpinorRegistry::new",
                "parallel spinor arrays have mismatched lengths",
            ));
        }
        if tile_size == 0 {
            return Err(EngineError::configuration(
                "SpinorRegistry::new",
                "tile_size must be positive",
            ));
        }
        let spinors: Vec<Spinor> = (0..n)
            .map(|i| Spinor {
                irrep: irreps[i],
                energy: energies[i],
                occupied: occupied[i],
                active: active[i],
                triples_active: triples_active[i],
            })
            .collect();

        let mut registry = SpinorRegistry {
            spinors,
            block_of: Vec::new(),
            offset_in_block: Vec::new(),
            blocks: Vec::new(),
        };
        registry.tile(tile_size);
        Ok(registry)
    }

    /// Partitions spinors into blocks of size <= `tile_size`: a new block
    /// starts whenever the irrep, the hole/particle class, or the
    /// active/inactive class changes, or the running block would
    /// overflow `tile_size`. Rebuilds the global index map in place.
    pub fn tile(&mut self, tile_size: usize) {
        let mut blocks: Vec<SpinorBlock> = Vec::new();
        let mut block_of = vec![0usize; self.spinors.len()];
        let mut offset_in_block = vec![0usize; self.spinors.len()];

        for (i, s) in self.spinors.iter().enumerate() {
            let needs_new_block = match blocks.last() {
                Some(b) => {
                    b.irrep != s.irrep || b.occupied != s.occupied || b.active != s.active || b.len() >= tile_size
                }
                None => true,
            };
            if needs_new_block {
                blocks.push(SpinorBlock {
                    irrep: s.irrep,
                    occupied: s.occupied,
                    active: s.active,
                    indices: Vec::with_capacity(tile_size),
                });
            }
            let block = blocks.last_mut().expect("just pushed if needed");
            offset_in_block[i] = block.len();
            block_of[i] = blocks.len() - 1;
            block.indices.push(i);
        }

        self.blocks = blocks;
        self.block_of = block_of;
        self.offset_in_block = offset_in_block;
    }

    /// Block ids consistent with a tensor dimension's quasiparticle class
    /// and valence restriction, used by `tmplt` to enumerate candidate
    /// spinor-block tuples without visiting symmetry-forbidden ones.
    pub fn compatible_blocks(&self, qpart: QuasiParticle, valence: bool) -> Vec<BlockId> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                let kind_ok = match qpart {
                    QuasiParticle::Hole => b.occupied,
                    QuasiParticle::Particle => !b.occupied,
                };
                kind_ok && (!valence || b.active)
            })
            .map(|(id, _)| id)
            .collect()
    }

    pub fn num_spinors(&self) -> usize {
        self.spinors.len()
    }

    pub fn spinor(&self, i: SpinorIndex) -> Spinor {
        self.spinors[i]
    }

    pub fn energy(&self, i: SpinorIndex) -> f64 {
        self.spinors[i].energy
    }

    pub fn irrep(&self, i: SpinorIndex) -> IrrepId {
        self.spinors[i].irrep
    }

    pub fn is_hole(&self, i: SpinorIndex) -> bool {
        self.spinors[i].occupied
    }

    pub fn is_particle(&self, i: SpinorIndex) -> bool {
        !self.spinors[i].occupied
    }

    pub fn is_active(&self, i: SpinorIndex) -> bool {
        self.spinors[i].active
    }

    pub fn is_act_hole(&self, i: SpinorIndex) -> bool {
        self.is_hole(i) && self.is_active(i)
    }

    pub fn is_act_particle(&self, i: SpinorIndex) -> bool {
        self.is_particle(i) && self.is_active(i)
    }

    pub fn num_electrons(&self) -> usize {
        self.spinors.iter().filter(|s| s.occupied).count()
    }

    /// The reference determinant's irrep: the totally symmetric irrep by
    /// construction of the closed-shell vacuum, taken as a parameter so
    /// this module stays independent of `SymmetryTable`.
    pub fn vacuum_irrep(&self, totally_symmetric: IrrepId) -> IrrepId {
        totally_symmetric
    }

    pub fn block_of(&self, i: SpinorIndex) -> BlockId {
        self.block_of[i]
    }

    pub fn offset_in_block(&self, i: SpinorIndex) -> usize {
        self.offset_in_block[i]
    }

    pub fn block(&self, id: BlockId) -> &SpinorBlock {
        &self.blocks[id]
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[SpinorBlock] {
        &self.blocks
    }

    /// The active holes (if `sector_h > 0`) or active particles (if
    /// `sector_p > 0`) relevant to a Fock-space sector `(sector_h,
    /// sector_p)`, as a sorted index list. A sector with both components
    /// zero (the vacuum) returns an empty list.
    pub fn active_space(&self, sector_h: usize, sector_p: usize) -> (usize, Vec<SpinorIndex>) {
        let mut indices = Vec::new();
        if sector_h > 0 {
            indices.extend((0..self.spinors.len()).filter(|&i| self.is_act_hole(i)));
        }
        if sector_p > 0 {
            indices.extend((0..self.spinors.len()).filter(|&i| self.is_act_particle(i)));
        }
        indices.sort_unstable();
        (indices.len(), indices)
    }

    /// Quick pruning test: true iff at least one of the block ids, when
    /// interpreted per the `qparts`/`valence` signature, refers to an
    /// irrep-homogeneous tile that contains no spinor consistent with
    /// that signature entry (an empty hole/particle/active sub-block).
    pub fn symblock_zero(&self, qparts: &[QuasiParticle], valence: &[bool], block_ids: &[BlockId]) -> bool {
        debug_assert_eq!(qparts.len(), valence.len());
        debug_assert_eq!(qparts.len(), block_ids.len());
        for (k, &id) in block_ids.iter().enumerate() {
            let block = &self.blocks[id];
            let any_match = block.indices.iter().any(|&i| {
                let kind_ok = match qparts[k] {
                    QuasiParticle::Hole => self.is_hole(i),
                    QuasiParticle::Particle => self.is_particle(i),
                };
                let valence_ok = !valence[k] || self.is_active(i);
                kind_ok && valence_ok
            });
            if !any_match {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_registry() -> SpinorRegistry {
        // 2 holes in irrep 0, 3 particles split across irreps 0 and 1.
        SpinorRegistry::new(
            vec![0, 0, 0, 1, 1],
            vec![-1.0, -0.9, 0.2, 0.3, 0.4],
            vec![true, true, false, false, false],
            vec![true, true, true, true, true],
            vec![true, true, true, true, true],
            2,
        )
        .unwrap()
    }

    #[test]
    fn tiling_splits_on_irrep_and_size() {
        let reg = toy_registry();
        // holes {0,1} -> one block of size 2; particles {2} (irrep 0) own block;
        // particles {3,4} (irrep 1) own block.
        assert_eq!(reg.num_blocks(), 3);
        assert_eq!(reg.block(0).indices, vec![0, 1]);
        assert_eq!(reg.block(1).indices, vec![2]);
        assert_eq!(reg.block(2).indices, vec![3, 4]);
    }

    #[test]
    fn active_space_selects_by_sector() {
        let reg = toy_registry();
        let (nh, holes) = reg.active_space(1, 0);
        assert_eq!(nh, 2);
        assert_eq!(holes, vec![0, 1]);
        let (np, parts) = reg.active_space(0, 1);
        assert_eq!(np, 3);
        assert_eq!(parts, vec![2, 3, 4]);
    }

    #[test]
    fn symblock_zero_detects_empty_subblock() {
        let reg = toy_registry();
        // Block 1 (particles in irrep 0) is fine as an all-particle block.
        assert!(!reg.symblock_zero(&[QuasiParticle::Particle], &[false], &[1]));
        // Block 0 (holes) has no particle-classified spinor.
        assert!(reg.symblock_zero(&[QuasiParticle::Particle], &[false], &[0]));
    }
}
