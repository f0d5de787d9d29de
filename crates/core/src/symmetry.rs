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

//! Abelian point-group (or double-group) symmetry: irrep identities, the
//! direct-product table, and the totally-symmetric-containment predicate
//! that prunes every tensor block enumeration in the engine.

use crate::error::{EngineError, EngineResult};

/// An irrep id is a small dense index into the group's table, 0-based.
pub type IrrepId = u16;

/// The direct-product table of an abelian group (or an abelian double
/// group, which is the case the relativistic engine actually runs under).
///
/// Non-abelian point groups would need a third "multiplicity" index on
/// `mul`; the engine does not support them and rejects construction with
/// more than one product term per pair.
#[derive(Clone, Debug)]
pub struct SymmetryTable {
    names: Vec<String>,
    /// `product[a * n + b] = a (x) b`, flattened row-major.
    product: Vec<IrrepId>,
    totsym: IrrepId,
}

impl SymmetryTable {
    /// Builds a table from irrep names and a full multiplication table.
    /// `product` must be `names.len() * names.len()` long, row-major, and
    /// `totsym` must be the index of the identity irrep (its row/column is
    /// the identity permutation of `0..n`).
    pub fn new(names: Vec<String>, product: Vec<IrrepId>, totsym: IrrepId) -> EngineResult<Self> {
        let n = names.len();
        if n == 0 {
            return Err(EngineError::configuration(
                "SymmetryTable::new",
                "group must have at least one irrep",
            ));
        }
        if product.len() != n * n {
            return Err(EngineError::configuration(
                "SymmetryTable::new",
                format!(
                    "product table has {} entries, expected {}x{}={}",
                    product.len(),
                    n,
                    n,
                    n * n
                ),
            ));
        }
        if usize::from(totsym) >= n {
            return Err(EngineError::configuration(
                "SymmetryTable::new",
                format!("totally symmetric irrep index {totsym} out of range"),
            ));
        }
        let table = SymmetryTable {
            names,
            product,
            totsym,
        };
        table.validate_group_axioms()?;
        Ok(table)
    }

    /// The elementary-abelian group table `Z2^k` (irrep-index XOR), the
    /// group every abelian point/double group the relativistic engine
    /// serves reduces to (C1, Ci, C2, C2h, D2, D2h, and their double-group
    /// extensions are all direct products of `Z2` factors, never a larger
    /// cyclic group). `names.len()` must be a power of two, `2^k`.
    pub fn abelian_cyclic(names: Vec<String>) -> EngineResult<Self> {
        let n = names.len();
        if n == 0 || !n.is_power_of_two() {
            return Err(EngineError::configuration(
                "SymmetryTable::abelian_cyclic",
                format!("elementary-abelian group size must be a power of two, got {n}"),
            ));
        }
        let mut product = vec![0u16; n * n];
        for a in 0..n {
            for b in 0..n {
                product[a * n + b] = (a ^ b) as u16;
            }
        }
        Self::new(names, product, 0)
    }

    fn validate_group_axioms(&self) -> EngineResult<()> {
        let n = self.names.len();
        for a in 0..n {
            // every irrep must have a unique inverse under this product
            let mut has_inverse = false;
            for b in 0..n {
                if self.product[a * n + b] == self.totsym {
                    has_inverse = true;
                }
                // commutativity, since the engine only ever serves abelian groups
                if self.product[a * n + b] != self.product[b * n + a] {
                    return Err(EngineError::configuration(
                        "SymmetryTable::new",
                        format!("product table is not symmetric at ({a}, {b}); non-abelian groups are a hard error"),
                    ));
                }
            }
            if !has_inverse {
                return Err(EngineError::configuration(
                    "SymmetryTable::new",
                    format!("irrep {a} has no inverse in the product table"),
                ));
            }
        }
        Ok(())
    }

    pub fn num_irreps(&self) -> usize {
        self.names.len()
    }

    pub fn totally_symmetric_irrep(&self) -> IrrepId {
        self.totsym
    }

    pub fn irrep_name(&self, irrep: IrrepId) -> EngineResult<&str> {
        self.names
            .get(usize::from(irrep))
            .map(String::as_str)
            .ok_or_else(|| {
                EngineError::configuration("SymmetryTable::irrep_name", format!("irrep id {irrep} out of range"))
            })
    }

    pub fn irrep_index(&self, name: &str) -> EngineResult<IrrepId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| i as IrrepId)
            .ok_or_else(|| EngineError::configuration("SymmetryTable::irrep_index", format!("unknown irrep `{name}`")))
    }

    pub fn mul(&self, a: IrrepId, b: IrrepId) -> IrrepId {
        let n = self.names.len();
        self.product[usize::from(a) * n + usize::from(b)]
    }

    /// The irrep `b` such that `mul(a, b) == totally_symmetric_irrep()`.
    pub fn inverse(&self, a: IrrepId) -> IrrepId {
        let n = self.names.len() as IrrepId;
        (0..n).find(|&b| self.mul(a, b) == self.totsym).expect(
            "validate_group_axioms guarantees every irrep has an inverse",
        )
    }

    /// True iff the direct product of `irreps` contains the totally
    /// symmetric irrep. Dispatched by rank so the common ranks (2, 4, 6)
    /// avoid the generic fold's loop overhead.
    pub fn contains_totsym(&self, irreps: &[IrrepId]) -> bool {
        match irreps {
            [] => true,
            [a] => *a == self.totsym,
            [a, b] => self.mul(*a, *b) == self.totsym,
            [a, b, c, d] => self.mul(self.mul(*a, *b), self.mul(*c, *d)) == self.totsym,
            [a, b, c, d, e, f] => {
                let lhs = self.mul(self.mul(*a, *b), self.mul(*c, *d));
                self.mul(lhs, self.mul(*e, *f)) == self.totsym
            }
            _ => {
                let mut acc = self.totsym;
                for &g in irreps {
                    acc = self.mul(acc, g);
                }
                acc == self.totsym
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c2v() -> SymmetryTable {
        // A1, A2, B1, B2 with the standard Klein four-group (Z2 x Z2)
        // product table: A2.A2 = A1, B1.B1 = A1, B2.B2 = A1, A2.B1 = B2, etc.
        SymmetryTable::abelian_cyclic(vec!["A1".into(), "A2".into(), "B1".into(), "B2".into()])
            .expect("valid elementary-abelian table")
    }

    #[test]
    fn totally_symmetric_is_identity() {
        let t = c2v();
        for g in 0..t.num_irreps() as IrrepId {
            assert_eq!(t.mul(g, t.totally_symmetric_irrep()), g);
        }
    }

    #[test]
    fn inverse_round_trips() {
        let t = c2v();
        for g in 0..t.num_irreps() as IrrepId {
            let inv = t.inverse(g);
            assert_eq!(t.mul(g, inv), t.totally_symmetric_irrep());
        }
    }

    #[test]
    fn contains_totsym_rank_two_and_four() {
        let t = c2v();
        assert!(t.contains_totsym(&[0, 0]));
        assert!(!t.contains_totsym(&[0, 1]));
        // A2.A2 = A1, B1.B1 = A1, and A1.A1 = A1: the product of all four
        // contains the totally symmetric irrep under Z2 x Z2, not Z4.
        assert!(t.contains_totsym(&[1, 1, 2, 2]));
    }

    #[test]
    fn every_irrep_is_its_own_inverse_under_elementary_abelian_product() {
        // The defining difference from a cyclic Z4 table: under Z2 x Z2
        // every non-identity irrep has order 2, so g.g is always totsym.
        let t = c2v();
        for g in 0..t.num_irreps() as IrrepId {
            assert_eq!(t.mul(g, g), t.totally_symmetric_irrep());
        }
    }

    #[test]
    fn abelian_cyclic_rejects_non_power_of_two_size() {
        let err = SymmetryTable::abelian_cyclic(vec!["A".into(), "B".into(), "C".into()]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_non_abelian_table() {
        // A deliberately asymmetric "product" table.
        let err = SymmetryTable::new(vec!["E".into(), "T1".into()], vec![0, 1, 0, 0], 0);
        assert!(err.is_err());
    }
}
