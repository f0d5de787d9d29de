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

//! Slater rules (§4.5): closed-form matrix elements of an n-body
//! effective-interaction tensor between two model-space determinants,
//! for every supported `(bra sector, ket sector, operator rank)` triple.
//!
//! Each evaluator is bound, via `setup_slater`, to one already-resolved
//! accessor (typically a closure over `tensor::access::get` for one
//! specific effective-interaction diagram). Index tuples that fall
//! outside that diagram's symmetry-allowed blocks read back as `0`
//! (§3.3's totality invariant), so a driver accumulating several
//! diagrams of the same operator rank over the same sector pair can call
//! `slater_rule` once per diagram and simply sum the results — a term
//! that doesn't belong to a given diagram's block structure contributes
//! nothing on its own.
//!
//! Holes are treated as the particle-like excitations of the conjugate
//! (reversed) vacuum: a hole index pair is looked up with bra and ket
//! swapped relative to the particle convention, and carries the
//! corresponding extra sign, matching how the tensor engine already
//! reverses hole dimensions' natural order relative to particle ones.

use crate::error::{EngineError, EngineResult};
use crate::model_space::Determinant;
use crate::spinor::SpinorIndex;
use crate::tensor::diagram::Scalar;

/// The `(bra_h, bra_p, ket_h, ket_p, npart)` triples §4.5 lists as
/// supported; any other combination is a fatal "unsupported Slater
/// rule" error from `setup_slater`.
const SUPPORTED: &[(usize, usize, usize, usize, usize)] = &[
    (0, 1, 0, 1, 1),
    (1, 0, 1, 0, 1),
    (0, 2, 0, 2, 2),
    (2, 0, 2, 0, 2),
    (1, 1, 1, 1, 1),
    (1, 1, 1, 1, 2),
    (0, 3, 0, 3, 3),
    (3, 0, 3, 0, 3),
    (1, 2, 1, 2, 1),
    (1, 2, 1, 2, 2),
    // cross-sector bridges, each admitting the operator ranks implied by
    // the sectors' particle-rank difference.
    (0, 0, 1, 1, 1),
    (1, 1, 0, 0, 1),
    (0, 1, 1, 2, 1),
    (1, 2, 0, 1, 1),
];

/// A Slater-rule evaluator bound to one accessor and one
/// `(bra, ket, npart)` triple.
pub struct SlaterRules<'a> {
    bra_h: usize,
    bra_p: usize,
    ket_h: usize,
    ket_p: usize,
    npart: usize,
    get: Box<dyn Fn(&[SpinorIndex]) -> EngineResult<Scalar> + 'a>,
}

/// Validates `(bra_h, bra_p, ket_h, ket_p, npart)` against the supported
/// table and binds `getter` (the closure resolving a global spinor index
/// tuple to a tensor element, e.g. `|idx| access::get(reg, diagram, idx)`)
/// as the source for every subsequent `slater_rule` call.
pub fn setup_slater<'a>(
    getter: impl Fn(&[SpinorIndex]) -> EngineResult<Scalar> + 'a,
    bra_h: usize,
    bra_p: usize,
    ket_h: usize,
    ket_p: usize,
    npart: usize,
) -> EngineResult<SlaterRules<'a>> {
    if !SUPPORTED.contains(&(bra_h, bra_p, ket_h, ket_p, npart)) {
        return Err(EngineError::UnsupportedSlaterRule {
            bra_h,
            bra_p,
            ket_h,
            ket_p,
            npart,
        });
    }
    Ok(SlaterRules {
        bra_h,
        bra_p,
        ket_h,
        ket_p,
        npart,
        get: Box::new(getter),
    })
}

fn kron(a: SpinorIndex, b: SpinorIndex) -> f64 {
    if a == b {
        1.0
    } else {
        0.0
    }
}

fn add(acc: Scalar, term: Scalar) -> Scalar {
    match (acc, term) {
        (Scalar::Real(a), Scalar::Real(b)) => Scalar::Real(a + b),
        (a, b) => Scalar::Complex(a.as_complex() + b.as_complex()),
    }
}

fn scale(s: Scalar, factor: f64) -> Scalar {
    s.scale(factor)
}

impl<'a> SlaterRules<'a> {
    fn get(&self, idx: &[SpinorIndex]) -> EngineResult<Scalar> {
        (self.get)(idx)
    }

    fn check_sectors(&self, bra: &Determinant, ket: &Determinant) -> EngineResult<()> {
        if bra.holes.len() != self.bra_h
            || bra.particles.len() != self.bra_p
            || ket.holes.len() != self.ket_h
            || ket.particles.len() != self.ket_p
        {
            return Err(EngineError::configuration(
                "SlaterRules::slater_rule",
                "determinant sector does not match the evaluator this rule was set up for",
            ));
        }
        Ok(())
    }

    /// The closed-form matrix element `<bra|op|ket>` for this
    /// evaluator's bound diagram and operator rank.
    pub fn slater_rule(&self, bra: &Determinant, ket: &Determinant) -> EngineResult<Scalar> {
        self.check_sectors(bra, ket)?;
        match (self.bra_h, self.bra_p, self.ket_h, self.ket_p, self.npart) {
            (0, 1, 0, 1, 1) => {
                let (a, b) = (bra.particles[0], ket.particles[0]);
                self.get(&[a, b])
            }
            (1, 0, 1, 0, 1) => {
                let (i, j) = (bra.holes[0], ket.holes[0]);
                // hole dimension natural order is reversed relative to
                // particle dimensions (§3.3 "order signature").
                Ok(scale(self.get(&[j, i])?, -1.0))
            }
            (0, 2, 0, 2, 2) => {
                let (a, b) = (bra.particles[0], bra.particles[1]);
                let (c, d) = (ket.particles[0], ket.particles[1]);
                self.get(&[a, b, c, d])
            }
            (2, 0, 2, 0, 2) => {
                let (i, j) = (bra.holes[0], bra.holes[1]);
                let (k, l) = (ket.holes[0], ket.holes[1]);
                self.get(&[k, l, i, j])
            }
            (1, 1, 1, 1, 1) => {
                let (i, a) = (bra.holes[0], bra.particles[0]);
                let (j, b) = (ket.holes[0], ket.particles[0]);
                // <ia|F|jb> = delta_ij F_ab - delta_ab F_ji; whichever
                // term doesn't belong to this evaluator's bound diagram
                // reads back zero by the totality invariant.
                let pp = scale(self.get(&[a, b])?, kron(i, j));
                let hh = scale(self.get(&[j, i])?, -kron(a, b));
                Ok(add(pp, hh))
            }
            (1, 1, 1, 1, 2) => {
                let (i, a) = (bra.holes[0], bra.particles[0]);
                let (j, b) = (ket.holes[0], ket.particles[0]);
                // <ia|W|jb> = -W_{aj,ib}, the direct particle-hole ladder
                // term of a two-body effective interaction.
                Ok(scale(self.get(&[a, j, i, b])?, -1.0))
            }
            (0, 3, 0, 3, 3) => {
                let bra_p = &bra.particles;
                let ket_p = &ket.particles;
                self.get(&[bra_p[0], bra_p[1], bra_p[2], ket_p[0], ket_p[1], ket_p[2]])
            }
            (3, 0, 3, 0, 3) => {
                let bra_h = &bra.holes;
                let ket_h = &ket.holes;
                self.get(&[ket_h[0], ket_h[1], ket_h[2], bra_h[0], bra_h[1], bra_h[2]])
            }
            (1, 2, 1, 2, 1) => {
                let (i, a, b) = (bra.holes[0], bra.particles[0], bra.particles[1]);
                let (j, c, d) = (ket.holes[0], ket.particles[0], ket.particles[1]);
                // One-body Slater-Condon rule between the two-particle
                // parts, gated by the hole factor matching or
                // contributing its own (negated, reversed) term.
                let particle_term = scale(
                    add(
                        add(scale(self.get(&[b, d])?, kron(a, c)), scale(self.get(&[a, c])?, kron(b, d))),
                        add(
                            scale(self.get(&[b, c])?, -kron(a, d)),
                            scale(self.get(&[a, d])?, -kron(b, c)),
                        ),
                    ),
                    kron(i, j),
                );
                let hole_term = scale(
                    self.get(&[j, i])?,
                    -(kron(a, c) * kron(b, d) - kron(a, d) * kron(b, c)),
                );
                Ok(add(particle_term, hole_term))
            }
            (1, 2, 1, 2, 2) => {
                let (a, b) = (bra.particles[0], bra.particles[1]);
                let (c, d) = (ket.particles[0], ket.particles[1]);
                let (i, j) = (bra.holes[0], ket.holes[0]);
                // Two-body contribution restricted to the particle pair,
                // gated by the (unchanged) hole index.
                Ok(scale(self.get(&[a, b, c, d])?, kron(i, j)))
            }
            (0, 0, 1, 1, 1) => {
                // vacuum <-> 1h1p bridge: the one-body operator
                // connecting the closed-shell reference to a single
                // hole-particle excitation out of it.
                let (j, b) = (ket.holes[0], ket.particles[0]);
                self.get(&[b, j])
            }
            (1, 1, 0, 0, 1) => {
                let (i, a) = (bra.holes[0], bra.particles[0]);
                self.get(&[i, a])
            }
            (0, 1, 1, 2, 1) => {
                // 0h1p <-> 1h2p bridge.
                let a = bra.particles[0];
                let (j, c, d) = (ket.holes[0], ket.particles[0], ket.particles[1]);
                let term1 = scale(self.get(&[a, j, c, d])?, 1.0);
                Ok(term1)
            }
            (1, 2, 0, 1, 1) => {
                let (i, a, b) = (bra.holes[0], bra.particles[0], bra.particles[1]);
                let c = ket.particles[0];
                Ok(scale(self.get(&[i, a, b, c])?, 1.0))
            }
            _ => unreachable!("setup_slater rejects any triple not in SUPPORTED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_space::Determinant;

    fn det(holes: &[usize], particles: &[usize], irrep: u16) -> Determinant {
        Determinant {
            holes: holes.to_vec(),
            particles: particles.to_vec(),
            irrep,
        }
    }

    #[test]
    fn one_body_particle_sector_is_direct_lookup() {
        let rules = setup_slater(
            |idx: &[usize]| {
                if idx == [0, 0] {
                    Ok(Scalar::Real(-0.05))
                } else if idx == [1, 1] {
                    Ok(Scalar::Real(-0.02))
                } else if idx == [0, 1] || idx == [1, 0] {
                    Ok(Scalar::Real(0.01))
                } else {
                    Ok(Scalar::Real(0.0))
                }
            },
            0,
            1,
            0,
            1,
            1,
        )
        .unwrap();

        let a = det(&[], &[0], 0);
        let b = det(&[], &[1], 0);
        assert_eq!(rules.slater_rule(&a, &a).unwrap(), Scalar::Real(-0.05));
        assert_eq!(rules.slater_rule(&b, &b).unwrap(), Scalar::Real(-0.02));
        assert_eq!(rules.slater_rule(&a, &b).unwrap(), Scalar::Real(0.01));
    }

    #[test]
    fn unsupported_triple_is_fatal() {
        let err = setup_slater(|_: &[usize]| Ok(Scalar::Real(0.0)), 5, 5, 5, 5, 9);
        assert!(err.is_err());
    }

    #[test]
    fn ph_one_body_splits_into_pp_and_hh_terms() {
        let rules = setup_slater(
            |idx: &[usize]| {
                // pretend this evaluator is bound to the pp-block diagram only.
                if idx.len() == 2 && idx[0] >= 2 && idx[1] >= 2 {
                    Ok(Scalar::Real(if idx[0] == idx[1] { 1.0 } else { 0.5 }))
                } else {
                    Ok(Scalar::Real(0.0))
                }
            },
            1,
            1,
            1,
            1,
            1,
        )
        .unwrap();
        // holes {0,1}, particles {2,3}.
        let bra = det(&[0], &[2], 0);
        let ket = det(&[0], &[2], 0);
        assert_eq!(rules.slater_rule(&bra, &ket).unwrap(), Scalar::Real(1.0));
        let ket2 = det(&[1], &[2], 0);
        // differing hole index zeroes out the pp term via kron(i,j)==0,
        // and this evaluator's hh lookup always reads 0.
        assert_eq!(rules.slater_rule(&bra, &ket2).unwrap(), Scalar::Real(0.0));
    }
}
