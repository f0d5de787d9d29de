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

//! Diagram signatures: the `(quasiparticle, valence, order)` triple that
//! names a tensor's dimensions, and the validation `tmplt` runs before
//! materialising anything.

use crate::error::{EngineError, EngineResult};
use crate::spinor::QuasiParticle;

/// A validated signature for a rank-`r` diagram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub qparts: Vec<QuasiParticle>,
    pub valence: Vec<bool>,
    /// `order[k]` is the position, in the diagram's "natural" dimension
    /// order, that storage dimension `k` corresponds to. A diagram in
    /// natural order has `order == (0..r)`.
    pub order: Vec<usize>,
}

impl Signature {
    pub fn rank(&self) -> usize {
        self.qparts.len()
    }

    /// Parses the `"hhpp"`-style quasiparticle string, the parallel
    /// valence bit string (`'1'`/`'0'` or any two distinct chars work, we
    /// require `'1'`/`'0'`), and an `order` permutation of `0..r`.
    ///
    /// `call` names the public operation this validation is performed on
    /// hand, for fatal-error messages (§4.3.8: structural errors are
    /// fatal and must identify the offending call).
    pub fn parse(call: &str, qparts: &str, valence: &str, order: &[usize]) -> EngineResult<Self> {
        let r = qparts.len();
        if r == 0 || r % 2 != 0 {
            return Err(EngineError::configuration(
                call,
                format!("quasiparticle signature `{qparts}` must have positive even length, got {r}"),
            ));
        }
        if valence.len() != r {
            return Err(EngineError::configuration(
                call,
                format!(
                    "valence signature `{valence}` has length {}, expected {r} to match `{qparts}`",
                    valence.len()
                ),
            ));
        }
        if order.len() != r {
            return Err(EngineError::configuration(
                call,
                format!("order signature has length {}, expected {r}", order.len()),
            ));
        }

        let qparts: Vec<QuasiParticle> = qparts
            .chars()
            .map(|c| match c {
                'h' => Ok(QuasiParticle::Hole),
                'p' => Ok(QuasiParticle::Particle),
                other => Err(EngineError::configuration(
                    call,
                    format!("illegal quasiparticle character `{other}`, expected 'h' or 'p'"),
                )),
            })
            .collect::<EngineResult<_>>()?;

        let valence: Vec<bool> = valence
            .chars()
            .map(|c| match c {
                '1' => Ok(true),
                '0' => Ok(false),
                other => Err(EngineError::configuration(
                    call,
                    format!("illegal valence character `{other}`, expected '0' or '1'"),
                )),
            })
            .collect::<EngineResult<_>>()?;

        let mut seen = vec![false; r];
        for &p in order {
            if p >= r || std::mem::replace(&mut seen[p], true) {
                return Err(EngineError::configuration(
                    call,
                    format!("order signature {order:?} is not a permutation of 0..{r}"),
                ));
            }
        }

        Ok(Signature {
            qparts,
            valence,
            order: order.to_vec(),
        })
    }

    /// The sign of the permutation taking natural order to storage order:
    /// `+1` for an even permutation, `-1` for odd. Used by `reorder` to
    /// restore antisymmetric signs and by the non-unique-block invariant.
    pub fn parity_sign(perm: &[usize]) -> f64 {
        let n = perm.len();
        let mut visited = vec![false; n];
        let mut sign = 1.0;
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut len = 0;
            let mut j = start;
            while !visited[j] {
                visited[j] = true;
                j = perm[j];
                len += 1;
            }
            if len % 2 == 0 {
                sign = -sign;
            }
        }
        sign
    }

    /// Composes `self` with a further rank-`r` permutation `pi`, used when
    /// `reorder` produces a new diagram's signature from an existing one.
    pub fn permuted(&self, pi: &[usize]) -> EngineResult<Signature> {
        let r = self.rank();
        if pi.len() != r {
            return Err(EngineError::configuration(
                "Signature::permuted",
                format!("permutation has length {}, expected {r}", pi.len()),
            ));
        }
        Ok(Signature {
            qparts: pi.iter().map(|&k| self.qparts[k]).collect(),
            valence: pi.iter().map(|&k| self.valence[k]).collect(),
            order: pi.iter().map(|&k| self.order[k]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_signature() {
        let sig = Signature::parse("test", "hhpp", "1100", &[0, 1, 2, 3]).unwrap();
        assert_eq!(sig.rank(), 4);
        assert_eq!(sig.qparts[0], QuasiParticle::Hole);
        assert_eq!(sig.qparts[2], QuasiParticle::Particle);
        assert_eq!(sig.valence, vec![true, true, false, false]);
    }

    #[test]
    fn rejects_odd_length() {
        assert!(Signature::parse("test", "hhp", "111", &[0, 1, 2]).is_err());
    }

    #[test]
    fn rejects_bad_permutation() {
        assert!(Signature::parse("test", "hhpp", "0000", &[0, 1, 1, 3]).is_err());
        assert!(Signature::parse("test", "hhpp", "0000", &[0, 1, 2, 4]).is_err());
    }

    #[test]
    fn parity_of_transposition_is_odd() {
        assert_eq!(Signature::parity_sign(&[1, 0, 2, 3]), -1.0);
        assert_eq!(Signature::parity_sign(&[0, 1, 2, 3]), 1.0);
        assert_eq!(Signature::parity_sign(&[1, 0, 3, 2]), 1.0);
    }
}
