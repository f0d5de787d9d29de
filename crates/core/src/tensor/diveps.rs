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

//! `diveps`: division of a rank-`2m` `hhh...ppp...` diagram by its
//! Moller-Plesset denominators, with the dynamic shift schemes of
//! §4.3.6 and (optionally) the per-spinor IH-IMMS shift of §4.6.

use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{EngineError, EngineResult};
use crate::spinor::SpinorRegistry;
use crate::tensor::diagram::{Arithmetic, Buffer, Diagram};
use crate::tensor::odometer;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShiftType {
    None,
    Real,
    RealImag,
    Imag,
    Taylor,
}

impl ShiftType {
    /// Only `Imag` produces a genuinely complex addend; every other
    /// formula is real-valued and so usable against a real-arithmetic
    /// diagram.
    fn is_complex_valued(self) -> bool {
        matches!(self, ShiftType::Imag)
    }
}

/// Parameters shared by every shift formula in §4.3.6. `level_values` is
/// indexed by excitation level (`rank / 2`, 1-based): the real shift
/// constant for `Real`, the saturation scale `sigma` for the others.
#[derive(Clone, Debug)]
pub struct ShiftConfig {
    pub shift_type: ShiftType,
    pub power: u32,
    pub level_values: Vec<f64>,
}

impl ShiftConfig {
    fn sigma(&self, rank: usize) -> f64 {
        let level = rank / 2;
        self.level_values.get(level.saturating_sub(1)).copied().unwrap_or(0.0)
    }

    /// The dynamic shift `S` (possibly complex) added to a real
    /// denominator `denom`, per §4.3.6's four formulas. `Taylor` uses a
    /// truncated polynomial approximation of `RealImag`'s saturating
    /// curve, valid near `denom == 0` where the full expression is the
    /// worst conditioned.
    fn shift(&self, denom: f64, rank: usize) -> Complex64 {
        let sigma = self.sigma(rank);
        match self.shift_type {
            ShiftType::None => Complex64::new(0.0, 0.0),
            ShiftType::Real => Complex64::new(sigma, 0.0),
            ShiftType::RealImag => {
                if sigma == 0.0 {
                    return Complex64::new(0.0, 0.0);
                }
                let ratio = denom / (denom * denom + sigma * sigma).sqrt();
                Complex64::new(sigma * ratio.powi(2 * self.power as i32), 0.0)
            }
            ShiftType::Imag => {
                if sigma == 0.0 {
                    return Complex64::new(0.0, 0.0);
                }
                let ratio = denom / (denom * denom + sigma * sigma).sqrt();
                Complex64::new(0.0, sigma * ratio.powi(2 * self.power as i32))
            }
            ShiftType::Taylor => {
                if sigma == 0.0 {
                    return Complex64::new(0.0, 0.0);
                }
                // Second-order Taylor truncation of (x/sqrt(x^2+1))^(2n)
                // in x = denom/sigma around x == 0.
                let x = denom / sigma;
                let base = (x * x).powi(self.power.max(1) as i32);
                Complex64::new(sigma * base, 0.0)
            }
        }
    }
}

/// Supplies a per-spinor (IH-IMMS) shift contribution on top of
/// `ShiftConfig`'s excitation-level formula; the no-op implementation
/// (returning 0 for every spinor) recovers plain MP denominators with
/// only the global shift applied. See `crate::ih` for the IH-IMMS
/// implementation that derives one of these from a model determinant.
pub trait SpinorShift {
    fn shift_for(&self, spinor: usize) -> f64;
}

pub struct NoShift;
impl SpinorShift for NoShift {
    fn shift_for(&self, _spinor: usize) -> f64 {
        0.0
    }
}

/// Divides every element of `d` (rank `2m`, first `m` dims hole-like,
/// last `m` particle-like per §4.3.6) by
/// `sum eps(hole) - sum eps(particle) + S`, where `S` is `cfg`'s dynamic
/// shift plus the sum of `extra.shift_for` over every index (the "box"
/// IH-IMMS formula; callers wanting the "line" formula pass an `extra`
/// that only returns nonzero shifts for valence spinors).
pub fn diveps(
    registry: &SpinorRegistry,
    d: &mut Diagram,
    cfg: &ShiftConfig,
    extra: &dyn SpinorShift,
) -> EngineResult<()> {
    let rank = d.rank();
    if rank % 2 != 0 {
        return Err(EngineError::configuration("diveps", format!("diagram rank {rank} is not even")));
    }
    if d.arithmetic == Arithmetic::Real && cfg.shift_type.is_complex_valued() {
        return Err(EngineError::configuration(
            "diveps",
            "an imaginary-shift denominator requires a complex-arithmetic diagram",
        ));
    }
    let m = rank / 2;

    let block_ids: Vec<_> = (0..d.num_blocks()).filter(|&id| d.block(id).has_data()).collect();
    for id in block_ids {
        let shape = d.block(id).shape.clone();
        let spinor_blocks = d.block(id).spinor_blocks.clone();
        let globals: Vec<Vec<usize>> = odometer(&shape)
            .map(|local| {
                (0..rank)
                    .map(|k| registry.block(spinor_blocks[k]).indices[local[k]])
                    .collect()
            })
            .collect();

        let block = d.block_mut(id);
        let buffer = block.buffer_mut().expect("filtered to blocks with data above");
        match buffer {
            Buffer::Real(v) => {
                v.par_iter_mut().zip(globals.par_iter()).for_each(|(x, global)| {
                    let denom = mp_denominator(registry, global, m);
                    let extra_shift: f64 = global.iter().map(|&s| extra.shift_for(s)).sum();
                    let s = cfg.shift(denom, rank);
                    *x /= denom + extra_shift + s.re;
                });
            }
            Buffer::Complex(v) => {
                v.par_iter_mut().zip(globals.par_iter()).for_each(|(x, global)| {
                    let denom = mp_denominator(registry, global, m);
                    let extra_shift: f64 = global.iter().map(|&s| extra.shift_for(s)).sum();
                    let s = cfg.shift(denom, rank);
                    *x /= Complex64::new(denom + extra_shift, 0.0) + s;
                });
            }
        }
    }
    Ok(())
}

fn mp_denominator(registry: &SpinorRegistry, global: &[usize], m: usize) -> f64 {
    let hole_sum: f64 = global[..m].iter().map(|&i| registry.energy(i)).sum();
    let particle_sum: f64 = global[m..].iter().map(|&i| registry.energy(i)).sum();
    hole_sum - particle_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::SymmetryTable;
    use crate::tensor::access::{get, set};
    use crate::tensor::diagram::{tmplt, Scalar};

    fn registry() -> SpinorRegistry {
        SpinorRegistry::new(
            vec![0, 0, 0, 0],
            vec![-1.0, -0.8, 0.3, 0.4],
            vec![true, true, false, false],
            vec![true, true, true, true],
            vec![true, true, true, true],
            8,
        )
        .unwrap()
    }

    fn none_cfg() -> ShiftConfig {
        ShiftConfig {
            shift_type: ShiftType::None,
            power: 0,
            level_values: vec![],
        }
    }

    #[test]
    fn none_shift_divides_by_plain_mp_denominator() {
        let reg = registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "t2", "hhpp", "0000", &[0, 1, 2, 3], true, Arithmetic::Real, 0).unwrap();
        set(&reg, &mut d, &[0, 1, 2, 3], Scalar::Real(1.0)).unwrap();
        diveps(&reg, &mut d, &none_cfg(), &NoShift).unwrap();
        let expected = 1.0 / (reg.energy(0) + reg.energy(1) - reg.energy(2) - reg.energy(3));
        match get(&reg, &d, &[0, 1, 2, 3]).unwrap() {
            Scalar::Real(x) => assert!((x - expected).abs() < 1e-12),
            _ => panic!("expected real scalar"),
        }
    }

    #[test]
    fn imag_shift_rejected_for_real_arithmetic() {
        let reg = registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "t2", "hhpp", "0000", &[0, 1, 2, 3], true, Arithmetic::Real, 0).unwrap();
        let cfg = ShiftConfig {
            shift_type: ShiftType::Imag,
            power: 0,
            level_values: vec![0.1],
        };
        assert!(diveps(&reg, &mut d, &cfg, &NoShift).is_err());
    }

    #[test]
    fn extra_spinor_shift_is_additive() {
        let reg = registry();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "t2", "hhpp", "0000", &[0, 1, 2, 3], true, Arithmetic::Real, 0).unwrap();
        set(&reg, &mut d, &[0, 1, 2, 3], Scalar::Real(1.0)).unwrap();
        struct Flat(f64);
        impl SpinorShift for Flat {
            fn shift_for(&self, _s: usize) -> f64 {
                self.0
            }
        }
        diveps(&reg, &mut d, &none_cfg(), &Flat(0.5)).unwrap();
        let denom = reg.energy(0) + reg.energy(1) - reg.energy(2) - reg.energy(3);
        let expected = 1.0 / (denom + 4.0 * 0.5);
        match get(&reg, &d, &[0, 1, 2, 3]).unwrap() {
            Scalar::Real(x) => assert!((x - expected).abs() < 1e-12),
            _ => panic!("expected real scalar"),
        }
    }
}
