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

//! A relativistic Fock-space multireference coupled-cluster tensor
//! engine: the Direct-Product Decomposition sparse tensor algebra, the
//! Slater-determinant model-space and effective-Hamiltonian machinery,
//! and the intermediate-Hamiltonian and density-matrix modules built on
//! top of it. The input-file parsing, integral import, amplitude
//! iteration, and command-line driver are external collaborators; this
//! crate provides the primitives they call.

pub mod artifacts;
pub mod config;
pub mod density;
pub mod engine;
pub mod error;
pub mod heff;
pub mod ih;
pub mod linalg;
pub mod model_space;
pub mod slater_rules;
pub mod spinor;
pub mod symmetry;
pub mod tensor;

/// Emits a non-fatal numerical anomaly on the observability channel
/// (§2.11, §7): imaginary occupation numbers, Fock-diagonal drift, and
/// similar conditions the core repairs in place rather than aborting
/// on. Never returned as an error, since it never aborts anything.
pub fn warn_numerical(context: &str, value: f64, threshold: f64) {
    tracing::warn!(context, value, threshold, "numerical anomaly detected; continuing with recomputed value");
}
