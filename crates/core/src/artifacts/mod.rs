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

//! Downstream artefact writers (§6.2): the model-vector file
//! ("MVCOEF"/"MVCOEF0011") and the formatted H_eff file. Both consume
//! `heff::HeffBlock`s and are the canonical hand-off to the
//! property/natural-spinor stage.

pub mod heff_file;
pub mod mvcoef;
