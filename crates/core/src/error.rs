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

//! Structured error type for the engine.
//!
//! Fatal conditions are returned as `EngineError`; non-fatal numerical
//! anomalies are emitted on the `tracing` observability channel instead
//! (see `crate::warn_numerical`) and never appear here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error in `{call}`: {detail}")]
    Configuration { call: String, detail: String },

    #[error("invariant violation in diagram `{diagram}`: {detail}")]
    Invariant { diagram: String, detail: String },

    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed diagram file `{}`: {detail}", path.display())]
    CorruptFile { path: PathBuf, detail: String },

    #[error("no diagram registered under name `{0}`")]
    UnknownDiagram(String),

    #[error("no Slater-rule evaluator registered for bra ({bra_h}h{bra_p}p) ket ({ket_h}h{ket_p}p) npart={npart}")]
    UnsupportedSlaterRule {
        bra_h: usize,
        bra_p: usize,
        ket_h: usize,
        ket_p: usize,
        npart: usize,
    },

    #[error("attempted to write through non-unique block of diagram `{diagram}`")]
    WriteThroughNonUnique { diagram: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn configuration(call: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::Configuration {
            call: call.into(),
            detail: detail.into(),
        }
    }

    pub fn invariant(diagram: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::Invariant {
            diagram: diagram.into(),
            detail: detail.into(),
        }
    }

    /// A "file not found" I/O error during diagram reuse is the one soft
    /// fall-through case: callers recompute instead of treating it as fatal.
    pub fn is_missing_file(&self) -> bool {
        matches!(self, EngineError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
