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

//! The explicitly-constructed engine context (§9 "Global state to
//! reshape"): the original design keeps the spinor registry, symmetry
//! tables, and diagram stack as process-wide mutable globals; this
//! rewrite holds them by value in one `Engine`, built once from
//! configuration and passed by reference to every primitive. No
//! singletons.

use crate::config::Config;
use crate::spinor::SpinorRegistry;
use crate::symmetry::SymmetryTable;
use crate::tensor::stack::DiagramStack;

/// Everything a computation needs, constructed once at startup and torn
/// down at the end (§5 "Shared-resource policy"): the spinor registry
/// and symmetry table are read-only after setup and held by value
/// (callers share them via `&Engine`, never behind a `Mutex`, since no
/// primitive mutates them); the diagram stack is the one mutable piece,
/// and every mutation (`push`/`replace`/`remove`) is serialised by
/// requiring `&mut Engine`.
pub struct Engine {
    pub symmetry: SymmetryTable,
    pub registry: SpinorRegistry,
    pub stack: DiagramStack,
    pub config: Config,
}

impl Engine {
    pub fn new(symmetry: SymmetryTable, registry: SpinorRegistry, config: Config) -> Self {
        Engine {
            symmetry,
            registry,
            stack: DiagramStack::new(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActiveSpaceSpec, Arithmetic, OccupationSpec, Sector};

    fn toy_config() -> Config {
        Config::from_toml_str(
            r#"
            arithmetic = "real"
            target_sector = { h = 0, p = 1 }
            active_space_spec = { type = "total", nacth = 0, nactp = 1 }
            occupation_spec = { type = "per_spinor", occupied = [false] }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn construction_wires_an_empty_diagram_stack() {
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let reg = SpinorRegistry::new(vec![0], vec![0.1], vec![false], vec![true], vec![true], 8).unwrap();
        let cfg = toy_config();
        assert_eq!(cfg.target_sector, Sector { h: 0, p: 1 });
        assert_eq!(cfg.arithmetic, Arithmetic::Real);
        assert!(matches!(cfg.active_space_spec, ActiveSpaceSpec::Total { nacth: 0, nactp: 1 }));
        assert!(matches!(cfg.occupation_spec, OccupationSpec::PerSpinor { .. }));

        let engine = Engine::new(sym, reg, cfg);
        assert!(engine.stack.is_empty());
        assert_eq!(engine.registry.num_spinors(), 1);
    }
}
