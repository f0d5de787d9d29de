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

//! The formatted H_eff file (§6.2): per irrep, the `dim x dim` complex
//! matrix as text, two numbers per line in complex arithmetic (the
//! real and imaginary part of one element) or four per line in real
//! arithmetic (four successive real parts, since the imaginary parts
//! are always zero and need not be printed).

use std::io::Write;
use std::path::Path;

use num_complex::Complex64;

use crate::config::Arithmetic;
use crate::error::{EngineError, EngineResult};
use crate::heff::HeffBlock;
use crate::symmetry::SymmetryTable;

fn format_block(out: &mut String, irrep_name: &str, dim: usize, matrix: &[Complex64], arithmetic: Arithmetic) {
    out.push_str(&format!("# irrep {irrep_name} dim {dim}\n"));
    match arithmetic {
        Arithmetic::Complex => {
            for z in matrix {
                out.push_str(&format!("{:.15e} {:.15e}\n", z.re, z.im));
            }
        }
        Arithmetic::Real => {
            let mut chunk = Vec::with_capacity(4);
            for z in matrix {
                chunk.push(z.re);
                if chunk.len() == 4 {
                    out.push_str(&format!(
                        "{:.15e} {:.15e} {:.15e} {:.15e}\n",
                        chunk[0], chunk[1], chunk[2], chunk[3]
                    ));
                    chunk.clear();
                }
            }
            if !chunk.is_empty() {
                let line: Vec<String> = chunk.iter().map(|v| format!("{v:.15e}")).collect();
                out.push_str(&line.join(" "));
                out.push('\n');
            }
        }
    }
}

/// Writes every irrep's H_γ block (§4.7 point 2c) to the formatted
/// H_eff text file, in irrep order.
pub fn write_heff_file(
    path: impl AsRef<Path>,
    symmetry: &SymmetryTable,
    blocks: &[HeffBlock],
    arithmetic: Arithmetic,
) -> EngineResult<()> {
    let path = path.as_ref();
    let mut out = String::new();
    for block in blocks {
        let name = symmetry.irrep_name(block.irrep)?;
        let dim = block.dets.len();
        format_block(&mut out, name, dim, &block.matrix, arithmetic);
    }
    let mut file = std::fs::File::create(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    file.write_all(out.as_bytes()).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_space::Determinant;

    #[test]
    fn real_arithmetic_packs_four_values_per_line() {
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let block = HeffBlock {
            irrep: 0,
            dets: vec![
                Determinant {
                    holes: vec![],
                    particles: vec![0],
                    irrep: 0,
                },
                Determinant {
                    holes: vec![],
                    particles: vec![1],
                    irrep: 0,
                },
            ],
            matrix: vec![
                Complex64::new(1.0, 0.0),
                Complex64::new(0.5, 0.0),
                Complex64::new(0.5, 0.0),
                Complex64::new(2.0, 0.0),
            ],
            eigenvalues: vec![],
            right: vec![],
            left: vec![],
        };
        let dir = std::env::temp_dir().join(format!("fscc-heff-file-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("H_eff.txt");
        write_heff_file(&path, &sym, &[block], Arithmetic::Real).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let data_lines: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data_lines.len(), 1);
        assert_eq!(data_lines[0].split_whitespace().count(), 4);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
