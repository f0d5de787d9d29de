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

//! The MVCOEF model-vector file (§3.6, §6.2): per irrep, the
//! determinant list, eigenvalues, and left/right coefficient matrices
//! of the roots kept for that irrep, terminated by an `EOF` sentinel
//! and the global ground-state eigenvalue.

use std::io::{Read, Write};
use std::path::Path;

use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};
use crate::heff::{select_root_count, HeffBlock};
use crate::model_space::Determinant;
use crate::symmetry::{IrrepId, SymmetryTable};

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_complex(out: &mut Vec<u8>, v: Complex64) {
    write_f64(out, v.re);
    write_f64(out, v.im);
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn write_determinant(out: &mut Vec<u8>, det: &Determinant) {
    write_u32(out, det.holes.len() as u32);
    for &h in &det.holes {
        write_u64(out, h as u64);
    }
    write_u32(out, det.particles.len() as u32);
    for &p in &det.particles {
        write_u64(out, p as u64);
    }
}

/// One irrep's kept roots, ready to serialise: determinants, kept
/// eigenvalues, and the matching slice of the right/left coefficient
/// columns (`dim x nroots`, row-major).
pub struct MvcoefIrrepRecord<'a> {
    pub irrep_name: &'a str,
    pub dets: &'a [Determinant],
    pub eigenvalues: &'a [Complex64],
    pub right: &'a [Vec<Complex64>],
    pub left: &'a [Vec<Complex64>],
}

fn write_irrep_record(out: &mut Vec<u8>, record: &MvcoefIrrepRecord) {
    let dim = record.dets.len();
    let nroots = record.eigenvalues.len();
    write_string(out, record.irrep_name);
    write_u64(out, dim as u64);
    write_u64(out, nroots as u64);
    for det in record.dets {
        write_determinant(out, det);
    }
    for &ev in record.eigenvalues {
        write_complex(out, ev);
    }
    // right/left are stored root-major internally (`right[root][i]`);
    // the file layout is `dim x nroots` row-major, so transpose on write.
    for i in 0..dim {
        for k in 0..nroots {
            write_complex(out, record.right[k][i]);
        }
    }
    for i in 0..dim {
        for k in 0..nroots {
            write_complex(out, record.left[k][i]);
        }
    }
}

/// Writes the MVCOEF file for one sector: one record per irrep that
/// hosts a kept root, then the `{len=3, "EOF"}` sentinel and the global
/// ground-state eigenvalue.
pub fn write_mvcoef(
    path: impl AsRef<Path>,
    symmetry: &SymmetryTable,
    blocks: &[HeffBlock],
    nroots_config: usize,
    roots_energy_cutoff: Option<f64>,
    ground_eigenvalue: f64,
) -> EngineResult<()> {
    let path = path.as_ref();
    let mut out = Vec::new();
    for block in blocks {
        let k = select_root_count(block, nroots_config, roots_energy_cutoff);
        if k == 0 {
            continue;
        }
        let record = MvcoefIrrepRecord {
            irrep_name: symmetry.irrep_name(block.irrep)?,
            dets: &block.dets,
            eigenvalues: &block.eigenvalues[..k],
            right: &block.right[..k],
            left: &block.left[..k],
        };
        write_irrep_record(&mut out, &record);
    }
    write_string(&mut out, "EOF");
    write_f64(&mut out, ground_eigenvalue);

    let mut file = std::fs::File::create(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    file.write_all(&out).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> EngineResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(EngineError::CorruptFile {
                path: self.path.to_path_buf(),
                detail: "unexpected end of file".into(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> EngineResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> EngineResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> EngineResult<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn complex(&mut self) -> EngineResult<Complex64> {
        let re = self.f64()?;
        let im = self.f64()?;
        Ok(Complex64::new(re, im))
    }

    fn string(&mut self) -> EngineResult<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| EngineError::CorruptFile {
            path: self.path.to_path_buf(),
            detail: "string field is not valid UTF-8".into(),
        })
    }

    fn determinant(&mut self) -> EngineResult<Determinant> {
        let nh = self.u32()? as usize;
        let mut holes = Vec::with_capacity(nh);
        for _ in 0..nh {
            holes.push(self.u64()? as usize);
        }
        let np = self.u32()? as usize;
        let mut particles = Vec::with_capacity(np);
        for _ in 0..np {
            particles.push(self.u64()? as usize);
        }
        Ok(Determinant {
            holes,
            particles,
            irrep: 0,
        })
    }
}

/// One decoded irrep record, owned.
pub struct MvcoefIrrepData {
    pub irrep_name: String,
    pub dets: Vec<Determinant>,
    pub eigenvalues: Vec<Complex64>,
    /// `right[root][i]`.
    pub right: Vec<Vec<Complex64>>,
    pub left: Vec<Vec<Complex64>>,
}

pub struct MvcoefFile {
    pub irreps: Vec<MvcoefIrrepData>,
    pub ground_eigenvalue: f64,
}

/// Reads back an MVCOEF file, without needing the irrep's determinants'
/// irrep id (not stored; set to `0` as a placeholder since the caller
/// already knows which irrep this record belongs to from its name).
pub fn read_mvcoef(path: impl AsRef<Path>, symmetry: &SymmetryTable) -> EngineResult<MvcoefFile> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| EngineError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut r = Reader {
        bytes: &bytes,
        pos: 0,
        path,
    };

    let mut irreps = Vec::new();
    loop {
        let name = r.string()?;
        if name == "EOF" {
            let ground_eigenvalue = r.f64()?;
            return Ok(MvcoefFile { irreps, ground_eigenvalue });
        }
        let irrep_id: IrrepId = symmetry.irrep_index(&name).map_err(|_| EngineError::CorruptFile {
            path: path.to_path_buf(),
            detail: format!("MVCOEF record names unknown irrep `{name}`"),
        })?;
        let dim = r.u64()? as usize;
        let nroots = r.u64()? as usize;
        let mut dets = Vec::with_capacity(dim);
        for _ in 0..dim {
            let mut det = r.determinant()?;
            det.irrep = irrep_id;
            dets.push(det);
        }
        let mut eigenvalues = Vec::with_capacity(nroots);
        for _ in 0..nroots {
            eigenvalues.push(r.complex()?);
        }
        let mut right = vec![vec![Complex64::new(0.0, 0.0); dim]; nroots];
        for i in 0..dim {
            for k in 0..nroots {
                right[k][i] = r.complex()?;
            }
        }
        let mut left = vec![vec![Complex64::new(0.0, 0.0); dim]; nroots];
        for i in 0..dim {
            for k in 0..nroots {
                left[k][i] = r.complex()?;
            }
        }
        irreps.push(MvcoefIrrepData {
            irrep_name: name,
            dets,
            eigenvalues,
            right,
            left,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_irrep_record() {
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let dets = vec![
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
        ];
        let eigenvalues = vec![Complex64::new(-0.5, 0.0), Complex64::new(0.1, 0.0)];
        let right = vec![
            vec![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            vec![Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
        ];
        let left = right.clone();
        let record = MvcoefIrrepRecord {
            irrep_name: "A",
            dets: &dets,
            eigenvalues: &eigenvalues,
            right: &right,
            left: &left,
        };

        let mut out = Vec::new();
        write_irrep_record(&mut out, &record);
        write_string(&mut out, "EOF");
        write_f64(&mut out, -0.5);

        let dir = std::env::temp_dir().join(format!("fscc-mvcoef-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("MVCOEF01");
        std::fs::write(&path, &out).unwrap();

        let back = read_mvcoef(&path, &sym).unwrap();
        assert_eq!(back.irreps.len(), 1);
        assert_eq!(back.irreps[0].dets.len(), 2);
        assert_eq!(back.irreps[0].eigenvalues, eigenvalues);
        assert_eq!(back.ground_eigenvalue, -0.5);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
