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

//! Diagram binary I/O (§4.3.7, §6.2): `write`/`read` of a `<name>.dg`
//! file, with optional LZ4 compression applied at buffer granularity.

use std::io::{Read, Write};
use std::path::Path;

use num_complex::Complex64;

use crate::error::{EngineError, EngineResult};
use crate::spinor::QuasiParticle;
use crate::tensor::diagram::{Arithmetic, Block, Buffer, DiagBlockId, Diagram, StorageClass};
use crate::tensor::signature::Signature;

/// `0x6f6c6579` ("oley" little-endian), per §6.2.
pub const MAGIC: u32 = 0x6f6c_6579;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Lz4,
}

fn qparts_string(sig: &Signature) -> String {
    sig.qparts.iter().map(|q| if *q == QuasiParticle::Hole { 'h' } else { 'p' }).collect()
}

fn valence_string(sig: &Signature) -> String {
    sig.valence.iter().map(|&v| if v { '1' } else { '0' }).collect()
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn encode_buffer(buf: &Buffer, compression: Compression) -> (u8, Vec<u8>) {
    let mut raw = Vec::with_capacity(buf.len() * 16);
    match buf {
        Buffer::Real(v) => {
            for &x in v {
                write_f64(&mut raw, x);
            }
        }
        Buffer::Complex(v) => {
            for &x in v {
                write_f64(&mut raw, x.re);
                write_f64(&mut raw, x.im);
            }
        }
    }
    match compression {
        Compression::None => (0, raw),
        #[cfg(feature = "compression")]
        Compression::Lz4 => (1, lz4_flex::compress_prepend_size(&raw)),
        #[cfg(not(feature = "compression"))]
        Compression::Lz4 => (0, raw),
    }
}

fn decode_buffer(
    arithmetic: Arithmetic,
    numel: usize,
    compressed_flag: u8,
    payload: &[u8],
    path: &Path,
) -> EngineResult<Buffer> {
    let raw = match compressed_flag {
        0 => payload.to_vec(),
        1 => {
            #[cfg(feature = "compression")]
            {
                lz4_flex::decompress_size_prepended(payload).map_err(|e| EngineError::CorruptFile {
                    path: path.to_path_buf(),
                    detail: format!("LZ4 decompression failed: {e}"),
                })?
            }
            #[cfg(not(feature = "compression"))]
            {
                return Err(EngineError::CorruptFile {
                    path: path.to_path_buf(),
                    detail: "file is LZ4-compressed but this build has no `compression` feature".into(),
                });
            }
        }
        other => {
            return Err(EngineError::CorruptFile {
                path: path.to_path_buf(),
                detail: format!("unknown buffer compression tag {other}"),
            })
        }
    };
    match arithmetic {
        Arithmetic::Real => {
            if raw.len() != numel * 8 {
                return Err(EngineError::CorruptFile {
                    path: path.to_path_buf(),
                    detail: "truncated real buffer".into(),
                });
            }
            let v: Vec<f64> = raw.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect();
            Ok(Buffer::Real(v))
        }
        Arithmetic::Complex => {
            if raw.len() != numel * 16 {
                return Err(EngineError::CorruptFile {
                    path: path.to_path_buf(),
                    detail: "truncated complex buffer".into(),
                });
            }
            let v: Vec<Complex64> = raw
                .chunks_exact(16)
                .map(|c| {
                    let re = f64::from_le_bytes(c[0..8].try_into().unwrap());
                    let im = f64::from_le_bytes(c[8..16].try_into().unwrap());
                    Complex64::new(re, im)
                })
                .collect();
            Ok(Buffer::Complex(v))
        }
    }
}

/// Emits the diagram's magic word, header, inverted index, and every
/// block (metadata plus buffer, compressed at buffer granularity when
/// `compression` requests it). On-disk blocks are read back from their
/// own files before being serialised into this one stream.
pub fn write(diagram: &Diagram, path: impl AsRef<Path>, compression: Compression) -> EngineResult<()> {
    let path = path.as_ref();
    let mut out = Vec::new();
    write_u32(&mut out, MAGIC);
    write_string(&mut out, &diagram.name);
    write_u32(&mut out, diagram.rank() as u32);
    out.push(u8::from(diagram.only_unique));
    out.push(match diagram.arithmetic {
        Arithmetic::Real => 0,
        Arithmetic::Complex => 1,
    });
    write_string(&mut out, &qparts_string(&diagram.signature));
    write_string(&mut out, &valence_string(&diagram.signature));
    write_u32(&mut out, diagram.signature.order.len() as u32);
    for &p in &diagram.signature.order {
        write_u32(&mut out, p as u32);
    }

    write_u32(&mut out, diagram.num_blocks() as u32);
    for block in diagram.blocks() {
        write_u32(&mut out, block.spinor_blocks.len() as u32);
        for &b in &block.spinor_blocks {
            write_u64(&mut out, b as u64);
        }
        for &s in &block.shape {
            write_u64(&mut out, s as u64);
        }
        out.push(u8::from(block.is_unique));
        match &block.perm_to_unique {
            Some(perm) => {
                out.push(1);
                for &p in perm {
                    write_u32(&mut out, p as u32);
                }
            }
            None => out.push(0),
        }
        write_f64(&mut out, block.sign);
        write_u64(&mut out, block.unique.map(|u| u as u64).unwrap_or(u64::MAX));

        let buffer = block_buffer_for_write(diagram, block, path)?;
        let (flag, payload) = encode_buffer(&buffer, compression);
        out.push(flag);
        write_u64(&mut out, payload.len() as u64);
        out.extend_from_slice(&payload);
    }

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

fn block_buffer_for_write(diagram: &Diagram, block: &Block, path: &Path) -> EngineResult<Buffer> {
    if let Some(buf) = block.buffer() {
        return Ok(buf.clone());
    }
    match block.storage_class {
        StorageClass::OnDisk => {
            let disk_path = block.disk_path().ok_or_else(|| EngineError::Invariant {
                diagram: diagram.name.clone(),
                detail: "on-disk block has neither resident buffer nor disk path".into(),
            })?;
            let raw = std::fs::read(disk_path).map_err(|e| EngineError::Io {
                path: disk_path.clone(),
                source: e,
            })?;
            decode_buffer(diagram.arithmetic, block.numel(), 0, &raw, path)
        }
        StorageClass::InMemory => Err(EngineError::invariant(
            &diagram.name,
            "in-memory block has no resident buffer at write time",
        )),
    }
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

    fn u8(&mut self) -> EngineResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn string(&mut self) -> EngineResult<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| EngineError::CorruptFile {
            path: self.path.to_path_buf(),
            detail: "string field is not valid UTF-8".into(),
        })
    }
}

/// Reads back a diagram written by `write`. Every block is restored
/// in-memory regardless of the `StorageClass` it was written under;
/// callers that want on-disk residency re-spill after reading.
pub fn read(path: impl AsRef<Path>) -> EngineResult<Diagram> {
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
    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(EngineError::CorruptFile {
            path: path.to_path_buf(),
            detail: format!("bad magic word 0x{magic:08x}, expected 0x{MAGIC:08x}"),
        });
    }
    let name = r.string()?;
    let _rank = r.u32()?;
    let only_unique = r.u8()? != 0;
    let arithmetic = match r.u8()? {
        0 => Arithmetic::Real,
        1 => Arithmetic::Complex,
        other => {
            return Err(EngineError::CorruptFile {
                path: path.to_path_buf(),
                detail: format!("unknown arithmetic tag {other}"),
            })
        }
    };
    let qparts = r.string()?;
    let valence = r.string()?;
    let order_len = r.u32()? as usize;
    let mut order = Vec::with_capacity(order_len);
    for _ in 0..order_len {
        order.push(r.u32()? as usize);
    }
    let signature = Signature::parse("tensor::io::read", &qparts, &valence, &order)
        .map_err(|e| EngineError::CorruptFile {
            path: path.to_path_buf(),
            detail: format!("malformed signature in file header: {e}"),
        })?;

    let num_blocks = r.u32()? as usize;
    let mut blocks = Vec::with_capacity(num_blocks);
    let mut index = std::collections::HashMap::with_capacity(num_blocks);
    for id in 0..num_blocks {
        let dims = r.u32()? as usize;
        let mut spinor_blocks = Vec::with_capacity(dims);
        for _ in 0..dims {
            spinor_blocks.push(r.u64()? as usize);
        }
        let mut shape = Vec::with_capacity(dims);
        for _ in 0..dims {
            shape.push(r.u64()? as usize);
        }
        let is_unique = r.u8()? != 0;
        let has_perm = r.u8()? != 0;
        let perm_to_unique = if has_perm {
            let mut p = Vec::with_capacity(dims);
            for _ in 0..dims {
                p.push(r.u32()? as usize);
            }
            Some(p)
        } else {
            None
        };
        let sign = r.f64()?;
        let unique_raw = r.u64()?;
        let unique = if unique_raw == u64::MAX { None } else { Some(unique_raw as DiagBlockId) };

        let compressed_flag = r.u8()?;
        let payload_len = r.u64()? as usize;
        let payload = r.take(payload_len)?;
        let numel: usize = shape.iter().product();
        let buffer = decode_buffer(arithmetic, numel, compressed_flag, payload, path)?;

        index.insert(spinor_blocks.clone(), id);
        blocks.push(Block {
            spinor_blocks,
            shape,
            storage_class: StorageClass::InMemory,
            is_unique,
            perm_to_unique,
            sign,
            unique,
            buffer: Some(buffer),
            disk_path: None,
        });
    }

    Ok(Diagram::from_parts(name, signature, only_unique, arithmetic, blocks, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spinor::SpinorRegistry;
    use crate::symmetry::SymmetryTable;
    use crate::tensor::access::{get, set};
    use crate::tensor::diagram::{tmplt, Scalar};

    #[test]
    fn round_trips_through_a_temp_file() {
        let reg = SpinorRegistry::new(
            vec![0, 0, 0, 0],
            vec![-1.0, -0.5, 0.3, 0.4],
            vec![true, true, false, false],
            vec![true, true, true, true],
            vec![true, true, true, true],
            8,
        )
        .unwrap();
        let sym = SymmetryTable::abelian_cyclic(vec!["A".into()]).unwrap();
        let mut d = tmplt(&reg, &sym, "t1", "hp", "00", &[0, 1], true, Arithmetic::Real, 0).unwrap();
        set(&reg, &mut d, &[0, 2], Scalar::Real(1.5)).unwrap();
        set(&reg, &mut d, &[1, 3], Scalar::Real(-2.5)).unwrap();

        let dir = std::env::temp_dir().join(format!("fscc-io-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("t1.dg");
        write(&d, &path, Compression::None).unwrap();
        let back = read(&path).unwrap();

        assert_eq!(back.name, "t1");
        assert_eq!(back.num_blocks(), d.num_blocks());
        assert_eq!(get(&reg, &back, &[0, 2]).unwrap(), Scalar::Real(1.5));
        assert_eq!(get(&reg, &back, &[1, 3]).unwrap(), Scalar::Real(-2.5));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = std::env::temp_dir().join(format!("fscc-io-test-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.dg");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();
        assert!(read(&path).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
