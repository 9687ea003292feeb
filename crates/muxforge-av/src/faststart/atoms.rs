//! MP4 atom headers.

use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

/// Four-character atom type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const CMOV: Self = Self(*b"cmov");
    pub const TRAK: Self = Self(*b"trak");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Whether atoms of this type hold child atoms that may contain chunk
    /// offset tables.
    pub fn is_container(&self) -> bool {
        matches!(
            *self,
            Self::MOOV | Self::TRAK | Self::MDIA | Self::MINF | Self::STBL
        )
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level atom location in a file.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Atom type code.
    pub atom_type: AtomType,
    /// File offset of the atom header.
    pub offset: u64,
    /// Atom size including header.
    pub size: u64,
}

impl Atom {
    /// File offset one past the last byte of the atom.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Whether an absolute file offset falls inside this atom.
    pub fn contains(&self, pos: u64) -> bool {
        pos >= self.offset && pos < self.end()
    }
}

/// Read the top-level atom list of a file.
pub fn read_top_level<R: Read + Seek>(reader: &mut R) -> Result<Vec<Atom>> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    let mut atoms = Vec::new();
    let mut pos = 0u64;

    while pos + 8 <= file_size {
        reader.seek(SeekFrom::Start(pos))?;

        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;

        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let atom_type = AtomType([header[4], header[5], header[6], header[7]]);

        let (actual_size, header_size) = if size == 1 {
            // 64-bit extended size
            let mut ext = [0u8; 8];
            reader.read_exact(&mut ext)?;
            (u64::from_be_bytes(ext), 16u64)
        } else if size == 0 {
            // Atom extends to end of file
            (file_size - pos, 8u64)
        } else {
            (size, 8u64)
        };

        if actual_size < header_size {
            return Err(Error::invalid_mp4(format!(
                "atom {} at offset {} has invalid size {}",
                atom_type, pos, actual_size
            )));
        }
        if pos + actual_size > file_size {
            return Err(Error::invalid_mp4(format!(
                "atom {} at offset {} runs past end of file",
                atom_type, pos
            )));
        }

        atoms.push(Atom {
            atom_type,
            offset: pos,
            size: actual_size,
        });

        pos += actual_size;
    }

    Ok(atoms)
}

/// Child atom inside an in-memory atom body.
#[derive(Debug, Clone)]
pub struct ChildAtom {
    pub atom_type: AtomType,
    /// Byte range of the child's payload (after its header) in the buffer.
    pub body: Range<usize>,
}

/// List the child atoms contained in `buf[range]`.
pub fn child_atoms(buf: &[u8], range: Range<usize>) -> Result<Vec<ChildAtom>> {
    let mut children = Vec::new();
    let mut pos = range.start;

    while pos + 8 <= range.end {
        let size = u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]) as u64;
        let atom_type = AtomType([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]]);

        let (actual_size, header_size) = if size == 1 {
            if pos + 16 > range.end {
                return Err(Error::invalid_mp4("truncated extended atom header"));
            }
            let mut ext = [0u8; 8];
            ext.copy_from_slice(&buf[pos + 8..pos + 16]);
            (u64::from_be_bytes(ext), 16usize)
        } else if size == 0 {
            ((range.end - pos) as u64, 8usize)
        } else {
            (size, 8usize)
        };

        let end = usize::try_from(actual_size)
            .ok()
            .and_then(|s| pos.checked_add(s))
            .filter(|end| *end <= range.end && actual_size >= header_size as u64)
            .ok_or_else(|| {
                Error::invalid_mp4(format!("atom {} at offset {} is malformed", atom_type, pos))
            })?;

        children.push(ChildAtom {
            atom_type,
            body: pos + header_size..end,
        });
        pos = end;
    }

    Ok(children)
}
