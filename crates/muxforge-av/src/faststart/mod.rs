//! MP4 metadata index ("moov") relocation.
//!
//! Muxers usually write the `moov` atom after the media data because its
//! contents are only known once all samples are written. Players then have to
//! fetch the end of the file before playback can start. Relocation rewrites
//! the file so `moov` comes first, adjusting every chunk offset that points
//! into the shifted media data.

mod atoms;

pub use atoms::{Atom, AtomType};

use crate::{Error, Result};
use atoms::{child_atoms, read_top_level};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Maximum moov size loaded into memory (64 MB) to prevent OOM on malformed files.
const MAX_MOOV_SIZE: u64 = 64 * 1024 * 1024;

/// Something that can move a file's metadata index to the front.
pub trait IndexRelocator: Send + Sync {
    /// Write a relocated copy of `input` to `output`.
    ///
    /// Fails with [`Error::AlreadyAtFront`] when `input` needs no relocation;
    /// `output` is not created in that case.
    fn relocate(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Native MP4 moov relocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastStart;

impl FastStart {
    pub fn new() -> Self {
        Self
    }
}

impl IndexRelocator for FastStart {
    fn relocate(&self, input: &Path, output: &Path) -> Result<()> {
        if !input.is_file() {
            return Err(Error::file_not_found(input));
        }

        let mut reader = BufReader::new(File::open(input)?);
        let atoms = read_top_level(&mut reader)?;

        let moov = atoms
            .iter()
            .find(|a| a.atom_type == AtomType::MOOV)
            .ok_or_else(|| Error::invalid_mp4("no moov atom"))?;
        let mdat = atoms
            .iter()
            .find(|a| a.atom_type == AtomType::MDAT)
            .ok_or_else(|| Error::invalid_mp4("no mdat atom"))?;

        if moov.offset < mdat.offset {
            return Err(Error::AlreadyAtFront {
                path: input.to_path_buf(),
            });
        }

        if moov.size > MAX_MOOV_SIZE {
            return Err(Error::invalid_mp4(format!(
                "moov size {} exceeds maximum {}",
                moov.size, MAX_MOOV_SIZE
            )));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Relocating {} byte moov from offset {} in {:?}",
            moov.size,
            moov.offset,
            input
        );

        let mut moov_bytes = vec![0u8; moov.size as usize];
        reader.seek(SeekFrom::Start(moov.offset))?;
        reader.read_exact(&mut moov_bytes)?;

        let layout = Layout::new(&atoms);
        let header_len = if read_u32(&moov_bytes, 0) == 1 { 16 } else { 8 };
        patch_chunk_offsets(&mut moov_bytes, header_len..moov.size as usize, &layout)?;

        let mut writer = BufWriter::new(File::create(output)?);
        for atom in &layout.order {
            if atom.atom_type == AtomType::MOOV {
                writer.write_all(&moov_bytes)?;
            } else {
                reader.seek(SeekFrom::Start(atom.offset))?;
                let copied = std::io::copy(&mut (&mut reader).take(atom.size), &mut writer)?;
                if copied != atom.size {
                    return Err(Error::invalid_mp4(format!(
                        "short read copying {} atom",
                        atom.atom_type
                    )));
                }
            }
        }
        writer.flush()?;

        Ok(())
    }
}

/// Output atom order and the new position of every atom.
struct Layout {
    order: Vec<Atom>,
    new_offsets: Vec<u64>,
}

impl Layout {
    /// `ftyp` first, then `moov`, then everything else in original order.
    fn new(atoms: &[Atom]) -> Self {
        let mut order: Vec<Atom> = atoms
            .iter()
            .filter(|a| a.atom_type == AtomType::FTYP)
            .cloned()
            .collect();
        order.extend(atoms.iter().filter(|a| a.atom_type == AtomType::MOOV).cloned());
        order.extend(
            atoms
                .iter()
                .filter(|a| a.atom_type != AtomType::FTYP && a.atom_type != AtomType::MOOV)
                .cloned(),
        );

        let mut new_offsets = Vec::with_capacity(order.len());
        let mut pos = 0u64;
        for atom in &order {
            new_offsets.push(pos);
            pos += atom.size;
        }

        Self { order, new_offsets }
    }

    /// Translate an absolute offset in the source file into the output file.
    fn translate(&self, old: u64) -> Result<u64> {
        self.order
            .iter()
            .zip(&self.new_offsets)
            .find(|(atom, _)| atom.atom_type != AtomType::MOOV && atom.contains(old))
            .map(|(atom, new)| new + (old - atom.offset))
            .ok_or_else(|| Error::invalid_mp4(format!("chunk offset {} points outside media data", old)))
    }
}

fn patch_chunk_offsets(
    buf: &mut [u8],
    range: std::ops::Range<usize>,
    layout: &Layout,
) -> Result<()> {
    for child in child_atoms(buf, range)? {
        match child.atom_type {
            AtomType::CMOV => {
                return Err(Error::Unsupported("compressed moov atoms".to_string()));
            }
            AtomType::STCO => patch_table(buf, child.body, 4, layout)?,
            AtomType::CO64 => patch_table(buf, child.body, 8, layout)?,
            t if t.is_container() => patch_chunk_offsets(buf, child.body, layout)?,
            _ => {}
        }
    }
    Ok(())
}

/// Rewrite a `stco` (4-byte) or `co64` (8-byte) entry table in place.
fn patch_table(
    buf: &mut [u8],
    body: std::ops::Range<usize>,
    width: usize,
    layout: &Layout,
) -> Result<()> {
    // version/flags, entry count
    if body.len() < 8 {
        return Err(Error::invalid_mp4("chunk offset table too short"));
    }
    let count = read_u32(buf, body.start + 4) as usize;
    let entries = body.start + 8;
    if count
        .checked_mul(width)
        .map_or(true, |len| entries + len > body.end)
    {
        return Err(Error::invalid_mp4("chunk offset table truncated"));
    }

    for i in 0..count {
        let at = entries + i * width;
        if width == 4 {
            let new = layout.translate(read_u32(buf, at) as u64)?;
            let new = u32::try_from(new).map_err(|_| {
                Error::Unsupported("relocated chunk offset exceeds 32-bit stco".to_string())
            })?;
            buf[at..at + 4].copy_from_slice(&new.to_be_bytes());
        } else {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&buf[at..at + 8]);
            let new = layout.translate(u64::from_be_bytes(raw))?;
            buf[at..at + 8].copy_from_slice(&new.to_be_bytes());
        }
    }
    Ok(())
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
