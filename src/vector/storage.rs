//! On-disk artifact for the key-mapped index.
//!
//! # Storage Format
//!
//! A single little-endian file:
//! - Header (24 bytes): magic `CIDX`, format version (u32), dimension (u32),
//!   reserved (u32), record count (u64)
//! - Keys: `count` × i64
//! - Vectors: `count` × `dimension` × f32, in key order
//! - Trailer (32 bytes): SHA-256 of everything before it
//!
//! Writes go to a temporary file in the destination directory which is
//! renamed over the target only after it is fully flushed, so readers see
//! either the previous artifact or the new one.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use memmap2::MmapOptions;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{IndexError, IndexResult};
use crate::types::{IndexKey, VectorDimension};
use crate::vector::IdMappedIndex;

/// Current artifact format version.
const STORAGE_VERSION: u32 = 1;

/// Magic bytes identifying an index artifact.
const MAGIC_BYTES: &[u8; 4] = b"CIDX";

const HEADER_SIZE: usize = 24;
const CHECKSUM_SIZE: usize = 32;
const BYTES_PER_KEY: usize = 8;
const BYTES_PER_F32: usize = 4;

/// Header fields decoded from an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactHeader {
    pub version: u32,
    pub dimension: VectorDimension,
    pub count: usize,
}

/// Writes `index` to `path` atomically.
pub fn write_artifact(index: &IdMappedIndex, path: &Path) -> IndexResult<()> {
    let persist_err = |source: io::Error| IndexError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(persist_err)?;

    let temp = NamedTempFile::new_in(parent).map_err(persist_err)?;
    let mut writer = HashingWriter::new(BufWriter::new(temp));

    write_body(&mut writer, index).map_err(persist_err)?;

    let (buffered, digest) = writer.finish();
    let mut temp = buffered
        .into_inner()
        .map_err(|e| persist_err(e.into_error()))?;
    temp.write_all(&digest).map_err(persist_err)?;
    temp.as_file().sync_all().map_err(persist_err)?;

    temp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}

fn write_body<W: Write>(writer: &mut W, index: &IdMappedIndex) -> io::Result<()> {
    let dimension = u32::try_from(index.dimension().get())
        .map_err(|_| io::Error::other("dimension does not fit the artifact header"))?;

    writer.write_all(MAGIC_BYTES)?;
    writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
    writer.write_all(&dimension.to_le_bytes())?;
    writer.write_all(&0u32.to_le_bytes())?;
    writer.write_all(&(index.len() as u64).to_le_bytes())?;

    for key in index.keys() {
        writer.write_all(&key.to_bytes())?;
    }
    for value in index.raw_vectors() {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Reads and verifies the artifact at `path`.
///
/// Any missing file, truncation, header mismatch or checksum failure is
/// reported as [`IndexError::Load`].
pub fn read_artifact(path: &Path) -> IndexResult<IdMappedIndex> {
    if !path.exists() {
        return Err(IndexError::load(path, "file not found"));
    }

    let file = File::open(path).map_err(|e| IndexError::load(path, e.to_string()))?;
    let file_len = file
        .metadata()
        .map_err(|e| IndexError::load(path, e.to_string()))?
        .len();
    if file_len < (HEADER_SIZE + CHECKSUM_SIZE) as u64 {
        return Err(IndexError::load(path, "file too small to contain header"));
    }

    // SAFETY: the artifact is only ever replaced by rename, never written in place.
    let mmap = unsafe { MmapOptions::new().map(&file) }
        .map_err(|e| IndexError::load(path, e.to_string()))?;

    decode(&mmap).map_err(|reason| IndexError::load(path, reason))
}

/// Reads only the header, without verifying the body.
pub fn read_header(path: &Path) -> IndexResult<ArtifactHeader> {
    let bytes = std::fs::read(path).map_err(|e| IndexError::load(path, e.to_string()))?;
    parse_header(&bytes).map_err(|reason| IndexError::load(path, reason))
}

fn parse_header(bytes: &[u8]) -> Result<ArtifactHeader, String> {
    if bytes.len() < HEADER_SIZE {
        return Err("file too small to contain header".to_string());
    }
    if &bytes[0..4] != MAGIC_BYTES {
        return Err("invalid magic bytes".to_string());
    }

    let version = read_u32(bytes, 4);
    if version != STORAGE_VERSION {
        return Err(format!(
            "unsupported format version {version}, expected {STORAGE_VERSION}"
        ));
    }

    let dimension = VectorDimension::new(read_u32(bytes, 8) as usize)
        .map_err(|_| "header declares a zero dimension".to_string())?;
    let count = usize::try_from(read_u64(bytes, 16))
        .map_err(|_| "record count does not fit in memory".to_string())?;

    Ok(ArtifactHeader {
        version,
        dimension,
        count,
    })
}

fn decode(bytes: &[u8]) -> Result<IdMappedIndex, String> {
    let header = parse_header(bytes)?;
    let dim = header.dimension.get();

    let keys_len = header
        .count
        .checked_mul(BYTES_PER_KEY)
        .ok_or("record count overflows")?;
    let vectors_len = header
        .count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(BYTES_PER_F32))
        .ok_or("record count overflows")?;
    let expected = HEADER_SIZE + keys_len + vectors_len + CHECKSUM_SIZE;
    if bytes.len() != expected {
        return Err(format!(
            "size mismatch: header implies {expected} bytes, file has {}",
            bytes.len()
        ));
    }

    let (body, stored_digest) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
    let digest = Sha256::digest(body);
    if digest.as_slice() != stored_digest {
        return Err("checksum mismatch".to_string());
    }

    let key_bytes = &body[HEADER_SIZE..HEADER_SIZE + keys_len];
    let mut keys = Vec::with_capacity(header.count);
    for chunk in key_bytes.chunks_exact(BYTES_PER_KEY) {
        let mut raw = [0u8; BYTES_PER_KEY];
        raw.copy_from_slice(chunk);
        keys.push(IndexKey::from_bytes(raw).ok_or("negative index key")?);
    }

    let data: Vec<f32> = body[HEADER_SIZE + keys_len..]
        .chunks_exact(BYTES_PER_F32)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(IdMappedIndex::from_parts(header.dimension, keys, data))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// Writer adapter that feeds every written byte into a SHA-256 hasher.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (W, [u8; CHECKSUM_SIZE]) {
        let mut digest = [0u8; CHECKSUM_SIZE];
        digest.copy_from_slice(&self.hasher.finalize());
        (self.inner, digest)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
