//! CMOD archive container
//!
//! A deterministic zip-family archive: local file headers followed by a
//! central directory and the end-of-central-directory record. Entries
//! carry UTF-8 relative paths, both sizes and a CRC-32; timestamps are
//! zeroed so packing the same tree twice yields identical bytes. The
//! unpacker verifies checksums and rejects any entry whose normalised
//! path would escape the extraction root.

use std::fs;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use log::debug;

use super::CmodError;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50; // "PK\x03\x04"
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const VERSION_NEEDED: u16 = 20;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Supported compression levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    None,
    Fast,
    #[default]
    Normal,
    Best,
}

impl CompressionLevel {
    fn to_flate2(self) -> Option<Compression> {
        match self {
            CompressionLevel::None => None,
            CompressionLevel::Fast => Some(Compression::fast()),
            CompressionLevel::Normal => Some(Compression::new(6)),
            CompressionLevel::Best => Some(Compression::best()),
        }
    }
}

/// One archive entry as listed by `analyze`.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
}

struct PendingEntry {
    path: String,
    crc32: u32,
    method: u16,
    compressed: Vec<u8>,
    uncompressed_size: u32,
    local_offset: u32,
}

/// Pack a directory into an archive file. Files are added in sorted
/// relative-path order.
pub fn pack_directory(
    src_dir: &Path,
    out_file: &Path,
    level: CompressionLevel,
) -> Result<(), CmodError> {
    let mut files = Vec::new();
    collect_files(src_dir, src_dir, &mut files)?;
    files.sort();

    let mut output: Vec<u8> = Vec::new();
    let mut pending: Vec<PendingEntry> = Vec::new();

    for relative in &files {
        let absolute = src_dir.join(relative);
        let data = fs::read(&absolute)?;
        let path = relative
            .to_str()
            .ok_or_else(|| {
                CmodError::InvalidStructure(format!(
                    "non-UTF-8 path {} cannot be archived",
                    relative.display()
                ))
            })?
            .replace('\\', "/");

        let crc32 = crc32fast::hash(&data);
        let (method, compressed) = match level.to_flate2() {
            None => (METHOD_STORED, data.clone()),
            Some(compression) => {
                let mut encoder = DeflateEncoder::new(Vec::new(), compression);
                encoder.write_all(&data)?;
                let deflated = encoder.finish()?;
                // Fall back to stored when deflate does not help.
                if deflated.len() < data.len() {
                    (METHOD_DEFLATED, deflated)
                } else {
                    (METHOD_STORED, data.clone())
                }
            }
        };

        let local_offset = output.len() as u32;
        write_u32(&mut output, LOCAL_HEADER_SIG);
        write_u16(&mut output, VERSION_NEEDED);
        write_u16(&mut output, 0); // flags
        write_u16(&mut output, method);
        write_u16(&mut output, 0); // time (zeroed for determinism)
        write_u16(&mut output, 0); // date
        write_u32(&mut output, crc32);
        write_u32(&mut output, compressed.len() as u32);
        write_u32(&mut output, data.len() as u32);
        write_u16(&mut output, path.len() as u16);
        write_u16(&mut output, 0); // extra length
        output.extend_from_slice(path.as_bytes());
        output.extend_from_slice(&compressed);

        pending.push(PendingEntry {
            path,
            crc32,
            method,
            compressed,
            uncompressed_size: data.len() as u32,
            local_offset,
        });
    }

    let central_offset = output.len() as u32;
    for entry in &pending {
        write_u32(&mut output, CENTRAL_HEADER_SIG);
        write_u16(&mut output, VERSION_NEEDED); // version made by
        write_u16(&mut output, VERSION_NEEDED);
        write_u16(&mut output, 0); // flags
        write_u16(&mut output, entry.method);
        write_u16(&mut output, 0); // time
        write_u16(&mut output, 0); // date
        write_u32(&mut output, entry.crc32);
        write_u32(&mut output, entry.compressed.len() as u32);
        write_u32(&mut output, entry.uncompressed_size);
        write_u16(&mut output, entry.path.len() as u16);
        write_u16(&mut output, 0); // extra length
        write_u16(&mut output, 0); // comment length
        write_u16(&mut output, 0); // disk number
        write_u16(&mut output, 0); // internal attributes
        write_u32(&mut output, 0); // external attributes
        write_u32(&mut output, entry.local_offset);
        output.extend_from_slice(entry.path.as_bytes());
    }
    let central_size = output.len() as u32 - central_offset;

    write_u32(&mut output, EOCD_SIG);
    write_u16(&mut output, 0); // disk number
    write_u16(&mut output, 0); // central directory disk
    write_u16(&mut output, pending.len() as u16);
    write_u16(&mut output, pending.len() as u16);
    write_u32(&mut output, central_size);
    write_u32(&mut output, central_offset);
    write_u16(&mut output, 0); // comment length

    fs::write(out_file, output)?;
    debug!("packed {} entries into {}", pending.len(), out_file.display());
    Ok(())
}

/// List archive entries without extracting.
pub fn list_entries(archive: &Path) -> Result<Vec<ArchiveEntry>, CmodError> {
    let bytes = fs::read(archive)?;
    let entries = read_central_directory(&bytes, archive)?;
    Ok(entries
        .into_iter()
        .map(|e| ArchiveEntry {
            path: e.path,
            uncompressed_size: e.uncompressed_size as u64,
            compressed_size: e.compressed_size as u64,
            crc32: e.crc32,
        })
        .collect())
}

/// Unpack an archive into a directory, verifying checksums and refusing
/// entries that escape the root.
pub fn unpack_archive(archive: &Path, out_dir: &Path) -> Result<(), CmodError> {
    let bytes = fs::read(archive)?;
    let entries = read_central_directory(&bytes, archive)?;

    for entry in entries {
        let target = normalize_entry_path(out_dir, &entry.path)?;
        let data = extract_entry(&bytes, &entry, archive)?;
        let actual = crc32fast::hash(&data);
        if actual != entry.crc32 {
            return Err(CmodError::ChecksumMismatch(entry.path));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;
    }
    Ok(())
}

struct CentralEntry {
    path: String,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
}

fn read_central_directory(bytes: &[u8], archive: &Path) -> Result<Vec<CentralEntry>, CmodError> {
    if bytes.len() < 4 || read_u32(bytes, 0) != LOCAL_HEADER_SIG {
        // An empty archive starts directly with the EOCD record.
        if bytes.len() < 4 || read_u32(bytes, 0) != EOCD_SIG {
            return Err(CmodError::NotAnArchive(archive.to_path_buf()));
        }
    }

    // Find the end-of-central-directory record from the back.
    let mut eocd = None;
    let scan_floor = bytes.len().saturating_sub(66_000);
    let mut i = bytes.len().saturating_sub(22);
    loop {
        if read_u32(bytes, i) == EOCD_SIG {
            eocd = Some(i);
            break;
        }
        if i == scan_floor {
            break;
        }
        i -= 1;
    }
    let eocd = eocd.ok_or_else(|| CmodError::NotAnArchive(archive.to_path_buf()))?;

    let count = read_u16(bytes, eocd + 10) as usize;
    let central_offset = read_u32(bytes, eocd + 16) as usize;

    let mut entries = Vec::with_capacity(count);
    let mut cursor = central_offset;
    for _ in 0..count {
        if read_u32(bytes, cursor) != CENTRAL_HEADER_SIG {
            return Err(CmodError::NotAnArchive(archive.to_path_buf()));
        }
        let method = read_u16(bytes, cursor + 10);
        let crc32 = read_u32(bytes, cursor + 16);
        let compressed_size = read_u32(bytes, cursor + 20);
        let uncompressed_size = read_u32(bytes, cursor + 24);
        let name_len = read_u16(bytes, cursor + 28) as usize;
        let extra_len = read_u16(bytes, cursor + 30) as usize;
        let comment_len = read_u16(bytes, cursor + 32) as usize;
        let local_offset = read_u32(bytes, cursor + 42);
        let name_start = cursor + 46;
        let path = String::from_utf8_lossy(&bytes[name_start..name_start + name_len]).to_string();
        entries.push(CentralEntry {
            path,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_offset,
        });
        cursor = name_start + name_len + extra_len + comment_len;
    }
    Ok(entries)
}

fn extract_entry(
    bytes: &[u8],
    entry: &CentralEntry,
    archive: &Path,
) -> Result<Vec<u8>, CmodError> {
    let offset = entry.local_offset as usize;
    if read_u32(bytes, offset) != LOCAL_HEADER_SIG {
        return Err(CmodError::NotAnArchive(archive.to_path_buf()));
    }
    let name_len = read_u16(bytes, offset + 26) as usize;
    let extra_len = read_u16(bytes, offset + 28) as usize;
    let data_start = offset + 30 + name_len + extra_len;
    let data_end = data_start + entry.compressed_size as usize;
    if data_end > bytes.len() {
        return Err(CmodError::NotAnArchive(archive.to_path_buf()));
    }
    let compressed = &bytes[data_start..data_end];

    match entry.method {
        METHOD_STORED => Ok(compressed.to_vec()),
        METHOD_DEFLATED => {
            let mut decoder = DeflateDecoder::new(compressed);
            let mut data = Vec::with_capacity(entry.uncompressed_size as usize);
            decoder.read_to_end(&mut data)?;
            Ok(data)
        }
        other => Err(CmodError::InvalidStructure(format!(
            "unsupported compression method {} for `{}`",
            other, entry.path
        ))),
    }
}

/// Join an entry path onto the extraction root, rejecting absolute
/// paths and any `..` traversal.
fn normalize_entry_path(root: &Path, entry_path: &str) -> Result<PathBuf, CmodError> {
    let relative = Path::new(entry_path);
    let mut normalized = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            _ => return Err(CmodError::EntryEscapesRoot(entry_path.to_string())),
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(CmodError::EntryEscapesRoot(entry_path.to_string()));
    }
    Ok(root.join(normalized))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CmodError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();
    for entry in entries {
        if entry.is_dir() {
            collect_files(root, &entry, out)?;
        } else if entry.is_file() {
            let relative = entry
                .strip_prefix(root)
                .expect("walked path is under its root")
                .to_path_buf();
            out.push(relative);
        }
    }
    Ok(())
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    if offset + 2 > bytes.len() {
        return 0;
    }
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    if offset + 4 > bytes.len() {
        return 0;
    }
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
