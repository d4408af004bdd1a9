//! In-place tag rewriting for classic TIFF files.
//!
//! The first IFD is rewritten without touching pixel data: surviving entries
//! are copied verbatim, new payloads and a fresh IFD are appended at the end
//! of the file, and the header is repointed to the new IFD. The old IFD
//! becomes unreferenced space. BigTIFF is not supported.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::geotags::TagValue;
use crate::RasterError;

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_DOUBLE: u16 = 12;

const CLASSIC_MAGIC: u16 = 42;
const BIGTIFF_MAGIC: u16 = 43;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    }

    fn put_u16(self, out: &mut Vec<u8>, v: u16) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn put_u32(self, out: &mut Vec<u8>, v: u32) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn put_f64(self, out: &mut Vec<u8>, v: f64) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

/// A 12-byte IFD entry kept in file byte order.
struct RawEntry {
    tag: u16,
    bytes: Vec<u8>,
}

/// Rewrite the first IFD of `path`, dropping every tag in `remove` and
/// setting the tags in `set` (replacing existing entries with the same code).
pub fn rewrite_tags(path: &Path, remove: &[u16], set: &[(u16, TagValue)]) -> Result<(), RasterError> {
    let io_err = |e| RasterError::io(path, e);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(io_err)?;

    let mut header = [0u8; 8];
    file.read_exact(&mut header).map_err(io_err)?;
    let order = match &header[0..2] {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return Err(RasterError::InvalidData("not a TIFF file".to_string())),
    };
    match order.u16(&header[2..4]) {
        CLASSIC_MAGIC => {}
        BIGTIFF_MAGIC => {
            return Err(RasterError::Unsupported(
                "BigTIFF tag rewriting is not supported".to_string(),
            ))
        }
        other => {
            return Err(RasterError::InvalidData(format!(
                "bad TIFF magic number {}",
                other
            )))
        }
    }

    let ifd_offset = order.u32(&header[4..8]) as u64;
    file.seek(SeekFrom::Start(ifd_offset)).map_err(io_err)?;
    let mut count_buf = [0u8; 2];
    file.read_exact(&mut count_buf).map_err(io_err)?;
    let count = order.u16(&count_buf) as usize;
    let mut entry_buf = vec![0u8; count * 12];
    file.read_exact(&mut entry_buf).map_err(io_err)?;
    let mut next_ifd = [0u8; 4];
    file.read_exact(&mut next_ifd).map_err(io_err)?;

    let replaced = |tag: u16| remove.contains(&tag) || set.iter().any(|(t, _)| *t == tag);
    let mut entries: Vec<RawEntry> = entry_buf
        .chunks_exact(12)
        .map(|e| RawEntry {
            tag: order.u16(&e[0..2]),
            bytes: e.to_vec(),
        })
        .filter(|e| !replaced(e.tag))
        .collect();

    let end = file.seek(SeekFrom::End(0)).map_err(io_err)?;
    let base = end + (end % 2);
    let mut tail = vec![0u8; (base - end) as usize];

    for (tag, value) in set {
        let (field_type, count, payload) = encode_value(order, value);
        let mut entry = Vec::with_capacity(12);
        order.put_u16(&mut entry, *tag);
        order.put_u16(&mut entry, field_type);
        order.put_u32(&mut entry, count);
        if payload.len() <= 4 {
            let mut inline = payload;
            inline.resize(4, 0);
            entry.extend_from_slice(&inline);
        } else {
            let offset = to_offset(end + tail.len() as u64)?;
            order.put_u32(&mut entry, offset);
            tail.extend_from_slice(&payload);
            if tail.len() % 2 == 1 {
                tail.push(0);
            }
        }
        entries.push(RawEntry { tag: *tag, bytes: entry });
    }
    entries.sort_by_key(|e| e.tag);

    let new_ifd = to_offset(end + tail.len() as u64)?;
    order.put_u16(&mut tail, entries.len() as u16);
    for entry in &entries {
        tail.extend_from_slice(&entry.bytes);
    }
    tail.extend_from_slice(&next_ifd);
    to_offset(end + tail.len() as u64)?;

    file.write_all(&tail).map_err(io_err)?;
    let mut pointer = Vec::with_capacity(4);
    order.put_u32(&mut pointer, new_ifd);
    file.seek(SeekFrom::Start(4)).map_err(io_err)?;
    file.write_all(&pointer).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    debug!(
        path = %path.display(),
        removed = remove.len(),
        set = set.len(),
        ifd_offset = new_ifd,
        "Rewrote TIFF tags"
    );
    Ok(())
}

fn to_offset(pos: u64) -> Result<u32, RasterError> {
    u32::try_from(pos).map_err(|_| RasterError::Unsupported("TIFF file exceeds 4 GiB".to_string()))
}

/// Field type, value count and payload bytes for a tag value.
fn encode_value(order: ByteOrder, value: &TagValue) -> (u16, u32, Vec<u8>) {
    let mut payload = Vec::new();
    match value {
        TagValue::Doubles(v) => {
            v.iter().for_each(|&d| order.put_f64(&mut payload, d));
            (TYPE_DOUBLE, v.len() as u32, payload)
        }
        TagValue::Shorts(v) => {
            v.iter().for_each(|&s| order.put_u16(&mut payload, s));
            (TYPE_SHORT, v.len() as u32, payload)
        }
        TagValue::Ascii(s) => {
            payload.extend_from_slice(s.as_bytes());
            payload.push(0);
            (TYPE_ASCII, payload.len() as u32, payload)
        }
    }
}
