//! Checkpoint container for full network state.
//!
//! Layout: an 8-byte magic, a u32 format version, then tagged chunks. Each
//! chunk is a 4-byte tag, a u32 payload length, a u32 uncompressed length
//! and an LZ4-compressed payload. All scalars are little-endian. The
//! orchestrator treats the file as opaque; only the engine reads it back.

use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 8] = b"CHRM0001";
pub const VERSION: u32 = 1;

/// Population records: names, grids, polarities, parameter tuples.
pub const CHUNK_POPULATIONS: [u8; 4] = *b"POPS";
/// Materialized synapses, grouped per projection.
pub const CHUNK_SYNAPSES: [u8; 4] = *b"SYNS";
/// Global simulation-mode toggles and clock state.
pub const CHUNK_MODES: [u8; 4] = *b"MODE";

pub fn write_header<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)?;
    write_u32_le(w, VERSION)
}

pub fn read_header<R: Read>(r: &mut R) -> io::Result<u32> {
    let magic = read_exact::<8, _>(r)?;
    if &magic != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not a chromasim snapshot",
        ));
    }
    let version = read_u32_le(r)?;
    if version > VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported snapshot version {version}"),
        ));
    }
    Ok(version)
}

/// Write one chunk: tag, total length, uncompressed length, LZ4 payload.
pub fn write_chunk<W: Write>(w: &mut W, tag: [u8; 4], payload: &[u8]) -> io::Result<()> {
    let compressed = lz4_flex::compress(payload);
    let uncompressed_len = payload.len() as u32;
    let total_len = 4u32.saturating_add(
        u32::try_from(compressed.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "chunk too large"))?,
    );

    w.write_all(&tag)?;
    write_u32_le(w, total_len)?;
    write_u32_le(w, uncompressed_len)?;
    w.write_all(&compressed)
}

/// Read one chunk, returning its tag and decompressed payload.
pub fn read_chunk<R: Read>(r: &mut R) -> io::Result<([u8; 4], Vec<u8>)> {
    let tag = read_exact::<4, _>(r)?;
    let total_len = read_u32_le(r)? as usize;
    if total_len < 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "truncated chunk header",
        ));
    }
    let uncompressed_len = read_u32_le(r)? as usize;
    let mut compressed = vec![0u8; total_len - 4];
    r.read_exact(&mut compressed)?;
    let payload = lz4_flex::decompress(&compressed, uncompressed_len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "lz4 decompression failed"))?;
    Ok((tag, payload))
}

pub fn write_u32_le<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64_le<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_f32_le<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_u32_le(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

pub fn read_exact<const N: usize, R: Read>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact::<8, _>(r)?))
}

pub fn read_f32_le<R: Read>(r: &mut R) -> io::Result<f32> {
    Ok(f32::from_le_bytes(read_exact::<4, _>(r)?))
}

pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let n = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid utf-8 string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        let version = read_header(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(version, VERSION);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"NOTCHRM!");
        buf.extend_from_slice(&VERSION.to_le_bytes());
        assert!(read_header(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn future_version_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&(VERSION + 1).to_le_bytes());
        assert!(read_header(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn chunk_round_trips_through_lz4() {
        // Repetitive synapse-record-shaped payload, as a real snapshot is.
        let record = [0u8, 1, 0, 0, 0, 2, 0, 0, 0x3f, 0, 0, 0x3f, 0, 0, 0x80, 0x3f];
        let payload: Vec<u8> = std::iter::repeat(record).take(1024).flatten().collect();
        let mut buf = Vec::new();
        write_chunk(&mut buf, CHUNK_SYNAPSES, &payload).unwrap();

        let (tag, decoded) = read_chunk(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(tag, CHUNK_SYNAPSES);
        assert_eq!(decoded, payload);
        assert!(buf.len() < payload.len());
    }

    #[test]
    fn scalar_helpers_round_trip() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, 0xDEAD_BEEF).unwrap();
        write_u64_le(&mut buf, u64::MAX - 7).unwrap();
        write_f32_le(&mut buf, -0.3).unwrap();
        write_string(&mut buf, "Ev4magenta").unwrap();

        let mut r = Cursor::new(&buf);
        assert_eq!(read_u32_le(&mut r).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u64_le(&mut r).unwrap(), u64::MAX - 7);
        assert_eq!(read_f32_le(&mut r).unwrap(), -0.3);
        assert_eq!(read_string(&mut r).unwrap(), "Ev4magenta");
    }
}
