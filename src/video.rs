//! Raw video frame source.
//!
//! The stream is a headerless file: a sequence of frames of exactly
//! `width · height · 3` bytes (packed RGB, no metadata). Frames are read
//! strictly sequentially by a single owner; running out of data mid-run is
//! a fatal condition for the caller, never a rewind signal.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

pub const BYTES_PER_PIXEL: usize = 3;

pub struct FrameSource<R> {
    reader: R,
    frame_len: usize,
}

impl FrameSource<BufReader<File>> {
    /// Open a raw video file. The caller maps the error to its fatal
    /// resource-unavailable condition.
    pub fn open<P: AsRef<Path>>(path: P, width: usize, height: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), width, height))
    }
}

impl<R: Read> FrameSource<R> {
    pub fn from_reader(reader: R, width: usize, height: usize) -> Self {
        Self {
            reader,
            frame_len: width * height * BYTES_PER_PIXEL,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Fill `buf` with exactly one frame. Any short or failed read is an
    /// error; there is no partial-frame result.
    pub fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), self.frame_len);
        self.reader.read_exact(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_consecutive_frames() {
        let data: Vec<u8> = (0..2 * 2 * 3 * 2).map(|i| i as u8).collect();
        let mut source = FrameSource::from_reader(Cursor::new(data), 2, 2);
        assert_eq!(source.frame_len(), 12);

        let mut frame = [0u8; 12];
        source.read_frame(&mut frame).unwrap();
        assert_eq!(frame[0], 0);
        source.read_frame(&mut frame).unwrap();
        assert_eq!(frame[0], 12);
    }

    #[test]
    fn short_read_is_an_error() {
        let data = vec![0u8; 10]; // less than one 2×2 frame
        let mut source = FrameSource::from_reader(Cursor::new(data), 2, 2);
        let mut frame = [0u8; 12];
        assert!(source.read_frame(&mut frame).is_err());
    }
}
