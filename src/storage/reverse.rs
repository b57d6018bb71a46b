//! Backward line iteration over a seekable source
//!
//! Reads fixed-size chunks from the end towards the start and yields complete
//! lines, last line first. Only the bytes between the end and the line being
//! yielded are ever read, so a caller that stops early never touches the rest
//! of the file.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::trace;

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Lazy backward sequence of lines
///
/// Empty lines (including the one implied by a trailing terminator) are
/// yielded as empty strings. A trailing `\r` is stripped. Lines that are not
/// valid UTF-8 are skipped.
pub struct ReverseLines<R> {
    reader: R,

    /// Offset of the first byte not yet read into `pending`
    cursor: u64,

    /// Unconsumed bytes between `cursor` and the last yielded line
    pending: Vec<u8>,

    chunk_size: usize,

    finished: bool,
}

impl<R: Read + Seek> ReverseLines<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(mut reader: R, chunk_size: usize) -> io::Result<Self> {
        let cursor = reader.seek(SeekFrom::End(0))?;

        Ok(Self {
            reader,
            cursor,
            pending: Vec::new(),
            chunk_size: chunk_size.max(1),
            finished: cursor == 0,
        })
    }

    /// Prepend the chunk that ends at `cursor` to `pending`
    fn read_previous_chunk(&mut self) -> io::Result<()> {
        let start = self.cursor.saturating_sub(self.chunk_size as u64);
        let len = (self.cursor - start) as usize;

        let mut chunk = vec![0; len];
        self.reader.seek(SeekFrom::Start(start))?;
        self.reader.read_exact(&mut chunk)?;

        chunk.extend_from_slice(&self.pending);
        self.pending = chunk;
        self.cursor = start;
        Ok(())
    }

    fn take_line(bytes: &[u8]) -> Option<String> {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(line) => Some(line.to_string()),
            Err(_) => {
                trace!("skipping line that is not valid UTF-8");
                None
            }
        }
    }
}

impl<R: Read + Seek> Iterator for ReverseLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(idx) = self.pending.iter().rposition(|b| *b == b'\n') {
                let line = Self::take_line(&self.pending[idx + 1..]);
                self.pending.truncate(idx);
                match line {
                    Some(line) => return Some(Ok(line)),
                    None => continue,
                }
            }

            if self.cursor == 0 {
                // first line of the file has no preceding terminator
                self.finished = true;
                let line = Self::take_line(&self.pending);
                self.pending.clear();
                return line.map(Ok);
            }

            if let Err(e) = self.read_previous_chunk() {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}
