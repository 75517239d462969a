//! Input abstraction (SPEC_FULL.md §5, supplemented from `original_source/`'s
//! `byte_reader.go`, which reads from either an open file handle or an
//! in-memory byte slice through one interface). `Reader::open` just wants
//! the whole file in memory, so this module's only job is collecting bytes
//! out of anything that can read and seek.

use std::io::{Read, Seek};

use crate::error::Result;

/// Anything a source PDF can come from: a file on disk, an in-memory
/// cursor, or a caller's own `Read + Seek` implementation.
pub trait PdfSource: Read + Seek {}
impl<T: Read + Seek> PdfSource for T {}

/// Reads a source to exhaustion from its current position, rewinding
/// first so a caller that already seeked around gets the whole file.
pub fn read_all(source: &mut dyn PdfSource) -> Result<Vec<u8>> {
    source.seek(std::io::SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_in_memory_cursor_from_the_start() {
        let mut cursor = Cursor::new(b"%PDF-1.4\n...".to_vec());
        cursor.set_position(4);
        let bytes = read_all(&mut cursor).unwrap();
        assert_eq!(bytes, b"%PDF-1.4\n...".to_vec());
    }
}
