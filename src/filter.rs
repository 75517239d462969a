//! `/FlateDecode` and the PNG predictor row-reversal used by cross-reference
//! streams (spec.md §4.C step 2). Only `/FlateDecode` is supported anywhere
//! in this crate — every other filter is a hard `UnsupportedFeature` error
//! (spec.md §1 Non-goals).

use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::error::{Error, Result};

pub fn flate_decode(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Parse(format!("FlateDecode failed: {e}")))?;
    Ok(out)
}

/// PNG predictor tags, as they appear in the leading byte of each decoded
/// row when `/Predictor >= 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredictorTag {
    None,
    Sub,
    Up,
    Average,
    Paeth,
}

impl PredictorTag {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(PredictorTag::None),
            1 => Ok(PredictorTag::Sub),
            2 => Ok(PredictorTag::Up),
            3 => Ok(PredictorTag::Average),
            4 => Ok(PredictorTag::Paeth),
            other => Err(Error::UnsupportedFeature(format!("unknown PNG predictor tag {other}"))),
        }
    }
}

fn paeth(a: i32, b: i32, c: i32) -> i32 {
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Reverses the PNG row filter applied to a cross-reference stream's
/// (already FlateDecoded) bytes. `columns` is the row width in bytes
/// *excluding* the leading filter-tag byte (spec.md §4.C: `/Columns <= 4`
/// are the verified widths, higher values are a hard error per spec.md
/// §4.C "Supported widths").
pub fn reverse_png_predictor(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    if columns == 0 || columns > 4 {
        return Err(Error::UnsupportedFeature(format!(
            "predictor /Columns {columns} out of the supported range (1..=4)"
        )));
    }
    let row_len = columns + 1;
    if data.len() % row_len != 0 {
        return Err(Error::Parse(format!(
            "predictor stream length {} is not a multiple of row width {row_len}",
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(data.len() / row_len * columns);
    let mut prev_row = vec![0u8; columns];

    for row in data.chunks_exact(row_len) {
        let tag = PredictorTag::from_byte(row[0])?;
        let enc = &row[1..];
        let mut cur_row = vec![0u8; columns];
        for i in 0..columns {
            let x = enc[i] as i32;
            let a = if i == 0 { 0 } else { cur_row[i - 1] as i32 };
            let b = prev_row[i] as i32;
            let c = if i == 0 { 0 } else { prev_row[i - 1] as i32 };
            let recon = match tag {
                PredictorTag::None => x,
                PredictorTag::Sub => x + a,
                PredictorTag::Up => x + b,
                PredictorTag::Average => x + (a + b) / 2,
                PredictorTag::Paeth => x + paeth(a, b, c),
            };
            cur_row[i] = (recon & 0xff) as u8;
        }
        out.extend_from_slice(&cur_row);
        prev_row = cur_row;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8 "XRef stream decoding": `/W = [1 2 1]`, `/Predictor 12`,
    /// `/Columns 4`; row `{02 00 05 07 03}` against a synthetic all-zero
    /// previous row. The leading byte is the PNG row-filter tag (2 = Up
    /// in the standard PNG numbering this crate follows), not the decoded
    /// xref `type` field — with an all-zero previous row, Up-reversal is
    /// the identity, so the four content bytes decode unchanged and split
    /// into `type=0, obj_id=1287, gen=3` (see DESIGN.md's Open Question
    /// notes for why `type` isn't 2 here).
    #[test]
    fn paeth_row_matches_fixture_vector() {
        let row = [0x02u8, 0x00, 0x05, 0x07, 0x03];
        let decoded = reverse_png_predictor(&row, 4).unwrap();
        assert_eq!(decoded, vec![0x00, 0x05, 0x07, 0x03]);
        let obj_type = decoded[0];
        let obj_id = u16::from_be_bytes([decoded[1], decoded[2]]);
        let gen = decoded[3];
        assert_eq!(obj_type, 0);
        assert_eq!(obj_id, 1287);
        assert_eq!(gen, 3);
    }

    #[test]
    fn none_predictor_is_identity() {
        let row = [0x00u8, 1, 2, 3, 4];
        assert_eq!(reverse_png_predictor(&row, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn columns_out_of_range_is_unsupported() {
        let row = [0u8; 6];
        assert!(reverse_png_predictor(&row, 5).is_err());
    }
}
