//! Spectrum file decoding.
//!
//! A decoder turns a path into a validated [`SpectrumRecord`]. The column
//! layout depends on the data release named in the `DATA_V` header:
//!
//! - releases before DR8 (layout A): `Flux, Inverse, Wavelength, Andmask, Ormask`
//! - DR8 and later (layout B): the same five plus `Normalization`
//!
//! [`TextSpectrumDecoder`] reads a plain-text rendition of those files:
//!
//! ```text
//! # FILENAME = 'spec-55859-F5902_sp01-001.fits'
//! # DATA_V = 'LAMOST DR5'
//! # Z = 0.0012
//! 1.0 1.1 1.2 ...        <- layout A: one line per column
//! 4.0 4.1 4.2 ...
//! ...
//! ```
//!
//! Layout B files instead carry one comma-separated row of six values per pixel.

use std::path::Path;

use crate::domain::{Header, HeaderValue, KEY_FILENAME, SpectrumRecord};
use crate::error::AppError;

/// Release number at which files switch to layout B.
pub const LAYOUT_B_FIRST_RELEASE: u32 = 8;

/// Turns a spectrum file into a record.
pub trait SpectrumDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<SpectrumRecord, AppError>;
}

/// Column layout of a decoded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Flux, Inverse, Wavelength, Andmask, Ormask.
    A,
    /// Layout A plus Normalization.
    B,
}

impl Layout {
    pub fn for_release(dr: u32) -> Self {
        if dr < LAYOUT_B_FIRST_RELEASE { Layout::A } else { Layout::B }
    }

    pub fn column_count(self) -> usize {
        match self {
            Layout::A => 5,
            Layout::B => 6,
        }
    }
}

const COL_FLUX: usize = 0;
const COL_WAVELENGTH: usize = 2;
const COL_ANDMASK: usize = 3;
const COL_ORMASK: usize = 4;

/// Decoder for the text rendition of survey spectrum files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSpectrumDecoder {
    /// Accept spectra with nonzero `Andmask`/`Ormask` pixels.
    pub ignore_mask: bool,
}

impl TextSpectrumDecoder {
    pub fn new(ignore_mask: bool) -> Self {
        Self { ignore_mask }
    }

    /// Decode file contents; `source` names the file in errors and fills a missing `FILENAME`.
    pub fn decode_str(&self, text: &str, source: &str) -> Result<SpectrumRecord, AppError> {
        let mut header = Header::new();
        let mut data_lines: Vec<(usize, &str)> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(entry) = line.strip_prefix('#') {
                let Some((key, value)) = entry.split_once('=') else {
                    continue;
                };
                let key = key.trim();
                if !key.is_empty() {
                    header.insert(key, HeaderValue::parse(value));
                }
                continue;
            }
            data_lines.push((idx + 1, line));
        }

        if header.file_name().is_none() {
            header.insert(KEY_FILENAME, source);
        }

        let dr = header
            .dr_number()
            .map_err(|e| AppError::decode(format!("{source}: {}", e.message())))?;
        let layout = Layout::for_release(dr);
        let mut columns = match layout {
            Layout::A => column_major(&data_lines, layout, source)?,
            Layout::B => row_major(&data_lines, layout, source)?,
        };

        if !self.ignore_mask {
            check_mask(&columns[COL_ANDMASK], "Andmask", source)?;
            check_mask(&columns[COL_ORMASK], "Ormask", source)?;
        }

        let flux = std::mem::take(&mut columns[COL_FLUX]);
        let wavelength = std::mem::take(&mut columns[COL_WAVELENGTH]);
        SpectrumRecord::new(header, wavelength, flux)
            .map_err(|e| AppError::new(e.kind(), format!("{source}: {}", e.message())))
    }
}

impl SpectrumDecoder for TextSpectrumDecoder {
    fn decode(&self, path: &Path) -> Result<SpectrumRecord, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(format!("Failed to read spectrum '{}': {e}", path.display())))?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.decode_str(&text, &source)
    }
}

fn split_values(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

fn parse_value(token: &str, line_no: usize, source: &str) -> Result<f64, AppError> {
    token
        .parse::<f64>()
        .map_err(|_| AppError::decode(format!("{source}: line {line_no}: '{token}' is not a number.")))
}

/// Layout A: one data line per column.
fn column_major(lines: &[(usize, &str)], layout: Layout, source: &str) -> Result<Vec<Vec<f64>>, AppError> {
    let expected = layout.column_count();
    if lines.len() != expected {
        return Err(AppError::decode(format!(
            "{source}: layout {layout:?} needs {expected} data lines, found {}.",
            lines.len()
        )));
    }

    let mut columns = Vec::with_capacity(expected);
    for &(line_no, line) in lines {
        let values = split_values(line)
            .map(|tok| parse_value(tok, line_no, source))
            .collect::<Result<Vec<f64>, AppError>>()?;
        columns.push(values);
    }

    let n = columns[0].len();
    if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != n) {
        return Err(AppError::decode(format!(
            "{source}: column {i} has {} values, expected {n}.",
            col.len()
        )));
    }
    Ok(columns)
}

/// Layout B: one comma-separated row per pixel.
fn row_major(lines: &[(usize, &str)], layout: Layout, source: &str) -> Result<Vec<Vec<f64>>, AppError> {
    let expected = layout.column_count();
    let mut columns = vec![Vec::with_capacity(lines.len()); expected];

    for &(line_no, line) in lines {
        let values = split_values(line)
            .map(|tok| parse_value(tok, line_no, source))
            .collect::<Result<Vec<f64>, AppError>>()?;
        if values.len() != expected {
            return Err(AppError::decode(format!(
                "{source}: line {line_no}: layout {layout:?} rows have {expected} values, found {}.",
                values.len()
            )));
        }
        for (col, v) in columns.iter_mut().zip(values) {
            col.push(v);
        }
    }
    Ok(columns)
}

fn check_mask(mask: &[f64], name: &str, source: &str) -> Result<(), AppError> {
    let flagged = mask.iter().filter(|&&v| v != 0.0).count();
    if flagged > 0 {
        return Err(AppError::quality_flag(format!(
            "{source}: {flagged} pixel(s) flagged in {name}."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SpectrumSource;
    use crate::error::ErrorKind;

    const LAYOUT_A: &str = "\
# FILENAME = 'spec-a.fits'
# DATA_V = 'LAMOST DR5'
# Z = 0.001
1.0 2.0 3.0
0.1 0.1 0.1
4000 4001 4002
0 0 0
0 0 0
";

    const LAYOUT_B: &str = "\
# DATA_V = 'LAMOST DR9'
# Z = -0.0005
1.0, 0.1, 4000.0, 0, 0, 1.0
2.0, 0.1, 4001.0, 0, 0, 1.0
3.0, 0.1, 4002.0, 0, 0, 1.0
4.0, 0.1, 4003.0, 0, 0, 1.0
";

    #[test]
    fn layout_follows_release_number() {
        assert_eq!(Layout::for_release(5), Layout::A);
        assert_eq!(Layout::for_release(7), Layout::A);
        assert_eq!(Layout::for_release(8), Layout::B);
        assert_eq!(Layout::for_release(10), Layout::B);
    }

    #[test]
    fn decodes_layout_a() {
        let record = TextSpectrumDecoder::default().decode_str(LAYOUT_A, "a.txt").unwrap();
        assert_eq!(record.wavelength(), &[4000.0, 4001.0, 4002.0]);
        assert_eq!(record.flux(), &[1.0, 2.0, 3.0]);
        assert_eq!(record.identifier(), Some("spec-a.fits"));
        assert_eq!(record.header().dr_number().unwrap(), 5);
    }

    #[test]
    fn decodes_layout_b_and_fills_file_name() {
        let record = TextSpectrumDecoder::default().decode_str(LAYOUT_B, "b.txt").unwrap();
        assert_eq!(record.len(), 4);
        assert_eq!(record.flux()[3], 4.0);
        assert_eq!(record.identifier(), Some("b.txt"));
        assert!((record.header().redshift().unwrap() + 0.0005).abs() < 1e-15);
    }

    #[test]
    fn missing_release_number_is_decode_error() {
        let text = LAYOUT_A.replace("LAMOST DR5", "LAMOST");
        let err = TextSpectrumDecoder::default().decode_str(&text, "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn flagged_pixels_fail_unless_ignored() {
        let text = LAYOUT_B.replace("4001.0, 0, 0", "4001.0, 0, 4");
        let err = TextSpectrumDecoder::default().decode_str(&text, "b.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QualityFlag);
        assert!(err.message().contains("Ormask"));

        let record = TextSpectrumDecoder::new(true).decode_str(&text, "b.txt").unwrap();
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn malformed_rows_are_decode_errors() {
        let short_row = LAYOUT_B.replace("2.0, 0.1, 4001.0, 0, 0, 1.0", "2.0, 0.1, 4001.0");
        let err = TextSpectrumDecoder::default().decode_str(&short_row, "b.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let bad_number = LAYOUT_A.replace("4001", "40x1");
        let err = TextSpectrumDecoder::default().decode_str(&bad_number, "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let missing_column = LAYOUT_A.replace("0.1 0.1 0.1\n", "");
        let err = TextSpectrumDecoder::default().decode_str(&missing_column, "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn decreasing_wavelength_is_invalid_spectrum() {
        let text = LAYOUT_A.replace("4000 4001 4002", "4002 4001 4000");
        let err = TextSpectrumDecoder::default().decode_str(&text, "a.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSpectrum);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("cmost-does-not-exist-7f3a.txt");
        let err = TextSpectrumDecoder::default().decode(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
