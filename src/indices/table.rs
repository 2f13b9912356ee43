//! Lick index band definitions.
//!
//! Two on-disk formats are accepted:
//!
//! - the whitespace-separated reference table (first line skipped, columns in a
//!   fixed order: `No.`, six band edges, `Units`, `name`)
//! - a CSV file with a header row naming the same columns in any order
//!
//! The standard 25-band Lick/IDS table ships with the crate and is parsed once
//! on first use ([`IndexTable::builtin`]).

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use log::debug;
use serde::Serialize;

use crate::error::AppError;

const BUILTIN_TABLE: &str = include_str!("../../assets/lick_indices.table");

static BUILTIN: OnceLock<Result<IndexTable, AppError>> = OnceLock::new();

/// Column names every index table must provide (besides the optional record number).
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "index_band_start",
    "index_band_end",
    "blue_continuum_start",
    "blue_continuum_end",
    "red_continuum_start",
    "red_continuum_end",
    "units",
    "name",
];

/// Number of whitespace-separated fields per row in the reference format.
const REFERENCE_FIELDS: usize = REQUIRED_COLUMNS.len() + 1;

/// How an index value is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexUnits {
    /// Equivalent width in Å (code `0`).
    EquivalentWidth,
    /// Magnitude (code `1`).
    Magnitude,
}

impl IndexUnits {
    pub fn from_code(code: f64) -> Option<Self> {
        if code == 0.0 {
            Some(IndexUnits::EquivalentWidth)
        } else if code == 1.0 {
            Some(IndexUnits::Magnitude)
        } else {
            None
        }
    }

    pub fn code(self) -> u8 {
        match self {
            IndexUnits::EquivalentWidth => 0,
            IndexUnits::Magnitude => 1,
        }
    }
}

/// A closed wavelength interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

impl Window {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// One named index: the feature band and its two flanking continuum windows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBandDefinition {
    pub name: String,
    pub index_band: Window,
    pub blue_continuum: Window,
    pub red_continuum: Window,
    pub units: IndexUnits,
}

/// Ordered, immutable collection of band definitions with unique names.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTable {
    definitions: Vec<IndexBandDefinition>,
}

impl IndexTable {
    pub fn from_definitions(definitions: Vec<IndexBandDefinition>) -> Result<Self, AppError> {
        if definitions.is_empty() {
            return Err(AppError::configuration(format!(
                "Index table has no usable rows; expected columns: {}.",
                expected_columns()
            )));
        }
        let mut seen = HashSet::new();
        for def in &definitions {
            if !seen.insert(def.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "Duplicate index name '{}' in index table.",
                    def.name
                )));
            }
        }
        Ok(Self { definitions })
    }

    /// The embedded Lick/IDS table, parsed once per process.
    pub fn builtin() -> Result<&'static IndexTable, AppError> {
        BUILTIN
            .get_or_init(|| IndexTable::parse_reference(BUILTIN_TABLE))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Load a table from disk: `.csv` files by header name, anything else as the reference format.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut file = File::open(path)
            .map_err(|e| AppError::io(format!("Failed to open index table '{}': {e}", path.display())))?;
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

        if is_csv {
            return Self::from_csv_reader(file);
        }

        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| AppError::io(format!("Failed to read index table '{}': {e}", path.display())))?;
        Self::parse_reference(&text)
    }

    /// Parse the whitespace-separated reference format.
    ///
    /// The first line is a header/comment and is skipped. Rows with missing
    /// fields are dropped; rows with unparsable or extra fields are rejected.
    pub fn parse_reference(text: &str) -> Result<Self, AppError> {
        let mut definitions = Vec::new();

        for (idx, line) in text.lines().enumerate().skip(1) {
            let line_no = idx + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() < REFERENCE_FIELDS {
                debug!("index table line {line_no}: dropping row with {} fields", fields.len());
                continue;
            }
            if fields.len() > REFERENCE_FIELDS {
                return Err(AppError::configuration(format!(
                    "Index table line {line_no} has {} fields; expected columns: No. {}.",
                    fields.len(),
                    expected_columns()
                )));
            }
            definitions.push(parse_definition(&fields[1..], line_no)?);
        }

        Self::from_definitions(definitions)
    }

    /// Parse a CSV table whose header names the required columns (any order, case-insensitive).
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| AppError::configuration(format!("Failed to read index table header: {e}")))?
            .clone();
        let header_map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), i))
            .collect();

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !header_map.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::configuration(format!(
                "Index table is missing column(s) {}; expected columns: {}.",
                missing.join(", "),
                expected_columns()
            )));
        }

        let mut definitions = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let line_no = idx + 2;
            let record = record
                .map_err(|e| AppError::configuration(format!("Index table line {line_no}: {e}")))?;
            let fields: Vec<&str> = REQUIRED_COLUMNS
                .iter()
                .map(|c| record.get(header_map[*c]).unwrap_or(""))
                .collect();
            if fields.iter().any(|f| f.is_empty()) {
                debug!("index table line {line_no}: dropping row with empty fields");
                continue;
            }
            definitions.push(parse_definition(&fields, line_no)?);
        }

        Self::from_definitions(definitions)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexBandDefinition> {
        self.definitions.iter()
    }

    pub fn get(&self, name: &str) -> Option<&IndexBandDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.name.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a IndexTable {
    type Item = &'a IndexBandDefinition;
    type IntoIter = std::slice::Iter<'a, IndexBandDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn expected_columns() -> String {
    REQUIRED_COLUMNS.join(", ")
}

/// Parse the eight value fields, ordered as [`REQUIRED_COLUMNS`].
fn parse_definition(fields: &[&str], line_no: usize) -> Result<IndexBandDefinition, AppError> {
    let number = |i: usize| -> Result<f64, AppError> {
        fields[i]
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                AppError::configuration(format!(
                    "Index table line {line_no}: column '{}' has non-numeric value '{}'; expected columns: {}.",
                    REQUIRED_COLUMNS[i],
                    fields[i],
                    expected_columns()
                ))
            })
    };

    let units_code = number(6)?;
    let units = IndexUnits::from_code(units_code).ok_or_else(|| {
        AppError::configuration(format!(
            "Index table line {line_no}: units must be 0 (equivalent width) or 1 (magnitude), got {units_code}."
        ))
    })?;

    Ok(IndexBandDefinition {
        name: fields[7].to_string(),
        index_band: Window::new(number(0)?, number(1)?),
        blue_continuum: Window::new(number(2)?, number(3)?),
        red_continuum: Window::new(number(4)?, number(5)?),
        units,
    })
}
