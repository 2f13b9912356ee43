//! Shared domain types.
//!
//! A spectrum travels through the pipeline as an immutable [`SpectrumRecord`].
//! Transform stages never mutate a record in place; they build a new one and
//! share the header by reference count, so records can be handed to worker
//! threads without aliasing concerns.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Header key holding the redshift.
pub const KEY_REDSHIFT: &str = "Z";
/// Header key holding the source file name.
pub const KEY_FILENAME: &str = "FILENAME";
/// Header key holding the data-release version string (e.g. `LAMOST DR9`).
pub const KEY_DATA_VERSION: &str = "DATA_V";
pub const KEY_CLASS: &str = "CLASS";
pub const KEY_SUBCLASS: &str = "SUBCLASS";
pub const KEY_OBSID: &str = "OBSID";

/// A scalar header value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    /// Parse a raw header token.
    ///
    /// Quoted tokens are always text; `T`/`F` follow the FITS boolean convention.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return HeaderValue::Text(raw[1..raw.len() - 1].trim().to_string());
        }
        match raw {
            "T" => return HeaderValue::Bool(true),
            "F" => return HeaderValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = raw.parse::<i64>() {
            return HeaderValue::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return HeaderValue::Float(v);
        }
        HeaderValue::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Text(s) => s.trim().parse::<f64>().ok(),
            HeaderValue::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderValue::Bool(v) => write!(f, "{}", if *v { "T" } else { "F" }),
            HeaderValue::Int(v) => write!(f, "{v}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Float(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

/// Ordered header map (string keys to scalar values).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    entries: BTreeMap<String, HeaderValue>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.entries.iter()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.get(KEY_FILENAME).and_then(HeaderValue::as_str)
    }

    /// Redshift `Z`, required by the redshift corrector.
    pub fn redshift(&self) -> Result<f64, AppError> {
        let value = self.get(KEY_REDSHIFT).ok_or_else(|| {
            AppError::invalid_spectrum(format!(
                "Header of '{}' has no '{KEY_REDSHIFT}' (redshift) entry.",
                self.file_name().unwrap_or("<unnamed>")
            ))
        })?;
        value
            .as_f64()
            .filter(|z| z.is_finite())
            .ok_or_else(|| {
                AppError::invalid_spectrum(format!(
                    "Header '{KEY_REDSHIFT}' of '{}' is not a finite number: {value}",
                    self.file_name().unwrap_or("<unnamed>")
                ))
            })
    }

    pub fn data_version(&self) -> Option<&str> {
        self.get(KEY_DATA_VERSION).and_then(HeaderValue::as_str)
    }

    /// Data-release number parsed from the integer following `DR` in `DATA_V`.
    pub fn dr_number(&self) -> Result<u32, AppError> {
        let version = self.data_version().ok_or_else(|| {
            AppError::decode(format!("Header has no '{KEY_DATA_VERSION}' entry."))
        })?;
        parse_dr_number(version).ok_or_else(|| {
            AppError::decode(format!(
                "DR number not found in {KEY_DATA_VERSION} '{version}'."
            ))
        })
    }

    pub fn class(&self) -> Option<&str> {
        self.get(KEY_CLASS).and_then(HeaderValue::as_str)
    }

    pub fn subclass(&self) -> Option<&str> {
        self.get(KEY_SUBCLASS).and_then(HeaderValue::as_str)
    }

    pub fn obsid(&self) -> Option<&HeaderValue> {
        self.get(KEY_OBSID)
    }
}

/// Extract the (one or two digit) integer that follows the literal `DR`.
pub fn parse_dr_number(version: &str) -> Option<u32> {
    let mut rest = version;
    while let Some(pos) = rest.find("DR") {
        let tail = &rest[pos + 2..];
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).take(2).collect();
        if !digits.is_empty() {
            return digits.parse().ok();
        }
        rest = tail;
    }
    None
}

/// Anything that exposes a wavelength grid and matching flux values.
///
/// Measurements (`indices`, `fit`) accept this instead of a concrete type so
/// both decoded records and bare two-column tables can be measured.
pub trait SpectrumSource {
    fn wavelength(&self) -> &[f64];
    fn flux(&self) -> &[f64];

    fn len(&self) -> usize {
        self.wavelength().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check the array invariants shared by every spectrum representation.
pub fn validate_arrays(wavelength: &[f64], flux: &[f64]) -> Result<(), AppError> {
    if wavelength.len() != flux.len() {
        return Err(AppError::invalid_spectrum(format!(
            "Wavelength and flux lengths differ ({} vs {}).",
            wavelength.len(),
            flux.len()
        )));
    }
    if wavelength.len() < 2 {
        return Err(AppError::invalid_spectrum(format!(
            "A spectrum needs at least 2 samples, got {}.",
            wavelength.len()
        )));
    }
    if let Some(bad) = wavelength.iter().position(|w| !w.is_finite()) {
        return Err(AppError::invalid_spectrum(format!(
            "Non-finite wavelength at index {bad}."
        )));
    }
    if let Some(i) = wavelength.windows(2).position(|w| w[1] <= w[0]) {
        return Err(AppError::invalid_spectrum(format!(
            "Wavelength must be strictly increasing (index {}: {} -> {}).",
            i + 1,
            wavelength[i],
            wavelength[i + 1]
        )));
    }
    Ok(())
}

/// An immutable spectrum: wavelength grid, flux, and header.
#[derive(Debug, Clone)]
pub struct SpectrumRecord {
    header: Arc<Header>,
    wavelength: Arc<[f64]>,
    flux: Arc<[f64]>,
}

impl SpectrumRecord {
    pub fn new(header: Header, wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self, AppError> {
        validate_arrays(&wavelength, &flux)?;
        Ok(Self {
            header: Arc::new(header),
            wavelength: wavelength.into(),
            flux: flux.into(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Identifier used in batch tables: `FILENAME` when present.
    pub fn identifier(&self) -> Option<&str> {
        self.header.file_name()
    }

    /// New record on the same grid with replaced flux.
    pub(crate) fn with_flux(&self, flux: Vec<f64>) -> Result<Self, AppError> {
        if flux.len() != self.wavelength.len() {
            return Err(AppError::invalid_spectrum(format!(
                "Replacement flux has {} samples, grid has {}.",
                flux.len(),
                self.wavelength.len()
            )));
        }
        Ok(Self {
            header: Arc::clone(&self.header),
            wavelength: Arc::clone(&self.wavelength),
            flux: flux.into(),
        })
    }

    /// New record on a different grid (validated).
    pub(crate) fn with_grid(&self, wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self, AppError> {
        validate_arrays(&wavelength, &flux)?;
        Ok(Self {
            header: Arc::clone(&self.header),
            wavelength: wavelength.into(),
            flux: flux.into(),
        })
    }
}

impl SpectrumSource for SpectrumRecord {
    fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    fn flux(&self) -> &[f64] {
        &self.flux
    }
}

/// A bare two-column (`Wavelength`, `Flux`) table without a header.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumTable {
    wavelength: Vec<f64>,
    flux: Vec<f64>,
}

impl SpectrumTable {
    pub fn from_columns(wavelength: Vec<f64>, flux: Vec<f64>) -> Result<Self, AppError> {
        validate_arrays(&wavelength, &flux)?;
        Ok(Self { wavelength, flux })
    }

    pub fn from_rows(rows: &[(f64, f64)]) -> Result<Self, AppError> {
        let (wavelength, flux) = rows.iter().copied().unzip();
        Self::from_columns(wavelength, flux)
    }

    /// Wrap the table as a record with the given header.
    pub fn into_record(self, header: Header) -> Result<SpectrumRecord, AppError> {
        SpectrumRecord::new(header, self.wavelength, self.flux)
    }
}

impl SpectrumSource for SpectrumTable {
    fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }

    fn flux(&self) -> &[f64] {
        &self.flux
    }
}
