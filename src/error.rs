//! Crate-wide error type.
//!
//! Every failure carries:
//! - an [`ErrorKind`] so callers (and the batch orchestrator) can branch on it
//! - a process exit code for the `cmost` binary
//! - a human-readable message

/// Machine-distinguishable failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unsupported spectrum file.
    Decode,
    /// Nonzero `Andmask`/`Ormask` pixels without an opt-out.
    QualityFlag,
    /// `|z|` at or beyond the safety threshold.
    UnusualRedshift,
    /// Index table or pipeline settings are malformed.
    Configuration,
    /// Degenerate or inconsistent spectrum arrays.
    InvalidSpectrum,
    /// Zero-width window or zero continuum.
    DivisionByZero,
    /// A band boundary lies outside the spectrum's wavelength coverage.
    BandOutOfRange,
    /// The continuum fit ran out of usable points.
    InsufficientData,
    /// Filesystem errors.
    Io,
    /// A batch unit panicked.
    Panic,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Decode => "decode",
            ErrorKind::QualityFlag => "quality_flag",
            ErrorKind::UnusualRedshift => "unusual_redshift",
            ErrorKind::Configuration => "configuration",
            ErrorKind::InvalidSpectrum => "invalid_spectrum",
            ErrorKind::DivisionByZero => "division_by_zero",
            ErrorKind::BandOutOfRange => "band_out_of_range",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::Io => "io",
            ErrorKind::Panic => "panic",
        }
    }

    /// Numeric failures raised while measuring a spectrum.
    pub fn is_numeric(self) -> bool {
        matches!(self, ErrorKind::DivisionByZero | ErrorKind::BandOutOfRange)
    }

    fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration | ErrorKind::Io => 2,
            ErrorKind::Decode | ErrorKind::QualityFlag | ErrorKind::InvalidSpectrum => 3,
            ErrorKind::UnusualRedshift
            | ErrorKind::DivisionByZero
            | ErrorKind::BandOutOfRange
            | ErrorKind::InsufficientData => 4,
            ErrorKind::Panic => 5,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exit_code: kind.exit_code(),
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Decode, message)
    }

    pub fn quality_flag(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QualityFlag, message)
    }

    pub fn unusual_redshift(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnusualRedshift, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn invalid_spectrum(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSpectrum, message)
    }

    pub fn division_by_zero(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DivisionByZero, message)
    }

    pub fn band_out_of_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BandOutOfRange, message)
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientData, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
