use std::fmt;

/// Errors surfaced to the host. None of these are recoverable inside the
/// core: a failed load leaves the previous cartridge in place, and a failed
/// state restore leaves the running state untouched.
#[derive(Debug)]
pub enum Error {
    /// Provided image is shorter than the 16-byte header.
    TooShort { actual: usize },
    /// Magic number ("NES<EOF>") is missing.
    InvalidMagic,
    /// UNIF images are detected but not supported.
    UnifUnsupported,
    /// Header advertises a mapper number that this core does not implement.
    UnsupportedMapper(u16),
    /// A ROM section (PRG/CHR) is shorter than the header advertises.
    SectionTooShort {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A save-state blob failed to decode or did not match the machine shape.
    BadState,
    /// The operation requires a loaded cartridge.
    NoCart,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { actual } => {
                write!(f, "ROM image is {actual} bytes, smaller than the header")
            }
            Self::InvalidMagic => write!(f, "bad iNES header"),
            Self::UnifUnsupported => write!(f, "UNIF format unsupported"),
            Self::UnsupportedMapper(mapper) => write!(f, "mapper {mapper} is unsupported"),
            Self::SectionTooShort {
                section,
                expected,
                actual,
            } => write!(
                f,
                "{section} section expected {expected} bytes, got {actual}"
            ),
            Self::BadState => write!(f, "save state does not match this machine"),
            Self::NoCart => write!(f, "no cartridge loaded"),
        }
    }
}

impl std::error::Error for Error {}
