use derive_more::{Display, From};

pub type Result<T> = core::result::Result<T, SurfaceError>;

/// Failures surfaced to the caller.
///
/// Configuration variants are raised before any grid is allocated and abort
/// the whole request. Geometry problems never show up here: they are patched
/// locally and reported through `tracing`.
#[derive(Debug, Display, From)]
pub enum SurfaceError {
    #[display("invalid quantum numbers n={n} l={l} m={m} (need |m| <= l < n <= 9)")]
    InvalidQuantumNumbers { n: i32, l: i32, m: i32 },
    #[display("nuclear charge must be positive, got {_0}")]
    InvalidNuclearCharge(f32),
    #[display("molecular orbital coefficients are required")]
    MissingCoefficients,
    #[display("partial charges are required for an electrostatic potential")]
    MissingCharges,
    #[display("no orbital evaluator was supplied")]
    MissingEvaluator,
    #[display("this field kind needs at least one atom")]
    MissingAtoms,
    #[display("plane has a zero or non-finite normal")]
    InvalidPlane,
    #[display("ellipsoid parameters are malformed")]
    InvalidEllipsoid,
    #[display("grid is empty or its axes are degenerate")]
    InvalidGrid,
    #[display("resolution must be positive and finite, got {_0}")]
    InvalidResolution(f32),
    #[display("unknown color scheme '{_0}'")]
    UnknownColorScheme(String),
    #[display("line {line}: {reason}")]
    DataRead { line: usize, reason: String },
    #[display("unexpected end of data")]
    UnexpectedEndOfData,
    #[display("surface {requested} requested but the stream holds {available}")]
    SurfaceIndexOutOfRange { requested: usize, available: usize },
    #[display("there are no surfaces to encode")]
    NoSurfaces,
    #[display("triangle refers to vertex {index} but the mesh has {vertex_count}")]
    InvalidTriangle { index: usize, vertex_count: usize },
    #[display("{_0}")]
    #[from]
    Io(std::io::Error),
}

impl std::error::Error for SurfaceError {}

impl SurfaceError {
    pub(crate) fn data(line: usize, reason: impl Into<String>) -> Self {
        Self::DataRead {
            line,
            reason: reason.into(),
        }
    }

    /// `true` for the errors that reject a request before any computation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantumNumbers { .. }
                | Self::InvalidNuclearCharge(_)
                | Self::MissingCoefficients
                | Self::MissingCharges
                | Self::MissingEvaluator
                | Self::MissingAtoms
                | Self::InvalidPlane
                | Self::InvalidEllipsoid
                | Self::InvalidGrid
                | Self::InvalidResolution(_)
                | Self::UnknownColorScheme(_)
        )
    }
}
