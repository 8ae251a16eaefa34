//! Iso-surfaces and plane contour maps extracted from volumetric scalar
//! fields, with a compact JVXL exchange format.
//!
//! ```text
//! SurfaceRequest ─ FieldKind::generate ─┬─ MarchingCubes ─┬─ ColorMapper ─ Surface ─ JvxlWriter
//!                                       └─ ContourEngine ─┘
//! ```

pub mod color;
pub mod contour;
pub mod error;
pub mod field;
pub mod grid;
pub mod interp;
pub mod jvxl;
pub mod marching_cubes;
pub mod mesh;
#[cfg(feature = "bevy")]
pub mod plugin;
pub mod request;
pub mod surface;
pub mod tables;
pub mod types;
pub mod utils;

pub use color::{ColorMapper, ColorScheme, PhaseFunction, Ramp};
pub use contour::{ContourEngine, ContourLevels, PixelGrid};
pub use error::{Result, SurfaceError};
pub use field::{FieldKind, ScalarField, VoxelSource};
pub use grid::VolumetricGrid;
pub use jvxl::{JvxlDocument, JvxlReader, JvxlWriter};
pub use marching_cubes::MarchingCubes;
pub use mesh::IsoMesh;
#[cfg(feature = "bevy")]
pub use plugin::IsosurfacePlugin;
pub use request::SurfaceRequest;
pub use surface::{Extraction, Surface};
pub use types::{Atom, CutoffPolicy, Plane, Point, Value, Vector};
