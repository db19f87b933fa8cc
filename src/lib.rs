mod aperture;
mod config;
mod contour;
mod error;
mod expressions;
mod geometry;
mod isoplot;
mod layer;
mod macros;
mod replay;
mod spacial;
mod state;
mod types;

pub use aperture::{obround_vertices, ApertureShape, ApertureTable, FlashPrimitive, ShapePrimitive};
pub use config::{mm_per_unit, ConversionConfig, PlotScale, MM_PER_INCH};
pub use contour::{BoundarySegment, BoundarySegments};
pub use error::{ApertureError, ConversionError, IsoPlotError};
pub use geometry::*;
/// re-export 'gerber_parser' crate
#[cfg(feature = "parser")]
pub use gerber_parser;
/// re-export 'gerber_types' crate
#[cfg(feature = "types")]
pub use gerber_types;
pub use isoplot::{
    BuilderId, BuilderObject, Cell, CellRect, FillMode, IdSet, IsoPlot, ObjectKind, PlotArc, PlotPoint, Usage, UsageTag,
};
pub use layer::*;
pub use macros::{MacroAperture, MacroPrimitive, MacroShape};
pub use replay::{DCodeOperation, DCodeRecord, GerberStatement, Replayer};
pub use spacial::*;
pub use state::{ContourMode, Interpolation, InterpretationState};
pub use types::{Effect, Exposure};

#[cfg(feature = "testing")]
pub mod testing;
