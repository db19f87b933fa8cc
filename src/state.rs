//! Modal state of a gerber replay.

use gerber_types::{CoordinateOffset, Coordinates, InterpolationMode, Polarity, QuadrantMode};

use crate::contour::BoundarySegments;
use crate::geometry::ArcDirection;
use crate::types::Effect;
use crate::{Position, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// No G01/G02/G03 seen yet.
    Undefined,
    Linear,
    Circular(ArcDirection),
}

impl From<InterpolationMode> for Interpolation {
    fn from(mode: InterpolationMode) -> Self {
        match mode {
            InterpolationMode::Linear => Interpolation::Linear,
            InterpolationMode::ClockwiseCircular => Interpolation::Circular(ArcDirection::Clockwise),
            InterpolationMode::CounterclockwiseCircular => Interpolation::Circular(ArcDirection::CounterClockwise),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ContourMode {
    #[default]
    Off,
    /// G36 seen, holds the segments of the region being traced.
    On(BoundarySegments),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterpretationState {
    pub aperture: Option<i32>,
    pub polarity: Polarity,
    pub interpolation: Interpolation,
    pub quadrant_mode: QuadrantMode,
    /// Current point in file units.
    pub position: Position,
    pub contour: ContourMode,
}

impl Default for InterpretationState {
    fn default() -> Self {
        Self {
            aperture: None,
            polarity: Polarity::Dark,
            interpolation: Interpolation::Undefined,
            quadrant_mode: QuadrantMode::Single,
            position: Position::origin(),
            contour: ContourMode::Off,
        }
    }
}

impl InterpretationState {
    /// Coordinates are modal, a missing axis keeps the current value.
    pub fn target(&self, coordinates: &Coordinates) -> Position {
        Position::new(
            coordinates
                .x
                .map(|value| value.into())
                .unwrap_or(self.position.x),
            coordinates
                .y
                .map(|value| value.into())
                .unwrap_or(self.position.y),
        )
    }

    /// I/J offsets default to 0 when only one is given.
    pub fn center_offset(offset: &CoordinateOffset) -> Vector {
        Vector::new(
            offset
                .x
                .map(|value| value.into())
                .unwrap_or(0.0),
            offset
                .y
                .map(|value| value.into())
                .unwrap_or(0.0),
        )
    }

    pub fn effect(&self) -> Effect {
        Effect::from_polarity(self.polarity)
    }

    pub fn is_multi_quadrant(&self) -> bool {
        matches!(self.quadrant_mode, QuadrantMode::Multiple)
    }

    pub fn in_region(&self) -> bool {
        matches!(self.contour, ContourMode::On(_))
    }

    pub fn region_mut(&mut self) -> Option<&mut BoundarySegments> {
        match &mut self.contour {
            ContourMode::On(segments) => Some(segments),
            ContourMode::Off => None,
        }
    }

    /// Takes the segments traced so far, leaving region mode on with an empty segment list.
    pub fn take_region(&mut self) -> Option<BoundarySegments> {
        self.region_mut()
            .map(std::mem::take)
    }

    /// Leaves region mode, returning the unfilled segments.
    pub fn end_region(&mut self) -> Option<BoundarySegments> {
        match std::mem::take(&mut self.contour) {
            ContourMode::On(segments) => Some(segments),
            ContourMode::Off => None,
        }
    }
}
