use gerber_types::Unit;
use log::debug;
use nalgebra::Point2;

use crate::error::ConversionError;
use crate::geometry::BoundingBox;
use crate::isoplot::PlotPoint;
use crate::Position;

pub const MM_PER_INCH: f64 = 25.4;

/// 50M cells, about 70x70mm at the default resolution.
pub const DEFAULT_MAX_GRID_CELLS: usize = 50_000_000;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionConfig {
    /// Plot resolution, 100 cells per mm gives 10µm cells.
    pub cells_per_mm: f64,
    /// Added to every stroke width and flash outer extent, subtracted from hole diameters.
    pub xy_compensation_mm: f64,
    /// Empty border around the drawing extent.
    pub margin_cells: u32,
    /// Maximum number of cells a single flood fill may claim.
    pub fill_limit: Option<usize>,
    /// Largest grid, in cells, a conversion may allocate.
    pub max_grid_cells: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            cells_per_mm: 100.0,
            xy_compensation_mm: 0.0,
            margin_cells: 10,
            fill_limit: None,
            max_grid_cells: DEFAULT_MAX_GRID_CELLS,
        }
    }
}

impl ConversionConfig {
    pub fn with_cells_per_mm(self, cells_per_mm: f64) -> Self {
        Self {
            cells_per_mm,
            ..self
        }
    }

    pub fn with_xy_compensation_mm(self, xy_compensation_mm: f64) -> Self {
        Self {
            xy_compensation_mm,
            ..self
        }
    }

    pub fn with_margin_cells(self, margin_cells: u32) -> Self {
        Self {
            margin_cells,
            ..self
        }
    }

    pub fn with_fill_limit(self, fill_limit: Option<usize>) -> Self {
        Self {
            fill_limit,
            ..self
        }
    }

    pub fn with_max_grid_cells(self, max_grid_cells: usize) -> Self {
        Self {
            max_grid_cells,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConversionError> {
        if !self.cells_per_mm.is_finite() || self.cells_per_mm <= 0.0 {
            return Err(ConversionError::InvalidConfig(format!(
                "cells_per_mm must be positive, got {}",
                self.cells_per_mm
            )));
        }
        if !self.xy_compensation_mm.is_finite() || self.xy_compensation_mm < 0.0 {
            return Err(ConversionError::InvalidConfig(format!(
                "xy_compensation_mm must not be negative, got {}",
                self.xy_compensation_mm
            )));
        }
        if self.max_grid_cells == 0 {
            return Err(ConversionError::InvalidConfig("max_grid_cells must not be 0".to_string()));
        }
        Ok(())
    }
}

pub fn mm_per_unit(unit: Unit) -> f64 {
    match unit {
        Unit::Millimeters => 1.0,
        Unit::Inches => MM_PER_INCH,
    }
}

/// Converts file coordinates to plot cells.
///
/// This is the only place geometry is rounded to integer plot coordinates, everything upstream stays in file units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotScale {
    cells_per_unit: f64,
    compensation: f64,
    origin: Position,
    margin: u32,
    width: u32,
    height: u32,
}

impl PlotScale {
    /// `extent` is the drawing extent in file units, an empty extent gives a grid of just the margin.
    ///
    /// Fails when the grid would exceed `config.max_grid_cells`.
    pub fn new(config: &ConversionConfig, unit: Unit, extent: &BoundingBox) -> Result<Self, ConversionError> {
        let mm_per_unit = mm_per_unit(unit);
        let cells_per_unit = config.cells_per_mm * mm_per_unit;
        let (origin, size) = if extent.is_empty() {
            (Position::origin(), (0.0, 0.0))
        } else {
            (
                extent.min,
                (
                    (extent.width() * cells_per_unit).ceil(),
                    (extent.height() * cells_per_unit).ceil(),
                ),
            )
        };

        // sized in f64 first, a huge extent must not wrap
        let border = 1.0 + 2.0 * config.margin_cells as f64;
        let (width, height) = (size.0 + border, size.1 + border);
        let cells = width * height;
        if !cells.is_finite() || cells > config.max_grid_cells as f64 || width.max(height) > i32::MAX as f64 {
            return Err(ConversionError::GridTooLarge {
                width,
                height,
                limit: config.max_grid_cells,
            });
        }

        let scale = Self {
            cells_per_unit,
            compensation: config.xy_compensation_mm / mm_per_unit,
            origin,
            margin: config.margin_cells,
            width: width as u32,
            height: height as u32,
        };
        debug!(
            "plot scale: {} cells per unit, origin: {:?}, grid: {}x{}",
            scale.cells_per_unit, scale.origin, scale.width, scale.height
        );
        Ok(scale)
    }

    pub fn cells_per_unit(&self) -> f64 {
        self.cells_per_unit
    }

    /// xy-compensation in file units.
    pub fn compensation(&self) -> f64 {
        self.compensation
    }

    pub fn grid_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Unrounded plot position, for geometry that is rounded later as a whole.
    pub fn to_plot(&self, position: Position) -> Point2<f64> {
        Point2::new(
            (position.x - self.origin.x) * self.cells_per_unit + self.margin as f64,
            (position.y - self.origin.y) * self.cells_per_unit + self.margin as f64,
        )
    }

    pub fn point(&self, position: Position) -> PlotPoint {
        let plot = self.to_plot(position);
        PlotPoint::new(plot.x.round() as i32, plot.y.round() as i32)
    }

    pub fn length(&self, length: f64) -> i32 {
        (length * self.cells_per_unit).round() as i32
    }

    /// A stroke or pen width, never less than one cell.
    pub fn width(&self, width: f64) -> i32 {
        self.length(width).max(1)
    }
}
