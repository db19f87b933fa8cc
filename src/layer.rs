use gerber_types::{Command, DCode, ExtendedCode, FunctionCode, GCode, Operation, QuadrantMode, Unit};
use log::{debug, info, warn};

use crate::aperture::ApertureTable;
use crate::config::{mm_per_unit, ConversionConfig, PlotScale};
use crate::error::ConversionError;
use crate::geometry::{ArcDirection, ArcGeometry, BoundingBox};
use crate::isoplot::IsoPlot;
use crate::replay::{DCodeRecord, GerberStatement, Replayer};
use crate::state::{Interpolation, InterpretationState};

/// A gerber layer converted to an iso-plot.
#[derive(Clone, Debug)]
pub struct IsolationLayer {
    unit: Unit,
    scale: PlotScale,
    apertures: ApertureTable,
    plot: IsoPlot,
    dcode_records: Vec<DCodeRecord>,
}

impl IsolationLayer {
    /// Converts commands that carry no line information, lines are numbered from 1 in command order.
    pub fn from_commands(commands: Vec<Command>, config: &ConversionConfig) -> Result<Self, ConversionError> {
        Self::convert(&GerberStatement::numbered(commands), config)
    }

    #[profiling::function]
    pub fn convert(statements: &[GerberStatement], config: &ConversionConfig) -> Result<Self, ConversionError> {
        config.validate()?;

        let unit = Self::detect_unit(statements);
        let apertures = ApertureTable::collect(statements)?;
        let compensation = config.xy_compensation_mm / mm_per_unit(unit);
        let extent = Self::drawing_extent(statements, &apertures, compensation);
        debug!("drawing extent: {:?}", extent);

        let scale = PlotScale::new(config, unit, &extent)?;
        let (width, height) = scale.grid_size();
        let mut plot = IsoPlot::new(width, height).with_fill_limit(config.fill_limit);

        let dcode_records = Replayer::new(&mut plot, &apertures, &scale).replay(statements)?;

        info!(
            "plot: {}x{} cells, objects: {}, occupied cells: {}, overlays: {}",
            plot.width(),
            plot.height(),
            plot.object_count(),
            plot.occupied_count(),
            plot.overlay_count()
        );

        Ok(Self {
            unit,
            scale,
            apertures,
            plot,
            dcode_records,
        })
    }

    /// The first `%MO` wins, files without one are treated as millimeters.
    fn detect_unit(statements: &[GerberStatement]) -> Unit {
        let mut units = statements
            .iter()
            .filter_map(|statement| match &statement.command {
                Command::ExtendedCode(ExtendedCode::Unit(unit)) => Some((statement.line, *unit)),
                _ => None,
            });

        match units.next() {
            Some((_, unit)) => {
                if let Some((line, _)) = units.find(|(_, other)| *other != unit) {
                    warn!("Unit changed at line {}, keeping {:?}", line, unit);
                }
                unit
            }
            None => {
                warn!("No unit (%MO) specified, assuming millimeters");
                Unit::Millimeters
            }
        }
    }

    /// Walks the operations without stamping anything to find the area the artwork covers, in file units.
    #[profiling::function]
    fn drawing_extent(statements: &[GerberStatement], apertures: &ApertureTable, compensation: f64) -> BoundingBox {
        let mut extent = BoundingBox::default();
        let mut state = InterpretationState::default();
        let mut in_region = false;

        let half_width = |state: &InterpretationState| {
            state
                .aperture
                .and_then(|code| apertures.get(code))
                .map_or(0.0, |shape| (shape.max_extent() + compensation).max(0.0))
        };

        for statement in statements {
            match &statement.command {
                Command::FunctionCode(FunctionCode::GCode(GCode::InterpolationMode(mode))) => {
                    state.interpolation = (*mode).into()
                }
                Command::FunctionCode(FunctionCode::GCode(GCode::QuadrantMode(mode))) => state.quadrant_mode = *mode,
                Command::FunctionCode(FunctionCode::GCode(GCode::RegionMode(on))) => in_region = *on,
                Command::FunctionCode(FunctionCode::DCode(DCode::SelectAperture(code))) => state.aperture = Some(*code),
                Command::FunctionCode(FunctionCode::DCode(DCode::Operation(operation))) => match operation {
                    Operation::Move(coordinates) => state.position = state.target(coordinates),
                    Operation::Flash(coordinates) => {
                        state.position = state.target(coordinates);
                        if !in_region {
                            extent.expand(&BoundingBox::around(state.position, half_width(&state)));
                        }
                    }
                    Operation::Interpolate(coordinates, offset) => {
                        let (start, end) = (state.position, state.target(coordinates));
                        let width = match in_region {
                            true => 0.0,
                            false => half_width(&state),
                        };
                        let arc = match (state.interpolation, offset) {
                            (Interpolation::Circular(direction), Some(offset)) => Some((direction, offset)),
                            _ => None,
                        };
                        match arc {
                            Some((direction, offset)) => {
                                extent.expand(&Self::arc_extent(&state, start, end, offset, direction, width))
                            }
                            None => {
                                extent.expand(&BoundingBox::around(start, width));
                                extent.expand(&BoundingBox::around(end, width));
                            }
                        }
                        state.position = end;
                    }
                },
                Command::FunctionCode(FunctionCode::MCode(_)) => break,
                _ => {}
            }
        }
        extent
    }

    fn arc_extent(
        state: &InterpretationState,
        start: crate::Position,
        end: crate::Position,
        offset: &gerber_types::CoordinateOffset,
        direction: ArcDirection,
        half_width: f64,
    ) -> BoundingBox {
        let center_offset = InterpretationState::center_offset(offset);
        let geometry = match state.quadrant_mode {
            QuadrantMode::Multiple => ArcGeometry::from_multi_quadrant(start, end, center_offset, direction),
            QuadrantMode::Single => ArcGeometry::from_single_quadrant(start, end, center_offset, direction),
        };
        geometry.bounding_box(half_width * 2.0)
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn scale(&self) -> &PlotScale {
        &self.scale
    }

    pub fn apertures(&self) -> &ApertureTable {
        &self.apertures
    }

    pub fn plot(&self) -> &IsoPlot {
        &self.plot
    }

    pub fn into_plot(self) -> IsoPlot {
        self.plot
    }

    /// One record per D01/D02/D03, in file order.
    pub fn dcode_records(&self) -> &[DCodeRecord] {
        &self.dcode_records
    }

    /// A file with nothing to plot still produces a (margin only) grid.
    pub fn is_empty(&self) -> bool {
        self.plot.object_count() == 0
    }
}
