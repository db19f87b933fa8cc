//! Replays parsed gerber commands onto an iso-plot.

use std::f64::consts::{FRAC_PI_2, PI};

use gerber_types::{Command, CoordinateOffset, Coordinates, DCode, ExtendedCode, FunctionCode, GCode, Operation};
use log::{debug, info, trace, warn};

use crate::aperture::{obround_vertices, ApertureShape, ApertureTable, ShapePrimitive};
use crate::config::PlotScale;
use crate::contour::{BoundarySegment, BoundarySegments};
use crate::error::{ConversionError, IsoPlotError};
use crate::geometry::{ArcDirection, ArcGeometry};
use crate::isoplot::{BuilderId, IdSet, IsoPlot, PlotArc, PlotPoint};
use crate::state::{ContourMode, Interpolation, InterpretationState};
use crate::types::{Effect, Exposure};
use crate::Position;

/// A parsed command and the 1-based line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct GerberStatement {
    pub line: usize,
    pub command: Command,
}

impl GerberStatement {
    /// Numbers commands sequentially, for callers without source line information.
    pub fn numbered(commands: Vec<Command>) -> Vec<GerberStatement> {
        commands
            .into_iter()
            .enumerate()
            .map(|(index, command)| GerberStatement {
                line: index + 1,
                command,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DCodeOperation {
    /// D01
    Interpolate,
    /// D02
    Move,
    /// D03
    Flash,
}

/// The plot space geometry actually used for one D01/D02/D03.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DCodeRecord {
    pub line: usize,
    pub operation: DCodeOperation,
    pub start: PlotPoint,
    pub end: PlotPoint,
    pub center: Option<PlotPoint>,
    pub radius: Option<i32>,
    pub aperture: Option<i32>,
    /// Ids stamped for the operation, region boundaries are attached to the region's last D01.
    pub builder_ids: Vec<BuilderId>,
}

pub struct Replayer<'a> {
    plot: &'a mut IsoPlot,
    apertures: &'a ApertureTable,
    scale: &'a PlotScale,
    records: Vec<DCodeRecord>,
}

impl<'a> Replayer<'a> {
    pub fn new(plot: &'a mut IsoPlot, apertures: &'a ApertureTable, scale: &'a PlotScale) -> Self {
        Self {
            plot,
            apertures,
            scale,
            records: Vec::new(),
        }
    }

    /// Replays the statements in order, stopping at the first M code, and returns the D-code bookkeeping.
    #[profiling::function]
    pub fn replay(mut self, statements: &[GerberStatement]) -> Result<Vec<DCodeRecord>, ConversionError> {
        let mut state = InterpretationState::default();

        for statement in statements {
            let line = statement.line;
            trace!("line: {}, command: {:?}", line, statement.command);
            match &statement.command {
                Command::FunctionCode(FunctionCode::GCode(gcode)) => match gcode {
                    GCode::InterpolationMode(mode) => state.interpolation = (*mode).into(),
                    GCode::QuadrantMode(mode) => state.quadrant_mode = *mode,
                    GCode::RegionMode(true) => {
                        if state.in_region() {
                            warn!("G36 at line {} while a region is open, ignored", line);
                        } else {
                            state.contour = ContourMode::On(BoundarySegments::default());
                        }
                    }
                    GCode::RegionMode(false) => match state.end_region() {
                        Some(segments) => self.close_region(&state, segments)?,
                        None => warn!("G37 at line {} without G36, ignored", line),
                    },
                    _ => trace!("ignored g-code: {:?}", gcode),
                },
                Command::FunctionCode(FunctionCode::DCode(DCode::SelectAperture(code))) => {
                    if self.apertures.get(*code).is_none() {
                        return Err(ConversionError::UnknownAperture {
                            code: *code,
                            line,
                        });
                    }
                    state.aperture = Some(*code);
                }
                Command::FunctionCode(FunctionCode::DCode(DCode::Operation(operation))) => {
                    self.operation(&mut state, operation, line)?;
                }
                Command::FunctionCode(FunctionCode::MCode(code)) => {
                    debug!("{:?} at line {}, stopping", code, line);
                    break;
                }
                Command::ExtendedCode(ExtendedCode::LoadPolarity(polarity)) => state.polarity = *polarity,
                Command::ExtendedCode(ExtendedCode::ApertureBlock(_)) => {
                    return Err(ConversionError::UnsupportedConstruct {
                        construct: "AB",
                        line,
                    })
                }
                Command::ExtendedCode(ExtendedCode::StepAndRepeat(_)) => {
                    return Err(ConversionError::UnsupportedConstruct {
                        construct: "SR",
                        line,
                    })
                }
                _ => trace!("ignored command at line {}", line),
            }
        }

        if let Some(segments) = state.end_region() {
            if !segments.is_empty() {
                warn!("Region still open at end of file, closing it");
            }
            self.close_region(&state, segments)?;
        }

        info!("d-codes: {}, builder objects: {}", self.records.len(), self.plot.object_count());
        Ok(self.records)
    }

    fn operation(
        &mut self,
        state: &mut InterpretationState,
        operation: &Operation,
        line: usize,
    ) -> Result<(), ConversionError> {
        match operation {
            Operation::Move(coordinates) => {
                let end = state.target(coordinates);
                if let Some(segments) = state.take_region() {
                    self.close_region(state, segments)?;
                }
                self.record(DCodeOperation::Move, line, state, end, None, vec![]);
                state.position = end;
            }
            Operation::Interpolate(coordinates, offset) => {
                self.interpolate(state, coordinates, offset.as_ref(), line)?;
            }
            Operation::Flash(coordinates) => {
                let end = state.target(coordinates);
                let ids = if state.in_region() {
                    warn!("Flash inside a region at line {}, ignored", line);
                    vec![]
                } else {
                    let shape = self.selected_aperture(state, line)?;
                    self.flash(state, shape, end)?
                };
                self.record(DCodeOperation::Flash, line, state, end, None, ids);
                state.position = end;
            }
        }
        Ok(())
    }

    fn selected_aperture(&self, state: &InterpretationState, line: usize) -> Result<&'a ApertureShape, ConversionError> {
        let code = state
            .aperture
            .ok_or(ConversionError::NoApertureSelected {
                line,
            })?;
        self.apertures
            .get(code)
            .ok_or(ConversionError::UnknownAperture {
                code,
                line,
            })
    }

    fn interpolate(
        &mut self,
        state: &mut InterpretationState,
        coordinates: &Coordinates,
        offset: Option<&CoordinateOffset>,
        line: usize,
    ) -> Result<(), ConversionError> {
        let (start, end) = (state.position, state.target(coordinates));

        let direction = match (state.interpolation, offset) {
            (Interpolation::Circular(direction), Some(_)) => Some(direction),
            (Interpolation::Circular(_), None) => {
                warn!("Circular interpolation without I/J at line {}, drawing a straight line", line);
                None
            }
            (Interpolation::Undefined, Some(_)) => {
                return Err(ConversionError::MissingCircularDirection {
                    line,
                })
            }
            (Interpolation::Undefined, None) => {
                warn!("D01 before any interpolation mode at line {}, assuming linear", line);
                None
            }
            (Interpolation::Linear, _) => None,
        };
        let arc = match (direction, offset) {
            (Some(direction), Some(offset)) => Some(self.resolve_arc(state, start, end, offset, direction)),
            _ => None,
        };

        if let Some(segments) = state.region_mut() {
            segments.push(match arc {
                Some((_, plot_arc)) => BoundarySegment::arc(self.scale.point(start), self.scale.point(end), plot_arc),
                None => BoundarySegment::line(self.scale.point(start), self.scale.point(end)),
            });
            self.record(DCodeOperation::Interpolate, line, state, end, arc.map(|(_, plot_arc)| plot_arc), vec![]);
            state.position = end;
            return Ok(());
        }

        let shape = self.selected_aperture(state, line)?;
        if shape.is_macro() {
            return Err(ConversionError::MacroApertureDraw {
                code: state.aperture.unwrap_or_default(),
                line,
            });
        }

        let ids = match arc {
            Some((geometry, plot_arc)) => self.draw_arc(state, shape, &geometry, plot_arc)?,
            None => self.draw_line(state, shape, start, end)?,
        };
        self.record(DCodeOperation::Interpolate, line, state, end, arc.map(|(_, plot_arc)| plot_arc), ids);
        state.position = end;
        Ok(())
    }

    fn resolve_arc(
        &self,
        state: &InterpretationState,
        start: Position,
        end: Position,
        offset: &CoordinateOffset,
        direction: ArcDirection,
    ) -> (ArcGeometry, PlotArc) {
        let center_offset = InterpretationState::center_offset(offset);
        let multi_quadrant = state.is_multi_quadrant();
        let geometry = match multi_quadrant {
            true => ArcGeometry::from_multi_quadrant(start, end, center_offset, direction),
            false => ArcGeometry::from_single_quadrant(start, end, center_offset, direction),
        };
        trace!("arc: {:?}", geometry);
        let plot_arc = PlotArc {
            center: self.scale.point(geometry.center),
            radius: self.scale.length(geometry.radius),
            start_angle: geometry.start_angle,
            sweep_angle: geometry.sweep_angle,
            multi_quadrant,
        };
        (geometry, plot_arc)
    }

    #[profiling::function]
    fn draw_line(
        &mut self,
        state: &InterpretationState,
        shape: &ApertureShape,
        start: Position,
        end: Position,
    ) -> Result<Vec<BuilderId>, ConversionError> {
        let shape = shape.compensated(self.scale.compensation());
        let effect = state.effect();
        let Some(outer) = shape.outer_shape() else {
            return Ok(vec![]);
        };
        let (from, to) = (self.scale.point(start), self.scale.point(end));
        let first = self.plot.next_id();

        let ids = if from == to {
            trace!("zero length draw, flashing the aperture outline instead");
            vec![self.stamp_shape(&outer, end, effect)?]
        } else {
            let angle = (end.y - start.y).atan2(end.x - start.x);
            let width = self
                .scale
                .width(shape.stroke_width_at(angle));
            let body = self
                .plot
                .draw_line_outline(effect.edge_tag(), from, to, width, effect.fill_mode())?;
            let mut ids = vec![body];
            ids.extend(self.end_caps(&outer, [start, end], effect)?);
            ids
        };

        if effect == Effect::Remove {
            self.clear(&ids, &[], first)?;
        }
        Ok(ids)
    }

    #[profiling::function]
    fn draw_arc(
        &mut self,
        state: &InterpretationState,
        shape: &ApertureShape,
        geometry: &ArcGeometry,
        plot_arc: PlotArc,
    ) -> Result<Vec<BuilderId>, ConversionError> {
        let shape = shape.compensated(self.scale.compensation());
        let effect = state.effect();
        let Some(outer) = shape.outer_shape() else {
            return Ok(vec![]);
        };
        if !shape.is_circle() {
            warn!("Arc drawn with a non-circular aperture, using the stroke width at the start tangent");
        }
        let tangent = geometry.start_angle + geometry.sweep_angle.signum() * FRAC_PI_2;
        let width = self
            .scale
            .width(shape.stroke_width_at(tangent));
        let first = self.plot.next_id();

        let body = self
            .plot
            .draw_arc_outline(effect.edge_tag(), plot_arc, width, effect.fill_mode())?;
        let mut ids = vec![body];
        if !plot_arc.is_degenerate() && !geometry.is_full_circle() {
            ids.extend(self.end_caps(&outer, [geometry.start_point(), geometry.end_point()], effect)?);
        }

        if effect == Effect::Remove {
            self.clear(&ids, &[], first)?;
        }
        Ok(ids)
    }

    /// Stamps the aperture's outline at both ends of a draw, rounding or squaring the stroke's ends.
    fn end_caps(
        &mut self,
        outer: &ShapePrimitive,
        points: [Position; 2],
        effect: Effect,
    ) -> Result<Vec<BuilderId>, ConversionError> {
        points
            .into_iter()
            .map(|point| self.stamp_shape(outer, point, effect))
            .collect()
    }

    /// Stamps the flash primitives in order, cut-outs carve only the ids this flash owns so far.
    #[profiling::function]
    fn flash(
        &mut self,
        state: &InterpretationState,
        shape: &ApertureShape,
        at: Position,
    ) -> Result<Vec<BuilderId>, ConversionError> {
        let shape = shape.compensated(self.scale.compensation());
        let effect = state.effect();
        let first = self.plot.next_id();
        let rect = self.plot.grid_rect();

        let mut owned: Vec<BuilderId> = Vec::new();
        let mut erasers: Vec<BuilderId> = Vec::new();
        let mut carvers: Vec<BuilderId> = Vec::new();
        for primitive in shape.flash_primitives() {
            let id = self.stamp_shape(&primitive.shape, at, effect.with_exposure(primitive.exposure))?;
            match primitive.exposure {
                Exposure::Add => erasers.push(id),
                Exposure::CutOut => {
                    let targets = IdSet::Ids(owned.clone());
                    self.plot
                        .erase_if_not_supported(&targets, id, rect)?;
                    self.plot
                        .erase_by_builder_id(&targets, id, rect)?;
                    self.plot
                        .erase_background_only_cells(id, rect)?;
                    carvers.push(id);
                }
            }
            owned.push(id);
        }
        trace!("flash at {:?}, owned ids: {:?}", at, owned);

        if effect == Effect::Remove {
            self.clear(&erasers, &carvers, first)?;
        }
        Ok(owned)
    }

    /// Applies clear polarity: `erasers` remove every earlier id beneath them and survive only where there was
    /// something to remove, `kept` ids of the same operation also survive only over earlier material.
    fn clear(&mut self, erasers: &[BuilderId], kept: &[BuilderId], first: BuilderId) -> Result<(), ConversionError> {
        let prior = IdSet::Range(BuilderId::FIRST..first);
        let rect = self.plot.grid_rect();
        for id in erasers.iter().chain(kept) {
            self.plot
                .erase_if_not_supported(&prior, *id, rect)?;
        }
        for id in erasers {
            self.plot
                .erase_by_builder_id(&prior, *id, rect)?;
        }
        for id in erasers {
            self.plot
                .erase_background_only_cells(*id, rect)?;
        }
        Ok(())
    }

    #[profiling::function]
    fn close_region(&mut self, state: &InterpretationState, mut segments: BoundarySegments) -> Result<(), ConversionError> {
        if segments.is_empty() {
            return Ok(());
        }
        segments.mark_coincident();
        let first = self.plot.next_id();
        let ids = segments.stamp(self.plot);
        let Some(seed) = ids.first().copied() else {
            return Ok(());
        };

        let effect = state.effect();
        let (rect, limit) = (self.plot.grid_rect(), self.plot.fill_limit());
        let filled = self
            .plot
            .background_fill_by_boundary(&ids, seed, rect, effect.fill_mode(), limit)?;
        debug!("region of {} segments closed, {} cells filled", ids.len(), filled);

        if effect == Effect::Remove {
            let prior = IdSet::Range(BuilderId::FIRST..first);
            for id in &ids {
                self.plot
                    .erase_if_not_supported(&prior, *id, rect)?;
            }
            for id in &ids {
                self.plot
                    .erase_by_builder_id(&prior, *id, rect)?;
            }
            self.plot
                .erase_background_only_cells(seed, rect)?;
        }

        if let Some(record) = self
            .records
            .iter_mut()
            .rev()
            .find(|record| record.operation == DCodeOperation::Interpolate)
        {
            record.builder_ids.extend(ids);
        }
        Ok(())
    }

    /// Stamps one shape relative to `at`.
    fn stamp_shape(&mut self, shape: &ShapePrimitive, at: Position, effect: Effect) -> Result<BuilderId, ConversionError> {
        let (tag, fill) = (effect.edge_tag(), effect.fill_mode());
        let vertices = match shape {
            ShapePrimitive::Circle {
                center,
                diameter,
            } => {
                let radius = self.scale.length(diameter / 2.0).max(1);
                return Ok(self.plot.draw_circle(
                    tag,
                    self.scale.point(at + center.coords),
                    radius,
                    fill,
                    ArcDirection::CounterClockwise,
                )?);
            }
            ShapePrimitive::Obround {
                center,
                width,
                height,
            } => {
                let radius = self.scale.length(width.min(*height) / 2.0) as f64;
                let steps = ArcGeometry::steps_for_radius(radius, PI);
                obround_vertices(at + center.coords, *width, *height, steps)
            }
            ShapePrimitive::Outline {
                vertices,
            } => vertices
                .iter()
                .map(|vertex| at + vertex.coords)
                .collect(),
        };

        let points: Vec<PlotPoint> = vertices
            .iter()
            .map(|vertex| self.scale.point(*vertex))
            .collect();
        match self.plot.draw_outline(tag, &points, fill) {
            Err(IsoPlotError::DegenerateOutline(count)) => {
                warn!("Shape smaller than a cell ({} distinct vertices), stamping a dot", count);
                let center = shape.bounding_box().center();
                Ok(self.plot.draw_circle(
                    tag,
                    self.scale.point(at + center.coords),
                    1,
                    fill,
                    ArcDirection::CounterClockwise,
                )?)
            }
            result => Ok(result?),
        }
    }

    fn record(
        &mut self,
        operation: DCodeOperation,
        line: usize,
        state: &InterpretationState,
        end: Position,
        arc: Option<PlotArc>,
        builder_ids: Vec<BuilderId>,
    ) {
        let record = DCodeRecord {
            line,
            operation,
            start: self.scale.point(state.position),
            end: self.scale.point(end),
            center: arc.map(|arc| arc.center),
            radius: arc.map(|arc| arc.radius),
            aperture: state.aperture,
            builder_ids,
        };
        trace!("d-code record: {:?}", record);
        self.records.push(record);
    }
}

#[cfg(test)]
mod replay_tests {
    use gerber_types::{Polarity, Unit};

    use super::*;
    use crate::config::ConversionConfig;
    use crate::geometry::BoundingBox;
    use crate::isoplot::UsageTag;
    use crate::testing::commands::*;

    fn replay(commands: Vec<Command>) -> (IsoPlot, Vec<DCodeRecord>) {
        let _ = env_logger::builder()
            .is_test(true)
            .try_init();
        let statements = GerberStatement::numbered(commands);
        let apertures = ApertureTable::collect(&statements).unwrap();
        let extent = BoundingBox::from_points(&[Position::new(-1.0, -1.0), Position::new(5.0, 5.0)]);
        let scale = PlotScale::new(
            &ConversionConfig::default().with_cells_per_mm(10.0),
            Unit::Millimeters,
            &extent,
        )
        .unwrap();
        let (width, height) = scale.grid_size();
        let mut plot = IsoPlot::new(width, height);
        let records = Replayer::new(&mut plot, &apertures, &scale)
            .replay(&statements)
            .unwrap();
        (plot, records)
    }

    #[test]
    fn test_statements_are_numbered_from_one() {
        let statements = GerberStatement::numbered(vec![linear(), region_start()]);
        assert_eq!(
            statements
                .iter()
                .map(|statement| statement.line)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_clear_draw_cuts_a_region() {
        // given, a dark square cut in half by a clear 0.4mm line
        let mut commands = rectangle_region((0.0, 0.0), (4.0, 4.0));
        commands.extend([
            circle(10, 0.4, None),
            select(10),
            polarity(Polarity::Clear),
            move_to(-0.5, 2.0),
            line_to(4.5, 2.0),
        ]);

        // when
        let (plot, records) = replay(commands);

        // then, 10 cells per mm with the origin at (-1,-1) and a margin of 10 cells, so x mm is cell 10x + 20
        let region = BuilderId::FIRST;
        let eraser = records[6].builder_ids[0];
        assert!(plot
            .cell(40, 50)
            .is_some_and(|cell| cell.contains(region) && !cell.contains(eraser)));
        assert!(!plot
            .cell(40, 40)
            .is_some_and(|cell| cell.contains(region)));
        assert!(plot
            .cell(40, 35)
            .is_some_and(|cell| cell.contains(region)));

        // and the eraser only survives over copper
        assert!(plot
            .cell(15, 40)
            .map_or(true, |cell| cell.is_empty()));
    }

    #[test]
    fn test_region_with_arc_fills_every_column() {
        // given, the arc center and radius round to different cells than the draw end points
        let commands = vec![
            multi_quadrant(),
            linear(),
            region_start(),
            move_to(0.0, 0.0),
            line_to(1.0, 0.0),
            counter_clockwise(),
            arc_to(1.20566, 0.52267, -0.24493, 0.39817),
            linear(),
            line_to(0.0, 0.52267),
            line_to(0.0, 0.0),
            region_end(),
        ];

        // when
        let (plot, records) = replay(commands);

        // then
        let arc_record = records
            .iter()
            .find(|record| record.center.is_some())
            .unwrap();
        assert_eq!(arc_record.start, PlotPoint::new(30, 20));
        assert_eq!(arc_record.end, PlotPoint::new(32, 25));

        for x in 21..=32 {
            let filled = (20..=25).any(|y| {
                plot.usages_at(x, y)
                    .iter()
                    .any(|usage| usage.tag == UsageTag::BackgroundFill)
            });
            assert!(filled, "column {} has no fill", x);
        }
        for y in 0..plot.height() as i32 {
            assert!(plot.usages_at(34, y).is_empty(), "leak at (34,{})", y);
        }
    }

    #[test]
    fn test_region_closed_by_move() {
        // given, two regions in one G36/G37 block separated by a D02
        let commands = vec![
            linear(),
            region_start(),
            move_to(0.0, 0.0),
            line_to(1.0, 0.0),
            line_to(1.0, 1.0),
            line_to(0.0, 0.0),
            move_to(2.0, 2.0),
            line_to(3.0, 2.0),
            line_to(3.0, 3.0),
            line_to(2.0, 2.0),
            region_end(),
        ];

        // when
        let (plot, records) = replay(commands);

        // then
        assert_eq!(plot.object_count(), 6);
        assert_eq!(records[3].builder_ids.len(), 3);
        assert_eq!(records[7].builder_ids.len(), 3);
        assert!(records[4].builder_ids.is_empty());
    }
}
