//! The iso-plot: a grid of cells recording which stamped objects occupy each cell and how.
//!
//! The builder knows nothing about gerber, it only stamps boundaries, fills interiors and erases ids. All coordinates
//! are integer plot cells, `(0,0)` is the bottom left cell.

mod cell;
mod erase;
mod fill;
mod raster;

use std::f64::consts::TAU;

pub use cell::{BuilderId, Cell, FillMode, IdSet, Usage, UsageTag};
use fill::{arc_pieces, chain_ends, interior_spans, pieces_extent, polygon_pieces, BoundaryPiece, Span};
use log::{debug, trace};
use nalgebra::{Point2, Vector2};
pub use raster::{CellRect, PlotPoint};
use raster::{arc_cells, circle_cells, line_cells, polygon_cells, round_point};

use crate::error::IsoPlotError;
use crate::geometry::{ArcDirection, ArcGeometry};
use crate::spacial::length;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Line,
    Circle,
    Arc,
    Outline,
    ContourLine,
    ContourArc,
}

/// The record kept for every allocated builder id.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderObject {
    pub id: BuilderId,
    pub kind: ObjectKind,
    /// The edge tag, fixed at allocation.
    pub tag: UsageTag,
    pub fill: FillMode,
    /// Cells ever claimed by the id, `None` when nothing landed on the grid.
    pub bounds: Option<CellRect>,
    pieces: Vec<BoundaryPiece>,
}

/// A circular arc in plot space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArc {
    pub center: PlotPoint,
    pub radius: i32,
    /// radians
    pub start_angle: f64,
    /// radians, positive = counter-clockwise
    pub sweep_angle: f64,
    /// In multi-quadrant mode a zero sweep is a full circle, in single-quadrant mode it is a point.
    pub multi_quadrant: bool,
}

impl PlotArc {
    fn geometry(&self, radius: f64) -> ArcGeometry {
        ArcGeometry {
            center: Point2::new(self.center.x as f64, self.center.y as f64),
            radius,
            start_angle: self.start_angle,
            sweep_angle: self.sweep_angle,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        !self.multi_quadrant && self.sweep_angle.abs() < 1e-9
    }

    pub fn start_point(&self) -> PlotPoint {
        round_point(self.geometry(self.radius as f64).start_point())
    }

    pub fn end_point(&self) -> PlotPoint {
        round_point(self.geometry(self.radius as f64).end_point())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsoPlot {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    objects: Vec<BuilderObject>,
    fill_limit: Option<usize>,
}

impl IsoPlot {
    pub fn new(width: u32, height: u32) -> Self {
        debug!("iso-plot size: {}x{} cells", width, height);
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width as usize * height as usize],
            objects: Vec::new(),
            fill_limit: None,
        }
    }

    /// Caps the number of cells any one flood fill may claim.
    pub fn with_fill_limit(mut self, fill_limit: Option<usize>) -> Self {
        self.fill_limit = fill_limit;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill_limit(&self) -> Option<usize> {
        self.fill_limit
    }

    pub fn grid_rect(&self) -> CellRect {
        CellRect::new(0, 0, self.width as i32 - 1, self.height as i32 - 1)
    }

    /// The id the next stamp will receive.
    pub fn next_id(&self) -> BuilderId {
        self.objects
            .last()
            .map_or(BuilderId::FIRST, |object| object.id.next())
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    //
    // stamping
    //

    /// Stamps the outline of a line stroked with `width`, square ends at `start` and `end`.
    ///
    /// Round or shaped ends are added by the caller with separate stamps.
    #[profiling::function]
    pub fn draw_line_outline(
        &mut self,
        tag: UsageTag,
        start: PlotPoint,
        end: PlotPoint,
        width: i32,
        fill: FillMode,
    ) -> Result<BuilderId, IsoPlotError> {
        if width <= 0 {
            return Err(IsoPlotError::ZeroWidthStroke {
                width,
            });
        }
        let (a, b) = (to_f64(start), to_f64(end));
        let delta = b - a;
        let distance = length(delta);
        let direction = if distance > 0.0 {
            delta / distance
        } else {
            Vector2::new(1.0, 0.0)
        };
        let normal = Vector2::new(-direction.y, direction.x) * (width as f64 / 2.0);
        let corners = [a + normal, b + normal, b - normal, a - normal];

        let edge_cells = polygon_cells(&corners);
        self.stamp(ObjectKind::Line, tag, fill, polygon_pieces(&corners), edge_cells)
    }

    #[profiling::function]
    pub fn draw_circle(
        &mut self,
        tag: UsageTag,
        center: PlotPoint,
        radius: i32,
        fill: FillMode,
        direction: ArcDirection,
    ) -> Result<BuilderId, IsoPlotError> {
        if radius <= 0 {
            return Err(IsoPlotError::ZeroWidthStroke {
                width: radius * 2,
            });
        }
        let sweep = match direction {
            ArcDirection::CounterClockwise => TAU,
            ArcDirection::Clockwise => -TAU,
        };
        let geometry = ArcGeometry {
            center: to_f64(center),
            radius: radius as f64,
            start_angle: 0.0,
            sweep_angle: sweep,
        };
        let edge_cells = circle_cells(center, radius);
        self.stamp(ObjectKind::Circle, tag, fill, arc_pieces(&geometry), edge_cells)
    }

    /// Stamps the outline of an arc stroked with `width`, square ends.
    #[profiling::function]
    pub fn draw_arc_outline(
        &mut self,
        tag: UsageTag,
        arc: PlotArc,
        width: i32,
        fill: FillMode,
    ) -> Result<BuilderId, IsoPlotError> {
        if width <= 0 {
            return Err(IsoPlotError::ZeroWidthStroke {
                width,
            });
        }
        if arc.is_degenerate() {
            trace!("degenerate single quadrant arc, stamping the pen at the start point");
            let radius = (width / 2).max(1);
            return self.draw_circle(tag, arc.start_point(), radius, fill, ArcDirection::CounterClockwise);
        }

        let half_width = width as f64 / 2.0;
        let outer = arc.geometry(arc.radius as f64 + half_width);
        let inner_radius = arc.radius as f64 - half_width;

        let mut pieces = arc_pieces(&outer);
        let mut edge_cells = if outer.is_full_circle() {
            circle_cells(arc.center, outer.radius.round() as i32)
        } else {
            arc_cells(&outer)
        };

        if outer.is_full_circle() {
            if inner_radius > 0.0 {
                let inner = arc.geometry(inner_radius);
                pieces.extend(arc_pieces(&inner));
                edge_cells.extend(circle_cells(arc.center, inner_radius.round() as i32));
            }
        } else if inner_radius > 0.0 {
            let inner = arc.geometry(inner_radius);
            let reversed = ArcGeometry {
                start_angle: inner.end_angle(),
                sweep_angle: -inner.sweep_angle,
                ..inner
            };
            let inner_pieces = arc_pieces(&reversed);
            if let (Some((outer_start, outer_end)), Some((inner_end, inner_start))) =
                (chain_ends(&pieces), chain_ends(&inner_pieces))
            {
                pieces.push(BoundaryPiece::Line {
                    start: outer_end,
                    end: inner_end,
                });
                pieces.extend(inner_pieces);
                pieces.push(BoundaryPiece::Line {
                    start: inner_start,
                    end: outer_start,
                });
            }
            edge_cells.extend(line_cells(round_point(outer.end_point()), round_point(inner.end_point())));
            edge_cells.extend(arc_cells(&inner));
            edge_cells.extend(line_cells(round_point(inner.start_point()), round_point(outer.start_point())));
        } else {
            // the inner edge collapses onto the center, a sector
            let center = to_f64(arc.center);
            if let Some((outer_start, outer_end)) = chain_ends(&pieces) {
                pieces.push(BoundaryPiece::Line {
                    start: outer_end,
                    end: center,
                });
                pieces.push(BoundaryPiece::Line {
                    start: center,
                    end: outer_start,
                });
            }
            edge_cells.extend(line_cells(round_point(outer.end_point()), arc.center));
            edge_cells.extend(line_cells(arc.center, round_point(outer.start_point())));
        }

        self.stamp(ObjectKind::Arc, tag, fill, pieces, edge_cells)
    }

    /// Zero width boundary line of a fill region, never filled on its own.
    pub fn draw_contour_line(&mut self, tag: UsageTag, start: PlotPoint, end: PlotPoint) -> BuilderId {
        let pieces = vec![BoundaryPiece::Line {
            start: to_f64(start),
            end: to_f64(end),
        }];
        self.stamp_boundary(ObjectKind::ContourLine, tag, pieces, line_cells(start, end))
    }

    /// Zero width boundary arc of a fill region from `start` to `end`, never filled on its own.
    ///
    /// `start` and `end` are the rounded end points the neighbouring segments use, the arc itself follows the rounded
    /// center and radius so short joins are added where the two disagree, keeping the region boundary closed.
    pub fn draw_contour_arc(&mut self, tag: UsageTag, start: PlotPoint, end: PlotPoint, arc: PlotArc) -> BuilderId {
        if arc.is_degenerate() {
            let pieces = vec![BoundaryPiece::Line {
                start: to_f64(start),
                end: to_f64(end),
            }];
            return self.stamp_boundary(ObjectKind::ContourArc, tag, pieces, line_cells(start, end));
        }
        let geometry = arc.geometry(arc.radius as f64);
        let curve = arc_pieces(&geometry);
        let mut edge_cells = if geometry.is_full_circle() {
            circle_cells(arc.center, arc.radius)
        } else {
            arc_cells(&geometry)
        };

        let mut pieces = Vec::with_capacity(curve.len() + 2);
        match chain_ends(&curve) {
            Some((arc_start, arc_end)) => {
                if to_f64(start) != arc_start {
                    pieces.push(BoundaryPiece::Line {
                        start: to_f64(start),
                        end: arc_start,
                    });
                    edge_cells.extend(line_cells(start, round_point(arc_start)));
                }
                pieces.extend(curve);
                if arc_end != to_f64(end) {
                    pieces.push(BoundaryPiece::Line {
                        start: arc_end,
                        end: to_f64(end),
                    });
                    edge_cells.extend(line_cells(round_point(arc_end), end));
                }
            }
            None => {
                pieces.push(BoundaryPiece::Line {
                    start: to_f64(start),
                    end: to_f64(end),
                });
                edge_cells.extend(line_cells(start, end));
            }
        }
        self.stamp_boundary(ObjectKind::ContourArc, tag, pieces, edge_cells)
    }

    /// Stamps a closed polygon, a repeated closing vertex is ignored.
    #[profiling::function]
    pub fn draw_outline(
        &mut self,
        tag: UsageTag,
        vertices: &[PlotPoint],
        fill: FillMode,
    ) -> Result<BuilderId, IsoPlotError> {
        let mut points: Vec<PlotPoint> = Vec::with_capacity(vertices.len());
        for vertex in vertices {
            if points.last() != Some(vertex) {
                points.push(*vertex);
            }
        }
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(IsoPlotError::DegenerateOutline(points.len()));
        }

        let corners: Vec<Point2<f64>> = points
            .iter()
            .map(|point| to_f64(*point))
            .collect();
        let edge_cells = polygon_cells(&corners);
        self.stamp(ObjectKind::Outline, tag, fill, polygon_pieces(&corners), edge_cells)
    }

    fn stamp_boundary(
        &mut self,
        kind: ObjectKind,
        tag: UsageTag,
        pieces: Vec<BoundaryPiece>,
        edge_cells: Vec<PlotPoint>,
    ) -> BuilderId {
        let id = self.allocate(kind, tag, FillMode::None, pieces);
        for cell in edge_cells {
            self.claim(cell.x, cell.y, Usage::new(id, tag));
        }
        id
    }

    /// Stamps the edge cells and, unless `fill` is `None`, the interior.
    ///
    /// The interior is computed and checked against the fill limit before anything is allocated or claimed.
    fn stamp(
        &mut self,
        kind: ObjectKind,
        tag: UsageTag,
        fill: FillMode,
        pieces: Vec<BoundaryPiece>,
        edge_cells: Vec<PlotPoint>,
    ) -> Result<BuilderId, IsoPlotError> {
        let spans = match fill.fill_tag() {
            Some(_) => {
                let refs: Vec<&BoundaryPiece> = pieces.iter().collect();
                match pieces_extent(pieces.iter()).and_then(|extent| extent.intersect(&self.grid_rect())) {
                    Some(region) => {
                        let spans = interior_spans(&refs, region);
                        self.check_fill_limit(self.next_id(), &spans, self.fill_limit)?;
                        spans
                    }
                    None => vec![],
                }
            }
            None => vec![],
        };

        let id = self.allocate(kind, tag, fill, pieces);
        for cell in edge_cells {
            self.claim(cell.x, cell.y, Usage::new(id, tag));
        }
        if let Some(fill_tag) = fill.fill_tag() {
            for span in spans {
                for y in span.y0..=span.y1 {
                    self.claim(span.x, y, Usage::new(id, fill_tag));
                }
            }
        }
        trace!("stamped {:?} {}, tag: {:?}, fill: {:?}", kind, id, tag, fill);
        Ok(id)
    }

    fn allocate(&mut self, kind: ObjectKind, tag: UsageTag, fill: FillMode, pieces: Vec<BoundaryPiece>) -> BuilderId {
        let id = self.next_id();
        self.objects.push(BuilderObject {
            id,
            kind,
            tag,
            fill,
            bounds: None,
            pieces,
        });
        id
    }

    /// Adds a usage to a cell, cells outside the grid are ignored.
    fn claim(&mut self, x: i32, y: i32, usage: Usage) -> bool {
        let Some(index) = self.index(x, y) else {
            return false;
        };
        if !self.cells[index].add(usage) {
            return false;
        }
        let object = &mut self.objects[usage.id.index()];
        object.bounds = Some(match object.bounds {
            Some(mut bounds) => {
                bounds.expand_point(x, y);
                bounds
            }
            None => CellRect::from_point(PlotPoint::new(x, y)),
        });
        true
    }

    fn check_fill_limit(&self, seed: BuilderId, spans: &[Span], limit: Option<usize>) -> Result<(), IsoPlotError> {
        let Some(limit) = limit else {
            return Ok(());
        };
        let cells: usize = spans
            .iter()
            .map(|span| span.len())
            .sum();
        if cells > limit {
            return Err(IsoPlotError::FillLimitExceeded {
                seed,
                cells,
                limit,
            });
        }
        Ok(())
    }

    //
    // compositing
    //

    /// Flood fills the region bounded by the union of `boundary`'s pieces, within `rect`, claiming interior cells for
    /// `seed`. Cells already claimed by one of the boundary ids are skipped.
    ///
    /// Returns the number of cells claimed. Nothing is claimed when the interior exceeds `limit`.
    #[profiling::function]
    pub fn background_fill_by_boundary(
        &mut self,
        boundary: &[BuilderId],
        seed: BuilderId,
        rect: CellRect,
        mode: FillMode,
        limit: Option<usize>,
    ) -> Result<usize, IsoPlotError> {
        self.object(seed)
            .ok_or(IsoPlotError::UnknownBuilderId(seed))?;
        let Some(fill_tag) = mode.fill_tag() else {
            return Ok(0);
        };

        let spans = {
            let mut pieces: Vec<&BoundaryPiece> = Vec::new();
            for id in boundary {
                let object = self
                    .object(*id)
                    .ok_or(IsoPlotError::UnknownBuilderId(*id))?;
                pieces.extend(object.pieces.iter());
            }
            let region = pieces_extent(pieces.iter().copied())
                .and_then(|extent| extent.intersect(&rect))
                .and_then(|region| region.intersect(&self.grid_rect()));
            match region {
                Some(region) => interior_spans(&pieces, region),
                None => vec![],
            }
        };
        self.check_fill_limit(seed, &spans, limit)?;

        let mut filled = 0;
        for span in spans {
            for y in span.y0..=span.y1 {
                let Some(index) = self.index(span.x, y) else {
                    continue;
                };
                let cell = &self.cells[index];
                if boundary
                    .iter()
                    .any(|id| cell.contains(*id))
                {
                    continue;
                }
                if self.claim(span.x, y, Usage::new(seed, fill_tag)) {
                    filled += 1;
                }
            }
        }
        trace!("filled {} cells for seed {}, boundary: {:?}", filled, seed, boundary);
        Ok(filled)
    }

    //
    // queries
    //

    pub fn cell(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y)
            .map(|index| &self.cells[index])
    }

    /// Usages of a cell in stamp order, empty outside the grid.
    pub fn usages_at(&self, x: i32, y: i32) -> &[Usage] {
        self.cell(x, y)
            .map(|cell| cell.usages())
            .unwrap_or(&[])
    }

    pub fn is_edge(&self, x: i32, y: i32) -> bool {
        self.cell(x, y)
            .is_some_and(|cell| cell.has_edge())
    }

    pub fn object(&self, id: BuilderId) -> Option<&BuilderObject> {
        self.objects
            .get(id.index())
            .filter(|object| object.id == id)
    }

    pub fn objects(&self) -> &[BuilderObject] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Every cell currently claimed by `id`, scanning only the id's recorded bounds.
    pub fn cells_of(&self, id: BuilderId) -> Vec<(PlotPoint, UsageTag)> {
        let Some(bounds) = self
            .object(id)
            .and_then(|object| object.bounds)
        else {
            return vec![];
        };
        let mut result = Vec::new();
        for y in bounds.min.y..=bounds.max.y {
            for x in bounds.min.x..=bounds.max.x {
                if let Some(usage) = self
                    .cell(x, y)
                    .and_then(|cell| cell.usage_of(id))
                {
                    result.push((PlotPoint::new(x, y), usage.tag));
                }
            }
        }
        result
    }

    pub fn overlay_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.is_overlay())
            .count()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| !cell.is_empty())
            .count()
    }
}

fn to_f64(point: PlotPoint) -> Point2<f64> {
    Point2::new(point.x as f64, point.y as f64)
}

#[cfg(test)]
mod isoplot_tests {
    use std::collections::HashSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    use super::*;

    fn init() {
        let _ = env_logger::builder()
            .is_test(true)
            .try_init();
    }

    fn distance(cell: PlotPoint, center: PlotPoint) -> f64 {
        (((cell.x - center.x).pow(2) + (cell.y - center.y).pow(2)) as f64).sqrt()
    }

    fn dark_circle(plot: &mut IsoPlot, center: (i32, i32), radius: i32) -> BuilderId {
        plot.draw_circle(
            UsageTag::NormalEdge,
            PlotPoint::new(center.0, center.1),
            radius,
            FillMode::Background,
            ArcDirection::CounterClockwise,
        )
        .unwrap()
    }

    /// The clear polarity composite, as issued by the replayer.
    fn clear(plot: &mut IsoPlot, eraser: BuilderId) {
        let prior = IdSet::Range(BuilderId::FIRST..eraser);
        let rect = plot.grid_rect();
        plot.erase_if_not_supported(&prior, eraser, rect)
            .unwrap();
        plot.erase_by_builder_id(&prior, eraser, rect)
            .unwrap();
        plot.erase_background_only_cells(eraser, rect)
            .unwrap();
    }

    #[test]
    fn test_ids_are_allocated_in_order() {
        let mut plot = IsoPlot::new(100, 100);
        let first = dark_circle(&mut plot, (20, 20), 5);
        let second = plot.draw_contour_line(UsageTag::ContourEdge, PlotPoint::new(0, 0), PlotPoint::new(10, 0));
        assert_eq!(first, BuilderId::FIRST);
        assert_eq!(second.value(), 2);
        assert_eq!(plot.next_id().value(), 3);
        assert_eq!(plot.object(second).map(|object| object.tag), Some(UsageTag::ContourEdge));
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn test_zero_width_stroke_is_an_error(#[case] width: i32) {
        // given
        let mut plot = IsoPlot::new(50, 50);

        // when
        let result = plot.draw_line_outline(
            UsageTag::NormalEdge,
            PlotPoint::new(10, 10),
            PlotPoint::new(40, 10),
            width,
            FillMode::Background,
        );

        // then
        assert_eq!(
            result,
            Err(IsoPlotError::ZeroWidthStroke {
                width
            })
        );
        assert_eq!(plot.object_count(), 0);
        assert_eq!(plot.occupied_count(), 0);
    }

    #[test]
    fn test_non_overlapping_shapes_never_overlay() {
        // given
        let mut plot = IsoPlot::new(200, 100);

        // when
        dark_circle(&mut plot, (40, 50), 30);
        dark_circle(&mut plot, (140, 50), 30);

        // then
        assert_eq!(plot.overlay_count(), 0);
    }

    #[test]
    fn test_overlapping_shapes_overlay_in_stamp_order() {
        // given
        let mut plot = IsoPlot::new(100, 100);

        // when
        let line = plot
            .draw_line_outline(
                UsageTag::NormalEdge,
                PlotPoint::new(10, 50),
                PlotPoint::new(90, 50),
                10,
                FillMode::Background,
            )
            .unwrap();
        let circle = dark_circle(&mut plot, (50, 50), 20);

        // then
        assert_eq!(plot.usages_at(50, 50), &[
            Usage::new(line, UsageTag::BackgroundFill),
            Usage::new(circle, UsageTag::BackgroundFill)
        ]);
        for (cell, _) in plot.cells_of(circle) {
            let usages = plot.usages_at(cell.x, cell.y);
            if usages.len() > 1 {
                assert_eq!(usages.len(), 2);
                assert_eq!(usages[0].id, line);
                assert_eq!(usages[1].id, circle);
            }
        }
    }

    #[test]
    fn test_line_outline_fill() {
        // given
        let mut plot = IsoPlot::new(100, 100);

        // when
        let id = plot
            .draw_line_outline(
                UsageTag::NormalEdge,
                PlotPoint::new(20, 50),
                PlotPoint::new(80, 50),
                10,
                FillMode::Background,
            )
            .unwrap();

        // then
        assert_eq!(plot.usages_at(50, 50), &[Usage::new(id, UsageTag::BackgroundFill)]);
        assert_eq!(plot.usages_at(50, 55), &[Usage::new(id, UsageTag::NormalEdge)]);
        assert_eq!(plot.usages_at(20, 50), &[Usage::new(id, UsageTag::NormalEdge)]);
        assert!(plot.usages_at(50, 57).is_empty());
        assert!(plot.usages_at(85, 50).is_empty());
        assert_eq!(plot.object(id).and_then(|object| object.bounds), Some(CellRect::new(20, 45, 80, 55)));
    }

    #[test]
    fn test_two_circles_lens() {
        // given
        init();
        let mut plot = IsoPlot::new(300, 200);
        let (left_center, right_center) = (PlotPoint::new(100, 100), PlotPoint::new(160, 100));

        // when
        let left = dark_circle(&mut plot, (100, 100), 50);
        let right = dark_circle(&mut plot, (160, 100), 50);

        // then, both ids co-occupy background cells only inside the lens
        let mut lens_cells = 0;
        for y in 0..200 {
            for x in 0..300 {
                let usages = plot.usages_at(x, y);
                let both_fill = [left, right].iter().all(|id| {
                    usages
                        .iter()
                        .any(|usage| usage.id == *id && usage.tag == UsageTag::BackgroundFill)
                });
                if both_fill {
                    let cell = PlotPoint::new(x, y);
                    assert!(distance(cell, left_center) <= 50.0 && distance(cell, right_center) <= 50.0);
                    lens_cells += 1;
                }
            }
        }
        assert!(lens_cells > 0);

        // and the left edge ring is intact, including where it crosses the right circle
        let left_ring: HashSet<PlotPoint> = circle_cells(left_center, 50)
            .into_iter()
            .collect();
        for cell in left_ring {
            assert_eq!(
                plot.cell(cell.x, cell.y)
                    .and_then(|cell| cell.usage_of(left)),
                Some(Usage::new(left, UsageTag::NormalEdge))
            );
        }
    }

    #[test]
    fn test_polarity_round_trip() {
        // given
        let mut plot = IsoPlot::new(100, 100);
        let dark = dark_circle(&mut plot, (50, 50), 20);
        let dark_edges: HashSet<PlotPoint> = plot
            .cells_of(dark)
            .into_iter()
            .filter(|(_, tag)| tag.is_edge())
            .map(|(cell, _)| cell)
            .collect();

        // when
        let eraser = plot
            .draw_circle(
                UsageTag::InvertEdge,
                PlotPoint::new(50, 50),
                20,
                FillMode::Erase,
                ArcDirection::CounterClockwise,
            )
            .unwrap();
        clear(&mut plot, eraser);

        // then, nothing of the dark circle remains, only the eraser's boundary
        assert!(plot.cells_of(dark).is_empty());
        let remaining: HashSet<PlotPoint> = plot
            .cells_of(eraser)
            .into_iter()
            .map(|(cell, tag)| {
                assert_eq!(tag, UsageTag::InvertEdge);
                cell
            })
            .collect();
        assert_eq!(remaining, dark_edges);
        assert_eq!(plot.overlay_count(), 0);
    }

    #[test]
    fn test_clear_over_empty_background_leaves_nothing() {
        // given
        let mut plot = IsoPlot::new(100, 100);
        dark_circle(&mut plot, (10, 10), 5);

        // when
        let eraser = plot
            .draw_circle(
                UsageTag::InvertEdge,
                PlotPoint::new(70, 70),
                10,
                FillMode::Erase,
                ArcDirection::Clockwise,
            )
            .unwrap();
        clear(&mut plot, eraser);

        // then
        assert!(plot.cells_of(eraser).is_empty());
    }

    #[test]
    fn test_hole_punch_is_contained_to_owned_ids() {
        // given, unrelated copper under the whole flash
        let mut plot = IsoPlot::new(120, 120);
        let unrelated = plot
            .draw_outline(
                UsageTag::NormalEdge,
                &[
                    PlotPoint::new(10, 10),
                    PlotPoint::new(110, 10),
                    PlotPoint::new(110, 110),
                    PlotPoint::new(10, 110),
                ],
                FillMode::Background,
            )
            .unwrap();
        let unrelated_cells = plot.cells_of(unrelated);

        // when, a flash with a hole
        let outer = dark_circle(&mut plot, (60, 60), 30);
        let hole = plot
            .draw_circle(
                UsageTag::InvertEdge,
                PlotPoint::new(60, 60),
                10,
                FillMode::Erase,
                ArcDirection::CounterClockwise,
            )
            .unwrap();
        let owned = IdSet::Ids(vec![outer]);
        let rect = plot.grid_rect();
        plot.erase_if_not_supported(&owned, hole, rect)
            .unwrap();
        plot.erase_by_builder_id(&owned, hole, rect)
            .unwrap();
        plot.erase_background_only_cells(hole, rect)
            .unwrap();

        // then
        assert_eq!(plot.cells_of(unrelated), unrelated_cells);
        assert!(plot
            .cell(60, 60)
            .is_some_and(|cell| !cell.contains(outer)));
        assert!(plot
            .cell(60, 80)
            .is_some_and(|cell| cell.contains(outer)));
        assert!(plot
            .cells_of(hole)
            .iter()
            .all(|(_, tag)| *tag == UsageTag::InvertEdge));
    }

    #[test]
    fn test_fill_by_boundary_of_contour_lines() {
        // given, a square made of four contour lines
        let mut plot = IsoPlot::new(60, 60);
        let corners = [(10, 10), (50, 10), (50, 50), (10, 50)];
        let ids: Vec<BuilderId> = (0..4)
            .map(|index| {
                let (a, b) = (corners[index], corners[(index + 1) % 4]);
                plot.draw_contour_line(UsageTag::ContourEdge, PlotPoint::new(a.0, a.1), PlotPoint::new(b.0, b.1))
            })
            .collect();

        // when
        let filled = plot
            .background_fill_by_boundary(&ids, ids[0], plot.grid_rect(), FillMode::Background, None)
            .unwrap();

        // then
        assert_eq!(filled, 39 * 39);
        assert_eq!(plot.usages_at(30, 30), &[Usage::new(ids[0], UsageTag::BackgroundFill)]);
        assert!(plot.usages_at(5, 30).is_empty());
        assert!(plot.is_edge(10, 30));
    }

    #[test]
    fn test_contour_arc_joins_rounded_end_points() {
        // given, an arc whose own end points miss the line ends by a fraction of a cell
        let mut plot = IsoPlot::new(50, 50);
        let arc = PlotArc {
            center: PlotPoint::new(28, 24),
            radius: 5,
            start_angle: -1.02,
            sweep_angle: 1.29,
            multi_quadrant: true,
        };
        let (start, end) = (PlotPoint::new(30, 20), PlotPoint::new(32, 25));
        let ids = vec![
            plot.draw_contour_line(UsageTag::ContourEdge, PlotPoint::new(20, 20), start),
            plot.draw_contour_arc(UsageTag::ContourEdge, start, end, arc),
            plot.draw_contour_line(UsageTag::ContourEdge, end, PlotPoint::new(20, 25)),
            plot.draw_contour_line(UsageTag::ContourEdge, PlotPoint::new(20, 25), PlotPoint::new(20, 20)),
        ];

        // when
        plot.background_fill_by_boundary(&ids, ids[0], plot.grid_rect(), FillMode::Background, None)
            .unwrap();

        // then
        let pieces = &plot.object(ids[1]).unwrap().pieces;
        assert_eq!(chain_ends(pieces), Some((to_f64(start), to_f64(end))));
        for x in 21..=31 {
            assert!(
                plot.cells_of(ids[0])
                    .iter()
                    .any(|(cell, tag)| cell.x == x && *tag == UsageTag::BackgroundFill),
                "column {} has no fill",
                x
            );
        }
    }

    #[test]
    fn test_fill_limit_is_checked_before_mutation() {
        // given
        let mut plot = IsoPlot::new(100, 100).with_fill_limit(Some(100));

        // when
        let result = plot.draw_circle(
            UsageTag::NormalEdge,
            PlotPoint::new(50, 50),
            30,
            FillMode::Background,
            ArcDirection::CounterClockwise,
        );

        // then
        assert!(matches!(result, Err(IsoPlotError::FillLimitExceeded { limit: 100, .. })));
        assert_eq!(plot.occupied_count(), 0);
        assert_eq!(plot.object_count(), 0);
    }

    #[test]
    fn test_arc_outline() {
        // given
        let mut plot = IsoPlot::new(100, 100);
        let arc = PlotArc {
            center: PlotPoint::new(50, 50),
            radius: 20,
            start_angle: 0.0,
            sweep_angle: std::f64::consts::FRAC_PI_2,
            multi_quadrant: true,
        };

        // when
        let id = plot
            .draw_arc_outline(UsageTag::NormalEdge, arc, 6, FillMode::Background)
            .unwrap();

        // then, the stroke covers the arc midpoint but not the center or the opposite quadrant
        let middle = std::f64::consts::FRAC_PI_4;
        let (x, y) = (
            (50.0 + 20.0 * middle.cos()).round() as i32,
            (50.0 + 20.0 * middle.sin()).round() as i32,
        );
        assert!(plot
            .cell(x, y)
            .is_some_and(|cell| cell.contains(id)));
        assert!(plot.usages_at(50, 50).is_empty());
        assert!(plot.usages_at(30, 50).is_empty());
        assert!(plot.usages_at(50, 30).is_empty());
    }

    #[test]
    fn test_degenerate_outline_is_rejected() {
        let mut plot = IsoPlot::new(10, 10);
        let result = plot.draw_outline(
            UsageTag::NormalEdge,
            &[PlotPoint::new(1, 1), PlotPoint::new(5, 5), PlotPoint::new(1, 1)],
            FillMode::None,
        );
        assert_eq!(result, Err(IsoPlotError::DegenerateOutline(2)));
    }

    #[test]
    fn test_bounded_operations_never_touch_cells_outside_rect() {
        init();
        let mut rng = StdRng::seed_from_u64(0x150);

        for _ in 0..25 {
            // given, a shape and a random rect smaller than its true extent
            let mut plot = IsoPlot::new(120, 120);
            let copper = dark_circle(&mut plot, (60, 60), 40);
            let outline = [(20, 20), (100, 20), (100, 100), (20, 100)];
            let boundary: Vec<BuilderId> = (0..4)
                .map(|index| {
                    let (a, b) = (outline[index], outline[(index + 1) % 4]);
                    plot.draw_contour_line(UsageTag::ContourEdge, PlotPoint::new(a.0, a.1), PlotPoint::new(b.0, b.1))
                })
                .collect();
            let eraser = plot
                .draw_circle(
                    UsageTag::InvertEdge,
                    PlotPoint::new(60, 60),
                    45,
                    FillMode::Erase,
                    ArcDirection::CounterClockwise,
                )
                .unwrap();
            let before = plot.clone();

            let x0 = rng.random_range(20..60);
            let y0 = rng.random_range(20..60);
            let rect = CellRect::new(x0, y0, x0 + rng.random_range(1..40), y0 + rng.random_range(1..40));

            // when
            plot.erase_by_builder_id(&IdSet::Ids(vec![copper]), eraser, rect)
                .unwrap();
            plot.background_fill_by_boundary(&boundary, boundary[0], rect, FillMode::Background, None)
                .unwrap();

            // then
            for y in 0..120 {
                for x in 0..120 {
                    if !rect.contains(x, y) {
                        assert_eq!(plot.cell(x, y), before.cell(x, y), "cell ({},{}) outside {:?}", x, y, rect);
                    }
                }
            }
        }
    }

    #[test]
    fn test_identical_sequences_give_identical_grids() {
        let build = || {
            let mut plot = IsoPlot::new(80, 80);
            dark_circle(&mut plot, (30, 30), 12);
            plot.draw_line_outline(
                UsageTag::NormalEdge,
                PlotPoint::new(5, 70),
                PlotPoint::new(70, 5),
                4,
                FillMode::Background,
            )
            .unwrap();
            plot
        };
        assert_eq!(build(), build());
    }
}
