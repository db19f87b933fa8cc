//! Boundary pieces and interior spans.
//!
//! Interiors are found with a vertical scan per cell column: every boundary piece crossed by the column's center line
//! contributes one crossing, crossings are sorted and paired (even-odd), cells between a pair are inside. Pieces are kept
//! as exact lines and x-monotone half arcs so the parity never depends on how the edges were rasterized, reversed or
//! duplicated pieces cancel out.

use std::f64::consts::{PI, TAU};

use log::trace;
use nalgebra::Point2;

use super::raster::CellRect;
use crate::geometry::ArcGeometry;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BoundaryPiece {
    Line {
        start: Point2<f64>,
        end: Point2<f64>,
    },
    /// An arc that lies entirely in the upper (`y >= center.y`) or lower half of its circle, so at most one point of
    /// it shares any x coordinate.
    HalfArc {
        center: Point2<f64>,
        radius: f64,
        start: Point2<f64>,
        end: Point2<f64>,
        upper: bool,
    },
}

impl BoundaryPiece {
    fn end_points(&self) -> (Point2<f64>, Point2<f64>) {
        match self {
            BoundaryPiece::Line {
                start,
                end,
            } => (*start, *end),
            BoundaryPiece::HalfArc {
                start,
                end,
                ..
            } => (*start, *end),
        }
    }

    /// Y coordinate where the vertical line at `x` crosses the piece.
    ///
    /// Half-open in x so a vertex shared by two pieces is counted once.
    pub(crate) fn crossing(&self, x: f64) -> Option<f64> {
        let (start, end) = self.end_points();
        if (start.x <= x) == (end.x <= x) {
            return None;
        }
        let y = match self {
            BoundaryPiece::Line {
                start,
                end,
            } => start.y + (x - start.x) * (end.y - start.y) / (end.x - start.x),
            BoundaryPiece::HalfArc {
                center,
                radius,
                upper,
                ..
            } => {
                let dx = x - center.x;
                let h = (radius * radius - dx * dx).max(0.0).sqrt();
                if *upper {
                    center.y + h
                } else {
                    center.y - h
                }
            }
        };
        Some(y)
    }

    pub(crate) fn extent(&self) -> (Point2<f64>, Point2<f64>) {
        match self {
            BoundaryPiece::Line {
                start,
                end,
            } => (
                Point2::new(start.x.min(end.x), start.y.min(end.y)),
                Point2::new(start.x.max(end.x), start.y.max(end.y)),
            ),
            BoundaryPiece::HalfArc {
                center,
                radius,
                start,
                end,
                upper,
            } => {
                let (min_y, max_y) = if *upper {
                    (start.y.min(end.y), center.y + radius)
                } else {
                    (center.y - radius, start.y.max(end.y))
                };
                (
                    Point2::new(start.x.min(end.x), min_y),
                    Point2::new(start.x.max(end.x), max_y),
                )
            }
        }
    }

    fn horizontal_at(&self) -> Option<f64> {
        match self {
            BoundaryPiece::Line {
                start,
                end,
            } if (start.y - end.y).abs() < EPSILON && (start.x - end.x).abs() >= EPSILON => Some(start.y),
            _ => None,
        }
    }

    fn vertical_at(&self) -> Option<f64> {
        match self {
            BoundaryPiece::Line {
                start,
                end,
            } if (start.x - end.x).abs() < EPSILON && (start.y - end.y).abs() >= EPSILON => Some(start.x),
            _ => None,
        }
    }
}

/// An inclusive run of interior cells in one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub x: i32,
    pub y0: i32,
    pub y1: i32,
}

impl Span {
    pub(crate) fn len(&self) -> usize {
        (self.y1 - self.y0 + 1) as usize
    }
}

pub(crate) fn polygon_pieces(vertices: &[Point2<f64>]) -> Vec<BoundaryPiece> {
    vertices
        .iter()
        .enumerate()
        .map(|(index, start)| BoundaryPiece::Line {
            start: *start,
            end: vertices[(index + 1) % vertices.len()],
        })
        .collect()
}

/// Splits an arc at every multiple of π so each piece is x-monotone. A zero sweep is a full circle.
///
/// Consecutive pieces share their end points exactly, a full circle ends where it starts.
pub(crate) fn arc_pieces(arc: &ArcGeometry) -> Vec<BoundaryPiece> {
    let full_circle = arc.is_full_circle();
    let sweep = if full_circle {
        if arc.sweep_angle < 0.0 {
            -TAU
        } else {
            TAU
        }
    } else {
        arc.sweep_angle
    };
    let start_angle = arc.start_angle;
    let end_angle = start_angle + sweep;

    let mut angles = vec![start_angle];
    if sweep > 0.0 {
        let mut k = (start_angle / PI).floor() + 1.0;
        while k * PI < end_angle - EPSILON {
            angles.push(k * PI);
            k += 1.0;
        }
    } else {
        let mut k = (start_angle / PI).ceil() - 1.0;
        while k * PI > end_angle + EPSILON {
            angles.push(k * PI);
            k -= 1.0;
        }
    }
    angles.push(end_angle);
    // a split point within epsilon of the start would leave a sliver piece
    angles.dedup_by(|next, previous| (*next - *previous).abs() <= EPSILON);

    let mut points: Vec<Point2<f64>> = angles
        .iter()
        .map(|angle| point_on_circle(arc, *angle))
        .collect();
    if full_circle && points.len() > 1 {
        let first = points[0];
        if let Some(last) = points.last_mut() {
            *last = first;
        }
    }

    angles
        .windows(2)
        .zip(points.windows(2))
        .map(|(angle_pair, point_pair)| {
            let middle = (angle_pair[0] + angle_pair[1]) / 2.0;
            BoundaryPiece::HalfArc {
                center: arc.center,
                radius: arc.radius,
                start: point_pair[0],
                end: point_pair[1],
                upper: middle.sin() >= 0.0,
            }
        })
        .collect()
}

/// Start of the first piece and end of the last one.
pub(crate) fn chain_ends(pieces: &[BoundaryPiece]) -> Option<(Point2<f64>, Point2<f64>)> {
    let (start, _) = pieces.first()?.end_points();
    let (_, end) = pieces.last()?.end_points();
    Some((start, end))
}

/// Split points at multiples of π are snapped onto the horizontal diameter.
fn point_on_circle(arc: &ArcGeometry, angle: f64) -> Point2<f64> {
    let turns = angle / PI;
    if (turns - turns.round()).abs() < EPSILON {
        let sign = if (turns.round() as i64).rem_euclid(2) == 0 { 1.0 } else { -1.0 };
        return Point2::new(arc.center.x + sign * arc.radius, arc.center.y);
    }
    arc.point_at(angle)
}

/// Bounding cells of a set of pieces.
pub(crate) fn pieces_extent<'a, I>(pieces: I) -> Option<CellRect>
where
    I: IntoIterator<Item = &'a BoundaryPiece>,
{
    pieces
        .into_iter()
        .map(|piece| {
            let (min, max) = piece.extent();
            CellRect::enclosing(min, max)
        })
        .reduce(|a, b| a.union(&b))
}

/// Interior spans of the region bounded by `pieces`, clipped to `region`.
#[profiling::function]
pub(crate) fn interior_spans(pieces: &[&BoundaryPiece], region: CellRect) -> Vec<Span> {
    if let Some(spans) = rectangle_spans(pieces, region) {
        return spans;
    }

    let mut spans = Vec::new();
    let mut crossings: Vec<f64> = Vec::new();
    for x in region.min.x..=region.max.x {
        crossings.clear();
        crossings.extend(
            pieces
                .iter()
                .filter_map(|piece| piece.crossing(x as f64)),
        );
        if crossings.len() % 2 != 0 {
            trace!("odd crossing count {} at column {}, boundary is open", crossings.len(), x);
        }
        crossings.sort_by(f64::total_cmp);

        for pair in crossings.chunks_exact(2) {
            let y0 = (pair[0].ceil() as i32).max(region.min.y);
            let y1 = (pair[1].floor() as i32).min(region.max.y);
            if y0 > y1 {
                continue;
            }
            // pairs meeting on a shared boundary would count that cell twice
            match spans.last_mut() {
                Some(last) if last.x == x && y0 <= last.y1 + 1 => last.y1 = last.y1.max(y1),
                _ => spans.push(Span {
                    x,
                    y0,
                    y1,
                }),
            }
        }
    }
    spans
}

/// Fast path for an axis aligned rectangle made of exactly two full width horizontal and two vertical pieces.
///
/// Produces the same spans as the column scan.
fn rectangle_spans(pieces: &[&BoundaryPiece], region: CellRect) -> Option<Vec<Span>> {
    if pieces.len() != 4 {
        return None;
    }
    let horizontal: Vec<f64> = pieces
        .iter()
        .filter_map(|piece| piece.horizontal_at())
        .collect();
    let vertical: Vec<f64> = pieces
        .iter()
        .filter_map(|piece| piece.vertical_at())
        .collect();
    if horizontal.len() != 2 || vertical.len() != 2 {
        return None;
    }

    let (min_x, max_x) = (vertical[0].min(vertical[1]), vertical[0].max(vertical[1]));
    let (min_y, max_y) = (horizontal[0].min(horizontal[1]), horizontal[0].max(horizontal[1]));
    let spans_full_width = pieces.iter().all(|piece| {
        let (min, max) = piece.extent();
        match piece.horizontal_at() {
            Some(_) => (min.x - min_x).abs() < EPSILON && (max.x - max_x).abs() < EPSILON,
            None => (min.y - min_y).abs() < EPSILON && (max.y - max_y).abs() < EPSILON,
        }
    });
    if !spans_full_width || max_x - min_x < EPSILON {
        return None;
    }

    // columns crossed by the half-open horizontal pieces
    let first_x = (min_x.ceil() as i32).max(region.min.x);
    let last_x = {
        let last = max_x.ceil() as i32 - 1;
        last.min(region.max.x)
    };
    let y0 = (min_y.ceil() as i32).max(region.min.y);
    let y1 = (max_y.floor() as i32).min(region.max.y);
    if y0 > y1 {
        return Some(vec![]);
    }

    Some(
        (first_x..=last_x)
            .map(|x| Span {
                x,
                y0,
                y1,
            })
            .collect(),
    )
}
