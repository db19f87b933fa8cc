use std::f64::consts::{FRAC_PI_2, TAU};

use log::trace;
use nalgebra::{Point2, Vector2};

use super::bounding_box::BoundingBox;

const ANGLE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// G02
    Clockwise,
    /// G03
    CounterClockwise,
}

/// Normalizes an angle into the range `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(TAU);
    if (TAU - normalized).abs() < ANGLE_EPSILON {
        0.0
    } else {
        normalized
    }
}

/// Signed sweep from `start_angle` to `end_angle` travelling in `direction`.
///
/// Positive = counter-clockwise. Coincident angles give a sweep of 0.0, the caller decides whether that is a full
/// circle (multi-quadrant) or nothing (single-quadrant).
pub fn sweep_angle(start_angle: f64, end_angle: f64, direction: ArcDirection) -> f64 {
    let delta = normalize_angle(end_angle) - normalize_angle(start_angle);
    if delta.abs() < ANGLE_EPSILON {
        return 0.0;
    }
    match direction {
        ArcDirection::CounterClockwise => {
            if delta < 0.0 {
                delta + TAU
            } else {
                delta
            }
        }
        ArcDirection::Clockwise => {
            if delta > 0.0 {
                delta - TAU
            } else {
                delta
            }
        }
    }
}

/// A circular arc in any coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcGeometry {
    pub center: Point2<f64>,
    pub radius: f64,
    /// in radians
    pub start_angle: f64,
    /// in radians, positive = counter-clockwise, 0.0 or ±2π = full circle
    pub sweep_angle: f64,
}

impl ArcGeometry {
    /// Resolves an arc from a start point, an end point and a center offset relative to the START point.
    pub fn from_multi_quadrant(
        start: Point2<f64>,
        end: Point2<f64>,
        center_offset: Vector2<f64>,
        direction: ArcDirection,
    ) -> Self {
        let center = start + center_offset;
        let radius = (center_offset.x * center_offset.x + center_offset.y * center_offset.y).sqrt();
        let start_angle = (start.y - center.y).atan2(start.x - center.x);
        let end_angle = (end.y - center.y).atan2(end.x - center.x);

        Self {
            center,
            radius,
            start_angle,
            sweep_angle: sweep_angle(start_angle, end_angle, direction),
        }
    }

    /// In single-quadrant mode the offsets are unsigned, the center is the candidate that gives an arc of at most 90°
    /// in the requested direction with the closest start/end radii.
    pub fn from_single_quadrant(
        start: Point2<f64>,
        end: Point2<f64>,
        center_offset: Vector2<f64>,
        direction: ArcDirection,
    ) -> Self {
        let (i, j) = (center_offset.x.abs(), center_offset.y.abs());
        let candidates = [
            Vector2::new(i, j),
            Vector2::new(-i, j),
            Vector2::new(i, -j),
            Vector2::new(-i, -j),
        ];

        let mut best: Option<(f64, ArcGeometry)> = None;
        let mut fallback: Option<(f64, ArcGeometry)> = None;
        for offset in candidates {
            let candidate = Self::from_multi_quadrant(start, end, offset, direction);
            let end_radius = ((end.x - candidate.center.x).powi(2) + (end.y - candidate.center.y).powi(2)).sqrt();
            let mismatch = (candidate.radius - end_radius).abs();

            if fallback
                .as_ref()
                .map_or(true, |(best_mismatch, _)| mismatch < *best_mismatch)
            {
                fallback = Some((mismatch, candidate));
            }

            if candidate.sweep_angle.abs() <= FRAC_PI_2 + ANGLE_EPSILON
                && best
                    .as_ref()
                    .map_or(true, |(best_mismatch, _)| mismatch < *best_mismatch)
            {
                best = Some((mismatch, candidate));
            }
        }

        let (mismatch, arc) = best
            .or(fallback)
            .unwrap_or((0.0, Self::from_multi_quadrant(start, end, center_offset, direction)));
        trace!("single quadrant arc: {:?}, radius mismatch: {}", arc, mismatch);
        arc
    }

    /// Gerber 4.7.2 "When start point and end point coincide the result is a full 360° arc"
    ///
    /// Compared with a tolerance to avoid being too strict due to rounding errors.
    pub fn is_full_circle(&self) -> bool {
        self.sweep_angle.abs() < ANGLE_EPSILON || (self.sweep_angle.abs() - TAU).abs() < ANGLE_EPSILON
    }

    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.sweep_angle
    }

    pub fn point_at(&self, angle: f64) -> Point2<f64> {
        Point2::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }

    pub fn start_point(&self) -> Point2<f64> {
        self.point_at(self.start_angle)
    }

    pub fn end_point(&self) -> Point2<f64> {
        self.point_at(self.end_angle())
    }

    /// Absolute points along the arc, first and last points are the arc's end points.
    ///
    /// A zero sweep is treated as a full circle here, callers that want a degenerate arc must check first.
    pub fn generate_points(&self, steps: usize) -> Vec<Point2<f64>> {
        let steps = steps.max(2);
        let effective_sweep = if self.is_full_circle() {
            if self.sweep_angle < 0.0 {
                -TAU
            } else {
                TAU
            }
        } else {
            self.sweep_angle
        };

        let angle_step = effective_sweep / (steps - 1) as f64;
        let mut points: Vec<Point2<f64>> = (0..steps)
            .map(|i| self.point_at(self.start_angle + angle_step * i as f64))
            .collect();

        // Ensure exact closure for full circles
        if self.is_full_circle() {
            points[steps - 1] = points[0];
        }

        points
    }

    /// Bounding box of the arc stroked with `width`, exact at the axis extremes.
    pub fn bounding_box(&self, width: f64) -> BoundingBox {
        let outer = self.radius + width / 2.0;
        if self.is_full_circle() {
            return BoundingBox::around(self.center, outer);
        }

        let mut bbox = BoundingBox::from_points(&[self.start_point(), self.end_point()]);
        let (from, to) = if self.sweep_angle >= 0.0 {
            (self.start_angle, self.end_angle())
        } else {
            (self.end_angle(), self.start_angle)
        };

        // axis crossings within the sweep
        let mut quadrant_angle = (from / FRAC_PI_2).ceil() * FRAC_PI_2;
        while quadrant_angle <= to + ANGLE_EPSILON {
            bbox.expand_point(self.point_at(quadrant_angle));
            quadrant_angle += FRAC_PI_2;
        }

        bbox.inflate(width / 2.0)
    }

    /// Number of polyline steps needed to keep the chord error below half a cell for a radius in cells.
    pub fn steps_for_radius(radius: f64, sweep: f64) -> usize {
        let sweep = if sweep.abs() < ANGLE_EPSILON { TAU } else { sweep.abs() };
        if radius <= 1.0 {
            return 8;
        }
        // chord error e = r(1 - cos(θ/2)), solve for θ with e = 0.25
        let max_step = 2.0 * (1.0 - 0.25 / radius).clamp(-1.0, 1.0).acos();
        let steps = (sweep / max_step.max(1e-3)).ceil() as usize + 1;
        steps.clamp(8, 1 + (sweep * radius).ceil() as usize * 2 + 8)
    }
}

impl ArcGeometry {
    /// True when `angle` lies on the arc, full circles contain every angle.
    pub fn contains_angle(&self, angle: f64) -> bool {
        if self.is_full_circle() {
            return true;
        }
        let offset = if self.sweep_angle >= 0.0 {
            normalize_angle(angle - self.start_angle)
        } else {
            normalize_angle(self.start_angle - angle)
        };
        offset <= self.sweep_angle.abs() + ANGLE_EPSILON || (TAU - offset) < ANGLE_EPSILON
    }
}
