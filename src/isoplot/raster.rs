//! Cell rasterization of boundaries.

use nalgebra::Point2;

use crate::geometry::ArcGeometry;

pub type PlotPoint = Point2<i32>;

/// An inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellRect {
    pub min: PlotPoint,
    pub max: PlotPoint,
}

impl CellRect {
    /// Corners may be given in any order.
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            min: PlotPoint::new(x0.min(x1), y0.min(y1)),
            max: PlotPoint::new(x0.max(x1), y0.max(y1)),
        }
    }

    pub fn from_point(point: PlotPoint) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x + 1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y + 1) as u32
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min.x && x <= self.max.x && y >= self.min.y && y <= self.max.y
    }

    pub fn intersect(&self, other: &CellRect) -> Option<CellRect> {
        let min = PlotPoint::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = PlotPoint::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if min.x > max.x || min.y > max.y {
            None
        } else {
            Some(CellRect {
                min,
                max,
            })
        }
    }

    pub fn expand_point(&mut self, x: i32, y: i32) {
        self.min.x = self.min.x.min(x);
        self.min.y = self.min.y.min(y);
        self.max.x = self.max.x.max(x);
        self.max.y = self.max.y.max(y);
    }

    pub fn union(&self, other: &CellRect) -> CellRect {
        let mut result = *self;
        result.expand_point(other.min.x, other.min.y);
        result.expand_point(other.max.x, other.max.y);
        result
    }

    /// Smallest rect containing the floating point extent `min..max`.
    pub fn enclosing(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self::new(
            min.x.floor() as i32,
            min.y.floor() as i32,
            max.x.ceil() as i32,
            max.y.ceil() as i32,
        )
    }
}

/// Bresenham line, both end points included.
pub fn line_cells(start: PlotPoint, end: PlotPoint) -> Vec<PlotPoint> {
    let dx = (end.x - start.x).abs();
    let dy = -(end.y - start.y).abs();
    let sx = if start.x < end.x { 1 } else { -1 };
    let sy = if start.y < end.y { 1 } else { -1 };

    let mut cells = Vec::with_capacity((dx - dy + 1) as usize);
    let (mut x, mut y) = (start.x, start.y);
    let mut error = dx + dy;
    loop {
        cells.push(PlotPoint::new(x, y));
        if x == end.x && y == end.y {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x += sx;
        }
        if doubled <= dx {
            error += dx;
            y += sy;
        }
    }
    cells
}

/// Cells of a polygon's edges, the polygon is implicitly closed.
pub fn polygon_cells(vertices: &[Point2<f64>]) -> Vec<PlotPoint> {
    let mut cells = Vec::new();
    for (index, vertex) in vertices.iter().enumerate() {
        let next = vertices[(index + 1) % vertices.len()];
        cells.extend(line_cells(round_point(*vertex), round_point(next)));
    }
    cells
}

/// Midpoint circle ring.
pub fn circle_cells(center: PlotPoint, radius: i32) -> Vec<PlotPoint> {
    if radius <= 0 {
        return vec![center];
    }
    let mut cells = Vec::with_capacity(radius as usize * 8);
    let (mut x, mut y) = (radius, 0);
    let mut decision = 1 - radius;
    while x >= y {
        for (ox, oy) in [
            (x, y),
            (y, x),
            (-y, x),
            (-x, y),
            (-x, -y),
            (-y, -x),
            (y, -x),
            (x, -y),
        ] {
            cells.push(PlotPoint::new(center.x + ox, center.y + oy));
        }
        y += 1;
        if decision < 0 {
            decision += 2 * y + 1;
        } else {
            x -= 1;
            decision += 2 * (y - x) + 1;
        }
    }
    cells
}

/// Ring cells of `arc` whose angle lies within the sweep, the arc's center and radius are in cells.
pub fn arc_cells(arc: &ArcGeometry) -> Vec<PlotPoint> {
    let center = round_point(arc.center);
    let radius = arc.radius.round() as i32;
    let mut cells: Vec<PlotPoint> = circle_cells(center, radius)
        .into_iter()
        .filter(|cell| {
            let angle = ((cell.y - center.y) as f64).atan2((cell.x - center.x) as f64);
            arc.contains_angle(angle)
        })
        .collect();

    // the ring filter can miss the exact end cells on small radii
    cells.push(round_point(arc.start_point()));
    cells.push(round_point(arc.end_point()));
    cells
}

/// Rounds a point that is already in plot space to its cell, geometry is converted to plot space by `PlotScale`.
pub(crate) fn round_point(point: Point2<f64>) -> PlotPoint {
    PlotPoint::new(point.x.round() as i32, point.y.round() as i32)
}
