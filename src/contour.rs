//! Boundary segments of an open region (G36/G37).

use log::{debug, trace};

use crate::isoplot::{BuilderId, IsoPlot, PlotArc, PlotPoint, UsageTag};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySegment {
    pub start: PlotPoint,
    pub end: PlotPoint,
    /// `None` for a straight segment.
    pub arc: Option<PlotArc>,
    /// Set for duplicated horizontal or vertical segments, which describe slits and are not part of the boundary.
    pub coincident: bool,
}

impl BoundarySegment {
    pub fn line(start: PlotPoint, end: PlotPoint) -> Self {
        Self {
            start,
            end,
            arc: None,
            coincident: false,
        }
    }

    /// `start` and `end` are the rounded end points of the draw, not the points on the rounded arc.
    pub fn arc(start: PlotPoint, end: PlotPoint, arc: PlotArc) -> Self {
        Self {
            start,
            end,
            arc: Some(arc),
            coincident: false,
        }
    }

    fn is_axis_aligned(&self) -> bool {
        self.arc.is_none() && self.start != self.end && (self.start.x == self.end.x || self.start.y == self.end.y)
    }

    /// Both horizontal or both vertical with matching end points, in either order.
    pub fn is_coincident_with(&self, other: &BoundarySegment) -> bool {
        if !self.is_axis_aligned() || !other.is_axis_aligned() {
            return false;
        }
        (self.start == other.start && self.end == other.end) || (self.start == other.end && self.end == other.start)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundarySegments {
    segments: Vec<BoundarySegment>,
}

impl BoundarySegments {
    pub fn push(&mut self, segment: BoundarySegment) {
        trace!("boundary segment: {:?}", segment);
        self.segments.push(segment);
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[BoundarySegment] {
        &self.segments
    }

    /// Flags every segment that has a coincident partner, returns the number flagged.
    #[profiling::function]
    pub fn mark_coincident(&mut self) -> usize {
        let mut flagged = 0;
        for i in 0..self.segments.len() {
            for j in (i + 1)..self.segments.len() {
                if self.segments[i].is_coincident_with(&self.segments[j]) {
                    for index in [i, j] {
                        if !self.segments[index].coincident {
                            self.segments[index].coincident = true;
                            flagged += 1;
                        }
                    }
                }
            }
        }
        if flagged > 0 {
            debug!("{} coincident boundary segments excluded", flagged);
        }
        flagged
    }

    /// Stamps every non-coincident segment as a zero width contour edge, returns the ids in segment order.
    pub fn stamp(&self, plot: &mut IsoPlot) -> Vec<BuilderId> {
        self.segments
            .iter()
            .filter(|segment| !segment.coincident)
            .map(|segment| match segment.arc {
                Some(arc) => plot.draw_contour_arc(UsageTag::ContourEdge, segment.start, segment.end, arc),
                None => plot.draw_contour_line(UsageTag::ContourEdge, segment.start, segment.end),
            })
            .collect()
    }
}
