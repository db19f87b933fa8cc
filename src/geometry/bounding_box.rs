use log::trace;
use nalgebra::{Point2, Vector2};

/// Axis aligned extent in file units.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct BoundingBox {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

/// The empty box, anything expanded into it replaces it.
impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Point2::new(f64::MAX, f64::MAX),
            max: Point2::new(f64::MIN, f64::MIN),
        }
    }
}

impl BoundingBox {
    /// A square of `2 * radius` centered on `center`, used for aperture extents.
    pub fn around(center: Point2<f64>, radius: f64) -> Self {
        let half = Vector2::new(radius, radius);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points(points: &[Point2<f64>]) -> Self {
        let bbox = points
            .iter()
            .fold(BoundingBox::default(), |mut bbox, point| {
                bbox.expand_point(*point);
                bbox
            });
        trace!("bbox of {} points: {:?}", points.len(), bbox);
        bbox
    }

    pub fn expand(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.expand_point(other.min);
        self.expand_point(other.max);
    }

    pub fn expand_point(&mut self, point: Point2<f64>) {
        self.min = Point2::new(self.min.x.min(point.x), self.min.y.min(point.y));
        self.max = Point2::new(self.max.x.max(point.x), self.max.y.max(point.y));
    }

    /// Grown by `amount` on every side, the empty box stays empty.
    pub fn inflate(&self, amount: f64) -> Self {
        if self.is_empty() {
            return self.clone();
        }
        let delta = Vector2::new(amount, amount);
        Self {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    /// Only the default box is empty, a zero sized box around a point is not.
    pub fn is_empty(&self) -> bool {
        *self == BoundingBox::default()
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point2<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Corners counter-clockwise from `min`, usable as a closed outline.
    pub fn vertices(&self) -> Vec<Point2<f64>> {
        vec![
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

#[cfg(test)]
mod bbox_tests {
    use nalgebra::Point2;
    use rstest::rstest;

    use crate::geometry::bounding_box::BoundingBox;

    #[rstest]
    #[case(BoundingBox::default(), true)]
    #[case(BoundingBox::around(Point2::origin(), 0.0), false)]
    #[case(BoundingBox::from_points(&[]), true)]
    fn test_is_empty(#[case] input: BoundingBox, #[case] expected: bool) {
        assert_eq!(input.is_empty(), expected);
    }

    #[test]
    fn test_expand_ignores_empty() {
        // given
        let mut bbox = BoundingBox::around(Point2::new(1.0, 1.0), 1.0);

        // when
        bbox.expand(&BoundingBox::default());

        // then
        assert_eq!(bbox, BoundingBox {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(2.0, 2.0)
        });
    }

    #[test]
    fn test_from_points() {
        // when
        let bbox = BoundingBox::from_points(&[Point2::new(3.0, -1.0), Point2::new(-2.0, 4.0), Point2::new(0.0, 0.0)]);

        // then
        assert_eq!(bbox.min, Point2::new(-2.0, -1.0));
        assert_eq!(bbox.max, Point2::new(3.0, 4.0));
        assert_eq!((bbox.width(), bbox.height()), (5.0, 5.0));
        assert_eq!(bbox.center(), Point2::new(0.5, 1.5));
    }

    #[test]
    fn test_inflate() {
        let bbox = BoundingBox {
            min: Point2::new(1.0, 2.0),
            max: Point2::new(3.0, 4.0),
        };

        let inflated = bbox.inflate(0.5);

        assert_eq!(inflated.min, Point2::new(0.5, 1.5));
        assert_eq!(inflated.max, Point2::new(3.5, 4.5));
        assert!(BoundingBox::default()
            .inflate(1.0)
            .is_empty());
    }
}
