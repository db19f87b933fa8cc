pub type Vector = nalgebra::Vector2<f64>;
pub type Position = nalgebra::Point2<f64>;

/// Euclidean distance, avoids `nalgebra`'s `RealField` bound which needs `std`/`libm` features.
pub fn distance(a: Position, b: Position) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

pub fn length(vector: Vector) -> f64 {
    (vector.x * vector.x + vector.y * vector.y).sqrt()
}

pub mod deduplicate {
    use crate::Position;

    pub trait DedupEpsilon {
        /// Drops vertices within `epsilon` of their predecessor and a closing vertex matching the first one.
        ///
        /// Returned unchanged if fewer than 3 vertices would remain.
        fn dedup_with_epsilon(self, epsilon: f64) -> Self;
    }

    impl DedupEpsilon for Vec<Position> {
        fn dedup_with_epsilon(self, epsilon: f64) -> Self {
            let near = |a: &Position, b: &Position| (a.x - b.x).abs() < epsilon && (a.y - b.y).abs() < epsilon;

            let mut kept: Vec<Position> = Vec::with_capacity(self.len());
            for vertex in &self {
                if !kept
                    .last()
                    .is_some_and(|last| near(last, vertex))
                {
                    kept.push(*vertex);
                }
            }
            if kept.len() > 1 && near(&kept[0], &kept[kept.len() - 1]) {
                kept.pop();
            }

            match kept.len() < 3 {
                true => self,
                false => kept,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use rstest::rstest;

        use super::*;

        fn points(values: &[(f64, f64)]) -> Vec<Position> {
            values
                .iter()
                .map(|(x, y)| Position::new(*x, *y))
                .collect()
        }

        #[rstest]
        #[case(&[], 0)]
        #[case(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (2.0, 0.0)], 3)]
        #[case(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)], 4)]
        #[case(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0000001), (1.0, 1.0)], 3)]
        fn test_dedup(#[case] input: &[(f64, f64)], #[case] expected: usize) {
            assert_eq!(points(input).dedup_with_epsilon(1e-6).len(), expected);
        }

        #[test]
        fn test_too_few_remaining_is_unchanged() {
            // given
            let vertices = points(&[(0.0, 0.0), (0.0, 0.0), (0.0, 0.0)]);

            // expect
            assert_eq!(vertices.clone().dedup_with_epsilon(1e-6), vertices);
        }
    }
}
