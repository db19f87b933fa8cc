use nalgebra::Point2;

/// Rotates a point counter-clockwise around the origin (0,0), as gerber macro primitives are rotated.
pub fn rotate_point(point: Point2<f64>, rotation_degrees: f64) -> Point2<f64> {
    if rotation_degrees == 0.0 {
        return point;
    }
    let (sin_theta, cos_theta) = rotation_degrees.to_radians().sin_cos();
    Point2::new(
        point.x * cos_theta - point.y * sin_theta,
        point.x * sin_theta + point.y * cos_theta,
    )
}

/// Vertices of a regular polygon, the first vertex on the positive X axis before rotation.
pub fn regular_polygon_vertices(diameter: f64, vertices_count: usize, rotation_degrees: f64) -> Vec<Point2<f64>> {
    let radius = diameter / 2.0;
    (0..vertices_count)
        .map(|i| {
            let angle = (2.0 * std::f64::consts::PI * i as f64) / vertices_count as f64;
            rotate_point(Point2::new(radius * angle.cos(), radius * angle.sin()), rotation_degrees)
        })
        .collect()
}
