/// Axis-aligned bounding box

use glam::{Mat4, Vec3};

/// World- or local-space axis-aligned bounding box
///
/// A box with `min == max` is a point and is culled like one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Box spanning two corners given in any order
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self { min: a.min(b), max: a.max(b) }
    }

    /// Zero-volume box at `point`
    pub fn point(point: Vec3) -> Self {
        Self { min: point, max: point }
    }

    /// Cube of half-size `radius` around `center`
    pub fn from_center_radius(center: Vec3, radius: f32) -> Self {
        let r = Vec3::splat(radius.abs());
        Self { min: center - r, max: center + r }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Transform this box by a matrix, returning the enclosing box.
    ///
    /// Arvo's method: projects each matrix axis onto the extents instead of
    /// transforming all 8 corners.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let translation = matrix.col(3).truncate();
        let mut new_min = translation;
        let mut new_max = translation;

        for i in 0..3 {
            let axis = matrix.col(i).truncate();
            let a = axis * self.min[i];
            let b = axis * self.max[i];
            new_min += a.min(b);
            new_max += a.max(b);
        }

        AABB { min: new_min, max: new_max }
    }

    /// True if `other` lies entirely within `self` (boundaries inclusive)
    pub fn contains(&self, other: &AABB) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// True if the boxes overlap or touch
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_new_orders_corners() {
        let aabb = AABB::new(Vec3::new(1.0, -1.0, 5.0), Vec3::new(-1.0, 1.0, 2.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -1.0, 2.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 1.0, 5.0));
    }

    #[test]
    fn test_contains_and_intersects() {
        let big = AABB::new(Vec3::splat(-10.0), Vec3::splat(10.0));
        let small = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let straddling = AABB::new(Vec3::splat(5.0), Vec3::splat(15.0));
        let far = AABB::new(Vec3::splat(20.0), Vec3::splat(30.0));

        assert!(big.contains(&small));
        assert!(!small.contains(&big));
        assert!(!big.contains(&straddling));
        assert!(big.intersects(&straddling));
        assert!(!big.intersects(&far));
    }

    #[test]
    fn test_point_is_contained_on_boundary() {
        let big = AABB::new(Vec3::splat(-10.0), Vec3::splat(10.0));
        assert!(big.contains(&AABB::point(Vec3::splat(10.0))));
        assert!(!big.contains(&AABB::point(Vec3::splat(10.5))));
    }

    #[test]
    fn test_transformed_translation_and_scale() {
        let unit = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let m = Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Quat::IDENTITY, Vec3::new(5.0, 0.0, 0.0));
        let t = unit.transformed(&m);
        assert_eq!(t.min, Vec3::new(3.0, -2.0, -2.0));
        assert_eq!(t.max, Vec3::new(7.0, 2.0, 2.0));
    }

    #[test]
    fn test_transformed_rotation_encloses_corners() {
        let unit = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let m = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let t = unit.transformed(&m);
        let expected = std::f32::consts::SQRT_2;
        assert!((t.max.x - expected).abs() < 1e-5);
        assert!((t.max.y - 1.0).abs() < 1e-5);
    }
}
