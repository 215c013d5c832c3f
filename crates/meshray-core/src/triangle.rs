//! Triangle primitive and ray-triangle intersection.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::constants::TRIANGLE_EPSILON;
use crate::math::{Aabb, Ray};

/// A triangle given by its three corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

/// Parameters of a ray-triangle intersection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleHit {
    /// Ray parameter of the hit point.
    pub t: f32,
    /// Barycentric weight of corner `b`.
    pub u: f32,
    /// Barycentric weight of corner `c`.
    pub v: f32,
}

impl Triangle {
    /// Create a new triangle
    #[inline]
    pub const fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Corners as an array
    #[inline]
    pub const fn vertices(&self) -> [Vec3; 3] {
        [self.a, self.b, self.c]
    }

    /// Tight bounding box of the three corners
    #[inline]
    pub fn bounding_box(&self) -> Aabb {
        Aabb::new(
            self.a.min(self.b).min(self.c),
            self.a.max(self.b).max(self.c),
        )
    }

    /// Average of the three corners
    #[inline]
    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    /// Unnormalized face normal (`(b - a) x (c - a)`)
    #[inline]
    pub fn normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    /// Point at barycentric coordinates `(u, v)`
    #[inline]
    pub fn point_at(&self, u: f32, v: f32) -> Vec3 {
        self.a * (1.0 - u - v) + self.b * u + self.c * v
    }

    /// Möller–Trumbore intersection, double sided.
    ///
    /// Only hits with `ray.t_min <= t <= ray.t_max` are reported.
    pub fn intersect(&self, ray: &Ray) -> Option<TriangleHit> {
        let e1 = self.b - self.a;
        let e2 = self.c - self.a;
        let p = ray.direction.cross(e2);
        let det = e1.dot(p);
        let scale = e1.length() * e2.length() * ray.direction.length();
        if det.abs() <= TRIANGLE_EPSILON * scale {
            return None;
        }
        let inv_det = 1.0 / det;
        if !inv_det.is_finite() {
            return None;
        }

        let s = ray.origin - self.a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(e1);
        let v = ray.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = e2.dot(q) * inv_det;
        (t >= ray.t_min && t <= ray.t_max).then_some(TriangleHit { t, u, v })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    #[test]
    fn bounding_box_and_centroid() {
        let tri = Triangle::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(3.0, 0.0, 0.0), Vec3::Y);
        let aabb = tri.bounding_box();
        assert_eq!(aabb.min, Vec3::ZERO);
        assert_eq!(aabb.max, Vec3::new(3.0, 1.0, 1.0));
        assert_relative_eq!(tri.centroid().x, 1.0);
        assert_relative_eq!(tri.centroid().y, 1.0 / 3.0);
    }

    #[test]
    fn hit_from_above() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 10.0), Vec3::NEG_Z);
        let hit = unit_triangle().intersect(&ray).unwrap();
        assert_relative_eq!(hit.t, 10.0);
        assert_relative_eq!(hit.u, 0.25);
        assert_relative_eq!(hit.v, 0.25);
    }

    #[test]
    fn hit_from_below() {
        let ray = Ray::new(Vec3::new(0.25, 0.5, -2.0), Vec3::Z);
        let hit = unit_triangle().intersect(&ray).unwrap();
        assert_relative_eq!(hit.t, 2.0);
        assert_relative_eq!(hit.u + hit.v, 0.75);
    }

    #[test]
    fn barycentrics_reconstruct_hit_point() {
        let tri = Triangle::new(
            Vec3::new(-1.0, 0.0, 2.0),
            Vec3::new(2.0, 0.5, 2.5),
            Vec3::new(0.0, 3.0, 1.5),
        );
        let ray = Ray::new(Vec3::new(0.2, 1.0, -5.0), Vec3::new(0.0, 0.1, 1.0));
        let hit = tri.intersect(&ray).unwrap();
        let from_ray = ray.at(hit.t);
        let from_bary = tri.point_at(hit.u, hit.v);
        assert_relative_eq!(from_ray.x, from_bary.x, epsilon = 1e-4);
        assert_relative_eq!(from_ray.y, from_bary.y, epsilon = 1e-4);
        assert_relative_eq!(from_ray.z, from_bary.z, epsilon = 1e-4);
    }

    #[test]
    fn miss_outside_triangle() {
        let ray = Ray::new(Vec3::new(0.75, 0.75, 1.0), Vec3::NEG_Z);
        assert!(unit_triangle().intersect(&ray).is_none());
    }

    #[test]
    fn miss_parallel_ray() {
        let ray = Ray::new(Vec3::new(-1.0, 0.25, 0.0), Vec3::X);
        assert!(unit_triangle().intersect(&ray).is_none());
    }

    #[test]
    fn hit_small_triangle() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X * 1e-4, Vec3::Y * 1e-4);
        let ray = Ray::new(Vec3::new(2e-5, 3e-5, 1.0), Vec3::NEG_Z);
        let hit = tri.intersect(&ray).unwrap();
        assert_relative_eq!(hit.t, 1.0, epsilon = 1e-6);
        assert_relative_eq!(hit.u, 0.2, epsilon = 1e-4);
        assert_relative_eq!(hit.v, 0.3, epsilon = 1e-4);
    }

    #[test]
    fn hit_with_short_direction() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z * 1e-8);
        let hit = unit_triangle().intersect(&ray).unwrap();
        assert_relative_eq!(hit.t, 1e8, max_relative = 1e-5);
        assert_relative_eq!(ray.at(hit.t).z, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn miss_outside_range() {
        let origin = Vec3::new(0.25, 0.25, 10.0);
        let tri = unit_triangle();
        assert!(tri
            .intersect(&Ray::with_range(origin, Vec3::NEG_Z, 0.0, 5.0))
            .is_none());
        assert!(tri
            .intersect(&Ray::with_range(origin, Vec3::NEG_Z, 11.0, 100.0))
            .is_none());
        // Behind the origin
        assert!(tri.intersect(&Ray::new(origin, Vec3::Z)).is_none());
    }

    #[test]
    fn degenerate_triangle_never_hits() {
        let tri = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        let ray = Ray::new(Vec3::new(0.5, 0.0, 1.0), Vec3::NEG_Z);
        assert!(tri.intersect(&ray).is_none());
    }
}
