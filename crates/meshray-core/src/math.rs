//! Rays and axis-aligned boxes.

use glam::Vec3;

/// Half-line with an accepted parameter interval.
///
/// The direction is stored as given, so `t` is measured in multiples of
/// `direction`. Only hits with `t_min <= t <= t_max` are valid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    /// Unbounded ray, `t` in `[0, inf)`.
    #[inline]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::with_range(origin, direction, 0.0, f32::INFINITY)
    }

    /// Ray accepting `t` in `[t_min, t_max]`.
    #[inline]
    pub const fn with_range(origin: Vec3, direction: Vec3, t_min: f32, t_max: f32) -> Self {
        Self {
            origin,
            direction,
            t_min,
            t_max,
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Component-wise reciprocal of the direction.
    ///
    /// Zero components map to signed infinities, which the slab test relies on.
    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        Vec3::ONE / self.direction
    }
}

/// Axis-aligned box. `min > max` on any axis means empty.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// Inverted box that acts as the identity for [`Aabb::union`].
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tight bounds of `points`. Empty for no points.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut aabb, p| {
            aabb.extend_point(p);
            aabb
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Extent per axis.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Surface area, zero when empty.
    #[inline]
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.size();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// 0, 1 or 2 for the widest axis.
    #[inline]
    pub fn largest_axis(&self) -> usize {
        let d = self.size();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// True if `other` fits inside, boundaries included. An empty `other`
    /// always fits.
    #[inline]
    pub fn contains_aabb(&self, other: &Self) -> bool {
        other.is_empty() || (other.min.cmpge(self.min).all() && other.max.cmple(self.max).all())
    }

    /// Grow to include `point`.
    #[inline]
    pub fn extend_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box enclosing both.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Slab test against the ray's `[t_min, t_max]` interval.
    ///
    /// Returns `(t_near, t_far)` clipped to the ray range, or `None` if the
    /// ray cannot enter the box within that range.
    #[inline]
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32)> {
        self.intersect_ray_inv(ray, ray.inv_direction())
    }

    /// Same as [`Aabb::intersect_ray`] with a precomputed reciprocal direction.
    #[inline]
    pub fn intersect_ray_inv(&self, ray: &Ray, inv_dir: Vec3) -> Option<(f32, f32)> {
        let t1 = (self.min - ray.origin) * inv_dir;
        let t2 = (self.max - ray.origin) * inv_dir;

        // A zero direction component with the origin on that slab's plane
        // gives 0 * inf = NaN. The ray then runs inside the closed slab, so
        // the axis must not constrain the interval.
        let on_plane = t1.is_nan_mask() | t2.is_nan_mask();
        let t_min = Vec3::select(on_plane, Vec3::NEG_INFINITY, t1.min(t2));
        let t_max = Vec3::select(on_plane, Vec3::INFINITY, t1.max(t2));

        let t_near = t_min.max_element().max(ray.t_min);
        let t_far = t_max.min_element().min(ray.t_max);

        (t_near <= t_far).then_some((t_near, t_far))
    }
}
