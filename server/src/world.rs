//! Arena geometry and line-of-sight queries
//!
//! Bodies are spheres centred at muzzle height above each live entity,
//! obstacles are axis-aligned boxes. The arena is rebuilt from combat state
//! every tick before agents run, so ray tests always see current positions.

use serde::{Deserialize, Serialize};
use shared::{EntityId, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Slab test; returns the entry distance along a unit direction
    fn intersect(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = max_distance;

        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x),
            (origin.y, direction.y, self.min.y, self.max.y),
            (origin.z, direction.z, self.min.z, self.max.z),
        ];
        for (o, d, lo, hi) in axes {
            if d.abs() <= f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// A query ray; `direction` need not be normalized
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub max_distance: f32,
    /// Body the ray starts inside of, usually the caster's own
    pub ignore: Option<EntityId>,
}

/// Which collider categories a query may hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityMask(u8);

impl VisibilityMask {
    pub const PLAYERS: VisibilityMask = VisibilityMask(0b001);
    pub const NON_PLAYERS: VisibilityMask = VisibilityMask(0b010);
    pub const OBSTACLES: VisibilityMask = VisibilityMask(0b100);
    pub const ALL: VisibilityMask = VisibilityMask(0b111);

    pub const fn union(self, other: VisibilityMask) -> VisibilityMask {
        VisibilityMask(self.0 | other.0)
    }

    pub fn contains(self, other: VisibilityMask) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderTag {
    Player(EntityId),
    NonPlayer(EntityId),
    Obstacle,
}

impl ColliderTag {
    pub fn entity(self) -> Option<EntityId> {
        match self {
            ColliderTag::Player(id) | ColliderTag::NonPlayer(id) => Some(id),
            ColliderTag::Obstacle => None,
        }
    }

    fn layer(self) -> VisibilityMask {
        match self {
            ColliderTag::Player(_) => VisibilityMask::PLAYERS,
            ColliderTag::NonPlayer(_) => VisibilityMask::NON_PLAYERS,
            ColliderTag::Obstacle => VisibilityMask::OBSTACLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub tag: ColliderTag,
    pub distance: f32,
}

/// Nearest-hit ray queries against the world
pub trait LineOfSight {
    fn ray_test(&self, ray: &Ray, mask: VisibilityMask) -> Option<RayHit>;
}

#[derive(Debug, Clone, Copy)]
struct Body {
    tag: ColliderTag,
    center: Vec3,
}

#[derive(Debug, Clone)]
pub struct Arena {
    half_extent: f32,
    body_radius: f32,
    obstacles: Vec<Aabb>,
    bodies: Vec<Body>,
}

impl Arena {
    pub fn new(half_extent: f32, body_radius: f32, obstacles: Vec<Aabb>) -> Self {
        Self {
            half_extent,
            body_radius,
            obstacles,
            bodies: Vec::new(),
        }
    }

    /// Replaces every body with the given set
    pub fn sync(&mut self, bodies: impl IntoIterator<Item = (ColliderTag, Vec3)>) {
        self.bodies.clear();
        self.bodies
            .extend(bodies.into_iter().map(|(tag, center)| Body { tag, center }));
    }

    /// Keeps a ground position inside the arena bounds
    pub fn clamp(&self, position: Vec3) -> Vec3 {
        let limit = self.half_extent;
        Vec3::new(
            position.x.clamp(-limit, limit),
            position.y.max(0.0),
            position.z.clamp(-limit, limit),
        )
    }

    fn intersect_body(&self, body: &Body, origin: Vec3, direction: Vec3, max: f32) -> Option<f32> {
        let offset = origin - body.center;
        let b = offset.dot(direction);
        let c = offset.dot(offset) - self.body_radius * self.body_radius;
        if c > 0.0 && b > 0.0 {
            return None;
        }
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let t = (-b - discriminant.sqrt()).max(0.0);
        (t <= max).then_some(t)
    }
}

impl LineOfSight for Arena {
    fn ray_test(&self, ray: &Ray, mask: VisibilityMask) -> Option<RayHit> {
        let direction = ray.direction.normalized();
        if direction.is_zero() {
            return None;
        }

        let mut nearest: Option<RayHit> = None;
        let mut consider = |tag: ColliderTag, distance: f32| {
            if nearest.map_or(true, |hit| distance < hit.distance) {
                nearest = Some(RayHit { tag, distance });
            }
        };

        if mask.contains(VisibilityMask::OBSTACLES) {
            for obstacle in &self.obstacles {
                if let Some(t) = obstacle.intersect(ray.origin, direction, ray.max_distance) {
                    consider(ColliderTag::Obstacle, t);
                }
            }
        }

        for body in &self.bodies {
            if !mask.contains(body.tag.layer()) {
                continue;
            }
            if ray.ignore.is_some() && body.tag.entity() == ray.ignore {
                continue;
            }
            if let Some(t) = self.intersect_body(body, ray.origin, direction, ray.max_distance) {
                consider(body.tag, t);
            }
        }

        nearest
    }
}
