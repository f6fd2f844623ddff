//! Perspective orbit camera with damping.
//!
//! Render space is Z-up: container width runs along X, depth along Y and
//! height along Z.

use glam::{Vec2, Vec3};

use crate::types::Dimensions;

/// Size of the render target in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for a degenerate viewport.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 || self.width == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 1 || self.height <= 1
    }

    /// Maps a pixel position (origin top-left) to normalized device
    /// coordinates in `[-1, 1]`, Y up.
    pub fn to_ndc(&self, screen: Vec2) -> Vec2 {
        if self.is_degenerate() {
            return Vec2::ZERO;
        }
        Vec2::new(
            (screen.x / self.width as f32) * 2.0 - 1.0,
            1.0 - (screen.y / self.height as f32) * 2.0,
        )
    }
}

/// A half-line in render space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

/// Camera basis derived from the orbit state for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Ray from the eye through a point given in normalized device coordinates.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let half_h = (0.5 * self.fovy).tan();
        let half_w = half_h * self.aspect;
        let direction =
            (self.forward + self.right * (ndc.x * half_w) + self.up * (ndc.y * half_h))
                .normalize_or_zero();
        Ray {
            origin: self.eye,
            direction,
        }
    }
}

/// Orbit controls around a target point.
///
/// Input deltas accumulate and are eased in on every [`OrbitControls::update`]
/// by the damping factor, so the camera keeps gliding for a few frames after
/// the pointer stops.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    pending_zoom: f32,
    damping: f32,
    fovy: f32,
    aspect: f32,
}

impl OrbitControls {
    const MIN_PITCH: f32 = -1.5;
    const MAX_PITCH: f32 = 1.5;
    const MIN_DISTANCE: f32 = 1.0;
    const SETTLE_EPSILON: f32 = 1e-5;

    pub fn new(fov_deg: f32, damping: f32, viewport: Viewport) -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: std::f32::consts::FRAC_PI_4,
            pitch: 0.6,
            distance: 10.0,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_zoom: 0.0,
            damping: damping.clamp(f32::EPSILON, 1.0),
            fovy: fov_deg.to_radians(),
            aspect: viewport.aspect(),
        }
    }

    /// Places the eye at `2 × max(dims)` on every axis looking at the
    /// container center. Pending motion is discarded.
    pub fn frame_container(&mut self, dims: &Dimensions) {
        let target = dims.half().to_render();
        let reach = dims.max_component() as f32 * 2.0;
        self.look_from(Vec3::splat(reach), target);
    }

    /// Moves the eye to `eye`, keeping `target` in the center.
    pub fn look_from(&mut self, eye: Vec3, target: Vec3) {
        let offset = eye - target;
        let distance = offset.length().max(Self::MIN_DISTANCE);
        self.target = target;
        self.distance = distance;
        self.pitch = (offset.z / distance)
            .clamp(-1.0, 1.0)
            .asin()
            .clamp(Self::MIN_PITCH, Self::MAX_PITCH);
        self.yaw = offset.y.atan2(offset.x);
        self.pending_yaw = 0.0;
        self.pending_pitch = 0.0;
        self.pending_zoom = 0.0;
    }

    /// Queues a rotation in radians.
    pub fn rotate(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.pending_yaw += delta_yaw;
        self.pending_pitch += delta_pitch;
    }

    /// Queues a zoom; positive values move the eye closer.
    pub fn zoom(&mut self, amount: f32) {
        self.pending_zoom += amount;
    }

    pub fn set_aspect(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    /// Advances the damping by one frame. Returns `true` while the camera is
    /// still moving.
    pub fn update(&mut self) -> bool {
        let step_yaw = self.pending_yaw * self.damping;
        let step_pitch = self.pending_pitch * self.damping;
        let step_zoom = self.pending_zoom * self.damping;

        self.yaw += step_yaw;
        self.pitch = (self.pitch + step_pitch).clamp(Self::MIN_PITCH, Self::MAX_PITCH);
        self.distance = (self.distance - step_zoom).max(Self::MIN_DISTANCE);

        self.pending_yaw -= step_yaw;
        self.pending_pitch -= step_pitch;
        self.pending_zoom -= step_zoom;

        let moving = [self.pending_yaw, self.pending_pitch, self.pending_zoom]
            .iter()
            .any(|v| v.abs() > Self::SETTLE_EPSILON);
        if !moving {
            self.pending_yaw = 0.0;
            self.pending_pitch = 0.0;
            self.pending_zoom = 0.0;
        }
        moving
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Camera basis for the current orbit state.
    pub fn camera(&self) -> Camera {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        let offset = Vec3::new(cp * cy, cp * sy, sp) * self.distance;
        let eye = self.target + offset;
        let forward = (self.target - eye).normalize_or_zero();
        let right = forward.cross(Vec3::Z).normalize_or_zero();
        let up = right.cross(forward);

        Camera {
            eye,
            target: self.target,
            forward,
            right,
            up,
            aspect: self.aspect,
            fovy: self.fovy,
            near: 0.1,
            far: (self.distance * 4.0).max(1000.0),
        }
    }
}
