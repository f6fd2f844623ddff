//! Common measurement types for container-local space.
//!
//! All lengths are centimeters. The three named axes map onto render space as
//! width → X, depth → Y and height → Z (Z is the vertical axis).

use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Extent of a container or an item along the three axes.
///
/// A well-formed value has every component strictly positive and finite;
/// see [`validation::validate_dimensions`].
///
/// # Examples
/// ```
/// use stowage_view::types::Dimensions;
///
/// let dims = Dimensions::new(10.0, 20.0, 30.0);
/// assert_eq!(dims.volume(), 6000.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Dimensions {
    #[inline]
    pub const fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    /// Product of all three components.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.width * self.depth * self.height
    }

    /// Footprint on the floor (width × depth).
    #[inline]
    pub fn base_area(&self) -> f64 {
        self.width * self.depth
    }

    /// Largest of the three components.
    #[inline]
    pub fn max_component(&self) -> f64 {
        self.width.max(self.depth).max(self.height)
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid(&self) -> bool {
        [self.width, self.depth, self.height]
            .iter()
            .all(|v| *v > 0.0 && v.is_finite())
    }

    /// Half of each component, i.e. the offset from a corner to the center.
    #[inline]
    pub fn half(&self) -> Self {
        Self::new(self.width / 2.0, self.depth / 2.0, self.height / 2.0)
    }

    /// Converts to a render-space vector.
    #[inline]
    pub fn to_render(&self) -> glam::Vec3 {
        glam::Vec3::new(self.width as f32, self.depth as f32, self.height as f32)
    }
}

/// A point in container-local space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Coordinates {
    #[inline]
    pub const fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    /// The container origin (minimum corner).
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.width.is_finite() && self.depth.is_finite() && self.height.is_finite()
    }

    /// Component-wise difference `self - other` as a raw triple.
    ///
    /// Returned as a tuple because the result may be negative and therefore
    /// not a valid [`Dimensions`].
    #[inline]
    pub fn delta(&self, other: &Self) -> (f64, f64, f64) {
        (
            self.width - other.width,
            self.depth - other.depth,
            self.height - other.height,
        )
    }

    /// Converts to a render-space vector.
    #[inline]
    pub fn to_render(&self) -> glam::Vec3 {
        glam::Vec3::new(self.width as f32, self.depth as f32, self.height as f32)
    }
}

impl Add<Dimensions> for Coordinates {
    type Output = Coordinates;

    #[inline]
    fn add(self, rhs: Dimensions) -> Self::Output {
        Coordinates::new(
            self.width + rhs.width,
            self.depth + rhs.depth,
            self.height + rhs.height,
        )
    }
}

/// Axis-aligned region in container-local space.
///
/// Represents a container interior, a placed item's footprint, or a
/// candidate/ghost placement. Construct checked values through
/// [`crate::geometry::derive_box`] or [`PlacementBox::checked`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementBox {
    /// Minimum corner
    pub start: Coordinates,
    /// Maximum corner
    pub end: Coordinates,
}

impl PlacementBox {
    /// Creates a box without checking `end >= start`.
    #[inline]
    pub const fn new(start: Coordinates, end: Coordinates) -> Self {
        Self { start, end }
    }

    /// Creates a box, rejecting it when any axis has `end < start` or a
    /// non-finite coordinate.
    pub fn checked(
        start: Coordinates,
        end: Coordinates,
    ) -> Result<Self, crate::geometry::GeometryError> {
        let candidate = Self::new(start, end);
        crate::geometry::extent_of(&candidate)?;
        Ok(candidate)
    }

    /// The region `[0, dims]` occupied by a container interior.
    #[inline]
    pub fn of_container(dims: &Dimensions) -> Self {
        Self::new(Coordinates::origin(), Coordinates::origin() + *dims)
    }

    /// Box center in render space (render primitives are center-anchored).
    #[inline]
    pub fn render_center(&self) -> glam::Vec3 {
        (self.start.to_render() + self.end.to_render()) * 0.5
    }

    /// Per-axis size in render space. Negative axes are clamped to zero, so
    /// the box must already have passed [`crate::geometry::extent_of`].
    #[inline]
    pub fn render_size(&self) -> glam::Vec3 {
        (self.end.to_render() - self.start.to_render()).max(glam::Vec3::ZERO)
    }
}

/// Trait for objects with 3D dimensions.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Dimensions;

    /// Calculates the volume.
    fn volume(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Validation helpers shared by the model types.
pub mod validation {
    use super::Dimensions;

    /// Validates a single dimension.
    ///
    /// # Parameters
    /// * `value` - The value to validate
    /// * `name` - Name of the dimension for error messages
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates all three components of a [`Dimensions`] value.
    pub fn validate_dimensions(dims: &Dimensions) -> Result<(), String> {
        validate_dimension(dims.width, "Width")?;
        validate_dimension(dims.depth, "Depth")?;
        validate_dimension(dims.height, "Height")?;
        Ok(())
    }
}
