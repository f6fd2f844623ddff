//! Geometric primitives for axis-aligned boxes in container space.
//!
//! These are pure functions used by both the scene builder (layout math) and
//! the placement confirmation step (pre-flight validation). Malformed inputs
//! are rejected with [`GeometryError`], never clamped.

use thiserror::Error;

use crate::types::{Coordinates, Dimensions, PlacementBox, validation};

/// Malformed box or dimension input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A box whose end lies before its start on some axis, or has a
    /// non-finite coordinate.
    #[error("invalid box: {0}")]
    InvalidBox(String),
    /// Dimensions with a zero, negative or non-finite component.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),
}

/// Per-axis extent `end - start` of a box.
///
/// Fails when a coordinate is not finite or any axis is negative.
pub fn extent_of(region: &PlacementBox) -> Result<(f64, f64, f64), GeometryError> {
    if !region.start.is_finite() || !region.end.is_finite() {
        return Err(GeometryError::InvalidBox(format!(
            "coordinates must be finite, got start {:?} end {:?}",
            region.start, region.end
        )));
    }

    let (w, d, h) = region.end.delta(&region.start);
    for (value, axis) in [(w, "width"), (d, "depth"), (h, "height")] {
        if value < 0.0 {
            return Err(GeometryError::InvalidBox(format!(
                "end precedes start on the {} axis by {}",
                axis, -value
            )));
        }
    }
    Ok((w, d, h))
}

/// Volume of a dimensions triple: width · depth · height.
///
/// # Examples
/// ```
/// use stowage_view::geometry::volume_of_dimensions;
/// use stowage_view::types::Dimensions;
///
/// assert_eq!(volume_of_dimensions(&Dimensions::new(2.0, 3.0, 4.0)).unwrap(), 24.0);
/// assert!(volume_of_dimensions(&Dimensions::new(2.0, -3.0, 4.0)).is_err());
/// ```
pub fn volume_of_dimensions(dims: &Dimensions) -> Result<f64, GeometryError> {
    validation::validate_dimensions(dims).map_err(GeometryError::InvalidDimensions)?;
    Ok(dims.volume())
}

/// Volume of a box: product of `end - start` per axis.
pub fn volume_of_box(region: &PlacementBox) -> Result<f64, GeometryError> {
    let (w, d, h) = extent_of(region)?;
    Ok(w * d * h)
}

/// Checks whether two boxes intersect with positive volume.
///
/// Each axis is tested with strict inequality on both ends
/// (`a.start < b.end && a.end > b.start`), so boxes that only share a face
/// do not overlap. This is what allows flush placement.
///
/// Both boxes must be well formed (see [`extent_of`]). An inverted or
/// non-finite box gives a meaningless answer; [`fits_within`] rejects such
/// boxes and is checked first wherever a placement is validated.
///
/// # Examples
/// ```
/// use stowage_view::geometry::{derive_box, overlaps};
/// use stowage_view::types::{Coordinates, Dimensions};
///
/// let size = Dimensions::new(50.0, 50.0, 50.0);
/// let a = derive_box(Coordinates::origin(), size).unwrap();
/// let flush = derive_box(Coordinates::new(50.0, 0.0, 0.0), size).unwrap();
/// let intruding = derive_box(Coordinates::new(40.0, 0.0, 0.0), size).unwrap();
/// assert!(!overlaps(&a, &flush));
/// assert!(overlaps(&a, &intruding));
/// ```
pub fn overlaps(a: &PlacementBox, b: &PlacementBox) -> bool {
    let axis = |a_start: f64, a_end: f64, b_start: f64, b_end: f64| {
        a_start < b_end && a_end > b_start
    };

    axis(a.start.width, a.end.width, b.start.width, b.end.width)
        && axis(a.start.depth, a.end.depth, b.start.depth, b.end.depth)
        && axis(a.start.height, a.end.height, b.start.height, b.end.height)
}

/// Checks whether a box lies inside `[0, container]` on every axis.
///
/// Bounds are inclusive: a box may exactly fill the container. A box that
/// [`extent_of`] rejects never fits.
pub fn fits_within(region: &PlacementBox, container: &Dimensions) -> bool {
    extent_of(region).is_ok()
        && region.start.width >= 0.0
        && region.start.depth >= 0.0
        && region.start.height >= 0.0
        && region.end.width <= container.width
        && region.end.depth <= container.depth
        && region.end.height <= container.height
}

/// Builds the box that an object of `dims` occupies when its minimum corner
/// sits at `start`.
pub fn derive_box(start: Coordinates, dims: Dimensions) -> Result<PlacementBox, GeometryError> {
    validation::validate_dimensions(&dims).map_err(GeometryError::InvalidDimensions)?;
    if !start.is_finite() {
        return Err(GeometryError::InvalidBox(format!(
            "start must be finite, got {:?}",
            start
        )));
    }
    Ok(PlacementBox::new(start, start + dims))
}

/// Overlap length of two intervals in one dimension, at least 0.0.
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Volume shared by two boxes; 0.0 when they are disjoint or only touch.
pub fn overlap_volume(a: &PlacementBox, b: &PlacementBox) -> f64 {
    overlap_1d(a.start.width, a.end.width, b.start.width, b.end.width)
        * overlap_1d(a.start.depth, a.end.depth, b.start.depth, b.end.depth)
        * overlap_1d(a.start.height, a.end.height, b.start.height, b.end.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(start: (f64, f64, f64), size: f64) -> PlacementBox {
        derive_box(
            Coordinates::new(start.0, start.1, start.2),
            Dimensions::new(size, size, size),
        )
        .unwrap()
    }

    #[test]
    fn malformed_box_never_fits() {
        let container = Dimensions::new(100.0, 100.0, 100.0);
        let inverted = PlacementBox::new(
            Coordinates::new(10.0, 0.0, 0.0),
            Coordinates::new(5.0, 10.0, 10.0),
        );
        assert!(!fits_within(&inverted, &container));

        let not_finite = PlacementBox::new(
            Coordinates::new(f64::NAN, 0.0, 0.0),
            Coordinates::new(10.0, 10.0, 10.0),
        );
        assert!(!fits_within(&not_finite, &container));

        let empty = PlacementBox::new(Coordinates::origin(), Coordinates::origin());
        assert!(fits_within(&empty, &container));
    }

    #[test]
    fn flush_boxes_do_not_overlap() {
        let a = cube((0.0, 0.0, 0.0), 50.0);
        let b = cube((50.0, 0.0, 0.0), 50.0);
        assert!(!overlaps(&a, &b));
        assert!(!overlaps(&b, &a));
        assert_eq!(overlap_volume(&a, &b), 0.0);
    }

    #[test]
    fn intruding_box_overlaps() {
        let a = cube((0.0, 0.0, 0.0), 50.0);
        let b = cube((40.0, 0.0, 0.0), 50.0);
        assert!(overlaps(&a, &b));
        // 10cm intrusion on the width axis
        assert!((overlap_volume(&a, &b) - 10.0 * 50.0 * 50.0).abs() < 1e-9);
    }

    #[test]
    fn separated_on_one_axis_does_not_overlap() {
        let a = cube((0.0, 0.0, 0.0), 10.0);
        let b = cube((5.0, 5.0, 30.0), 10.0);
        assert!(!overlaps(&a, &b));
    }

    #[test]
    fn stacked_flush_on_height_does_not_overlap() {
        let a = cube((0.0, 0.0, 0.0), 10.0);
        let b = cube((0.0, 0.0, 10.0), 10.0);
        assert!(!overlaps(&a, &b));
    }

    #[test]
    fn fits_within_is_inclusive() {
        let dims = Dimensions::new(100.0, 100.0, 100.0);
        assert!(fits_within(&PlacementBox::of_container(&dims), &dims));
        assert!(fits_within(&cube((50.0, 50.0, 50.0), 50.0), &dims));
        assert!(!fits_within(&cube((51.0, 0.0, 0.0), 50.0), &dims));
        assert!(!fits_within(&cube((-1.0, 0.0, 0.0), 10.0), &dims));
    }

    #[test]
    fn volume_of_box_rejects_negative_axis() {
        let inverted = PlacementBox::new(
            Coordinates::new(0.0, 0.0, 10.0),
            Coordinates::new(10.0, 10.0, 0.0),
        );
        assert!(matches!(
            volume_of_box(&inverted),
            Err(GeometryError::InvalidBox(_))
        ));
        assert_eq!(volume_of_box(&cube((1.0, 2.0, 3.0), 2.0)).unwrap(), 8.0);
    }

    #[test]
    fn derive_box_rejects_bad_dimensions() {
        assert!(matches!(
            derive_box(Coordinates::origin(), Dimensions::new(0.0, 1.0, 1.0)),
            Err(GeometryError::InvalidDimensions(_))
        ));
        assert!(matches!(
            derive_box(
                Coordinates::new(f64::NAN, 0.0, 0.0),
                Dimensions::new(1.0, 1.0, 1.0)
            ),
            Err(GeometryError::InvalidBox(_))
        ));
    }

    #[test]
    fn overlap_1d_clamps_to_zero() {
        assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
        assert_eq!(overlap_1d(0.0, 5.0, 6.0, 8.0), 0.0);
    }
}
