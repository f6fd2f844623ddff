//! Pointer tracking and hover/pin state for placed item meshes.
//!
//! Every render tick casts a ray through the last known pointer position and
//! intersects it with the pickable item boxes. The nearest hit becomes the
//! hovered item; a click pins it so its details stay visible after the
//! pointer leaves. An empty hit set is a normal outcome.

use glam::{Vec2, Vec3};

use crate::camera::{Camera, Ray, Viewport};

/// Axis-aligned box in render space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Distance along the ray to the first intersection (0.0 when the origin
    /// is inside), or `None` when the ray misses.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let inv_dir = Vec3::new(
            1.0 / ray.direction.x,
            1.0 / ray.direction.y,
            1.0 / ray.direction.z,
        );

        let t1 = (self.min.x - ray.origin.x) * inv_dir.x;
        let t2 = (self.max.x - ray.origin.x) * inv_dir.x;
        let t3 = (self.min.y - ray.origin.y) * inv_dir.y;
        let t4 = (self.max.y - ray.origin.y) * inv_dir.y;
        let t5 = (self.min.z - ray.origin.z) * inv_dir.z;
        let t6 = (self.max.z - ray.origin.z) * inv_dir.z;

        let t_min = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let t_max = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        if t_max >= t_min && t_max >= 0.0 {
            Some(t_min.max(0.0))
        } else {
            None
        }
    }
}

/// A mesh that can be hovered, with the item it represents.
#[derive(Debug, Clone, PartialEq)]
pub struct PickTarget {
    /// Index of the mesh node in the scene graph
    pub node: usize,
    pub item_id: String,
    pub bounds: Aabb,
}

/// Nearest target hit by `ray`, if any.
pub fn pick<'a>(ray: &Ray, targets: &'a [PickTarget]) -> Option<&'a PickTarget> {
    targets
        .iter()
        .filter_map(|target| target.bounds.intersect_ray(ray).map(|t| (t, target)))
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, target)| target)
}

/// Last known pointer position in both screen pixels and NDC.
///
/// The two are kept consistent with the current viewport; a resize
/// recomputes the NDC value from the stored screen position. NDC is absent
/// while the pointer is outside the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    screen: Option<Vec2>,
    ndc: Option<Vec2>,
}

impl PointerState {
    pub fn moved(&mut self, screen: Vec2, viewport: Viewport) {
        self.screen = Some(screen);
        self.ndc = Some(viewport.to_ndc(screen));
    }

    /// Stops ray casting. The screen position is kept as popover anchor.
    pub fn left(&mut self) {
        self.ndc = None;
    }

    pub fn resized(&mut self, viewport: Viewport) {
        if self.ndc.is_some() {
            self.ndc = self.screen.map(|screen| viewport.to_ndc(screen));
        }
    }

    /// Last pixel position, used to anchor the detail popover.
    pub fn screen(&self) -> Option<Vec2> {
        self.screen
    }

    /// Normalized device coordinates, used for ray casting.
    pub fn ndc(&self) -> Option<Vec2> {
        self.ndc
    }
}

/// Hover and pin state derived from the picking pass.
#[derive(Debug, Clone, Default)]
pub struct Picker {
    pointer: PointerState,
    hovered: Option<String>,
    pinned: bool,
    pin_anchor: Option<Vec2>,
}

impl Picker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn pointer_moved(&mut self, screen: Vec2, viewport: Viewport) {
        self.pointer.moved(screen, viewport);
    }

    pub fn pointer_left(&mut self) {
        self.pointer.left();
    }

    pub fn resized(&mut self, viewport: Viewport) {
        self.pointer.resized(viewport);
    }

    /// Casts a ray from the current pointer position.
    pub fn hit<'a>(&self, camera: &Camera, targets: &'a [PickTarget]) -> Option<&'a PickTarget> {
        self.pointer
            .ndc()
            .and_then(|ndc| pick(&camera.ray_through(ndc), targets))
    }

    /// Runs the picking pass for one tick and returns the item to emphasize.
    pub fn update(&mut self, camera: &Camera, targets: &[PickTarget]) -> Option<&str> {
        let hit = self.hit(camera, targets);
        self.apply_hit(hit.map(|target| target.item_id.as_str()));
        self.hovered.as_deref()
    }

    /// Applies the outcome of one picking pass.
    pub fn apply_hit(&mut self, hit: Option<&str>) {
        match hit {
            Some(item_id) => {
                if self.hovered.as_deref() != Some(item_id) {
                    self.hovered = Some(item_id.to_owned());
                    if self.pinned {
                        self.pin_anchor = self.pointer.screen();
                    }
                }
            }
            None if !self.pinned => self.hovered = None,
            None => {}
        }
    }

    /// Handles a click against the scene as it is under the pointer now,
    /// not as it was at the last tick.
    pub fn click(&mut self, camera: &Camera, targets: &[PickTarget]) {
        let hit = self.hit(camera, targets).map(|target| target.item_id.clone());
        self.click_on(hit.as_deref());
    }

    /// Clicking the pinned item again releases the pin. Clicking empty
    /// space clears hover and pin.
    pub fn click_on(&mut self, hit: Option<&str>) {
        let Some(item_id) = hit else {
            self.pinned = false;
            self.pin_anchor = None;
            self.hovered = None;
            return;
        };
        let repeat = self.pinned && self.hovered.as_deref() == Some(item_id);
        self.hovered = Some(item_id.to_owned());
        if repeat {
            self.pinned = false;
            self.pin_anchor = None;
        } else {
            self.pinned = true;
            self.pin_anchor = self.pointer.screen();
        }
    }

    /// Drops hover and pin, e.g. when the scene is replaced.
    pub fn forget_missing(&mut self, targets: &[PickTarget]) {
        let still_present = |id: &String| targets.iter().any(|t| &t.item_id == id);
        if !self.hovered.as_ref().is_some_and(still_present) {
            self.hovered = None;
            self.pinned = false;
            self.pin_anchor = None;
        }
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// The pinned item, if the pin is held.
    pub fn pinned(&self) -> Option<&str> {
        if self.pinned {
            self.hovered.as_deref()
        } else {
            None
        }
    }

    /// Where the details popover sits. A pinned popover stays where the pin
    /// was taken; otherwise it follows the pointer.
    pub fn popover_anchor(&self) -> Option<Vec2> {
        self.hovered.as_ref()?;
        if self.pinned {
            self.pin_anchor
        } else {
            self.pointer.screen()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(origin: Vec3, direction: Vec3) -> Ray {
        Ray {
            origin,
            direction: direction.normalize(),
        }
    }

    fn target(id: &str, center: Vec3) -> PickTarget {
        PickTarget {
            node: 0,
            item_id: id.to_string(),
            bounds: Aabb::from_center_size(center, Vec3::ONE),
        }
    }

    #[test]
    fn ray_hits_and_misses_box() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let hit = bounds.intersect_ray(&ray(Vec3::new(-5.0, 0.5, 0.5), Vec3::X));
        assert!((hit.unwrap() - 5.0).abs() < 1e-5);
        assert!(bounds.intersect_ray(&ray(Vec3::new(-5.0, 3.0, 0.5), Vec3::X)).is_none());
        assert!(bounds.intersect_ray(&ray(Vec3::new(5.0, 0.5, 0.5), Vec3::X)).is_none());
    }

    #[test]
    fn pick_returns_nearest() {
        let targets = vec![
            target("far", Vec3::new(10.0, 0.0, 0.0)),
            target("near", Vec3::new(3.0, 0.0, 0.0)),
        ];
        let hit = pick(&ray(Vec3::ZERO, Vec3::X), &targets).unwrap();
        assert_eq!(hit.item_id, "near");
        assert!(pick(&ray(Vec3::ZERO, Vec3::Y), &targets).is_none());
    }

    #[test]
    fn hover_clears_without_pin() {
        let mut picker = Picker::new();
        picker.apply_hit(Some("M"));
        assert_eq!(picker.hovered(), Some("M"));
        picker.apply_hit(None);
        assert_eq!(picker.hovered(), None);
    }

    #[test]
    fn pin_keeps_details_until_empty_click() {
        let mut picker = Picker::new();
        picker.apply_hit(Some("M"));
        picker.click_on(Some("M"));
        assert_eq!(picker.pinned(), Some("M"));

        picker.apply_hit(None);
        assert_eq!(picker.hovered(), Some("M"));
        assert!(picker.is_pinned());

        picker.click_on(None);
        assert!(!picker.is_pinned());
        assert_eq!(picker.hovered(), None);
        picker.apply_hit(None);
        assert_eq!(picker.hovered(), None);
    }

    #[test]
    fn click_on_hovered_item_toggles_pin() {
        let mut picker = Picker::new();
        picker.apply_hit(Some("M"));
        picker.click_on(Some("M"));
        picker.click_on(Some("M"));
        assert!(!picker.is_pinned());
        assert_eq!(picker.hovered(), Some("M"));
    }

    #[test]
    fn click_on_other_item_moves_pin() {
        let mut picker = Picker::new();
        picker.click_on(Some("A"));
        picker.click_on(Some("B"));
        assert_eq!(picker.pinned(), Some("B"));
    }

    #[test]
    fn pinned_popover_stays_where_pin_was_taken() {
        let viewport = Viewport::new(800, 500);
        let mut picker = Picker::new();
        assert_eq!(picker.popover_anchor(), None);

        picker.pointer_moved(Vec2::new(400.0, 250.0), viewport);
        picker.apply_hit(Some("M"));
        assert_eq!(picker.popover_anchor(), Some(Vec2::new(400.0, 250.0)));
        picker.click_on(Some("M"));

        picker.pointer_moved(Vec2::new(10.0, 10.0), viewport);
        picker.apply_hit(None);
        assert_eq!(picker.popover_anchor(), Some(Vec2::new(400.0, 250.0)));

        picker.click_on(None);
        assert_eq!(picker.popover_anchor(), None);
    }

    #[test]
    fn resize_recomputes_ndc_from_screen_position() {
        let mut pointer = PointerState::default();
        pointer.moved(Vec2::new(400.0, 250.0), Viewport::new(800, 500));
        assert_eq!(pointer.ndc(), Some(Vec2::ZERO));

        pointer.resized(Viewport::new(400, 500));
        assert_eq!(pointer.screen(), Some(Vec2::new(400.0, 250.0)));
        assert_eq!(pointer.ndc(), Some(Vec2::new(1.0, 0.0)));

        pointer.left();
        pointer.resized(Viewport::new(800, 500));
        assert_eq!(pointer.ndc(), None);
        assert_eq!(pointer.screen(), Some(Vec2::new(400.0, 250.0)));
    }

    #[test]
    fn forget_missing_drops_vanished_pin() {
        let mut picker = Picker::new();
        picker.apply_hit(Some("gone"));
        picker.click_on(Some("gone"));
        picker.forget_missing(&[target("other", Vec3::ZERO)]);
        assert_eq!(picker.hovered(), None);
        assert!(!picker.is_pinned());
    }
}
