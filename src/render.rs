//! Render loop controller.
//!
//! [`RenderContext`] is the single owner of everything that lives on the
//! display side: renderer, surface listeners, orbit camera, pointer state
//! and the current scene graph. It moves through
//! `Uninitialized → Running → Disposed`; the last state is terminal and
//! reached at the latest when the context is dropped.

use std::collections::HashSet;

use glam::{Vec2, Vec3};
use thiserror::Error;
use tracing::{debug, info};

use crate::camera::{Camera, OrbitControls, Viewport};
use crate::config::ViewSettings;
use crate::picking::Picker;
use crate::scene::{
    GpuResources, NodeKind, RebuildReport, ResourceId, ResourceKind, SceneBuilder, SceneError,
    SceneGraph, SceneInput, SceneSlot,
};

/// Lifecycle misuse of the render context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("render loop is not running")]
    NotRunning,
    #[error("render context has been disposed")]
    Disposed,
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// GPU-side drawing backend.
pub trait Renderer: GpuResources {
    /// Resizes the render target.
    fn resize(&mut self, viewport: Viewport);

    /// Draws one frame.
    fn render(&mut self, scene: Option<&SceneGraph>, camera: &Camera);

    /// Releases the GPU context. Called exactly once.
    fn dispose(&mut self);
}

/// Event kinds the context listens for on its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PointerMove,
    PointerLeave,
    Click,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Host surface the renderer draws into.
pub trait DisplaySurface {
    /// Current size in pixels.
    fn viewport(&self) -> Viewport;

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Running,
    Disposed,
}

const LISTENED: [ListenerKind; 4] = [
    ListenerKind::PointerMove,
    ListenerKind::PointerLeave,
    ListenerKind::Click,
    ListenerKind::Resize,
];

/// Owner of the renderer, camera, pointer state and scene.
pub struct RenderContext<R: Renderer, S: DisplaySurface> {
    state: LoopState,
    renderer: R,
    surface: S,
    viewport: Viewport,
    controls: OrbitControls,
    picker: Picker,
    builder: SceneBuilder,
    scene: SceneSlot,
    listeners: Vec<ListenerId>,
    frames: u64,
}

impl<R: Renderer, S: DisplaySurface> RenderContext<R, S> {
    pub fn new(renderer: R, surface: S, settings: &ViewSettings) -> Self {
        let viewport = Viewport::new(settings.viewport_width, settings.viewport_height);
        Self {
            state: LoopState::Uninitialized,
            renderer,
            surface,
            viewport,
            controls: OrbitControls::new(settings.fov_deg, settings.damping, viewport),
            picker: Picker::new(),
            builder: SceneBuilder::new(settings.show_grid),
            scene: SceneSlot::default(),
            listeners: Vec::new(),
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Attaches to the surface and starts accepting ticks.
    pub fn mount(&mut self) -> Result<(), RenderError> {
        match self.state {
            LoopState::Running => return Ok(()),
            LoopState::Disposed => return Err(RenderError::Disposed),
            LoopState::Uninitialized => {}
        }

        self.listeners = LISTENED
            .iter()
            .map(|kind| self.surface.add_listener(*kind))
            .collect();
        self.apply_viewport(self.surface.viewport());
        self.state = LoopState::Running;
        info!(
            "🖥️ Render loop running at {}x{}",
            self.viewport.width, self.viewport.height
        );
        Ok(())
    }

    /// One frame: camera damping, picking pass, highlight, draw.
    pub fn tick(&mut self) -> Result<(), RenderError> {
        self.ensure_running()?;

        self.controls.update();
        let camera = self.controls.camera();

        let targets = self
            .scene
            .current()
            .map(SceneGraph::pick_targets)
            .unwrap_or_default();
        let hovered = self.picker.update(&camera, targets).map(str::to_owned);
        if let Some(graph) = self.scene.current_mut() {
            graph.apply_highlight(hovered.as_deref());
        }

        self.renderer.render(self.scene.current(), &camera);
        self.frames += 1;
        Ok(())
    }

    /// Replaces the scene. The camera is reframed when the container changes.
    pub fn rebuild_scene(&mut self, input: SceneInput<'_>) -> Result<RebuildReport, RenderError> {
        if self.state == LoopState::Disposed {
            return Err(RenderError::Disposed);
        }
        let reframe = self
            .scene
            .current()
            .is_none_or(|graph| graph.container_id() != input.container.container_id);

        let report = self
            .builder
            .rebuild(&mut self.scene, input, &mut self.renderer)?;

        if reframe {
            self.controls.frame_container(&input.container.dimensions);
        }
        let targets = self
            .scene
            .current()
            .map(SceneGraph::pick_targets)
            .unwrap_or_default();
        self.picker.forget_missing(targets);
        Ok(report)
    }

    /// Drops the current scene, e.g. when nothing is being viewed.
    pub fn clear_scene(&mut self) {
        let released = self.scene.clear(&mut self.renderer);
        self.picker.forget_missing(&[]);
        debug!(released, "scene cleared");
    }

    /// Recomputes aspect ratio, render target and pointer NDC. The scene is
    /// kept.
    pub fn resize(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.ensure_running()?;
        self.apply_viewport(viewport);
        Ok(())
    }

    pub fn pointer_moved(&mut self, screen: Vec2) -> Result<(), RenderError> {
        self.ensure_running()?;
        self.picker.pointer_moved(screen, self.viewport);
        Ok(())
    }

    pub fn pointer_left(&mut self) -> Result<(), RenderError> {
        self.ensure_running()?;
        self.picker.pointer_left();
        Ok(())
    }

    /// Picks again at the current pointer position before toggling the pin.
    pub fn click(&mut self) -> Result<(), RenderError> {
        self.ensure_running()?;
        let camera = self.controls.camera();
        let targets = self
            .scene
            .current()
            .map(SceneGraph::pick_targets)
            .unwrap_or_default();
        self.picker.click(&camera, targets);
        Ok(())
    }

    /// Queues an orbit rotation, eased in over the next ticks.
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) -> Result<(), RenderError> {
        self.ensure_running()?;
        self.controls.rotate(delta_yaw, delta_pitch);
        Ok(())
    }

    pub fn zoom(&mut self, amount: f32) -> Result<(), RenderError> {
        self.ensure_running()?;
        self.controls.zoom(amount);
        Ok(())
    }

    /// Stops the loop, detaches listeners, releases the scene and the GPU
    /// context. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.state == LoopState::Disposed {
            return;
        }
        for id in self.listeners.drain(..) {
            self.surface.remove_listener(id);
        }
        let released = self.scene.clear(&mut self.renderer);
        self.renderer.dispose();
        self.state = LoopState::Disposed;
        info!(
            "🛑 Render loop disposed after {} frames ({} resources released)",
            self.frames, released
        );
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.current()
    }

    pub fn camera(&self) -> Camera {
        self.controls.camera()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn apply_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.controls.set_aspect(viewport);
        self.renderer.resize(viewport);
        self.picker.resized(viewport);
    }

    fn ensure_running(&self) -> Result<(), RenderError> {
        match self.state {
            LoopState::Running => Ok(()),
            LoopState::Uninitialized => Err(RenderError::NotRunning),
            LoopState::Disposed => Err(RenderError::Disposed),
        }
    }
}

impl<R: Renderer, S: DisplaySurface> Drop for RenderContext<R, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Counters kept by [`HeadlessRenderer`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererStats {
    pub frames: u64,
    pub allocated: u64,
    pub released: u64,
    pub live: usize,
    pub disposed: bool,
}

/// What the last frame drew.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSnapshot {
    pub nodes: usize,
    pub item_boxes: usize,
    pub ghosts: usize,
    pub highlighted: Vec<String>,
    pub eye: Vec3,
    pub viewport: Option<Viewport>,
}

/// Renderer without a GPU. Tracks resources and records frames.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_id: u64,
    live: HashSet<ResourceId>,
    stats: RendererStats,
    viewport: Option<Viewport>,
    last_frame: Option<FrameSnapshot>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> RendererStats {
        RendererStats {
            live: self.live.len(),
            ..self.stats.clone()
        }
    }

    pub fn last_frame(&self) -> Option<&FrameSnapshot> {
        self.last_frame.as_ref()
    }
}

impl GpuResources for HeadlessRenderer {
    fn allocate(&mut self, _kind: ResourceKind, _label: &str) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.live.insert(id);
        self.stats.allocated += 1;
        id
    }

    fn release(&mut self, id: ResourceId) {
        if self.live.remove(&id) {
            self.stats.released += 1;
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn render(&mut self, scene: Option<&SceneGraph>, camera: &Camera) {
        let mut frame = FrameSnapshot {
            eye: camera.eye,
            viewport: self.viewport,
            ..FrameSnapshot::default()
        };
        if let Some(graph) = scene {
            frame.nodes = graph.nodes().len();
            frame.item_boxes = graph.item_boxes().count();
            frame.ghosts = graph.ghosts().count();
            frame.highlighted = graph
                .item_boxes()
                .filter(|node| node.appearance.emissive.is_some())
                .filter_map(|node| match &node.kind {
                    NodeKind::ItemBox { item_id } => Some(item_id.clone()),
                    _ => None,
                })
                .collect();
        }
        self.last_frame = Some(frame);
        self.stats.frames += 1;
    }

    fn dispose(&mut self) {
        self.live.clear();
        self.stats.disposed = true;
    }
}

/// In-memory display surface.
#[derive(Debug)]
pub struct HeadlessSurface {
    viewport: Viewport,
    next_listener: u64,
    listeners: Vec<(ListenerId, ListenerKind)>,
}

impl HeadlessSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            next_listener: 0,
            listeners: Vec::new(),
        }
    }

    /// Simulates the host resizing the surface.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn listeners(&self) -> impl Iterator<Item = ListenerKind> + '_ {
        self.listeners.iter().map(|(_, kind)| *kind)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl DisplaySurface for HeadlessSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, kind));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, Item};
    use crate::types::{Coordinates, Dimensions, PlacementBox};

    fn context() -> RenderContext<HeadlessRenderer, HeadlessSurface> {
        let settings = ViewSettings::default();
        RenderContext::new(
            HeadlessRenderer::new(),
            HeadlessSurface::new(Viewport::new(800, 500)),
            &settings,
        )
    }

    fn container() -> Container {
        Container::new("C1", "Lab", Dimensions::new(10.0, 10.0, 10.0)).unwrap()
    }

    fn item_at_origin() -> Item {
        let dims = Dimensions::new(10.0, 10.0, 10.0);
        Item::new("M", "Medkit", dims, 10, "Lab")
            .unwrap()
            .placed_at("C1", PlacementBox::new(Coordinates::origin(), Coordinates::origin() + dims))
    }

    #[test]
    fn tick_requires_running_loop() {
        let mut ctx = context();
        assert_eq!(ctx.tick(), Err(RenderError::NotRunning));
        ctx.mount().unwrap();
        assert!(ctx.tick().is_ok());
        assert_eq!(ctx.frames(), 1);
        assert_eq!(ctx.surface().listener_count(), 4);
    }

    #[test]
    fn dispose_is_terminal_and_idempotent() {
        let mut ctx = context();
        ctx.mount().unwrap();
        let container = container();
        ctx.rebuild_scene(SceneInput {
            container: &container,
            placed_items: &[],
            ghost: None,
        })
        .unwrap();
        assert!(ctx.renderer().stats().live > 0);

        ctx.dispose();
        ctx.dispose();
        assert_eq!(ctx.state(), LoopState::Disposed);
        assert_eq!(ctx.tick(), Err(RenderError::Disposed));
        assert_eq!(ctx.mount(), Err(RenderError::Disposed));
        assert_eq!(ctx.surface().listener_count(), 0);

        let stats = ctx.renderer().stats();
        assert!(stats.disposed);
        assert_eq!(stats.live, 0);
        assert_eq!(stats.allocated, stats.released);
    }

    #[test]
    fn hovered_item_is_highlighted_in_frame() {
        let mut ctx = context();
        ctx.mount().unwrap();
        let container = container();
        let items = vec![item_at_origin()];
        ctx.rebuild_scene(SceneInput {
            container: &container,
            placed_items: &items,
            ghost: None,
        })
        .unwrap();

        // the framed camera looks at the container center from the viewport center
        ctx.pointer_moved(Vec2::new(400.0, 250.0)).unwrap();
        ctx.tick().unwrap();
        assert_eq!(ctx.picker().hovered(), Some("M"));
        assert_eq!(ctx.renderer().last_frame().unwrap().highlighted, vec!["M".to_string()]);

        ctx.pointer_moved(Vec2::new(0.0, 0.0)).unwrap();
        ctx.tick().unwrap();
        assert_eq!(ctx.picker().hovered(), None);
        assert!(ctx.renderer().last_frame().unwrap().highlighted.is_empty());
    }

    #[test]
    fn click_uses_pointer_position_at_click_time() {
        let mut ctx = context();
        ctx.mount().unwrap();
        let container = container();
        let items = vec![item_at_origin()];
        ctx.rebuild_scene(SceneInput {
            container: &container,
            placed_items: &items,
            ghost: None,
        })
        .unwrap();

        ctx.pointer_moved(Vec2::new(400.0, 250.0)).unwrap();
        ctx.tick().unwrap();
        assert_eq!(ctx.picker().hovered(), Some("M"));

        // moved off and clicked before the next frame
        ctx.pointer_moved(Vec2::new(0.0, 0.0)).unwrap();
        ctx.click().unwrap();
        ctx.tick().unwrap();
        assert!(!ctx.picker().is_pinned());
        assert_eq!(ctx.picker().hovered(), None);

        // moved on and clicked before the next frame
        ctx.pointer_moved(Vec2::new(400.0, 250.0)).unwrap();
        ctx.click().unwrap();
        assert_eq!(ctx.picker().pinned(), Some("M"));
        assert_eq!(ctx.picker().popover_anchor(), Some(Vec2::new(400.0, 250.0)));
    }

    #[test]
    fn resize_keeps_scene_and_updates_target() {
        let mut ctx = context();
        ctx.mount().unwrap();
        let container = container();
        ctx.rebuild_scene(SceneInput {
            container: &container,
            placed_items: &[],
            ghost: None,
        })
        .unwrap();
        let nodes_before = ctx.scene().unwrap().nodes().len();

        ctx.resize(Viewport::new(1024, 768)).unwrap();
        ctx.tick().unwrap();
        assert_eq!(ctx.scene().unwrap().nodes().len(), nodes_before);
        assert_eq!(
            ctx.renderer().last_frame().unwrap().viewport,
            Some(Viewport::new(1024, 768))
        );
        assert!((ctx.camera().aspect - 1024.0 / 768.0).abs() < 1e-6);
    }

    #[test]
    fn rebuild_after_dispose_is_rejected() {
        let mut ctx = context();
        ctx.mount().unwrap();
        ctx.dispose();
        let container = container();
        let result = ctx.rebuild_scene(SceneInput {
            container: &container,
            placed_items: &[],
            ghost: None,
        });
        assert_eq!(result.unwrap_err(), RenderError::Disposed);
        assert_eq!(ctx.renderer().stats().allocated, 0);
    }
}
