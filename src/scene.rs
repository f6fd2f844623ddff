//! Scene model: turns a container, its placed items and an optional ghost
//! box into a renderable object graph.
//!
//! The graph is rebuilt wholesale on every data change and never patched, so
//! it cannot drift from the domain data. Every GPU resource a graph holds is
//! released before the graph is replaced or torn down.

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Container, Item};
use crate::picking::{Aabb, PickTarget};
use crate::types::PlacementBox;

/// Scene build failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// The container cannot be displayed; the previous scene is kept.
    #[error("invalid container {container_id}: {reason}")]
    InvalidContainer { container_id: String, reason: String },
    /// An item cannot be displayed; it is skipped and the rest render.
    #[error("item {item_id} cannot be displayed: {reason}")]
    UnplaceableItem { item_id: String, reason: String },
}

/// Linear RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// From a `0xRRGGBB` literal.
    pub fn from_hex(hex: u32) -> Self {
        Self::new(
            ((hex >> 16) & 0xff) as f32 / 255.0,
            ((hex >> 8) & 0xff) as f32 / 255.0,
            (hex & 0xff) as f32 / 255.0,
        )
    }

    /// From hue in degrees and saturation/lightness in `[0, 1]`.
    pub fn from_hsl(hue: f32, saturation: f32, lightness: f32) -> Self {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = lightness - c / 2.0;
        Self::new(r + m, g + m, b + m)
    }
}

const ITEM_SATURATION: f32 = 0.7;
const ITEM_LIGHTNESS: f32 = 0.55;
const ITEM_OPACITY: f32 = 0.8;
const MIN_HUE_SLOTS: usize = 12;

const SHELL_COLOR: u32 = 0xcccccc;
const SHELL_OPACITY: f32 = 0.1;
const GHOST_COLOR: u32 = 0x4caf50;
const GHOST_OPACITY: f32 = 0.5;
const GRID_DIVISIONS: u32 = 20;
const LABEL_LIFT: f32 = 0.5;
const LABEL_SCALE: Vec3 = Vec3::new(2.0, 1.0, 1.0);

/// Hue in degrees for the item at `index` among `total` displayed items.
///
/// Depends only on rank, so rebuilding the same item set yields the same
/// colours.
pub fn item_hue(index: usize, total: usize) -> f32 {
    let step = 360.0 / total.max(MIN_HUE_SLOTS) as f32;
    (index as f32 * step) % 360.0
}

/// Colour for the item at `index` among `total` displayed items.
pub fn item_color(index: usize, total: usize) -> Rgb {
    Rgb::from_hsl(item_hue(index, total), ITEM_SATURATION, ITEM_LIGHTNESS)
}

/// Opaque handle to a GPU-side resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

/// Allocator for GPU-side resources.
///
/// Every `allocate` is paired with exactly one `release`, either on the
/// next rebuild or on teardown.
pub trait GpuResources {
    fn allocate(&mut self, kind: ResourceKind, label: &str) -> ResourceId;
    fn release(&mut self, id: ResourceId);
}

/// What a scene node draws.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    AmbientLight { intensity: f32 },
    DirectionalLight { intensity: f32 },
    Grid { divisions: u32 },
    ContainerShell,
    ContainerOutline,
    ItemBox { item_id: String },
    Label { item_id: String, text: String },
    Ghost,
}

/// Surface appearance of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub color: Rgb,
    pub opacity: f32,
    /// Hover emphasis; `None` is the default re-asserted every tick
    pub emissive: Option<Rgb>,
}

impl Appearance {
    fn solid(color: Rgb, opacity: f32) -> Self {
        Self {
            color,
            opacity,
            emissive: None,
        }
    }
}

/// One renderable object. Positions are center-anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub kind: NodeKind,
    pub center: Vec3,
    pub size: Vec3,
    pub appearance: Appearance,
    pub resources: Vec<ResourceId>,
}

impl SceneNode {
    pub fn is_item_box(&self) -> bool {
        matches!(self.kind, NodeKind::ItemBox { .. })
    }
}

/// A complete scene plus its mesh-to-item side table.
#[derive(Debug, Default)]
pub struct SceneGraph {
    container_id: String,
    nodes: Vec<SceneNode>,
    pick_targets: Vec<PickTarget>,
}

/// Emphasis colour applied to the hovered item box.
pub const HIGHLIGHT_EMISSIVE: Rgb = Rgb::new(0.33, 0.33, 0.33);

impl SceneGraph {
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Item meshes that take part in picking. Ghost and shell are absent.
    pub fn pick_targets(&self) -> &[PickTarget] {
        &self.pick_targets
    }

    pub fn item_boxes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter().filter(|node| node.is_item_box())
    }

    pub fn labels(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Label { .. }))
    }

    pub fn ghosts(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Ghost))
    }

    /// Emphasizes the box of `hovered` and resets every other item box.
    pub fn apply_highlight(&mut self, hovered: Option<&str>) {
        for node in &mut self.nodes {
            if let NodeKind::ItemBox { item_id } = &node.kind {
                node.appearance.emissive = if Some(item_id.as_str()) == hovered {
                    Some(HIGHLIGHT_EMISSIVE)
                } else {
                    None
                };
            }
        }
    }

    /// Number of GPU resources held by this graph.
    pub fn resource_count(&self) -> usize {
        self.nodes.iter().map(|node| node.resources.len()).sum()
    }

    /// Releases every GPU resource held by this graph.
    pub fn release(self, resources: &mut dyn GpuResources) {
        for node in self.nodes {
            for id in node.resources {
                resources.release(id);
            }
        }
    }
}

/// Inputs of one rebuild.
#[derive(Debug, Clone, Copy)]
pub struct SceneInput<'a> {
    pub container: &'a Container,
    pub placed_items: &'a [Item],
    pub ghost: Option<PlacementBox>,
}

/// Summary of a successful rebuild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebuildReport {
    pub items_drawn: usize,
    pub skipped: Vec<SceneError>,
    pub ghost_drawn: bool,
    pub released: usize,
}

/// Holder of the scene currently on screen.
#[derive(Debug, Default)]
pub struct SceneSlot {
    current: Option<SceneGraph>,
}

impl SceneSlot {
    pub fn current(&self) -> Option<&SceneGraph> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut SceneGraph> {
        self.current.as_mut()
    }

    /// Releases and drops the current scene. Returns the number of released
    /// resources.
    pub fn clear(&mut self, resources: &mut dyn GpuResources) -> usize {
        match self.current.take() {
            Some(graph) => {
                let count = graph.resource_count();
                graph.release(resources);
                count
            }
            None => 0,
        }
    }
}

/// Deterministic mapping from scene inputs to a scene graph.
#[derive(Debug, Clone, Copy)]
pub struct SceneBuilder {
    show_grid: bool,
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self { show_grid: true }
    }
}

struct Allocating<'r> {
    resources: &'r mut dyn GpuResources,
}

impl Allocating<'_> {
    fn mesh(&mut self, label: &str) -> Vec<ResourceId> {
        vec![
            self.resources.allocate(ResourceKind::Geometry, label),
            self.resources.allocate(ResourceKind::Material, label),
        ]
    }

    fn sprite(&mut self, label: &str) -> Vec<ResourceId> {
        vec![
            self.resources.allocate(ResourceKind::Texture, label),
            self.resources.allocate(ResourceKind::Material, label),
        ]
    }
}

impl SceneBuilder {
    pub fn new(show_grid: bool) -> Self {
        Self { show_grid }
    }

    /// Replaces the scene in `slot` with one built from `input`.
    ///
    /// An invalid container is rejected before anything is released or
    /// allocated, leaving the previous scene in place. Items without a usable
    /// position are skipped and reported; an unusable ghost is dropped.
    pub fn rebuild(
        &self,
        slot: &mut SceneSlot,
        input: SceneInput<'_>,
        resources: &mut dyn GpuResources,
    ) -> Result<RebuildReport, SceneError> {
        let container = input.container;
        container
            .validate()
            .map_err(|err| SceneError::InvalidContainer {
                container_id: container.container_id.clone(),
                reason: err.to_string(),
            })?;

        let mut skipped = Vec::new();
        let mut drawable: Vec<(&Item, PlacementBox)> = Vec::with_capacity(input.placed_items.len());
        for item in input.placed_items {
            match item.placed_box() {
                Ok(region) => drawable.push((item, region)),
                Err(err) => {
                    let error = SceneError::UnplaceableItem {
                        item_id: item.item_id.clone(),
                        reason: err.to_string(),
                    };
                    warn!("⚠️ {}", error);
                    skipped.push(error);
                }
            }
        }

        let ghost = input.ghost.and_then(|region| {
            match PlacementBox::checked(region.start, region.end) {
                Ok(region) => Some(region),
                Err(err) => {
                    warn!("⚠️ Ghost box is not drawn: {}", err);
                    None
                }
            }
        });

        let released = slot.clear(resources);
        let mut alloc = Allocating { resources };
        let mut nodes = Vec::with_capacity(4 + drawable.len() * 2);
        let dims = container.dimensions;

        nodes.push(SceneNode {
            kind: NodeKind::AmbientLight { intensity: 0.5 },
            center: Vec3::ZERO,
            size: Vec3::ZERO,
            appearance: Appearance::solid(Rgb::WHITE, 1.0),
            resources: Vec::new(),
        });
        nodes.push(SceneNode {
            kind: NodeKind::DirectionalLight { intensity: 0.8 },
            center: dims.to_render() * 2.0,
            size: Vec3::ZERO,
            appearance: Appearance::solid(Rgb::WHITE, 1.0),
            resources: Vec::new(),
        });

        if self.show_grid {
            let extent = dims.width.max(dims.depth) as f32 * 2.0;
            nodes.push(SceneNode {
                kind: NodeKind::Grid {
                    divisions: GRID_DIVISIONS,
                },
                center: Vec3::new(0.0, 0.0, -0.01),
                size: Vec3::new(extent, extent, 0.0),
                appearance: Appearance::solid(Rgb::from_hex(0x555555), 1.0),
                resources: alloc.mesh("grid"),
            });
        }

        let interior = container.interior();
        nodes.push(SceneNode {
            kind: NodeKind::ContainerShell,
            center: interior.render_center(),
            size: interior.render_size(),
            appearance: Appearance::solid(Rgb::from_hex(SHELL_COLOR), SHELL_OPACITY),
            resources: alloc.mesh("container-shell"),
        });
        nodes.push(SceneNode {
            kind: NodeKind::ContainerOutline,
            center: interior.render_center(),
            size: interior.render_size(),
            appearance: Appearance::solid(Rgb::BLACK, 1.0),
            resources: alloc.mesh("container-outline"),
        });

        let total = drawable.len();
        let mut pick_targets = Vec::with_capacity(total);
        for (index, (item, region)) in drawable.iter().enumerate() {
            let center = region.render_center();
            let size = region.render_size();

            pick_targets.push(PickTarget {
                node: nodes.len(),
                item_id: item.item_id.clone(),
                bounds: Aabb::from_center_size(center, size),
            });
            nodes.push(SceneNode {
                kind: NodeKind::ItemBox {
                    item_id: item.item_id.clone(),
                },
                center,
                size,
                appearance: Appearance::solid(item_color(index, total), ITEM_OPACITY),
                resources: alloc.mesh(&item.item_id),
            });
            nodes.push(SceneNode {
                kind: NodeKind::Label {
                    item_id: item.item_id.clone(),
                    text: format!("{}\n{}", item.item_id, item.name),
                },
                center: center + Vec3::new(0.0, 0.0, size.z / 2.0 + LABEL_LIFT),
                size: LABEL_SCALE,
                appearance: Appearance::solid(Rgb::WHITE, 1.0),
                resources: alloc.sprite(&item.item_id),
            });
        }

        let ghost_drawn = ghost.is_some();
        if let Some(region) = ghost {
            nodes.push(SceneNode {
                kind: NodeKind::Ghost,
                center: region.render_center(),
                size: region.render_size(),
                appearance: Appearance::solid(Rgb::from_hex(GHOST_COLOR), GHOST_OPACITY),
                resources: alloc.mesh("ghost"),
            });
        }

        let graph = SceneGraph {
            container_id: container.container_id.clone(),
            nodes,
            pick_targets,
        };
        debug!(
            container = %graph.container_id,
            items = total,
            skipped = skipped.len(),
            ghost = ghost_drawn,
            resources = graph.resource_count(),
            released,
            "scene rebuilt"
        );
        slot.current = Some(graph);

        Ok(RebuildReport {
            items_drawn: total,
            skipped,
            ghost_drawn,
            released,
        })
    }
}
