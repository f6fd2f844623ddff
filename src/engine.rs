//! Engine facade.
//!
//! [`PlacementEngine`] owns the render context, the preview controller and
//! the latest container/item data. Backend calls run as local tasks on the
//! current-thread executor and report back through an unbounded channel.
//! Completions are applied in [`PlacementEngine::pump`] before each frame,
//! so every scene rebuild they cause is finished before the next tick draws.
//!
//! All methods that start backend calls must run inside a
//! [`tokio::task::LocalSet`].

use std::rc::Rc;
use std::time::Duration;

use glam::Vec2;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::camera::Viewport;
use crate::client::{PlacementBackend, ServiceError, SuggestionOutcome};
use crate::config::ViewSettings;
use crate::model::{Container, Item};
use crate::preview::{PreviewCommand, PreviewController, PreviewError, SuggestionState, Ticket};
use crate::render::{DisplaySurface, RenderContext, RenderError, Renderer};
use crate::scene::{RebuildReport, SceneInput};

/// Result of a backend call, delivered back to the engine.
#[derive(Debug)]
enum Completion {
    Suggestion {
        ticket: Ticket,
        result: Result<SuggestionOutcome, ServiceError>,
    },
    Placement {
        ticket: Ticket,
        result: Result<(), ServiceError>,
    },
    Refresh(Result<(Vec<Container>, Vec<Item>), ServiceError>),
}

/// What the surrounding UI shows.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutputs {
    pub hovered_item: Option<Item>,
    pub pinned_item: Option<String>,
    /// Screen position for the detail popover; fixed while pinned
    pub popover_anchor: Option<Vec2>,
    pub suggestion: SuggestionState,
    /// Whether the confirm action is offered
    pub can_confirm: bool,
    pub error: Option<PreviewError>,
}

/// Drives one placement view on top of a [`RenderContext`] and a
/// [`PreviewController`]. Backend calls run as local tasks; their results
/// are applied by [`PlacementEngine::pump`].
///
/// Must be used inside a [`tokio::task::LocalSet`].
pub struct PlacementEngine<B, R, S>
where
    B: PlacementBackend + 'static,
    R: Renderer,
    S: DisplaySurface,
{
    backend: Rc<B>,
    render: RenderContext<R, S>,
    preview: PreviewController,
    containers: Vec<Container>,
    items: Vec<Item>,
    viewed: Option<String>,
    selected: Option<String>,
    frame_interval: Duration,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    last_rebuild: Option<RebuildReport>,
    disposed: bool,
}

impl<B, R, S> PlacementEngine<B, R, S>
where
    B: PlacementBackend + 'static,
    R: Renderer,
    S: DisplaySurface,
{
    pub fn new(backend: B, renderer: R, surface: S, settings: &ViewSettings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            backend: Rc::new(backend),
            render: RenderContext::new(renderer, surface, settings),
            preview: PreviewController::new(),
            containers: Vec::new(),
            items: Vec::new(),
            viewed: None,
            selected: None,
            frame_interval: settings.frame_interval(),
            completions_tx,
            completions_rx,
            in_flight: 0,
            last_rebuild: None,
            disposed: false,
        }
    }

    /// Attaches the render loop to its surface.
    pub fn mount(&mut self) -> Result<(), RenderError> {
        self.render.mount()
    }

    /// Replaces the container and item data and rebuilds the scene.
    pub fn load(&mut self, containers: Vec<Container>, items: Vec<Item>) {
        info!(
            "📥 Loaded {} containers and {} items",
            containers.len(),
            items.len()
        );
        self.containers = containers;
        self.items = items;

        let selected = self
            .selected
            .as_deref()
            .and_then(|id| self.items.iter().find(|item| item.item_id == id));
        if self.selected.is_some() && selected.is_none() {
            debug!("selected item is gone after reload");
        }
        if let Some(command) = self.preview.select_item(selected) {
            self.dispatch(command);
        }
        self.rebuild_scene();
    }

    /// Switches the viewed container.
    pub fn view_container(&mut self, container_id: Option<&str>) {
        if self.viewed.as_deref() == container_id {
            return;
        }
        self.viewed = container_id.map(str::to_owned);
        if let Some(id) = container_id {
            if !self.containers.iter().any(|c| c.container_id == id) {
                warn!("⚠️ Container {} is not known; nothing is displayed", id);
            }
        }
        if let Some(command) = self.preview.set_viewed_container(container_id) {
            self.dispatch(command);
        }
        self.rebuild_scene();
    }

    /// Changes the externally selected item. Unplaced items get a
    /// suggestion preview.
    pub fn select_item(&mut self, item_id: Option<&str>) {
        self.selected = item_id.map(str::to_owned);
        let item = item_id.and_then(|id| self.items.iter().find(|item| item.item_id == id));
        if let (Some(id), None) = (item_id, item) {
            warn!("⚠️ Item {} is not known; selection cleared", id);
        }

        let ghost_before = self.preview.ghost();
        if let Some(command) = self.preview.select_item(item) {
            self.dispatch(command);
        }
        if self.preview.ghost() != ghost_before {
            self.rebuild_scene();
        }
    }

    /// Asks the data layer for fresh containers and items.
    pub fn refresh(&mut self) {
        self.dispatch(PreviewCommand::RefreshData);
    }

    /// Commits the shown suggestion. Returns `false` when no confirm action
    /// is offered or the pre-flight check rejected the placement.
    pub fn confirm(&mut self) -> bool {
        let Some(container) = self
            .viewed
            .as_deref()
            .and_then(|id| self.containers.iter().find(|c| c.container_id == id))
        else {
            return false;
        };
        let placed: Vec<Item> = self
            .items
            .iter()
            .filter(|item| item.is_in(&container.container_id))
            .cloned()
            .collect();

        match self.preview.confirm(container, &placed) {
            Some(command) => {
                self.dispatch(command);
                true
            }
            None => false,
        }
    }

    pub fn dismiss_error(&mut self) {
        self.preview.dismiss_error();
    }

    pub fn pointer_moved(&mut self, screen: Vec2) -> Result<(), RenderError> {
        self.render.pointer_moved(screen)
    }

    pub fn pointer_left(&mut self) -> Result<(), RenderError> {
        self.render.pointer_left()
    }

    pub fn click(&mut self) -> Result<(), RenderError> {
        self.render.click()
    }

    pub fn resize(&mut self, viewport: Viewport) -> Result<(), RenderError> {
        self.render.resize(viewport)
    }

    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) -> Result<(), RenderError> {
        self.render.orbit(delta_yaw, delta_pitch)
    }

    pub fn zoom(&mut self, amount: f32) -> Result<(), RenderError> {
        self.render.zoom(amount)
    }

    /// Applies every completion that has already arrived. Returns how many
    /// were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Waits for the next completion and applies it. Returns `false` once
    /// the engine is disposed.
    pub async fn next_completion(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Waits until no backend call is in flight.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 && self.next_completion().await {}
    }

    /// One frame: apply completions, then tick the render loop.
    pub fn frame(&mut self) -> Result<(), RenderError> {
        self.pump();
        self.render.tick()
    }

    /// Runs `frames` frames at the configured frame rate.
    pub async fn run(&mut self, frames: u64) -> Result<(), RenderError> {
        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        for _ in 0..frames {
            interval.tick().await;
            self.frame()?;
        }
        Ok(())
    }

    pub fn outputs(&self) -> EngineOutputs {
        let picker = self.render.picker();
        let hovered_item = picker
            .hovered()
            .and_then(|id| self.items.iter().find(|item| item.item_id == id))
            .cloned();
        EngineOutputs {
            popover_anchor: hovered_item.as_ref().and(picker.popover_anchor()),
            hovered_item,
            pinned_item: picker.pinned().map(str::to_owned),
            suggestion: self.preview.state().clone(),
            can_confirm: self.preview.can_confirm(),
            error: self.preview.error().cloned(),
        }
    }

    /// Tears down the render context. Completions arriving later are
    /// dropped without effect.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.completions_rx.close();
        self.render.dispose();
        info!("Engine disposed with {} calls in flight", self.in_flight);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn render(&self) -> &RenderContext<R, S> {
        &self.render
    }

    pub fn preview(&self) -> &PreviewController {
        &self.preview
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn viewed_container(&self) -> Option<&str> {
        self.viewed.as_deref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn last_rebuild(&self) -> Option<&RebuildReport> {
        self.last_rebuild.as_ref()
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.disposed {
            debug!("completion after dispose ignored");
            return;
        }

        let ghost_before = self.preview.ghost();
        match completion {
            Completion::Suggestion { ticket, result } => {
                self.preview.resolve_suggestion(ticket, result);
            }
            Completion::Placement { ticket, result } => {
                if let Some(command) = self.preview.resolve_placement(ticket, result) {
                    self.dispatch(command);
                }
            }
            Completion::Refresh(Ok((containers, items))) => {
                self.load(containers, items);
                return;
            }
            Completion::Refresh(Err(err)) => {
                self.preview
                    .report_error(PreviewError::DataRefresh(err.to_string()));
            }
        }
        if self.preview.ghost() != ghost_before {
            self.rebuild_scene();
        }
    }

    fn dispatch(&mut self, command: PreviewCommand) {
        if self.disposed {
            return;
        }
        self.in_flight += 1;
        let backend = Rc::clone(&self.backend);
        let tx = self.completions_tx.clone();

        match command {
            PreviewCommand::FetchSuggestion(ticket) => {
                tokio::task::spawn_local(async move {
                    let result = backend.placement_suggestion(&ticket.item_id).await;
                    deliver(&tx, Completion::Suggestion { ticket, result });
                });
            }
            PreviewCommand::SubmitPlacement(ticket, command) => {
                tokio::task::spawn_local(async move {
                    let result = backend.confirm_placement(&command).await;
                    deliver(&tx, Completion::Placement { ticket, result });
                });
            }
            PreviewCommand::RefreshData => {
                tokio::task::spawn_local(async move {
                    let (containers, items) =
                        tokio::join!(backend.list_containers(), backend.list_items());
                    let result = containers.and_then(|containers| items.map(|items| (containers, items)));
                    deliver(&tx, Completion::Refresh(result));
                });
            }
        }
    }

    fn rebuild_scene(&mut self) {
        if self.disposed {
            return;
        }
        let Some(container) = self
            .viewed
            .as_deref()
            .and_then(|id| self.containers.iter().find(|c| c.container_id == id))
        else {
            self.render.clear_scene();
            return;
        };
        let placed: Vec<Item> = self
            .items
            .iter()
            .filter(|item| item.is_in(&container.container_id))
            .cloned()
            .collect();

        let input = SceneInput {
            container,
            placed_items: &placed,
            ghost: self.preview.ghost(),
        };
        match self.render.rebuild_scene(input) {
            Ok(report) => self.last_rebuild = Some(report),
            Err(err) => warn!("⚠️ Scene not rebuilt: {}", err),
        }
    }
}

impl<B, R, S> Drop for PlacementEngine<B, R, S>
where
    B: PlacementBackend + 'static,
    R: Renderer,
    S: DisplaySurface,
{
    fn drop(&mut self) {
        self.dispose();
    }
}

fn deliver(tx: &mpsc::UnboundedSender<Completion>, completion: Completion) {
    if tx.send(completion).is_err() {
        // Engine is gone; the result has nowhere to go.
        debug!("completion dropped after engine shutdown");
    }
}
