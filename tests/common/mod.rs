#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use stowage_view::client::{PlacementBackend, ServiceError, SuggestionOutcome};
use stowage_view::model::{Container, Item, PlacementCommand, Suggestion};
use stowage_view::types::{Coordinates, Dimensions, PlacementBox};

#[derive(Default)]
struct MemoryState {
    containers: Vec<Container>,
    items: Vec<Item>,
    suggestions: HashMap<String, SuggestionOutcome>,
    fail_suggestions: bool,
    reject_placements: Option<String>,
    placed: Vec<PlacementCommand>,
    suggestion_calls: usize,
}

/// In-memory data and placement service. Clones share state so a test can
/// inspect the service after handing it to the engine.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryBackend {
    pub fn new(containers: Vec<Container>, items: Vec<Item>) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.borrow_mut();
            state.containers = containers;
            state.items = items;
        }
        backend
    }

    pub fn suggest(&self, item_id: &str, container_id: &str, region: PlacementBox) {
        self.state.borrow_mut().suggestions.insert(
            item_id.to_string(),
            SuggestionOutcome::Suggested(Suggestion {
                item_id: item_id.to_string(),
                container_id: container_id.to_string(),
                container_zone: None,
                region,
                in_preferred_zone: true,
            }),
        );
    }

    pub fn fail_suggestions(&self) {
        self.state.borrow_mut().fail_suggestions = true;
    }

    pub fn reject_placements(&self, message: &str) {
        self.state.borrow_mut().reject_placements = Some(message.to_string());
    }

    pub fn placed(&self) -> Vec<PlacementCommand> {
        self.state.borrow().placed.clone()
    }

    pub fn suggestion_calls(&self) -> usize {
        self.state.borrow().suggestion_calls
    }
}

impl PlacementBackend for MemoryBackend {
    async fn list_containers(&self) -> Result<Vec<Container>, ServiceError> {
        tokio::task::yield_now().await;
        Ok(self.state.borrow().containers.clone())
    }

    async fn list_items(&self) -> Result<Vec<Item>, ServiceError> {
        tokio::task::yield_now().await;
        Ok(self.state.borrow().items.clone())
    }

    async fn placement_suggestion(&self, item_id: &str) -> Result<SuggestionOutcome, ServiceError> {
        tokio::task::yield_now().await;
        let mut state = self.state.borrow_mut();
        state.suggestion_calls += 1;
        if state.fail_suggestions {
            return Err(ServiceError::Status {
                status: 500,
                body: "suggestion engine down".into(),
            });
        }
        Ok(state
            .suggestions
            .get(item_id)
            .cloned()
            .unwrap_or(SuggestionOutcome::NoPlacement {
                message: Some("No suitable placement found".into()),
            }))
    }

    async fn confirm_placement(&self, command: &PlacementCommand) -> Result<(), ServiceError> {
        tokio::task::yield_now().await;
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.reject_placements.clone() {
            return Err(ServiceError::Rejected(message));
        }
        state.placed.push(command.clone());
        if let Some(item) = state.items.iter_mut().find(|i| i.item_id == command.item_id) {
            item.container_id = Some(command.container_id.clone());
            item.position = Some(command.region.into());
        }
        Ok(())
    }
}

pub fn container(id: &str, size: f64) -> Container {
    Container::new(id, "Lab", Dimensions::new(size, size, size)).unwrap()
}

pub fn cube(start: (f64, f64, f64), size: f64) -> PlacementBox {
    PlacementBox::new(
        Coordinates::new(start.0, start.1, start.2),
        Coordinates::new(start.0 + size, start.1 + size, start.2 + size),
    )
}

pub fn unplaced(id: &str, size: f64) -> Item {
    Item::new(id, format!("Item {id}"), Dimensions::new(size, size, size), 50, "Lab").unwrap()
}

pub fn placed(id: &str, container_id: &str, region: PlacementBox) -> Item {
    let (w, d, h) = region.end.delta(&region.start);
    Item::new(id, format!("Item {id}"), Dimensions::new(w, d, h), 50, "Lab")
        .unwrap()
        .placed_at(container_id, region)
}
