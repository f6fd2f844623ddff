//! Placement preview controller.
//!
//! Tracks one selected item through suggestion, ghost preview and placement.
//! Every request carries a [`Ticket`]; a completion whose ticket no longer
//! matches the current selection generation is counted and dropped.
//!
//! The controller never performs I/O itself. Its methods return the
//! [`PreviewCommand`] the caller has to execute and feed back through
//! [`PreviewController::resolve_suggestion`] and
//! [`PreviewController::resolve_placement`].

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ServiceError, SuggestionOutcome};
use crate::geometry;
use crate::model::{Container, Item, PlacementCommand, Suggestion};
use crate::types::PlacementBox;

/// User-visible failure kept until dismissed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreviewError {
    #[error("could not get a placement suggestion: {0}")]
    SuggestionService(String),
    #[error("placement failed: {0}")]
    PlacementService(String),
    #[error("placement rejected before sending: {0}")]
    Preflight(String),
    #[error("could not refresh containers and items: {0}")]
    DataRefresh(String),
}

/// Identity of one request, checked when its response arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub item_id: String,
}

/// I/O the caller must perform on behalf of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewCommand {
    FetchSuggestion(Ticket),
    SubmitPlacement(Ticket, PlacementCommand),
    RefreshData,
}

/// Where the selected item is in its preview lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionState {
    /// No unplaced item selected.
    Idle,
    /// Waiting for the suggestion service.
    Pending { item_id: String },
    /// The service found no placement for now.
    Unavailable {
        item_id: String,
        message: Option<String>,
    },
    /// Suggested for the viewed container; ghost shown, confirm offered.
    ReadyHere(Suggestion),
    /// Suggested for another container; nothing shown.
    ReadyElsewhere(Suggestion),
    /// Placement command in flight; ghost still shown.
    Placing(Suggestion),
    /// The suggestion service failed.
    Failed { item_id: String },
}

impl SuggestionState {
    pub fn item_id(&self) -> Option<&str> {
        match self {
            SuggestionState::Idle => None,
            SuggestionState::Pending { item_id }
            | SuggestionState::Unavailable { item_id, .. }
            | SuggestionState::Failed { item_id } => Some(item_id),
            SuggestionState::ReadyHere(suggestion)
            | SuggestionState::ReadyElsewhere(suggestion)
            | SuggestionState::Placing(suggestion) => Some(&suggestion.item_id),
        }
    }
}

/// Suggestion and placement state for the selected item.
#[derive(Debug)]
pub struct PreviewController {
    state: SuggestionState,
    viewed_container: Option<String>,
    selected: Option<String>,
    generation: u64,
    error: Option<PreviewError>,
    stale_discarded: u64,
}

impl Default for PreviewController {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewController {
    pub fn new() -> Self {
        Self {
            state: SuggestionState::Idle,
            viewed_container: None,
            selected: None,
            generation: 0,
            error: None,
            stale_discarded: 0,
        }
    }

    pub fn state(&self) -> &SuggestionState {
        &self.state
    }

    /// The selected unplaced item, if any.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn viewed_container(&self) -> Option<&str> {
        self.viewed_container.as_deref()
    }

    /// Region to draw as ghost in the viewed container.
    pub fn ghost(&self) -> Option<PlacementBox> {
        match &self.state {
            SuggestionState::ReadyHere(suggestion) | SuggestionState::Placing(suggestion) => {
                Some(suggestion.region)
            }
            _ => None,
        }
    }

    /// Whether the confirm action is offered.
    pub fn can_confirm(&self) -> bool {
        matches!(self.state, SuggestionState::ReadyHere(_))
    }

    /// Number of completions dropped because their ticket was outdated.
    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    pub fn error(&self) -> Option<&PreviewError> {
        self.error.as_ref()
    }

    /// Clears the visible error. A failed suggestion returns to idle.
    pub fn dismiss_error(&mut self) {
        self.error = None;
        if matches!(self.state, SuggestionState::Failed { .. }) {
            self.state = SuggestionState::Idle;
        }
    }

    pub fn report_error(&mut self, error: PreviewError) {
        warn!("⚠️ {}", error);
        self.error = Some(error);
    }

    /// Switches the viewed container. An in-flight request is invalidated
    /// and re-issued for the selected unplaced item.
    pub fn set_viewed_container(&mut self, container_id: Option<&str>) -> Option<PreviewCommand> {
        if self.viewed_container.as_deref() == container_id {
            return None;
        }
        self.viewed_container = container_id.map(str::to_owned);
        let item_id = self.selected.clone()?;
        Some(self.request_suggestion(item_id))
    }

    /// Changes the selected item. Only unplaced items enter the preview.
    pub fn select_item(&mut self, item: Option<&Item>) -> Option<PreviewCommand> {
        match item {
            Some(item) if !item.is_placed() => {
                if self.selected.as_deref() == Some(item.item_id.as_str())
                    && self.state != SuggestionState::Idle
                {
                    return None;
                }
                self.selected = Some(item.item_id.clone());
                Some(self.request_suggestion(item.item_id.clone()))
            }
            _ => {
                self.generation += 1;
                self.selected = None;
                self.state = SuggestionState::Idle;
                None
            }
        }
    }

    fn request_suggestion(&mut self, item_id: String) -> PreviewCommand {
        self.generation += 1;
        debug!(item = %item_id, generation = self.generation, "requesting suggestion");
        self.state = SuggestionState::Pending {
            item_id: item_id.clone(),
        };
        PreviewCommand::FetchSuggestion(Ticket {
            generation: self.generation,
            item_id,
        })
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation
            && self.selected.as_deref() == Some(ticket.item_id.as_str())
    }

    fn discard(&mut self, ticket: &Ticket, what: &str) {
        self.stale_discarded += 1;
        debug!(
            item = %ticket.item_id,
            generation = ticket.generation,
            current = self.generation,
            "stale {} response discarded",
            what
        );
    }

    /// Applies a suggestion response.
    pub fn resolve_suggestion(
        &mut self,
        ticket: Ticket,
        result: Result<SuggestionOutcome, ServiceError>,
    ) {
        if !self.is_current(&ticket) || !matches!(self.state, SuggestionState::Pending { .. }) {
            self.discard(&ticket, "suggestion");
            return;
        }

        self.state = match result {
            Ok(SuggestionOutcome::Suggested(suggestion)) => {
                if self.viewed_container.as_deref() == Some(suggestion.container_id.as_str()) {
                    info!(
                        "👻 Suggested {} in {} (preferred zone: {})",
                        suggestion.item_id, suggestion.container_id, suggestion.in_preferred_zone
                    );
                    SuggestionState::ReadyHere(suggestion)
                } else {
                    debug!(
                        item = %suggestion.item_id,
                        container = %suggestion.container_id,
                        "suggestion targets another container"
                    );
                    SuggestionState::ReadyElsewhere(suggestion)
                }
            }
            Ok(SuggestionOutcome::NoPlacement { message }) => {
                info!(
                    "No placement available for {}: {}",
                    ticket.item_id,
                    message.as_deref().unwrap_or("no reason given")
                );
                SuggestionState::Unavailable {
                    item_id: ticket.item_id,
                    message,
                }
            }
            Err(err) => {
                self.report_error(PreviewError::SuggestionService(err.to_string()));
                SuggestionState::Failed {
                    item_id: ticket.item_id,
                }
            }
        };
    }

    /// Starts the placement of the shown suggestion.
    ///
    /// The region must fit inside `container` and must not overlap any of
    /// `placed_items`; otherwise the ghost stays and an error is shown.
    pub fn confirm(&mut self, container: &Container, placed_items: &[Item]) -> Option<PreviewCommand> {
        let SuggestionState::ReadyHere(suggestion) = &self.state else {
            return None;
        };

        if let Err(reason) = preflight(suggestion, container, placed_items) {
            self.report_error(PreviewError::Preflight(reason));
            return None;
        }

        let suggestion = suggestion.clone();
        let command = PlacementCommand {
            item_id: suggestion.item_id.clone(),
            container_id: suggestion.container_id.clone(),
            region: suggestion.region,
        };
        let ticket = Ticket {
            generation: self.generation,
            item_id: suggestion.item_id.clone(),
        };
        self.error = None;
        self.state = SuggestionState::Placing(suggestion);
        Some(PreviewCommand::SubmitPlacement(ticket, command))
    }

    /// Applies a placement response. A successful placement always asks for
    /// a data refresh, even when the selection changed meanwhile. A failure
    /// is always reported; only a current ticket restores the ghost.
    pub fn resolve_placement(
        &mut self,
        ticket: Ticket,
        result: Result<(), ServiceError>,
    ) -> Option<PreviewCommand> {
        let current =
            self.is_current(&ticket) && matches!(self.state, SuggestionState::Placing(_));

        match result {
            Ok(()) => {
                info!("✅ Placed {}", ticket.item_id);
                if current {
                    self.selected = None;
                    self.state = SuggestionState::Idle;
                } else {
                    self.discard(&ticket, "placement");
                }
                Some(PreviewCommand::RefreshData)
            }
            Err(err) => {
                if current {
                    if let SuggestionState::Placing(suggestion) =
                        std::mem::replace(&mut self.state, SuggestionState::Idle)
                    {
                        self.state = SuggestionState::ReadyHere(suggestion);
                    }
                } else {
                    self.discard(&ticket, "placement");
                }
                self.report_error(PreviewError::PlacementService(format!(
                    "{}: {}",
                    ticket.item_id, err
                )));
                None
            }
        }
    }
}

fn preflight(
    suggestion: &Suggestion,
    container: &Container,
    placed_items: &[Item],
) -> Result<(), String> {
    if suggestion.container_id != container.container_id {
        return Err(format!(
            "suggestion targets {} but {} is viewed",
            suggestion.container_id, container.container_id
        ));
    }
    if !geometry::fits_within(&suggestion.region, &container.dimensions) {
        return Err(format!(
            "{} does not fit inside {}",
            suggestion.item_id, container.container_id
        ));
    }
    for item in placed_items.iter().filter(|item| item.item_id != suggestion.item_id) {
        if let Ok(region) = item.placed_box() {
            if geometry::overlaps(&suggestion.region, &region) {
                return Err(format!(
                    "{} would overlap {}",
                    suggestion.item_id, item.item_id
                ));
            }
        }
    }
    Ok(())
}
