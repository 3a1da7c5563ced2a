//! Component manager: the per-session lifecycle state machine
//!
//! Owns component identity, render order and the id → definition / id → handle
//! maps. Every decoded chunk is applied synchronously; renderers never keep
//! state between calls.
//!
//! ```text
//! absent ──create──▶ live ──update/replace──▶ live ──remove/clear──▶ absent
//! ```
//!
//! Protocol inconsistencies (unknown ids, malformed envelopes) are no-ops and
//! never errors. The interactive round trip (control activation, dispatch,
//! settle) and the artifact opened-signal also live here.

pub mod artifacts;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};

use ratatui::text::{Line, Span};

use crate::protocol::decoder::Decoded;
use crate::protocol::ui_state::UiStateUpdate;
use crate::protocol::{generate_id, ComponentUpdate, DataMap, RichComponent, UpdateOperation};
use crate::render::artifact::set_surface_mode;
use crate::render::{
    line_text, ComponentRegistry, ControlAction, RenderContext, RenderHandle, SurfaceMode,
    TableView,
};
use crate::ui_state::{BarStatus, UiStateSink};
use artifacts::{ArtifactListener, ArtifactOpened, ArtifactOpener, NoopOpener};

/// Frames to wait before following a newly created component
const SCROLL_DELAY_FRAMES: u8 = 2;

/// Collaborators injected at construction
pub struct ManagerDeps {
    pub ui: Box<dyn UiStateSink>,
    pub listeners: Vec<Box<dyn ArtifactListener>>,
    pub opener: Box<dyn ArtifactOpener>,
}

impl ManagerDeps {
    pub fn new(ui: Box<dyn UiStateSink>) -> Self {
        Self {
            ui,
            listeners: Vec::new(),
            opener: Box::new(NoopOpener),
        }
    }

    pub fn with_listener(mut self, listener: Box<dyn ArtifactListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_opener(mut self, opener: Box<dyn ArtifactOpener>) -> Self {
        self.opener = opener;
        self
    }
}

/// A control activation awaiting its outbound dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTicket {
    pub component_id: String,
    pub control: usize,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Dispatch(ActionTicket),
    ReopenArtifact(String),
}

/// One drawable component in transcript order
#[derive(Debug, Clone)]
pub struct TranscriptBlock {
    pub component_id: String,
    pub lines: Vec<Line<'static>>,
}

pub struct ComponentManager {
    registry: ComponentRegistry,
    ctx: RenderContext,
    order: Vec<String>,
    definitions: HashMap<String, RichComponent>,
    handles: HashMap<String, RenderHandle>,
    live: usize,
    pending_scroll: Option<u8>,
    ui: Box<dyn UiStateSink>,
    listeners: Vec<Box<dyn ArtifactListener>>,
    opener: Box<dyn ArtifactOpener>,
}

impl ComponentManager {
    pub fn new(registry: ComponentRegistry, ctx: RenderContext, deps: ManagerDeps) -> Self {
        Self {
            registry,
            ctx,
            order: Vec::new(),
            definitions: HashMap::new(),
            handles: HashMap::new(),
            live: 0,
            pending_scroll: None,
            ui: deps.ui,
            listeners: deps.listeners,
            opener: deps.opener,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    pub fn apply(&mut self, decoded: Decoded) {
        match decoded {
            Decoded::Component(update) => self.apply_update(update),
            Decoded::UiState(update) => self.apply_ui_state(update),
            Decoded::BackendError(message) => {
                tracing::warn!("Backend error: {}", message);
                self.ui.set_status(BarStatus::Error, &message, None);
            }
            Decoded::Empty => {}
        }
    }

    pub fn apply_update(&mut self, update: ComponentUpdate) {
        let ComponentUpdate {
            operation,
            target_id,
            component,
            updates,
            position,
            ..
        } = update;

        match operation {
            UpdateOperation::Create => match component {
                Some(component) => self.create(component),
                None => tracing::debug!("create for {} without component", target_id),
            },
            UpdateOperation::Update => {
                let changes = updates.or_else(|| component.map(|c| c.normalized().data));
                match changes {
                    Some(changes) => self.update(&target_id, &changes),
                    None => tracing::debug!("update for {} without changes", target_id),
                }
            }
            UpdateOperation::Replace => match component {
                Some(component) => self.replace(&target_id, component),
                None => tracing::debug!("replace for {} without component", target_id),
            },
            UpdateOperation::Remove => self.remove(&target_id),
            UpdateOperation::Reorder => {
                tracing::debug!(
                    "reorder for {} ignored (order is append-only): {:?}",
                    target_id,
                    position
                );
            }
            UpdateOperation::BulkUpdate => {
                for (id, partial) in updates.unwrap_or_default() {
                    match partial.as_object() {
                        Some(partial) => self.update(&id, partial),
                        None => tracing::debug!("bulk_update entry for {} is not an object", id),
                    }
                }
            }
        }
    }

    pub fn apply_ui_state(&mut self, update: UiStateUpdate) {
        self.ui.apply(update);
    }

    pub fn set_status(&mut self, status: BarStatus, message: &str, detail: Option<String>) {
        self.ui.set_status(status, message, detail);
    }

    pub fn status(&self) -> BarStatus {
        self.ui.status()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Create, or replace when the id is already live
    pub fn create(&mut self, component: RichComponent) {
        let component = component.normalized();
        if self.definitions.contains_key(&component.id) {
            let id = component.id.clone();
            tracing::debug!("create for live id {}, treating as replace", id);
            self.replace(&id, component);
            return;
        }

        let id = component.id.clone();
        let handle = self.registry.render(&component, &self.ctx);
        let has_artifact = handle.artifact.is_some();

        self.order.push(id.clone());
        self.definitions.insert(id.clone(), component);
        self.handles.insert(id.clone(), handle);
        self.live += 1;
        self.pending_scroll = Some(SCROLL_DELAY_FRAMES);

        if has_artifact {
            self.announce_artifact(&id, false);
        }
    }

    /// Merge partial fields into a live component; unknown ids are ignored
    pub fn update(&mut self, target_id: &str, updates: &DataMap) {
        let Some(definition) = self.definitions.get_mut(target_id) else {
            tracing::debug!("update for unknown id {} ignored", target_id);
            return;
        };
        definition.merge_updates(updates);

        if let Some(handle) = self.handles.get_mut(target_id) {
            self.registry
                .update(handle, definition, Some(updates), &self.ctx);
        }
    }

    /// Full re-render of a live component, re-keying if the id changed
    pub fn replace(&mut self, target_id: &str, component: RichComponent) {
        if !self.definitions.contains_key(target_id) {
            tracing::debug!("replace for unknown id {} ignored", target_id);
            return;
        }

        let mut component = component.normalized();
        if component.id.is_empty() {
            component.id = target_id.to_string();
        }
        let new_id = component.id.clone();
        if new_id != target_id && self.definitions.contains_key(&new_id) {
            self.remove(&new_id);
        }

        let handle = self.registry.render(&component, &self.ctx);
        let has_artifact = handle.artifact.is_some();

        if let Some(mut old) = self.handles.remove(target_id) {
            self.registry.remove(&mut old);
        }
        self.definitions.remove(target_id);
        if let Some(slot) = self.order.iter_mut().find(|id| id.as_str() == target_id) {
            *slot = new_id.clone();
        }
        self.definitions.insert(new_id.clone(), component);
        self.handles.insert(new_id.clone(), handle);

        if has_artifact {
            self.announce_artifact(&new_id, false);
        }
    }

    /// Drop a component; removing an unknown id is a no-op
    pub fn remove(&mut self, target_id: &str) {
        let Some(mut handle) = self.handles.remove(target_id) else {
            tracing::debug!("remove for unknown id {} ignored", target_id);
            return;
        };
        self.registry.remove(&mut handle);
        self.definitions.remove(target_id);
        self.order.retain(|id| id != target_id);
        self.live = self.live.saturating_sub(1);
    }

    pub fn clear(&mut self) {
        for handle in self.handles.values_mut() {
            self.registry.remove(handle);
        }
        self.order.clear();
        self.definitions.clear();
        self.handles.clear();
        self.live = 0;
        self.pending_scroll = None;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Interactive round trip
    // ─────────────────────────────────────────────────────────────────────────

    /// Activate control `index` of `component_id`
    ///
    /// Submit controls are disabled as a group and the clicked one is marked
    /// chosen and dispatching; the caller must `settle_action` the ticket.
    /// Disabled controls are ignored.
    pub fn activate_control(&mut self, component_id: &str, index: usize) -> Option<Activation> {
        let handle = self.handles.get_mut(component_id)?;
        let control = handle.controls.get(index)?;

        let action = match &control.action {
            ControlAction::ReopenArtifact => {
                return Some(Activation::ReopenArtifact(component_id.to_string()))
            }
            ControlAction::Submit(_) if control.disabled => {
                tracing::debug!("activation of disabled control {}#{} ignored", component_id, index);
                return None;
            }
            ControlAction::Submit(action) => action.clone(),
        };

        for (i, control) in handle.controls.iter_mut().enumerate() {
            if !matches!(control.action, ControlAction::Submit(_)) {
                continue;
            }
            control.disabled = true;
            if i == index {
                control.chosen = true;
                control.dispatching = true;
            }
        }

        Some(Activation::Dispatch(ActionTicket {
            component_id: component_id.to_string(),
            control: index,
            action,
        }))
    }

    /// Finish a dispatch: success keeps the group consumed, failure rolls back
    pub fn settle_action(&mut self, ticket: &ActionTicket, ok: bool) {
        let Some(handle) = self.handles.get_mut(&ticket.component_id) else {
            tracing::debug!("settle for removed component {}", ticket.component_id);
            return;
        };
        for control in handle.controls.iter_mut() {
            if !matches!(control.action, ControlAction::Submit(_)) {
                continue;
            }
            control.dispatching = false;
            if !ok {
                control.disabled = control.originally_disabled;
                control.chosen = false;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Artifacts
    // ─────────────────────────────────────────────────────────────────────────

    /// User-initiated open of an artifact component
    pub fn reopen_artifact(&mut self, component_id: &str) -> bool {
        if self
            .handles
            .get(component_id)
            .and_then(|h| h.artifact.as_ref())
            .is_none()
        {
            return false;
        }
        self.announce_artifact(component_id, true);
        true
    }

    fn announce_artifact(&mut self, component_id: &str, user_initiated: bool) {
        let Some(handle) = self.handles.get_mut(component_id) else {
            return;
        };
        let Some(surface) = handle.artifact.as_ref() else {
            return;
        };

        let mut event = ArtifactOpened::from_surface(surface, user_initiated);
        for listener in self.listeners.iter_mut() {
            listener.on_opened(&mut event);
        }

        if event.default_prevented() {
            tracing::debug!("artifact {} open prevented by listener", event.artifact_id);
            set_surface_mode(handle, SurfaceMode::Placeholder);
            return;
        }

        if user_initiated {
            if let Err(e) = self.opener.open(surface) {
                tracing::warn!("Failed to open artifact {}: {}", event.artifact_id, e);
            }
        }
        set_surface_mode(handle, SurfaceMode::Preview);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn handle(&self, id: &str) -> Option<&RenderHandle> {
        self.handles.get(id)
    }

    pub fn definition(&self, id: &str) -> Option<&RichComponent> {
        self.definitions.get(id)
    }

    pub fn table_mut(&mut self, id: &str) -> Option<&mut TableView> {
        self.handles.get_mut(id).and_then(|h| h.table.as_mut())
    }

    /// Advance one frame; true when the transcript should follow the newest item
    pub fn tick_frame(&mut self) -> bool {
        match self.pending_scroll {
            Some(n) if n <= 1 => {
                self.pending_scroll = None;
                true
            }
            Some(n) => {
                self.pending_scroll = Some(n - 1);
                false
            }
            None => false,
        }
    }

    /// Ids owned by a live container, drawn under it rather than at top level
    fn contained_ids(&self) -> HashSet<&str> {
        self.order
            .iter()
            .filter_map(|id| self.handles.get(id))
            .flat_map(|h| h.children.iter().map(String::as_str))
            .filter(|child| self.handles.contains_key(*child))
            .collect()
    }

    /// Visible components in draw order, containers expanded
    ///
    /// Containers that only hold each other have no root; the earliest of
    /// such a group is drawn as one so its members stay on screen.
    fn draw_order(&self) -> Vec<(String, usize)> {
        let contained = self.contained_ids();
        let mut reached = HashSet::new();
        for id in self.order.iter().filter(|id| !contained.contains(id.as_str())) {
            self.reach(id, &mut reached);
        }

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        for id in &self.order {
            if !contained.contains(id.as_str()) {
                self.walk(id, 0, &mut visited, &mut out);
            } else if !reached.contains(id.as_str()) {
                self.reach(id, &mut reached);
                self.walk(id, 0, &mut visited, &mut out);
            }
        }
        out
    }

    /// Everything under `id`, hidden or not
    fn reach<'a>(&'a self, id: &'a str, reached: &mut HashSet<&'a str>) {
        if !reached.insert(id) {
            return;
        }
        if let Some(handle) = self.handles.get(id) {
            for child in &handle.children {
                self.reach(child, reached);
            }
        }
    }

    fn walk(&self, id: &str, depth: usize, visited: &mut HashSet<String>, out: &mut Vec<(String, usize)>) {
        let Some(handle) = self.handles.get(id) else {
            return;
        };
        if handle.hidden || !visited.insert(id.to_string()) {
            return;
        }
        out.push((id.to_string(), depth));
        for child in &handle.children {
            self.walk(child, depth + 1, visited, out);
        }
    }

    /// Drawable blocks with `focus` (component id, control index) highlighted
    pub fn transcript(&self, focus: Option<(&str, usize)>) -> Vec<TranscriptBlock> {
        self.draw_order()
            .into_iter()
            .filter_map(|(id, depth)| {
                let handle = self.handles.get(&id)?;
                let focused = focus.filter(|(fid, _)| *fid == id).map(|(_, i)| i);
                let mut lines = handle.display_lines(focused);
                if depth > 0 {
                    let indent = "  ".repeat(depth);
                    for line in lines.iter_mut() {
                        line.spans.insert(0, Span::raw(indent.clone()));
                    }
                }
                Some(TranscriptBlock {
                    component_id: id,
                    lines,
                })
            })
            .collect()
    }

    /// Visible component ids in draw order
    pub fn visible_ids(&self) -> Vec<String> {
        self.draw_order().into_iter().map(|(id, _)| id).collect()
    }

    /// Activatable controls in draw order
    pub fn focusables(&self) -> Vec<(String, usize)> {
        self.draw_order()
            .into_iter()
            .filter_map(|(id, _)| self.handles.get(&id).map(|h| (id, h)))
            .flat_map(|(id, handle)| {
                handle
                    .enabled_controls()
                    .map(|i| (id.clone(), i))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Plain-text transcript, blocks separated by blank lines
    pub fn transcript_text(&self) -> String {
        self.transcript(None)
            .iter()
            .map(|block| {
                block
                    .lines
                    .iter()
                    .map(line_text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Track a locally produced component (e.g. the user's own message echo)
    pub fn push_local(&mut self, component_type: &str, data: DataMap) -> String {
        let id = generate_id();
        self.create(RichComponent::new(id.clone(), component_type, data));
        id
    }
}
