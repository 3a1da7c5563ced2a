use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use super::artifacts::{ArtifactListener, ArtifactOpened, ArtifactOpener};
use super::*;
use crate::protocol::decoder::ChunkDecoder;
use crate::protocol::ChatStreamChunk;
use crate::render::ArtifactSurface;
use crate::ui_state::{self, SharedUiState};

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

fn manager() -> (ComponentManager, SharedUiState) {
    let ui = ui_state::shared();
    let deps = ManagerDeps::new(Box::new(ui.clone()));
    (
        ComponentManager::new(ComponentRegistry::with_builtin(), RenderContext::default(), deps),
        ui,
    )
}

fn feed(manager: &mut ComponentManager, rich: Value) {
    let decoded = ChunkDecoder::new().decode(ChatStreamChunk::rich(rich));
    manager.apply(decoded);
}

fn text(manager: &ComponentManager, id: &str) -> String {
    manager.handle(id).map(|h| h.plain_text()).unwrap_or_default()
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<ArtifactOpened>>>,
    prevent: bool,
}

impl ArtifactListener for Recorder {
    fn on_opened(&mut self, event: &mut ArtifactOpened) {
        if self.prevent {
            event.prevent_default();
        }
        self.seen.lock().unwrap().push(event.clone());
    }
}

#[derive(Clone, Default)]
struct CountingOpener(Arc<Mutex<Vec<String>>>);

impl ArtifactOpener for CountingOpener {
    fn open(&mut self, surface: &ArtifactSurface) -> std::io::Result<()> {
        self.0.lock().unwrap().push(surface.artifact_id.clone());
        Ok(())
    }
}

fn artifact_json(id: &str) -> Value {
    json!({
        "id": id,
        "type": "artifact",
        "lifecycle": "create",
        "data": {
            "artifact_id": "chart-1",
            "artifact_type": "html",
            "content": "<div>sales</div>",
            "title": "Sales"
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_create_update_remove_leaves_nothing_behind() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "c1", "type": "text", "lifecycle": "create", "data": {"content": "hello"}}));
    assert_eq!(text(&m, "c1"), "hello");

    feed(&mut m, json!({"id": "c1", "type": "text", "lifecycle": "update", "data": {"content": "hello, world"}}));
    assert_eq!(text(&m, "c1"), "hello, world");

    feed(&mut m, json!({"id": "c1", "type": "text", "lifecycle": "remove"}));
    assert!(m.is_empty());
    assert!(m.order().is_empty());
    assert!(m.handle("c1").is_none());
    assert!(m.definition("c1").is_none());
    assert_eq!(m.transcript_text(), "");
}

#[test]
fn test_duplicate_create_replaces_in_place() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "first", "type": "text", "data": {"content": "before"}}));
    feed(&mut m, json!({"id": "c1", "type": "text", "data": {"content": "one"}}));
    feed(&mut m, json!({"id": "c1", "type": "text", "data": {"content": "two"}}));

    assert_eq!(m.len(), 2);
    assert_eq!(m.order(), &["first".to_string(), "c1".to_string()]);
    assert_eq!(text(&m, "c1"), "two");
}

#[test]
fn test_remove_keeps_remaining_order() {
    let (mut m, _) = manager();
    for id in ["a", "b", "c"] {
        feed(&mut m, json!({"id": id, "type": "text", "data": {"content": id}}));
    }
    feed(&mut m, json!({"id": "b", "type": "text", "lifecycle": "remove"}));
    feed(&mut m, json!({"id": "d", "type": "text", "data": {"content": "d"}}));

    assert_eq!(m.order(), &["a", "c", "d"].map(String::from));
    assert_eq!(m.len(), 3);
    assert_eq!(m.transcript_text(), "a\n\nc\n\nd");
}

#[test]
fn test_partial_update_keeps_component_hidden() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "h", "type": "text", "lifecycle": "create", "visible": false, "data": {"content": "secret"}}));
    feed(&mut m, json!({"id": "h", "type": "text", "lifecycle": "update", "data": {"content": "still secret"}}));

    assert!(!m.definition("h").unwrap().visible);
    assert_eq!(m.transcript_text(), "");

    feed(&mut m, json!({"id": "h", "type": "text", "lifecycle": "update", "visible": true, "data": {}}));
    assert_eq!(m.transcript_text(), "still secret");
}

#[test]
fn test_unknown_targets_are_ignored() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "ghost", "type": "text", "lifecycle": "update", "data": {"content": "x"}}));
    feed(&mut m, json!({"id": "ghost", "type": "text", "lifecycle": "replace", "data": {"content": "x"}}));
    feed(&mut m, json!({"id": "ghost", "type": "text", "lifecycle": "remove"}));
    assert!(m.is_empty());

    feed(&mut m, json!({"id": "c1", "type": "text", "data": {"content": "kept"}}));
    m.remove("c1");
    m.remove("c1");
    assert!(m.is_empty());
}

#[test]
fn test_update_merges_partial_fields() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "p", "type": "progress_bar", "data": {"label": "Loading", "value": 0.25}}));
    m.update("p", json!({"value": 0.75}).as_object().unwrap());

    let definition = m.definition("p").unwrap();
    assert_eq!(definition.data["label"], "Loading");
    assert_eq!(definition.data["value"], 0.75);
    assert!(text(&m, "p").contains("75%"));
}

#[test]
fn test_update_changes_visibility() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "c1", "type": "text", "data": {"content": "peekaboo"}}));
    m.update("c1", json!({"visible": false}).as_object().unwrap());

    assert!(m.handle("c1").unwrap().hidden);
    assert_eq!(m.len(), 1);
    assert_eq!(m.transcript_text(), "");

    m.update("c1", json!({"visible": true}).as_object().unwrap());
    assert_eq!(m.transcript_text(), "peekaboo");
}

#[test]
fn test_replace_changes_type_and_keeps_slot() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "a", "type": "text", "data": {"content": "a"}}));
    feed(&mut m, json!({"id": "b", "type": "text", "data": {"content": "b"}}));
    feed(&mut m, json!({"id": "c", "type": "text", "data": {"content": "c"}}));

    feed(&mut m, json!({"id": "b", "type": "badge", "lifecycle": "replace", "data": {"text": "B"}}));
    assert_eq!(m.order(), &["a".to_string(), "b".to_string(), "c".to_string()]);
    assert_eq!(m.handle("b").unwrap().renderer, "badge");
    assert_eq!(text(&m, "b"), " B ");
}

#[test]
fn test_replace_with_new_id_rekeys() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "a", "type": "text", "data": {"content": "a"}}));
    let component = RichComponent::new("z", "text", json!({"content": "z"}).as_object().cloned().unwrap());
    m.replace("a", component);

    assert_eq!(m.order(), &["z".to_string()]);
    assert!(m.handle("a").is_none());
    assert_eq!(text(&m, "z"), "z");
    assert_eq!(m.len(), 1);
}

#[test]
fn test_bulk_update_applies_each_entry() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "a", "type": "text", "data": {"content": "a"}}));
    feed(&mut m, json!({"id": "b", "type": "text", "data": {"content": "b"}}));
    feed(
        &mut m,
        json!({
            "type": "component_update",
            "operation": "bulk_update",
            "target_id": "",
            "updates": {"a": {"content": "A"}, "b": {"content": "B"}, "missing": {"content": "?"}}
        }),
    );
    assert_eq!(text(&m, "a"), "A");
    assert_eq!(text(&m, "b"), "B");
    assert_eq!(m.len(), 2);
}

#[test]
fn test_reorder_is_a_no_op() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "a", "type": "text", "data": {"content": "a"}}));
    feed(&mut m, json!({"id": "b", "type": "text", "data": {"content": "b"}}));
    m.apply_update(ComponentUpdate {
        operation: UpdateOperation::Reorder,
        ..ComponentUpdate::remove("b")
    });
    assert_eq!(m.order(), &["a".to_string(), "b".to_string()]);
}

#[test]
fn test_clear_resets_everything() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "a", "type": "text", "data": {"content": "a"}}));
    feed(&mut m, json!({"id": "b", "type": "text", "data": {"content": "b"}}));
    m.clear();
    assert!(m.is_empty());
    assert!(m.order().is_empty());
    assert!(!m.tick_frame());
}

#[test]
fn test_unknown_type_renders_fallback() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "h", "type": "hologram", "data": {"depth": 3}}));
    assert_eq!(m.handle("h").unwrap().renderer, "fallback");
    assert!(text(&m, "h").starts_with("Unsupported component: hologram"));
}

#[test]
fn test_scroll_follows_after_two_frames() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "a", "type": "text", "data": {"content": "a"}}));
    assert!(!m.tick_frame());
    assert!(m.tick_frame());
    assert!(!m.tick_frame());
}

// ─────────────────────────────────────────────────────────────────────────────
// Side channel and errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ui_state_chunks_do_not_create_components() {
    let (mut m, ui) = manager();
    feed(
        &mut m,
        json!({"id": "vanna-status-bar", "type": "status_bar_update", "data": {"status": "working", "message": "Querying"}}),
    );
    assert!(m.is_empty());
    let state = ui.lock().unwrap();
    assert_eq!(state.status_bar.status, BarStatus::Working);
    assert_eq!(state.status_bar.message, "Querying");
}

#[test]
fn test_backend_error_sets_status() {
    let (mut m, ui) = manager();
    let chunk = ChatStreamChunk {
        kind: Some("error".into()),
        data: Some(json!({"message": "boom"})),
        ..Default::default()
    };
    m.apply(ChunkDecoder::new().decode(chunk));
    assert!(m.is_empty());
    assert_eq!(m.status(), BarStatus::Error);
    assert_eq!(ui.lock().unwrap().status_bar.message, "boom");
}

// ─────────────────────────────────────────────────────────────────────────────
// Containers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_container_draws_children_beneath_it() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "kid", "type": "text", "data": {"content": "inside"}}));
    feed(&mut m, json!({"id": "box", "type": "container", "children": ["kid"], "data": {"title": "Box"}}));
    feed(&mut m, json!({"id": "after", "type": "text", "data": {"content": "after"}}));

    assert_eq!(m.transcript_text(), "Box\n\n  inside\n\nafter");
}

#[test]
fn test_container_cycle_terminates() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "x", "type": "container", "children": ["y"], "data": {"title": "X"}}));
    feed(&mut m, json!({"id": "y", "type": "container", "children": ["x"], "data": {"title": "Y"}}));
    // The earlier container stands in as the root
    assert_eq!(m.transcript_text(), "X\n\n  Y");
    assert_eq!(m.len(), 2);
}

#[test]
fn test_cycle_under_a_root_is_drawn_once() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "x", "type": "container", "children": ["y"], "data": {"title": "X"}}));
    feed(&mut m, json!({"id": "y", "type": "container", "children": ["x"], "data": {"title": "Y"}}));
    feed(&mut m, json!({"id": "top", "type": "container", "children": ["y"], "data": {"title": "Top"}}));
    assert_eq!(m.transcript_text(), "Top\n\n  Y\n\n    X");
}

#[test]
fn test_hidden_container_hides_its_children() {
    let (mut m, _) = manager();
    feed(&mut m, json!({"id": "kid", "type": "text", "data": {"content": "inside"}}));
    feed(&mut m, json!({"id": "box", "type": "container", "children": ["kid"], "visible": false, "data": {"title": "Box"}}));
    assert_eq!(m.transcript(None).len(), 0);
    assert_eq!(m.len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Interactive round trip
// ─────────────────────────────────────────────────────────────────────────────

fn yes_no(m: &mut ComponentManager) {
    feed(
        m,
        json!({
            "id": "g",
            "type": "button_group",
            "data": {"buttons": [
                {"label": "Yes", "action": "/yes"},
                {"label": "No", "action": "/no"}
            ]}
        }),
    );
}

#[test]
fn test_click_disables_group_and_marks_choice() {
    let (mut m, _) = manager();
    yes_no(&mut m);
    assert_eq!(m.focusables(), vec![("g".to_string(), 0), ("g".to_string(), 1)]);

    let Some(Activation::Dispatch(ticket)) = m.activate_control("g", 0) else {
        panic!("expected dispatch");
    };
    assert_eq!(ticket.action, "/yes");

    let controls = &m.handle("g").unwrap().controls;
    assert!(controls.iter().all(|c| c.disabled));
    assert!(controls[0].chosen && controls[0].dispatching);
    assert!(!controls[1].chosen);
    assert!(m.focusables().is_empty());

    // A second click while disabled does nothing
    assert_eq!(m.activate_control("g", 1), None);

    m.settle_action(&ticket, true);
    let controls = &m.handle("g").unwrap().controls;
    assert!(controls.iter().all(|c| c.disabled));
    assert!(controls[0].chosen);
    assert!(!controls[0].dispatching);
}

#[test]
fn test_failed_dispatch_rolls_back() {
    let (mut m, _) = manager();
    yes_no(&mut m);
    let Some(Activation::Dispatch(ticket)) = m.activate_control("g", 1) else {
        panic!("expected dispatch");
    };
    m.settle_action(&ticket, false);

    let controls = &m.handle("g").unwrap().controls;
    assert!(controls.iter().all(|c| !c.disabled && !c.chosen && !c.dispatching));
    assert_eq!(m.handle("g").unwrap().plain_text(), "[ Yes ] [ No ]");
}

#[test]
fn test_rollback_keeps_originally_disabled_buttons() {
    let (mut m, _) = manager();
    feed(
        &mut m,
        json!({
            "id": "g",
            "type": "button_group",
            "data": {"buttons": [
                {"label": "Go", "action": "/go"},
                {"label": "Locked", "action": "/locked", "disabled": true}
            ]}
        }),
    );
    let Some(Activation::Dispatch(ticket)) = m.activate_control("g", 0) else {
        panic!("expected dispatch");
    };
    m.settle_action(&ticket, false);
    let controls = &m.handle("g").unwrap().controls;
    assert!(!controls[0].disabled);
    assert!(controls[1].disabled);
}

#[test]
fn test_consumed_group_survives_update() {
    let (mut m, _) = manager();
    yes_no(&mut m);
    let Some(Activation::Dispatch(ticket)) = m.activate_control("g", 0) else {
        panic!("expected dispatch");
    };
    m.settle_action(&ticket, true);
    m.update("g", json!({"orientation": "horizontal"}).as_object().unwrap());

    let controls = &m.handle("g").unwrap().controls;
    assert!(controls[0].chosen);
    assert!(controls.iter().all(|c| c.disabled));
}

#[test]
fn test_settle_after_remove_is_harmless() {
    let (mut m, _) = manager();
    yes_no(&mut m);
    let Some(Activation::Dispatch(ticket)) = m.activate_control("g", 0) else {
        panic!("expected dispatch");
    };
    m.remove("g");
    m.settle_action(&ticket, false);
    assert!(m.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_dataframe_caps_displayed_rows() {
    let (mut m, _) = manager();
    let rows: Vec<Value> = (0..150)
        .map(|i| json!({"id": i, "name": format!("row {}", i)}))
        .collect();
    feed(
        &mut m,
        json!({
            "id": "df",
            "type": "dataframe",
            "data": {"columns": ["id", "name"], "rows": rows, "max_rows_displayed": 100}
        }),
    );

    let view = m.handle("df").unwrap().table.as_ref().unwrap();
    assert_eq!(view.visible_rows().len(), 150);
    let rendered = text(&m, "df");
    assert!(rendered.contains("row 99"));
    assert!(!rendered.contains("row 100"));
    assert!(rendered.ends_with("Showing 100 of 150 rows"));
}

#[test]
fn test_table_sort_survives_data_update() {
    let (mut m, _) = manager();
    feed(
        &mut m,
        json!({
            "id": "df",
            "type": "dataframe",
            "data": {"columns": ["n"], "rows": [{"n": 2}, {"n": 1}]}
        }),
    );
    assert!(m.table_mut("df").unwrap().toggle_sort(0));
    m.update("df", json!({"rows": [{"n": 3}, {"n": 1}, {"n": 2}]}).as_object().unwrap());

    let view = m.handle("df").unwrap().table.as_ref().unwrap();
    let values: Vec<&Value> = view.visible_rows().iter().map(|r| &r["n"]).collect();
    assert_eq!(values, vec![&json!(1), &json!(2), &json!(3)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Artifacts
// ─────────────────────────────────────────────────────────────────────────────

fn artifact_manager(prevent: bool) -> (ComponentManager, Recorder, CountingOpener) {
    let recorder = Recorder {
        prevent,
        ..Default::default()
    };
    let opener = CountingOpener::default();
    let deps = ManagerDeps::new(Box::new(ui_state::shared()))
        .with_listener(Box::new(recorder.clone()))
        .with_opener(Box::new(opener.clone()));
    (
        ComponentManager::new(ComponentRegistry::with_builtin(), RenderContext::default(), deps),
        recorder,
        opener,
    )
}

#[test]
fn test_artifact_shows_preview_by_default() {
    let (mut m, recorder, opener) = artifact_manager(false);
    feed(&mut m, artifact_json("a1"));

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].artifact_id, "chart-1");
    assert!(!seen[0].user_initiated);
    assert!(text(&m, "a1").contains("sandboxed preview"));
    assert!(opener.0.lock().unwrap().is_empty());
}

#[test]
fn test_prevented_artifact_shows_placeholder() {
    let (mut m, recorder, _) = artifact_manager(true);
    feed(&mut m, artifact_json("a1"));

    assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    let handle = m.handle("a1").unwrap();
    assert_eq!(handle.artifact.as_ref().unwrap().mode, SurfaceMode::Placeholder);
    let rendered = handle.plain_text();
    assert!(!rendered.contains("sandboxed preview"));
    assert!(rendered.contains("Activate to open the artifact"));
}

#[test]
fn test_reopen_is_user_initiated_and_opens() {
    let (mut m, recorder, opener) = artifact_manager(false);
    feed(&mut m, artifact_json("a1"));

    let reopen = m
        .handle("a1")
        .unwrap()
        .controls
        .iter()
        .position(|c| c.action == ControlAction::ReopenArtifact)
        .unwrap();
    assert_eq!(
        m.activate_control("a1", reopen),
        Some(Activation::ReopenArtifact("a1".into()))
    );
    assert!(m.reopen_artifact("a1"));

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[1].user_initiated);
    assert_eq!(*opener.0.lock().unwrap(), vec!["chart-1".to_string()]);
}

#[test]
fn test_prevented_reopen_skips_opener() {
    let (mut m, recorder, opener) = artifact_manager(true);
    feed(&mut m, artifact_json("a1"));
    assert!(m.reopen_artifact("a1"));
    assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    assert!(opener.0.lock().unwrap().is_empty());
}

#[test]
fn test_artifact_update_does_not_refire() {
    let (mut m, recorder, _) = artifact_manager(true);
    feed(&mut m, artifact_json("a1"));
    m.update("a1", json!({"title": "Sales (updated)"}).as_object().unwrap());

    assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    assert_eq!(
        m.handle("a1").unwrap().artifact.as_ref().unwrap().mode,
        SurfaceMode::Placeholder
    );
}

#[test]
fn test_reopen_unknown_or_non_artifact() {
    let (mut m, _, _) = artifact_manager(false);
    feed(&mut m, json!({"id": "t", "type": "text", "data": {"content": "x"}}));
    assert!(!m.reopen_artifact("t"));
    assert!(!m.reopen_artifact("missing"));
}
