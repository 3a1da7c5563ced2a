//! Button and button group renderers
//!
//! Controls carry the round-trip state (`disabled`, `chosen`, `dispatching`)
//! that the manager mutates on activation. An update that keeps a control's
//! action must not resurrect a consumed button, so updates carry that state
//! over instead of re-rendering from scratch.

use super::{ComponentView, Control, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::{ButtonData, ComponentBody};
use crate::protocol::DataMap;

fn button_control(button: &ButtonData) -> Control {
    let mut control = Control::submit(&button.label, &button.action);
    if !button.variant.is_empty() {
        control.variant = button.variant.clone();
    }
    control.icon = button.icon.clone();
    control.originally_disabled = button.disabled;
    control.disabled = button.disabled;
    control
}

/// Copy round-trip state onto re-rendered controls that kept their action
pub fn carry_control_state(previous: &[Control], next: &mut [Control]) {
    for control in next.iter_mut() {
        let Some(old) = previous
            .iter()
            .find(|old| old.action == control.action && old.label == control.label)
        else {
            continue;
        };
        control.chosen = old.chosen;
        control.dispatching = old.dispatching;
        if old.disabled && !old.originally_disabled {
            control.disabled = true;
        }
    }
}

pub struct ButtonRenderer;

impl Renderer for ButtonRenderer {
    fn name(&self) -> &'static str {
        "button"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Button(button) = view.body else {
            return RenderHandle::new(view, self.name());
        };
        RenderHandle::new(view, self.name()).with_controls(vec![button_control(button)])
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let mut next = self.render(view, ctx);
        carry_control_state(&handle.controls, &mut next.controls);
        *handle = next;
    }
}

pub struct ButtonGroupRenderer;

impl Renderer for ButtonGroupRenderer {
    fn name(&self) -> &'static str {
        "button_group"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::ButtonGroup(group) = view.body else {
            return RenderHandle::new(view, self.name());
        };
        let mut handle = RenderHandle::new(view, self.name())
            .with_controls(group.buttons.iter().map(button_control).collect());
        handle.controls_vertical = group.orientation == "vertical";
        handle
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let mut next = self.render(view, ctx);
        carry_control_state(&handle.controls, &mut next.controls);
        *handle = next;
    }
}
