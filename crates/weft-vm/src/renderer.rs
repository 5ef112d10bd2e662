//! The renderer capability contract.
//!
//! The VM calls into this trait for UI opcodes but never implements it;
//! concrete renderer backends (software, terminal, DOM) live outside this
//! crate. UI mutation is best effort: with no renderer attached, or for a
//! component the renderer does not resolve, mutations are no-ops and reads
//! yield Null, so a stale component reference never aborts an event handler.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use weft_module::PropertyId;

use crate::value::Value;

/// Handle to a live UI component, valid for the renderer that issued it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ComponentRef(u32);

impl ComponentRef {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

/// Capability surface the VM drives for UI-affecting instructions.
pub trait Renderer {
    /// Resolve a component id, or None if the renderer does not know it.
    fn get_component(&mut self, id: u32) -> Option<ComponentRef>;

    fn set_property(&mut self, component: ComponentRef, property: PropertyId, value: &Value);

    fn get_property(&mut self, component: ComponentRef, property: PropertyId) -> Value;

    fn set_text(&mut self, component: ComponentRef, text: &str);

    fn set_visible(&mut self, component: ComponentRef, visible: bool);

    fn add_child(&mut self, parent: ComponentRef, child: ComponentRef);

    fn remove_child(&mut self, parent: ComponentRef, child: ComponentRef);

    fn redraw(&mut self);
}

/// Renderer that resolves nothing; every UI opcode becomes a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn get_component(&mut self, _id: u32) -> Option<ComponentRef> {
        None
    }

    fn set_property(&mut self, _component: ComponentRef, _property: PropertyId, _value: &Value) {}

    fn get_property(&mut self, _component: ComponentRef, _property: PropertyId) -> Value {
        Value::Null
    }

    fn set_text(&mut self, _component: ComponentRef, _text: &str) {}

    fn set_visible(&mut self, _component: ComponentRef, _visible: bool) {}

    fn add_child(&mut self, _parent: ComponentRef, _child: ComponentRef) {}

    fn remove_child(&mut self, _parent: ComponentRef, _child: ComponentRef) {}

    fn redraw(&mut self) {}
}

/// One recorded renderer call.
#[derive(Clone, Debug, PartialEq)]
pub enum UiCall {
    GetComponent(u32),
    SetProperty {
        component: u32,
        property: PropertyId,
        value: Value,
    },
    GetProperty {
        component: u32,
        property: PropertyId,
    },
    SetText {
        component: u32,
        text: String,
    },
    SetVisible {
        component: u32,
        visible: bool,
    },
    AddChild {
        parent: u32,
        child: u32,
    },
    RemoveChild {
        parent: u32,
        child: u32,
    },
    Redraw,
}

/// Test double that records every call and stores property writes so that
/// GET_PROP reads them back.
///
/// The call log is behind a shared handle: clone it via [`calls`] before
/// moving the renderer into the VM.
///
/// [`calls`]: RecordingRenderer::calls
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    calls: Rc<RefCell<Vec<UiCall>>>,
    /// Component ids this renderer resolves; None resolves everything.
    known: Option<Vec<u32>>,
    properties: Rc<RefCell<HashMap<(u32, PropertyId), Value>>>,
}

impl RecordingRenderer {
    /// A recorder that resolves every component id.
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that resolves only the given component ids.
    pub fn with_components(ids: &[u32]) -> Self {
        Self {
            known: Some(ids.to_vec()),
            ..Self::default()
        }
    }

    /// Shared handle to the call log.
    pub fn calls(&self) -> Rc<RefCell<Vec<UiCall>>> {
        Rc::clone(&self.calls)
    }

    fn record(&self, call: UiCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl Renderer for RecordingRenderer {
    fn get_component(&mut self, id: u32) -> Option<ComponentRef> {
        self.record(UiCall::GetComponent(id));
        match &self.known {
            Some(ids) if !ids.contains(&id) => None,
            _ => Some(ComponentRef::new(id)),
        }
    }

    fn set_property(&mut self, component: ComponentRef, property: PropertyId, value: &Value) {
        self.record(UiCall::SetProperty {
            component: component.id(),
            property,
            value: value.clone(),
        });
        self.properties
            .borrow_mut()
            .insert((component.id(), property), value.clone());
    }

    fn get_property(&mut self, component: ComponentRef, property: PropertyId) -> Value {
        self.record(UiCall::GetProperty {
            component: component.id(),
            property,
        });
        self.properties
            .borrow()
            .get(&(component.id(), property))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn set_text(&mut self, component: ComponentRef, text: &str) {
        self.record(UiCall::SetText {
            component: component.id(),
            text: text.to_owned(),
        });
    }

    fn set_visible(&mut self, component: ComponentRef, visible: bool) {
        self.record(UiCall::SetVisible {
            component: component.id(),
            visible,
        });
    }

    fn add_child(&mut self, parent: ComponentRef, child: ComponentRef) {
        self.record(UiCall::AddChild {
            parent: parent.id(),
            child: child.id(),
        });
    }

    fn remove_child(&mut self, parent: ComponentRef, child: ComponentRef) {
        self.record(UiCall::RemoveChild {
            parent: parent.id(),
            child: child.id(),
        });
    }

    fn redraw(&mut self) {
        self.record(UiCall::Redraw);
    }
}
