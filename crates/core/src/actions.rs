//! Mutation actions and their executor.
//!
//! Every host-initiated document operation travels through here as a
//! [`MutationAction`], executed on the shared mutation worker in the
//! order it was posted. The executor re-checks the destroy flag before
//! every native call: a destroyed session's remaining queue drains as
//! no-ops without ever touching a released handle.

use std::sync::Arc;

use docframe_engine::{BoxEdge, HitTestKind, PropMap};

use crate::session::{DocumentSession, NativeDocument};

/// One queued document operation.
pub(crate) enum MutationAction {
    CreateBody {
        element: String,
        styles: PropMap,
        attrs: PropMap,
        events: Vec<String>,
    },
    AddElement {
        element: String,
        kind: String,
        parent: String,
        index: usize,
        styles: PropMap,
        attrs: PropMap,
        events: Vec<String>,
    },
    MoveElement {
        element: String,
        parent: String,
        index: usize,
    },
    RemoveElement {
        element: String,
    },
    UpdateAttrs {
        element: String,
        attrs: PropMap,
    },
    UpdateStyles {
        element: String,
        styles: PropMap,
    },
    AddEvent {
        element: String,
        event: String,
    },
    RemoveEvent {
        element: String,
        event: String,
    },
    RefreshFont {
        family: String,
    },
    HitTest {
        kind: HitTestKind,
        x: i32,
        y: i32,
    },
}

impl MutationAction {
    fn name(&self) -> &'static str {
        match self {
            MutationAction::CreateBody { .. } => "create_body",
            MutationAction::AddElement { .. } => "add_element",
            MutationAction::MoveElement { .. } => "move_element",
            MutationAction::RemoveElement { .. } => "remove_element",
            MutationAction::UpdateAttrs { .. } => "update_attrs",
            MutationAction::UpdateStyles { .. } => "update_styles",
            MutationAction::AddEvent { .. } => "add_event",
            MutationAction::RemoveEvent { .. } => "remove_event",
            MutationAction::RefreshFont { .. } => "refresh_font",
            MutationAction::HitTest { .. } => "hit_test",
        }
    }
}

/// Run one action against its session. Called on the mutation worker.
pub(crate) fn execute(session: &Arc<DocumentSession>, action: MutationAction) {
    if session.is_destroyed() {
        tracing::trace!(document = %session.key(), action = action.name(), "dropped, destroyed");
        return;
    }
    tracing::trace!(document = %session.key(), action = action.name(), "execute");
    match action {
        MutationAction::CreateBody {
            element,
            styles,
            attrs,
            events,
        } => create_body(session, &element, &styles, &attrs, &events),
        MutationAction::AddElement {
            element,
            kind,
            parent,
            index,
            styles,
            attrs,
            events,
        } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session
                .engine()
                .add_element(doc, &element, &kind, &parent, index, &styles, &attrs, &events);
            session.request_frame();
        }
        MutationAction::MoveElement {
            element,
            parent,
            index,
        } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().move_element(doc, &element, &parent, index);
            session.request_frame();
        }
        MutationAction::RemoveElement { element } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().remove_element(doc, &element);
            session.request_frame();
        }
        MutationAction::UpdateAttrs { element, attrs } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().update_attrs(doc, &element, &attrs);
            session.request_frame();
        }
        MutationAction::UpdateStyles { element, styles } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().update_styles(doc, &element, &styles);
            session.request_frame();
        }
        MutationAction::AddEvent { element, event } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().add_event(doc, &element, &event);
        }
        MutationAction::RemoveEvent { element, event } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().remove_event(doc, &element, &event);
        }
        MutationAction::RefreshFont { family } => {
            let Some(doc) = session.native_handle() else {
                return;
            };
            session.engine().refresh_font(doc, &family);
            session.request_frame();
        }
        MutationAction::HitTest { kind, x, y } => hit_test(session, kind, x, y),
    }
}

/// Build (or rebuild) the document body.
///
/// A second body replaces the first: the old native document is released
/// and the live image results dropped before the new tree exists, so
/// nothing stale can be painted into the new document.
fn create_body(
    session: &Arc<DocumentSession>,
    element: &str,
    styles: &PropMap,
    attrs: &PropMap,
    events: &[String],
) {
    let old = session.take_native();
    if old.is_some() {
        session.clear_images();
    }
    drop(old);
    if session.is_destroyed() {
        return;
    }
    let native = NativeDocument::create(session.engine().clone(), session.key());
    let doc = native.handle();
    session.engine().create_body(doc, element, styles, attrs, events);
    session.install_native(native);
    session.request_frame();
}

fn hit_test(session: &Arc<DocumentSession>, kind: HitTestKind, x: i32, y: i32) {
    let Some(doc) = session.native_handle() else {
        return;
    };
    let Some(element) = session.engine().hit_test(doc, kind, x, y) else {
        tracing::trace!(document = %session.key(), x, y, "hit test missed");
        return;
    };
    if kind != HitTestKind::Click {
        return;
    }
    if session.is_destroyed() {
        return;
    }
    let mut edges = [0i32; 4];
    for (slot, edge) in edges.iter_mut().zip(BoxEdge::ALL) {
        *slot = session.engine().block_layout(doc, &element, edge);
    }
    session.dispatch_click(element, edges);
}
