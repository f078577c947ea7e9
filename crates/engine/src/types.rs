//! Shared identifier and value types for the engine boundary.

use std::collections::HashMap;

/// Property bag for element styles and attributes.
///
/// The UI layer hands styles and attributes over as plain string pairs;
/// interpretation (CSS semantics, attribute meaning) is entirely the native
/// engine's concern.
pub type PropMap = HashMap<String, String>;

/// Process-unique identity of a logical document.
///
/// Keys are assigned from a monotonically increasing counter at session
/// creation and never reused, so a stale key can never alias a live document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(pub u64);

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a host-supplied presentable surface.
///
/// The host owns the actual surface object (texture, window, swapchain); the
/// pipeline only threads this identity through to the native engine's
/// render-context attach/detach calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// Kind of hit-test the host forwarded from its input pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTestKind {
    /// A confirmed click/tap. Click hits additionally resolve the element's
    /// screen-space block box and notify the UI event listener.
    Click,

    /// A raw touch probe (down/move); only resolves the element ref.
    Touch,
}

/// Edge selector for block-box geometry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxEdge {
    Left,
    Top,
    Width,
    Height,
}

impl BoxEdge {
    /// All four edges in query order (left, top, width, height).
    pub const ALL: [BoxEdge; 4] = [BoxEdge::Left, BoxEdge::Top, BoxEdge::Width, BoxEdge::Height];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key_display() {
        assert_eq!(DocumentKey(42).to_string(), "42");
    }

    #[test]
    fn test_box_edge_order() {
        assert_eq!(
            BoxEdge::ALL,
            [BoxEdge::Left, BoxEdge::Top, BoxEdge::Width, BoxEdge::Height]
        );
    }
}
