//! Host page boundary.
//!
//! The frame never owns the compose element: the host page creates and
//! destroys it. Everything the frame reads from or writes to the page goes
//! through [`HostPage`], including the provider-specific recipient fields and
//! the overlay, which lives inside an isolated rendering boundary next to the
//! compose element.

use enveil_core::Recipient;

/// Kind of compose element the frame is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// A `<textarea>`: body is its value.
    TextArea,
    /// A content-editable element or the body of an editor iframe.
    RichText,
}

/// How the body of a rich-text element is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyFormat {
    /// Rendered text, as a selection of all children would yield.
    #[default]
    Text,
    /// Inner HTML with newlines removed.
    Html,
}

/// Status attribute written on the compose element.
///
/// External code reads it to decide whether an overlay already exists before
/// creating another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    /// Seen by the scanner, no frame yet.
    Unattached,
    /// A frame is attached and its overlay is shown.
    Attached,
    /// A frame was closed non-finally; its overlay is hidden.
    Detached,
}

impl StatusMarker {
    /// Attribute value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unattached => "unattached",
            Self::Attached => "attached",
            Self::Detached => "detached",
        }
    }

    /// Parse an attribute value. Empty or unknown values are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unattached" => Some(Self::Unattached),
            "attached" => Some(Self::Attached),
            "detached" => Some(Self::Detached),
            _ => None,
        }
    }
}

/// Overlay placement relative to the compose element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPosition {
    /// Pixels from the top of the offset parent.
    pub top: i32,
    /// Pixels from the right edge.
    pub right: i32,
}

impl OverlayPosition {
    /// Vertical offset below the compose element's top edge.
    pub const TOP_OFFSET: i32 = 5;
    /// Distance from the right edge.
    pub const RIGHT: i32 = 20;

    /// Position for a compose element whose top edge is at `offset_top`.
    pub fn below(offset_top: i32) -> Self {
        Self { top: offset_top.saturating_add(Self::TOP_OFFSET), right: Self::RIGHT }
    }
}

/// Synchronous access to one compose element and its surroundings.
///
/// Implemented over the real DOM in the browser and by the simulated page in
/// the harness.
pub trait HostPage {
    /// Stable key of the compose element, hashed into the frame id.
    fn element_key(&self) -> String;

    /// Kind of the element holding the message body.
    fn element_kind(&self) -> ElementKind;

    /// Current status attribute, `None` when empty.
    fn status_marker(&self) -> Option<StatusMarker>;

    /// Write the status attribute; `None` clears it.
    fn set_status_marker(&mut self, marker: Option<StatusMarker>);

    /// Textarea value.
    fn value(&self) -> String;

    /// Rendered text of a rich element.
    fn text(&self) -> String;

    /// Inner HTML of a rich element.
    fn html(&self) -> String;

    /// Replace a textarea value.
    fn set_value(&mut self, value: &str);

    /// Remove every child node of a rich element.
    fn clear_children(&mut self);

    /// Parse `html` and append it to a rich element.
    fn append_html(&mut self, html: &str);

    /// Dispatch a bubbling, cancelable `input` event on the body element.
    fn dispatch_input_event(&mut self);

    /// `offsetTop` of the compose element.
    fn offset_top(&self) -> i32;

    /// Create the overlay inside an isolated rendering boundary placed right
    /// after the compose element.
    fn mount_overlay(&mut self, overlay_id: &str);

    /// Move the overlay.
    fn position_overlay(&mut self, position: OverlayPosition);

    /// Show or hide the overlay.
    fn set_overlay_visible(&mut self, visible: bool);

    /// Toggle the overlay's active styling.
    fn set_overlay_active(&mut self, active: bool);

    /// Remove the overlay and its boundary from the page.
    fn remove_overlay(&mut self);

    /// Recipients entered in the provider's compose fields.
    fn recipients(&self) -> Vec<Recipient>;

    /// Fill the provider's recipient fields.
    fn set_recipients(&mut self, to: &[Recipient], cc: &[Recipient]);

    /// Account the page is signed in as, if the provider exposes it.
    fn account(&self) -> Option<String>;

    /// Whether the provider supports sending through its mail API.
    fn supports_integration(&self) -> bool;
}

/// Whether `host` already carries a live overlay.
pub fn has_overlay(host: &impl HostPage) -> bool {
    matches!(host.status_marker(), Some(StatusMarker::Attached | StatusMarker::Detached))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_values_round_trip() {
        for marker in [StatusMarker::Unattached, StatusMarker::Attached, StatusMarker::Detached] {
            assert_eq!(StatusMarker::parse(marker.as_str()), Some(marker));
        }
        assert_eq!(StatusMarker::parse(""), None);
        assert_eq!(StatusMarker::parse("ATTACHED"), None);
    }

    #[test]
    fn overlay_sits_below_element_top() {
        assert_eq!(OverlayPosition::below(100), OverlayPosition { top: 105, right: 20 });
        assert_eq!(OverlayPosition::below(i32::MAX).top, i32::MAX);
    }
}
