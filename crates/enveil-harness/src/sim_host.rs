//! Simulated host page.
//!
//! [`SimHost`] is a shared handle: the frame owns one clone, the test keeps
//! another and inspects the page through [`SimHost::page`] while the frame
//! runs.

use std::sync::{Arc, Mutex, MutexGuard};

use enveil_core::Recipient;
use enveil_frame::{ElementKind, HostPage, OverlayPosition, StatusMarker};

/// Observable state of the simulated page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    /// Compose element key.
    pub element_key: String,
    /// Compose element kind.
    pub kind: ElementKind,
    /// Status attribute.
    pub marker: Option<StatusMarker>,
    /// Textarea value.
    pub value: String,
    /// Rich body as HTML.
    pub html: String,
    /// Rich body as rendered text.
    pub text: String,
    /// Overlays currently mounted next to the element.
    pub overlays: usize,
    /// Id the last overlay was mounted with.
    pub overlay_id: Option<String>,
    /// Overlay shown.
    pub overlay_visible: bool,
    /// Overlay styled active.
    pub overlay_active: bool,
    /// Last overlay position.
    pub position: Option<OverlayPosition>,
    /// `offsetTop` of the element.
    pub offset_top: i32,
    /// `input` events dispatched on the body.
    pub input_events: usize,
    /// Provider To field.
    pub to: Vec<Recipient>,
    /// Provider Cc field.
    pub cc: Vec<Recipient>,
    /// Signed-in account.
    pub account: Option<String>,
    /// Mail API available.
    pub integration: bool,
}

impl PageState {
    fn new(element_key: &str, kind: ElementKind) -> Self {
        Self {
            element_key: element_key.to_owned(),
            kind,
            marker: None,
            value: String::new(),
            html: String::new(),
            text: String::new(),
            overlays: 0,
            overlay_id: None,
            overlay_visible: false,
            overlay_active: false,
            position: None,
            offset_top: 100,
            input_events: 0,
            to: Vec::new(),
            cc: Vec::new(),
            account: None,
            integration: false,
        }
    }
}

/// Shared handle to a simulated compose element.
#[derive(Debug, Clone)]
pub struct SimHost {
    page: Arc<Mutex<PageState>>,
}

impl SimHost {
    /// A textarea compose element.
    pub fn textarea(element_key: &str) -> Self {
        Self::with_state(PageState::new(element_key, ElementKind::TextArea))
    }

    /// A rich-text compose element.
    pub fn rich_text(element_key: &str) -> Self {
        Self::with_state(PageState::new(element_key, ElementKind::RichText))
    }

    fn with_state(state: PageState) -> Self {
        Self { page: Arc::new(Mutex::new(state)) }
    }

    /// Signed in as `account` with the mail API available.
    #[must_use]
    pub fn signed_in(self, account: &str) -> Self {
        {
            let mut page = self.lock();
            page.account = Some(account.to_owned());
            page.integration = true;
        }
        self
    }

    /// Type `body` into the element.
    pub fn type_body(&self, body: &str) {
        let mut page = self.lock();
        match page.kind {
            ElementKind::TextArea => page.value = body.to_owned(),
            ElementKind::RichText => {
                page.text = body.to_owned();
                page.html = body.replace('\n', "<br>\n");
            },
        }
    }

    /// Fill the provider's To field.
    pub fn enter_recipients(&self, to: &[&str]) {
        self.lock().to = to.iter().map(|email| Recipient::new(*email)).collect();
    }

    /// Move the element.
    pub fn move_to(&self, offset_top: i32) {
        self.lock().offset_top = offset_top;
    }

    /// Copy of the current page state.
    pub fn page(&self) -> PageState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        match self.page.lock() {
            Ok(page) => page,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl HostPage for SimHost {
    fn element_key(&self) -> String {
        self.lock().element_key.clone()
    }

    fn element_kind(&self) -> ElementKind {
        self.lock().kind
    }

    fn status_marker(&self) -> Option<StatusMarker> {
        self.lock().marker
    }

    fn set_status_marker(&mut self, marker: Option<StatusMarker>) {
        self.lock().marker = marker;
    }

    fn value(&self) -> String {
        self.lock().value.clone()
    }

    fn text(&self) -> String {
        self.lock().text.clone()
    }

    fn html(&self) -> String {
        self.lock().html.clone()
    }

    fn set_value(&mut self, value: &str) {
        self.lock().value = value.to_owned();
    }

    fn clear_children(&mut self) {
        let mut page = self.lock();
        page.html.clear();
        page.text.clear();
    }

    fn append_html(&mut self, html: &str) {
        self.lock().html.push_str(html);
    }

    fn dispatch_input_event(&mut self) {
        self.lock().input_events += 1;
    }

    fn offset_top(&self) -> i32 {
        self.lock().offset_top
    }

    fn mount_overlay(&mut self, overlay_id: &str) {
        let mut page = self.lock();
        page.overlays += 1;
        page.overlay_id = Some(overlay_id.to_owned());
    }

    fn position_overlay(&mut self, position: OverlayPosition) {
        self.lock().position = Some(position);
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        self.lock().overlay_visible = visible;
    }

    fn set_overlay_active(&mut self, active: bool) {
        self.lock().overlay_active = active;
    }

    fn remove_overlay(&mut self) {
        let mut page = self.lock();
        page.overlays = page.overlays.saturating_sub(1);
        page.overlay_visible = false;
        page.overlay_active = false;
    }

    fn recipients(&self) -> Vec<Recipient> {
        self.lock().to.clone()
    }

    fn set_recipients(&mut self, to: &[Recipient], cc: &[Recipient]) {
        let mut page = self.lock();
        page.to = to.to_vec();
        page.cc = cc.to_vec();
    }

    fn account(&self) -> Option<String> {
        self.lock().account.clone()
    }

    fn supports_integration(&self) -> bool {
        self.lock().integration
    }
}
