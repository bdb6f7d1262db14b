//! Wires the host bridge, the engine and the viewer together
//!
//! Host callbacks and link clicks become [`ViewerRequest`]s on a `flume`
//! queue. [`Bootstrap::run`] drains the queue one batch at a time, drops
//! requests that a later request in the same batch supersedes, and
//! dispatches the rest in order. Every transition takes `&mut self`, so a
//! page load always settles before the next request starts.

use std::ops::ControlFlow;
use std::rc::Rc;

use flume::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::dom::{Element, Window};
use crate::engine::{LoadError, PdfDocument, PdfEngine};
use crate::host::{HostBridge, HostEvent, ScaleData};
use crate::link::{LinkRequest, QueueLinkService};
use crate::settings::ViewerSettings;
use crate::viewer::{PdfViewer, ViewerError, ViewerEvent, ViewerOptions};

const TEXT_LAYER_FOREGROUND_PROPERTY: &str = "--text-layer-foreground";
const TEXT_LAYER_OPACITY_PROPERTY: &str = "--text-layer-opacity";

/// Work queued for the bootstrap loop
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerRequest {
    Render(HostEvent),
    LoadDocument,
    GoToPage(usize),
    OpenUri(String),
    ToggleTextLayer,
    Shutdown,
}

impl From<LinkRequest> for ViewerRequest {
    fn from(request: LinkRequest) -> Self {
        match request {
            LinkRequest::GoToPage(page) => Self::GoToPage(page),
            LinkRequest::OpenUri(uri) => Self::OpenUri(uri),
        }
    }
}

impl ViewerRequest {
    /// Whether handling `self` makes an immediately preceding `other` moot
    fn supersedes(&self, other: &Self) -> bool {
        matches!(
            (other, self),
            (
                Self::Render(HostEvent::ResetToHostState),
                Self::Render(HostEvent::ResetToHostState)
            ) | (
                Self::Render(HostEvent::Scale),
                Self::Render(HostEvent::Scale)
            ) | (Self::GoToPage(_), Self::GoToPage(_))
        )
    }
}

/// Collapses runs of superseded requests, keeping the last of each run
pub fn coalesce(requests: impl IntoIterator<Item = ViewerRequest>) -> Vec<ViewerRequest> {
    let mut batch: Vec<ViewerRequest> = Vec::new();
    for request in requests {
        match batch.last_mut() {
            Some(last) if request.supersedes(last) => *last = request,
            _ => batch.push(request),
        }
    }
    batch
}

/// Tighter of two pixel caps, where 0 stands for no cap
fn canvas_pixel_cap(configured: u64, host: u64) -> u64 {
    match (configured, host) {
        (0, cap) | (cap, 0) => cap,
        (a, b) => a.min(b),
    }
}

pub struct Bootstrap<E: PdfEngine, H: HostBridge> {
    engine: E,
    host: H,
    document_url: String,
    root: Element,
    viewer: PdfViewer<E::Document>,
    requests_tx: Sender<ViewerRequest>,
    requests_rx: Receiver<ViewerRequest>,
    events_rx: Receiver<ViewerEvent>,
    text_layer_visible: bool,
}

impl<E: PdfEngine, H: HostBridge> Bootstrap<E, H> {
    /// Builds the page skeleton and the viewer, then tells the host the
    /// viewer is ready for requests
    pub fn new(engine: E, host: H, settings: &ViewerSettings, window: Window) -> Self {
        let root = Element::new("html");
        let body = Element::new("body");
        root.append_child(&body);
        let container = Element::with_class("div", "outerContainer");
        body.append_child(&container);

        let (requests_tx, requests_rx) = flume::unbounded();
        let (events_tx, events_rx) = flume::unbounded();

        let mut options = ViewerOptions::new(container);
        options.link_service = Rc::new(QueueLinkService::new(requests_tx.clone()));
        options.events = Some(events_tx);
        options.max_canvas_pixels =
            canvas_pixel_cap(settings.max_canvas_pixels, host.max_canvas_pixels());
        options.max_cache_size = settings.cache_size();
        options.window = window;
        options.rotation = host.rotation();
        options.scale = host.scale();
        let viewer = PdfViewer::new(options);

        host.on_viewer_initialized();

        Self {
            engine,
            host,
            document_url: settings.document_url.clone(),
            root,
            viewer,
            requests_tx,
            requests_rx,
            events_rx,
            text_layer_visible: false,
        }
    }

    /// Queue handle for host callbacks
    #[must_use]
    pub fn sender(&self) -> Sender<ViewerRequest> {
        self.requests_tx.clone()
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[must_use]
    pub fn viewer(&self) -> &PdfViewer<E::Document> {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut PdfViewer<E::Document> {
        &mut self.viewer
    }

    /// Document element; carries the text layer debug properties
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    #[must_use]
    pub fn is_text_layer_visible(&self) -> bool {
        self.text_layer_visible
    }

    /// Host gesture and state-sync entry point
    pub async fn on_render_page(&mut self, event: HostEvent) -> Result<(), ViewerError> {
        debug!("scale mode is {event:?}");
        match event {
            HostEvent::ResetToHostState => {
                self.viewer.set_page_number(self.host.page()).await?;
                self.viewer.set_rotation(self.host.rotation()).await
            }
            HostEvent::ScaleBegin => {
                self.viewer.on_scale_begin();
                Ok(())
            }
            HostEvent::Scale => self.viewer.on_scale(self.scale_data()),
            HostEvent::ScaleEnd => self.viewer.on_scale_end(self.scale_data()).await,
        }
    }

    /// Like [`Self::on_render_page`] for the host's raw event code
    pub async fn on_render_page_code(&mut self, code: i32) -> Result<(), ViewerError> {
        match HostEvent::try_from(code) {
            Ok(event) => self.on_render_page(event).await,
            Err(code) => {
                warn!("Ignoring unknown render event {code}");
                Ok(())
            }
        }
    }

    /// Reads the gesture from the host, keeping the scale inside the host's
    /// zoom range and telling the host when it had to be pulled back
    fn scale_data(&self) -> ScaleData {
        let requested = self.host.scale();
        let (min, max) = (self.host.min_scale(), self.host.max_scale());
        let scale = if min <= max {
            requested.clamp(min, max)
        } else {
            requested
        };
        if scale != requested && scale.is_finite() {
            debug!("Clamping scale {requested} to {scale}");
            self.host.set_scale(scale);
        }

        let ratio = self.viewer.window().device_pixel_ratio;
        ScaleData {
            scale,
            focus_x: self.host.scale_focus_x() / ratio,
            focus_y: self.host.scale_focus_y() / ratio,
        }
    }

    /// Opens the document with the host's password and shows the host's
    /// page. Password problems are reported to the host and engine
    /// failures are logged; neither is returned as an error.
    pub async fn load_document(&mut self) -> Result<(), ViewerError> {
        let password = self.host.password();
        let password = (!password.is_empty()).then_some(password);

        let document = match self
            .engine
            .open(&self.document_url, password.as_deref())
            .await
        {
            Ok(document) => document,
            Err(LoadError::PasswordRequired) => {
                self.host.show_password_prompt();
                return Ok(());
            }
            Err(LoadError::IncorrectPassword) => {
                self.host.invalid_password();
                return Ok(());
            }
            Err(LoadError::Engine(e)) => {
                error!("Failed to load {}: {e}", self.document_url);
                return Ok(());
            }
        };

        self.host.on_loaded();
        self.host.set_num_pages(document.num_pages());
        match document.metadata().await {
            Ok(info) => match serde_json::to_string(&info) {
                Ok(properties) => self.host.set_document_properties(&properties),
                Err(e) => error!("Failed to serialize document properties: {e}"),
            },
            Err(e) => error!("getMetadata error: {e}"),
        }

        self.viewer.set_document(document).await?;
        self.drain_viewer_events();
        self.viewer.set_page_number(self.host.page()).await
    }

    /// Shows `page_number` and reports it back to the host
    pub async fn go_to_page(&mut self, page_number: usize) -> Result<(), ViewerError> {
        self.viewer.scroll_page_into_view(page_number).await?;
        self.host.set_page_number(page_number);
        Ok(())
    }

    /// Debug aid that paints the text layer so its alignment can be checked
    pub fn toggle_text_layer_visibility(&mut self) {
        let (foreground, opacity) = if self.text_layer_visible {
            ("transparent", 0.25)
        } else {
            ("red", 1.0)
        };
        self.root
            .set_style(TEXT_LAYER_FOREGROUND_PROPERTY, foreground);
        self.root
            .set_style(TEXT_LAYER_OPACITY_PROPERTY, &opacity.to_string());
        self.text_layer_visible = !self.text_layer_visible;
    }

    /// Handles one request. Failures are logged and do not stop the loop.
    pub async fn handle(&mut self, request: ViewerRequest) -> ControlFlow<()> {
        let result = match &request {
            ViewerRequest::Render(event) => self.on_render_page(*event).await,
            ViewerRequest::LoadDocument => self.load_document().await,
            ViewerRequest::GoToPage(page_number) => self.go_to_page(*page_number).await,
            ViewerRequest::OpenUri(uri) => {
                info!("Leaving external link {uri} to the host");
                Ok(())
            }
            ViewerRequest::ToggleTextLayer => {
                self.toggle_text_layer_visibility();
                Ok(())
            }
            ViewerRequest::Shutdown => return ControlFlow::Break(()),
        };
        if let Err(e) = result {
            error!("{request:?} failed: {e}");
        }
        ControlFlow::Continue(())
    }

    /// Handles everything already queued without waiting for more
    pub async fn process_pending(&mut self) -> ControlFlow<()> {
        let batch = coalesce(self.requests_rx.try_iter());
        self.dispatch(batch).await
    }

    /// Serves requests until a [`ViewerRequest::Shutdown`] is handled
    pub async fn run(&mut self) {
        info!("Viewer loop started");
        while let Ok(first) = self.requests_rx.recv_async().await {
            let pending: Vec<ViewerRequest> = self.requests_rx.try_iter().collect();
            let batch = coalesce(std::iter::once(first).chain(pending));
            if self.dispatch(batch).await.is_break() {
                break;
            }
        }
        info!("Viewer loop stopped");
    }

    async fn dispatch(&mut self, batch: Vec<ViewerRequest>) -> ControlFlow<()> {
        for request in batch {
            self.handle(request).await?;
        }
        ControlFlow::Continue(())
    }

    fn drain_viewer_events(&self) {
        for event in self.events_rx.try_iter() {
            match event {
                ViewerEvent::PagesInit { page_count } => {
                    info!("Pages initialized: {page_count}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_scale_updates_collapse() {
        let batch = coalesce([
            ViewerRequest::Render(HostEvent::ScaleBegin),
            ViewerRequest::Render(HostEvent::Scale),
            ViewerRequest::Render(HostEvent::Scale),
            ViewerRequest::Render(HostEvent::Scale),
            ViewerRequest::Render(HostEvent::ScaleEnd),
        ]);
        assert_eq!(
            batch,
            vec![
                ViewerRequest::Render(HostEvent::ScaleBegin),
                ViewerRequest::Render(HostEvent::Scale),
                ViewerRequest::Render(HostEvent::ScaleEnd),
            ]
        );
    }

    #[test]
    fn last_page_jump_wins() {
        let batch = coalesce([
            ViewerRequest::GoToPage(2),
            ViewerRequest::GoToPage(9),
            ViewerRequest::ToggleTextLayer,
            ViewerRequest::GoToPage(4),
        ]);
        assert_eq!(
            batch,
            vec![
                ViewerRequest::GoToPage(9),
                ViewerRequest::ToggleTextLayer,
                ViewerRequest::GoToPage(4),
            ]
        );
    }

    #[test]
    fn distinct_requests_are_kept() {
        let requests = vec![
            ViewerRequest::Render(HostEvent::ResetToHostState),
            ViewerRequest::LoadDocument,
            ViewerRequest::Render(HostEvent::ResetToHostState),
            ViewerRequest::Shutdown,
        ];
        assert_eq!(coalesce(requests.clone()), requests);
    }

    #[test]
    fn zero_pixel_cap_defers_to_the_other_source() {
        assert_eq!(canvas_pixel_cap(0, 4096), 4096);
        assert_eq!(canvas_pixel_cap(4096, 0), 4096);
        assert_eq!(canvas_pixel_cap(0, 0), 0);
        assert_eq!(canvas_pixel_cap(1000, 4096), 1000);
    }

    #[test]
    fn link_requests_map_to_viewer_requests() {
        assert_eq!(
            ViewerRequest::from(LinkRequest::GoToPage(3)),
            ViewerRequest::GoToPage(3)
        );
        assert_eq!(
            ViewerRequest::from(LinkRequest::OpenUri("https://a.b".into())),
            ViewerRequest::OpenUri("https://a.b".into())
        );
    }
}
