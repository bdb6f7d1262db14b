//! In-memory engine and host doubles for tests

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

use crate::dom::Bitmap;
use crate::engine::{
    Annotation, CancellationToken, DocumentInfo, EngineError, LoadError, OptionalContentConfig,
    PdfDocument, PdfEngine, PdfPage, TextContent, TextItem, TextStyle, Viewport,
};
use crate::host::HostBridge;

/// Runs a future to completion on a current-thread runtime
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build test runtime")
        .block_on(future)
}

/// Engine call recorded by [`FakePage`]
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    Rasterize {
        page: usize,
        scale: f64,
        rotation: i32,
        width: u32,
        height: u32,
    },
    TextContent {
        page: usize,
    },
    Annotations {
        page: usize,
    },
}

impl RenderCall {
    fn page(&self) -> usize {
        match self {
            Self::Rasterize { page, .. } | Self::TextContent { page } | Self::Annotations { page } => {
                *page
            }
        }
    }
}

/// Shared record of every engine call, in call order
#[derive(Clone, Debug, Default)]
pub struct RenderLog(Rc<RefCell<Vec<RenderCall>>>);

impl RenderLog {
    fn push(&self, call: RenderCall) {
        self.0.borrow_mut().push(call);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RenderCall> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    #[must_use]
    pub fn rasterizations(&self, page: usize) -> usize {
        self.count(page, |call| matches!(call, RenderCall::Rasterize { .. }))
    }

    #[must_use]
    pub fn text_requests(&self, page: usize) -> usize {
        self.count(page, |call| matches!(call, RenderCall::TextContent { .. }))
    }

    #[must_use]
    pub fn annotation_requests(&self, page: usize) -> usize {
        self.count(page, |call| matches!(call, RenderCall::Annotations { .. }))
    }

    /// Kinds of calls made for `page`, in order
    #[must_use]
    pub fn order(&self, page: usize) -> Vec<&'static str> {
        self.0
            .borrow()
            .iter()
            .filter(|call| call.page() == page)
            .map(|call| match call {
                RenderCall::Rasterize { .. } => "rasterize",
                RenderCall::TextContent { .. } => "text",
                RenderCall::Annotations { .. } => "annotations",
            })
            .collect()
    }

    /// Pages rasterized, in order
    #[must_use]
    pub fn rasterized_pages(&self) -> Vec<usize> {
        self.0
            .borrow()
            .iter()
            .filter(|call| matches!(call, RenderCall::Rasterize { .. }))
            .map(RenderCall::page)
            .collect()
    }

    fn count(&self, page: usize, pred: impl Fn(&RenderCall) -> bool) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|call| call.page() == page && pred(call))
            .count()
    }
}

#[derive(Clone, Debug)]
pub struct FakePage {
    number: usize,
    view_box: [f64; 4],
    annotations: Vec<Annotation>,
    text: TextContent,
    log: RenderLog,
    cancel_next: Rc<Cell<bool>>,
}

impl FakePage {
    #[must_use]
    pub fn new(number: usize, view_box: [f64; 4], log: RenderLog) -> Self {
        Self {
            number,
            view_box,
            annotations: Vec::new(),
            text: TextContent::default(),
            log,
            cancel_next: Rc::new(Cell::new(false)),
        }
    }

    /// US Letter page, 612 x 792 points
    #[must_use]
    pub fn letter(number: usize, log: RenderLog) -> Self {
        Self::new(number, [0.0, 0.0, 612.0, 792.0], log)
    }

    /// One 12pt line per string, starting one inch from the top left
    #[must_use]
    pub fn with_text(mut self, lines: &[&str]) -> Self {
        let font_name = "g_d0_f1".to_string();
        self.text.items = lines
            .iter()
            .enumerate()
            .map(|(idx, line)| TextItem {
                text: (*line).to_string(),
                transform: [12.0, 0.0, 0.0, 12.0, 72.0, 720.0 - 20.0 * idx as f64],
                width: 6.0 * line.len() as f64,
                height: 12.0,
                font_name: font_name.clone(),
            })
            .collect();
        self.text.styles = BTreeMap::from([(
            font_name,
            TextStyle {
                font_family: "sans-serif".to_string(),
                ascent: 0.75,
            },
        )]);
        self
    }

    #[must_use]
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Makes the next rasterization behave as if cancelled mid-way
    pub fn cancel_next_rasterization(&self) {
        self.cancel_next.set(true);
    }
}

impl PdfPage for FakePage {
    fn page_number(&self) -> usize {
        self.number
    }

    fn view_box(&self) -> [f64; 4] {
        self.view_box
    }

    async fn annotations(&self) -> Result<Vec<Annotation>, EngineError> {
        self.log.push(RenderCall::Annotations { page: self.number });
        Ok(self.annotations.clone())
    }

    async fn text_content(&self, cancel: &CancellationToken) -> Result<TextContent, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.log.push(RenderCall::TextContent { page: self.number });
        Ok(self.text.clone())
    }

    async fn rasterize(
        &self,
        bitmap: &mut Bitmap,
        viewport: &Viewport,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        if self.cancel_next.replace(false) {
            cancel.cancel();
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        self.log.push(RenderCall::Rasterize {
            page: self.number,
            scale: viewport.scale,
            rotation: viewport.rotation,
            width: bitmap.width(),
            height: bitmap.height(),
        });
        // Mark the top-left pixel so tests can tell a painted bitmap apart.
        if let Some(pixel) = bitmap.pixels_mut().get_mut(..4) {
            pixel.copy_from_slice(&[0, 0, 0, 0xFF]);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FakeDocument {
    pages: Vec<FakePage>,
    metadata: Option<DocumentInfo>,
    optional_content_config: OptionalContentConfig,
}

impl FakeDocument {
    /// Document of `page_count` letter pages logging into `log`
    #[must_use]
    pub fn new(page_count: usize, log: &RenderLog) -> Self {
        let pages = (1..=page_count)
            .map(|number| FakePage::letter(number, log.clone()).with_text(&["Lorem ipsum"]))
            .collect();
        let metadata = DocumentInfo::from([
            ("Title".to_string(), serde_json::Value::from("Fake document")),
            ("PDFFormatVersion".to_string(), serde_json::Value::from("1.7")),
        ]);
        Self {
            pages,
            metadata: Some(metadata),
            optional_content_config: OptionalContentConfig::default(),
        }
    }

    #[must_use]
    pub fn with_pages(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            metadata: Some(DocumentInfo::new()),
            optional_content_config: OptionalContentConfig::default(),
        }
    }

    /// Makes `metadata()` fail
    #[must_use]
    pub fn without_metadata(mut self) -> Self {
        self.metadata = None;
        self
    }

    #[must_use]
    pub fn with_optional_content_config(mut self, config: OptionalContentConfig) -> Self {
        self.optional_content_config = config;
        self
    }
}

impl PdfDocument for FakeDocument {
    type Page = FakePage;

    fn num_pages(&self) -> usize {
        self.pages.len()
    }

    async fn page(&self, page_number: usize) -> Result<FakePage, EngineError> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .cloned()
            .ok_or_else(|| EngineError::generic(format!("Invalid page request: {page_number}")))
    }

    async fn metadata(&self) -> Result<DocumentInfo, EngineError> {
        self.metadata
            .clone()
            .ok_or_else(|| EngineError::generic("metadata unavailable"))
    }

    async fn optional_content_config(&self) -> Result<OptionalContentConfig, EngineError> {
        Ok(self.optional_content_config.clone())
    }
}

/// Engine serving a single in-memory document
#[derive(Debug)]
pub struct FakeEngine {
    document: FakeDocument,
    password: Option<String>,
    failure: Option<String>,
    opened: RefCell<Vec<String>>,
}

impl FakeEngine {
    #[must_use]
    pub fn new(document: FakeDocument) -> Self {
        Self {
            document,
            password: None,
            failure: None,
            opened: RefCell::new(Vec::new()),
        }
    }

    /// Requires `password` to open the document
    #[must_use]
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Fails every load with `reason`
    #[must_use]
    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }

    /// URLs passed to `open`, in order
    #[must_use]
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl PdfEngine for FakeEngine {
    type Document = FakeDocument;

    async fn open(&self, url: &str, password: Option<&str>) -> Result<FakeDocument, LoadError> {
        self.opened.borrow_mut().push(url.to_string());
        if let Some(reason) = &self.failure {
            return Err(EngineError::generic(reason.clone()).into());
        }
        match (&self.password, password) {
            (None, _) => Ok(self.document.clone()),
            (Some(_), None) => Err(LoadError::PasswordRequired),
            (Some(expected), Some(given)) if expected == given => Ok(self.document.clone()),
            (Some(_), Some(_)) => Err(LoadError::IncorrectPassword),
        }
    }
}

/// Notification received by [`RecordingHost`]
#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    SetPageNumber(usize),
    SetScale(f64),
    SetNumPages(usize),
    SetDocumentProperties(String),
    ShowPasswordPrompt,
    InvalidPassword,
    OnLoaded,
    ViewerInitialized,
}

/// Values the host reports back to the viewer
#[derive(Clone, Debug, PartialEq)]
pub struct HostValues {
    pub page: usize,
    pub scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub focus_x: f64,
    pub focus_y: f64,
    pub rotation: i32,
    pub password: String,
    pub max_canvas_pixels: u64,
}

impl Default for HostValues {
    fn default() -> Self {
        Self {
            page: 1,
            scale: 1.0,
            min_scale: 0.5,
            max_scale: 4.0,
            focus_x: 0.0,
            focus_y: 0.0,
            rotation: 0,
            password: String::new(),
            max_canvas_pixels: 16_777_216,
        }
    }
}

/// Host double that records notifications and serves settable values
#[derive(Debug, Default)]
pub struct RecordingHost {
    values: RefCell<HostValues>,
    calls: RefCell<Vec<HostCall>>,
}

impl RecordingHost {
    #[must_use]
    pub fn new(values: HostValues) -> Self {
        Self {
            values: RefCell::new(values),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut HostValues)) {
        f(&mut self.values.borrow_mut());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: HostCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl HostBridge for RecordingHost {
    fn page(&self) -> usize {
        self.values.borrow().page
    }

    fn set_page_number(&self, page_number: usize) {
        self.values.borrow_mut().page = page_number;
        self.record(HostCall::SetPageNumber(page_number));
    }

    fn scale(&self) -> f64 {
        self.values.borrow().scale
    }

    fn set_scale(&self, scale: f64) {
        self.values.borrow_mut().scale = scale;
        self.record(HostCall::SetScale(scale));
    }

    fn min_scale(&self) -> f64 {
        self.values.borrow().min_scale
    }

    fn max_scale(&self) -> f64 {
        self.values.borrow().max_scale
    }

    fn scale_focus_x(&self) -> f64 {
        self.values.borrow().focus_x
    }

    fn scale_focus_y(&self) -> f64 {
        self.values.borrow().focus_y
    }

    fn rotation(&self) -> i32 {
        self.values.borrow().rotation
    }

    fn max_canvas_pixels(&self) -> u64 {
        self.values.borrow().max_canvas_pixels
    }

    fn set_num_pages(&self, num_pages: usize) {
        self.record(HostCall::SetNumPages(num_pages));
    }

    fn set_document_properties(&self, properties: &str) {
        self.record(HostCall::SetDocumentProperties(properties.to_string()));
    }

    fn show_password_prompt(&self) {
        self.record(HostCall::ShowPasswordPrompt);
    }

    fn invalid_password(&self) {
        self.record(HostCall::InvalidPassword);
    }

    fn password(&self) -> String {
        self.values.borrow().password.clone()
    }

    fn on_loaded(&self) {
        self.record(HostCall::OnLoaded);
    }

    fn on_viewer_initialized(&self) {
        self.record(HostCall::ViewerInitialized);
    }
}
