//! Viewer controller
//!
//! Owns one [`PdfPageView`] per page, the displayed page, rotation and
//! scale, and the set of pages whose content is kept around. Page switches
//! render the target page, then pre-render its neighbors off screen so the
//! next switch is a cache hit.

mod cache;
mod page_view;
mod state;

pub use cache::PageCache;
pub use page_view::{PdfPageView, RenderOptions};
pub use state::{Command, Effect, LoadPageParams, ViewerState};

use std::rc::Rc;

use flume::Sender;
use log::{debug, warn};

use crate::dom::{Element, Window};
use crate::engine::{EngineError, OptionalContentConfig, PdfDocument};
use crate::host::ScaleData;
use crate::layers::LayerError;
use crate::link::{LinkService, SimpleLinkService};
use crate::utils::{PDF_TO_CSS_UNITS, SCALE_FACTOR_PROPERTY};

/// Default number of pages kept rendered
pub const MAX_CACHE_SIZE: usize = 10;

/// Smallest cache that can hold the displayed page and both neighbors
pub const MIN_CACHE_SIZE: usize = 3;

/// Default cap on canvas backing store pixels
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 16_777_216;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("no document set")]
    NoDocument,

    #[error("invalid page number: {0}")]
    InvalidPageNumber(usize),

    #[error("invalid pages rotation angle: {0}")]
    InvalidRotation(i32),

    #[error("invalid scale: {0}")]
    InvalidScale(f64),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Notifications from the viewer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewerEvent {
    /// One page view exists per page of the new document
    PagesInit { page_count: usize },
}

pub struct ViewerOptions {
    /// Element the viewer creates its page container in
    pub container: Element,
    pub link_service: Rc<dyn LinkService>,
    pub events: Option<Sender<ViewerEvent>>,
    pub max_canvas_pixels: u64,
    pub max_cache_size: usize,
    pub window: Window,
    pub rotation: i32,
    pub scale: f64,
}

impl ViewerOptions {
    #[must_use]
    pub fn new(container: Element) -> Self {
        Self {
            container,
            link_service: Rc::new(SimpleLinkService),
            events: None,
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
            max_cache_size: MAX_CACHE_SIZE,
            window: Window::default(),
            rotation: 0,
            scale: 1.0,
        }
    }
}

pub struct PdfViewer<D: PdfDocument> {
    container: Element,
    viewer: Element,
    link_service: Rc<dyn LinkService>,
    events: Option<Sender<ViewerEvent>>,
    max_canvas_pixels: u64,
    window: Window,
    state: ViewerState,
    cache: PageCache,
    page_views: Vec<PdfPageView<D::Page>>,
    document: Option<D>,
    optional_content_config: Option<OptionalContentConfig>,
}

impl<D: PdfDocument> PdfViewer<D> {
    #[must_use]
    pub fn new(options: ViewerOptions) -> Self {
        let viewer = Element::with_class("div", "pdfViewer");
        options.container.append_child(&viewer);

        let mut pdf_viewer = Self {
            container: options.container,
            viewer,
            link_service: options.link_service,
            events: options.events,
            max_canvas_pixels: options.max_canvas_pixels,
            window: options.window,
            state: ViewerState::new(options.rotation, options.scale),
            cache: PageCache::new(options.max_cache_size.max(MIN_CACHE_SIZE)),
            page_views: Vec::new(),
            document: None,
            optional_content_config: None,
        };
        pdf_viewer.set_viewer_div_scale(options.scale);
        pdf_viewer
    }

    /// Takes ownership of the document and builds one page view per page.
    /// A second call is ignored.
    pub async fn set_document(&mut self, document: D) -> Result<(), ViewerError> {
        if self.document.is_some() {
            warn!("setDocument: pdf already set");
            return Ok(());
        }

        let optional_content_config = match document.optional_content_config().await {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Failed to get optional content config: {e}");
                None
            }
        };

        let num_pages = document.num_pages();
        let mut page_views = Vec::with_capacity(num_pages);
        for page_number in 1..=num_pages {
            page_views.push(PdfPageView::new(
                self.viewer.clone(),
                document.page(page_number).await?,
                Rc::clone(&self.link_service),
                self.max_canvas_pixels,
                self.window.device_pixel_ratio,
            ));
        }

        self.page_views = page_views;
        self.document = Some(document);
        self.optional_content_config = optional_content_config;
        self.state.page_count = num_pages;
        self.state.document_set = true;

        if let Some(events) = &self.events {
            if events
                .send(ViewerEvent::PagesInit {
                    page_count: num_pages,
                })
                .is_err()
            {
                debug!("No listener for pagesinit");
            }
        }
        Ok(())
    }

    pub async fn set_page_number(&mut self, page_number: usize) -> Result<(), ViewerError> {
        let effects = self.state.apply(Command::SetPageNumber(page_number))?;
        self.execute_effects(effects).await
    }

    pub async fn set_rotation(&mut self, rotation: i32) -> Result<(), ViewerError> {
        let effects = self.state.apply(Command::SetRotation(rotation))?;
        self.execute_effects(effects).await
    }

    pub async fn set_scale(&mut self, scale: f64) -> Result<(), ViewerError> {
        let effects = self.state.apply(Command::SetScale(scale))?;
        self.execute_effects(effects).await
    }

    pub fn on_scale_begin(&mut self) {
        if let Ok(effects) = self.state.apply(Command::ScaleBegin) {
            self.execute_immediate(effects);
        }
    }

    /// CSS-only zoom feedback while the gesture is in progress
    pub fn on_scale(&mut self, data: ScaleData) -> Result<(), ViewerError> {
        let effects = self.state.apply(Command::Scale(data))?;
        self.execute_immediate(effects);
        Ok(())
    }

    pub async fn on_scale_end(&mut self, data: ScaleData) -> Result<(), ViewerError> {
        let effects = self.state.apply(Command::ScaleEnd(data))?;
        self.execute_effects(effects).await
    }

    pub async fn next_page(&mut self) -> Result<(), ViewerError> {
        self.set_page_number(self.state.page_number + 1).await
    }

    pub async fn previous_page(&mut self) -> Result<(), ViewerError> {
        let page_number = self.state.page_number.saturating_sub(1);
        self.set_page_number(page_number).await
    }

    /// Shows `page_number`; used for link and outline navigation
    pub async fn scroll_page_into_view(&mut self, page_number: usize) -> Result<(), ViewerError> {
        debug!("scrollPageIntoView: pageNumber: {page_number}");
        self.set_page_number(page_number).await
    }

    /// Follows link `index` on page `page_number`, if that page is rendered
    pub fn follow_link(&self, page_number: usize, index: usize) -> bool {
        self.page_view(page_number)
            .is_some_and(|view| view.follow_link(index))
    }

    #[must_use]
    pub fn current_page_number(&self) -> usize {
        self.state.page_number
    }

    #[must_use]
    pub fn pages_count(&self) -> usize {
        self.page_views.len()
    }

    #[must_use]
    pub fn pages_rotation(&self) -> i32 {
        self.state.rotation
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    #[must_use]
    pub fn is_scaling(&self) -> bool {
        self.state.scaling
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Cached pages from oldest to youngest
    #[must_use]
    pub fn cached_pages(&self) -> Vec<usize> {
        self.cache.pages()
    }

    #[must_use]
    pub fn page_view(&self, page_number: usize) -> Option<&PdfPageView<D::Page>> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.page_views.get(idx))
    }

    #[must_use]
    pub fn document(&self) -> Option<&D> {
        self.document.as_ref()
    }

    #[must_use]
    pub fn optional_content_config(&self) -> Option<&OptionalContentConfig> {
        self.optional_content_config.as_ref()
    }

    /// Replaces the optional content config; ignored until a document is set
    pub fn set_optional_content_config(&mut self, config: OptionalContentConfig) {
        if self.document.is_none() {
            return;
        }
        self.optional_content_config = Some(config);
    }

    /// The element holding attached page boxes
    #[must_use]
    pub fn viewer_element(&self) -> &Element {
        &self.viewer
    }

    #[must_use]
    pub fn container(&self) -> &Element {
        &self.container
    }

    #[must_use]
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    async fn execute_effects(&mut self, effects: Vec<Effect>) -> Result<(), ViewerError> {
        for effect in effects {
            match effect {
                Effect::LoadPage(params) => self.load_page(params).await?,
                other => self.execute_effect(other),
            }
        }
        Ok(())
    }

    fn execute_immediate(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    /// Runs an effect that completes without suspending
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::UpdateCssScale(scale) => self.set_viewer_div_scale(scale),
            Effect::UnloadPage(page_number) => self.unload_page(page_number),
            Effect::PrepareForScale(page_number) => {
                if let Some(view) = self.page_view_mut(page_number) {
                    view.prepare_for_scale();
                }
            }
            Effect::ScrollToFocus {
                focus_x,
                focus_y,
                factor,
            } => {
                let focus_x = self.window.scroll_x + focus_x;
                let focus_y = self.window.scroll_y + focus_y;
                self.window.scroll_by(focus_x * factor, focus_y * factor);
            }
            Effect::LoadPage(params) => {
                warn!("Ignoring page load outside of a render pass: {params:?}");
            }
        }
    }

    async fn load_page(&mut self, params: LoadPageParams) -> Result<(), ViewerError> {
        self.render_page(params).await?;
        if params.pre_render {
            return Ok(());
        }

        let page_number = params.page_number;
        let previous = self.state.page_number;
        self.state.page_number = page_number;

        for neighbor in self.state.pre_render_order(page_number, previous) {
            if let Err(e) = self.render_page(LoadPageParams::pre_render(neighbor)).await {
                warn!("Failed to pre-render page {neighbor}: {e}");
            }
        }
        Ok(())
    }

    /// Renders one page and records it in the cache
    async fn render_page(&mut self, params: LoadPageParams) -> Result<(), ViewerError> {
        let page_number = params.page_number;
        self.state.check_page(page_number)?;

        if params.invalidate_cache {
            // Resetting the displayed page would drop its box and lose the
            // scroll position, so keep it out of the reset sweep.
            if !params.pre_render {
                self.cache.remove(page_number);
            }
            for cached in self.cache.pages() {
                if let Some(view) = self.page_view_mut(cached) {
                    view.reset();
                }
            }
            self.cache.clear();
            self.cache.insert(page_number);
        }

        self.prune_cache();

        let options = RenderOptions {
            rotation: self.state.rotation,
            scale: self.state.scale,
            use_cached: params.use_cached,
            attach_to_container: !params.pre_render,
        };
        if let Some(view) = self.page_view_mut(page_number) {
            if let Err(e) = view.render(options).await {
                // A half-built page must not pass for a cache hit later.
                view.reset();
                self.cache.remove(page_number);
                if !params.pre_render {
                    self.state.page_number = 0;
                }
                return Err(e.into());
            }
        }

        self.cache.insert(page_number);
        self.prune_cache();
        Ok(())
    }

    fn unload_page(&mut self, page_number: usize) {
        self.prune_cache();
        if let Some(view) = self.page_view_mut(page_number) {
            view.detach_from_container();
        }
    }

    /// Evicts oldest pages until the cache fits its capacity
    fn prune_cache(&mut self) {
        while self.cache.is_over_capacity() {
            let Some(page_number) = self.cache.pop_oldest() else {
                break;
            };
            debug!("Evicting page {page_number}");
            if let Some(view) = self.page_view_mut(page_number) {
                view.reset();
            }
        }
    }

    fn page_view_mut(&mut self, page_number: usize) -> Option<&mut PdfPageView<D::Page>> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.page_views.get_mut(idx))
    }

    fn set_viewer_div_scale(&mut self, scale: f64) {
        let css_scale = scale * PDF_TO_CSS_UNITS;
        self.viewer
            .set_style(SCALE_FACTOR_PROPERTY, &css_scale.to_string());
    }
}
