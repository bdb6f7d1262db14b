//! One page's box and its layers

use std::rc::Rc;

use crate::dom::Element;
use crate::engine::PdfPage;
use crate::layers::{
    AnnotationLayer, CanvasLayer, Layer, LayerError, PageLayer, TextLayer,
};
use crate::link::LinkService;
use crate::utils::{PDF_TO_CSS_UNITS, set_elem_size_from_page};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub rotation: i32,
    pub scale: f64,
    /// Leave an already rendered page untouched
    pub use_cached: bool,
    pub attach_to_container: bool,
}

#[derive(Default)]
struct PageViewState {
    div: Option<Element>,
    layers: Vec<PageLayer>,
    attached: bool,
}

/// Owns the element tree of one page and renders it on demand
///
/// The page box is created on the first render and afterwards only its
/// layers are refreshed. Attaching and detaching move it in and out of the
/// shared container without touching its content; [`PdfPageView::reset`]
/// discards it.
pub struct PdfPageView<P: PdfPage> {
    container: Element,
    page: P,
    link_service: Rc<dyn LinkService>,
    max_canvas_pixels: u64,
    device_pixel_ratio: f64,
    state: PageViewState,
}

impl<P: PdfPage> PdfPageView<P> {
    pub fn new(
        container: Element,
        page: P,
        link_service: Rc<dyn LinkService>,
        max_canvas_pixels: u64,
        device_pixel_ratio: f64,
    ) -> Self {
        Self {
            container,
            page,
            link_service,
            max_canvas_pixels,
            device_pixel_ratio,
            state: PageViewState::default(),
        }
    }

    #[must_use]
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Page box, absent until first rendered
    #[must_use]
    pub fn element(&self) -> Option<&Element> {
        self.state.div.as_ref()
    }

    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.state.div.is_some()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state.attached
    }

    /// Layers in render order: canvas, text, annotation
    #[must_use]
    pub fn layers(&self) -> &[PageLayer] {
        &self.state.layers
    }

    pub async fn render(&mut self, options: RenderOptions) -> Result<(), LayerError> {
        let div = match self.state.div.clone() {
            Some(div) => {
                if !options.use_cached {
                    self.render_layers(options.rotation, options.scale).await?;
                }
                div
            }
            None => {
                let div = Element::with_class("div", "page");
                div.set_attribute("data-page-number", &self.page.page_number().to_string());
                self.state.div = Some(div.clone());

                self.state.layers = vec![
                    PageLayer::Canvas(CanvasLayer::new(
                        &div,
                        self.max_canvas_pixels,
                        self.device_pixel_ratio,
                    )),
                    PageLayer::Text(TextLayer::new(&div)),
                    PageLayer::Annotation(AnnotationLayer::new(
                        &div,
                        Rc::clone(&self.link_service),
                    )),
                ];

                self.render_layers(options.rotation, options.scale).await?;
                div
            }
        };

        if options.attach_to_container && !self.state.attached {
            self.container.append_child(&div);
            self.state.attached = true;
        }
        Ok(())
    }

    /// Cancels layer work and returns to the never-rendered state
    pub fn reset(&mut self) {
        self.cancel_layer_render();
        if let Some(div) = &self.state.div {
            if self.state.attached {
                self.container.remove_child(div);
            }
        }
        self.state = PageViewState::default();
    }

    /// Takes the page out of the container, keeping its content
    pub fn detach_from_container(&mut self) {
        if let Some(div) = &self.state.div {
            if self.state.attached {
                self.container.remove_child(div);
                self.state.attached = false;
            }
        }
    }

    pub fn prepare_for_scale(&mut self) {
        for layer in &mut self.state.layers {
            if let Some(layer) = layer.as_scale_aware() {
                layer.prepare_for_scale();
            }
        }
    }

    /// Follows the `index`th annotation if it is a link
    pub fn follow_link(&self, index: usize) -> bool {
        self.state.layers.iter().any(|layer| match layer {
            PageLayer::Annotation(annotations) => annotations.follow_link(index),
            _ => false,
        })
    }

    async fn render_layers(&mut self, rotation: i32, scale: f64) -> Result<(), LayerError> {
        let viewport = self.page.viewport(scale * PDF_TO_CSS_UNITS, rotation);
        for layer in &mut self.state.layers {
            layer.render(&self.page, &viewport).await?;
        }
        if let Some(div) = &self.state.div {
            set_elem_size_from_page(div, &self.page, rotation);
        }
        Ok(())
    }

    fn cancel_layer_render(&mut self) {
        for layer in &mut self.state.layers {
            layer.cancel_render();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimpleLinkService;
    use crate::test_utils::{FakePage, RenderLog, block_on};

    fn page_view(log: &RenderLog) -> (Element, PdfPageView<FakePage>) {
        let container = Element::with_class("div", "pdfViewer");
        let page = FakePage::letter(1, log.clone()).with_text(&["Hello"]);
        let view = PdfPageView::new(
            container.clone(),
            page,
            Rc::new(SimpleLinkService),
            u64::MAX,
            1.0,
        );
        (container, view)
    }

    fn options(rotation: i32, use_cached: bool, attach: bool) -> RenderOptions {
        RenderOptions {
            rotation,
            scale: 1.0,
            use_cached,
            attach_to_container: attach,
        }
    }

    #[test]
    fn first_render_builds_layers_and_attaches() {
        let log = RenderLog::default();
        let (container, mut view) = page_view(&log);
        block_on(view.render(options(0, true, true))).unwrap();

        let div = view.element().unwrap().clone();
        assert!(container.contains_child(&div));
        assert_eq!(view.layers().len(), 3);
        let classes: Vec<_> = div.children().iter().map(Element::class_name).collect();
        assert_eq!(classes, ["canvasLayer", "textLayer", "annotationLayer"]);
        assert_eq!(
            div.style("width").as_deref(),
            Some("calc(var(--scale-factor) * 612px)")
        );
        assert_eq!(log.rasterizations(1), 1);
    }

    #[test]
    fn layers_render_in_fixed_order() {
        let log = RenderLog::default();
        let (_, mut view) = page_view(&log);
        block_on(view.render(options(0, true, false))).unwrap();
        assert_eq!(log.order(1), ["rasterize", "text", "annotations"]);
    }

    #[test]
    fn cached_render_is_a_noop() {
        let log = RenderLog::default();
        let (_, mut view) = page_view(&log);
        block_on(view.render(options(0, true, true))).unwrap();
        block_on(view.render(options(90, true, true))).unwrap();
        assert_eq!(log.rasterizations(1), 1);
    }

    #[test]
    fn uncached_render_refreshes_in_place() {
        let log = RenderLog::default();
        let (_, mut view) = page_view(&log);
        block_on(view.render(options(0, true, true))).unwrap();
        let div = view.element().unwrap().clone();

        block_on(view.render(options(90, false, true))).unwrap();
        assert!(view.element().unwrap().ptr_eq(&div));
        assert_eq!(log.rasterizations(1), 2);
        assert_eq!(
            div.style("width").as_deref(),
            Some("calc(var(--scale-factor) * 792px)")
        );
    }

    #[test]
    fn pre_rendered_page_stays_detached() {
        let (container, mut view) = page_view(&RenderLog::default());
        block_on(view.render(options(0, true, false))).unwrap();
        assert!(view.is_rendered());
        assert!(!view.is_attached());
        assert_eq!(container.child_count(), 0);

        block_on(view.render(options(0, true, true))).unwrap();
        assert!(view.is_attached());
        assert_eq!(container.child_count(), 1);
    }

    #[test]
    fn detach_keeps_content_for_reattach() {
        let log = RenderLog::default();
        let (container, mut view) = page_view(&log);
        block_on(view.render(options(0, true, true))).unwrap();
        let div = view.element().unwrap().clone();

        view.detach_from_container();
        assert_eq!(container.child_count(), 0);
        assert!(view.is_rendered());

        block_on(view.render(options(0, true, true))).unwrap();
        assert!(container.contains_child(&div));
        assert_eq!(log.rasterizations(1), 1);
    }

    #[test]
    fn reset_returns_to_pristine_state() {
        let log = RenderLog::default();
        let (container, mut view) = page_view(&log);
        block_on(view.render(options(0, true, true))).unwrap();
        let div = view.element().unwrap().clone();

        view.reset();
        assert!(!view.is_rendered());
        assert!(!view.is_attached());
        assert!(view.layers().is_empty());
        assert_eq!(container.child_count(), 0);

        block_on(view.render(options(0, true, true))).unwrap();
        assert!(!view.element().unwrap().ptr_eq(&div));
        assert_eq!(log.rasterizations(1), 2);
    }

    #[test]
    fn prepare_for_scale_hides_text() {
        let (_, mut view) = page_view(&RenderLog::default());
        block_on(view.render(options(0, true, true))).unwrap();
        let text = view.element().unwrap().child_by_class("textLayer").unwrap();
        assert!(!text.is_hidden());

        view.prepare_for_scale();
        assert!(text.is_hidden());
    }
}
