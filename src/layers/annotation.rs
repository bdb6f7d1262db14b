//! Interactive annotation overlay

use std::fmt;
use std::rc::Rc;

use super::{Layer, LayerError};
use crate::dom::Element;
use crate::engine::{Annotation, AnnotationKind, PdfPage, Viewport};
use crate::link::LinkService;

struct AnnotationWidget {
    section: Element,
    annotation: Annotation,
}

enum Content {
    NotLoaded,
    /// Page has no annotations; the layer stays hidden for good
    Empty,
    Built(Vec<AnnotationWidget>),
}

/// Link widgets placed over the page
///
/// Widgets are positioned once in page-relative percentages; later renders
/// only update the layer's own size and rotation.
pub struct AnnotationLayer {
    div: Element,
    link_service: Rc<dyn LinkService>,
    content: Content,
}

impl fmt::Debug for AnnotationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widgets = match &self.content {
            Content::Built(widgets) => widgets.len(),
            _ => 0,
        };
        f.debug_struct("AnnotationLayer")
            .field("div", &self.div)
            .field("widgets", &widgets)
            .finish_non_exhaustive()
    }
}

impl AnnotationLayer {
    pub fn new(container: &Element, link_service: Rc<dyn LinkService>) -> Self {
        let div = Element::with_class("div", "annotationLayer");
        container.append_child(&div);
        Self {
            div,
            link_service,
            content: Content::NotLoaded,
        }
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.div
    }

    /// Widget sections in annotation order
    #[must_use]
    pub fn widgets(&self) -> Vec<Element> {
        match &self.content {
            Content::Built(widgets) => widgets.iter().map(|w| w.section.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Follows the link of the `index`th widget. Returns false if it is not a link.
    pub fn follow_link(&self, index: usize) -> bool {
        let Content::Built(widgets) = &self.content else {
            return false;
        };
        match widgets.get(index).map(|w| &w.annotation.kind) {
            Some(AnnotationKind::Link(target)) => {
                self.link_service.navigate(target);
                true
            }
            _ => false,
        }
    }

    fn update_dimensions(&self, viewport: &Viewport) {
        self.div.set_style("width", &format!("{}px", viewport.width));
        self.div.set_style("height", &format!("{}px", viewport.height));
        self.div
            .set_attribute("data-main-rotation", &viewport.rotation.to_string());
    }

    fn build_widget(&self, annotation: Annotation, view_box: &[f64; 4]) -> AnnotationWidget {
        let section = match &annotation.kind {
            AnnotationKind::Link(target) => {
                let section = Element::with_class("section", "linkAnnotation");
                let anchor = Element::new("a");
                anchor.set_attribute("href", &self.link_service.href(target));
                section.append_child(&anchor);
                section
            }
            AnnotationKind::Other(subtype) => Element::with_class(
                "section",
                &format!("{}Annotation", subtype.to_lowercase()),
            ),
        };
        section.set_attribute("data-annotation-id", &annotation.id);
        place_in_page(&section, &annotation.rect, view_box);
        AnnotationWidget {
            section,
            annotation,
        }
    }
}

impl Layer for AnnotationLayer {
    async fn render<P: PdfPage>(
        &mut self,
        page: &P,
        viewport: &Viewport,
    ) -> Result<(), LayerError> {
        let viewport = viewport.clone_with(true);
        match self.content {
            Content::Empty => return Ok(()),
            Content::Built(_) => {
                self.update_dimensions(&viewport);
                return Ok(());
            }
            Content::NotLoaded => {}
        }

        let annotations = page.annotations().await?;
        if annotations.is_empty() {
            self.div.set_hidden(true);
            self.content = Content::Empty;
            return Ok(());
        }

        let widgets: Vec<_> = annotations
            .into_iter()
            .map(|annotation| self.build_widget(annotation, &viewport.view_box))
            .collect();
        for widget in &widgets {
            self.div.append_child(&widget.section);
        }
        self.update_dimensions(&viewport);
        self.content = Content::Built(widgets);
        Ok(())
    }

    fn cancel_render(&mut self) {}
}

/// Positions `element` over `rect` in percentages of the unrotated page
fn place_in_page(element: &Element, rect: &[f64; 4], view_box: &[f64; 4]) {
    let page_width = view_box[2] - view_box[0];
    let page_height = view_box[3] - view_box[1];
    if page_width <= 0.0 || page_height <= 0.0 {
        return;
    }
    let (x1, x2) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
    let (y1, y2) = (rect[1].min(rect[3]), rect[1].max(rect[3]));

    let left = 100.0 * (x1 - view_box[0]) / page_width;
    let top = 100.0 * (view_box[3] - y2) / page_height;
    element.set_style("left", &format!("{left}%"));
    element.set_style("top", &format!("{top}%"));
    element.set_style("width", &format!("{}%", 100.0 * (x2 - x1) / page_width));
    element.set_style("height", &format!("{}%", 100.0 * (y2 - y1) / page_height));
}
