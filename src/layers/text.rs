//! Selectable text overlay

use std::collections::BTreeMap;

use super::{Layer, LayerError, ScaleAware};
use crate::dom::Element;
use crate::engine::{
    CancellationToken, PdfPage, TextItem, TextStyle, Viewport, multiply_transform,
};

const DEFAULT_FONT_ASCENT: f64 = 0.8;

/// What a text span was built from, kept so it can be moved later
#[derive(Clone, Debug)]
struct TextDivProperties {
    item: TextItem,
    ascent: f64,
    font_family: String,
}

/// Transparent text spans positioned over the raster
#[derive(Debug)]
pub struct TextLayer {
    div: Element,
    text_divs: Vec<Element>,
    text_div_properties: Vec<TextDivProperties>,
    render_task: Option<CancellationToken>,
    rendering_done: bool,
    rotation: i32,
    scale: f64,
}

impl TextLayer {
    pub fn new(container: &Element) -> Self {
        let div = Element::with_class("div", "textLayer");
        container.append_child(&div);
        let layer = Self {
            div,
            text_divs: Vec::new(),
            text_div_properties: Vec::new(),
            render_task: None,
            rendering_done: false,
            rotation: 0,
            scale: 1.0,
        };
        layer.hide();
        layer
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.div
    }

    #[must_use]
    pub fn text_divs(&self) -> &[Element] {
        &self.text_divs
    }

    fn update(&mut self, viewport: &Viewport) {
        let must_rotate = viewport.rotation != self.rotation;
        let must_rescale = viewport.scale != self.scale;
        if must_rotate || must_rescale {
            self.hide();
            for (div, props) in self.text_divs.iter().zip(&self.text_div_properties) {
                layout_text_div(div, props, viewport);
            }
            self.rotation = viewport.rotation;
            self.scale = viewport.scale;
        }
        self.show();
    }

    fn finish_rendering(&mut self) {
        self.rendering_done = true;
        self.div
            .append_child(&Element::with_class("div", "endOfContent"));
    }

    fn hide(&self) {
        if !self.div.is_hidden() {
            self.div.set_hidden(true);
        }
    }

    fn show(&self) {
        if self.div.is_hidden() && self.rendering_done {
            self.div.set_hidden(false);
        }
    }
}

impl Layer for TextLayer {
    async fn render<P: PdfPage>(
        &mut self,
        page: &P,
        viewport: &Viewport,
    ) -> Result<(), LayerError> {
        if self.rendering_done {
            self.update(viewport);
            return Ok(());
        }

        let task = CancellationToken::new();
        self.render_task = Some(task.clone());
        let content = page.text_content(&task).await?;

        for item in content.items {
            if item.text.is_empty() {
                continue;
            }
            let props = text_div_properties(item, &content.styles);
            let div = Element::new("span");
            div.set_text(&props.item.text);
            div.set_attribute("role", "presentation");
            layout_text_div(&div, &props, viewport);
            self.div.append_child(&div);
            self.text_divs.push(div);
            self.text_div_properties.push(props);
        }

        self.finish_rendering();
        self.rotation = viewport.rotation;
        self.scale = viewport.scale;
        self.show();
        Ok(())
    }

    fn cancel_render(&mut self) {
        if let Some(task) = &self.render_task {
            task.cancel();
        }
    }

    fn as_scale_aware(&mut self) -> Option<&mut dyn ScaleAware> {
        Some(self)
    }
}

impl ScaleAware for TextLayer {
    fn prepare_for_scale(&mut self) {
        self.hide();
    }
}

fn text_div_properties(item: TextItem, styles: &BTreeMap<String, TextStyle>) -> TextDivProperties {
    let (ascent, font_family) = match styles.get(&item.font_name) {
        Some(style) if style.ascent > 0.0 => (style.ascent, style.font_family.clone()),
        Some(style) => (DEFAULT_FONT_ASCENT, style.font_family.clone()),
        None => (DEFAULT_FONT_ASCENT, "sans-serif".to_string()),
    };
    TextDivProperties {
        item,
        ascent,
        font_family,
    }
}

/// Places a span so its glyph box lines up with the rasterized text
fn layout_text_div(div: &Element, props: &TextDivProperties, viewport: &Viewport) {
    let tx = multiply_transform(&viewport.transform, &props.item.transform);
    let angle = tx[1].atan2(tx[0]);
    let font_height = tx[2].hypot(tx[3]);
    let font_ascent = font_height * props.ascent;

    let (left, top) = if angle == 0.0 {
        (tx[4], tx[5] - font_ascent)
    } else {
        (
            tx[4] + font_ascent * angle.sin(),
            tx[5] - font_ascent * angle.cos(),
        )
    };

    div.set_style("left", &format!("{left}px"));
    div.set_style("top", &format!("{top}px"));
    div.set_style("font-size", &format!("{font_height}px"));
    div.set_style("font-family", &props.font_family);
    div.set_style("width", &format!("{}px", props.item.width * viewport.scale));
    if angle == 0.0 {
        div.set_style("transform", "none");
    } else {
        let degrees = (angle.to_degrees() * 1e6).round() / 1e6;
        div.set_style("transform", &format!("rotate({degrees}deg)"));
    }
}
