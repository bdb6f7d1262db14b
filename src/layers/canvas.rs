//! Raster layer

use log::warn;

use super::{Layer, LayerError};
use crate::dom::{Bitmap, Element};
use crate::engine::{CancellationToken, PdfPage, Viewport};
use crate::utils::set_elem_size_from_page;

/// Rasterizes the page into a canvas, capping the backing store size.
/// A cap of 0 disables the limit.
#[derive(Debug)]
pub struct CanvasLayer {
    div: Element,
    max_canvas_pixels: u64,
    device_pixel_ratio: f64,
    canvas: Option<Element>,
    render_task: Option<CancellationToken>,
}

impl CanvasLayer {
    pub fn new(container: &Element, max_canvas_pixels: u64, device_pixel_ratio: f64) -> Self {
        let div = Element::with_class("div", "canvasLayer");
        container.append_child(&div);
        Self {
            div,
            max_canvas_pixels,
            device_pixel_ratio,
            canvas: None,
            render_task: None,
        }
    }

    /// The canvas currently on screen, if any render has finished
    #[must_use]
    pub fn canvas(&self) -> Option<&Element> {
        self.canvas.as_ref()
    }

    /// Viewport to rasterize with so the bitmap stays within the pixel cap
    fn raster_viewport<P: PdfPage>(&self, page: &P, viewport: &Viewport) -> Viewport {
        let ratio = self.device_pixel_ratio;
        let canvas_pixels = viewport.width * ratio * viewport.height * ratio;
        let max_pixels = self.max_canvas_pixels as f64;

        if self.max_canvas_pixels == 0 || canvas_pixels <= max_pixels {
            return viewport.clone();
        }

        warn!(
            "drawing page \"{}\" with reduced resolution",
            page.page_number()
        );
        // Rendering a high scale viewport and shrinking the canvas leaves
        // artifacts, so ask the engine for a lower scale viewport instead.
        let scale_adjustment = (max_pixels / canvas_pixels).sqrt();
        page.viewport(viewport.scale * scale_adjustment, viewport.rotation)
    }
}

impl Layer for CanvasLayer {
    async fn render<P: PdfPage>(
        &mut self,
        page: &P,
        viewport: &Viewport,
    ) -> Result<(), LayerError> {
        let ratio = self.device_pixel_ratio;
        let raster_viewport = self.raster_viewport(page, viewport);

        let width = (raster_viewport.width * ratio) as u32;
        let height = (raster_viewport.height * ratio) as u32;
        let mut bitmap = Bitmap::new(width, height).ok_or(LayerError::NoCanvasContext)?;
        bitmap.set_scale(ratio);

        let canvas = Element::new("canvas");
        // Displayed size follows the requested viewport, not the bitmap.
        set_elem_size_from_page(&canvas, page, viewport.rotation);

        let task = CancellationToken::new();
        self.render_task = Some(task.clone());
        page.rasterize(&mut bitmap, &raster_viewport, &task).await?;
        canvas.set_bitmap(bitmap);

        // Attach only once painted so the old frame stays up until then.
        match self.canvas.take() {
            Some(old) => {
                if !self.div.replace_child(&old, &canvas) {
                    self.div.append_child(&canvas);
                }
            }
            None => self.div.append_child(&canvas),
        }
        self.canvas = Some(canvas);
        Ok(())
    }

    fn cancel_render(&mut self) {
        if let Some(task) = &self.render_task {
            task.cancel();
        }
    }
}
