//! Visual layers stacked inside a page box
//!
//! Every page owns a canvas, a text and an annotation layer, rendered in
//! that order. Layers keep their own content between renders and update it
//! in place when the viewport changes; only the canvas re-rasterizes.

mod annotation;
mod canvas;
mod text;

pub use annotation::AnnotationLayer;
pub use canvas::CanvasLayer;
pub use text::TextLayer;

use crate::engine::{EngineError, PdfPage, Viewport};

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    #[error("canvas context is null")]
    NoCanvasContext,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[allow(async_fn_in_trait)]
pub trait Layer {
    /// Builds content on the first call, refreshes it for `viewport` after.
    async fn render<P: PdfPage>(&mut self, page: &P, viewport: &Viewport)
    -> Result<(), LayerError>;

    /// Asks in-flight engine work to stop. Never removes content.
    fn cancel_render(&mut self);

    /// Capability probe for layers that react to pinch-zoom
    fn as_scale_aware(&mut self) -> Option<&mut dyn ScaleAware> {
        None
    }
}

/// Layers whose content would be misleading at a transient gesture scale
pub trait ScaleAware {
    fn prepare_for_scale(&mut self);
}

/// The fixed set of layers a page is made of
#[derive(Debug)]
pub enum PageLayer {
    Canvas(CanvasLayer),
    Text(TextLayer),
    Annotation(AnnotationLayer),
}

impl Layer for PageLayer {
    async fn render<P: PdfPage>(
        &mut self,
        page: &P,
        viewport: &Viewport,
    ) -> Result<(), LayerError> {
        match self {
            Self::Canvas(layer) => layer.render(page, viewport).await,
            Self::Text(layer) => layer.render(page, viewport).await,
            Self::Annotation(layer) => layer.render(page, viewport).await,
        }
    }

    fn cancel_render(&mut self) {
        match self {
            Self::Canvas(layer) => layer.cancel_render(),
            Self::Text(layer) => layer.cancel_render(),
            Self::Annotation(layer) => layer.cancel_render(),
        }
    }

    fn as_scale_aware(&mut self) -> Option<&mut dyn ScaleAware> {
        match self {
            Self::Canvas(layer) => layer.as_scale_aware(),
            Self::Text(layer) => layer.as_scale_aware(),
            Self::Annotation(layer) => layer.as_scale_aware(),
        }
    }
}
