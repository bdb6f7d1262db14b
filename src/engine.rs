//! Contract with the PDF rendering engine
//!
//! The viewer never parses PDF data itself. An engine opens a document,
//! hands out one page handle per page, and for each page can produce a
//! viewport, list annotations, stream text content and rasterize into a
//! caller-owned bitmap. Futures are driven on the UI loop and need not be
//! `Send`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::dom::Bitmap;
use crate::utils::normalize_rotation;

/// Errors reported by the engine while working on a loaded document
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("rendering cancelled")]
    Cancelled,

    #[error("{detail}")]
    Generic { detail: String },
}

impl EngineError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Errors from opening a document
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("document is encrypted and needs a password")]
    PasswordRequired,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Cooperative cancellation flag shared between a layer and the engine
///
/// The engine checks `is_cancelled()` at its suspension points and bails
/// out with [`EngineError::Cancelled`]. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// 2D affine transform `[a, b, c, d, e, f]`
pub type Transform = [f64; 6];

/// Multiplies two affine transforms (`m1 * m2`)
#[must_use]
pub fn multiply_transform(m1: &Transform, m2: &Transform) -> Transform {
    [
        m1[0] * m2[0] + m1[2] * m2[1],
        m1[1] * m2[0] + m1[3] * m2[1],
        m1[0] * m2[2] + m1[2] * m2[3],
        m1[1] * m2[2] + m1[3] * m2[3],
        m1[0] * m2[4] + m1[2] * m2[5] + m1[4],
        m1[1] * m2[4] + m1[3] * m2[5] + m1[5],
    ]
}

/// Page geometry at a given scale and rotation
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// PDF user-space box `[x1, y1, x2, y2]`
    pub view_box: [f64; 4],
    pub scale: f64,
    /// Normalized to `0..360`
    pub rotation: i32,
    pub width: f64,
    pub height: f64,
    pub transform: Transform,
    pub dont_flip: bool,
}

impl Viewport {
    #[must_use]
    pub fn new(view_box: [f64; 4], scale: f64, rotation: i32, dont_flip: bool) -> Self {
        let rotation = normalize_rotation(rotation);
        let center_x = (view_box[2] + view_box[0]) / 2.0;
        let center_y = (view_box[3] + view_box[1]) / 2.0;

        let (a, b, mut c, mut d) = match rotation {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };
        if dont_flip {
            c = -c;
            d = -d;
        }

        let box_width = (view_box[2] - view_box[0]).abs();
        let box_height = (view_box[3] - view_box[1]).abs();
        let (offset_x, offset_y, width, height) = if a == 0.0 {
            (
                (center_y - view_box[1]).abs() * scale,
                (center_x - view_box[0]).abs() * scale,
                box_height * scale,
                box_width * scale,
            )
        } else {
            (
                (center_x - view_box[0]).abs() * scale,
                (center_y - view_box[1]).abs() * scale,
                box_width * scale,
                box_height * scale,
            )
        };

        Self {
            view_box,
            scale,
            rotation,
            width,
            height,
            transform: [
                a * scale,
                b * scale,
                c * scale,
                d * scale,
                offset_x - a * scale * center_x - c * scale * center_y,
                offset_y - b * scale * center_x - d * scale * center_y,
            ],
            dont_flip,
        }
    }

    /// Same geometry with the y axis optionally left unflipped
    #[must_use]
    pub fn clone_with(&self, dont_flip: bool) -> Self {
        Self::new(self.view_box, self.scale, self.rotation, dont_flip)
    }
}

/// Target of a link annotation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    /// 1-based page inside the document
    Page(usize),
    Uri(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationKind {
    Link(LinkTarget),
    /// Any subtype the viewer does not build widgets for
    Other(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: String,
    pub kind: AnnotationKind,
    /// PDF user-space rect `[x1, y1, x2, y2]`
    pub rect: [f64; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub transform: Transform,
    /// Advance width in text space units
    pub width: f64,
    pub height: f64,
    pub font_name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    /// Fraction of the font height above the baseline
    pub ascent: f64,
}

/// Text runs of one page, in content-stream order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextContent {
    pub items: Vec<TextItem>,
    pub styles: BTreeMap<String, TextStyle>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalContentGroup {
    pub id: String,
    pub name: String,
    pub visible: bool,
}

/// Optional content (layer) configuration of a document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalContentConfig {
    pub name: Option<String>,
    pub groups: Vec<OptionalContentGroup>,
}

/// Document info dictionary, forwarded to the host as JSON
pub type DocumentInfo = BTreeMap<String, serde_json::Value>;

/// One page of a loaded document
#[allow(async_fn_in_trait)]
pub trait PdfPage {
    /// 1-based
    fn page_number(&self) -> usize;

    /// Media box in PDF user space
    fn view_box(&self) -> [f64; 4];

    /// `rotation` is the total rotation to apply; engines fold any
    /// rotation stored in the page dictionary into their view box.
    fn viewport(&self, scale: f64, rotation: i32) -> Viewport {
        Viewport::new(self.view_box(), scale, rotation, false)
    }

    async fn annotations(&self) -> Result<Vec<Annotation>, EngineError>;

    async fn text_content(&self, cancel: &CancellationToken) -> Result<TextContent, EngineError>;

    /// Paints the page into `bitmap`. Drawing coordinates are viewport
    /// units multiplied by `bitmap.scale()`.
    async fn rasterize(
        &self,
        bitmap: &mut Bitmap,
        viewport: &Viewport,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError>;
}

/// A loaded document
#[allow(async_fn_in_trait)]
pub trait PdfDocument {
    type Page: PdfPage;

    fn num_pages(&self) -> usize;

    /// `page_number` is 1-based
    async fn page(&self, page_number: usize) -> Result<Self::Page, EngineError>;

    async fn metadata(&self) -> Result<DocumentInfo, EngineError>;

    async fn optional_content_config(&self) -> Result<OptionalContentConfig, EngineError>;
}

#[allow(async_fn_in_trait)]
pub trait PdfEngine {
    type Document: PdfDocument;

    async fn open(&self, url: &str, password: Option<&str>) -> Result<Self::Document, LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

    fn to_viewport(viewport: &Viewport, x: f64, y: f64) -> (f64, f64) {
        let m = &viewport.transform;
        (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
    }

    #[test]
    fn unrotated_viewport_flips_y_axis() {
        let viewport = Viewport::new(LETTER, 2.0, 0, false);
        assert_eq!(viewport.width, 1224.0);
        assert_eq!(viewport.height, 1584.0);
        assert_eq!(to_viewport(&viewport, 0.0, 792.0), (0.0, 0.0));
        assert_eq!(to_viewport(&viewport, 612.0, 0.0), (1224.0, 1584.0));
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let viewport = Viewport::new(LETTER, 1.0, 90, false);
        assert_eq!(viewport.width, 792.0);
        assert_eq!(viewport.height, 612.0);
        assert_eq!(viewport.rotation, 90);
        assert_eq!(to_viewport(&viewport, 0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn negative_rotation_is_normalized() {
        let viewport = Viewport::new(LETTER, 1.0, -90, false);
        assert_eq!(viewport.rotation, 270);
        assert_eq!(viewport.width, 792.0);
    }

    #[test]
    fn clone_with_dont_flip_keeps_size() {
        let viewport = Viewport::new(LETTER, 1.5, 180, false);
        let unflipped = viewport.clone_with(true);
        assert!(unflipped.dont_flip);
        assert_eq!(unflipped.width, viewport.width);
        assert_eq!(unflipped.height, viewport.height);
        assert_eq!(unflipped.transform[3], -viewport.transform[3]);
    }

    #[test]
    fn identity_multiply_is_noop() {
        let identity = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let m = [2.0, 0.0, 0.0, -2.0, 10.0, 20.0];
        assert_eq!(multiply_transform(&identity, &m), m);
        assert_eq!(multiply_transform(&m, &identity), m);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let engine_side = token.clone();
        assert!(!engine_side.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(engine_side.is_cancelled());
    }
}
