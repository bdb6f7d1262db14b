//! Bridge to the hosting application
//!
//! The host owns the authoritative page number, zoom and rotation and
//! drives the viewer through a handful of synchronous calls. It is passed
//! in explicitly so tests can substitute a recording double.

/// Synchronous calls exposed by the host application
pub trait HostBridge {
    fn page(&self) -> usize;
    fn set_page_number(&self, page_number: usize);
    fn scale(&self) -> f64;
    fn set_scale(&self, scale: f64);
    fn min_scale(&self) -> f64;
    fn max_scale(&self) -> f64;
    /// Gesture focus in device pixels
    fn scale_focus_x(&self) -> f64;
    fn scale_focus_y(&self) -> f64;
    fn rotation(&self) -> i32;
    fn max_canvas_pixels(&self) -> u64;
    fn set_num_pages(&self, num_pages: usize);
    /// `properties` is the document info dictionary as a JSON object
    fn set_document_properties(&self, properties: &str);
    fn show_password_prompt(&self);
    fn invalid_password(&self);
    fn password(&self) -> String;
    fn on_loaded(&self);
    fn on_viewer_initialized(&self);
}

/// Render request coming from the host's gesture layer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    /// Re-read page and rotation from the host
    ResetToHostState,
    ScaleBegin,
    Scale,
    ScaleEnd,
}

impl TryFrom<i32> for HostEvent {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::ResetToHostState),
            0 => Ok(Self::ScaleBegin),
            1 => Ok(Self::Scale),
            2 => Ok(Self::ScaleEnd),
            other => Err(other),
        }
    }
}

/// Pinch-zoom sample, focus in CSS pixels relative to the window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleData {
    pub scale: f64,
    pub focus_x: f64,
    pub focus_y: f64,
}
