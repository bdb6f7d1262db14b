//! Viewer state transitions
//!
//! Every public viewer operation is first applied here as a [`Command`].
//! The transition is synchronous and returns the [`Effect`]s the viewer
//! must then carry out, in order. Effects that render suspend; no other
//! transition can run meanwhile because the viewer is borrowed mutably.

use super::ViewerError;
use crate::host::ScaleData;
use crate::utils::is_valid_rotation;

/// Parameters of one page load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadPageParams {
    pub page_number: usize,
    /// Keep existing content when the page is already rendered
    pub use_cached: bool,
    /// Drop every other cached page before rendering
    pub invalidate_cache: bool,
    /// Render off screen without committing the page number
    pub pre_render: bool,
}

impl LoadPageParams {
    #[must_use]
    pub const fn navigate(page_number: usize) -> Self {
        Self {
            page_number,
            use_cached: true,
            invalidate_cache: false,
            pre_render: false,
        }
    }

    #[must_use]
    pub const fn rerender(page_number: usize) -> Self {
        Self {
            page_number,
            use_cached: false,
            invalidate_cache: true,
            pre_render: false,
        }
    }

    #[must_use]
    pub const fn pre_render(page_number: usize) -> Self {
        Self {
            page_number,
            use_cached: true,
            invalidate_cache: false,
            pre_render: true,
        }
    }
}

/// Current state of the viewer
#[derive(Clone, Debug, PartialEq)]
pub struct ViewerState {
    /// Displayed page, 0 when none
    pub page_number: usize,
    /// Any multiple of 90, stored as given
    pub rotation: i32,
    pub scale: f64,
    /// True between scale gesture begin and end
    pub scaling: bool,
    pub page_count: usize,
    pub document_set: bool,
}

impl ViewerState {
    #[must_use]
    pub fn new(rotation: i32, scale: f64) -> Self {
        Self {
            page_number: 0,
            rotation,
            scale,
            scaling: false,
            page_count: 0,
            document_set: false,
        }
    }

    /// Apply a command and return resulting effects
    pub fn apply(&mut self, cmd: Command) -> Result<Vec<Effect>, ViewerError> {
        match cmd {
            Command::SetPageNumber(page_number) => {
                if !self.document_set {
                    return Err(ViewerError::NoDocument);
                }
                self.check_page(page_number)?;
                if page_number == self.page_number {
                    return Ok(vec![]);
                }
                Ok(vec![
                    Effect::UnloadPage(self.page_number),
                    Effect::LoadPage(LoadPageParams::navigate(page_number)),
                ])
            }

            Command::SetRotation(rotation) => {
                if !is_valid_rotation(rotation) {
                    return Err(ViewerError::InvalidRotation(rotation));
                }
                if rotation == self.rotation {
                    return Ok(vec![]);
                }
                self.rotation = rotation;
                Ok(self.rerender_current())
            }

            Command::SetScale(scale) => {
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(ViewerError::InvalidScale(scale));
                }
                if scale == self.scale && !self.scaling {
                    return Ok(vec![]);
                }
                self.scale = scale;
                let mut effects = vec![Effect::UpdateCssScale(scale)];
                effects.extend(self.rerender_current());
                Ok(effects)
            }

            Command::ScaleBegin => {
                self.scaling = true;
                Ok(vec![Effect::PrepareForScale(self.page_number)])
            }

            Command::Scale(data) => {
                if !(data.scale.is_finite() && data.scale > 0.0) {
                    return Err(ViewerError::InvalidScale(data.scale));
                }
                let factor = data.scale / self.scale - 1.0;
                self.scale = data.scale;
                Ok(vec![
                    Effect::UpdateCssScale(data.scale),
                    Effect::ScrollToFocus {
                        focus_x: data.focus_x,
                        focus_y: data.focus_y,
                        factor,
                    },
                ])
            }

            Command::ScaleEnd(data) => {
                // Still scaling while SetScale runs, so an unchanged scale
                // re-renders. The gesture is over whatever the outcome.
                let effects = self.apply(Command::SetScale(data.scale));
                self.scaling = false;
                effects
            }
        }
    }

    /// Fails unless `page_number` is within `1..=page_count`
    pub fn check_page(&self, page_number: usize) -> Result<(), ViewerError> {
        if page_number == 0 || page_number > self.page_count {
            return Err(ViewerError::InvalidPageNumber(page_number));
        }
        Ok(())
    }

    /// Neighbors to render off screen after `page_number` is shown, the one
    /// in the direction of travel first
    #[must_use]
    pub fn pre_render_order(&self, page_number: usize, previous: usize) -> Vec<usize> {
        let mut pages = Vec::with_capacity(2);
        if page_number < self.page_count {
            pages.push(page_number + 1);
        }
        if page_number > 1 {
            pages.push(page_number - 1);
        }
        if previous > page_number {
            pages.reverse();
        }
        pages
    }

    fn rerender_current(&self) -> Vec<Effect> {
        if !self.document_set || self.page_number == 0 {
            return vec![];
        }
        vec![Effect::LoadPage(LoadPageParams::rerender(self.page_number))]
    }
}

/// Requests that change viewer state
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    SetPageNumber(usize),
    SetRotation(i32),
    SetScale(f64),
    ScaleBegin,
    Scale(ScaleData),
    ScaleEnd(ScaleData),
}

/// Work the viewer performs after a transition
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// Set the `--scale-factor` property for `scale`
    UpdateCssScale(f64),
    /// Prune the cache and detach the page from the container
    UnloadPage(usize),
    LoadPage(LoadPageParams),
    /// Hide scale sensitive content of the page
    PrepareForScale(usize),
    /// Keep the gesture focus point fixed on screen
    ScrollToFocus {
        focus_x: f64,
        focus_y: f64,
        factor: f64,
    },
}
