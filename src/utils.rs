//! Small geometry helpers shared by the viewer and its layers

use crate::dom::Element;
use crate::engine::PdfPage;

/// CSS pixels per PDF point (96 / 72).
pub const PDF_TO_CSS_UNITS: f64 = 96.0 / 72.0;

/// Custom property holding the CSS scale of every page box.
pub const SCALE_FACTOR_PROPERTY: &str = "--scale-factor";

/// Returns true for any whole multiple of 90 degrees, negative or past 360.
#[must_use]
pub fn is_valid_rotation(angle: i32) -> bool {
    angle % 90 == 0
}

/// Folds an angle into `0..360`.
#[must_use]
pub fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

/// Sizes `element` to the page box at `rotation`, in units of the
/// `--scale-factor` property so a later scale change needs no re-render.
pub fn set_elem_size_from_page<P: PdfPage>(element: &Element, page: &P, rotation: i32) {
    let viewport = page.viewport(1.0, rotation);
    element.set_style("height", &scaled_css_length(viewport.height));
    element.set_style("width", &scaled_css_length(viewport.width));
}

/// `calc(var(--scale-factor) * {len}px)`
#[must_use]
pub fn scaled_css_length(len: f64) -> String {
    format!("calc(var({SCALE_FACTOR_PROPERTY}) * {len}px)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiples_of_ninety_are_valid() {
        for angle in [-450, -270, -180, -90, 0, 90, 180, 270, 360, 450, 720] {
            assert!(is_valid_rotation(angle), "{angle} should be valid");
        }
    }

    #[test]
    fn other_angles_are_rejected() {
        for angle in [-45, 1, 45, 89, 91, 135, 359, 361] {
            assert!(!is_valid_rotation(angle), "{angle} should be rejected");
        }
    }

    #[test]
    fn normalize_handles_negative_and_large_angles() {
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(720), 0);
        assert_eq!(normalize_rotation(180), 180);
    }

    #[test]
    fn scaled_length_uses_scale_factor_variable() {
        assert_eq!(
            scaled_css_length(612.0),
            "calc(var(--scale-factor) * 612px)"
        );
    }
}
