//! Retained element tree the viewer paints into
//!
//! Handles are reference counted and compared by identity, the same way a
//! browser node reference behaves. Everything runs on one UI loop, so the
//! tree uses `Rc`/`RefCell` and never crosses threads.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Raster storage backing a canvas element (opaque RGBA)
#[derive(Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    /// Uniform scale applied to drawing commands (device pixel ratio)
    scale: f64,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Allocates a white bitmap. Returns `None` when no drawing context can
    /// be created for the requested size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let len = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        Some(Self {
            width,
            height,
            scale: 1.0,
            pixels: vec![0xFF; len],
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Node {
    tag: String,
    class_name: String,
    hidden: bool,
    style: BTreeMap<String, String>,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    children: Vec<Element>,
    bitmap: Option<Bitmap>,
}

/// Handle to a node in the element tree
#[derive(Clone)]
pub struct Element(Rc<RefCell<Node>>);

impl Element {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self(Rc::new(RefCell::new(Node {
            tag: tag.to_string(),
            ..Node::default()
        })))
    }

    /// Creates `<tag class="class_name">`
    #[must_use]
    pub fn with_class(tag: &str, class_name: &str) -> Self {
        let element = Self::new(tag);
        element.set_class_name(class_name);
        element
    }

    /// True when both handles refer to the same node
    #[must_use]
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn tag(&self) -> String {
        self.0.borrow().tag.clone()
    }

    #[must_use]
    pub fn class_name(&self) -> String {
        self.0.borrow().class_name.clone()
    }

    pub fn set_class_name(&self, class_name: &str) {
        self.0.borrow_mut().class_name = class_name.to_string();
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.0.borrow().hidden
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.0.borrow_mut().hidden = hidden;
    }

    #[must_use]
    pub fn style(&self, name: &str) -> Option<String> {
        self.0.borrow().style.get(name).cloned()
    }

    /// Sets an inline style or a `--custom` property
    pub fn set_style(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .style
            .insert(name.to_string(), value.to_string());
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.borrow().attributes.get(name).cloned()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .borrow_mut()
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.0.borrow().text.clone()
    }

    pub fn set_text(&self, text: &str) {
        self.0.borrow_mut().text = Some(text.to_string());
    }

    pub fn append_child(&self, child: &Element) {
        self.0.borrow_mut().children.push(child.clone());
    }

    /// Removes `child`; returns false when it was not a child of this node
    pub fn remove_child(&self, child: &Element) -> bool {
        let mut node = self.0.borrow_mut();
        match node.children.iter().position(|c| c.ptr_eq(child)) {
            Some(idx) => {
                node.children.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Swaps `old` for `new` in place, keeping its position among siblings
    pub fn replace_child(&self, old: &Element, new: &Element) -> bool {
        let mut node = self.0.borrow_mut();
        match node.children.iter().position(|c| c.ptr_eq(old)) {
            Some(idx) => {
                node.children[idx] = new.clone();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains_child(&self, child: &Element) -> bool {
        self.0.borrow().children.iter().any(|c| c.ptr_eq(child))
    }

    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.0.borrow().children.clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// First direct child with the given class
    #[must_use]
    pub fn child_by_class(&self, class_name: &str) -> Option<Element> {
        self.0
            .borrow()
            .children
            .iter()
            .find(|c| c.0.borrow().class_name == class_name)
            .cloned()
    }

    pub fn set_bitmap(&self, bitmap: Bitmap) {
        self.0.borrow_mut().bitmap = Some(bitmap);
    }

    /// Pixel size of the canvas backing store, if this is a canvas
    #[must_use]
    pub fn bitmap_size(&self) -> Option<(u32, u32)> {
        self.0
            .borrow()
            .bitmap
            .as_ref()
            .map(|b| (b.width(), b.height()))
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Element")
            .field("tag", &node.tag)
            .field("class_name", &node.class_name)
            .field("hidden", &node.hidden)
            .field("children", &node.children.len())
            .finish_non_exhaustive()
    }
}

/// Scroll position and pixel density of the hosting window
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Window {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub device_pixel_ratio: f64,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl Window {
    #[must_use]
    pub fn new(device_pixel_ratio: f64) -> Self {
        Self {
            device_pixel_ratio,
            ..Self::default()
        }
    }

    /// Scrolls relative to the current offset; offsets never go negative.
    pub fn scroll_by(&mut self, dx: f64, dy: f64) {
        self.scroll_x = (self.scroll_x + dx).max(0.0);
        self.scroll_y = (self.scroll_y + dy).max(0.0);
    }
}
