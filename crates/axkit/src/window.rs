/*!
Window convenience wrapper.

Typed accessors for the attributes every standard window carries. State
flags read as `false` on any error, which is what callers checking "is this
window minimized?" want; everything else keeps the usual read convention.
*/

use std::fmt;
use std::ops::Deref;

use crate::a11y::Value;
use crate::element::UIElement;
use crate::platform::Backend;
use crate::types::{Action, Attribute, AxResult, Point, Rect, Role, Size};

/// An element whose role is `AXWindow`.
pub struct Window<B: Backend> {
  element: UIElement<B>,
}

impl<B: Backend> Window<B> {
  /// Wrap without checking the role.
  pub const fn new(element: UIElement<B>) -> Self {
    Self { element }
  }

  /// Wrap if the element reports the window role.
  pub fn from_element(element: UIElement<B>) -> AxResult<Option<Self>> {
    Ok((element.role()? == Some(Role::WINDOW)).then(|| Self::new(element)))
  }

  pub const fn element(&self) -> &UIElement<B> {
    &self.element
  }

  pub fn into_element(self) -> UIElement<B> {
    self.element
  }

  fn flag(&self, attribute: &Attribute) -> bool {
    self.element.attribute_bool(attribute).unwrap_or(false)
  }

  pub fn is_main(&self) -> bool {
    self.flag(&Attribute::MAIN)
  }

  pub fn is_focused(&self) -> bool {
    self.flag(&Attribute::FOCUSED)
  }

  pub fn is_minimized(&self) -> bool {
    self.flag(&Attribute::MINIMIZED)
  }

  pub fn is_modal(&self) -> bool {
    self.flag(&Attribute::MODAL)
  }

  pub fn is_full_screen(&self) -> bool {
    self.flag(&Attribute::FULL_SCREEN)
  }

  pub fn position(&self) -> AxResult<Option<Point>> {
    self.element.attribute(&Attribute::POSITION)
  }

  pub fn size(&self) -> AxResult<Option<Size>> {
    self.element.attribute(&Attribute::SIZE)
  }

  /// `AXFrame` if the window reports one, else position and size combined.
  pub fn frame(&self) -> AxResult<Option<Rect>> {
    if let Some(frame) = self.element.attribute(&Attribute::FRAME)? {
      return Ok(Some(frame));
    }
    Ok(match (self.position()?, self.size()?) {
      (Some(origin), Some(size)) => Some(Rect::from_parts(origin, size)),
      (None, _) | (_, None) => None,
    })
  }

  pub fn set_position(&self, position: Point) -> AxResult<()> {
    self.element.set_attribute(&Attribute::POSITION, position)
  }

  pub fn set_size(&self, size: Size) -> AxResult<()> {
    self.element.set_attribute(&Attribute::SIZE, size)
  }

  pub fn set_minimized(&self, minimized: bool) -> AxResult<()> {
    self.element.set_attribute(&Attribute::MINIMIZED, minimized)
  }

  /// Bring the window to the front of its application.
  pub fn raise(&self) -> AxResult<()> {
    self.element.perform_action(&Action::RAISE)
  }

  pub fn close_button(&self) -> AxResult<Option<UIElement<B>>> {
    self.element.attribute(&Attribute::CLOSE_BUTTON)
  }

  pub fn minimize_button(&self) -> AxResult<Option<UIElement<B>>> {
    self.element.attribute(&Attribute::MINIMIZE_BUTTON)
  }

  pub fn zoom_button(&self) -> AxResult<Option<UIElement<B>>> {
    self.element.attribute(&Attribute::ZOOM_BUTTON)
  }

  pub fn full_screen_button(&self) -> AxResult<Option<UIElement<B>>> {
    self.element.attribute(&Attribute::FULL_SCREEN_BUTTON)
  }

  /// Landmark sections (`AXSections`), each a dictionary describing one
  /// region of the window. Empty when the window reports none.
  pub fn sections(&self) -> AxResult<Vec<Value<UIElement<B>>>> {
    Ok(self.element.array_attribute(&Attribute::SECTIONS)?.unwrap_or_default())
  }

  /// Children in keyboard navigation order.
  pub fn children_in_navigation_order(&self) -> AxResult<Vec<UIElement<B>>> {
    Ok(
      self
        .element
        .array_attribute(&Attribute::CHILDREN_IN_NAVIGATION_ORDER)?
        .unwrap_or_default(),
    )
  }

  /// Proxy element standing in for the window, if any.
  pub fn proxy(&self) -> AxResult<Option<UIElement<B>>> {
    self.element.attribute(&Attribute::PROXY)
  }
}

impl<B: Backend> Deref for Window<B> {
  type Target = UIElement<B>;

  fn deref(&self) -> &UIElement<B> {
    &self.element
  }
}

impl<B: Backend> Clone for Window<B> {
  fn clone(&self) -> Self {
    Self::new(self.element.clone())
  }
}

impl<B: Backend> PartialEq for Window<B> {
  fn eq(&self, other: &Self) -> bool {
    self.element == other.element
  }
}

impl<B: Backend> Eq for Window<B> {}

impl<B: Backend> fmt::Debug for Window<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Window").field(&self.element).finish()
  }
}

impl<B: Backend> fmt::Display for Window<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.element, f)
  }
}
