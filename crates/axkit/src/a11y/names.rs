/*!
Well-known names.

A convenience subset of the names the macOS accessibility service defines.
Nothing in the client depends on a name being listed here; unknown names
work exactly the same way.
*/

use crate::types::{Action, Attribute, Notification, Role, Subrole};

impl Attribute {
  // Informational
  pub const ROLE: Self = Self::from_static("AXRole");
  pub const SUBROLE: Self = Self::from_static("AXSubrole");
  pub const ROLE_DESCRIPTION: Self = Self::from_static("AXRoleDescription");
  pub const TITLE: Self = Self::from_static("AXTitle");
  pub const DESCRIPTION: Self = Self::from_static("AXDescription");
  pub const HELP: Self = Self::from_static("AXHelp");
  pub const IDENTIFIER: Self = Self::from_static("AXIdentifier");

  // Hierarchy
  pub const PARENT: Self = Self::from_static("AXParent");
  pub const CHILDREN: Self = Self::from_static("AXChildren");
  pub const CHILDREN_IN_NAVIGATION_ORDER: Self = Self::from_static("AXChildrenInNavigationOrder");
  pub const WINDOW: Self = Self::from_static("AXWindow");
  pub const WINDOWS: Self = Self::from_static("AXWindows");
  pub const MAIN_WINDOW: Self = Self::from_static("AXMainWindow");
  pub const FOCUSED_WINDOW: Self = Self::from_static("AXFocusedWindow");
  pub const FOCUSED_UI_ELEMENT: Self = Self::from_static("AXFocusedUIElement");

  // Value
  pub const VALUE: Self = Self::from_static("AXValue");
  pub const PLACEHOLDER_VALUE: Self = Self::from_static("AXPlaceholderValue");
  pub const SELECTED_TEXT: Self = Self::from_static("AXSelectedText");
  pub const SELECTED_TEXT_RANGE: Self = Self::from_static("AXSelectedTextRange");
  pub const NUMBER_OF_CHARACTERS: Self = Self::from_static("AXNumberOfCharacters");

  // State
  pub const ENABLED: Self = Self::from_static("AXEnabled");
  pub const FOCUSED: Self = Self::from_static("AXFocused");
  pub const MAIN: Self = Self::from_static("AXMain");
  pub const MINIMIZED: Self = Self::from_static("AXMinimized");
  pub const MODAL: Self = Self::from_static("AXModal");
  pub const FULL_SCREEN: Self = Self::from_static("AXFullScreen");
  pub const FRONTMOST: Self = Self::from_static("AXFrontmost");
  pub const HIDDEN: Self = Self::from_static("AXHidden");

  // Geometry
  pub const POSITION: Self = Self::from_static("AXPosition");
  pub const SIZE: Self = Self::from_static("AXSize");
  pub const FRAME: Self = Self::from_static("AXFrame");
  pub const ACTIVATION_POINT: Self = Self::from_static("AXActivationPoint");

  // Window buttons
  pub const CLOSE_BUTTON: Self = Self::from_static("AXCloseButton");
  pub const MINIMIZE_BUTTON: Self = Self::from_static("AXMinimizeButton");
  pub const ZOOM_BUTTON: Self = Self::from_static("AXZoomButton");
  pub const FULL_SCREEN_BUTTON: Self = Self::from_static("AXFullScreenButton");
  pub const PROXY: Self = Self::from_static("AXProxy");
  pub const SECTIONS: Self = Self::from_static("AXSections");

  // Parameterized
  pub const STRING_FOR_RANGE: Self = Self::from_static("AXStringForRange");
  pub const BOUNDS_FOR_RANGE: Self = Self::from_static("AXBoundsForRange");
  pub const LINE_FOR_INDEX: Self = Self::from_static("AXLineForIndex");
  pub const RANGE_FOR_LINE: Self = Self::from_static("AXRangeForLine");

  const KNOWN: &'static [&'static str] = &[
    "AXRole",
    "AXSubrole",
    "AXRoleDescription",
    "AXTitle",
    "AXDescription",
    "AXHelp",
    "AXIdentifier",
    "AXParent",
    "AXChildren",
    "AXChildrenInNavigationOrder",
    "AXWindow",
    "AXWindows",
    "AXMainWindow",
    "AXFocusedWindow",
    "AXFocusedUIElement",
    "AXValue",
    "AXPlaceholderValue",
    "AXSelectedText",
    "AXSelectedTextRange",
    "AXNumberOfCharacters",
    "AXEnabled",
    "AXFocused",
    "AXMain",
    "AXMinimized",
    "AXModal",
    "AXFullScreen",
    "AXFrontmost",
    "AXHidden",
    "AXPosition",
    "AXSize",
    "AXFrame",
    "AXActivationPoint",
    "AXCloseButton",
    "AXMinimizeButton",
    "AXZoomButton",
    "AXFullScreenButton",
    "AXProxy",
    "AXSections",
    "AXStringForRange",
    "AXBoundsForRange",
    "AXLineForIndex",
    "AXRangeForLine",
  ];

  /// Whether this name appears in the well-known table. Informational only.
  pub fn is_known(&self) -> bool {
    Self::KNOWN.contains(&self.as_str())
  }
}

impl Action {
  pub const PRESS: Self = Self::from_static("AXPress");
  pub const INCREMENT: Self = Self::from_static("AXIncrement");
  pub const DECREMENT: Self = Self::from_static("AXDecrement");
  pub const CONFIRM: Self = Self::from_static("AXConfirm");
  pub const PICK: Self = Self::from_static("AXPick");
  pub const CANCEL: Self = Self::from_static("AXCancel");
  pub const RAISE: Self = Self::from_static("AXRaise");
  pub const SHOW_MENU: Self = Self::from_static("AXShowMenu");
  pub const DELETE: Self = Self::from_static("AXDelete");
  pub const SHOW_ALTERNATE_UI: Self = Self::from_static("AXShowAlternateUI");
  pub const SHOW_DEFAULT_UI: Self = Self::from_static("AXShowDefaultUI");

  /// Whether this name is one of the standard actions.
  pub fn is_known(&self) -> bool {
    [
      Self::PRESS,
      Self::INCREMENT,
      Self::DECREMENT,
      Self::CONFIRM,
      Self::PICK,
      Self::CANCEL,
      Self::RAISE,
      Self::SHOW_MENU,
      Self::DELETE,
      Self::SHOW_ALTERNATE_UI,
      Self::SHOW_DEFAULT_UI,
    ]
    .contains(self)
  }
}

impl Notification {
  // Focus
  pub const MAIN_WINDOW_CHANGED: Self = Self::from_static("AXMainWindowChanged");
  pub const FOCUSED_WINDOW_CHANGED: Self = Self::from_static("AXFocusedWindowChanged");
  pub const FOCUSED_UI_ELEMENT_CHANGED: Self = Self::from_static("AXFocusedUIElementChanged");

  // Application
  pub const APPLICATION_ACTIVATED: Self = Self::from_static("AXApplicationActivated");
  pub const APPLICATION_DEACTIVATED: Self = Self::from_static("AXApplicationDeactivated");
  pub const APPLICATION_HIDDEN: Self = Self::from_static("AXApplicationHidden");
  pub const APPLICATION_SHOWN: Self = Self::from_static("AXApplicationShown");

  // Window
  pub const WINDOW_CREATED: Self = Self::from_static("AXWindowCreated");
  pub const WINDOW_MOVED: Self = Self::from_static("AXWindowMoved");
  pub const WINDOW_RESIZED: Self = Self::from_static("AXWindowResized");
  pub const WINDOW_MINIATURIZED: Self = Self::from_static("AXWindowMiniaturized");
  pub const WINDOW_DEMINIATURIZED: Self = Self::from_static("AXWindowDeminiaturized");

  // Element
  pub const UI_ELEMENT_DESTROYED: Self = Self::from_static("AXUIElementDestroyed");
  pub const VALUE_CHANGED: Self = Self::from_static("AXValueChanged");
  pub const TITLE_CHANGED: Self = Self::from_static("AXTitleChanged");
  pub const RESIZED: Self = Self::from_static("AXResized");
  pub const MOVED: Self = Self::from_static("AXMoved");
  pub const CREATED: Self = Self::from_static("AXCreated");
  pub const LAYOUT_CHANGED: Self = Self::from_static("AXLayoutChanged");
  pub const SELECTED_TEXT_CHANGED: Self = Self::from_static("AXSelectedTextChanged");
  pub const SELECTED_CHILDREN_CHANGED: Self = Self::from_static("AXSelectedChildrenChanged");
  pub const ANNOUNCEMENT_REQUESTED: Self = Self::from_static("AXAnnouncementRequested");
}

impl Role {
  pub const APPLICATION: Self = Self::from_static("AXApplication");
  pub const SYSTEM_WIDE: Self = Self::from_static("AXSystemWide");
  pub const WINDOW: Self = Self::from_static("AXWindow");
  pub const SHEET: Self = Self::from_static("AXSheet");
  pub const GROUP: Self = Self::from_static("AXGroup");
  pub const BUTTON: Self = Self::from_static("AXButton");
  pub const CHECK_BOX: Self = Self::from_static("AXCheckBox");
  pub const TEXT_FIELD: Self = Self::from_static("AXTextField");
  pub const TEXT_AREA: Self = Self::from_static("AXTextArea");
  pub const STATIC_TEXT: Self = Self::from_static("AXStaticText");
  pub const MENU: Self = Self::from_static("AXMenu");
  pub const MENU_ITEM: Self = Self::from_static("AXMenuItem");
  pub const LIST: Self = Self::from_static("AXList");
  pub const TABLE: Self = Self::from_static("AXTable");
  pub const ROW: Self = Self::from_static("AXRow");
  pub const UNKNOWN: Self = Self::from_static("AXUnknown");
}

impl Subrole {
  pub const STANDARD_WINDOW: Self = Self::from_static("AXStandardWindow");
  pub const DIALOG: Self = Self::from_static("AXDialog");
  pub const CLOSE_BUTTON: Self = Self::from_static("AXCloseButton");
  pub const MINIMIZE_BUTTON: Self = Self::from_static("AXMinimizeButton");
  pub const ZOOM_BUTTON: Self = Self::from_static("AXZoomButton");
  pub const SEARCH_FIELD: Self = Self::from_static("AXSearchField");
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn known_names_are_labelled() {
    assert!(Attribute::TITLE.is_known());
    assert!(Action::PRESS.is_known());
  }

  #[test]
  fn unknown_names_still_compare_by_string() {
    let custom = Attribute::new("AXSections");
    assert!(!custom.is_known());
    assert_eq!(custom, Attribute::from("AXSections"));
  }
}
