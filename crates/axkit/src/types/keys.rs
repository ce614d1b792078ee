/*!
String-keyed identifiers for attributes, actions, notifications and roles.

The accessibility service addresses everything by name. Keys are thin
wrappers over the canonical string so unknown names stay first-class:
`Attribute::new("AXSomethingNew")` is as valid as `Attribute::TITLE`.
Well-known names live in `a11y::names` as associated constants.
*/

use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use ts_rs::TS;

macro_rules! string_key {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
      derive_more::Display,
    )]
    #[serde(transparent)]
    #[ts(export)]
    pub struct $name(#[ts(type = "string")] Cow<'static, str>);

    impl $name {
      /// Create a key from any string. No validation is performed.
      pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
      }

      /// Create a key from a static string (usable in `const` context).
      pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
      }

      /// The canonical name as understood by the accessibility service.
      pub fn as_str(&self) -> &str {
        &self.0
      }
    }

    impl From<&'static str> for $name {
      fn from(name: &'static str) -> Self {
        Self::from_static(name)
      }
    }

    impl From<String> for $name {
      fn from(name: String) -> Self {
        Self(Cow::Owned(name))
      }
    }

    impl AsRef<str> for $name {
      fn as_ref(&self) -> &str {
        &self.0
      }
    }

    impl Borrow<str> for $name {
      fn borrow(&self) -> &str {
        &self.0
      }
    }
  };
}

string_key! {
  /// Name of an element attribute (e.g. `AXTitle`), plain or parameterized.
  Attribute
}

string_key! {
  /// Name of an action an element can perform (e.g. `AXPress`).
  Action
}

string_key! {
  /// Name of a notification an element can emit (e.g. `AXValueChanged`).
  Notification
}

string_key! {
  /// Role reported by an element's `AXRole` attribute.
  Role
}

string_key! {
  /// Subrole reported by an element's `AXSubrole` attribute.
  Subrole
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  #[test]
  fn equality_is_by_string() {
    assert_eq!(Attribute::new(String::from("AXTitle")), Attribute::from_static("AXTitle"));
    assert_ne!(Attribute::from("AXTitle"), Attribute::from("AXValue"));
  }

  #[test]
  fn owned_and_static_keys_hash_alike() {
    let mut set = HashSet::new();
    set.insert(Action::from_static("AXPress"));
    assert!(set.contains(&Action::new("AXPress".to_string())));
    assert!(set.contains("AXPress"));
  }

  #[test]
  fn display_is_the_raw_name() {
    assert_eq!(Notification::from("AXMoved").to_string(), "AXMoved");
  }

  #[test]
  fn serializes_as_plain_string() {
    let json = serde_json::to_string(&Role::from("AXWindow")).unwrap();
    assert_eq!(json, "\"AXWindow\"");
    let back: Role = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Role::from("AXWindow"));
  }
}
