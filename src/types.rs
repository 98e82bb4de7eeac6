//! Core types shared across the tracking engine.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;

/// Values held by stores and exchanged with property accessors.
pub use serde_json::Value;

/// Rule mapping `(type name, key)` to a store name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamingScheme {
    /// Store name is the key alone. A key is required.
    KeyOnly,
    /// Store name is the type name, suffixed with `_{key}` when a key is set.
    #[default]
    TypeNameAndKey,
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingScheme::KeyOnly => write!(f, "key-only"),
            NamingScheme::TypeNameAndKey => write!(f, "type-name-and-key"),
        }
    }
}

/// Identifier returned when registering a hook, notification or trigger listener.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Debug for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ListenerId({})", self.0)
    }
}

/// Which cycle a property operation belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Apply,
    Persist,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Apply => write!(f, "apply"),
            OperationKind::Persist => write!(f, "persist"),
        }
    }
}

/// Decision returned by an applying/persisting hook.
#[derive(Clone, Debug, PartialEq)]
pub enum HookOutcome {
    /// Continue with this (possibly replaced) value.
    Proceed(Value),
    /// Veto the operation for this property only.
    Cancel,
}

impl HookOutcome {
    pub fn is_cancel(&self) -> bool {
        matches!(self, HookOutcome::Cancel)
    }
}

/// Runtime identity of a tracked object's concrete type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetType {
    pub id: TypeId,
    /// Full path as reported by `std::any::type_name`.
    pub name: &'static str,
}

impl TargetType {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type name without its module path, used for store naming.
    ///
    /// `app::settings::Widget` becomes `Widget`; generic arguments are kept
    /// but stripped of their own paths (`Panel<Widget>`).
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(last_path_segment(&segment));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}
