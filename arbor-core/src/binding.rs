//! Element Bindings
//!
//! Connects a [`PathHandle`] to a host element (a DOM node, a widget, a
//! test double) through the [`BindTarget`] trait. The store knows nothing
//! about the host; the host knows nothing about the tree.
//!
//! # Target Kinds
//!
//! What a binding does depends on the element it drives. The kind is
//! resolved once, when the binding is made, and never re-detected:
//!
//! | Kind | Initial sync | Store → element | Element → store |
//! |---|---|---|---|
//! | `Text`, `Html` | store → element | yes | no |
//! | `Attribute` | store → element | yes | [`Binding::on_input`] |
//! | `Style`, `Output` | none | yes | no |
//! | `TextInput`, `Select`, `TextArea` | element → store | yes | [`Binding::on_input`] |
//! | `NumberInput` | element → store (as number) | yes | [`Binding::on_input`] |
//! | `Checkbox` | element → store (as bool) | yes | [`Binding::on_input`] |
//! | `RadioGroup` | element → store | yes | [`Binding::on_input`] |
//! | `Button` | element → store | no | [`Binding::on_press`] / [`Binding::on_release`] |
//!
//! Both directions skip writes that would not change anything, which keeps
//! a two-way binding from echoing forever.
//!
//! # Failure Modes
//!
//! - Unsupported element: logged as a warning, no binding is made, the
//!   store is unaffected.

use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};
use tracing::warn;

use crate::error::Result;
use crate::reactive::{Path, PathHandle, Subscription};

/// The kind of element a binding drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// Plain text content.
    Text,
    /// Markup content.
    Html,
    /// A named attribute.
    Attribute(String),
    /// A named style property.
    Style(String),
    /// Free-text input.
    TextInput,
    /// Range or number input; values are numbers.
    NumberInput,
    /// Checkbox; values are booleans.
    Checkbox,
    /// Push button; pressed while held.
    Button,
    /// Drop-down selection.
    Select,
    /// Multi-line text input.
    TextArea,
    /// Read-only output element.
    Output,
    /// Group of radio buttons; the value is the checked option's value.
    RadioGroup,
}

impl TargetKind {
    /// Whether element changes flow back into the store.
    pub fn accepts_input(&self) -> bool {
        !matches!(
            self,
            TargetKind::Text | TargetKind::Html | TargetKind::Style(_) | TargetKind::Output
        )
    }

    /// Whether store changes flow out to the element.
    pub fn reflects_store(&self) -> bool {
        !matches!(self, TargetKind::Button)
    }
}

/// A host element that can be bound to a path.
pub trait BindTarget: Send + Sync {
    /// The kind of binding this element supports for `attr`, or `None` if
    /// it cannot be bound that way.
    fn resolve_kind(&self, attr: Option<&str>) -> Option<TargetKind>;

    /// The element's current value for `kind`: the input's value, the
    /// attribute, the checked state, the checked radio's value.
    fn read(&self, kind: &TargetKind) -> Option<Value>;

    /// Show `value` on the element.
    fn write(&self, kind: &TargetKind, value: &Value);

    /// Short description for diagnostics.
    fn describe(&self) -> String;
}

/// A live connection between a path and an element.
pub struct Binding {
    handle: PathHandle,
    target: Arc<dyn BindTarget>,
    kind: TargetKind,
    subscription: Subscription,
}

impl Binding {
    fn attach(handle: PathHandle, target: Arc<dyn BindTarget>, kind: TargetKind) -> Result<Self> {
        match &kind {
            TargetKind::Text | TargetKind::Html | TargetKind::Attribute(_) => {
                if let Some(value) = handle.get_untracked() {
                    target.write(&kind, &to_element(&kind, &value));
                }
            }
            TargetKind::Style(_) | TargetKind::Output => {}
            TargetKind::Button => {
                let value = target
                    .read(&kind)
                    .filter(is_present)
                    .unwrap_or(Value::Bool(false));
                handle.set(value)?;
            }
            TargetKind::RadioGroup => {
                handle.set(target.read(&kind).unwrap_or(Value::Null))?;
            }
            TargetKind::TextInput
            | TargetKind::NumberInput
            | TargetKind::Checkbox
            | TargetKind::Select
            | TargetKind::TextArea => {
                if let Some(value) = target.read(&kind) {
                    handle.set(from_element(&kind, value))?;
                }
            }
        }

        let subscription = if kind.reflects_store() {
            let store = handle.store().downgrade();
            let own = handle.path().clone();
            let sink = target.clone();
            let sink_kind = kind.clone();
            handle.subscribe(move |value: Option<&Value>, update: &Path| {
                let current;
                let value = if *update == own {
                    value
                } else {
                    current = store.upgrade().and_then(|s| s.at(&own).get_untracked());
                    current.as_ref()
                };
                let Some(value) = value else {
                    return;
                };
                let shown = to_element(&sink_kind, value);
                if sink.read(&sink_kind).as_ref() != Some(&shown) {
                    sink.write(&sink_kind, &shown);
                }
            })
        } else {
            Subscription::detached(handle.path().key())
        };

        Ok(Self {
            handle,
            target,
            kind,
            subscription,
        })
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Copy the element's value into the store. Call on input events (or
    /// attribute mutations for attribute bindings).
    pub fn on_input(&self) -> Result<()> {
        if !self.kind.accepts_input() {
            return Ok(());
        }
        match self.target.read(&self.kind) {
            Some(value) => self.handle.set(from_element(&self.kind, value)),
            None => Ok(()),
        }
    }

    /// Button pressed: the store holds the button's value, or `true`.
    pub fn on_press(&self) -> Result<()> {
        let value = self
            .target
            .read(&self.kind)
            .filter(is_present)
            .unwrap_or(Value::Bool(true));
        self.handle.set(value)
    }

    /// Button released: `null` for valued buttons, `false` otherwise.
    pub fn on_release(&self) -> Result<()> {
        let valued = self.target.read(&self.kind).is_some_and(|v| is_present(&v));
        self.handle
            .set(if valued { Value::Null } else { Value::Bool(false) })
    }

    /// Detach from the store. Idempotent.
    pub fn unbind(&self) {
        self.subscription.unsubscribe();
    }

    pub fn is_bound(&self) -> bool {
        self.subscription.is_active()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("path", self.handle.path())
            .field("kind", &self.kind)
            .field("target", &self.target.describe())
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl PathHandle {
    /// Bind this path to `target`.
    ///
    /// Returns `Ok(None)` (after logging a warning) when the element cannot
    /// be bound with `attr`; the store is left untouched.
    pub fn bind(&self, target: Arc<dyn BindTarget>, attr: Option<&str>) -> Result<Option<Binding>> {
        let Some(kind) = target.resolve_kind(attr) else {
            warn!(
                path = %self.path(),
                target = %target.describe(),
                attr = attr.unwrap_or(""),
                "unsupported binding target"
            );
            return Ok(None);
        };
        Binding::attach(self.clone(), target, kind).map(Some)
    }
}

/// A non-empty element value.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Convert a store value into what the element displays.
fn to_element(kind: &TargetKind, value: &Value) -> Value {
    match kind {
        TargetKind::Checkbox => Value::Bool(*value == Value::Bool(true)),
        TargetKind::RadioGroup => value.clone(),
        _ => Value::String(crate::reactive::coerce(value)),
    }
}

/// Convert an element value into what the store holds.
fn from_element(kind: &TargetKind, value: Value) -> Value {
    match kind {
        TargetKind::NumberInput => {
            if value.is_number() {
                return value;
            }
            let parsed = match &value {
                Value::String(s) if s.trim().is_empty() => Some(0.0),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(|n| {
                    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                        Some(Number::from(n as i64))
                    } else {
                        Number::from_f64(n)
                    }
                })
                .map_or(Value::Null, Value::Number)
        }
        TargetKind::Checkbox => Value::Bool(matches!(value, Value::Bool(true))),
        _ => value,
    }
}
