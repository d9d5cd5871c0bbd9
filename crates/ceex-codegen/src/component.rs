//! Components: anything that renders from attributes and slots.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::RenderError;
use crate::safe::Safe;
use crate::value::{Assigns, Slots};

/// A value that can be called as `<.name>` or `<Mod.name>`.
///
/// `slots` always contains `inner_block`, plus one [`crate::Slot`] per named
/// slot used in the call.
pub trait Renderable: Send + Sync {
    fn render(&self, attrs: Assigns, slots: Slots) -> Result<Safe, RenderError>;
}

/// A component backed by a closure.
pub struct FnComponent<F>(F);

impl<F> FnComponent<F>
where
    F: Fn(Assigns, Slots) -> Result<Safe, RenderError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Renderable for FnComponent<F>
where
    F: Fn(Assigns, Slots) -> Result<Safe, RenderError> + Send + Sync,
{
    fn render(&self, attrs: Assigns, slots: Slots) -> Result<Safe, RenderError> {
        (self.0)(attrs, slots)
    }
}

/// Component registry, looked up by name at render time.
///
/// Local components are keyed by function name (`button`), remote ones by
/// their full path (`Ui.Forms.input`).
#[derive(Clone, Default)]
pub struct Components {
    entries: BTreeMap<String, Arc<dyn Renderable>>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, component: impl Renderable + 'static) {
        self.entries.insert(name.into(), Arc::new(component));
    }

    /// Builder form of [`Components::register`].
    pub fn with(mut self, name: impl Into<String>, component: impl Renderable + 'static) -> Self {
        self.register(name, component);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Renderable>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
