use std::fmt;
use std::sync::Arc;

pub type ActionHandler<R> = Arc<dyn Fn(&R) + Send + Sync>;
pub type ActionPredicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// A per-row command. The table invokes it with the selected row and knows
/// nothing about its effects.
pub struct RowAction<R> {
    pub key: String,
    pub label: String,
    pub icon: String,
    handler: ActionHandler<R>,
    visible: Option<ActionPredicate<R>>,
}

impl<R> RowAction<R> {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        icon: impl Into<String>,
        handler: impl Fn(&R) + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            icon: icon.into(),
            handler: Arc::new(handler),
            visible: None,
        }
    }

    /// Only offer the action for rows accepted by `predicate`.
    pub fn with_visible(mut self, predicate: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        self.visible = Some(Arc::new(predicate));
        self
    }

    pub fn is_visible(&self, row: &R) -> bool {
        self.visible.as_ref().is_none_or(|p| p(row))
    }

    pub fn invoke(&self, row: &R) {
        (self.handler)(row)
    }
}

impl<R> Clone for RowAction<R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            label: self.label.clone(),
            icon: self.icon.clone(),
            handler: Arc::clone(&self.handler),
            visible: self.visible.clone(),
        }
    }
}

impl<R> fmt::Debug for RowAction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowAction")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("icon", &self.icon)
            .finish()
    }
}
