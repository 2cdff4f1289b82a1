//! The process-wide "currently selected media" register.
//!
//! Held in memory only; a restart always starts with nothing selected.

use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct SelectionRegister {
    current: RwLock<Option<String>>,
}

impl SelectionRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the selection, replacing whatever was selected before.
    /// The name is not checked against the media collection.
    pub fn select<T: Into<String>>(&self, name: T) {
        let name = name.into();
        debug!("Selecting {}", name);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(name);
    }

    /// Clears the selection, returning what was selected.
    pub fn deselect(&self) -> Option<String> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.take()
    }

    pub fn read(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clears the selection only if it currently equals `name`.
    /// Returns whether it was cleared.
    pub fn clear_if(&self, name: &str) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.as_deref() == Some(name) {
            *current = None;
            debug!("Cleared selection of {}", name);
            true
        } else {
            false
        }
    }
}
