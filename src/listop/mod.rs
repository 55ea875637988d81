//! Ordered, override-capable edit lists.
//!
//! A [`ListOp`] is a sparse override of an ordered collection, composable
//! against a weaker opinion. It is either *explicit* (fully replaces the
//! weaker list) or a combination of prepended and appended items plus a
//! deleted-items set.

use serde::{Deserialize, Serialize};

/// ListOp is an edit list over an ordered collection of items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: Deserialize<'de>"
))]
pub struct ListOp<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explicit: Option<Vec<T>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    prepended: Vec<T>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    appended: Vec<T>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deleted: Vec<T>,
}

impl<T> Default for ListOp<T> {
    fn default() -> Self {
        ListOp {
            explicit: None,
            prepended: Vec::new(),
            appended: Vec::new(),
            deleted: Vec::new(),
        }
    }
}

impl<T: Clone + PartialEq> ListOp<T> {
    /// Creates a new non-explicit, empty edit list.
    pub fn new() -> Self {
        ListOp::default()
    }

    /// Creates an explicit edit list that fully replaces weaker opinions.
    pub fn explicit(items: Vec<T>) -> Self {
        ListOp {
            explicit: Some(items),
            ..ListOp::default()
        }
    }

    /// Returns true if this list is in explicit mode.
    pub fn is_explicit(&self) -> bool {
        self.explicit.is_some()
    }

    /// Returns true if no edits of any kind are present.
    pub fn is_empty(&self) -> bool {
        self.explicit.is_none()
            && self.prepended.is_empty()
            && self.appended.is_empty()
            && self.deleted.is_empty()
    }

    pub fn explicit_items(&self) -> &[T] {
        self.explicit.as_deref().unwrap_or(&[])
    }

    pub fn prepended_items(&self) -> &[T] {
        &self.prepended
    }

    pub fn appended_items(&self) -> &[T] {
        &self.appended
    }

    pub fn deleted_items(&self) -> &[T] {
        &self.deleted
    }

    pub fn set_explicit_items(&mut self, items: Vec<T>) {
        self.explicit = Some(items);
        self.prepended.clear();
        self.appended.clear();
        self.deleted.clear();
    }

    pub fn set_prepended_items(&mut self, items: Vec<T>) {
        self.explicit = None;
        self.prepended = items;
    }

    pub fn set_appended_items(&mut self, items: Vec<T>) {
        self.explicit = None;
        self.appended = items;
    }

    pub fn set_deleted_items(&mut self, items: Vec<T>) {
        self.explicit = None;
        self.deleted = items;
    }

    /// Adds an item. Idempotent: a no-op if the item is already logically
    /// present. Adding a deleted item revives it into the appended list.
    pub fn add(&mut self, item: T) {
        if let Some(ref mut explicit) = self.explicit {
            if !explicit.contains(&item) {
                explicit.push(item);
            }
            return;
        }
        if self.prepended.contains(&item) || self.appended.contains(&item) {
            return;
        }
        self.deleted.retain(|i| *i != item);
        self.appended.push(item);
    }

    /// Prepends an item if not already present in the prepended list.
    pub fn prepend(&mut self, item: T) {
        if let Some(ref mut explicit) = self.explicit {
            if !explicit.contains(&item) {
                explicit.insert(0, item);
            }
            return;
        }
        if !self.prepended.contains(&item) {
            self.deleted.retain(|i| *i != item);
            self.prepended.push(item);
        }
    }

    /// Removes an item: strips it from the contributing sub-lists and, in
    /// non-explicit mode, records it in the deleted set so weaker opinions
    /// are suppressed too.
    pub fn remove(&mut self, item: &T) {
        match self.explicit {
            Some(ref mut explicit) => explicit.retain(|i| i != item),
            None => {
                self.prepended.retain(|i| i != item);
                self.appended.retain(|i| i != item);
                if !self.deleted.contains(item) {
                    self.deleted.push(item.clone());
                }
            }
        }
    }

    /// Strips an item from the explicit/prepended/appended sub-lists without
    /// touching the deleted set. Weaker opinions still contribute the item.
    pub fn erase_item_edits(&mut self, item: &T) {
        if let Some(ref mut explicit) = self.explicit {
            explicit.retain(|i| i != item);
        }
        self.prepended.retain(|i| i != item);
        self.appended.retain(|i| i != item);
    }

    /// Applies this edit list to a weaker composed list.
    pub fn apply_operations(&self, weaker: &[T]) -> Vec<T> {
        if let Some(ref explicit) = self.explicit {
            return explicit.clone();
        }
        let mut result: Vec<T> = Vec::with_capacity(weaker.len() + self.prepended.len() + self.appended.len());
        result.extend(self.prepended.iter().cloned());
        for item in weaker {
            if self.deleted.contains(item)
                || self.prepended.contains(item)
                || self.appended.contains(item)
            {
                continue;
            }
            result.push(item.clone());
        }
        for item in &self.appended {
            if !result.contains(item) {
                result.push(item.clone());
            }
        }
        result
    }

    /// Returns the items this edit list contributes with no weaker opinion.
    pub fn composed_items(&self) -> Vec<T> {
        self.apply_operations(&[])
    }

    /// Composes the current effective order and commits it as an explicit
    /// list, discarding the prepend/append/delete history.
    pub fn clear_and_make_explicit(&mut self) {
        let items = self.composed_items();
        self.set_explicit_items(items);
    }

    /// Deep-copies another edit list's sub-lists into this one.
    pub fn copy_items(&mut self, other: &ListOp<T>) {
        self.explicit = other.explicit.clone();
        self.prepended = other.prepended.clone();
        self.appended = other.appended.clone();
        self.deleted = other.deleted.clone();
    }
}
