//! Non-destructive date restriction over collections of timestamped items.
//!
//! A [`Window`] keeps its full collection untouched and tracks the visible
//! subset as indices. Restricting always starts from the full collection, so
//! successive restrictions never compound. Items that are collections in
//! their own right implement [`Nestable`] so restriction reaches all the way
//! down.

use crate::model::DateInterval;
use serde::{Serialize, Serializer};

pub trait InRange {
    fn in_range(&self, interval: &DateInterval) -> bool;
}

/// Capability for items that carry a windowed collection of their own.
/// Leaf items use the default no-op methods.
pub trait Nestable {
    fn limit_to_range(&mut self, _interval: &DateInterval) {}

    fn include_all(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window<T> {
    items: Vec<T>,
    interval: DateInterval,
    visible: Option<Vec<usize>>,
}

impl<T> Default for Window<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            interval: DateInterval::default(),
            visible: None,
        }
    }
}

impl<T: InRange + Nestable> Window<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            items,
            interval: DateInterval::default(),
            visible: None,
        }
    }

    pub fn limit_to_range(&mut self, interval: &DateInterval) {
        if !interval.is_bounded() {
            self.include_all();
            return;
        }
        for item in &mut self.items {
            item.limit_to_range(interval);
        }
        let visible = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.in_range(interval))
            .map(|(idx, _)| idx)
            .collect();
        self.visible = Some(visible);
        self.interval = *interval;
    }

    pub fn include_all(&mut self) {
        for item in &mut self.items {
            item.include_all();
        }
        self.visible = None;
        self.interval = DateInterval::default();
    }

    pub fn is_limited(&self) -> bool {
        self.visible.is_some()
    }

    pub fn interval(&self) -> &DateInterval {
        &self.interval
    }

    /// Appends to the full collection and, when the item falls inside the
    /// active interval, to the visible view as well.
    pub fn add(&mut self, mut item: T) {
        let idx = self.items.len();
        if let Some(visible) = &mut self.visible {
            item.limit_to_range(&self.interval);
            if item.in_range(&self.interval) {
                visible.push(idx);
            }
        }
        self.items.push(item);
    }

    /// Mutates the item at `idx` in place and re-evaluates its visibility.
    pub fn modify<R>(&mut self, idx: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let item = self.items.get_mut(idx)?;
        let out = f(item);
        if let Some(visible) = &mut self.visible {
            let item = &mut self.items[idx];
            item.limit_to_range(&self.interval);
            let keep = item.in_range(&self.interval);
            match (visible.binary_search(&idx), keep) {
                (Ok(pos), false) => {
                    visible.remove(pos);
                }
                (Err(pos), true) => visible.insert(pos, idx),
                _ => {}
            }
        }
        Some(out)
    }

    pub fn data(&self) -> Vec<&T> {
        self.iter().collect()
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match &self.visible {
            Some(visible) => Box::new(visible.iter().map(move |&idx| &self.items[idx])),
            None => Box::new(self.items.iter()),
        }
    }

    pub fn full(&self) -> &[T] {
        &self.items
    }

    pub fn position(&self, pred: impl Fn(&T) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.items.get(idx)
    }

    pub fn len(&self) -> usize {
        match &self.visible {
            Some(visible) => visible.len(),
            None => self.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn copy(&self) -> Self
    where
        T: Clone,
    {
        self.clone()
    }
}

impl<T: InRange + Nestable> InRange for Window<T> {
    fn in_range(&self, interval: &DateInterval) -> bool {
        self.items.iter().any(|item| item.in_range(interval))
    }
}

impl<T: InRange + Nestable> Nestable for Window<T> {
    fn limit_to_range(&mut self, interval: &DateInterval) {
        Window::limit_to_range(self, interval);
    }

    fn include_all(&mut self) {
        Window::include_all(self);
    }
}

impl<T: InRange + Nestable> FromIterator<T> for Window<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_items(iter.into_iter().collect())
    }
}

impl<T: Serialize + InRange + Nestable> Serialize for Window<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
