//! Class-keyed collections and field masks held by the in-memory backend.

use std::collections::{HashMap, HashSet};

use docdouble_core::record::Record;

/// The records of one class, kept in creation order.
#[derive(Debug, Default, Clone)]
pub struct ClassCollection {
    records: HashMap<String, Record>,
    order: Vec<String>,
}

impl ClassCollection {
    pub fn get(&self, object_id: &str) -> Option<&Record> {
        self.records.get(object_id)
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.records.contains_key(object_id)
    }

    /// Stores `record` under `object_id`. A new id goes to the end of the
    /// creation order; an existing one keeps its position.
    pub fn insert(&mut self, object_id: String, record: Record) {
        if !self.records.contains_key(&object_id) {
            self.order.push(object_id.clone());
        }

        self.records.insert(object_id, record);
    }

    pub fn remove(&mut self, object_id: &str) -> Option<Record> {
        let removed = self.records.remove(object_id)?;
        self.order.retain(|id| id != object_id);

        Some(removed)
    }

    /// Iterates records in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every collection plus the per-class field masks.
#[derive(Debug, Default)]
pub struct StoreState {
    collections: HashMap<String, ClassCollection>,
    masks: HashMap<String, HashSet<String>>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a collection without materializing it.
    pub fn collection(&self, class_name: &str) -> Option<&ClassCollection> {
        self.collections.get(class_name)
    }

    /// Returns the collection for `class_name`, creating it empty on first use.
    pub fn collection_mut(&mut self, class_name: &str) -> &mut ClassCollection {
        self.collections
            .entry(class_name.to_string())
            .or_default()
    }

    /// Point lookup. Unknown classes read as empty.
    pub fn fetch(&self, class_name: &str, object_id: &str) -> Option<&Record> {
        self.collection(class_name)?.get(object_id)
    }

    /// Records of `class_name` in creation order. Unknown classes read as empty.
    pub fn records<'a>(&'a self, class_name: &str) -> impl Iterator<Item = &'a Record> + use<'a> {
        self.collection(class_name)
            .into_iter()
            .flat_map(ClassCollection::iter)
    }

    pub fn mask(&self, class_name: &str) -> Option<&HashSet<String>> {
        self.masks.get(class_name)
    }

    /// Returns the mask for `class_name`, creating it empty on first use.
    pub fn mask_mut(&mut self, class_name: &str) -> &mut HashSet<String> {
        self.masks
            .entry(class_name.to_string())
            .or_default()
    }

    /// Hides `fields` from every later response for `class_name`.
    pub fn record_masked<I>(&mut self, class_name: &str, fields: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut fields = fields.into_iter().peekable();

        if fields.peek().is_some() {
            self.mask_mut(class_name).extend(fields);
        }
    }

    /// Removes the masked fields of `class_name` from `record`.
    pub fn strip_masked(&self, class_name: &str, record: &mut Record) {
        if let Some(mask) = self.mask(class_name) {
            record.retain(|field, _| !mask.contains(field));
        }
    }

    /// Drops every collection and mask.
    pub fn clear(&mut self) {
        self.collections.clear();
        self.masks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.collections.values().all(ClassCollection::is_empty) && self.masks.is_empty()
    }
}
