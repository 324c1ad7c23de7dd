use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry in the shopping bag.
///
/// Products without size variants are tracked as a plain quantity; sized
/// products track a quantity per size label. The JSON form matches the
/// persisted `original_bag` audit format: a bare integer, or
/// `{"items_by_size": {"M": 1, "L": 2}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BagEntry {
    Bare(u32),
    Sized {
        items_by_size: BTreeMap<String, u32>,
    },
}

/// A flattened bag line, ready to be resolved against the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BagLine {
    pub product_id: String,
    pub size: Option<String>,
    pub quantity: u32,
}

/// The session-held shopping bag.
///
/// Keys are product identifiers rendered as strings. Invariants: every
/// quantity is positive, and a sized entry never carries an empty size map
/// (the whole item is removed instead).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bag {
    entries: BTreeMap<String, BagEntry>,
}

impl Bag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total number of units across all lines.
    pub fn product_count(&self) -> u32 {
        self.lines().iter().map(|line| line.quantity).sum()
    }

    pub fn get(&self, product_id: &str) -> Option<&BagEntry> {
        self.entries.get(product_id)
    }

    /// Adds `quantity` of a product, incrementing any existing entry.
    ///
    /// A sized add against a previously bare entry switches the item to the
    /// sized representation.
    pub fn add(&mut self, product_id: &str, quantity: u32, size: Option<&str>) {
        if quantity == 0 {
            return;
        }

        match size {
            Some(size) => {
                let sizes = match self.entries.get_mut(product_id) {
                    Some(BagEntry::Sized { items_by_size }) => items_by_size,
                    _ => {
                        self.entries.insert(
                            product_id.to_string(),
                            BagEntry::Sized {
                                items_by_size: BTreeMap::new(),
                            },
                        );
                        match self.entries.get_mut(product_id) {
                            Some(BagEntry::Sized { items_by_size }) => items_by_size,
                            _ => unreachable!("entry was just inserted as sized"),
                        }
                    }
                };
                let count = sizes.entry(size.to_string()).or_insert(0);
                *count = count.saturating_add(quantity);
            }
            None => match self.entries.get_mut(product_id) {
                Some(BagEntry::Bare(existing)) => *existing = existing.saturating_add(quantity),
                _ => {
                    self.entries
                        .insert(product_id.to_string(), BagEntry::Bare(quantity));
                }
            },
        }
    }

    /// Sets the targeted quantity exactly. Zero removes the entry; removing
    /// the last size removes the item entirely.
    pub fn adjust(&mut self, product_id: &str, quantity: u32, size: Option<&str>) {
        if quantity == 0 {
            self.remove(product_id, size);
            return;
        }

        match size {
            Some(size) => {
                if let Some(BagEntry::Sized { items_by_size }) = self.entries.get_mut(product_id) {
                    items_by_size.insert(size.to_string(), quantity);
                } else {
                    self.add(product_id, quantity, Some(size));
                }
            }
            None => {
                self.entries
                    .insert(product_id.to_string(), BagEntry::Bare(quantity));
            }
        }
    }

    /// Removes a product (or one of its sizes). Removing something that is
    /// already absent is a no-op, so callers may treat removal as idempotent.
    pub fn remove(&mut self, product_id: &str, size: Option<&str>) {
        match size {
            Some(size) => {
                if let Some(BagEntry::Sized { items_by_size }) = self.entries.get_mut(product_id) {
                    items_by_size.remove(size);
                    if items_by_size.is_empty() {
                        self.entries.remove(product_id);
                    }
                }
            }
            None => {
                self.entries.remove(product_id);
            }
        }
    }

    /// Flattens the bag into lines, expanding sized entries into one line
    /// per size.
    pub fn lines(&self) -> Vec<BagLine> {
        let mut lines = Vec::new();
        for (product_id, entry) in &self.entries {
            match entry {
                BagEntry::Bare(quantity) => lines.push(BagLine {
                    product_id: product_id.clone(),
                    size: None,
                    quantity: *quantity,
                }),
                BagEntry::Sized { items_by_size } => {
                    for (size, quantity) in items_by_size {
                        lines.push(BagLine {
                            product_id: product_id.clone(),
                            size: Some(size.clone()),
                            quantity: *quantity,
                        });
                    }
                }
            }
        }
        lines
    }

    /// Serializes the bag to its canonical JSON form (the `original_bag`
    /// audit/dedup format).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_bare_increments_existing_quantity() {
        let mut bag = Bag::new();
        bag.add("12", 2, None);
        bag.add("12", 3, None);

        assert_eq!(bag.get("12"), Some(&BagEntry::Bare(5)));
        assert_eq!(bag.product_count(), 5);
    }

    #[test]
    fn add_sized_tracks_quantities_per_size() {
        let mut bag = Bag::new();
        bag.add("12", 1, Some("M"));
        bag.add("12", 2, Some("L"));
        bag.add("12", 1, Some("M"));

        let lines = bag.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].size.as_deref(), Some("L"));
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[1].size.as_deref(), Some("M"));
        assert_eq!(lines[1].quantity, 2);
    }

    #[test]
    fn sized_add_switches_a_bare_entry_to_sized() {
        let mut bag = Bag::new();
        bag.add("12", 4, None);
        bag.add("12", 1, Some("S"));

        match bag.get("12") {
            Some(BagEntry::Sized { items_by_size }) => {
                assert_eq!(items_by_size.get("S"), Some(&1));
            }
            other => panic!("expected sized entry, got {:?}", other),
        }
    }

    #[test]
    fn add_saturates_instead_of_overflowing() {
        let mut bag = Bag::new();
        bag.add("12", u32::MAX, None);
        bag.add("12", 5, None);
        assert_eq!(bag.get("12"), Some(&BagEntry::Bare(u32::MAX)));

        bag.add("34", u32::MAX, Some("M"));
        bag.add("34", 1, Some("M"));
        match bag.get("34") {
            Some(BagEntry::Sized { items_by_size }) => {
                assert_eq!(items_by_size.get("M"), Some(&u32::MAX));
            }
            other => panic!("expected sized entry, got {:?}", other),
        }
    }

    #[test]
    fn adjust_sets_exact_quantity() {
        let mut bag = Bag::new();
        bag.add("12", 2, None);
        bag.adjust("12", 7, None);
        assert_eq!(bag.get("12"), Some(&BagEntry::Bare(7)));

        bag.add("34", 1, Some("M"));
        bag.adjust("34", 3, Some("M"));
        let lines = bag.lines();
        let m_line = lines.iter().find(|l| l.product_id == "34").unwrap();
        assert_eq!(m_line.quantity, 3);
    }

    #[test]
    fn adjust_to_zero_removes_exactly_that_size() {
        let mut bag = Bag::new();
        bag.add("12", 1, Some("M"));
        bag.add("12", 2, Some("L"));

        bag.adjust("12", 0, Some("M"));

        match bag.get("12") {
            Some(BagEntry::Sized { items_by_size }) => {
                assert!(!items_by_size.contains_key("M"));
                assert_eq!(items_by_size.get("L"), Some(&2));
            }
            other => panic!("expected sized entry, got {:?}", other),
        }
    }

    #[test]
    fn removing_the_last_size_removes_the_item() {
        let mut bag = Bag::new();
        bag.add("12", 1, Some("M"));
        bag.adjust("12", 0, Some("M"));

        assert!(bag.get("12").is_none());
        assert!(bag.is_empty());
    }

    #[test]
    fn remove_of_absent_item_is_a_noop() {
        let mut bag = Bag::new();
        bag.add("12", 2, None);

        bag.remove("99", None);
        bag.remove("12", Some("M"));
        bag.remove("99", Some("XL"));

        assert_eq!(bag.get("12"), Some(&BagEntry::Bare(2)));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn remove_twice_is_idempotent() {
        let mut bag = Bag::new();
        bag.add("12", 2, None);
        bag.remove("12", None);
        bag.remove("12", None);
        assert!(bag.is_empty());
    }

    #[test]
    fn json_round_trip_preserves_the_wire_format() {
        let mut bag = Bag::new();
        bag.add("12", 2, None);
        bag.add("34", 1, Some("M"));
        bag.add("34", 2, Some("L"));

        let json = bag.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"12":2,"34":{"items_by_size":{"L":2,"M":1}}}"#
        );

        let parsed = Bag::from_json(&json).unwrap();
        assert_eq!(parsed, bag);
    }

    #[test]
    fn empty_bag_serializes_to_empty_object() {
        let bag = Bag::new();
        assert_eq!(bag.to_json().unwrap(), "{}");
        assert!(Bag::from_json("{}").unwrap().is_empty());
    }

    #[test]
    fn lines_expand_sized_entries() {
        let mut bag = Bag::new();
        bag.add("12", 2, None);
        bag.add("34", 1, Some("M"));
        bag.add("34", 2, Some("L"));

        let lines = bag.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(bag.product_count(), 5);
    }
}
