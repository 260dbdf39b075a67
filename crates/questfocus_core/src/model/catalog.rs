//! Static focus-store catalog.
//!
//! Reference data only; ownership lives in `Ledger::purchased_items`.

use serde::Serialize;

/// One purchasable store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreItem {
    pub id: &'static str,
    pub name: &'static str,
    pub price: u32,
    pub description: &'static str,
}

pub const STORE_CATALOG: &[StoreItem] = &[
    StoreItem {
        id: "flame",
        name: "Flame Focus",
        price: 50,
        description: "Burn through tasks with fiery determination",
    },
    StoreItem {
        id: "target",
        name: "Bullseye",
        price: 75,
        description: "Hit your goals with precision",
    },
    StoreItem {
        id: "zap",
        name: "Lightning",
        price: 100,
        description: "Electrify your productivity",
    },
    StoreItem {
        id: "heart",
        name: "Passion",
        price: 80,
        description: "Work with love and dedication",
    },
    StoreItem {
        id: "star",
        name: "Superstar",
        price: 120,
        description: "Shine bright in all your tasks",
    },
    StoreItem {
        id: "trophy",
        name: "Champion",
        price: 150,
        description: "Achieve victory in every challenge",
    },
    StoreItem {
        id: "crown",
        name: "Royalty",
        price: 200,
        description: "Rule your productivity kingdom",
    },
];

/// Looks up a catalog entry by id.
pub fn find_item(item_id: &str) -> Option<&'static StoreItem> {
    STORE_CATALOG.iter().find(|item| item.id == item_id)
}

#[cfg(test)]
mod tests {
    use super::{find_item, STORE_CATALOG};
    use std::collections::HashSet;

    #[test]
    fn catalog_ids_are_unique_and_prices_positive() {
        let ids: HashSet<_> = STORE_CATALOG.iter().map(|item| item.id).collect();
        assert_eq!(ids.len(), STORE_CATALOG.len());
        assert!(STORE_CATALOG.iter().all(|item| item.price > 0));
    }

    #[test]
    fn find_item_by_id() {
        assert_eq!(find_item("flame").map(|item| item.price), Some(50));
        assert!(find_item("dragon").is_none());
    }
}
