//! Fixed expense category catalog.

use std::fmt;

/// Identifier of a catalog category (1..=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(u8);

impl CategoryId {
    pub fn new(id: u8) -> Option<Self> {
        CATALOG.iter().any(|c| c.id.0 == id).then_some(Self(id))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn category(self) -> &'static Category {
        // Only constructible from catalog ids.
        &CATALOG[usize::from(self.0) - 1]
    }

    pub fn name(self) -> &'static str {
        self.category().name
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: &'static str,
}

impl Category {
    /// Label used in choice lists and plain-text menus ("6. Restaurante").
    pub fn label(&self) -> String {
        format!("{}. {}", self.id, self.name)
    }
}

pub const CATALOG: [Category; 8] = [
    Category { id: CategoryId(1), name: "Renta" },
    Category { id: CategoryId(2), name: "Credit card bill" },
    Category { id: CategoryId(3), name: "Medical bill" },
    Category { id: CategoryId(4), name: "Utility bill" },
    Category { id: CategoryId(5), name: "Car payment" },
    Category { id: CategoryId(6), name: "Restaurante" },
    Category { id: CategoryId(7), name: "Groceries & housekeeping" },
    Category { id: CategoryId(8), name: "Traveling" },
];

/// Resolve a user-supplied token ("6", " 6 ") to a catalog id.
pub fn lookup(token: &str) -> Option<CategoryId> {
    let token = token.trim();
    // Reject "06", "+6" and friends: only the exact numeral selects.
    if token.len() != 1 {
        return None;
    }
    token.parse::<u8>().ok().and_then(CategoryId::new)
}

pub fn ids() -> impl Iterator<Item = CategoryId> {
    CATALOG.iter().map(|c| c.id)
}
