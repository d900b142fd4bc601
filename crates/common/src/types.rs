//! Core types for the taxi service

use serde::{Deserialize, Serialize};

/// Store-assigned row identifier
pub type EntityId = i64;

/// Default number of rows shown on one list page
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Car manufacturer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: EntityId,
    pub name: String,
    pub country: String,
}

/// Taxi driver (also the login identity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: EntityId,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub license_number: String,
    pub date_joined: i64,
    pub last_login: Option<i64>,
}

impl Driver {
    /// "First Last", falling back to the username when both are blank
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Driver reference as listed on a car
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSummary {
    pub id: EntityId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Car with its manufacturer and assigned drivers resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: EntityId,
    pub model: String,
    pub manufacturer: Manufacturer,
    pub drivers: Vec<DriverSummary>,
}

impl Car {
    pub fn has_driver(&self, driver_id: EntityId) -> bool {
        self.drivers.iter().any(|d| d.id == driver_id)
    }
}

/// Validated manufacturer fields ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewManufacturer {
    pub name: String,
    pub country: String,
}

/// Validated driver fields ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
    pub password_hash: String,
}

/// Validated car fields ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCar {
    pub model: String,
    pub manufacturer_id: EntityId,
    pub driver_ids: Vec<EntityId>,
}

/// Login session as stored (the token itself is never persisted)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token_hash: String,
    pub driver_id: EntityId,
    pub visits: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Search text plus page window for list views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

impl ListQuery {
    pub fn new(search: Option<String>, page: Option<u32>, per_page: u32) -> Self {
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            search,
            page: page.unwrap_or(1),
            per_page: per_page.max(1),
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Row offset of this page, or None when the page is outside `1..=num_pages`
    pub fn offset(&self, total: u64) -> Option<u64> {
        let num_pages = num_pages(total, self.per_page);
        if self.page == 0 || self.page > num_pages {
            return None;
        }
        Some(u64::from(self.page - 1) * u64::from(self.per_page))
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(None, None, DEFAULT_PAGE_SIZE)
    }
}

/// An empty result set still has one (empty) page.
fn num_pages(total: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    (total.div_ceil(per_page).max(1)).min(u64::from(u32::MAX)) as u32
}

/// One page of a list view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, query: &ListQuery, total: u64) -> Self {
        Self {
            items,
            number: query.page,
            num_pages: num_pages(total, query.per_page),
            total,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_offsets() {
        let q = ListQuery::new(None, Some(2), 5);
        assert_eq!(q.offset(12), Some(5));
        assert_eq!(q.offset(5), None);

        // Empty lists still render page 1
        let q = ListQuery::new(None, None, 5);
        assert_eq!(q.offset(0), Some(0));

        let q = ListQuery::new(None, Some(0), 5);
        assert_eq!(q.offset(10), None);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let q = ListQuery::new(Some("   ".to_string()), None, 5);
        assert_eq!(q.search(), None);

        let q = ListQuery::new(Some(" bmw ".to_string()), None, 5);
        assert_eq!(q.search(), Some("bmw"));
    }

    #[test]
    fn test_page_navigation() {
        let q = ListQuery::new(None, Some(2), 5);
        let page = Page::new(vec![1, 2, 3, 4, 5], &q, 11);
        assert_eq!(page.num_pages, 3);
        assert!(page.has_previous());
        assert!(page.has_next());
        assert!(page.is_paginated());

        let q = ListQuery::default();
        let page: Page<i32> = Page::new(vec![], &q, 0);
        assert_eq!(page.num_pages, 1);
        assert!(!page.has_next());
        assert!(!page.is_paginated());
    }

    #[test]
    fn test_driver_full_name() {
        let mut driver = Driver {
            id: 1,
            username: "jdoe".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            license_number: "ABC12345".to_string(),
            date_joined: 0,
            last_login: None,
        };
        assert_eq!(driver.full_name(), "jdoe");

        driver.first_name = "John".to_string();
        driver.last_name = "Doe".to_string();
        assert_eq!(driver.full_name(), "John Doe");
    }
}
