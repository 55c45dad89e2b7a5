//! Object registry.
//!
//! A flat, ordered table of data objects built once at startup. Lookups are
//! linear scans in declaration order and return the first exact match.
//!
//! # Concurrency contract
//!
//! The registry borrows object storage through `Cell`/`RefCell`, so it is
//! neither `Send` nor `Sync`. At most one handler call may touch the registry
//! at a time, and the embedder must not mutate object values while a call is
//! in progress. Keep the registry on a single thread (an event loop or a
//! dedicated device thread) and route every request and every sensor update
//! through it.

use crate::error::RegistryError;
use crate::object::{DataObject, Value, CATEGORY_SHIFT};

/// Largest number of categories the 4-bit id field can address.
pub const MAX_CATEGORIES: usize = 15;

/// Closed table of data objects plus the category-name table.
#[derive(Debug)]
pub struct Registry<'a> {
    objects: Vec<DataObject<'a>>,
    categories: Vec<&'a str>,
}

impl<'a> Registry<'a> {
    /// Builds a registry, rejecting duplicate names or ids, empty names and
    /// string objects without capacity.
    pub fn new(objects: Vec<DataObject<'a>>) -> Result<Self, RegistryError> {
        for (index, object) in objects.iter().enumerate() {
            if object.name.is_empty() {
                return Err(RegistryError::EmptyName { id: object.id });
            }
            if let Value::Str { capacity: 0, .. } = object.value {
                return Err(RegistryError::ZeroCapacity {
                    name: object.name.to_string(),
                });
            }
            for earlier in &objects[..index] {
                if earlier.id == object.id {
                    return Err(RegistryError::DuplicateId { id: object.id });
                }
                if earlier.name == object.name {
                    return Err(RegistryError::DuplicateName {
                        name: object.name.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            objects,
            categories: Vec::new(),
        })
    }

    /// Sets the category-name table. The name at index `i` is category `i + 1`.
    pub fn with_categories(mut self, names: &[&'a str]) -> Result<Self, RegistryError> {
        if names.len() > MAX_CATEGORIES {
            return Err(RegistryError::TooManyCategories {
                count: names.len(),
                max: MAX_CATEGORIES,
            });
        }
        for (index, name) in names.iter().enumerate() {
            if names[..index].contains(name) {
                return Err(RegistryError::DuplicateCategory {
                    name: name.to_string(),
                });
            }
        }
        self.categories = names.to_vec();
        Ok(self)
    }

    /// Finds an object by exact name.
    ///
    /// String equality compares lengths first, so `foo` never matches
    /// `fooBar` and vice versa.
    pub fn find_by_name(&self, name: &str) -> Option<&DataObject<'a>> {
        self.objects.iter().find(|object| object.name == name)
    }

    pub fn find_by_id(&self, id: u16) -> Option<&DataObject<'a>> {
        self.objects.iter().find(|object| object.id == id)
    }

    /// Resolves a category name to its id mask, `(index + 1) << 12`.
    pub fn category_mask(&self, name: &str) -> Option<u16> {
        self.categories
            .iter()
            .position(|category| *category == name)
            .map(|index| ((index + 1) as u16) << CATEGORY_SHIFT)
    }

    pub fn categories(&self) -> &[&'a str] {
        &self.categories
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataObject<'a>> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<'r, 'a> IntoIterator for &'r Registry<'a> {
    type Item = &'r DataObject<'a>;
    type IntoIter = std::slice::Iter<'r, DataObject<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Access;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_exact_name_matching() {
        let foo = Cell::new(1u16);
        let foo_bar = Cell::new(2u16);
        let registry = Registry::new(vec![
            DataObject::new(0x1001, "fooBar", Access::READ, Value::U16(&foo_bar)),
            DataObject::new(0x1002, "foo", Access::READ, Value::U16(&foo)),
        ])
        .unwrap();

        assert_eq!(registry.find_by_name("foo").unwrap().id, 0x1002);
        assert_eq!(registry.find_by_name("fooBar").unwrap().id, 0x1001);
        assert!(registry.find_by_name("fo").is_none());
        assert!(registry.find_by_name("fooBarBaz").is_none());
        assert!(registry.find_by_name("").is_none());
    }

    #[test]
    fn test_find_by_id() {
        let a = Cell::new(0i32);
        let registry =
            Registry::new(vec![DataObject::new(7, "a", Access::READ, Value::I32(&a))]).unwrap();
        assert_eq!(registry.find_by_id(7).unwrap().name, "a");
        assert!(registry.find_by_id(8).is_none());
    }

    #[test]
    fn test_rejects_duplicates() {
        let a = Cell::new(0u16);
        let result = Registry::new(vec![
            DataObject::new(1, "a", Access::READ, Value::U16(&a)),
            DataObject::new(1, "b", Access::READ, Value::U16(&a)),
        ]);
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateId { id: 1 });

        let result = Registry::new(vec![
            DataObject::new(1, "a", Access::READ, Value::U16(&a)),
            DataObject::new(2, "a", Access::READ, Value::U16(&a)),
        ]);
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateName { ref name }) if name == "a"
        ));
    }

    #[test]
    fn test_rejects_bad_objects() {
        let a = Cell::new(0u16);
        let s = RefCell::new(String::new());
        assert!(matches!(
            Registry::new(vec![DataObject::new(1, "", Access::READ, Value::U16(&a))]),
            Err(RegistryError::EmptyName { id: 1 })
        ));
        assert!(matches!(
            Registry::new(vec![DataObject::new(
                1,
                "s",
                Access::READ,
                Value::string(&s, 0)
            )]),
            Err(RegistryError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn test_categories() {
        let registry = Registry::new(Vec::new())
            .unwrap()
            .with_categories(&["info", "conf", "input"])
            .unwrap();
        assert_eq!(registry.category_mask("info"), Some(0x1000));
        assert_eq!(registry.category_mask("input"), Some(0x3000));
        assert_eq!(registry.category_mask("inf"), None);
        assert_eq!(registry.category_mask("information"), None);
        assert_eq!(registry.categories().len(), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_category_table_limits() {
        let names = [
            "c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8", "c9", "c10", "c11", "c12", "c13",
            "c14", "c15", "c16",
        ];
        let result = Registry::new(Vec::new()).unwrap().with_categories(&names);
        assert!(matches!(
            result,
            Err(RegistryError::TooManyCategories { count: 16, max: 15 })
        ));

        let result = Registry::new(Vec::new())
            .unwrap()
            .with_categories(&["a", "a"]);
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateCategory { .. })
        ));
    }

    #[test]
    fn test_iteration_keeps_declaration_order() {
        let a = Cell::new(0u16);
        let registry = Registry::new(vec![
            DataObject::new(3, "c", Access::READ, Value::U16(&a)),
            DataObject::new(1, "a", Access::READ, Value::U16(&a)),
            DataObject::new(2, "b", Access::READ, Value::U16(&a)),
        ])
        .unwrap();
        let names: Vec<&str> = registry.iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert_eq!((&registry).into_iter().count(), 3);
        assert_eq!(registry.len(), 3);
    }
}
