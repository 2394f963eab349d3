//! Named source libraries.

use std::collections::HashMap;
use std::ops::Index;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LibraryId(u32);

/// A named grouping of source files. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    name: String,
}

impl Library {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owns every [`Library`] created during a load, keyed by name.
#[derive(Debug, Default)]
pub struct LibraryRegistry {
    libraries: Vec<Library>,
    by_name: HashMap<String, LibraryId>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the library called `name`, creating it on first reference.
    /// Returns `None` for an empty name.
    pub fn get_or_add(&mut self, name: &str) -> Option<LibraryId> {
        if name.is_empty() {
            return None;
        }
        if let Some(&id) = self.by_name.get(name) {
            return Some(id);
        }

        let id = LibraryId(self.libraries.len() as u32);
        self.libraries.push(Library {
            name: name.to_owned(),
        });
        self.by_name.insert(name.to_owned(), id);
        tracing::debug!(library = name, "created library");
        Some(id)
    }

    pub fn find(&self, name: &str) -> Option<LibraryId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LibraryId, &Library)> {
        self.libraries
            .iter()
            .enumerate()
            .map(|(i, lib)| (LibraryId(i as u32), lib))
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl Index<LibraryId> for LibraryRegistry {
    type Output = Library;

    fn index(&self, id: LibraryId) -> &Library {
        &self.libraries[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_add_is_keyed_by_name() {
        let mut libs = LibraryRegistry::new();
        let a = libs.get_or_add("rtl").unwrap();
        let b = libs.get_or_add("gates").unwrap();
        assert_ne!(a, b);
        assert_eq!(libs.get_or_add("rtl"), Some(a));
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[b].name(), "gates");
        assert_eq!(libs.find("gates"), Some(b));
    }

    #[test]
    fn empty_name_creates_nothing() {
        let mut libs = LibraryRegistry::new();
        assert_eq!(libs.get_or_add(""), None);
        assert!(libs.is_empty());
    }
}
