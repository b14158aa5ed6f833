// src/surface.rs
//! Surface types (physical material classes: rock, wood, water...).
//!
//! Materials only store the numeric id. Id 0 means "no surface type".

use std::collections::HashMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceType {
    pub id: i32,
    pub name: String,
}

/// Lookup service for surface types. `context` names the material asking,
/// for diagnostics.
pub trait SurfaceTypeRegistry: Send + Sync {
    fn surface_type_by_name(&self, name: &str, context: &str) -> Option<SurfaceType>;
    fn surface_type(&self, id: i32, context: &str) -> Option<SurfaceType>;
}

#[derive(Default)]
struct Tables {
    by_name: HashMap<String, SurfaceType>,
    by_id: HashMap<i32, SurfaceType>,
    next_id: i32,
}

/// In-memory registry. Names are case-insensitive; ids start at 1.
#[derive(Default)]
pub struct SurfaceTypeTable {
    tables: RwLock<Tables>,
}

impl SurfaceTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, returning its id. Re-registering returns the
    /// existing id.
    pub fn register(&self, name: &str) -> i32 {
        let key = name.to_ascii_lowercase();
        let mut t = self.tables.write();
        if let Some(existing) = t.by_name.get(&key) {
            return existing.id;
        }
        t.next_id += 1;
        let st = SurfaceType {
            id: t.next_id,
            name: name.to_string(),
        };
        t.by_id.insert(st.id, st.clone());
        t.by_name.insert(key, st.clone());
        log::debug!("surface type '{}' registered as {}", name, st.id);
        st.id
    }

    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SurfaceTypeRegistry for SurfaceTypeTable {
    fn surface_type_by_name(&self, name: &str, context: &str) -> Option<SurfaceType> {
        let found = self
            .tables
            .read()
            .by_name
            .get(&name.to_ascii_lowercase())
            .cloned();
        if found.is_none() && !name.is_empty() {
            log::warn!("unknown surface type '{}' (material '{}')", name, context);
        }
        found
    }

    fn surface_type(&self, id: i32, context: &str) -> Option<SurfaceType> {
        let found = self.tables.read().by_id.get(&id).cloned();
        if found.is_none() && id != 0 {
            log::warn!("unknown surface type id {} (material '{}')", id, context);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_and_case_insensitive() {
        let table = SurfaceTypeTable::new();
        let rock = table.register("mat_rock");
        let wood = table.register("mat_wood");
        assert_eq!(rock, 1);
        assert_eq!(wood, 2);
        assert_eq!(table.register("MAT_ROCK"), rock);
        assert_eq!(table.len(), 2);

        let st = table.surface_type_by_name("Mat_Rock", "test").unwrap();
        assert_eq!(st.id, rock);
        assert_eq!(st.name, "mat_rock");
        assert_eq!(table.surface_type(wood, "test").unwrap().name, "mat_wood");
    }

    #[test]
    fn misses_are_none() {
        let table = SurfaceTypeTable::new();
        assert!(table.is_empty());
        assert!(table.surface_type_by_name("mat_lava", "test").is_none());
        assert!(table.surface_type(0, "test").is_none());
    }
}
