// src/registry.rs
//! Live material registry.
//! - Handles: compact u32 with an 8-bit generation
//! - Entries hold `Weak` references; the registry never keeps a material alive
//! - Name index: xxh3 of the lowercase name
//! - Freed slots are reused from a free list; registering past the 24-bit
//!   index space is an error
//!
//! Materials register on construction and unregister from `Drop`. Never drop
//! a strong material reference while holding one of these locks: the last
//! drop re-enters `unregister`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};
use crate::material::Material;

/// Live material limit. The all-ones index is reserved for
/// [`MaterialHandle::invalid`].
pub const MAX_MATERIALS: usize = 0x00FF_FFFF;

// ---------- Handle type ----------
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct MaterialHandle(u32);

impl MaterialHandle {
    fn new(index: u32, gen: u8) -> Self {
        MaterialHandle((index & 0x00FF_FFFF) | ((gen as u32) << 24))
    }
    fn index(self) -> usize {
        (self.0 & 0x00FF_FFFF) as usize
    }
    fn gen(self) -> u8 {
        ((self.0 >> 24) & 0xFF) as u8
    }
    pub fn invalid() -> Self {
        MaterialHandle(u32::MAX)
    }
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
    pub(crate) fn raw(self) -> u32 {
        self.0
    }
    pub(crate) fn from_raw(raw: u32) -> Self {
        MaterialHandle(raw)
    }
}

struct Entry {
    material: Weak<Material>,
    name_hash: u64,
}

fn name_hash(name: &str) -> u64 {
    xxh3_64(name.to_ascii_lowercase().as_bytes())
}

pub struct MaterialRegistry {
    slab: RwLock<Vec<Option<Entry>>>,
    gens: RwLock<Vec<u8>>,
    // name hash -> slab indices
    names: RwLock<HashMap<u64, Vec<usize>>>,
    free: Mutex<Vec<usize>>,
    capacity: usize,
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::with_capacity(MAX_MATERIALS)
    }
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// At most `capacity` live materials (clamped to [`MAX_MATERIALS`]).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slab: RwLock::new(Vec::new()),
            gens: RwLock::new(Vec::new()),
            names: RwLock::new(HashMap::new()),
            free: Mutex::new(Vec::new()),
            capacity: capacity.min(MAX_MATERIALS),
        }
    }

    /// Track `material` under `name`. Called while the material is being
    /// constructed, so `material` does not upgrade yet.
    pub fn register(&self, material: Weak<Material>, name: &str) -> Result<MaterialHandle> {
        let hash = name_hash(name);
        let (idx, gen) = {
            let mut slab = self.slab.write();
            let mut gens = self.gens.write();
            let index = match self.free.lock().pop() {
                Some(i) => i,
                None => {
                    if slab.len() >= self.capacity {
                        return Err(Error::out_of_range("material registry", slab.len(), self.capacity));
                    }
                    slab.push(None);
                    gens.push(0u8);
                    slab.len() - 1
                }
            };
            gens[index] = gens[index].wrapping_add(1);
            slab[index] = Some(Entry {
                material,
                name_hash: hash,
            });
            (index, gens[index])
        };
        self.names.write().entry(hash).or_default().push(idx);
        Ok(MaterialHandle::new(idx as u32, gen))
    }

    pub fn unregister(&self, h: MaterialHandle) {
        if !h.is_valid() {
            return;
        }
        let idx = h.index();
        let removed = {
            let mut slab = self.slab.write();
            let gens = self.gens.read();
            if gens.get(idx) != Some(&h.gen()) {
                return;
            }
            let removed = slab.get_mut(idx).and_then(Option::take);
            if removed.is_some() {
                self.free.lock().push(idx);
            }
            removed
        };
        if let Some(entry) = removed {
            self.unindex(entry.name_hash, idx);
        }
    }

    /// Move `h` to a new name bucket.
    pub fn rename(&self, h: MaterialHandle, name: &str) {
        let hash = name_hash(name);
        let idx = h.index();
        let old = {
            let mut slab = self.slab.write();
            let gens = self.gens.read();
            if gens.get(idx) != Some(&h.gen()) {
                return;
            }
            match slab.get_mut(idx) {
                Some(Some(entry)) if entry.name_hash != hash => {
                    std::mem::replace(&mut entry.name_hash, hash)
                }
                _ => return,
            }
        };
        self.unindex(old, idx);
        self.names.write().entry(hash).or_default().push(idx);
    }

    fn unindex(&self, hash: u64, idx: usize) {
        let mut names = self.names.write();
        if let Some(bucket) = names.get_mut(&hash) {
            bucket.retain(|&i| i != idx);
            if bucket.is_empty() {
                names.remove(&hash);
            }
        }
    }

    pub fn get(&self, h: MaterialHandle) -> Option<Arc<Material>> {
        if !h.is_valid() {
            return None;
        }
        let idx = h.index();
        let slab = self.slab.read();
        let gens = self.gens.read();
        if gens.get(idx) != Some(&h.gen()) {
            return None;
        }
        slab.get(idx)?.as_ref()?.material.upgrade()
    }

    /// First live material named `name` (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Material>> {
        let candidates: Vec<Weak<Material>> = {
            let names = self.names.read();
            let slab = self.slab.read();
            names
                .get(&name_hash(name))
                .map(|bucket| {
                    bucket
                        .iter()
                        .filter_map(|&i| slab.get(i)?.as_ref().map(|e| e.material.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        candidates
            .iter()
            .filter_map(Weak::upgrade)
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }

    /// Strong references to every live material, in slot order.
    pub fn live(&self) -> Vec<Arc<Material>> {
        let weak: Vec<Weak<Material>> = self
            .slab
            .read()
            .iter()
            .flatten()
            .map(|e| e.material.clone())
            .collect();
        weak.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn len(&self) -> usize {
        self.slab.read().iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Rig;

    #[test]
    fn handles_encode_index_and_generation() {
        let h = MaterialHandle::new(5, 3);
        assert_eq!(h.index(), 5);
        assert_eq!(h.gen(), 3);
        assert!(h.is_valid());
        assert!(!MaterialHandle::invalid().is_valid());
    }

    #[test]
    fn materials_unregister_on_drop() {
        let rig = Rig::new();
        let registry = rig.ctx().registry();
        let before = registry.len();

        let rock = rig.manager.create_material("rock", Default::default());
        let handle = rock.handle();
        assert_eq!(registry.len(), before + 1);
        assert!(Arc::ptr_eq(&registry.get(handle).unwrap(), &rock));

        drop(rock);
        assert_eq!(registry.len(), before);
        assert!(registry.get(handle).is_none());
    }

    #[test]
    fn reused_slot_rejects_stale_handle() {
        let rig = Rig::new();
        let registry = rig.ctx().registry();
        let a = rig.manager.create_material("a", Default::default());
        let stale = a.handle();
        drop(a);
        let b = rig.manager.create_material("b", Default::default());
        assert_ne!(b.handle(), stale);
        assert!(registry.get(stale).is_none());
    }

    #[test]
    fn freed_slots_are_reused_and_capacity_is_enforced() {
        let registry = MaterialRegistry::with_capacity(2);
        let a = registry.register(Weak::new(), "a").unwrap();
        let b = registry.register(Weak::new(), "b").unwrap();
        assert!(registry
            .register(Weak::new(), "c")
            .unwrap_err()
            .is_out_of_range());

        registry.unregister(a);
        registry.unregister(a);
        let c = registry.register(Weak::new(), "c").unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert!(registry.register(Weak::new(), "d").is_err());

        registry.unregister(b);
        registry.unregister(c);
        assert!(registry.register(Weak::new(), "e").is_ok());
        assert!(registry.register(Weak::new(), "f").is_ok());
        assert!(registry.register(Weak::new(), "g").is_err());
    }

    #[test]
    fn capacity_never_reaches_the_invalid_index() {
        let registry = MaterialRegistry::with_capacity(usize::MAX);
        assert_eq!(registry.capacity, MAX_MATERIALS);
        assert!(MaterialHandle::new((MAX_MATERIALS - 1) as u32, u8::MAX).is_valid());
    }

    #[test]
    fn find_by_name_follows_renames() {
        let rig = Rig::new();
        let registry = rig.ctx().registry();
        let m = rig.manager.create_material("Materials/Rock", Default::default());
        assert!(registry.find_by_name("materials/rock").is_some());
        m.set_name("materials/wood");
        assert!(registry.find_by_name("materials/rock").is_none());
        assert!(Arc::ptr_eq(&registry.find_by_name("MATERIALS/WOOD").unwrap(), &m));
    }
}
