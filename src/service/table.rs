//! A generic array-indexed table with a freelist and generation counters, used for the
//! kernel-visible file-handle IDs this filesystem hands out from Open/Opendir. Keeping IDs as
//! compact integers, recycled through the freelist, means invalidation can be expressed as an
//! (index, generation) pair rather than an ever-growing counter.

/// An occupied slot: a generation bumped every time the slot is reused, plus the value.
struct Slot<T> {
    generation: u32,
    value: T,
}

/// Packs an (index, generation) pair into the single `u64` handle the kernel carries back on
/// every subsequent Read/Write/Release. Low 32 bits are the index, high 32 the generation.
fn pack(index: u32, generation: u32) -> u64 {
    ((generation as u64) << 32) | index as u64
}

fn unpack(handle: u64) -> (u32, u32) {
    (handle as u32, (handle >> 32) as u32)
}

pub struct SlotTable<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<u32>,
}

impl<T> SlotTable<T> {
    pub fn new() -> Self {
        SlotTable {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> u64 {
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(None);
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.slots[index as usize]
            .as_ref()
            .map(|s| s.generation.wrapping_add(1))
            .unwrap_or(1);
        self.slots[index as usize] = Some(Slot { generation, value });
        pack(index, generation)
    }

    pub fn get(&self, handle: u64) -> Option<&T> {
        let (index, generation) = unpack(handle);
        self.slots
            .get(index as usize)?
            .as_ref()
            .filter(|s| s.generation == generation)
            .map(|s| &s.value)
    }

    /// Removes and returns the slot's value if `handle` still names a live slot. A handle
    /// whose generation no longer matches (already removed, or the slot was recycled) is
    /// tolerated as a no-op: Release after a stale Forget race should not panic.
    pub fn remove(&mut self, handle: u64) -> Option<T> {
        let (index, generation) = unpack(handle);
        let slot = self.slots.get_mut(index as usize)?;
        if slot.as_ref().map(|s| s.generation) != Some(generation) {
            return None;
        }
        let value = slot.take().map(|s| s.value);
        self.free.push(index);
        value
    }
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_roundtrips() {
        let mut table = SlotTable::new();
        let h = table.insert("hello");
        assert_eq!(table.get(h), Some(&"hello"));
        assert_eq!(table.remove(h), Some("hello"));
        assert_eq!(table.get(h), None);
    }

    #[test]
    fn recycled_slot_gets_new_generation() {
        let mut table = SlotTable::new();
        let h1 = table.insert("a");
        table.remove(h1);
        let h2 = table.insert("b");
        assert_ne!(h1, h2, "recycled slot must not reuse the same handle");
        assert_eq!(table.get(h1), None, "stale handle must not resolve to the new occupant");
        assert_eq!(table.get(h2), Some(&"b"));
    }

    #[test]
    fn remove_of_stale_handle_is_a_no_op() {
        let mut table = SlotTable::new();
        let h1 = table.insert("a");
        table.remove(h1);
        let h2 = table.insert("b");
        assert_eq!(table.remove(h1), None);
        assert_eq!(table.get(h2), Some(&"b"));
    }
}
