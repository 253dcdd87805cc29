//! Non-volatile byte store seam.
//!
//! Erased bytes read back as [`ERASED`]. The `smart_*` operations skip the
//! physical write when the cell already holds the wanted value.

/// Value of an erased cell; doubles as the "unset" sentinel for statistics.
pub const ERASED: u8 = 0xff;

pub trait NvStore {
    fn read_byte(&self, addr: usize) -> u8;

    /// Writes `value` unless already present. Returns true if a write happened.
    fn smart_update(&mut self, addr: usize, value: u8) -> bool;

    /// Erases the cell to [`ERASED`] unless already erased.
    fn smart_erase(&mut self, addr: usize) -> bool;

    /// Clears every bit not set in `mask` (cell becomes `old & mask`) without
    /// an erase cycle. Returns true if a write happened.
    fn smart_clear_bits(&mut self, addr: usize, mask: u8) -> bool;
}

/// RAM-backed store with wear counters, used on the host and in tests.
#[derive(Debug, Clone)]
pub struct MemStore {
    cells: Vec<u8>,
    writes: u32,
    erases: u32,
}

impl MemStore {
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![ERASED; size],
            writes: 0,
            erases: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Physical writes, including bit-clearing writes.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn erases(&self) -> u32 {
        self.erases
    }

    /// Out-of-range addresses behave like permanently erased cells.
    fn cell_mut(&mut self, addr: usize) -> Option<&mut u8> {
        self.cells.get_mut(addr)
    }
}

impl NvStore for MemStore {
    fn read_byte(&self, addr: usize) -> u8 {
        self.cells.get(addr).copied().unwrap_or(ERASED)
    }

    fn smart_update(&mut self, addr: usize, value: u8) -> bool {
        let Some(cell) = self.cell_mut(addr) else {
            return false;
        };
        if *cell == value {
            return false;
        }
        // A write that needs to set bits implies an erase first.
        let needs_erase = value & !*cell != 0;
        *cell = value;
        if needs_erase {
            self.erases += 1;
        }
        self.writes += 1;
        true
    }

    fn smart_erase(&mut self, addr: usize) -> bool {
        let Some(cell) = self.cell_mut(addr) else {
            return false;
        };
        if *cell == ERASED {
            return false;
        }
        *cell = ERASED;
        self.erases += 1;
        true
    }

    fn smart_clear_bits(&mut self, addr: usize, mask: u8) -> bool {
        let Some(cell) = self.cell_mut(addr) else {
            return false;
        };
        let value = *cell & mask;
        if *cell == value {
            return false;
        }
        *cell = value;
        self.writes += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_reads_erased() {
        let store = MemStore::new(4);
        assert_eq!(store.read_byte(0), ERASED);
        assert_eq!(store.read_byte(99), ERASED);
    }

    #[test]
    fn smart_update_skips_redundant_writes() {
        let mut store = MemStore::new(4);
        assert!(store.smart_update(1, 0x42));
        assert!(!store.smart_update(1, 0x42));
        assert_eq!(store.read_byte(1), 0x42);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn clear_bits_never_sets_bits() {
        let mut store = MemStore::new(1);
        store.smart_update(0, 0b0110_0110);
        let erases = store.erases();

        assert!(store.smart_clear_bits(0, 0b0011_1100));
        assert_eq!(store.read_byte(0), 0b0010_0100);
        assert!(!store.smart_clear_bits(0, 0xff));
        assert_eq!(store.erases(), erases);
    }

    #[test]
    fn smart_erase_reports_work_done() {
        let mut store = MemStore::new(2);
        assert!(!store.smart_erase(0));
        store.smart_update(0, 1);
        assert!(store.smart_erase(0));
        assert_eq!(store.read_byte(0), ERASED);
        assert!(!store.smart_update(7, 1));
    }
}
