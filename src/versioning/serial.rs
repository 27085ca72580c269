use std::collections::HashMap;

use crate::models::UnitName;

/// Serial following `last`, or 1 when nothing has been assigned yet.
pub fn next_after(last: Option<i64>) -> i64 {
    last.map_or(1, |n| n + 1)
}

/// Remembers the last serial handed out per (unit, year) during one batch so
/// later entries skip the index scan.
#[derive(Debug, Default)]
pub struct SerialAllocator {
    last_assigned: HashMap<(UnitName, i64), i64>,
}

impl SerialAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_assigned(&self, unit: UnitName, year: i64) -> Option<i64> {
        self.last_assigned.get(&(unit, year)).copied()
    }

    pub fn record(&mut self, unit: UnitName, year: i64, serial: i64) {
        self.last_assigned.insert((unit, year), serial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_after() {
        assert_eq!(next_after(None), 1);
        assert_eq!(next_after(Some(41)), 42);
    }

    #[test]
    fn test_allocator_tracks_each_pair_separately() {
        let mut allocator = SerialAllocator::new();
        assert_eq!(allocator.last_assigned(UnitName::ADC, 2026), None);

        allocator.record(UnitName::ADC, 2026, 3);
        allocator.record(UnitName::APP, 2026, 7);

        assert_eq!(allocator.last_assigned(UnitName::ADC, 2026), Some(3));
        assert_eq!(allocator.last_assigned(UnitName::APP, 2026), Some(7));
        assert_eq!(allocator.last_assigned(UnitName::ADC, 2025), None);
    }
}
