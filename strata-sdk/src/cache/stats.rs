//! Cache statistics.

use serde::Serialize;
use std::fmt;

/// Point-in-time counters of one cache.
///
/// Counters are updated with relaxed atomics and may be slightly behind under
/// contention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hits over lookups, 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }

    /// Size over capacity.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={}/{} hits={} misses={} evictions={} hit_rate={:.1}%",
            self.size,
            self.capacity,
            self.hits,
            self.misses,
            self.evictions,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            evictions: 0,
            size: 5,
            capacity: 10,
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.fill_ratio(), 0.5);
        assert!(stats.to_string().contains("hit_rate=75.0%"));
    }
}
