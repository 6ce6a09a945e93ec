//! Soft memory budget for resident chunk textures
//!
//! The cache evicts eagerly on refcount, never on memory pressure, so the
//! budget only tracks the estimated resident size and warns when it goes over
//! the limit. The limit is a fraction of the memory available at startup,
//! minus a reserve for the rest of the system.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use sysinfo::System;

#[derive(Debug)]
pub struct MemoryBudget {
    resident: AtomicU64,
    peak: AtomicU64,
    limit: AtomicU64,
    /// Set while over the limit so the warning fires once per excursion
    over: AtomicBool,
}

impl MemoryBudget {
    /// Budget of `mem_fraction` of available memory after reserving `reserve_gb`
    pub fn new(mem_fraction: f64, reserve_gb: f64) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        let limit = Self::compute_limit(sys.available_memory(), mem_fraction, reserve_gb);

        info!(
            "MemoryBudget: available={} MB, limit={} MB ({}%)",
            sys.available_memory() / 1024 / 1024,
            limit / 1024 / 1024,
            (mem_fraction * 100.0) as u32
        );

        Self::with_limit(limit)
    }

    /// Fixed limit in bytes
    pub fn with_limit(limit: u64) -> Self {
        Self {
            resident: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            limit: AtomicU64::new(limit),
            over: AtomicBool::new(false),
        }
    }

    fn compute_limit(available: u64, mem_fraction: f64, reserve_gb: f64) -> u64 {
        let reserve = (reserve_gb.max(0.0) * 1024.0 * 1024.0 * 1024.0) as u64;
        let usable = available.saturating_sub(reserve);
        (usable as f64 * mem_fraction.clamp(0.0, 1.0)) as u64
    }

    pub fn add(&self, bytes: u64) {
        let resident = self.resident.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.peak.fetch_max(resident, Ordering::Relaxed);

        let limit = self.limit.load(Ordering::Relaxed);
        if resident > limit && !self.over.swap(true, Ordering::Relaxed) {
            warn!(
                "Chunk textures over memory budget: {} MB / {} MB",
                resident / 1024 / 1024,
                limit / 1024 / 1024
            );
        }
    }

    /// Saturating: never underflows on bookkeeping mismatches
    pub fn free(&self, bytes: u64) {
        let prev = self
            .resident
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                Some(cur.saturating_sub(bytes))
            })
            .unwrap_or(0);
        if prev.saturating_sub(bytes) <= self.limit.load(Ordering::Relaxed) {
            self.over.store(false, Ordering::Relaxed);
        }
    }

    pub fn resident(&self) -> u64 {
        self.resident.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }

    pub fn limit(&self) -> u64 {
        self.limit.load(Ordering::Relaxed)
    }

    pub fn is_over(&self) -> bool {
        self.resident() > self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_and_saturation() {
        let budget = MemoryBudget::with_limit(1000);
        budget.add(600);
        budget.add(300);
        assert_eq!(budget.resident(), 900);
        assert!(!budget.is_over());

        budget.add(200);
        assert!(budget.is_over());
        assert_eq!(budget.peak(), 1100);

        budget.free(5000);
        assert_eq!(budget.resident(), 0);
        assert_eq!(budget.peak(), 1100);
    }

    #[test]
    fn test_limit_from_available_memory() {
        let gb = 1024 * 1024 * 1024;
        assert_eq!(MemoryBudget::compute_limit(8 * gb, 0.5, 2.0), 3 * gb);
        assert_eq!(MemoryBudget::compute_limit(gb, 0.5, 2.0), 0);
    }

    #[test]
    fn test_system_budget_starts_empty() {
        let budget = MemoryBudget::new(0.5, 1.0);
        assert_eq!(budget.resident(), 0);
    }
}
