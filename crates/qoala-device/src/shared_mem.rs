// =============================================================================
// Qoala Node Runtime - Shared-Memory Regions
// =============================================================================
// Table of Contents:
//   1. MemAddr - Opaque monotonic region identifier
//   2. RegionKind - Six guarded region kinds
//   3. SharedMemoryManager - Per-process region allocator
// =============================================================================
// Purpose: Typed scratch regions carrying arguments and results between
//          Host, Qnos and Netstack around a routine invocation. Every
//          region is append-once; reads/writes are guarded by both the
//          allocation and the declared kind.
// =============================================================================

use crate::error::SharedMemError;
use qoala_lang::value::Value;
use std::collections::HashMap;

// =============================================================================
// 1. MemAddr - Opaque monotonic region identifier
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemAddr(u64);

// =============================================================================
// 2. RegionKind - Six guarded region kinds
// =============================================================================

/// §3 names five kinds; §4.3's `rrcall` carries a sixth (`CallbackOut`) that
/// reuses the same guard semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    RequestIn,
    RequestOut,
    CallbackIn,
    CallbackOut,
    LocalRoutineIn,
    LocalRoutineOut,
}

// =============================================================================
// 3. SharedMemoryManager - Per-process region allocator
// =============================================================================

struct Region {
    kind: RegionKind,
    size: usize,
    slots: Vec<Option<i64>>,
}

/// One instance per `IqoalaProcess`. Addresses are monotone for the
/// lifetime of the manager and never reused, matching §8's round-trip and
/// boundary invariants.
#[derive(Default)]
pub struct SharedMemoryManager {
    regions: HashMap<MemAddr, Region>,
    next_addr: u64,
}

impl SharedMemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, kind: RegionKind, size: usize) -> MemAddr {
        let addr = MemAddr(self.next_addr);
        self.next_addr += 1;
        self.regions.insert(
            addr,
            Region {
                kind,
                size,
                slots: vec![None; size],
            },
        );
        addr
    }

    pub fn allocate_request_in(&mut self, size: usize) -> MemAddr {
        self.allocate(RegionKind::RequestIn, size)
    }
    pub fn allocate_request_out(&mut self, size: usize) -> MemAddr {
        self.allocate(RegionKind::RequestOut, size)
    }
    pub fn allocate_callback_in(&mut self, size: usize) -> MemAddr {
        self.allocate(RegionKind::CallbackIn, size)
    }
    pub fn allocate_callback_out(&mut self, size: usize) -> MemAddr {
        self.allocate(RegionKind::CallbackOut, size)
    }
    pub fn allocate_local_routine_in(&mut self, size: usize) -> MemAddr {
        self.allocate(RegionKind::LocalRoutineIn, size)
    }
    pub fn allocate_local_routine_out(&mut self, size: usize) -> MemAddr {
        self.allocate(RegionKind::LocalRoutineOut, size)
    }

    fn region(&self, addr: MemAddr, expected: RegionKind) -> Result<&Region, SharedMemError> {
        let region = self.regions.get(&addr).ok_or(SharedMemError::NotAllocated(addr))?;
        if region.kind != expected {
            return Err(SharedMemError::IllegalRegion(addr));
        }
        Ok(region)
    }

    fn region_mut(&mut self, addr: MemAddr, expected: RegionKind) -> Result<&mut Region, SharedMemError> {
        let region = self.regions.get_mut(&addr).ok_or(SharedMemError::NotAllocated(addr))?;
        if region.kind != expected {
            return Err(SharedMemError::IllegalRegion(addr));
        }
        Ok(region)
    }

    fn write(&mut self, addr: MemAddr, kind: RegionKind, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        let region = self.region_mut(addr, kind)?;
        if offset + data.len() > region.size {
            return Err(SharedMemError::OutOfBounds);
        }
        for (i, value) in data.iter().enumerate() {
            region.slots[offset + i] = Some(*value);
        }
        Ok(())
    }

    fn read(&self, addr: MemAddr, kind: RegionKind, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        let region = self.region(addr, kind)?;
        if offset + len > region.size {
            return Err(SharedMemError::OutOfBounds);
        }
        Ok(region.slots[offset..offset + len]
            .iter()
            .map(|s| s.unwrap_or(0))
            .collect())
    }

    pub fn write_request_in(&mut self, addr: MemAddr, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        self.write(addr, RegionKind::RequestIn, data, offset)
    }
    pub fn read_request_in(&self, addr: MemAddr, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        self.read(addr, RegionKind::RequestIn, len, offset)
    }

    pub fn write_request_out(&mut self, addr: MemAddr, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        self.write(addr, RegionKind::RequestOut, data, offset)
    }
    pub fn read_request_out(&self, addr: MemAddr, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        self.read(addr, RegionKind::RequestOut, len, offset)
    }

    pub fn write_callback_in(&mut self, addr: MemAddr, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        self.write(addr, RegionKind::CallbackIn, data, offset)
    }
    pub fn read_callback_in(&self, addr: MemAddr, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        self.read(addr, RegionKind::CallbackIn, len, offset)
    }

    pub fn write_callback_out(&mut self, addr: MemAddr, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        self.write(addr, RegionKind::CallbackOut, data, offset)
    }
    pub fn read_callback_out(&self, addr: MemAddr, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        self.read(addr, RegionKind::CallbackOut, len, offset)
    }

    pub fn write_local_routine_in(&mut self, addr: MemAddr, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        self.write(addr, RegionKind::LocalRoutineIn, data, offset)
    }
    pub fn read_local_routine_in(&self, addr: MemAddr, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        self.read(addr, RegionKind::LocalRoutineIn, len, offset)
    }

    pub fn write_local_routine_out(&mut self, addr: MemAddr, data: &[i64], offset: usize) -> Result<(), SharedMemError> {
        self.write(addr, RegionKind::LocalRoutineOut, data, offset)
    }
    pub fn read_local_routine_out(&self, addr: MemAddr, len: usize, offset: usize) -> Result<Vec<i64>, SharedMemError> {
        self.read(addr, RegionKind::LocalRoutineOut, len, offset)
    }

    /// Writes a `Value` at `offset`, flattening vectors across consecutive
    /// slots.
    pub fn write_value(
        &mut self,
        addr: MemAddr,
        kind: RegionKind,
        value: &Value,
        offset: usize,
    ) -> Result<(), SharedMemError> {
        self.write(addr, kind, &value.to_words(), offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_roundtrip() {
        let mut mgr = SharedMemoryManager::new();
        let addr = mgr.allocate_local_routine_out(4);
        mgr.write_local_routine_out(addr, &[1, 2, 3], 0).unwrap();
        assert_eq!(mgr.read_local_routine_out(addr, 3, 0).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_wrong_kind_is_illegal_region() {
        let mut mgr = SharedMemoryManager::new();
        let addr = mgr.allocate_local_routine_out(4);
        assert_eq!(
            mgr.read_request_out(addr, 1, 0),
            Err(SharedMemError::IllegalRegion(addr))
        );
    }

    #[test]
    fn test_out_of_bounds_read() {
        let mut mgr = SharedMemoryManager::new();
        let addr = mgr.allocate_request_out(2);
        assert_eq!(mgr.read_request_out(addr, 3, 0), Err(SharedMemError::OutOfBounds));
    }

    #[test]
    fn test_addresses_are_monotone_and_never_reused() {
        let mut mgr = SharedMemoryManager::new();
        let a1 = mgr.allocate_request_in(1);
        let a2 = mgr.allocate_request_in(1);
        assert!(a2.0 > a1.0);
    }

    #[test]
    fn test_unallocated_address_fails() {
        let mgr = SharedMemoryManager::new();
        let addr = MemAddr(99);
        assert_eq!(mgr.read_request_out(addr, 1, 0), Err(SharedMemError::NotAllocated(addr)));
    }
}
