//! Sparse little-endian memory image

use std::collections::BTreeMap;

use super::EvalError;

/// Mapped regions keyed by start address
#[derive(Debug, Clone, Default)]
pub struct Memory {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `len` zeroed bytes at `addr`
    ///
    /// Regions must not overlap.
    pub fn map(&mut self, addr: u64, len: usize) -> Result<(), EvalError> {
        let end = addr.checked_add(len as u64).ok_or_else(|| {
            EvalError::new(format!("Region at 0x{addr:x} runs past the end of the address space"))
        })?;
        let overlaps = self
            .regions
            .range(..end)
            .next_back()
            .is_some_and(|(start, bytes)| start + bytes.len() as u64 > addr);
        if overlaps {
            return Err(EvalError::new(format!(
                "Region at 0x{addr:x} overlaps mapped memory"
            )));
        }
        self.regions.insert(addr, vec![0; len]);
        Ok(())
    }

    fn region(&self, addr: u64, len: usize) -> Option<(u64, &Vec<u8>)> {
        let (start, bytes) = self.regions.range(..=addr).next_back()?;
        let end = start + bytes.len() as u64;
        // Ranges running past u64::MAX are never mapped
        (addr.checked_add(len as u64)? <= end).then_some((*start, bytes))
    }

    /// Whether `len` bytes starting at `addr` are mapped
    pub fn contains(&self, addr: u64, len: usize) -> bool {
        self.region(addr, len).is_some()
    }

    pub fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>, EvalError> {
        let (start, bytes) = self
            .region(addr, len)
            .ok_or_else(|| EvalError::inaccessible(addr))?;
        let from = (addr - start) as usize;
        Ok(bytes[from..from + len].to_vec())
    }

    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<(), EvalError> {
        let start = match self.region(addr, data.len()) {
            Some((start, _)) => start,
            None => return Err(EvalError::inaccessible(addr)),
        };
        if let Some(bytes) = self.regions.get_mut(&start) {
            let from = (addr - start) as usize;
            bytes[from..from + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    pub fn write_int(&mut self, addr: u64, value: i64, size: usize) -> Result<(), EvalError> {
        self.write(addr, &value.to_le_bytes()[..size])
    }

    pub fn write_f64(&mut self, addr: u64, value: f64) -> Result<(), EvalError> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn write_f32(&mut self, addr: u64, value: f32) -> Result<(), EvalError> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn write_ptr(&mut self, addr: u64, target: u64) -> Result<(), EvalError> {
        self.write(addr, &target.to_le_bytes())
    }

    /// Write a NUL-terminated string
    pub fn write_cstr(&mut self, addr: u64, s: &str) -> Result<(), EvalError> {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.write(addr, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_little_endian() {
        let mut mem = Memory::new();
        mem.map(0x1000, 16).unwrap();
        mem.write_int(0x1004, 0x0102_0304, 4).unwrap();
        assert_eq!(mem.read(0x1004, 4).unwrap(), vec![4, 3, 2, 1]);
        assert_eq!(mem.read(0x1000, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_unmapped_access() {
        let mut mem = Memory::new();
        mem.map(0x1000, 8).unwrap();
        let err = mem.read(0x1006, 4).unwrap_err();
        assert_eq!(err.message, "Cannot access memory at address 0x1006");
        assert!(mem.read(0x2000, 1).is_err());
        assert!(mem.write(0xfff, &[1]).is_err());
    }

    #[test]
    fn test_overlapping_map_is_rejected() {
        let mut mem = Memory::new();
        mem.map(0x1000, 16).unwrap();
        assert!(mem.map(0x1008, 4).is_err());
        assert!(mem.map(0xff8, 16).is_err());
        mem.map(0x1010, 4).unwrap();
    }

    #[test]
    fn test_access_near_end_of_address_space() {
        let mut mem = Memory::new();
        mem.map(0x1000, 8).unwrap();
        assert!(!mem.contains(u64::MAX - 1, 4));
        assert_eq!(
            mem.read(u64::MAX - 1, 4).unwrap_err().message,
            "Cannot access memory at address 0xfffffffffffffffe"
        );
        assert!(mem.write(u64::MAX, &[1, 2]).is_err());
        assert!(mem.map(u64::MAX - 3, 8).is_err());
        mem.map(u64::MAX - 8, 8).unwrap();
        assert!(mem.contains(u64::MAX - 4, 4));
    }
}
