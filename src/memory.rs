//! Target memory access seam.
//!
//! Everything this crate learns about the target comes from blocking,
//! read-only memory requests over the debug transport. [`TargetMemory`] is
//! the narrow contract the walker and the register context builder consume;
//! any probe-rs [`MemoryInterface`] satisfies it, and tests drive the code
//! with in-memory fakes.

use probe_rs::MemoryInterface;
use thiserror::Error;

/// A failed transport read.
///
/// Aborts whatever operation issued it; previously published state is left
/// untouched by the caller.
#[derive(Debug, Error)]
#[error("target memory read of {len} bytes at {addr:#010x} failed")]
pub struct MemoryFault {
    /// Address the read targeted.
    pub addr: u64,
    /// Length of the attempted read.
    pub len: usize,
    /// Underlying probe or transport error.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Blocking read access to target memory.
///
/// Targets handled here are little-endian; the word helper decodes
/// accordingly.
pub trait TargetMemory {
    /// Fill `buf` from target memory starting at `address`.
    fn read(&mut self, address: u64, buf: &mut [u8]) -> Result<(), MemoryFault>;

    /// Read one little-endian 32-bit word.
    fn read_u32(&mut self, address: u64) -> Result<u32, MemoryFault> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl<T: MemoryInterface + ?Sized> TargetMemory for T {
    fn read(&mut self, address: u64, buf: &mut [u8]) -> Result<(), MemoryFault> {
        let len = buf.len();
        self.read_8(address, buf).map_err(|source| MemoryFault {
            addr: address,
            len,
            source: Box::new(source),
        })
    }
}
