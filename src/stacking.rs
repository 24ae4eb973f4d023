//! Saved-context register extraction.
//!
//! A suspended task's CPU registers sit in a memory frame laid out by the
//! architecture's context-switch path. A [`RegisterStacking`] describes that
//! layout: where the frame's registers live relative to the saved-context
//! pointer, how wide each one is, and which way the stack grows. Reading a
//! frame is one bulk transfer followed by pure byte extraction, so a fault
//! can only come from the transport.

use crate::memory::{MemoryFault, TargetMemory};
use serde::Serialize;

/// Location of one output register within a saved-context frame.
#[derive(Debug, Clone, Copy)]
pub struct StackRegisterOffset {
    /// Byte offset of the register within the frame.
    pub offset: u32,
    /// Register width in bits.
    pub bits: u8,
}

/// Direction the stack grows in, relative to the saved-context pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackGrowth {
    /// The context pointer is the low end of the frame.
    Descending,
    /// The context pointer is the high end of the frame.
    Ascending,
}

/// Architecture-specific description of a saved-context frame.
///
/// One per supported architecture, selected at attach time, never mutated.
pub struct RegisterStacking {
    /// Register locations, in the order the consumer expects them.
    pub offsets: &'static [StackRegisterOffset],
    /// Total bytes occupied by the frame.
    pub frame_size: u32,
    /// Which end of the frame the context pointer marks.
    pub growth: StackGrowth,
}

/// A single extracted register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterValue {
    /// Little-endian value, zero-extended to 64 bits.
    pub value: u64,
    /// Width of the register on the target.
    pub bits: u8,
}

impl RegisterStacking {
    /// Read one full frame whose context pointer is `base` and extract every
    /// register the descriptor names, in descriptor order.
    ///
    /// Always yields one value per descriptor entry; a transport fault
    /// aborts the whole read with no partial result.
    pub fn read_frame(
        &self,
        core: &mut dyn TargetMemory,
        base: u64,
    ) -> Result<Vec<RegisterValue>, MemoryFault> {
        let addr = match self.growth {
            StackGrowth::Descending => base,
            StackGrowth::Ascending => base.saturating_sub(u64::from(self.frame_size)),
        };
        let mut frame = vec![0u8; self.frame_size as usize];
        core.read(addr, &mut frame)?;
        Ok(self.offsets.iter().map(|reg| extract(&frame, reg)).collect())
    }
}

/// Pull one little-endian register out of a frame buffer. Bytes past the
/// end of the frame read as zero rather than faulting.
fn extract(frame: &[u8], reg: &StackRegisterOffset) -> RegisterValue {
    let start = reg.offset as usize;
    let len = usize::from(reg.bits / 8);
    let mut value = 0u64;
    for (i, byte) in frame.get(start..).unwrap_or(&[]).iter().take(len).enumerate() {
        value |= u64::from(*byte) << (8 * i);
    }
    RegisterValue {
        value,
        bits: reg.bits,
    }
}
