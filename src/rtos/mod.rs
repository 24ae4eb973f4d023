//! RTOS detection and task enumeration.

pub mod nuttx;

use crate::config::TcbLayout;
use crate::memory::{MemoryFault, TargetMemory};
use crate::stacking::RegisterValue;
use crate::symbols::{ResolvedSymbols, SymbolTable};
use serde::Serialize;
use thiserror::Error;

/// Faults surfaced by the task walker and the register context builder.
#[derive(Debug, Error)]
pub enum RtosError {
    /// The debug transport failed mid-read; the operation was aborted.
    #[error(transparent)]
    Memory(#[from] MemoryFault),
    /// The task structures read back do not look like the configured
    /// layout. Usually means the offsets need correcting for this image.
    #[error("task structures look malformed: {0}")]
    MalformedLayout(String),
}

/// One enumerated task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadDetail {
    /// TCB address, doubling as the thread handle for register lookups.
    pub id: u64,
    /// Kernel task id, when the layout locates one.
    pub pid: Option<u16>,
    /// Task name, absent when the image carries none.
    pub name: Option<String>,
    /// Scheduler state label.
    pub state: &'static str,
}

/// Snapshot of the target's live tasks.
///
/// Rebuilt from scratch on every refresh and installed wholesale; a failed
/// refresh never disturbs a previously published roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadRoster {
    /// Every task found on the kernel's queues, in queue-table order.
    pub threads: Vec<ThreadDetail>,
    /// TCB address of the running task, when the ready-to-run queue was
    /// seen and non-empty.
    pub current: Option<u64>,
}

/// Thread awareness contract one RTOS implementation provides.
pub trait RtosAware: Send {
    /// Human-readable kernel name.
    fn name(&self) -> &str;

    /// Symbols the resolver must look up, in order. Element 0 marks the
    /// ready-to-run queue head.
    fn symbol_names(&self) -> &'static [&'static str];

    /// Decide from resolved addresses alone whether the target runs this
    /// kernel. Reads no target memory.
    fn detect(&self, symbols: &ResolvedSymbols) -> bool;

    /// Rebuild the thread roster from target memory.
    fn update_threads(
        &self,
        core: &mut dyn TargetMemory,
        symbols: &ResolvedSymbols,
        layout: &TcbLayout,
    ) -> Result<ThreadRoster, RtosError>;

    /// Reconstruct the saved register context of the thread whose TCB sits
    /// at `thread_id`, in the consumer's expected register order.
    fn thread_registers(
        &self,
        core: &mut dyn TargetMemory,
        thread_id: u64,
        layout: &TcbLayout,
    ) -> Result<Vec<RegisterValue>, RtosError>;
}

/// Probe the loaded image for a supported RTOS.
///
/// Absence is a normal outcome, not a fault: a bare-metal image simply
/// lacks the kernel's symbols.
pub fn detect_rtos(table: &SymbolTable) -> Option<(Box<dyn RtosAware>, ResolvedSymbols)> {
    let candidates: [Box<dyn RtosAware>; 1] = [Box::new(nuttx::Nuttx::default())];
    for rtos in candidates {
        let resolved = ResolvedSymbols::resolve(table, rtos.symbol_names());
        if rtos.detect(&resolved) {
            log::info!("Detected {} on target", rtos.name());
            return Some((rtos, resolved));
        }
    }
    None
}
