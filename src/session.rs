//! Session-side thread awareness state.
//!
//! One [`ThreadAwareness`] exists per attached target, created when
//! detection succeeds at attach time. It owns the adjustable layout, the
//! monitor handler chain, and the last published roster; the surrounding
//! debug session drives it synchronously, so layout edits always land
//! before the next refresh that reads them.

use crate::config::TcbLayout;
use crate::memory::TargetMemory;
use crate::monitor::{self, LayoutHandler, MonitorHandler};
use crate::rtos::{detect_rtos, RtosAware, RtosError, ThreadRoster};
use crate::stacking::RegisterValue;
use crate::symbols::{ResolvedSymbols, SymbolTable};

/// Thread awareness for one attached target.
pub struct ThreadAwareness {
    rtos: Box<dyn RtosAware>,
    symbols: ResolvedSymbols,
    layout: TcbLayout,
    handlers: Vec<Box<dyn MonitorHandler>>,
    roster: ThreadRoster,
}

impl ThreadAwareness {
    /// Detect a supported RTOS in the loaded image and set up awareness for
    /// it. `None` when the image runs no supported kernel.
    pub fn attach(table: &SymbolTable) -> Option<Self> {
        let (rtos, symbols) = detect_rtos(table)?;
        Some(Self::new(rtos, symbols))
    }

    /// Set up awareness from an already detected kernel.
    pub fn new(rtos: Box<dyn RtosAware>, symbols: ResolvedSymbols) -> Self {
        Self {
            rtos,
            symbols,
            layout: TcbLayout::default(),
            handlers: vec![Box::new(LayoutHandler)],
            roster: ThreadRoster::default(),
        }
    }

    /// Kernel name of the detected RTOS.
    pub fn rtos_name(&self) -> &str {
        self.rtos.name()
    }

    /// Current layout assumptions.
    pub fn layout(&self) -> &TcbLayout {
        &self.layout
    }

    /// Last successfully published roster.
    pub fn roster(&self) -> &ThreadRoster {
        &self.roster
    }

    /// Rebuild the roster from target memory.
    ///
    /// All-or-nothing: on any fault the previously published roster stays
    /// installed and the error is surfaced to the caller.
    pub fn refresh(&mut self, core: &mut dyn TargetMemory) -> Result<(), RtosError> {
        let roster = self
            .rtos
            .update_threads(core, &self.symbols, &self.layout)?;
        self.roster = roster;
        Ok(())
    }

    /// Reconstruct the saved register context of one thread.
    pub fn thread_registers(
        &self,
        core: &mut dyn TargetMemory,
        thread_id: u64,
    ) -> Result<Vec<RegisterValue>, RtosError> {
        self.rtos.thread_registers(core, thread_id, &self.layout)
    }

    /// Offer a monitor packet to the handler chain ahead of normal
    /// dispatch. `Some` carries the hex-encoded acknowledgement for a
    /// claimed command; `None` means forward the packet unchanged.
    pub fn handle_monitor_packet(&mut self, packet: &str) -> Option<String> {
        monitor::dispatch_monitor_packet(&mut self.handlers, packet, &mut self.layout)
    }
}
