//! RTOS thread awareness for debug sessions.
//!
//! When a debug probe is attached to a target running an RTOS, the raw core
//! view (one program counter, one register file) hides the tasks the kernel
//! is actually scheduling. This crate walks the kernel's task bookkeeping
//! structures in target memory and turns them into a thread roster the
//! surrounding debug server can present, including each suspended task's
//! saved register context.
//!
//! Currently supported: NuttX. Detection is symbol-driven and reads no
//! target memory; a target without the kernel's symbols is simply reported
//! as having no RTOS.

pub mod config;
pub mod memory;
pub mod monitor;
pub mod rtos;
pub mod session;
pub mod stacking;
pub mod symbols;

// Re-export commonly used types
pub use config::{QueueConfig, TcbLayout};
pub use memory::{MemoryFault, TargetMemory};
pub use monitor::{LayoutHandler, MonitorHandler, Outcome};
pub use rtos::{detect_rtos, RtosAware, RtosError, ThreadDetail, ThreadRoster};
pub use session::ThreadAwareness;
pub use stacking::{RegisterStacking, RegisterValue, StackGrowth, StackRegisterOffset};
pub use symbols::{ResolvedSymbols, SymbolTable};
