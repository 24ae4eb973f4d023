//! NuttX task queue walker.
//!
//! NuttX keeps every task on one of a small set of singly-walked queues
//! anchored in `g_tasklisttable`, an array of `{queue head, priority}`
//! entries; the head of `g_readytorun` is the running task. Each queue node
//! is the task's TCB itself, so the node address doubles as the thread id
//! and as the base for locating the saved register context.

use super::{RtosAware, RtosError, ThreadDetail, ThreadRoster};
use crate::config::{QueueConfig, TcbLayout};
use crate::memory::TargetMemory;
use crate::stacking::{RegisterStacking, RegisterValue, StackGrowth, StackRegisterOffset};
use crate::symbols::ResolvedSymbols;

const SYMBOLS: &[&str] = &["g_readytorun", "g_tasklisttable"];
const READYTORUN: usize = 0;
const TASKLISTTABLE: usize = 1;

/// Link words (flink, blink) at the front of a TCB.
const TCB_LINKS_SIZE: usize = 8;
/// Opaque TCB body captured past the link words. Generous enough to cover
/// every field the layout can point at.
const TCB_BODY_SIZE: usize = 256;
/// Bytes per task list table entry: 32-bit queue head, 32-bit priority.
const QUEUE_ENTRY_SIZE: usize = 8;

/// Fallback label for a state byte outside the configured table.
const UNKNOWN_STATE: &str = "UNKNOWN";

/// Cortex-M saved context as the kernel's exception entry lays it out:
/// software-stacked r4-r11 below the hardware-stacked r0-r3, r12, lr, pc,
/// xPSR.
const CORTEX_M_OFFSETS: [StackRegisterOffset; 17] = [
    StackRegisterOffset { offset: 0x28, bits: 32 }, // r0
    StackRegisterOffset { offset: 0x2c, bits: 32 }, // r1
    StackRegisterOffset { offset: 0x30, bits: 32 }, // r2
    StackRegisterOffset { offset: 0x34, bits: 32 }, // r3
    StackRegisterOffset { offset: 0x08, bits: 32 }, // r4
    StackRegisterOffset { offset: 0x0c, bits: 32 }, // r5
    StackRegisterOffset { offset: 0x10, bits: 32 }, // r6
    StackRegisterOffset { offset: 0x14, bits: 32 }, // r7
    StackRegisterOffset { offset: 0x18, bits: 32 }, // r8
    StackRegisterOffset { offset: 0x1c, bits: 32 }, // r9
    StackRegisterOffset { offset: 0x20, bits: 32 }, // r10
    StackRegisterOffset { offset: 0x24, bits: 32 }, // r11
    StackRegisterOffset { offset: 0x38, bits: 32 }, // r12
    StackRegisterOffset { offset: 0x00, bits: 32 }, // sp
    StackRegisterOffset { offset: 0x3c, bits: 32 }, // lr
    StackRegisterOffset { offset: 0x40, bits: 32 }, // pc
    StackRegisterOffset { offset: 0x44, bits: 32 }, // xPSR
];

const CORTEX_M_STACKING: RegisterStacking = RegisterStacking {
    offsets: &CORTEX_M_OFFSETS,
    frame_size: 0x48,
    growth: StackGrowth::Descending,
};

/// NuttX thread awareness.
#[derive(Default)]
pub struct Nuttx {
    queues: QueueConfig,
}

impl Nuttx {
    /// Awareness for a target built with the given queue options.
    pub fn new(queues: QueueConfig) -> Self {
        Self { queues }
    }
}

fn word_at(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Bounded name copy: at most `name_size - 1` bytes, truncated at the first
/// NUL. Target memory is untrusted, so termination is never assumed.
fn read_name(tcb: &[u8], layout: &TcbLayout) -> Option<String> {
    if layout.name_offset == 0 {
        return None;
    }
    let offset = usize::from(layout.name_offset);
    if offset < TCB_LINKS_SIZE || offset >= tcb.len() {
        return None;
    }
    let max = usize::from(layout.name_size.saturating_sub(1));
    let raw = &tcb[offset..tcb.len().min(offset + max)];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    Some(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn read_pid(tcb: &[u8], layout: &TcbLayout) -> Option<u16> {
    let offset = usize::from(layout.pid_offset);
    if offset < TCB_LINKS_SIZE || offset + 2 > tcb.len() {
        return None;
    }
    Some(u16::from_le_bytes([tcb[offset], tcb[offset + 1]]))
}

/// Total mapping from the raw state byte to a label; codes outside the
/// configured table come back as [`UNKNOWN_STATE`] instead of indexing out
/// of range.
fn read_state(tcb: &[u8], layout: &TcbLayout, states: &[&'static str]) -> &'static str {
    let offset = usize::from(layout.state_offset);
    if offset < TCB_LINKS_SIZE || offset >= tcb.len() {
        return UNKNOWN_STATE;
    }
    states
        .get(usize::from(tcb[offset]))
        .copied()
        .unwrap_or(UNKNOWN_STATE)
}

impl RtosAware for Nuttx {
    fn name(&self) -> &str {
        "NuttX"
    }

    fn symbol_names(&self) -> &'static [&'static str] {
        SYMBOLS
    }

    fn detect(&self, symbols: &ResolvedSymbols) -> bool {
        symbols.address(READYTORUN) != 0 && symbols.address(TASKLISTTABLE) != 0
    }

    fn update_threads(
        &self,
        core: &mut dyn TargetMemory,
        symbols: &ResolvedSymbols,
        layout: &TcbLayout,
    ) -> Result<ThreadRoster, RtosError> {
        let readytorun = symbols.address(READYTORUN);
        let states = self.queues.state_labels();

        // The whole queue table in one bounded read.
        let mut table = vec![0u8; self.queues.num_queues() * QUEUE_ENTRY_SIZE];
        core.read(symbols.address(TASKLISTTABLE), &mut table)?;

        let mut roster = ThreadRoster::default();
        for entry in table.chunks_exact(QUEUE_ENTRY_SIZE) {
            let queue_addr = u64::from(word_at(entry, 0));
            // entry[4..8] holds the queue priority, unused here.
            if queue_addr == 0 {
                continue;
            }
            let head = core.read_u32(queue_addr)?;

            // The ready-to-run head is the current thread. First matching
            // table entry wins; duplicate entries never reassign it.
            if queue_addr == readytorun && roster.current.is_none() {
                roster.current = Some(u64::from(head));
            }

            let mut tcb_addr = head;
            while tcb_addr != 0 {
                if roster.threads.len() >= self.queues.max_tasks {
                    return Err(RtosError::MalformedLayout(format!(
                        "task chain exceeds {} entries, assuming a corrupt forward link",
                        self.queues.max_tasks
                    )));
                }
                let mut tcb = [0u8; TCB_LINKS_SIZE + TCB_BODY_SIZE];
                core.read(u64::from(tcb_addr), &mut tcb)?;
                roster.threads.push(ThreadDetail {
                    id: u64::from(tcb_addr),
                    pid: read_pid(&tcb, layout),
                    name: read_name(&tcb, layout),
                    state: read_state(&tcb, layout, &states),
                });
                tcb_addr = word_at(&tcb, 0);
            }
        }
        log::debug!(
            "NuttX roster rebuilt: {} tasks, current {:?}",
            roster.threads.len(),
            roster.current
        );
        Ok(roster)
    }

    fn thread_registers(
        &self,
        core: &mut dyn TargetMemory,
        thread_id: u64,
        layout: &TcbLayout,
    ) -> Result<Vec<RegisterValue>, RtosError> {
        let base = thread_id + u64::from(layout.xcpreg_offset);
        Ok(CORTEX_M_STACKING.read_frame(core, base)?)
    }
}
