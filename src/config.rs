//! Adjustable assumptions about the target's binary layout.
//!
//! The kernel's structure layout depends on how the target image was built.
//! Rather than hardcoding one build's offsets, the walker and the register
//! context builder read them from a [`TcbLayout`] owned by the session, which
//! an operator can correct at runtime through monitor commands when the
//! defaults turn out wrong for the attached firmware.

use serde::{Deserialize, Serialize};

/// Byte offsets of the fields read out of a task control block, measured
/// from the start of the TCB record.
///
/// The first 8 bytes of a TCB are its forward/backward list links; any
/// offset below that lands inside the link words and is treated as "field
/// absent". `name_offset == 0` disables name extraction entirely.
///
/// Defaults match a stock Cortex-M build of the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcbLayout {
    /// Offset of the 16-bit task id.
    pub pid_offset: u16,
    /// Offset of the one-byte scheduler state code.
    pub state_offset: u16,
    /// Offset of the task name string, or 0 if the image was built without
    /// task names.
    pub name_offset: u16,
    /// Offset of the saved-context area within the TCB.
    pub xcpreg_offset: u16,
    /// Maximum task name length, terminator included.
    pub name_size: u16,
}

impl Default for TcbLayout {
    fn default() -> Self {
        Self {
            pid_offset: 0x0c,
            state_offset: 0x19,
            name_offset: 0xb8,
            xcpreg_offset: 0x70,
            name_size: 32,
        }
    }
}

/// Build-time kernel options that change the shape of the task list table.
///
/// Each enabled option contributes a fixed number of extra wait queues to
/// the table and the matching wait-state labels to the state set, so both
/// are derived here from one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Image built with signal support (one extra wait queue).
    pub signals: bool,
    /// Image built with message queue support (two extra wait queues).
    pub mqueue: bool,
    /// Image built with on-demand paging (one extra wait queue).
    pub paging: bool,
    /// Upper bound on the number of TCBs a single refresh will visit.
    /// A forward-link cycle in a misread chain trips this bound instead of
    /// hanging the session.
    pub max_tasks: usize,
}

impl QueueConfig {
    /// Number of entries in the kernel's task list table.
    pub fn num_queues(&self) -> usize {
        6 + usize::from(self.signals) + 2 * usize::from(self.mqueue) + usize::from(self.paging)
    }

    /// Scheduler state labels, indexed by the state code stored in the TCB.
    pub fn state_labels(&self) -> Vec<&'static str> {
        let mut labels = vec![
            "INVALID",
            "PENDING",
            "READYTORUN",
            "RUNNING",
            "INACTIVE",
            "WAIT_SEM",
        ];
        if self.signals {
            labels.push("WAIT_SIG");
        }
        if self.mqueue {
            labels.push("WAIT_MQNOTEMPTY");
            labels.push("WAIT_MQNOTFULL");
        }
        if self.paging {
            labels.push("WAIT_PAGEFILL");
        }
        labels
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            signals: true,
            mqueue: true,
            paging: false,
            max_tasks: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_queue_count() {
        // signals + mqueue on, paging off
        assert_eq!(QueueConfig::default().num_queues(), 9);
    }

    #[test]
    fn test_queue_count_tracks_build_options() {
        let bare = QueueConfig {
            signals: false,
            mqueue: false,
            paging: false,
            ..QueueConfig::default()
        };
        assert_eq!(bare.num_queues(), 6);
        assert_eq!(bare.state_labels().len(), 6);

        let full = QueueConfig {
            signals: true,
            mqueue: true,
            paging: true,
            ..QueueConfig::default()
        };
        assert_eq!(full.num_queues(), 10);
        assert_eq!(*full.state_labels().last().unwrap(), "WAIT_PAGEFILL");
    }

    #[test]
    fn test_default_layout_matches_stock_build() {
        let layout = TcbLayout::default();
        assert_eq!(layout.state_offset, 0x19);
        assert_eq!(layout.xcpreg_offset, 0x70);
        assert_eq!(layout.name_size, 32);
    }
}
