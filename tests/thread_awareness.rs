//! End-to-end thread awareness flow over fake target memory: detection,
//! roster refresh, monitor-driven reconfiguration, and register context
//! reconstruction through the public API only.

use rtos_awareness::rtos::nuttx::Nuttx;
use rtos_awareness::{
    MemoryFault, QueueConfig, ResolvedSymbols, RtosAware, TargetMemory, TcbLayout, ThreadAwareness,
};
use std::collections::HashMap;

const TABLE: u64 = 0x2000_0100;
const READYTORUN_Q: u64 = 0x1000;
const DELAYED_Q: u64 = 0x2000;

struct FakeTarget {
    data: HashMap<u64, u8>,
}

impl FakeTarget {
    fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    fn set_u32(&mut self, addr: u64, value: u32) {
        self.set_bytes(addr, &value.to_le_bytes());
    }

    fn set_bytes(&mut self, addr: u64, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.data.insert(addr + i as u64, byte);
        }
    }
}

impl TargetMemory for FakeTarget {
    fn read(&mut self, address: u64, buf: &mut [u8]) -> Result<(), MemoryFault> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = *self.data.get(&(address + i as u64)).unwrap_or(&0);
        }
        Ok(())
    }
}

fn plant_tcb(mem: &mut FakeTarget, addr: u64, flink: u32, state: u8, name: &str) {
    let layout = TcbLayout::default();
    mem.set_u32(addr, flink);
    mem.set_bytes(addr + u64::from(layout.state_offset), &[state]);
    let mut terminated = name.as_bytes().to_vec();
    terminated.push(0);
    mem.set_bytes(addr + u64::from(layout.name_offset), &terminated);
}

/// Queue table [(0x1000, prio 0), (0x2000, prio 1)]; ready-to-run chain
/// 0x100 -> 0x200, delayed chain 0x300.
fn fake_target() -> FakeTarget {
    let mut mem = FakeTarget::new();
    mem.set_u32(TABLE, READYTORUN_Q as u32);
    mem.set_u32(TABLE + 4, 0);
    mem.set_u32(TABLE + 8, DELAYED_Q as u32);
    mem.set_u32(TABLE + 12, 1);

    mem.set_u32(READYTORUN_Q, 0x100);
    mem.set_u32(DELAYED_Q, 0x300);

    plant_tcb(&mut mem, 0x100, 0x200, 3, "hpwork");
    plant_tcb(&mut mem, 0x200, 0, 2, "lpwork");
    plant_tcb(&mut mem, 0x300, 0, 5, "sensor");
    mem
}

fn attach() -> ThreadAwareness {
    let config = QueueConfig {
        signals: false,
        mqueue: false,
        paging: false,
        max_tasks: 32,
    };
    ThreadAwareness::new(
        Box::new(Nuttx::new(config)),
        ResolvedSymbols::from_addresses(&[READYTORUN_Q, TABLE]),
    )
}

#[test]
fn roster_matches_planted_queues() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut mem = fake_target();
    let mut aware = attach();
    aware.refresh(&mut mem).unwrap();

    let roster = aware.roster();
    let ids: Vec<u64> = roster.threads.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![0x100, 0x200, 0x300]);
    assert_eq!(roster.current, Some(0x100));

    let names: Vec<&str> = roster
        .threads
        .iter()
        .filter_map(|t| t.name.as_deref())
        .collect();
    assert_eq!(names, vec!["hpwork", "lpwork", "sensor"]);
    assert_eq!(roster.threads[2].state, "WAIT_SEM");
}

#[test]
fn detection_is_a_pure_address_check() {
    let nuttx = Nuttx::default();
    assert!(nuttx.detect(&ResolvedSymbols::from_addresses(&[READYTORUN_Q, TABLE])));
    assert!(!nuttx.detect(&ResolvedSymbols::from_addresses(&[0, TABLE])));
    assert!(!nuttx.detect(&ResolvedSymbols::from_addresses(&[])));
}

#[test]
fn saved_context_comes_back_in_descriptor_order() {
    let mut mem = fake_target();
    let layout = TcbLayout::default();
    let frame = 0x200 + u64::from(layout.xcpreg_offset);
    mem.set_u32(frame + 0x40, 0x0800_4000); // pc
    mem.set_u32(frame + 0x3c, 0x0800_3ffd); // lr
    mem.set_u32(frame + 0x08, 0x1111_1111); // r4

    let mut aware = attach();
    aware.refresh(&mut mem).unwrap();
    let regs = aware.thread_registers(&mut mem, 0x200).unwrap();

    assert_eq!(regs.len(), 17);
    assert_eq!(regs[4].value, 0x1111_1111);
    assert_eq!(regs[14].value, 0x0800_3ffd);
    assert_eq!(regs[15].value, 0x0800_4000);
}

#[test]
fn monitor_command_reshapes_subsequent_walks() {
    let mut mem = fake_target();
    let mut aware = attach();

    // Stock offsets first.
    aware.refresh(&mut mem).unwrap();
    assert_eq!(aware.roster().threads[0].state, "RUNNING");

    // Pretend the image stores the state byte at 0x20 and plant it there.
    let layout = TcbLayout::default();
    for tcb in [0x100u64, 0x200, 0x300] {
        let state = mem.data[&(tcb + u64::from(layout.state_offset))];
        mem.set_bytes(tcb + 0x20, &[state]);
    }
    let packet = format!("qRcmd,{}", hex::encode("nuttx.state_offset 32"));
    let ack = aware.handle_monitor_packet(&packet).unwrap();
    assert_eq!(ack, hex::encode("OK"));

    aware.refresh(&mut mem).unwrap();
    assert_eq!(aware.roster().threads[0].state, "RUNNING");
    assert_eq!(aware.roster().threads[2].state, "WAIT_SEM");
}
