//! Runtime layout reconfiguration over monitor commands.
//!
//! The debug server offers each monitor ("qRcmd") packet to an ordered
//! handler chain before its normal dispatch. A handler either claims the
//! command and produces an acknowledgement, or passes it on untouched; this
//! crate contributes exactly one handler, [`LayoutHandler`], which lets an
//! operator fix up TCB field offsets on a live session when the attached
//! image was built with a different configuration than the defaults assume.

use crate::config::TcbLayout;

/// Result of offering a command to one handler in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The handler consumed the command; reply with this acknowledgement.
    Claimed(String),
    /// Not this handler's command; offer it to the next one.
    Pass,
}

/// One link in the monitor command chain.
pub trait MonitorHandler: Send {
    /// Inspect `cmd` and either claim it or pass.
    fn try_handle(&mut self, cmd: &str, layout: &mut TcbLayout) -> Outcome;
}

/// Recognizes `nuttx.<field> <value>` commands adjusting the TCB layout.
pub struct LayoutHandler;

const NAMESPACE: &str = "nuttx.";

const FIELDS: [&str; 5] = [
    "pid_offset",
    "state_offset",
    "name_offset",
    "xcpreg_offset",
    "name_size",
];

fn field_mut<'a>(layout: &'a mut TcbLayout, name: &str) -> Option<&'a mut u16> {
    match name {
        "pid_offset" => Some(&mut layout.pid_offset),
        "state_offset" => Some(&mut layout.state_offset),
        "name_offset" => Some(&mut layout.name_offset),
        "xcpreg_offset" => Some(&mut layout.xcpreg_offset),
        "name_size" => Some(&mut layout.name_size),
        _ => None,
    }
}

impl MonitorHandler for LayoutHandler {
    fn try_handle(&mut self, cmd: &str, layout: &mut TcbLayout) -> Outcome {
        let Some(rest) = cmd.strip_prefix(NAMESPACE) else {
            return Outcome::Pass;
        };
        for name in FIELDS {
            if let Some(arg) = rest.strip_prefix(name) {
                // A missing or malformed argument is not ours to reject; the
                // command falls through to normal dispatch.
                let Ok(value) = arg.trim().parse::<u16>() else {
                    return Outcome::Pass;
                };
                if let Some(field) = field_mut(layout, name) {
                    log::info!("{name}: {value}");
                    *field = value;
                    return Outcome::Claimed("OK".to_string());
                }
            }
        }
        Outcome::Pass
    }
}

/// Offer `cmd` to each handler in order; `None` means nobody claimed it and
/// the caller should dispatch it normally.
pub fn run_chain(
    handlers: &mut [Box<dyn MonitorHandler>],
    cmd: &str,
    layout: &mut TcbLayout,
) -> Option<String> {
    for handler in handlers.iter_mut() {
        if let Outcome::Claimed(ack) = handler.try_handle(cmd, layout) {
            return Some(ack);
        }
    }
    None
}

/// Intercept a raw monitor packet ahead of normal dispatch.
///
/// The payload of a `qRcmd,` packet is hex-encoded command text. Returns
/// the hex-encoded acknowledgement when a handler claimed the command;
/// `None` (including for undecodable payloads and non-monitor packets)
/// tells the caller to forward the packet unchanged.
pub fn dispatch_monitor_packet(
    handlers: &mut [Box<dyn MonitorHandler>],
    packet: &str,
    layout: &mut TcbLayout,
) -> Option<String> {
    let payload = packet.strip_prefix("qRcmd,")?;
    let decoded = hex::decode(payload).ok()?;
    let cmd = std::str::from_utf8(&decoded).ok()?;
    let ack = run_chain(handlers, cmd, layout)?;
    Some(hex::encode(ack.as_bytes()))
}
