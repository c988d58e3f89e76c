//! [`EventSink`] that renders every [`AppEvent`] as one tagged console line.
//!
//! Faults go out at `warn`, everything else at `info`.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::CommandAccepted(cmd) => {
                info!("CMD   | {}", cmd.label());
            }
            AppEvent::CommandIgnored(cmd) => {
                info!("CMD   | ignored ({})", cmd.label());
            }
            AppEvent::PulseCompleted { source, duration_ms } => {
                info!("PULSE | {:?} done after {} ms", source, duration_ms);
            }
            AppEvent::CountersChanged(c) => {
                info!("COUNT | instance={} overall={}", c.instance, c.overall);
            }
            AppEvent::Connection(state) => {
                info!("LINK  | {:?}", state);
            }
            AppEvent::Fault(fault) => {
                warn!("FAULT | {}", fault);
            }
            AppEvent::Restarting => {
                info!("BOOT  | restarting");
            }
        }
    }
}
