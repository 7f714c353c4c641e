//! Fire-and-forget telemetry sinks.
//!
//! A sink must never block or fail the control loop. Transports that can
//! fail (radio, serial) swallow their own errors behind this trait.

use std::cell::RefCell;
use std::rc::Rc;

pub trait Telemetry {
    fn send(&mut self, message: &str);
}

/// Discards everything. Used when no transport is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn send(&mut self, _message: &str) {}
}

/// Forwards messages to the `log` facade under the `telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn send(&mut self, message: &str) {
        log::info!(target: "telemetry", "{}", message);
    }
}

/// Keeps messages in memory; clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferTelemetry {
    messages: Rc<RefCell<Vec<String>>>,
}

impl BufferTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.contains(needle))
    }
}

impl Telemetry for BufferTelemetry {
    fn send(&mut self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
