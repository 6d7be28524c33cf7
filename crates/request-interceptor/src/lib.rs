//! Request gate: holds back a page's outbound calls until a readiness signal fires.
//!
//! [`install`] wraps the page's two dispatch hooks. Each call is checked against the
//! gate's policy: whitelisted targets, and optionally targets on the page's own host,
//! go out immediately; everything else waits in a FIFO queue. When the configured
//! readiness signal fires the gate opens for good and the queue is replayed, in order,
//! through the hooks that were in place before installation.
//!
//! Everything here is single-threaded. Deferred futures are `!Send` and are meant to be
//! driven on a current-thread runtime or a `LocalSet`.
//!
//! A call deferred before readiness stays pending for as long as the gate lives if the
//! signal never fires. There is no timeout.

pub mod config;
mod gate;
pub mod hooks;
mod installer;
pub mod metrics;
pub mod permission;
mod queue;

pub use crate::config::{ConfigError, InstallOptions, DEFAULT_READY_EVENT};
pub use crate::gate::GateState;
pub use crate::hooks::{DispatchHooks, FetchFuture, FetchHook, SendHook};
pub use crate::installer::{install, RequestInterceptor};
pub use crate::permission::{AllowReason, GatePolicy, Permission};
pub use gate_core_types::{
    FetchRequest, FetchResponse, RequestId, RequestKind, SendRequest, TransportError,
};
pub use gate_signal_bus::{Signal, SignalBus, SignalSource};

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identifies the call an event refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub kind: RequestKind,
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateEventKind {
    Dispatched { reason: AllowReason },
    Deferred,
    Released,
    Ready { flushed: usize },
    Detached { abandoned: usize },
}

/// Event emitted whenever the gate makes a decision or changes state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateEvent {
    pub kind: GateEventKind,
    pub request: Option<RequestRecord>,
    pub timestamp: SystemTime,
}
