//! Installs a gate in front of a page's dispatch hooks.

use std::rc::Rc;

use gate_core_types::{FetchRequest, SendRequest};
use gate_signal_bus::{ListenerId, Signal, SignalSource};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::InstallOptions;
use crate::gate::{GateState, Originals, ReadyGate};
use crate::hooks::{DispatchHooks, FetchFuture, FetchHook, SendHook};
use crate::permission::GatePolicy;
use crate::queue::SendReceipt;
use crate::GateEvent;

const EVENT_CAPACITY: usize = 128;

struct GatedSend {
    gate: Rc<ReadyGate>,
}

impl SendHook for GatedSend {
    fn send(&self, request: SendRequest) {
        // Callback-style callers never see the receipt; completion arrives via the transport.
        let _receipt: SendReceipt = self.gate.submit_send(request);
    }
}

struct GatedFetch {
    gate: Rc<ReadyGate>,
}

impl FetchHook for GatedFetch {
    fn fetch(&self, request: FetchRequest) -> FetchFuture {
        self.gate.submit_fetch(request)
    }
}

/// Handle to an installed gate.
///
/// Dropping the handle leaves the gate in place: the wrapped hooks and the readiness
/// listener stay registered. Call [`RequestInterceptor::uninstall`] to remove them.
pub struct RequestInterceptor {
    gate: Rc<ReadyGate>,
    hooks: Rc<DispatchHooks>,
    signals: Rc<dyn SignalSource>,
    listener: ListenerId,
    send: Rc<dyn SendHook>,
    fetch: Rc<dyn FetchHook>,
    ready_event: String,
}

/// Wrap the hooks currently registered on `hooks` so every call consults the gate first,
/// and open the gate when `options.ready_event` fires on `signals`.
///
/// The hooks in effect at this moment are captured as the originals: pass-through and
/// replayed calls go to them directly, never back through the wrappers. Installing twice
/// on the same hooks stacks gates, each wrapping whatever was current before it.
pub fn install(
    hooks: Rc<DispatchHooks>,
    signals: Rc<dyn SignalSource>,
    options: InstallOptions,
) -> RequestInterceptor {
    if hooks.gated_layers() > 0 {
        warn!(
            target: "request-interceptor",
            layers = hooks.gated_layers(),
            "installing over an existing gate; calls will be checked by every layer"
        );
    }

    let originals = Originals {
        send: hooks.current_send(),
        fetch: hooks.current_fetch(),
    };
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let gate = Rc::new(ReadyGate::new(options.policy(), originals, events));

    let send: Rc<dyn SendHook> = Rc::new(GatedSend {
        gate: Rc::clone(&gate),
    });
    let fetch: Rc<dyn FetchHook> = Rc::new(GatedFetch {
        gate: Rc::clone(&gate),
    });
    hooks.replace_send(Rc::clone(&send));
    hooks.replace_fetch(Rc::clone(&fetch));
    hooks.push_layer();

    let weak = Rc::downgrade(&gate);
    let listener = signals.add_listener(
        &options.ready_event,
        Rc::new(move |signal: &Signal| {
            if let Some(gate) = weak.upgrade() {
                gate.open(&signal.name);
            }
        }),
    );

    info!(
        target: "request-interceptor",
        ready_event = %options.ready_event,
        whitelist = options.whitelist.len(),
        allow_current_host = options.allow_current_host,
        "request gate installed"
    );

    RequestInterceptor {
        gate,
        hooks,
        signals,
        listener,
        send,
        fetch,
        ready_event: options.ready_event,
    }
}

impl RequestInterceptor {
    pub fn is_ready(&self) -> bool {
        self.gate.state() == GateState::Ready
    }

    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    pub fn ready_event(&self) -> &str {
        &self.ready_event
    }

    pub fn policy(&self) -> &GatePolicy {
        self.gate.policy()
    }

    /// Audit stream of dispatch, deferral and flush decisions made by this gate.
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.gate.subscribe()
    }

    /// Remove the readiness listener and stop gating. Returns how many deferred calls were
    /// dropped; their futures resolve to [`gate_core_types::TransportError::Abandoned`].
    ///
    /// The original hooks are restored only when this gate's wrappers are still the
    /// current ones. If a later install wrapped them, the wrappers stay in the chain and
    /// simply pass calls through.
    pub fn uninstall(self) -> usize {
        self.signals.remove_listener(self.listener);
        let abandoned = self.gate.detach();

        if self.hooks.is_current(&self.send, &self.fetch) {
            let originals = self.gate.originals();
            self.hooks.replace_send(originals.send);
            self.hooks.replace_fetch(originals.fetch);
        } else {
            warn!(
                target: "request-interceptor",
                ready_event = %self.ready_event,
                "gate uninstalled beneath a later install; leaving pass-through wrappers in place"
            );
        }
        self.hooks.pop_layer();

        info!(target: "request-interceptor", abandoned, "request gate uninstalled");
        abandoned
    }
}
