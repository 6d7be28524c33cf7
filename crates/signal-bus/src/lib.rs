//! Named signal source for a single page.
//!
//! Listeners are plain callbacks invoked synchronously, in registration order, on the
//! thread that fires the signal. Observers that would rather await signals can take a
//! broadcast subscription instead.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::SystemTime;

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// A fired signal as seen by listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    pub fired_at: SystemTime,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fired_at: SystemTime::now(),
        }
    }
}

/// Handle identifying one registered listener.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Rc<dyn Fn(&Signal)>;

/// The host's event-notification facility, reduced to what the gate needs.
pub trait SignalSource {
    fn add_listener(&self, event: &str, listener: Listener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
}

struct Registration {
    id: ListenerId,
    event: String,
    listener: Listener,
}

/// In-memory signal source suitable for hosts without their own event loop and for tests.
pub struct SignalBus {
    registrations: RefCell<Vec<Registration>>,
    next_id: Cell<u64>,
    sender: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Rc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Rc::new(Self {
            registrations: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            sender,
        })
    }

    /// Fire `name`, invoking every listener registered for it. Returns how many ran.
    ///
    /// Listeners may add or remove registrations while the signal is being delivered;
    /// a listener removed mid-delivery is skipped, one added mid-delivery waits for the
    /// next firing.
    pub fn fire(&self, name: &str) -> usize {
        let signal = Signal::new(name);
        let matching: Vec<(ListenerId, Listener)> = self
            .registrations
            .borrow()
            .iter()
            .filter(|registration| registration.event == name)
            .map(|registration| (registration.id, Rc::clone(&registration.listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in matching {
            if !self.is_registered(id) {
                trace!(target: "signal-bus", event = name, "listener removed before delivery");
                continue;
            }
            listener(&signal);
            delivered += 1;
        }

        // Nobody subscribed is the common case.
        let _ = self.sender.send(signal);
        debug!(target: "signal-bus", event = name, delivered, "signal fired");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|registration| registration.event == event)
            .count()
    }

    fn is_registered(&self, id: ListenerId) -> bool {
        self.registrations
            .borrow()
            .iter()
            .any(|registration| registration.id == id)
    }
}

impl SignalSource for SignalBus {
    fn add_listener(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.registrations.borrow_mut().push(Registration {
            id,
            event: event.to_string(),
            listener,
        });
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        registrations.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &'static str) -> Listener {
        let log = Rc::clone(log);
        Rc::new(move |signal: &Signal| log.borrow_mut().push(format!("{label}:{}", signal.name)))
    }

    #[test]
    fn fires_only_matching_listeners_in_order() {
        let bus = SignalBus::new(4);
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.add_listener("load", recorder(&log, "a"));
        bus.add_listener("DOMContentLoaded", recorder(&log, "b"));
        bus.add_listener("load", recorder(&log, "c"));

        assert_eq!(bus.fire("load"), 2);
        assert_eq!(*log.borrow(), vec!["a:load".to_string(), "c:load".to_string()]);
    }

    #[test]
    fn removed_listener_is_not_invoked() {
        let bus = SignalBus::new(4);
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = bus.add_listener("load", recorder(&log, "a"));

        assert!(bus.remove_listener(id));
        assert!(!bus.remove_listener(id));
        assert_eq!(bus.fire("load"), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.listener_count("load"), 0);
    }

    #[test]
    fn listener_can_remove_a_later_listener_during_delivery() {
        let bus = SignalBus::new(4);
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim = Rc::new(Cell::new(None::<ListenerId>));

        let remover = {
            let bus = Rc::clone(&bus);
            let victim = Rc::clone(&victim);
            Rc::new(move |_: &Signal| {
                if let Some(id) = victim.get() {
                    bus.remove_listener(id);
                }
            })
        };
        bus.add_listener("ready", remover);
        victim.set(Some(bus.add_listener("ready", recorder(&log, "late"))));

        assert_eq!(bus.fire("ready"), 1);
        assert!(log.borrow().is_empty());
    }

    #[tokio::test]
    async fn subscribers_receive_fired_signals() {
        let bus = SignalBus::new(4);
        let mut rx = bus.subscribe();

        bus.fire("DOMContentLoaded");

        let signal = rx.recv().await.expect("signal");
        assert_eq!(signal.name, "DOMContentLoaded");
    }
}
