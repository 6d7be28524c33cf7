//! The two dispatch mechanisms a page exposes, and the registry callers go through.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use gate_core_types::{FetchRequest, FetchResponse, SendRequest, TransportError};

pub type FetchFuture = LocalBoxFuture<'static, Result<FetchResponse, TransportError>>;

/// Callback-style dispatch. Completion and failure are reported through whatever
/// notification path the implementation owns, never through the return value.
pub trait SendHook {
    fn send(&self, request: SendRequest);
}

/// Future-style dispatch. Invoking `fetch` dispatches the call; the returned future
/// yields its outcome.
pub trait FetchHook {
    fn fetch(&self, request: FetchRequest) -> FetchFuture;
}

/// Holds the hooks currently in effect for a page.
///
/// Every caller dispatches through [`DispatchHooks::send`] and [`DispatchHooks::fetch`];
/// installing a gate swaps the current hooks for wrapped ones.
pub struct DispatchHooks {
    send: RefCell<Rc<dyn SendHook>>,
    fetch: RefCell<Rc<dyn FetchHook>>,
    layers: Cell<usize>,
}

impl DispatchHooks {
    pub fn new(send: Rc<dyn SendHook>, fetch: Rc<dyn FetchHook>) -> Rc<Self> {
        Rc::new(Self {
            send: RefCell::new(send),
            fetch: RefCell::new(fetch),
            layers: Cell::new(0),
        })
    }

    pub fn send(&self, request: SendRequest) {
        // Clone out first: the hook may swap hooks or dispatch again.
        let hook = self.current_send();
        hook.send(request);
    }

    pub fn fetch(&self, request: FetchRequest) -> FetchFuture {
        let hook = self.current_fetch();
        hook.fetch(request)
    }

    pub fn current_send(&self) -> Rc<dyn SendHook> {
        self.send.borrow().clone()
    }

    pub fn current_fetch(&self) -> Rc<dyn FetchHook> {
        self.fetch.borrow().clone()
    }

    /// Number of gates currently wrapping these hooks.
    pub fn gated_layers(&self) -> usize {
        self.layers.get()
    }

    pub(crate) fn replace_send(&self, hook: Rc<dyn SendHook>) -> Rc<dyn SendHook> {
        self.send.replace(hook)
    }

    pub(crate) fn replace_fetch(&self, hook: Rc<dyn FetchHook>) -> Rc<dyn FetchHook> {
        self.fetch.replace(hook)
    }

    pub(crate) fn is_current(&self, send: &Rc<dyn SendHook>, fetch: &Rc<dyn FetchHook>) -> bool {
        same_object(&*self.send.borrow(), send) && same_object(&*self.fetch.borrow(), fetch)
    }

    pub(crate) fn push_layer(&self) {
        self.layers.set(self.layers.get() + 1);
    }

    pub(crate) fn pop_layer(&self) {
        self.layers.set(self.layers.get().saturating_sub(1));
    }
}

fn same_object<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}
