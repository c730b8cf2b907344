//! Scriptable transport double for unit tests.
//!
//! Replies can be queued per (path, method), deferred behind a
//! [`Notify`] gate, or left to a benign default. Signals are dispatched
//! synchronously to the registered watchers, which is what the emission
//! ordering tests rely on.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::dict::Dict;
use crate::models::{Error, RemoteError};
use crate::transport::{BusEvent, ObjectKind, Observer, Reply, Request, Transport, WatchId};
use crate::Result;

pub(crate) enum MockReply {
    Ok(Reply),
    Err(Error),
    /// Completes with the reply only after the gate is notified.
    OkAfter(Rc<Notify>, Reply),
}

struct Watcher {
    id: u64,
    path: String,
    observer: Observer,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    objects: RefCell<HashMap<String, Dict>>,
    load_gates: RefCell<HashMap<String, Rc<Notify>>>,
    replies: RefCell<HashMap<(String, &'static str), VecDeque<MockReply>>>,
    log: RefCell<Vec<(String, &'static str)>>,
    watchers: RefCell<Vec<Watcher>>,
    next_watch: Cell<u64>,
}

impl MockTransport {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Sets the property snapshot served by `load` for `path`.
    pub(crate) fn put_object(&self, path: &str, props: Dict) {
        self.objects.borrow_mut().insert(path.to_string(), props);
    }

    /// Makes `load` for `path` wait until the returned gate is notified.
    pub(crate) fn gate_load(&self, path: &str) -> Rc<Notify> {
        let gate = Rc::new(Notify::new());
        self.load_gates
            .borrow_mut()
            .insert(path.to_string(), Rc::clone(&gate));
        gate
    }

    /// Queues a reply for the next `method` request on `path`.
    pub(crate) fn script(&self, path: &str, method: &'static str, reply: MockReply) {
        self.replies
            .borrow_mut()
            .entry((path.to_string(), method))
            .or_default()
            .push_back(reply);
    }

    /// Synchronously delivers a signal to every watcher of `path`.
    pub(crate) fn emit(&self, path: &str, event: &BusEvent) {
        let observers: Vec<Observer> = self
            .watchers
            .borrow()
            .iter()
            .filter(|w| w.path == path)
            .map(|w| Rc::clone(&w.observer))
            .collect();
        for observer in observers {
            observer(event);
        }
    }

    /// The (path, method) request log so far.
    pub(crate) fn calls(&self) -> Vec<(String, &'static str)> {
        self.log.borrow().clone()
    }

    /// Just the method names of requests made against `path`, in order.
    pub(crate) fn methods(&self, path: &str) -> Vec<&'static str> {
        self.log
            .borrow()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, m)| *m)
            .collect()
    }

    pub(crate) fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn request(&self, path: &str, request: Request) -> Result<Reply> {
        let method = request.name();
        self.log.borrow_mut().push((path.to_string(), method));
        let scripted = self
            .replies
            .borrow_mut()
            .get_mut(&(path.to_string(), method))
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(MockReply::Ok(reply)) => Ok(reply),
            Some(MockReply::Err(err)) => Err(err),
            Some(MockReply::OkAfter(gate, reply)) => {
                gate.notified().await;
                Ok(reply)
            }
            None => Ok(Reply::None),
        }
    }

    async fn load(&self, path: &str, _kind: ObjectKind) -> Result<Dict> {
        let gate = self.load_gates.borrow().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.objects
            .borrow()
            .get(path)
            .cloned()
            .ok_or(Error::Remote(RemoteError::UnknownError))
    }

    fn watch(&self, path: &str, _kind: ObjectKind, observer: Observer) -> WatchId {
        let id = self.next_watch.get();
        self.next_watch.set(id + 1);
        self.watchers.borrow_mut().push(Watcher {
            id,
            path: path.to_string(),
            observer,
        });
        WatchId(id)
    }

    fn unwatch(&self, id: WatchId) {
        self.watchers.borrow_mut().retain(|w| w.id != id.0);
    }
}

/// Lets everything queued on the local set run to quiescence.
pub(crate) async fn settle() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}
