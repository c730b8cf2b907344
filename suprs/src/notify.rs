//! Property change accumulation and ordered notification.
//!
//! Every proxy object keeps a bitmask of properties whose cached value
//! changed since the last flush, plus a list of subscribers. A flush walks
//! the property list in declaration order and emits one notification per
//! changed property, with one deliberate asymmetry: when the object just
//! became valid, `Valid` is emitted strictly last, so observers always see
//! a fully populated object when validity turns on; when the object just
//! became invalid, `Valid` goes out first (it is the first property in the
//! scan order), warning observers before the rest of the state is torn
//! down. A temporary owner clone is held across the flush so that
//! subscribers dropping their own last reference cannot destroy the object
//! mid-emission.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Identifies one registered property-change handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

/// A typed property set with a fixed scan order. `Valid` must be the first
/// entry of `ALL`.
pub(crate) trait Property: Copy + PartialEq + fmt::Debug + 'static {
    const ALL: &'static [Self];
    const VALID: Self;

    fn bit(self) -> u32;
}

/// Declares a proxy's property enum and wires it up as a [`Property`].
macro_rules! properties {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $crate::notify::Property for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];
            const VALID: Self = Self::Valid;

            fn bit(self) -> u32 {
                1u32 << (self as u32)
            }
        }
    };
}

pub(crate) use properties;

struct Entry<O, P> {
    id: u64,
    filter: Option<P>,
    func: Rc<dyn Fn(&O, P)>,
}

/// Per-instance subscriber list.
///
/// A handler registered with a filter only sees that property; a handler
/// registered without one sees every property (the "generic" notification
/// of the original event scheme).
pub(crate) struct HandlerList<O, P> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry<O, P>>>,
}

impl<O, P> Default for HandlerList<O, P> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(1),
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<O, P: Property> HandlerList<O, P> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, filter: Option<P>, func: impl Fn(&O, P) + 'static) -> HandlerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            filter,
            func: Rc::new(func),
        });
        HandlerId(id)
    }

    pub(crate) fn remove(&self, id: HandlerId) {
        self.entries.borrow_mut().retain(|e| e.id != id.0);
    }

    fn alive(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|e| e.id == id)
    }

    /// Invokes every matching handler once. The list is snapshotted first
    /// so handlers may add or remove subscriptions while the notification
    /// runs; a handler removed mid-flight is skipped.
    pub(crate) fn notify(&self, owner: &O, prop: P) {
        let snapshot: Vec<(u64, Rc<dyn Fn(&O, P)>)> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| e.filter.is_none() || e.filter == Some(prop))
            .map(|e| (e.id, Rc::clone(&e.func)))
            .collect();
        for (id, func) in snapshot {
            if self.alive(id) {
                func(owner, prop);
            }
        }
    }
}

/// Flushes the pending-change bitmask in scan order, with the `Valid`
/// ordering rule described in the module docs. Each bit is cleared before
/// its notification goes out.
pub(crate) fn flush_pending<O, P>(
    owner: &O,
    pending: &Cell<u32>,
    valid_now: bool,
    handlers: &HandlerList<O, P>,
) where
    O: Clone,
    P: Property,
{
    // Handlers could drop their references to the owner
    let _self_ref = owner.clone();

    let valid_bit = P::VALID.bit();
    let valid_last = (pending.get() & valid_bit) != 0 && valid_now;
    if valid_last {
        pending.set(pending.get() & !valid_bit);
    }

    // Valid is the first entry of ALL, so when it has just become false it
    // goes out first here.
    for &prop in P::ALL {
        if pending.get() == 0 {
            break;
        }
        if (pending.get() & prop.bit()) != 0 {
            pending.set(pending.get() & !prop.bit());
            handlers.notify(owner, prop);
        }
    }

    if valid_last {
        handlers.notify(owner, P::VALID);
    }
}

/// Removes a handler registration when dropped.
pub(crate) struct HandlerGuard {
    remove: Option<Box<dyn FnOnce()>>,
}

impl HandlerGuard {
    pub(crate) fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    properties! {
        pub enum TestProperty {
            Valid,
            Alpha,
            Beta,
        }
    }

    #[derive(Clone)]
    struct Obj(Rc<ObjInner>);

    struct ObjInner {
        pending: Cell<u32>,
        valid: Cell<bool>,
        handlers: HandlerList<Obj, TestProperty>,
    }

    fn obj() -> Obj {
        Obj(Rc::new(ObjInner {
            pending: Cell::new(0),
            valid: Cell::new(false),
            handlers: HandlerList::new(),
        }))
    }

    fn record(
        o: &Obj,
        filter: Option<TestProperty>,
    ) -> (HandlerId, Rc<RefCell<Vec<TestProperty>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        let id = o
            .0
            .handlers
            .add(filter, move |_, p| seen2.borrow_mut().push(p));
        (id, seen)
    }

    fn mark(o: &Obj, props: &[TestProperty]) {
        let mut bits = o.0.pending.get();
        for p in props {
            bits |= p.bit();
        }
        o.0.pending.set(bits);
    }

    fn flush(o: &Obj) {
        flush_pending(o, &o.0.pending, o.0.valid.get(), &o.0.handlers);
    }

    #[test]
    fn valid_emitted_last_when_becoming_valid() {
        let o = obj();
        let (_id, seen) = record(&o, None);
        o.0.valid.set(true);
        mark(&o, &[TestProperty::Valid, TestProperty::Alpha, TestProperty::Beta]);
        flush(&o);
        assert_eq!(
            *seen.borrow(),
            vec![TestProperty::Alpha, TestProperty::Beta, TestProperty::Valid]
        );
    }

    #[test]
    fn valid_emitted_first_when_becoming_invalid() {
        let o = obj();
        let (_id, seen) = record(&o, None);
        o.0.valid.set(false);
        mark(&o, &[TestProperty::Valid, TestProperty::Alpha]);
        flush(&o);
        assert_eq!(*seen.borrow(), vec![TestProperty::Valid, TestProperty::Alpha]);
    }

    #[test]
    fn no_pending_no_notifications() {
        let o = obj();
        let (_id, seen) = record(&o, None);
        flush(&o);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn flush_clears_pending() {
        let o = obj();
        mark(&o, &[TestProperty::Alpha]);
        flush(&o);
        assert_eq!(o.0.pending.get(), 0);
    }

    #[test]
    fn filtered_handler_sees_only_its_property() {
        let o = obj();
        let (_a, alpha_seen) = record(&o, Some(TestProperty::Alpha));
        let (_b, all_seen) = record(&o, None);
        mark(&o, &[TestProperty::Alpha, TestProperty::Beta]);
        flush(&o);
        assert_eq!(*alpha_seen.borrow(), vec![TestProperty::Alpha]);
        assert_eq!(
            *all_seen.borrow(),
            vec![TestProperty::Alpha, TestProperty::Beta]
        );
    }

    #[test]
    fn removed_handler_is_not_called() {
        let o = obj();
        let (id, seen) = record(&o, None);
        o.0.handlers.remove(id);
        mark(&o, &[TestProperty::Alpha]);
        flush(&o);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn handler_removed_during_emission_is_skipped() {
        let o = obj();
        // First handler removes the second while the flush is running.
        let victim: Rc<Cell<Option<HandlerId>>> = Rc::new(Cell::new(None));
        let victim2 = Rc::clone(&victim);
        let _a = o.0.handlers.add(None, move |owner: &Obj, _| {
            if let Some(id) = victim2.take() {
                owner.0.handlers.remove(id);
            }
        });
        let (b, seen) = record(&o, None);
        victim.set(Some(b));
        mark(&o, &[TestProperty::Alpha]);
        flush(&o);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn handler_guard_removes_on_drop() {
        let o = obj();
        let (id, seen) = record(&o, None);
        let o2 = o.clone();
        let guard = HandlerGuard::new(move || o2.0.handlers.remove(id));
        drop(guard);
        mark(&o, &[TestProperty::Beta]);
        flush(&o);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn flush_holds_owner_alive() {
        // The only external strong reference is dropped by the handler;
        // the flush must still complete.
        let o = obj();
        let holder: Rc<RefCell<Option<Obj>>> = Rc::new(RefCell::new(Some(o.clone())));
        let holder2 = Rc::clone(&holder);
        let _id = o.0.handlers.add(None, move |_, _| {
            holder2.borrow_mut().take();
        });
        mark(&o, &[TestProperty::Alpha, TestProperty::Beta]);
        let pending = Rc::clone(&o.0);
        flush_pending(&o, &pending.pending, false, &pending.handlers);
        drop(o);
        assert!(holder.borrow().is_none());
    }
}
