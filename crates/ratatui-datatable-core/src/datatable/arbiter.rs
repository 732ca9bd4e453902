//! Decides which of several mounted tables receives keyboard input.
//!
//! The arbiter is an explicit, cloneable handle. Tables hold a [`Registration`] for as long as they
//! are mounted; dropping it unregisters the table. Pointer hits are resolved against the area each
//! table last rendered into.

use ratatui::layout::Rect;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use std::time::Instant;

pub type InstanceId = u64;
pub type SubscriptionId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArbiterOptions {
    /// Non-pointer focus changes this soon after a pointer-down are ignored.
    pub pointer_focus_window: Duration,
}

impl Default for ArbiterOptions {
    fn default() -> Self {
        Self {
            pointer_focus_window: Duration::from_millis(150),
        }
    }
}

type Listener = Rc<dyn Fn(Option<InstanceId>)>;

#[derive(Default)]
struct Inner {
    next_id: InstanceId,
    next_subscription: SubscriptionId,
    instances: Vec<(InstanceId, Option<Rect>)>,
    active: Option<InstanceId>,
    last_pointer_down: Option<Instant>,
    typing: bool,
    listeners: Vec<(SubscriptionId, Listener)>,
}

#[derive(Clone)]
pub struct KeyboardArbiter {
    inner: Rc<RefCell<Inner>>,
    options: ArbiterOptions,
}

impl std::fmt::Debug for KeyboardArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("KeyboardArbiter")
            .field("instances", &inner.instances)
            .field("active", &inner.active)
            .field("typing", &inner.typing)
            .finish()
    }
}

impl Default for KeyboardArbiter {
    fn default() -> Self {
        Self::new(ArbiterOptions::default())
    }
}

impl KeyboardArbiter {
    pub fn new(options: ArbiterOptions) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::default())),
            options,
        }
    }

    pub fn register(&self) -> Registration {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.instances.push((id, None));
            id
        };
        log::debug!("keyboard arbiter: registered table {id}");
        Registration {
            id,
            arbiter: self.clone(),
        }
    }

    pub fn active(&self) -> Option<InstanceId> {
        self.inner.borrow().active
    }

    /// Whether `id` should act on navigation keys right now.
    pub fn accepts_keys(&self, id: InstanceId) -> bool {
        let inner = self.inner.borrow();
        !inner.typing && inner.active == Some(id)
    }

    /// Calls `listener` with the new active id whenever it changes.
    pub fn subscribe(&self, listener: impl Fn(Option<InstanceId>) + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner.listeners.push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner
            .borrow_mut()
            .listeners
            .retain(|(id, _)| *id != subscription);
    }

    /// Records the area `id` rendered into, used for pointer hit tests.
    pub fn set_bounds(&self, id: InstanceId, area: Rect) {
        let mut inner = self.inner.borrow_mut();
        if let Some(slot) = inner.instances.iter_mut().find(|(i, _)| *i == id) {
            slot.1 = Some(area);
        }
    }

    /// A pointer press at `(x, y)`: activates the table under it, or deactivates all.
    pub fn pointer_down(&self, x: u16, y: u16, now: Instant) -> Option<InstanceId> {
        let hit = {
            let mut inner = self.inner.borrow_mut();
            inner.last_pointer_down = Some(now);
            inner
                .instances
                .iter()
                .rev()
                .find(|(_, area)| area.is_some_and(|a| contains(a, x, y)))
                .map(|(id, _)| *id)
        };
        self.set_active(hit);
        hit
    }

    /// Keyboard-driven focus. Ignored inside the pointer window; returns whether it was honored.
    pub fn focus(&self, id: InstanceId, now: Instant) -> bool {
        let window = self.options.pointer_focus_window;
        let recent_pointer = self
            .inner
            .borrow()
            .last_pointer_down
            .is_some_and(|at| now.saturating_duration_since(at) < window);
        if recent_pointer {
            return false;
        }
        self.set_active(Some(id));
        true
    }

    pub fn blur_all(&self) {
        self.set_active(None);
    }

    /// Marks that a host-owned text input has focus.
    pub fn set_typing(&self, typing: bool) {
        self.inner.borrow_mut().typing = typing;
    }

    pub fn is_typing(&self) -> bool {
        self.inner.borrow().typing
    }

    fn set_active(&self, next: Option<InstanceId>) {
        let listeners: Vec<Listener> = {
            let mut inner = self.inner.borrow_mut();
            if next.is_some_and(|id| !inner.instances.iter().any(|(i, _)| *i == id)) {
                return;
            }
            if inner.active == next {
                return;
            }
            inner.active = next;
            inner.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        log::debug!("keyboard arbiter: active table is now {next:?}");
        for listener in listeners {
            listener(next);
        }
    }

    fn unregister(inner: &Rc<RefCell<Inner>>, id: InstanceId) -> bool {
        let mut inner = inner.borrow_mut();
        inner.instances.retain(|(i, _)| *i != id);
        if inner.active == Some(id) {
            inner.active = None;
            return true;
        }
        false
    }
}

fn contains(area: Rect, x: u16, y: u16) -> bool {
    x >= area.x && x < area.right() && y >= area.y && y < area.bottom()
}

/// A table's membership in a [`KeyboardArbiter`]. Unregisters on drop.
pub struct Registration {
    id: InstanceId,
    arbiter: KeyboardArbiter,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").field("id", &self.id).finish()
    }
}

impl Registration {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn arbiter(&self) -> &KeyboardArbiter {
        &self.arbiter
    }

    pub fn accepts_keys(&self) -> bool {
        self.arbiter.accepts_keys(self.id)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let inner = &self.arbiter.inner;
        if KeyboardArbiter::unregister(inner, self.id) {
            let listeners: Vec<Listener> =
                inner.borrow().listeners.iter().map(|(_, l)| l.clone()).collect();
            for listener in listeners {
                listener(None);
            }
        }
        log::debug!("keyboard arbiter: unregistered table {}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn pointer_activates_the_table_under_it() {
        let arbiter = KeyboardArbiter::default();
        let a = arbiter.register();
        let b = arbiter.register();
        arbiter.set_bounds(a.id(), Rect::new(0, 0, 10, 5));
        arbiter.set_bounds(b.id(), Rect::new(0, 5, 10, 5));

        let t0 = Instant::now();
        assert_eq!(arbiter.pointer_down(2, 7, t0), Some(b.id()));
        assert!(b.accepts_keys());
        assert!(!a.accepts_keys());

        assert_eq!(arbiter.pointer_down(50, 50, t0), None);
        assert_eq!(arbiter.active(), None);
    }

    #[test]
    fn focus_inside_the_pointer_window_is_ignored() {
        let arbiter = KeyboardArbiter::default();
        let a = arbiter.register();
        let t0 = Instant::now();
        arbiter.pointer_down(99, 99, t0);
        assert!(!arbiter.focus(a.id(), t0 + Duration::from_millis(20)));
        assert_eq!(arbiter.active(), None);
        assert!(arbiter.focus(a.id(), t0 + Duration::from_millis(400)));
        assert_eq!(arbiter.active(), Some(a.id()));
    }

    #[test]
    fn dropping_the_registration_clears_active_and_notifies() {
        let arbiter = KeyboardArbiter::default();
        let seen = Rc::new(Cell::new(Some(0)));
        let sink = seen.clone();
        arbiter.subscribe(move |id| sink.set(id));

        let a = arbiter.register();
        assert!(arbiter.focus(a.id(), Instant::now()));
        assert_eq!(seen.get(), Some(a.id()));

        drop(a);
        assert_eq!(arbiter.active(), None);
        assert_eq!(seen.get(), None);
    }

    #[test]
    fn typing_suspends_keys() {
        let arbiter = KeyboardArbiter::default();
        let a = arbiter.register();
        arbiter.focus(a.id(), Instant::now());
        arbiter.set_typing(true);
        assert!(!a.accepts_keys());
        arbiter.set_typing(false);
        assert!(a.accepts_keys());
    }
}
