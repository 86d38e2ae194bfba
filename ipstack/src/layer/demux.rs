use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use super::Recv;

/// Identifies one registration in a [`Demux`].
///
/// [`Demux`]: struct.Demux.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u64);

/// A map from protocol key to a single handler.
pub struct Demux<K, P: ?Sized> {
    name: &'static str,
    handlers: RwLock<HashMap<K, Entry<P>>>,
}

struct Entry<P: ?Sized> {
    handle: Handle,
    handler: Arc<dyn Recv<P>>,
}

impl Handle {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Handle(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl<K, P: ?Sized> Demux<K, P>
    where K: Copy + Eq + Hash + fmt::Debug
{
    /// Create an empty map, the name is used for logging.
    pub fn new(name: &'static str) -> Self {
        Demux {
            name,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Set the handler of a key, silently replacing the previous one.
    pub fn register(&self, key: K, handler: Arc<dyn Recv<P>>) -> Handle {
        let handle = Handle::next();
        let previous = self.write().insert(key, Entry { handle, handler });
        if previous.is_some() {
            net_debug!("{}: replaced handler for {:?}", self.name, key);
        }
        handle
    }

    /// Remove the handler of a key.
    pub fn unregister(&self, key: K) -> bool {
        self.write().remove(&key).is_some()
    }

    /// Remove the handler registered with this handle, if it is still registered.
    pub fn unregister_handle(&self, handle: Handle) -> bool {
        let mut handlers = self.write();
        let key = handlers.iter()
            .find(|(_, entry)| entry.handle == handle)
            .map(|(key, _)| *key);
        match key {
            Some(key) => handlers.remove(&key).is_some(),
            None => false,
        }
    }

    /// Remove all handlers.
    pub fn clear(&self) {
        self.write().clear()
    }

    /// Check if a handler is registered for the key.
    pub fn contains(&self, key: K) -> bool {
        self.read().contains_key(&key)
    }

    /// The number of registered handlers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hand a packet to the handler of its key.
    ///
    /// Returns `false` if no handler was registered. The handler is called without holding the
    /// lock, so it may itself register or unregister. Errors and panics of the handler are logged
    /// and otherwise ignored.
    pub fn dispatch(&self, key: K, packet: &P) -> bool {
        let handler = match self.read().get(&key) {
            Some(entry) => entry.handler.clone(),
            None => {
                net_trace!("{}: no handler for {:?}", self.name, key);
                return false;
            },
        };

        deliver(self.name, key, &*handler, packet);
        true
    }

    fn read(&self) -> RwLockReadGuard<HashMap<K, Entry<P>>> {
        // Entries are replaced whole, a poisoned map is still consistent.
        self.handlers.read().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<HashMap<K, Entry<P>>> {
        self.handlers.write().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Call a handler, containing its errors and panics.
pub(crate) fn deliver<K, P>(name: &str, key: K, handler: &dyn Recv<P>, packet: &P)
    where K: fmt::Debug, P: ?Sized
{
    match panic::catch_unwind(AssertUnwindSafe(|| handler.receive(packet))) {
        Ok(Ok(())) => (),
        Ok(Err(err)) => net_warn!("{}: handler for {:?} failed: {}", name, key, err),
        Err(_) => net_warn!("{}: handler for {:?} panicked", name, key),
    }
}

impl<K, P: ?Sized> fmt::Debug for Demux<K, P>
    where K: Copy + Eq + Hash + fmt::Debug
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let keys: Vec<K> = self.read().keys().cloned().collect();
        f.debug_struct("Demux")
            .field("name", &self.name)
            .field("keys", &keys)
            .finish()
    }
}
