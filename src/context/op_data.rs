use std::any::Any;

use crate::error::{Error, Result};


/// Kind of per-operation data stored in a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpDataKind {
    Sign,
    Encrypt,
    Decrypt,
    Delete,
    Edit,
    Passphrase,
    Trustlist,
}


type Cleanup = Box<dyn FnOnce(&mut dyn Any)>;


struct OpDataEntry {
    kind: OpDataKind,
    payload: Box<dyn Any>,

    /// Runs right before the payload is dropped
    cleanup: Option<Cleanup>,
}


/// Per-context storage of operation data, one entry per kind.
///
/// Payloads are boxed, so references handed out stay valid until
/// [`OpDataRegistry::release_all`] runs.
#[derive(Default)]
pub struct OpDataRegistry {
    /// Oldest entry first
    entries: Vec<OpDataEntry>,
}


impl OpDataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        OpDataRegistry::default()
    }

    /// Looks up existing data without allocating anything.
    ///
    /// Returns `None` if no data of `kind` exists or it has another type.
    ///
    /// * `kind` - kind of data
    pub fn lookup<T: Any>(&mut self, kind: OpDataKind) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|e| e.kind == kind)?
            .payload
            .downcast_mut()
    }

    /// Returns existing data or creates default-initialized data.
    ///
    /// For existing data `cleanup` is ignored. Fails with `InvalidValue` if
    /// data of `kind` exists with a different type and with `OutOfMemory` if
    /// the registry cannot grow, leaving the registry untouched.
    ///
    /// * `kind` - kind of data
    /// * `cleanup` - function to run on the payload when it is released
    pub fn lookup_or_create<T: Any + Default>(&mut self, kind: OpDataKind, cleanup: Option<fn(&mut T)>)
        -> Result<&mut T>
    {
        let index = match self.position(kind) {
            Some(index) => index,
            None => self.create::<T>(kind, cleanup)?,
        };

        self.entries[index]
            .payload
            .downcast_mut()
            .ok_or_else(|| Error::invalid_value(format!("Operation data {:?} has another type", kind)))
    }

    /// Check if data of `kind` exists.
    pub fn contains(&self, kind: OpDataKind) -> bool {
        self.position(kind)
            .is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries
            .is_empty()
    }

    /// Runs cleanups of all entries, newest first, and drops them.
    pub fn release_all(&mut self) {
        while let Some(mut entry) = self.entries.pop() {
            if let Some(cleanup) = entry.cleanup.take() {
                cleanup(entry.payload.as_mut());
            }
        }
    }

    fn position(&self, kind: OpDataKind) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.kind == kind)
    }

    fn create<T: Any + Default>(&mut self, kind: OpDataKind, cleanup: Option<fn(&mut T)>) -> Result<usize> {
        self.entries.try_reserve(1)?;

        let cleanup = cleanup.map(|cleanup| -> Cleanup {
            Box::new(move |payload: &mut dyn Any| {
                if let Some(payload) = payload.downcast_mut::<T>() {
                    cleanup(payload);
                }
            })
        });

        self.entries.push(OpDataEntry {
            kind: kind,
            payload: Box::new(T::default()),
            cleanup: cleanup,
        });

        Ok(self.entries.len() - 1)
    }
}


impl Drop for OpDataRegistry {
    fn drop(&mut self) {
        self.release_all();
    }
}
