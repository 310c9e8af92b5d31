// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graphics-context admission between threads.
//!
//! Binding, uploading and drawing may only happen on the thread that holds
//! the context. A thread entering a context scope while another thread owns
//! it waits until that scope ends. The owning thread may nest scopes.

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use tracing::trace;

#[derive(Debug, Default)]
struct Owner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// Blocking admission lock for one graphics context
#[derive(Debug, Default)]
pub struct ContextLock {
    owner: Mutex<Owner>,
    released: Condvar,
}

impl ContextLock {
    /// Create an unowned context lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a context scope, waiting while another thread owns the context
    pub fn acquire(&self) -> ContextGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        while owner.thread.is_some_and(|thread| thread != me) {
            trace!("Waiting for graphics context");
            self.released.wait(&mut owner);
        }
        owner.thread = Some(me);
        owner.depth += 1;
        ContextGuard { lock: self }
    }

    /// Enter a context scope only if no other thread owns the context
    pub fn try_acquire(&self) -> Option<ContextGuard<'_>> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if owner.thread.is_some_and(|thread| thread != me) {
            return None;
        }
        owner.thread = Some(me);
        owner.depth += 1;
        Some(ContextGuard { lock: self })
    }

    /// Whether the calling thread currently owns the context
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.lock().thread == Some(thread::current().id())
    }

    /// Nesting depth of the current owner, 0 when unowned
    pub fn depth(&self) -> usize {
        self.owner.lock().depth
    }

    fn exit(&self) {
        let mut owner = self.owner.lock();
        owner.depth -= 1;
        if owner.depth == 0 {
            owner.thread = None;
            drop(owner);
            self.released.notify_one();
        }
    }
}

/// Scope of context ownership; leaving the scope releases one nesting level
#[derive(Debug)]
pub struct ContextGuard<'a> {
    lock: &'a ContextLock,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.lock.exit();
    }
}
