//! Reader/writer lock guarding all mutable sandbox state.
//!
//! This is not `std::sync::RwLock`: acquisition can be made conditional on
//! a predicate over the protected value (`read_when` / `write_when`), and a
//! held guard can be upgraded or downgraded without releasing the metadata
//! mutex in between. Every release broadcasts the reader condition, and the
//! writer condition once no readers remain, so predicate waiters re-check
//! after any state change.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex};

struct Meta {
    rdcount: usize,
    wrlock: bool,
}

pub struct SboxLock<T> {
    meta: Mutex<Meta>,
    rdc: Condvar,
    wrc: Condvar,
    cell: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for SboxLock<T> {}
unsafe impl<T: Send + Sync> Sync for SboxLock<T> {}

pub struct ReadGuard<'a, T> {
    lock: &'a SboxLock<T>,
}

pub struct WriteGuard<'a, T> {
    lock: &'a SboxLock<T>,
}

impl<T> SboxLock<T> {
    pub fn new(value: T) -> Self {
        SboxLock {
            meta: Mutex::new(Meta {
                rdcount: 0,
                wrlock: false,
            }),
            rdc: Condvar::new(),
            wrc: Condvar::new(),
            cell: UnsafeCell::new(value),
        }
    }

    pub fn read(&self) -> ReadGuard<T> {
        self.read_when(|_| true)
    }

    /// Shared lock, acquired once no writer is active and `cond` holds.
    /// The predicate runs under the metadata mutex with no writer active.
    pub fn read_when<F>(&self, mut cond: F) -> ReadGuard<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut m = self.meta.lock().unwrap();
        while m.wrlock || !cond(unsafe { &*self.cell.get() }) {
            m = self.rdc.wait(m).unwrap();
        }
        m.rdcount += 1;
        drop(m);
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<T> {
        self.write_when(|_| true)
    }

    /// Exclusive lock, acquired once no writer or reader is active and
    /// `cond` holds.
    pub fn write_when<F>(&self, mut cond: F) -> WriteGuard<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut m = self.meta.lock().unwrap();
        while m.wrlock || m.rdcount > 0 || !cond(unsafe { &*self.cell.get() }) {
            m = self.wrc.wait(m).unwrap();
        }
        m.wrlock = true;
        drop(m);
        WriteGuard { lock: self }
    }

    fn unlock_read(&self) {
        let mut m = self.meta.lock().unwrap();
        debug_assert!(m.rdcount > 0);
        m.rdcount -= 1;
        self.rdc.notify_all();
        if m.rdcount == 0 {
            self.wrc.notify_all();
        }
    }

    fn unlock_write(&self) {
        let mut m = self.meta.lock().unwrap();
        debug_assert!(m.wrlock);
        m.wrlock = false;
        self.rdc.notify_all();
        self.wrc.notify_all();
    }
}

impl<'a, T> ReadGuard<'a, T> {
    /// Relock shared -> exclusive. The shared hold is released first, so
    /// the protected value may change before the exclusive hold begins.
    pub fn upgrade(self) -> WriteGuard<'a, T> {
        let lock = self.lock;
        std::mem::forget(self);
        let mut m = lock.meta.lock().unwrap();
        debug_assert!(m.rdcount > 0);
        m.rdcount -= 1;
        while m.wrlock || m.rdcount > 0 {
            m = lock.wrc.wait(m).unwrap();
        }
        m.wrlock = true;
        drop(m);
        WriteGuard { lock }
    }
}

impl<'a, T> WriteGuard<'a, T> {
    /// Relock exclusive -> shared, without letting another writer in
    /// between.
    pub fn downgrade(self) -> ReadGuard<'a, T> {
        let lock = self.lock;
        std::mem::forget(self);
        let mut m = lock.meta.lock().unwrap();
        debug_assert!(m.wrlock);
        m.wrlock = false;
        m.rdcount += 1;
        lock.rdc.notify_all();
        drop(m);
        ReadGuard { lock }
    }
}

impl<'a, T> Deref for ReadGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.cell.get() }
    }
}

impl<'a, T> Deref for WriteGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.cell.get() }
    }
}

impl<'a, T> DerefMut for WriteGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.cell.get() }
    }
}

impl<'a, T> Drop for ReadGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

impl<'a, T> Drop for WriteGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn writers_exclude_writers() {
        let lock = Arc::new(SboxLock::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let mut g = lock.write();
                    *g += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 8000);
    }

    #[test]
    fn write_when_blocks_until_condition() {
        let lock = Arc::new(SboxLock::new(false));
        let (tx, rx) = mpsc::channel();
        let waiter = {
            let lock = lock.clone();
            thread::spawn(move || {
                let g = lock.write_when(|ready| *ready);
                tx.send(*g).unwrap();
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());
        *lock.write() = true;
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), true);
        waiter.join().unwrap();
    }

    #[test]
    fn readers_share() {
        let lock = Arc::new(SboxLock::new(7i32));
        let g1 = lock.read();
        let g2 = lock.read();
        assert_eq!(*g1 + *g2, 14);
    }

    #[test]
    fn upgrade_and_downgrade() {
        let lock = SboxLock::new(1i32);
        let r = lock.read();
        assert_eq!(*r, 1);
        let mut w = r.upgrade();
        *w = 2;
        let r = w.downgrade();
        assert_eq!(*r, 2);
        drop(r);
        // lock must be fully released afterwards
        let mut w = lock.write();
        *w = 3;
    }

    #[test]
    fn writer_waits_for_readers() {
        let lock = Arc::new(SboxLock::new(0i32));
        let r = lock.read();
        let writer = {
            let lock = lock.clone();
            thread::spawn(move || {
                *lock.write() = 9;
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*r, 0);
        drop(r);
        writer.join().unwrap();
        assert_eq!(*lock.read(), 9);
    }
}
