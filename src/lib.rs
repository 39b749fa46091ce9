//! `tracebox` supervises an untrusted program on Linux/x86: every system
//! call and delivered signal is judged by a configurable policy, and
//! wall-clock time, cpu time, virtual memory, and output size are held to
//! quotas sampled in real time. A run ends with a structured verdict
//! ([`ResultCode`]) describing how the prisoner terminated.
//!
//! ```no_run
//! use tracebox::{QuotaKind, Sandbox};
//!
//! tracebox::init();
//! let mut sandbox = Sandbox::new(&["/bin/true"]).unwrap();
//! sandbox.with_task(|task| task.set_quota(QuotaKind::WallClock, 5_000));
//! let result = sandbox.execute();
//! println!("{} in {:?}", result, sandbox.stat().elapsed);
//! tracebox::shutdown();
//! ```
//!
//! [`init`] claims `SIGUSR1`, `SIGUSR2` and `SIGPROF` process-wide and
//! intercepts `SIGTERM`/`SIGQUIT`/`SIGINT` (they are re-delivered to the
//! prisoners). Call it from the main thread before spawning anything, and
//! [`shutdown`] before exit.

#[macro_use]
extern crate lazy_static;

pub mod clock;
pub mod consts;
pub mod event;
pub mod nr;
pub mod policy;
pub mod proc;
pub mod proxy;
pub mod rwlock;
pub mod sandbox;

mod manager;
mod profiler;
mod watcher;

pub use crate::event::{Action, Event, QuotaKind, ScMode, ScWord};
pub use crate::manager::{init, shutdown};
pub use crate::policy::{DefaultPolicy, Policy};
pub use crate::sandbox::{ResultCode, Sandbox, Stat, Status, Task, QUOTA_INF};
