//! The event -> action decision seam.
//!
//! A policy must be re-entrant and must not block on I/O: it runs under the
//! sandbox's shared lock, on the watcher thread, between two trace stops.

use log::warn;

use crate::event::{Action, Event, QuotaKind};
use crate::nr;
use crate::sandbox::ResultCode;

pub trait Policy: Send + Sync {
    fn decide(&self, event: &Event) -> Action;
}

/// Baseline black-list policy.
///
/// Kills with `RF` on process-management syscalls (either calling
/// convention) and on syscalls whose mode could not be classified; lets
/// everything else run. Exit code 0 finishes `OK`, anything else `AT`.
/// `SIGSTOP`/`SIGCONT` pass through (the supervisor uses them to force
/// event handling); other signals are fatal `RT`. Quota events map to the
/// matching limit result.
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {
    fn decide(&self, event: &Event) -> Action {
        match *event {
            Event::Syscall { sc, .. } => {
                if !sc.mode_known() {
                    warn!("illegal syscall mode: {:?}", sc);
                    return Action::Kill(ResultCode::RF);
                }
                if nr::RESTRICTED.contains(&sc) {
                    Action::Kill(ResultCode::RF)
                } else {
                    Action::Cont
                }
            }
            Event::Sysret { .. } => Action::Cont,
            Event::Exit(0) => Action::Fini(ResultCode::OK),
            Event::Exit(_) => Action::Fini(ResultCode::AT),
            Event::Signal { signo, .. } => {
                if signo == libc::SIGSTOP || signo == libc::SIGCONT {
                    Action::Cont
                } else {
                    Action::Kill(ResultCode::RT)
                }
            }
            Event::Quota(kind) => match kind {
                QuotaKind::WallClock | QuotaKind::Cpu => Action::Kill(ResultCode::TL),
                QuotaKind::Memory => Action::Kill(ResultCode::ML),
                QuotaKind::Disk => Action::Kill(ResultCode::OL),
            },
            Event::Error { .. } => Action::Kill(ResultCode::IE),
        }
    }
}
