//! Per-instance quota sampler. Its only inputs are signals: the manager's
//! periodic STAT/PROF broadcasts, the watcher's SIGPROF nudges, and EXIT
//! requests carrying forwarded external signals.

use std::convert::TryFrom;
use std::sync::Arc;

use log::{debug, warn};
use nix::sys::signal::Signal;
use nix::time::{clock_gettime, ClockId};
use nix::unistd::Pid;

use crate::clock::{ts2ms, ts_max_assign};
use crate::consts::*;
use crate::event::{Event, QuotaKind};
use crate::proc::{from_nix, Snapshot, PROBE_STAT};
use crate::proxy::TraceProxy;
use crate::sandbox::{monitor_begin, monitor_error, post_event, stat_update, Shared, Status};

fn build_sigset(signals: &[i32]) -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        for signo in signals {
            libc::sigaddset(&mut set, *signo);
        }
        set
    }
}

/// Sample the tracee's cpu clock and enforce the cpu quota. Returns true
/// on a fresh breach so the caller can stop listening for PROF.
fn sample_cpu(shared: &Shared, clockid: libc::clockid_t, snap: &Snapshot) -> bool {
    let ts = match clock_gettime(ClockId::from_raw(clockid)) {
        Ok(ts) => ts,
        Err(_) => {
            // the tracee may be gone, taking its clock with it
            warn!("failed to read the prisoner's cpu clock");
            return false;
        }
    };

    let over = {
        let mut st = shared.write();
        ts_max_assign(&mut st.stat.cpu_info.clock, ts);
        let st = st.downgrade();
        ts2ms(st.stat.cpu_info.clock) > st.task.quota(QuotaKind::Cpu)
    };

    if over {
        debug!("cpu quota exceeded");
        post_event(shared, Event::Quota(QuotaKind::Cpu));
        let _ = snap.trace_kill(Signal::SIGSTOP);
        let _ = snap.trace_kill(Signal::SIGCONT);
    }
    over
}

pub(crate) fn profiler_main(shared: Shared, proxy: Arc<TraceProxy>) {
    if !monitor_begin(&shared) {
        return;
    }

    let pid: Pid = shared.read().pid.expect("executing sandbox has a pid");
    let mut snap = Snapshot::new(pid, proxy);

    let mut clockid: libc::clockid_t = 0;
    if unsafe { libc::clock_getcpuclockid(pid.as_raw(), &mut clockid) } != 0 {
        monitor_error(&shared, pid, &std::io::Error::last_os_error());
        return;
    }

    // Hold off until the watcher has handled the first stop: only then
    // has execve replaced the forked image, and only then do memory
    // readings describe the prisoner rather than a copy of ourselves.
    {
        let _st = shared.read_when(|s| s.status != Status::Blk);
    }

    let exit = SIGEXIT as i32;
    let stat = SIGSTAT as i32;
    let prof = SIGPROF as i32;
    let mut sigmask = build_sigset(&[exit, stat, prof]);

    loop {
        {
            let st = shared.read();
            if st.status == Status::Fin {
                break;
            }
        }

        let mut si: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let signo = unsafe { libc::sigwaitinfo(&sigmask, &mut si) };
        if signo < 0 {
            warn!("failed to sigwaitinfo()");
            continue;
        }

        if signo == stat {
            match snap.probe(PROBE_STAT) {
                Ok(()) => {
                    // a memory breach is posted by stat_update; stop
                    // listening for PROF so an ignoring policy cannot be
                    // flooded with quota events
                    let breaches = stat_update(&shared, &snap);
                    if breaches.memory {
                        unsafe {
                            libc::sigdelset(&mut sigmask, prof);
                        }
                    }
                }
                Err(err) => {
                    // the prisoner may simply be gone already
                    warn!("failed to probe process {}: {}", pid, err);
                }
            }
            if sample_cpu(&shared, clockid, &snap) {
                unsafe {
                    libc::sigdelset(&mut sigmask, prof);
                }
            }
        } else if signo == prof {
            if sample_cpu(&shared, clockid, &snap) {
                unsafe {
                    libc::sigdelset(&mut sigmask, prof);
                }
            }
        } else if signo == exit {
            if si.si_code != libc::SI_QUEUE {
                debug!("termination signal {}", signo);
                continue;
            }
            // the manager wraps real signals into the EXIT payload
            let wrapped = unsafe { si.si_value().sival_ptr } as usize as i32;
            match wrapped {
                libc::SIGTERM | libc::SIGQUIT | libc::SIGINT => {
                    // let shells running the supervisor pass Ctrl-C & co
                    // down to the prisoner
                    warn!("forwarding termination signal {}", wrapped);
                    if let Ok(signal) = Signal::try_from(wrapped) {
                        let _ = snap.trace_kill(signal);
                    }
                }
                other => {
                    monitor_error(
                        &shared,
                        pid,
                        &from_nix(nix::errno::Errno::EINTR),
                    );
                    warn!("unexpected signal {}", other);
                }
            }
        }
    }
}
