//! The trace loop: waits on the prisoner, classifies every stop, turns it
//! into events, lets the policy judge them, and carries out the verdict.

use std::io::{Error, Result};
use std::sync::Arc;

use log::{debug, trace, warn};
use nix::sys::pthread::pthread_kill;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

use crate::consts::*;
use crate::event::{Action, Event, QuotaKind, ScWord};
use crate::proc::{Snapshot, PROBE_OP, PROBE_REGS, PROBE_SIGINFO};
use crate::proxy::{TraceMode, TraceProxy};
use crate::sandbox::{
    monitor_begin, monitor_error, post_event, stat_update, update_status, ResultCode, Shared,
    Status,
};

struct WaitInfo {
    code: i32,
    status: i32,
}

/// `waitid(P_PID, ...)` with the raw CLD_* classification preserved.
fn wait_child(pid: Pid) -> Result<WaitInfo> {
    let mut si: libc::siginfo_t = unsafe { std::mem::zeroed() };
    let res = unsafe {
        libc::waitid(
            libc::P_PID,
            pid.as_raw() as libc::id_t,
            &mut si,
            libc::WEXITED | libc::WSTOPPED,
        )
    };
    if res < 0 {
        return Err(Error::last_os_error());
    }
    Ok(WaitInfo {
        code: si.si_code,
        status: unsafe { si.si_status() },
    })
}

fn note_signal(shared: &Shared, signo: i32, code: i32) {
    let mut st = shared.write();
    st.stat.signal = (signo, code);
}

fn report_signal(shared: &Shared, signo: i32, code: i32) {
    post_event(shared, Event::Signal { signo, code });
    note_signal(shared, signo, code);
}

pub(crate) fn watcher_main(shared: Shared, proxy: Arc<TraceProxy>) {
    if !monitor_begin(&shared) {
        // nothing to supervise, but the tracer is parked in its serve
        // loop and must still be released
        let _ = proxy.end();
        return;
    }

    let (pid, profiler_tid) = {
        let st = shared.read();
        (st.pid.expect("executing sandbox has a pid"), st.profiler_tid)
    };
    let mut snap = Snapshot::new(pid, proxy);

    // Syscall nesting stack: entry pushes the packed word, the matching
    // trap with the same word at top is its return. Empty slots are None:
    // the packed word for read/Linux64 is zero and would collide with a
    // zero sentinel.
    let mut sc_stack: [Option<ScWord>; SC_STACK_MAX] = [None; SC_STACK_MAX];
    let mut sc_top: usize = 0;

    while let Ok(wait) = wait_child(pid) {
        trace!("wait: si_code {} si_status {}", wait.code, wait.status);
        update_status(&shared, Status::Blk);

        if let Err(err) = snap.probe(PROBE_SIGINFO) {
            monitor_error(&shared, pid, &err);
            if shared.read().has_result() {
                debug!("exiting the watching loop");
                break;
            }
        }

        if wait.code == libc::CLD_TRAPPED {
            match wait.status {
                libc::SIGXFSZ => {
                    // kernels up to 3.2 deliver this with si_code SI_USER;
                    // treat it as the kernel's output-limit notice either way
                    post_event(&shared, Event::Quota(QuotaKind::Disk));
                    note_signal(&shared, wait.status, snap.siginfo.si_code);
                }
                libc::SIGTRAP => {
                    if let Err(err) = snap.probe(PROBE_REGS | PROBE_OP) {
                        monitor_error(&shared, pid, &err);
                    } else if snap.is_syscall() || snap.is_sysret() {
                        let sc = snap.the_syscall();
                        {
                            let mut st = shared.write();
                            st.stat.syscall = sc;
                        }
                        if sc_stack[sc_top] != Some(sc) {
                            snap.set_in_syscall();
                            if sc_top + 1 < SC_STACK_MAX {
                                sc_top += 1;
                                sc_stack[sc_top] = Some(sc);
                            } else {
                                warn!("syscall nesting deeper than {}", SC_STACK_MAX);
                            }
                            let args = snap.syscall_args();
                            post_event(&shared, Event::Syscall { sc, args });
                        } else {
                            let retval = snap.sysret_retval();
                            post_event(&shared, Event::Sysret { sc, retval });
                            sc_stack[sc_top] = None;
                            sc_top = sc_top.saturating_sub(1);
                            snap.clr_in_syscall();
                        }
                        count_tsc(&shared);
                    } else if snap.siginfo.si_code == libc::SI_USER && snap.post_execve {
                        report_signal(&shared, wait.status, snap.siginfo.si_code);
                    } else {
                        if snap.siginfo.si_code == libc::SI_USER {
                            // Linux raises one synthetic SIGTRAP right
                            // after execve; swallow it once
                            debug!("detected: post-execve SIGTRAP");
                            snap.post_execve = true;
                        }
                        // a plain single-step trap is no event at all
                        count_tsc(&shared);
                    }
                }
                other => {
                    report_signal(&shared, other, snap.siginfo.si_code);
                }
            }
        } else if wait.code == libc::CLD_STOPPED
            || wait.code == libc::CLD_KILLED
            || wait.code == libc::CLD_DUMPED
        {
            debug!("wait: signaled ({})", wait.status);
            report_signal(&shared, wait.status, snap.siginfo.si_code);
        } else if wait.code == libc::CLD_EXITED {
            debug!("wait: exited ({})", wait.status);
            {
                let mut st = shared.write();
                st.stat.exitcode = wait.status;
            }
            post_event(&shared, Event::Exit(wait.status));
        } else {
            debug!("wait: unknown si_code {}", wait.code);
        }

        stat_update(&shared, &snap);
        if let Some(tid) = profiler_tid {
            let _ = pthread_kill(tid, SIGPROF);
        }

        drain_queue(&shared, &snap);

        let mode = if cfg!(feature = "software_tsc") {
            TraceMode::SingleStep
        } else {
            TraceMode::SystemCall
        };
        if let Err(err) = snap.trace_next(mode) {
            monitor_error(&shared, pid, &err);
            if shared.read().has_result() {
                debug!("exiting the watching loop");
                break;
            }
        }

        update_status(&shared, Status::Exe);
    }

    update_status(&shared, Status::Fin);
    {
        let mut st = shared.write();
        if !st.has_result() {
            // the tracee is gone and the policy never decided
            st.result = ResultCode::BP;
        }
    }

    let _ = snap.trace_end();
}

/// Consume pending events in FIFO order. The policy is consulted under
/// the shared lock; carrying out its verdict relocks exclusively, and a
/// terminal verdict wipes the queue and condemns the prisoner.
fn drain_queue(shared: &Shared, snap: &Snapshot) {
    let mut st = shared.read();
    while let Some(event) = st.queue.head().cloned() {
        let action = st.policy.decide(&event);
        debug!("event {:?}, action {:?}", event, action);
        let mut stw = st.upgrade();
        match action {
            Action::Cont => {
                stw.queue.pop();
            }
            Action::Fini(result) | Action::Kill(result) => {
                stw.result = result;
                stw.queue.clear();
                let _ = snap.trace_kill(Signal::SIGKILL);
            }
        }
        st = stw.downgrade();
    }
}

#[cfg(feature = "software_tsc")]
fn count_tsc(shared: &Shared) {
    let mut st = shared.write();
    st.stat.cpu_info.tsc += 1;
}

#[cfg(not(feature = "software_tsc"))]
fn count_tsc(_shared: &Shared) {}
