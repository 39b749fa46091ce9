//! The process-wide ticker. One thread paces STAT/PROF broadcasts to
//! every active sandbox and relays external termination signals; a
//! discrete PID controller calibrates the sleep between ticks so the
//! realized frequency converges on the target despite scheduling noise.

use std::convert::TryFrom;
use std::os::unix::thread::JoinHandleExt;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use log::{debug, trace, warn};
use nix::errno::Errno;
use nix::sys::pthread::{pthread_kill, Pthread};
use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};
use nix::sys::time::{TimeSpec, TimeValLike};
use nix::time::{clock_getres, clock_gettime, ClockId};

use crate::clock::{fts2ms, ms2ts, ts_add, ts_sub, ts_zero};
use crate::consts::*;
use crate::sandbox::Shared;

lazy_static! {
    static ref REGISTRY: Mutex<Vec<Shared>> = Mutex::new(Vec::new());
    static ref MANAGER: Mutex<Option<ManagerHandle>> = Mutex::new(None);
}

struct ManagerHandle {
    thread: JoinHandle<()>,
    tid: Pthread,
    saved: SigSet,
}

/// Start the library: block the reserved and intercepted signals in the
/// calling thread (threads created afterwards inherit the mask) and
/// launch the manager. Call once, early, from the main thread. Idempotent.
pub fn init() {
    let mut slot = MANAGER.lock().unwrap();
    if slot.is_some() {
        return;
    }

    let mut newmask = SigSet::empty();
    newmask.add(SIGEXIT);
    newmask.add(SIGSTAT);
    newmask.add(SIGPROF);
    newmask.add(Signal::SIGTERM);
    newmask.add(Signal::SIGQUIT);
    newmask.add(Signal::SIGINT);
    let mut saved = SigSet::empty();
    if pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&newmask), Some(&mut saved)).is_err() {
        warn!("failed to block reserved signals");
    }
    debug!("blocked reserved signals");

    match thread::Builder::new()
        .name("sbox-manager".into())
        .spawn(manager_main)
    {
        Ok(thread) => {
            let tid = thread.as_pthread_t();
            *slot = Some(ManagerHandle { thread, tid, saved });
            debug!("created the manager thread");
        }
        Err(err) => warn!("failed to create the manager thread: {}", err),
    }
}

/// Stop the library: end the manager, tell any straggling profilers to
/// quit, drain pending reserved signals, and restore the signal mask
/// saved by [`init`]. Idempotent.
pub fn shutdown() {
    let handle = match MANAGER.lock().unwrap().take() {
        Some(handle) => handle,
        None => return,
    };

    let _ = pthread_kill(handle.tid, SIGEXIT);
    if handle.thread.join().is_err() {
        warn!("failed to join the manager thread");
    }
    debug!("joined the manager thread");

    {
        let mut registry = REGISTRY.lock().unwrap();
        for sandbox in registry.drain(..) {
            let tid = sandbox.read().profiler_tid;
            if let Some(tid) = tid {
                let _ = pthread_kill(tid, SIGEXIT);
            }
        }
    }

    // Profiling signals target the whole process and may still be
    // pending after every profiler thread is gone; flush them before
    // giving the mask back.
    let mask = build_sigset(&[
        SIGEXIT as i32,
        SIGSTAT as i32,
        SIGPROF as i32,
        libc::SIGTERM,
        libc::SIGQUIT,
        libc::SIGINT,
    ]);
    let timeout = libc::timespec {
        tv_sec: 0,
        tv_nsec: 20_000_000,
    };
    loop {
        let mut si: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let signo = unsafe { libc::sigtimedwait(&mask, &mut si, &timeout) };
        if signo <= 0 {
            break;
        }
        debug!("flushing signal {}", signo);
    }

    let _ = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&handle.saved), None);
    debug!("restored old signal mask");
}

pub(crate) fn register(sandbox: Shared) {
    let mut registry = REGISTRY.lock().unwrap();
    registry.push(sandbox);
}

pub(crate) fn unregister(sandbox: &Shared) {
    let mut registry = REGISTRY.lock().unwrap();
    registry.retain(|other| !std::sync::Arc::ptr_eq(other, sandbox));
}

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

/// Wake one sandbox. Reserved signals go straight to its profiler
/// thread; anything else rides in the payload of SIGEXIT, since the
/// profiler only ever waits on the reserved set.
fn notify(sandbox: &Shared, signo: i32) {
    let tid = match sandbox.read().profiler_tid {
        Some(tid) => tid,
        None => return,
    };
    match Signal::try_from(signo) {
        Ok(signal) if signal == SIGEXIT || signal == SIGSTAT || signal == SIGPROF => {
            let _ = pthread_kill(tid, signal);
        }
        _ => {
            let value = libc::sigval {
                sival_ptr: signo as usize as *mut libc::c_void,
            };
            unsafe {
                libc::pthread_sigqueue(tid, SIGEXIT as i32, value);
            }
        }
    }
}

fn manager_main() {
    let sigmask = build_sigset(&[
        SIGEXIT as i32,
        libc::SIGTERM,
        libc::SIGQUIT,
        libc::SIGINT,
    ]);

    // One profiling cycle; frequencies beyond what the clock can pace
    // are relaxed to twice its resolution.
    let mut cycle = TimeSpec::nanoseconds(1_000_000_000 / PROF_FREQ as i64);
    if let Ok(res) = clock_getres(ClockId::CLOCK_MONOTONIC) {
        let eps = ts_add(res, res);
        if cycle < eps {
            cycle = eps;
        }
    } else {
        warn!("failed to get clock resolution");
    }
    debug!("manager broadcasting at {:.2}Hz", 1000.0 / fts2ms(cycle));

    // Discrete PID controller: SP is the cycle, PV the measured
    // inter-tick interval, MV the calibrated sleep for the next cycle.
    const KP: f64 = 0.75;
    const KI: f64 = 0.25;
    const KD: f64 = 0.0;
    let cycle_ms = fts2ms(cycle);
    let mv_min = cycle_ms / 2.0;
    let mv_max = cycle_ms;

    let mut timeout = cycle;
    let mut t = ts_zero();
    let mut prev_error = 0.0f64;
    let mut error = 0.0f64;
    let mut integral = 0.0f64;
    let mut count: u64 = 0;
    let mut end = false;

    while !end {
        let now = match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(now) => now,
            Err(_) => {
                warn!("failed to get current time");
                continue;
            }
        };
        if now < t {
            warn!("invalid previous time");
            continue;
        }
        let mut delta = ts_sub(now, t);
        t = now;
        if !(delta < t) {
            // no previous tick to measure against
            delta = cycle;
        }
        error += fts2ms(delta);
        integral += fts2ms(delta);

        // Poll for control signals without blocking; an empty set means
        // this wake-up is a genuine timer tick.
        let mut si: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let poll = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        let mut signo = unsafe { libc::sigtimedwait(&sigmask, &mut si, &poll) };
        let mut si_code = si.si_code;
        if signo < 0 {
            if Errno::last() == Errno::EAGAIN {
                si_code = libc::SI_TIMER;
                signo = if count % STAT_FREQ as u64 == 0 {
                    SIGSTAT as i32
                } else {
                    SIGPROF as i32
                };
            } else {
                warn!("failed to sigtimedwait()");
            }
        }

        if signo >= 0 {
            // SIGEXIT ends the manager; what fans out then is SIGKILL
            if signo == SIGEXIT as i32 {
                end = true;
                signo = libc::SIGKILL;
            }
            let registry = REGISTRY.lock().unwrap();
            for sandbox in registry.iter() {
                notify(sandbox, signo);
            }
        }

        if si_code == libc::SI_TIMER {
            count += 1;
            error -= cycle_ms;
            integral -= cycle_ms;
            let derivative = error - prev_error;
            let feedback = KP * error + KI * integral + KD * derivative;
            let mut timeout_ms = cycle_ms - feedback;
            if timeout_ms < mv_min {
                timeout_ms = mv_min;
            }
            if timeout_ms > mv_max {
                timeout_ms = mv_max;
            }
            timeout = ms2ts(timeout_ms);
            trace!(
                "manager beacon ({:06}): PV={:.2} / P={:.2}, I={:.2}, D={:.2} / MV={:.2}",
                count,
                fts2ms(delta),
                error,
                integral,
                derivative,
                timeout_ms
            );
            prev_error = error;
            error = 0.0;
        } else {
            // preempted by a signal: finish the remaining sleep
            timeout = ts_sub(timeout, delta);
        }

        let sleep = libc::timespec {
            tv_sec: timeout.tv_sec(),
            tv_nsec: timeout.tv_nsec(),
        };
        let rc = unsafe { libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &sleep, std::ptr::null_mut()) };
        if rc > 0 {
            warn!("failed in clock_nanosleep()");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The clamp band of the controller output must hold for any error
    // history; replay the arithmetic with hostile inputs.
    #[test]
    fn controller_output_stays_in_band() {
        const KP: f64 = 0.75;
        const KI: f64 = 0.25;
        let cycle_ms = 10.0;
        let mv_min = cycle_ms / 2.0;
        let mv_max = cycle_ms;

        let mut prev_error;
        let mut error = 0.0f64;
        let mut integral = 0.0f64;
        for &delta in &[10.0f64, 35.0, 2.0, 500.0, 0.01, 10.0, 10.0] {
            error += delta;
            integral += delta;
            error -= cycle_ms;
            integral -= cycle_ms;
            let feedback = KP * error + KI * integral;
            let mut timeout = cycle_ms - feedback;
            if timeout < mv_min {
                timeout = mv_min;
            }
            if timeout > mv_max {
                timeout = mv_max;
            }
            assert!(timeout >= mv_min && timeout <= mv_max);
            prev_error = error;
            error = 0.0;
            let _ = prev_error;
        }
    }

    #[test]
    fn init_and_shutdown_are_idempotent() {
        init();
        init();
        shutdown();
        shutdown();
    }
}
