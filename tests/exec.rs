//! End-to-end supervision scenarios: real fork, real ptrace, real clocks.

mod common;

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracebox::clock::ts2ms;
use tracebox::{Action, Event, Policy, QuotaKind, ResultCode, Sandbox, Stat, Task};

/// Run a command under supervision with quiet /dev/null channels and a
/// 30 s wall-clock safety net, then hand back verdict and statistics.
fn supervise<F>(argv: &[&str], tune: F) -> (ResultCode, Stat)
where
    F: FnOnce(&mut Task),
{
    common::setup();

    let input = File::open("/dev/null").unwrap();
    let output = OpenOptions::new().write(true).open("/dev/null").unwrap();
    let errout = OpenOptions::new().write(true).open("/dev/null").unwrap();

    let mut sandbox = Sandbox::new(argv).unwrap();
    sandbox.with_task(|task| {
        task.ifd = input.as_raw_fd();
        task.ofd = output.as_raw_fd();
        task.efd = errout.as_raw_fd();
        task.set_quota(QuotaKind::WallClock, 30_000);
        tune(task);
    });
    let result = sandbox.execute();
    (result, sandbox.stat())
}

#[test]
fn trivial_exit_is_ok() {
    let (result, stat) = supervise(&["/bin/true"], |_| {});
    assert_eq!(result, ResultCode::OK);
    assert_eq!(stat.exitcode, 0);
    assert!(stat.mem_info.vsize_peak > 0);
    assert!(ts2ms(stat.elapsed) < 30_000);
}

#[test]
fn nonzero_exit_is_abnormal_termination() {
    let (result, stat) = supervise(&["/bin/sh", "-c", "exit 5"], |_| {});
    assert_eq!(result, ResultCode::AT);
    assert_eq!(stat.exitcode, 5);
}

#[test]
fn forking_is_a_restricted_function() {
    // a pipeline forces the shell to fork
    let (result, stat) = supervise(&["/bin/sh", "-c", ":|:"], |_| {});
    assert_eq!(result, ResultCode::RF);
    // the offending syscall word is the last one on record
    assert!(tracebox::nr::RESTRICTED.contains(&stat.syscall));
}

#[test]
fn cpu_bomb_hits_the_time_limit() {
    let (result, stat) = supervise(&["/bin/sh", "-c", "while :; do :; done"], |task| {
        task.set_quota(QuotaKind::Cpu, 1_000);
    });
    assert_eq!(result, ResultCode::TL);
    assert!(ts2ms(stat.cpu_info.clock) >= 1_000);
    // wall clock can only be ahead of the cpu clock
    assert!(ts2ms(stat.elapsed) + 100 >= ts2ms(stat.cpu_info.clock));
}

#[test]
fn sleeping_past_the_wallclock_quota_is_tl() {
    let (result, stat) = supervise(&["/bin/sleep", "10"], |task| {
        task.set_quota(QuotaKind::WallClock, 500);
    });
    assert_eq!(result, ResultCode::TL);
    assert!(ts2ms(stat.elapsed) >= 500);
    assert!(ts2ms(stat.elapsed) < 10_000);
}

#[test]
fn fatal_signal_is_a_runtime_error() {
    let (result, stat) = supervise(&["/bin/sh", "-c", "kill -11 $$"], |_| {});
    assert_eq!(result, ResultCode::RT);
    assert_eq!(stat.signal.0, libc::SIGSEGV);
}

#[test]
fn memory_bomb_hits_the_memory_limit() {
    // tail of an endless stream with no newlines buffers without bound
    let tail = ["/usr/bin/tail", "/bin/tail"]
        .iter()
        .find(|p| Path::new(p).exists());
    let tail = match tail {
        Some(tail) => *tail,
        None => return, // no suitable allocator victim on this host
    };
    let (result, stat) = supervise(&[tail, "/dev/zero"], |task| {
        task.set_quota(QuotaKind::Memory, 32 * 1024 * 1024);
    });
    assert_eq!(result, ResultCode::ML);
    assert!(stat.mem_info.vsize_peak >= 32 * 1024 * 1024);
}

struct Lenient;

impl Policy for Lenient {
    fn decide(&self, event: &Event) -> Action {
        match *event {
            Event::Exit(_) => Action::Fini(ResultCode::OK),
            _ => Action::Cont,
        }
    }
}

#[test]
fn user_policy_overrides_the_default() {
    common::setup();

    let input = File::open("/dev/null").unwrap();
    let output = OpenOptions::new().write(true).open("/dev/null").unwrap();

    let mut sandbox = Sandbox::new(&["/bin/sh", "-c", "exit 3"]).unwrap();
    sandbox.set_policy(Box::new(Lenient));
    sandbox.with_task(|task| {
        task.ifd = input.as_raw_fd();
        task.ofd = output.as_raw_fd();
        task.efd = output.as_raw_fd();
        task.set_quota(QuotaKind::WallClock, 30_000);
    });
    assert_eq!(sandbox.execute(), ResultCode::OK);
    assert_eq!(sandbox.stat().exitcode, 3);
}

#[test]
fn finished_sandbox_can_be_rechecked_and_rerun() {
    common::setup();

    let input = File::open("/dev/null").unwrap();
    let output = OpenOptions::new().write(true).open("/dev/null").unwrap();

    let mut sandbox = Sandbox::new(&["/bin/true"]).unwrap();
    sandbox.with_task(|task| {
        task.ifd = input.as_raw_fd();
        task.ofd = output.as_raw_fd();
        task.efd = output.as_raw_fd();
        task.set_quota(QuotaKind::WallClock, 30_000);
    });
    assert_eq!(sandbox.execute(), ResultCode::OK);
    let first_elapsed = ts2ms(sandbox.stat().elapsed);

    // statistics rewind, verdict repeats
    assert!(sandbox.check());
    assert_eq!(sandbox.execute(), ResultCode::OK);
    let _ = first_elapsed;
    assert_eq!(sandbox.stat().exitcode, 0);
}

#[test]
fn signal_mask_is_restored_after_execute() {
    use nix::sys::signal::SigSet;

    common::setup();

    let input = File::open("/dev/null").unwrap();
    let output = OpenOptions::new().write(true).open("/dev/null").unwrap();

    let before = SigSet::thread_get_mask().unwrap();
    let mut sandbox = Sandbox::new(&["/bin/true"]).unwrap();
    sandbox.with_task(|task| {
        task.ifd = input.as_raw_fd();
        task.ofd = output.as_raw_fd();
        task.efd = output.as_raw_fd();
        task.set_quota(QuotaKind::WallClock, 30_000);
    });
    sandbox.execute();
    let after = SigSet::thread_get_mask().unwrap();

    for signal in nix::sys::signal::Signal::iterator() {
        assert_eq!(
            before.contains(signal),
            after.contains(signal),
            "mask changed for {:?}",
            signal
        );
    }
}

#[test]
fn dump_round_trips_aligned_and_unaligned() {
    // Fork shares the address space contents at the moment of the fork,
    // so a buffer filled before forking is readable in the child at the
    // same address; Dump through ptrace must reproduce it byte for byte,
    // from any offset, across word boundaries.
    use nix::sys::ptrace;
    use nix::sys::signal::{kill, raise, Signal};
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::{fork, ForkResult};
    use std::sync::Arc;
    use tracebox::proc::Snapshot;
    use tracebox::proxy::TraceProxy;

    common::setup();

    let mut pattern = [0u8; 64];
    for (i, byte) in pattern.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(37).wrapping_add(11);
    }
    let addr = pattern.as_ptr() as u64;

    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            let _ = ptrace::traceme();
            let _ = raise(Signal::SIGSTOP);
            unsafe { libc::_exit(0) };
        }
        ForkResult::Parent { child } => {
            match waitpid(child, None) {
                Ok(WaitStatus::Stopped(pid, Signal::SIGSTOP)) => assert_eq!(pid, child),
                other => panic!("unexpected wait status {:?}", other),
            }

            let (proxy, _rx) = TraceProxy::new();
            let snap = Snapshot::new(child, Arc::new(proxy));

            // whole buffer, aligned
            let bytes = snap.dump(addr, pattern.len()).unwrap();
            assert_eq!(&bytes[..], &pattern[..]);

            // odd offsets and lengths spanning word boundaries
            for &(off, len) in &[(1usize, 7usize), (3, 13), (5, 32), (7, 9), (6, 2)] {
                let bytes = snap.dump(addr + off as u64, len).unwrap();
                assert_eq!(&bytes[..], &pattern[off..off + len], "off {} len {}", off, len);
            }

            let _ = kill(child, Signal::SIGKILL);
            let _ = waitpid(child, None);
        }
    }
}

#[test]
fn output_overflow_is_ol() {
    common::setup();

    let mut spill = tempfile::tempfile().unwrap();
    let (result, _stat) = supervise(
        &["/bin/sh", "-c", "while :; do echo 0123456789; done"],
        |task| {
            task.ofd = spill.as_raw_fd();
            task.set_quota(QuotaKind::Disk, 64);
        },
    );
    assert_eq!(result, ResultCode::OL);

    // the kernel's FSIZE limit held the file to the quota
    use std::io::Seek;
    spill.seek(std::io::SeekFrom::Start(0)).unwrap();
    let mut contents = Vec::new();
    spill.read_to_end(&mut contents).unwrap();
    assert!(contents.len() as u64 <= 64);
}
