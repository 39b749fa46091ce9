//! The sandbox façade: task specification, cumulative statistics, status
//! and result bookkeeping, and the execute lifecycle that forks the
//! prisoner, launches the monitor threads, and serves ptrace requests.

use std::ffi::{CStr, CString};
use std::io::{Error, ErrorKind, Result};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::RawFd;
use std::os::unix::thread::JoinHandleExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use nix::sys::pthread::{pthread_kill, Pthread};
use nix::sys::ptrace;
use nix::sys::resource::{getrlimit, setrlimit, Resource};
use nix::sys::signal::{self, SigSet, SigmaskHow, Signal};
use nix::sys::stat::fstat;
use nix::sys::time::TimeSpec;
use nix::time::{clock_gettime, ClockId};
use nix::unistd::{
    self, chdir, chroot, close, dup2, execve, fork, setgid, setsid, setuid, ForkResult, Gid,
    Group, Pid, Uid, User,
};

use crate::clock::{ts2ms, ts_add, ts_max_assign, ts_sub, ts_zero};
use crate::consts::*;
use crate::event::{Event, EventQueue, QuotaKind, ScWord, QUOTA_TOTAL};
use crate::policy::{DefaultPolicy, Policy};
use crate::proc::Snapshot;
use crate::profiler;
use crate::proxy::TraceProxy;
use crate::watcher;
use crate::{manager, proc};

/// Unbounded quota sentinel.
pub const QUOTA_INF: u64 = u64::max_value();

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    /// Preparing, not ready to execute.
    Pre,
    /// Ready, waiting for execution.
    Rdy,
    /// Executing, waiting for an event.
    Exe,
    /// Blocked, handling an event.
    Blk,
    /// Finished.
    Fin,
}

impl Status {
    pub fn not_started(self) -> bool {
        self == Status::Pre || self == Status::Rdy
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(i32)]
pub enum ResultCode {
    /// Pending.
    PD = 0,
    /// Okay.
    OK = 1,
    /// Restricted function.
    RF = 2,
    /// Memory limit exceeded.
    ML = 3,
    /// Output limit exceeded.
    OL = 4,
    /// Time limit exceeded.
    TL = 5,
    /// Runtime error (killed by signal).
    RT = 6,
    /// Abnormal termination.
    AT = 7,
    /// Internal error of the supervisor.
    IE = 8,
    /// Bad policy: the tracee ended before the policy decided.
    BP = 9,
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ResultCode::PD => "PD",
            ResultCode::OK => "OK",
            ResultCode::RF => "RF",
            ResultCode::ML => "ML",
            ResultCode::OL => "OL",
            ResultCode::TL => "TL",
            ResultCode::RT => "RT",
            ResultCode::AT => "AT",
            ResultCode::IE => "IE",
            ResultCode::BP => "BP",
        };
        write!(f, "{}", name)
    }
}

/// Static specification of what to run and under which restrictions.
#[derive(Clone, Debug)]
pub struct Task {
    command: Vec<CString>,
    pub jail: PathBuf,
    pub uid: Uid,
    pub gid: Gid,
    pub ifd: RawFd,
    pub ofd: RawFd,
    pub efd: RawFd,
    quota: [u64; QUOTA_TOTAL],
}

impl Task {
    fn new(argv: &[&str]) -> Result<Task> {
        if argv.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty command line"));
        }
        let mut total = 0usize;
        let mut command = Vec::with_capacity(argv.len());
        for arg in argv {
            total += arg.len() + 1;
            if total > ARG_MAX {
                return Err(Error::new(ErrorKind::InvalidInput, "command line too long"));
            }
            let arg = CString::new(*arg)
                .map_err(|_| Error::new(ErrorKind::InvalidInput, "NUL in argument"))?;
            command.push(arg);
        }
        Ok(Task {
            command,
            jail: PathBuf::from("/"),
            uid: unistd::getuid(),
            gid: unistd::getgid(),
            ifd: libc::STDIN_FILENO,
            ofd: libc::STDOUT_FILENO,
            efd: libc::STDERR_FILENO,
            quota: [QUOTA_INF; QUOTA_TOTAL],
        })
    }

    pub fn command(&self) -> &[CString] {
        &self.command
    }

    pub fn command_path(&self) -> PathBuf {
        PathBuf::from(std::str::from_utf8(self.command[0].as_bytes()).unwrap_or(""))
    }

    pub fn quota(&self, kind: QuotaKind) -> u64 {
        self.quota[kind as usize]
    }

    /// WallClock and Cpu quotas are in milliseconds, Memory and Disk in
    /// bytes. `QUOTA_INF` means unbounded.
    pub fn set_quota(&mut self, kind: QuotaKind, value: u64) {
        self.quota[kind as usize] = value;
    }

    fn check(&self) -> bool {
        // identity: both ids must resolve, and only root may switch
        match User::from_uid(self.uid) {
            Ok(Some(_)) => (),
            _ => return false,
        }
        match Group::from_gid(self.gid) {
            Ok(Some(_)) => (),
            _ => return false,
        }
        let me = unistd::getuid();
        if !me.is_root() && (me != self.uid || unistd::getgid() != self.gid) {
            return false;
        }
        debug!("passed identity test");

        // the targeted program: regular, executable by the target
        // identity, and a well-formed ELF image
        let path = self.command_path();
        let meta = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            _ => return false,
        };
        let mode = meta.mode();
        let by_user = mode & libc::S_IXUSR != 0 && meta.uid() == self.uid.as_raw();
        let by_group = mode & libc::S_IXGRP != 0 && meta.gid() == self.gid.as_raw();
        let by_other = mode & libc::S_IXOTH != 0;
        if !by_user && !by_group && !by_other && !self.uid.is_root() {
            return false;
        }
        match std::fs::read(&path) {
            Ok(image) => match goblin::Object::parse(&image) {
                Ok(goblin::Object::Elf(_)) => (),
                _ => return false,
            },
            Err(_) => return false,
        }
        debug!("passed permission test of the targeted program");

        // the jail must be a root-only directory prefixing the command
        if self.jail != Path::new("/") {
            if !me.is_root() {
                return false;
            }
            let meta = match std::fs::metadata(&self.jail) {
                Ok(meta) if meta.is_dir() => meta,
                _ => return false,
            };
            if meta.mode() & (libc::S_IRUSR | libc::S_IXUSR) == 0 {
                return false;
            }
            if !path.starts_with(&self.jail) {
                return false;
            }
        }
        debug!("passed jail validity test");

        check_channel(self.ifd, libc::S_IRUSR, libc::S_IRGRP, libc::S_IROTH)
            && check_channel(self.ofd, libc::S_IWUSR, libc::S_IWGRP, libc::S_IWOTH)
            && check_channel(self.efd, libc::S_IWUSR, libc::S_IWGRP, libc::S_IWOTH)
    }
}

fn check_channel(fd: RawFd, user_bit: libc::mode_t, group_bit: libc::mode_t, other_bit: libc::mode_t) -> bool {
    let st = match fstat(fd) {
        Ok(st) => st,
        Err(_) => return false,
    };
    let fmt = st.st_mode & libc::S_IFMT;
    if fmt != libc::S_IFCHR && fmt != libc::S_IFREG && fmt != libc::S_IFIFO {
        return false;
    }
    let me = unistd::getuid();
    let by_user = st.st_mode & user_bit != 0 && st.st_uid == me.as_raw();
    let by_group = st.st_mode & group_bit != 0 && st.st_gid == unistd::getgid().as_raw();
    let by_other = st.st_mode & other_bit != 0;
    by_user || by_group || by_other || me.is_root()
}

#[derive(Clone, Copy, Debug)]
pub struct CpuInfo {
    /// Sampled cpu clock of the tracee, monotone.
    pub clock: TimeSpec,
    pub utime: TimeSpec,
    pub stime: TimeSpec,
    /// Retired instructions, counted only with the `software_tsc` feature.
    pub tsc: u64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MemInfo {
    pub vsize: u64,
    pub vsize_peak: u64,
    pub rss: u64,
    pub rss_peak: u64,
    pub minflt: u64,
    pub majflt: u64,
}

/// Cumulative runtime statistics of a sandboxed run.
#[derive(Clone, Copy, Debug)]
pub struct Stat {
    pub started: Option<TimeSpec>,
    pub elapsed: TimeSpec,
    pub cpu_info: CpuInfo,
    pub mem_info: MemInfo,
    /// Last observed syscall word.
    pub syscall: ScWord,
    /// Last observed signal (signo, si_code).
    pub signal: (i32, i32),
    pub exitcode: i32,
}

impl Stat {
    pub fn new() -> Stat {
        Stat {
            started: None,
            elapsed: ts_zero(),
            cpu_info: CpuInfo {
                clock: ts_zero(),
                utime: ts_zero(),
                stime: ts_zero(),
                tsc: 0,
            },
            mem_info: MemInfo::default(),
            syscall: ScWord::default(),
            signal: (0, 0),
            exitcode: 0,
        }
    }
}

/// Everything guarded by the sandbox lock.
pub(crate) struct State {
    pub status: Status,
    pub result: ResultCode,
    pub task: Task,
    pub stat: Stat,
    pub policy: Box<dyn Policy>,
    pub queue: EventQueue,
    pub pid: Option<Pid>,
    pub profiler_tid: Option<Pthread>,
}

impl State {
    pub fn has_result(&self) -> bool {
        self.result != ResultCode::PD
    }
}

pub(crate) type Shared = Arc<crate::rwlock::SboxLock<State>>;

/// Queue an event unless a final result has been installed. Blocks while
/// the queue is full and the run is still undecided.
pub(crate) fn post_event(shared: &Shared, event: Event) {
    let mut st = shared.write_when(|s| !s.queue.is_full() || s.has_result());
    if !st.has_result() {
        debug!("posting event {:?}", event);
        st.queue.push(event);
    }
}

pub(crate) fn update_status(shared: &Shared, status: Status) {
    let mut st = shared.write();
    st.status = status;
}

/// Common prologue of the monitor threads: wait for the run to start,
/// and bow out if it is already decided.
pub(crate) fn monitor_begin(shared: &Shared) -> bool {
    let st = shared.read_when(|s| !s.status.not_started() || s.has_result());
    !(st.status.not_started() || st.status == Status::Fin || st.has_result())
}

/// A monitor hit a supervisor-side failure. A vanished tracee (ESRCH) is
/// end-of-life, not an error; anything else becomes an ERROR event and
/// the prisoner group is killed so the queue can drain.
pub(crate) fn monitor_error(shared: &Shared, pid: Pid, err: &Error) {
    warn!("monitor error on pid {}: {}", pid, err);
    let errno = err.raw_os_error().unwrap_or(libc::EIO);
    if errno != libc::ESRCH {
        post_event(
            shared,
            Event::Error {
                code: errno,
                origin: 0,
                data: 0,
            },
        );
        let _ = signal::kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL);
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct Breaches {
    pub memory: bool,
    pub cpu: bool,
    pub wallclock: bool,
}

impl Breaches {
    pub fn any(self) -> bool {
        self.memory || self.cpu || self.wallclock
    }
}

/// Fold a fresh process snapshot into the cumulative statistics, then
/// compare the peaks against the quotas and post breach events. On any
/// breach the tracee is stopped and continued to force the watcher out of
/// its blocking wait.
pub(crate) fn stat_update(shared: &Shared, snap: &Snapshot) -> Breaches {
    let page = unistd::sysconf(unistd::SysconfVar::PAGE_SIZE)
        .ok()
        .and_then(|v| v)
        .unwrap_or(4096) as u64;

    {
        let mut st = shared.write();
        let mem = &mut st.stat.mem_info;
        mem.vsize = snap.vsize;
        mem.vsize_peak = mem.vsize_peak.max(mem.vsize);
        mem.rss = snap.rss.max(0) as u64 * page;
        mem.rss_peak = mem.rss_peak.max(mem.rss);
        mem.minflt = snap.minflt;
        mem.majflt = snap.majflt;

        let cpu = &mut st.stat.cpu_info;
        ts_max_assign(&mut cpu.clock, ts_add(snap.utime, snap.stime));
        ts_max_assign(&mut cpu.utime, snap.utime);
        ts_max_assign(&mut cpu.stime, snap.stime);

        match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(now) => match st.stat.started {
                None => {
                    st.stat.started = Some(now);
                    st.stat.elapsed = ts_zero();
                }
                Some(started) => {
                    let elapsed = ts_sub(now, started);
                    ts_max_assign(&mut st.stat.elapsed, elapsed);
                }
            },
            Err(errno) => {
                drop(st);
                monitor_error(shared, snap.pid, &proc::from_nix(errno));
                return Breaches::default();
            }
        }
    }

    let mut breaches = Breaches::default();
    {
        let st = shared.read();
        breaches.memory = st.stat.mem_info.vsize_peak > st.task.quota(QuotaKind::Memory);
        breaches.cpu = ts2ms(st.stat.cpu_info.clock) > st.task.quota(QuotaKind::Cpu);
        breaches.wallclock = ts2ms(st.stat.elapsed) > st.task.quota(QuotaKind::WallClock);
    }

    if breaches.memory {
        debug!("memory quota exceeded");
        post_event(shared, Event::Quota(QuotaKind::Memory));
    }
    if breaches.cpu {
        debug!("cpu quota exceeded");
        post_event(shared, Event::Quota(QuotaKind::Cpu));
    }
    if breaches.wallclock {
        debug!("wallclock quota exceeded");
        post_event(shared, Event::Quota(QuotaKind::WallClock));
    }

    if breaches.any() {
        let _ = snap.trace_kill(Signal::SIGSTOP);
        let _ = snap.trace_kill(Signal::SIGCONT);
    }

    breaches
}

/// A supervised execution slot for one untrusted program.
///
/// Lifecycle: `new` -> (tune the task) -> `check` -> `execute` -> inspect
/// `result`/`stat`; a finished sandbox can be re-checked and re-executed.
pub struct Sandbox {
    shared: Shared,
}

impl Sandbox {
    pub fn new(argv: &[&str]) -> Result<Sandbox> {
        let task = Task::new(argv)?;
        let state = State {
            status: Status::Pre,
            result: ResultCode::PD,
            task,
            stat: Stat::new(),
            policy: Box::new(DefaultPolicy),
            queue: EventQueue::new(),
            pid: None,
            profiler_tid: None,
        };
        Ok(Sandbox {
            shared: Arc::new(crate::rwlock::SboxLock::new(state)),
        })
    }

    /// Replace the policy consulted for every event.
    pub fn set_policy(&mut self, policy: Box<dyn Policy>) {
        self.shared.write().policy = policy;
    }

    /// Mutate the task specification; takes effect at the next `check`.
    pub fn with_task<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Task) -> R,
    {
        f(&mut self.shared.write().task)
    }

    pub fn status(&self) -> Status {
        self.shared.read().status
    }

    pub fn result(&self) -> ResultCode {
        self.shared.read().result
    }

    pub fn stat(&self) -> Stat {
        self.shared.read().stat
    }

    /// Validate the task specification and transition to RDY. A finished
    /// sandbox is rewound: statistics cleared, result reset to pending.
    pub fn check(&mut self) -> bool {
        let mut st = self.shared.write();
        if !st.status.not_started() && st.status != Status::Fin {
            return false;
        }
        if st.status == Status::Fin {
            st.stat = Stat::new();
            st.queue.clear();
            st.pid = None;
            st.profiler_tid = None;
        }
        st.result = ResultCode::PD;
        st.status = Status::Pre;
        if !st.task.check() {
            return false;
        }
        st.status = Status::Rdy;
        true
    }

    /// Run the task to completion and return how it ended. The calling
    /// thread becomes the tracer: it forks the prisoner, spawns the
    /// watcher and profiler, then serves ptrace requests until the run is
    /// over. Reserved signals are blocked in this thread for the duration.
    pub fn execute(&mut self) -> ResultCode {
        if !self.check() {
            warn!("sandbox pre-execution check failed");
            return self.result();
        }

        let mut reserved = SigSet::empty();
        reserved.add(SIGEXIT);
        reserved.add(SIGSTAT);
        reserved.add(SIGPROF);
        let mut saved = SigSet::empty();
        if signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&reserved), Some(&mut saved))
            .is_err()
        {
            warn!("failed to block reserved signals");
        }

        let result = self.execute_inner();

        let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&saved), None);
        result
    }

    fn execute_inner(&mut self) -> ResultCode {
        let (proxy, proxy_rx) = TraceProxy::new();
        let proxy = Arc::new(proxy);

        // argv seen by the prisoner; inside a jail the command is
        // addressed relative to the new root
        let child_pid = {
            let mut st = self.shared.write();
            let mut exec_argv = st.task.command.clone();
            if st.task.jail != Path::new("/") {
                let jailed = st
                    .task
                    .command_path()
                    .strip_prefix(&st.task.jail)
                    .map(|p| PathBuf::from("/").join(p))
                    .unwrap_or_else(|_| st.task.command_path());
                if let Ok(argv0) = CString::new(jailed.to_string_lossy().as_bytes()) {
                    exec_argv[0] = argv0;
                }
            }

            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    let code = task_execute(&st.task, &exec_argv);
                    unsafe { libc::_exit(code) };
                }
                Ok(ForkResult::Parent { child }) => {
                    debug!("forked the prisoner process as pid {}", child);
                    st.pid = Some(child);
                    child
                }
                Err(errno) => {
                    warn!("error forking the prisoner process: {}", errno);
                    st.result = ResultCode::IE;
                    st.status = Status::Fin;
                    return ResultCode::IE;
                }
            }
        };

        let watcher_handle = {
            let shared = self.shared.clone();
            let proxy = proxy.clone();
            thread::Builder::new()
                .name("sbox-watcher".into())
                .spawn(move || watcher::watcher_main(shared, proxy))
        };
        let profiler_handle = {
            let shared = self.shared.clone();
            let proxy = proxy.clone();
            thread::Builder::new()
                .name("sbox-profiler".into())
                .spawn(move || profiler::profiler_main(shared, proxy))
        };

        let (watcher_handle, profiler_handle) = match (watcher_handle, profiler_handle) {
            (Ok(w), Ok(p)) => (w, p),
            _ => {
                warn!("failed to launch monitor threads");
                let _ = signal::kill(Pid::from_raw(-child_pid.as_raw()), Signal::SIGKILL);
                let mut st = self.shared.write();
                st.result = ResultCode::IE;
                st.status = Status::Fin;
                return ResultCode::IE;
            }
        };

        {
            let mut st = self.shared.write();
            st.profiler_tid = Some(profiler_handle.as_pthread_t());
            st.result = ResultCode::PD;
            st.status = Status::Blk;
        }

        manager::register(self.shared.clone());

        // this thread attached to the tracee; serve ptrace until the
        // watcher signals the end of the run
        proxy.serve(proxy_rx);

        manager::unregister(&self.shared);

        for handle in vec![profiler_handle, watcher_handle] {
            let _ = pthread_kill(handle.as_pthread_t(), SIGEXIT);
            if handle.join().is_err() {
                warn!("failed to join a monitor thread");
            }
        }

        self.result()
    }

    /// Tear the sandbox down: pending result, finished status, queue
    /// cleared. Idempotent.
    pub fn fini(&mut self) {
        let mut st = self.shared.write();
        st.result = ResultCode::PD;
        st.status = Status::Fin;
        st.queue.clear();
        st.pid = None;
        st.profiler_tid = None;
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.fini();
    }
}

/// Child-side setup between fork and execve. Runs in the forked process;
/// any failure exits the child, there is nobody else to tell.
fn task_execute(task: &Task, argv: &[CString]) -> i32 {
    if setsid().is_err() {
        return libc::EXIT_FAILURE;
    }

    for fd in 0..FILENO_MAX {
        if fd == task.ifd || fd == task.ofd || fd == task.efd {
            continue;
        }
        let _ = close(fd);
    }

    if dup2(task.efd, libc::STDERR_FILENO).is_err()
        || dup2(task.ofd, libc::STDOUT_FILENO).is_err()
        || dup2(task.ifd, libc::STDIN_FILENO).is_err()
    {
        return libc::EXIT_FAILURE;
    }

    if task.jail != Path::new("/") {
        if chdir(&task.jail).is_err() || chroot(".").is_err() {
            return libc::EXIT_FAILURE;
        }
    }

    if setgid(task.gid).is_err() || setuid(task.uid).is_err() {
        return libc::EXIT_FAILURE;
    }

    let everything = SigSet::all();
    if signal::pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&everything), None).is_err() {
        return libc::EXIT_FAILURE;
    }

    // no core dumps; output quota enforced by the kernel through FSIZE.
    // the hard limits survive the identity change, so reuse them.
    match getrlimit(Resource::RLIMIT_CORE) {
        Ok((_, hard)) => {
            if setrlimit(Resource::RLIMIT_CORE, 0, hard).is_err() {
                return libc::EXIT_FAILURE;
            }
        }
        Err(_) => return libc::EXIT_FAILURE,
    }
    let fsize = match task.quota(QuotaKind::Disk) {
        QUOTA_INF => libc::RLIM_INFINITY,
        limit => limit,
    };
    match getrlimit(Resource::RLIMIT_FSIZE) {
        Ok((_, hard)) => {
            if setrlimit(Resource::RLIMIT_FSIZE, fsize, hard).is_err() {
                return libc::EXIT_FAILURE;
            }
        }
        Err(_) => return libc::EXIT_FAILURE,
    }

    if ptrace::traceme().is_err() {
        return libc::EXIT_FAILURE;
    }

    let argv_ref: Vec<&CStr> = argv.iter().map(|a| a.as_c_str()).collect();
    let env: [&CStr; 0] = [];
    match execve(argv_ref[0], &argv_ref, &env) {
        Ok(_) => unreachable!("execve returned on success"),
        Err(errno) => errno as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults_are_permissive() {
        let task = Task::new(&["/bin/true"]).unwrap();
        assert_eq!(task.jail, PathBuf::from("/"));
        assert_eq!(task.quota(QuotaKind::Cpu), QUOTA_INF);
        assert_eq!(task.quota(QuotaKind::Memory), QUOTA_INF);
        assert_eq!(task.ifd, 0);
        assert_eq!(task.ofd, 1);
        assert_eq!(task.efd, 2);
    }

    #[test]
    fn task_rejects_bad_argv() {
        assert!(Task::new(&[]).is_err());
        assert!(Task::new(&["/bin/e\0cho"]).is_err());
        let big = "x".repeat(ARG_MAX);
        assert!(Task::new(&["/bin/true", &big]).is_err());
    }

    #[test]
    fn check_accepts_a_real_binary() {
        let mut sandbox = Sandbox::new(&["/bin/true"]).unwrap();
        assert!(sandbox.check());
        assert_eq!(sandbox.status(), Status::Rdy);
        assert_eq!(sandbox.result(), ResultCode::PD);
    }

    #[test]
    fn check_rejects_missing_or_non_elf() {
        let mut sandbox = Sandbox::new(&["/no/such/file"]).unwrap();
        assert!(!sandbox.check());

        // /etc/hostname exists but is no executable ELF image
        let mut sandbox = Sandbox::new(&["/etc/hostname"]).unwrap();
        assert!(!sandbox.check());
    }

    #[test]
    fn check_rejects_jail_for_plain_users() {
        if unistd::getuid().is_root() {
            return;
        }
        let mut sandbox = Sandbox::new(&["/bin/true"]).unwrap();
        sandbox.with_task(|task| task.jail = PathBuf::from("/bin"));
        assert!(!sandbox.check());
    }

    #[test]
    fn fini_is_idempotent() {
        let mut sandbox = Sandbox::new(&["/bin/true"]).unwrap();
        sandbox.fini();
        sandbox.fini();
        assert_eq!(sandbox.status(), Status::Fin);
        assert_eq!(sandbox.result(), ResultCode::PD);
    }

    #[test]
    fn stat_starts_clean() {
        let stat = Stat::new();
        assert!(stat.started.is_none());
        assert_eq!(ts2ms(stat.elapsed), 0);
        assert_eq!(stat.mem_info.vsize_peak, 0);
        assert_eq!(stat.exitcode, 0);
    }
}
