//! Runtime inspection of the prisoner process: /proc statistics, register
//! file, signal info, current opcode, memory dumps, and syscall ABI
//! classification.

use std::fs;
use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;

use combine::error::ParseError;
use combine::parser::char::{char, digit, spaces};
use combine::Parser;
use combine::{any, many1, optional, Stream};

use log::warn;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::statfs::{statfs, PROC_SUPER_MAGIC};
use nix::sys::time::TimeSpec;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{access, sysconf, AccessFlags, Pid, SysconfVar};

use crate::clock::{ts_from_ticks, ts_zero};
use crate::consts::*;
use crate::event::{ScMode, ScWord};
use crate::nr;
use crate::proxy::{TraceMode, TraceProxy};

pub const PROBE_STAT: u32 = 0;
pub const PROBE_REGS: u32 = 1;
/// Implies `PROBE_REGS`; the opcode dump needs the instruction pointer.
pub const PROBE_OP: u32 = 3;
pub const PROBE_SIGINFO: u32 = 4;

const WORD: usize = std::mem::size_of::<libc::c_long>();

/// Ephemeral per-stop view of the tracee, bound to the ptrace proxy of its
/// sandbox. Owned by the watcher; the profiler keeps its own copy.
#[derive(Clone)]
pub struct Snapshot {
    pub pid: Pid,
    pub ppid: Pid,
    pub state: char,
    pub flags: u64,
    pub utime: TimeSpec,
    pub stime: TimeSpec,
    pub minflt: u64,
    pub majflt: u64,
    pub vsize: u64,
    pub rss: i64,
    pub start_code: u64,
    pub end_code: u64,
    pub start_stack: u64,
    pub regs: libc::user_regs_struct,
    pub siginfo: libc::siginfo_t,
    /// Word around the last-executed instruction.
    pub op: u64,
    pub single_step: bool,
    pub in_syscall: bool,
    /// Latches true at the first non-execve syscall entry; consulted to
    /// swallow the synthetic post-execve SIGTRAP.
    pub post_execve: bool,
    scmode: ScMode,
    proxy: Arc<TraceProxy>,
}

impl Snapshot {
    pub fn new(pid: Pid, proxy: Arc<TraceProxy>) -> Snapshot {
        Snapshot {
            pid,
            ppid: Pid::from_raw(0),
            state: '?',
            flags: 0,
            utime: ts_zero(),
            stime: ts_zero(),
            minflt: 0,
            majflt: 0,
            vsize: 0,
            rss: 0,
            start_code: 0,
            end_code: 0,
            start_stack: 0,
            regs: unsafe { std::mem::zeroed() },
            siginfo: unsafe { std::mem::zeroed() },
            op: 0,
            single_step: false,
            in_syscall: false,
            post_execve: false,
            scmode: ScMode::from_raw(0),
            proxy,
        }
    }

    /// Refresh the snapshot. /proc statistics are always read; `opt` adds
    /// registers, the current opcode, and/or signal info via ptrace.
    pub fn probe(&mut self, opt: u32) -> Result<()> {
        eprintln!("DEBUG pid={:?} self_pid={}", self.pid, std::process::id());
        check_procfs(self.pid).map_err(|e| { eprintln!("DEBUG check_procfs err {:?}", e); e })?;

        let path = format!("/proc/{}/stat", self.pid);
        eprintln!("DEBUG path={}", path);
        let content = fs::read_to_string(&path).map_err(|e| {
            eprintln!("DEBUG read err {:?}", e);
            if e.kind() == ErrorKind::NotFound {
                Error::from_raw_os_error(libc::ESRCH)
            } else {
                e
            }
        })?;
        let fields = parse_stat(&content)?;

        let tck = sysconf(SysconfVar::CLK_TCK)
            .ok()
            .and_then(|v| v)
            .unwrap_or(100) as u64;

        self.pid = Pid::from_raw(fields.pid);
        self.ppid = Pid::from_raw(fields.ppid);
        self.state = fields.state;
        self.flags = fields.flags;
        self.minflt = fields.minflt;
        self.majflt = fields.majflt;
        self.utime = ts_from_ticks(fields.utime, tck);
        self.stime = ts_from_ticks(fields.stime, tck);
        self.vsize = fields.vsize;
        self.rss = fields.rss;
        self.start_code = fields.start_code;
        self.end_code = fields.end_code;
        self.start_stack = fields.start_stack;

        if opt & PROBE_REGS != 0 {
            self.regs = self.proxy.getregs(self.pid).map_err(from_nix)?;
        }

        if opt & 0x2 != 0 {
            let mut addr = reg_ip(&self.regs);
            if !self.single_step {
                // the kernel stops past the two-byte syscall instruction
                addr -= SYSCALL_INSN_SIZE;
            }
            let bytes = self.dump(addr, WORD)?;
            let mut word = [0u8; 8];
            word[..WORD].copy_from_slice(&bytes);
            self.op = u64::from_ne_bytes(word);
        }

        if opt & PROBE_SIGINFO != 0 {
            self.siginfo = self.proxy.getsiginfo(self.pid).map_err(from_nix)?;
        }

        Ok(())
    }

    /// Copy `len` bytes out of the tracee, word by word. Unaligned head
    /// and short tail are served from masked word reads. A fault after at
    /// least one byte was produced reports `EFAULT`.
    pub fn dump(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Err(Error::from_raw_os_error(libc::EINVAL));
        }
        if addr == 0 {
            return Err(Error::from_raw_os_error(libc::EIO));
        }

        let mut out = Vec::with_capacity(len);
        let mut src = addr;
        let mut remaining = len;
        let mut dumped = false;

        let misalign = (src % WORD as u64) as usize;
        if misalign != 0 {
            let base = src - misalign as u64;
            let word = self.proxy.peek(self.pid, base).map_err(from_nix)?;
            let take = (WORD - misalign).min(remaining);
            out.extend_from_slice(&word.to_ne_bytes()[misalign..misalign + take]);
            dumped = true;
            src = base + WORD as u64;
            remaining -= take;
        }

        while remaining > 0 {
            let word = match self.proxy.peek(self.pid, src) {
                Ok(word) => word,
                Err(errno) => {
                    // ran off the end of a mapping mid-dump
                    let errno = if dumped && (errno == Errno::EPERM || errno == Errno::EIO) {
                        libc::EFAULT
                    } else {
                        errno as i32
                    };
                    return Err(Error::from_raw_os_error(errno));
                }
            };
            let take = WORD.min(remaining);
            out.extend_from_slice(&word.to_ne_bytes()[..take]);
            dumped = true;
            src += WORD as u64;
            remaining -= take;
        }

        Ok(out)
    }

    /// Classify the calling convention of the current syscall from the
    /// last-executed opcode and the code segment.
    pub fn abi(&mut self) -> ScMode {
        if self.single_step {
            return self.scmode_from_op();
        }

        #[cfg(all(target_arch = "x86_64", feature = "vsyscall_inspect"))]
        {
            if let Some(mode) = self.follow_vsyscall() {
                return mode;
            }
        }

        self.scmode_from_op()
    }

    #[cfg(target_arch = "x86_64")]
    fn scmode_from_op(&self) -> ScMode {
        let op = opcode16(self.op);
        // int80 and sysenter dispatch via the 32-bit table regardless of cs
        if op == OP_INT80 || op == OP_SYSENTER {
            ScMode::Linux32
        } else if op == OP_SYSCALL {
            match self.regs.cs {
                0x23 => ScMode::Linux32,
                0x33 => ScMode::Linux64,
                _ => ScMode::Max,
            }
        } else {
            ScMode::Max
        }
    }

    #[cfg(target_arch = "x86")]
    fn scmode_from_op(&self) -> ScMode {
        match self.regs.xcs {
            0x23 | 0x73 => ScMode::Linux32,
            _ => ScMode::Max,
        }
    }

    /// A stopped 32-bit program may sit at the entry `jmp` of
    /// __kernel_vsyscall rather than at the syscall instruction itself
    /// (observed on 2.6-era kernels). Decode `jmp rel8`/`jmp rel32`, rescan
    /// one word for the real entry instruction, and patch `rip`/`op`.
    /// Other control flow gives up with `ScMode::Max`.
    #[cfg(all(target_arch = "x86_64", feature = "vsyscall_inspect"))]
    fn follow_vsyscall(&mut self) -> Option<ScMode> {
        let mut addr = self.regs.rip;
        let code = self.op;
        match code & 0xff {
            0xeb => {
                addr = addr.wrapping_add(((code >> 8) & 0xff) as i8 as i64 as u64);
            }
            0xe9 => {
                addr = addr.wrapping_add(((code >> 8) & 0xffff_ffff) as i32 as i64 as u64);
            }
            _ => return None,
        }

        let mut code = match self.dump(addr, WORD) {
            Ok(bytes) => {
                let mut word = [0u8; 8];
                word[..WORD].copy_from_slice(&bytes);
                u64::from_ne_bytes(word)
            }
            Err(_) => match self.proxy.peek(self.pid, addr) {
                Ok(word) => word,
                Err(_) => {
                    warn!("failed to dump vsyscall page for inspection");
                    return Some(ScMode::Max);
                }
            },
        };

        for offset in 0..WORD as u64 - 1 {
            let op = opcode16(code);
            if op == OP_INT80 || op == OP_SYSENTER || op == OP_SYSCALL {
                let addr = addr + offset;
                if let Ok(bytes) = self.dump(addr, WORD) {
                    let mut word = [0u8; 8];
                    word[..WORD].copy_from_slice(&bytes);
                    code = u64::from_ne_bytes(word);
                } else {
                    warn!("failed to dump vsyscall page for opcode refill");
                }
                self.regs.rip = addr;
                self.op = code;
                break;
            }
            code >>= 8;
        }

        None
    }

    /// Mode of the current syscall; re-classified only outside syscalls
    /// once the execve trap has been seen, cached otherwise.
    pub fn current_scmode(&mut self) -> ScMode {
        if !self.in_syscall && self.post_execve {
            self.scmode = self.abi();
        }
        self.scmode
    }

    /// The packed (number, mode) word of the current syscall.
    pub fn the_syscall(&mut self) -> ScWord {
        let nr = if self.single_step && !self.in_syscall {
            reg_ax(&self.regs)
        } else {
            reg_orig_ax(&self.regs)
        };
        let mode = self.current_scmode();
        ScWord::new(nr as u32, mode)
    }

    pub fn is_syscall(&self) -> bool {
        if self.single_step {
            let op = opcode16(self.op);
            op == OP_SYSCALL || op == OP_SYSENTER || op == OP_INT80
        } else {
            self.siginfo.si_signo == libc::SIGTRAP && self.siginfo.si_code != libc::SI_USER
        }
    }

    pub fn is_sysret(&self) -> bool {
        if self.single_step {
            let op = opcode16(self.op);
            op != OP_SYSCALL && op != OP_SYSENTER && op != OP_INT80 && self.in_syscall
        } else {
            self.siginfo.si_signo == libc::SIGTRAP && self.siginfo.si_code != libc::SI_USER
        }
    }

    #[cfg(target_arch = "x86_64")]
    pub fn syscall_args(&mut self) -> [u64; 6] {
        let regs = self.regs;
        match self.current_scmode() {
            ScMode::Linux64 => [regs.rdi, regs.rsi, regs.rdx, regs.r10, regs.r8, regs.r9],
            _ => [
                regs.rbx as u32 as u64,
                regs.rcx as u32 as u64,
                regs.rdx as u32 as u64,
                regs.rsi as u32 as u64,
                regs.rdi as u32 as u64,
                regs.rbp as u32 as u64,
            ],
        }
    }

    #[cfg(target_arch = "x86")]
    pub fn syscall_args(&mut self) -> [u64; 6] {
        let regs = self.regs;
        [
            regs.ebx as u32 as u64,
            regs.ecx as u32 as u64,
            regs.edx as u32 as u64,
            regs.esi as u32 as u64,
            regs.edi as u32 as u64,
            regs.ebp as u32 as u64,
        ]
    }

    #[cfg(target_arch = "x86_64")]
    pub fn sysret_retval(&mut self) -> i64 {
        match self.current_scmode() {
            ScMode::Linux64 => reg_ax(&self.regs) as i64,
            _ => reg_ax(&self.regs) as u32 as u64 as i64,
        }
    }

    #[cfg(target_arch = "x86")]
    pub fn sysret_retval(&mut self) -> i64 {
        reg_ax(&self.regs) as u32 as u64 as i64
    }

    pub fn set_in_syscall(&mut self) {
        self.in_syscall = true;
        let sc = self.the_syscall();
        self.post_execve = !nr::is_execve(sc);
    }

    pub fn clr_in_syscall(&mut self) {
        self.in_syscall = false;
        let sc = self.the_syscall();
        self.post_execve = !nr::is_execve(sc);
    }

    /// Schedule the next trace stop.
    pub fn trace_next(&mut self, mode: TraceMode) -> Result<()> {
        self.single_step = mode == TraceMode::SingleStep;
        self.proxy.next(self.pid, mode).map_err(from_nix)
    }

    /// Deliver a signal to the prisoner's process group. For `SIGKILL`,
    /// first flush the pending opcode with NOPs and retarget a pending
    /// syscall at `pause`, so the doomed process cannot overrun between
    /// signal arming and kernel-level death.
    pub fn trace_kill(&self, signal: Signal) -> Result<()> {
        if signal == Signal::SIGKILL {
            let mut doomed = self.clone();
            if doomed.probe(PROBE_REGS | PROBE_OP).is_ok() {
                let mut nop = [0u8; 8];
                nop[..WORD].iter_mut().for_each(|b| *b = OP_NOP);
                let addr = reg_ip(&doomed.regs);
                let _ = self.proxy.poke(self.pid, addr, u64::from_ne_bytes(nop));

                if doomed.is_syscall() {
                    if doomed.single_step {
                        set_ax(&mut doomed.regs, nr::NR_PAUSE);
                    } else {
                        set_orig_ax(&mut doomed.regs, nr::NR_PAUSE);
                    }
                    set_native_cs(&mut doomed.regs);
                    let _ = self.proxy.setregs(self.pid, doomed.regs);
                }
            } else {
                warn!("failed to probe process {} before kill", self.pid);
            }
        }
        signal::kill(Pid::from_raw(-self.pid.as_raw()), signal).map_err(from_nix)
    }

    /// Stop the ptrace proxy and reap whatever the prisoner's process
    /// group left behind.
    pub fn trace_end(&self) -> Result<()> {
        self.proxy.end().map_err(from_nix)?;
        loop {
            match waitpid(
                Pid::from_raw(-self.pid.as_raw()),
                Some(WaitPidFlag::WNOHANG),
            ) {
                Ok(WaitStatus::StillAlive) | Err(_) => break,
                Ok(_) => continue,
            }
        }
        Ok(())
    }
}

pub fn from_nix(errno: nix::Error) -> Error {
    Error::from_raw_os_error(errno as i32)
}

/// Sanity-check /proc before trusting anything read from it: the mount
/// must really be procfs, and the pid entry must still exist (a vanished
/// entry means the tracee died: ESRCH, not ENOENT).
pub fn debug_probe_like(pid: Pid) -> Result<String> {
    check_procfs(pid)?;
    let path = format!("/proc/{}/stat", pid);
    let content = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::from_raw_os_error(libc::ESRCH)
        } else {
            e
        }
    })?;
    Ok(content)
}

pub fn debug_probe_raw(pid: Pid) -> Result<String> {
    check_procfs(pid)?;
    let path = format!("/proc/{}/stat", pid);
    fs::read_to_string(&path)
}

fn check_procfs(pid: Pid) -> Result<()> {
    let fs = statfs("/proc").map_err(from_nix)?;
    if fs.filesystem_type() != PROC_SUPER_MAGIC {
        return Err(Error::from_raw_os_error(libc::ENOENT));
    }
    let entry = format!("/proc/{}", pid);
    access(entry.as_str(), AccessFlags::R_OK | AccessFlags::X_OK).map_err(|errno| {
        if errno == Errno::ENOENT {
            Error::from_raw_os_error(libc::ESRCH)
        } else {
            from_nix(errno)
        }
    })
}

struct StatFields {
    pid: i32,
    state: char,
    ppid: i32,
    flags: u64,
    minflt: u64,
    majflt: u64,
    utime: u64,
    stime: u64,
    vsize: u64,
    rss: i64,
    start_code: u64,
    end_code: u64,
    start_stack: u64,
}

fn signed_dec<I>() -> impl Parser<Input = I, Output = i64>
where
    I: Stream<Item = char>,
    // Necessary due to rust-lang/rust#24159
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (optional(char('-')), many1::<String, _>(digit())).map(|(neg, s)| {
        let value = s.parse::<i64>().unwrap_or(0);
        if neg.is_some() {
            -value
        } else {
            value
        }
    })
}

fn stat_tail<I>() -> impl Parser<Input = I, Output = (char, Vec<i64>)>
where
    I: Stream<Item = char>,
    // Necessary due to rust-lang/rust#24159
    I::Error: ParseError<I::Item, I::Range, I::Position>,
{
    (
        spaces(),
        any(),
        many1::<Vec<i64>, _>((spaces(), signed_dec()).map(|(_, v)| v)),
    )
        .map(|(_, state, numbers)| (state, numbers))
}

/// Parse /proc/<pid>/stat. The comm field may contain spaces and even
/// parentheses, so the line is split at the *last* closing paren before
/// the numeric tail is handed to the parser.
fn parse_stat(content: &str) -> Result<StatFields> {
    let eio = || Error::from_raw_os_error(libc::EIO);

    let open = content.find('(').ok_or_else(eio)?;
    let close = content.rfind(')').ok_or_else(eio)?;
    if close < open {
        return Err(eio());
    }
    let pid = content[..open].trim().parse::<i32>().map_err(|_| eio())?;

    let (state, numbers) = match stat_tail().easy_parse(&content[close + 1..]) {
        Ok((parsed, _rest)) => parsed,
        Err(parse_error) => {
            warn!("failed to parse stat: {}", parse_error);
            return Err(eio());
        }
    };
    // state plus everything up to start_stack (field 28 of stat(5))
    if numbers.len() < 25 {
        return Err(eio());
    }

    Ok(StatFields {
        pid,
        state,
        ppid: numbers[0] as i32,
        flags: numbers[5] as u64,
        minflt: numbers[6] as u64,
        majflt: numbers[8] as u64,
        utime: numbers[10] as u64,
        stime: numbers[11] as u64,
        vsize: numbers[19] as u64,
        rss: numbers[20],
        start_code: numbers[22] as u64,
        end_code: numbers[23] as u64,
        start_stack: numbers[24] as u64,
    })
}

// Register-file accessors papering over the x86_64 / i386 field names.

#[cfg(target_arch = "x86_64")]
pub fn reg_ip(regs: &libc::user_regs_struct) -> u64 {
    regs.rip
}

#[cfg(target_arch = "x86_64")]
fn reg_ax(regs: &libc::user_regs_struct) -> u64 {
    regs.rax
}

#[cfg(target_arch = "x86_64")]
fn reg_orig_ax(regs: &libc::user_regs_struct) -> u64 {
    regs.orig_rax
}

#[cfg(target_arch = "x86_64")]
fn set_ax(regs: &mut libc::user_regs_struct, value: u64) {
    regs.rax = value;
}

#[cfg(target_arch = "x86_64")]
fn set_orig_ax(regs: &mut libc::user_regs_struct, value: u64) {
    regs.orig_rax = value;
}

#[cfg(target_arch = "x86_64")]
fn set_native_cs(regs: &mut libc::user_regs_struct) {
    regs.cs = 0x33;
}

#[cfg(target_arch = "x86")]
pub fn reg_ip(regs: &libc::user_regs_struct) -> u64 {
    regs.eip as u64
}

#[cfg(target_arch = "x86")]
fn reg_ax(regs: &libc::user_regs_struct) -> u64 {
    regs.eax as u64
}

#[cfg(target_arch = "x86")]
fn reg_orig_ax(regs: &libc::user_regs_struct) -> u64 {
    regs.orig_eax as u64
}

#[cfg(target_arch = "x86")]
fn set_ax(regs: &mut libc::user_regs_struct, value: u64) {
    regs.eax = value as i32;
}

#[cfg(target_arch = "x86")]
fn set_orig_ax(regs: &mut libc::user_regs_struct, value: u64) {
    regs.orig_eax = value as i32;
}

#[cfg(target_arch = "x86")]
fn set_native_cs(regs: &mut libc::user_regs_struct) {
    regs.xcs = 0x23;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_stat_line() {
        let line = "1234 (cat) R 1 1234 1234 0 -1 4194304 100 0 3 0 \
                    250 50 0 0 20 0 1 0 12345 4096000 321 18446744073709551615 \
                    4194304 4210000 140721000000000 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";
        let fields = parse_stat(line).unwrap();
        assert_eq!(fields.pid, 1234);
        assert_eq!(fields.state, 'R');
        assert_eq!(fields.ppid, 1);
        assert_eq!(fields.minflt, 100);
        assert_eq!(fields.majflt, 3);
        assert_eq!(fields.utime, 250);
        assert_eq!(fields.stime, 50);
        assert_eq!(fields.vsize, 4096000);
        assert_eq!(fields.rss, 321);
        assert_eq!(fields.start_code, 4194304);
        assert_eq!(fields.end_code, 4210000);
        assert_eq!(fields.start_stack, 140721000000000);
    }

    #[test]
    fn tolerates_whitespace_and_parens_in_comm() {
        let line = "77 (tmux: server (1)) S 1 77 77 0 -1 4194304 0 0 0 0 \
                    1 2 0 0 20 0 1 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16";
        let fields = parse_stat(line).unwrap();
        assert_eq!(fields.pid, 77);
        assert_eq!(fields.state, 'S');
        assert_eq!(fields.ppid, 1);
        assert_eq!(fields.utime, 1);
        assert_eq!(fields.stime, 2);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_stat("").is_err());
        assert!(parse_stat("123 cat R 1").is_err());
        assert!(parse_stat("123 (cat) R 1 2").is_err());
    }

    #[test]
    fn probes_self_stat() {
        let (proxy, _rx) = TraceProxy::new();
        let me = nix::unistd::getpid();
        let mut snap = Snapshot::new(me, Arc::new(proxy));
        snap.probe(PROBE_STAT).unwrap();
        assert!(snap.vsize > 0);
        assert!(snap.ppid.as_raw() > 0);
    }

    #[test]
    fn probe_of_dead_pid_reports_esrch() {
        let (proxy, _rx) = TraceProxy::new();
        // pid from the far end of the default pid space
        let mut snap = Snapshot::new(Pid::from_raw(0x3ffffe), Arc::new(proxy));
        let err = snap.probe(PROBE_STAT).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ESRCH));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn classifies_syscall_modes() {
        let (proxy, _rx) = TraceProxy::new();
        let proxy = Arc::new(proxy);
        let mut snap = Snapshot::new(Pid::from_raw(1), proxy);
        snap.single_step = true;

        snap.op = OP_SYSCALL;
        snap.regs.cs = 0x33;
        assert_eq!(snap.abi(), ScMode::Linux64);

        snap.regs.cs = 0x23;
        assert_eq!(snap.abi(), ScMode::Linux32);

        snap.regs.cs = 0x2b;
        assert_eq!(snap.abi(), ScMode::Max);

        // int80 and sysenter ignore cs entirely
        snap.op = OP_INT80;
        assert_eq!(snap.abi(), ScMode::Linux32);
        snap.op = OP_SYSENTER;
        assert_eq!(snap.abi(), ScMode::Linux32);

        snap.op = 0x9090;
        assert_eq!(snap.abi(), ScMode::Max);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn syscall_word_packs_orig_ax_in_trace_mode() {
        let (proxy, _rx) = TraceProxy::new();
        let mut snap = Snapshot::new(Pid::from_raw(1), Arc::new(proxy));
        snap.regs.orig_rax = libc::SYS_read as u64;
        snap.regs.rax = (-38i64) as u64; // ENOSYS sentinel during entry
        let sc = snap.the_syscall();
        assert_eq!(sc.nr(), libc::SYS_read as u32);
        assert_eq!(sc.mode(), ScMode::Linux64);
    }
}
