use nix::sys::signal::Signal;

/// Orderly-shutdown request for a monitor thread; real payload signals
/// travel in its `sigqueue` value.
pub const SIGEXIT: Signal = Signal::SIGUSR1;
/// Requests a full /proc statistics sample from a profiler thread.
pub const SIGSTAT: Signal = Signal::SIGUSR2;
/// Requests a cpu-clock sample from a profiler thread.
pub const SIGPROF: Signal = Signal::SIGPROF;

/// Profiling broadcast frequency (Hz).
pub const PROF_FREQ: u32 = 100;
/// Every STAT_FREQ'th PROF tick is promoted to a STAT tick.
pub const STAT_FREQ: u32 = 5;

/// Capacity of the per-sandbox event queue.
pub const EVENT_MAX: usize = 32;
/// Depth of the watcher's syscall nesting stack.
pub const SC_STACK_MAX: usize = 8;

/// Upper bound on the serialized command line (bytes, argv incl. NULs).
pub const ARG_MAX: usize = 65536;
/// Highest file descriptor closed in the child before exec.
pub const FILENO_MAX: i32 = 256;

// 16-bit opcode patterns of the x86 syscall entry instructions.
pub const OP_INT80: u64 = 0x80cd;
pub const OP_SYSCALL: u64 = 0x050f;
pub const OP_SYSENTER: u64 = 0x340f;
pub const OP_NOP: u8 = 0x90;

/// `syscall` / `int 0x80` / `sysenter` are all two bytes long; the kernel
/// reports the stop with the instruction pointer past them.
pub const SYSCALL_INSN_SIZE: u64 = 2;

#[inline]
pub fn opcode16(op: u64) -> u64 {
    op & 0xffff
}
