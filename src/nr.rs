//! Syscall words the supervisor cares about, for both x86 calling
//! conventions.

use crate::event::{ScMode, ScWord};

#[cfg(target_arch = "x86_64")]
mod arch {
    use super::*;

    pub const SC_EXECVE: ScWord = ScWord::new(libc::SYS_execve as u32, ScMode::Linux64);
    pub const SC_FORK: ScWord = ScWord::new(libc::SYS_fork as u32, ScMode::Linux64);
    pub const SC_VFORK: ScWord = ScWord::new(libc::SYS_vfork as u32, ScMode::Linux64);
    pub const SC_CLONE: ScWord = ScWord::new(libc::SYS_clone as u32, ScMode::Linux64);
    pub const SC_PTRACE: ScWord = ScWord::new(libc::SYS_ptrace as u32, ScMode::Linux64);
    pub const SC_WAIT4: ScWord = ScWord::new(libc::SYS_wait4 as u32, ScMode::Linux64);
    pub const SC_WAITID: ScWord = ScWord::new(libc::SYS_waitid as u32, ScMode::Linux64);

    pub const NR_PAUSE: u64 = libc::SYS_pause as u64;

    // The 32-bit numbers are hard coded: a 64-bit build has no
    // <sys/syscall.h> view of the compat table.
    pub const SC32_EXECVE: ScWord = ScWord::new(11, ScMode::Linux32);
    pub const SC32_FORK: ScWord = ScWord::new(2, ScMode::Linux32);
    pub const SC32_VFORK: ScWord = ScWord::new(190, ScMode::Linux32);
    pub const SC32_CLONE: ScWord = ScWord::new(120, ScMode::Linux32);
    pub const SC32_PTRACE: ScWord = ScWord::new(26, ScMode::Linux32);
    pub const SC32_WAITPID: ScWord = ScWord::new(7, ScMode::Linux32);
    pub const SC32_WAIT4: ScWord = ScWord::new(114, ScMode::Linux32);
    pub const SC32_WAITID: ScWord = ScWord::new(284, ScMode::Linux32);

    /// Baseline black list: process-management syscalls a prisoner may not
    /// issue, in either calling convention.
    pub const RESTRICTED: &[ScWord] = &[
        SC_FORK,
        SC_VFORK,
        SC_CLONE,
        SC_PTRACE,
        SC_WAIT4,
        SC_WAITID,
        SC32_FORK,
        SC32_VFORK,
        SC32_CLONE,
        SC32_PTRACE,
        SC32_WAITPID,
        SC32_WAIT4,
        SC32_WAITID,
    ];

    pub fn is_execve(sc: ScWord) -> bool {
        sc == SC_EXECVE || sc == SC32_EXECVE
    }
}

#[cfg(target_arch = "x86")]
mod arch {
    use super::*;

    pub const SC_EXECVE: ScWord = ScWord::new(libc::SYS_execve as u32, ScMode::Linux32);
    pub const SC_FORK: ScWord = ScWord::new(libc::SYS_fork as u32, ScMode::Linux32);
    pub const SC_VFORK: ScWord = ScWord::new(libc::SYS_vfork as u32, ScMode::Linux32);
    pub const SC_CLONE: ScWord = ScWord::new(libc::SYS_clone as u32, ScMode::Linux32);
    pub const SC_PTRACE: ScWord = ScWord::new(libc::SYS_ptrace as u32, ScMode::Linux32);
    pub const SC_WAITPID: ScWord = ScWord::new(libc::SYS_waitpid as u32, ScMode::Linux32);
    pub const SC_WAIT4: ScWord = ScWord::new(libc::SYS_wait4 as u32, ScMode::Linux32);
    pub const SC_WAITID: ScWord = ScWord::new(libc::SYS_waitid as u32, ScMode::Linux32);

    pub const NR_PAUSE: u64 = libc::SYS_pause as u64;

    pub const RESTRICTED: &[ScWord] = &[
        SC_FORK,
        SC_VFORK,
        SC_CLONE,
        SC_PTRACE,
        SC_WAITPID,
        SC_WAIT4,
        SC_WAITID,
    ];

    pub fn is_execve(sc: ScWord) -> bool {
        sc == SC_EXECVE
    }
}

pub use self::arch::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_list_matches_both_modes() {
        assert!(RESTRICTED.contains(&SC_FORK));
        assert!(RESTRICTED.contains(&SC_CLONE));
        assert!(!RESTRICTED.contains(&SC_EXECVE));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn execve_latch_covers_compat_mode() {
        assert!(is_execve(SC_EXECVE));
        assert!(is_execve(SC32_EXECVE));
        assert!(!is_execve(SC_FORK));
        // same number, different mode: must not be conflated
        assert_ne!(SC_WAIT4.raw(), SC32_WAIT4.raw());
    }
}
