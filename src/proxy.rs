//! Marshals ptrace requests onto the one thread entitled to issue them.
//!
//! Linux only honors ptrace requests coming from the thread that attached
//! to the tracee. Here that is the caller of `Sandbox::execute`, which
//! forked the prisoner and then parks in [`TraceProxy::serve`]. Monitor
//! threads submit [`TraceRequest`]s through a channel and block on a
//! one-shot reply; a requester that happens to *be* the tracer thread
//! takes a shortcut past the channel. `End` never takes the shortcut,
//! since its whole point is to stop the serve loop.

use log::{debug, trace};
use nix::errno::Errno;
use nix::sys::pthread::{pthread_self, Pthread};
use nix::sys::ptrace;
use nix::unistd::Pid;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceMode {
    SingleStep,
    SystemCall,
}

#[derive(Debug)]
pub enum TraceRequest {
    /// Reschedule the tracee for its next stop.
    Next { pid: Pid, mode: TraceMode },
    GetRegs { pid: Pid },
    SetRegs { pid: Pid, regs: libc::user_regs_struct },
    GetSigInfo { pid: Pid },
    PeekData { pid: Pid, addr: u64 },
    PokeData { pid: Pid, addr: u64, data: u64 },
    /// Stop the serve loop.
    End,
}

pub enum TraceReply {
    Unit,
    Word(u64),
    Regs(Box<libc::user_regs_struct>),
    SigInfo(Box<libc::siginfo_t>),
}

pub struct Envelope {
    request: TraceRequest,
    reply: Sender<nix::Result<TraceReply>>,
}

pub struct TraceProxy {
    tx: Mutex<Sender<Envelope>>,
    tracer: Pthread,
}

impl TraceProxy {
    /// Create the proxy pair. Must be called on the tracer thread; the
    /// returned receiver is to be consumed by [`TraceProxy::serve`] on
    /// that same thread.
    pub fn new() -> (TraceProxy, Receiver<Envelope>) {
        let (tx, rx) = channel();
        let proxy = TraceProxy {
            tx: Mutex::new(tx),
            tracer: pthread_self(),
        };
        (proxy, rx)
    }

    pub fn submit(&self, request: TraceRequest) -> nix::Result<TraceReply> {
        let end = matches!(request, TraceRequest::End);
        if !end && pthread_self() == self.tracer {
            return perform(&request);
        }
        let (reply_tx, reply_rx) = channel();
        let envelope = Envelope {
            request,
            reply: reply_tx,
        };
        self.tx
            .lock()
            .unwrap()
            .send(envelope)
            .map_err(|_| Errno::ESRCH)?;
        reply_rx.recv().map_err(|_| Errno::ESRCH)?
    }

    /// The tracer-side loop: perform requests until `End` arrives or all
    /// submitters are gone.
    pub fn serve(&self, rx: Receiver<Envelope>) {
        while let Ok(envelope) = rx.recv() {
            let end = matches!(envelope.request, TraceRequest::End);
            trace!("trace request: {:?}", envelope.request);
            let result = if end {
                Ok(TraceReply::Unit)
            } else {
                perform(&envelope.request)
            };
            // A requester that gave up waiting is not an error.
            let _ = envelope.reply.send(result);
            if end {
                debug!("trace proxy ending");
                break;
            }
        }
    }
}

fn perform(request: &TraceRequest) -> nix::Result<TraceReply> {
    match *request {
        TraceRequest::Next { pid, mode } => {
            match mode {
                TraceMode::SingleStep => ptrace::step(pid, None)?,
                TraceMode::SystemCall => ptrace::syscall(pid, None)?,
            }
            Ok(TraceReply::Unit)
        }
        TraceRequest::GetRegs { pid } => {
            let regs = ptrace::getregs(pid)?;
            Ok(TraceReply::Regs(Box::new(regs)))
        }
        TraceRequest::SetRegs { pid, regs } => {
            ptrace::setregs(pid, regs)?;
            Ok(TraceReply::Unit)
        }
        TraceRequest::GetSigInfo { pid } => {
            let si = ptrace::getsiginfo(pid)?;
            Ok(TraceReply::SigInfo(Box::new(si)))
        }
        TraceRequest::PeekData { pid, addr } => {
            let word = ptrace::read(pid, addr as ptrace::AddressType)?;
            Ok(TraceReply::Word(word as u64))
        }
        TraceRequest::PokeData { pid, addr, data } => {
            unsafe {
                ptrace::write(pid, addr as ptrace::AddressType, data as *mut libc::c_void)?;
            }
            Ok(TraceReply::Unit)
        }
        // Both callers (`submit` and `serve`) intercept `End` before it
        // reaches `perform`.
        TraceRequest::End => unreachable!(),
    }
}

// Typed convenience wrappers; each is a thin cast of the reply variant.

impl TraceProxy {
    pub fn next(&self, pid: Pid, mode: TraceMode) -> nix::Result<()> {
        self.submit(TraceRequest::Next { pid, mode }).map(|_| ())
    }

    pub fn getregs(&self, pid: Pid) -> nix::Result<libc::user_regs_struct> {
        match self.submit(TraceRequest::GetRegs { pid })? {
            TraceReply::Regs(regs) => Ok(*regs),
            _ => Err(Errno::EIO),
        }
    }

    pub fn setregs(&self, pid: Pid, regs: libc::user_regs_struct) -> nix::Result<()> {
        self.submit(TraceRequest::SetRegs { pid, regs }).map(|_| ())
    }

    pub fn getsiginfo(&self, pid: Pid) -> nix::Result<libc::siginfo_t> {
        match self.submit(TraceRequest::GetSigInfo { pid })? {
            TraceReply::SigInfo(si) => Ok(*si),
            _ => Err(Errno::EIO),
        }
    }

    pub fn peek(&self, pid: Pid, addr: u64) -> nix::Result<u64> {
        match self.submit(TraceRequest::PeekData { pid, addr })? {
            TraceReply::Word(word) => Ok(word),
            _ => Err(Errno::EIO),
        }
    }

    pub fn poke(&self, pid: Pid, addr: u64, data: u64) -> nix::Result<()> {
        self.submit(TraceRequest::PokeData { pid, addr, data })
            .map(|_| ())
    }

    pub fn end(&self) -> nix::Result<()> {
        self.submit(TraceRequest::End).map(|_| ())
    }
}
