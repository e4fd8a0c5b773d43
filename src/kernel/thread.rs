//! Thread operations (`OpenThread`, `SuspendThread`, `GetThreadContext`, ...).

use log::{debug, warn};

use crate::{
    handle::{Handle, ObjectRef, ThreadAccess},
    kernel::CREATE_SUSPENDED,
    marshal::{decode_context, encode_context},
    thread::Thread,
    Kernel,
};

impl Kernel {
    /// Returns the current-thread pseudo-handle (`GetCurrentThread`).
    #[must_use]
    pub fn current_thread(&self) -> Handle {
        Handle::CURRENT_THREAD
    }

    /// Returns the id of the current thread (`GetCurrentThreadId`).
    ///
    /// This is the lowest thread id of the current process, or 0 once the current
    /// process has no threads left.
    #[must_use]
    pub fn current_thread_id(&self) -> u32 {
        self.with_process(self.current_process_id(), |process| {
            process.main_thread_id()
        })
        .flatten()
        .unwrap_or(0)
    }

    /// Opens a handle to thread `tid` (`OpenThread`).
    ///
    /// Thread ids are only unique per process. The current process is searched first,
    /// then the others in ascending id order, which is the order they were created in.
    /// Returns [`Handle::NULL`] if no process has such a thread.
    pub fn open_thread(&self, access: u32, tid: u32) -> Handle {
        let current = self.current_process_id();
        let owner = std::iter::once(current)
            .chain(self.process_ids().into_iter().filter(|&pid| pid != current))
            .find(|&pid| {
                self.with_process(pid, |process| process.thread(tid).is_some())
                    .unwrap_or(false)
            });

        match owner {
            Some(pid) => self.create_handle(ObjectRef::Thread { pid, tid }, access),
            None => {
                debug!("open_thread: no thread {tid}");
                Handle::NULL
            }
        }
    }

    /// Returns the id of the thread `handle` designates, or 0 (`GetThreadId`).
    #[must_use]
    pub fn thread_id(&self, handle: Handle) -> u32 {
        self.thread_target(handle).map_or(0, |(_, tid)| tid)
    }

    /// Creates a thread in the current process (`CreateThread`).
    ///
    /// See [`create_remote_thread`](Self::create_remote_thread).
    pub fn create_thread(
        &self,
        start_address: u64,
        parameter: u64,
        creation_flags: u32,
    ) -> Option<(Handle, u32)> {
        self.create_remote_thread(
            Handle::CURRENT_PROCESS,
            start_address,
            parameter,
            creation_flags,
        )
    }

    /// Creates a thread in the process `process` designates (`CreateRemoteThread`).
    ///
    /// The new thread's `Rip` is `start_address` and `Rcx` holds `parameter`. It is
    /// running unless `creation_flags` contains [`CREATE_SUSPENDED`], in which case it
    /// stays initialized with a suspend count of 1. Returns a handle in the current
    /// process's table and the thread id, or `None` for an invalid or terminated process.
    pub fn create_remote_thread(
        &self,
        process: Handle,
        start_address: u64,
        parameter: u64,
        creation_flags: u32,
    ) -> Option<(Handle, u32)> {
        let pid = self.process_target(process)?;
        let tid = self
            .with_process_mut(pid, |target| {
                if !target.is_running() {
                    return None;
                }

                let thread = target.create_thread();
                let context = thread.context_mut();
                context.rip = start_address;
                context.rcx = parameter;

                if creation_flags & CREATE_SUSPENDED != 0 {
                    thread.suspend();
                } else {
                    thread.start();
                }
                Some(thread.id())
            })
            .flatten();

        let Some(tid) = tid else {
            warn!("CreateRemoteThread: process {pid} has exited");
            return None;
        };

        let handle = self.create_handle(
            ObjectRef::Thread { pid, tid },
            ThreadAccess::ALL_ACCESS.bits(),
        );
        Some((handle, tid))
    }

    /// Suspends a thread (`SuspendThread`).
    ///
    /// Returns the previous suspend count, or `u32::MAX` for an invalid handle.
    pub fn suspend_thread(&self, handle: Handle) -> u32 {
        self.with_target_thread_mut(handle, Thread::suspend)
            .unwrap_or(u32::MAX)
    }

    /// Resumes a thread (`ResumeThread`).
    ///
    /// Returns the suspend count after the decrement, or `u32::MAX` for an invalid handle.
    pub fn resume_thread(&self, handle: Handle) -> u32 {
        self.with_target_thread_mut(handle, Thread::resume)
            .unwrap_or(u32::MAX)
    }

    /// Terminates a thread (`TerminateThread`).
    pub fn terminate_thread(&self, handle: Handle, exit_code: u32) -> bool {
        self.with_target_thread_mut(handle, |thread| thread.terminate(exit_code))
            .unwrap_or(false)
    }

    /// Returns the exit code of a thread, `STILL_ACTIVE` while it runs
    /// (`GetExitCodeThread`).
    #[must_use]
    pub fn exit_code_thread(&self, handle: Handle) -> Option<u32> {
        let (pid, tid) = self.thread_target(handle)?;
        self.with_process(pid, |process| process.thread(tid).map(Thread::exit_code))
            .flatten()
    }

    /// Copies a thread's registers into a `CONTEXT` record (`GetThreadContext`).
    ///
    /// The groups copied are selected by the record's `ContextFlags`; a record without
    /// any group bit gets all of them. Fields of unselected groups keep the bytes the
    /// caller passed in. Fails for an invalid handle or a short buffer, leaving
    /// `buffer` unchanged.
    pub fn get_thread_context(&self, handle: Handle, buffer: &mut [u8]) -> bool {
        let Ok(mut record) = decode_context(buffer) else {
            return false;
        };

        let Some(()) = self.with_target_thread_mut(handle, |thread| {
            let flags = record.context_flags.or_all();
            record.merge_from(thread.context(), flags);
            record.context_flags = flags;
        }) else {
            return false;
        };

        encode_context(&record, buffer).is_ok()
    }

    /// Replaces a thread's registers from a `CONTEXT` record (`SetThreadContext`).
    ///
    /// Only the groups selected by the record's `ContextFlags` are taken; a record
    /// without any group bit sets all of them.
    pub fn set_thread_context(&self, handle: Handle, buffer: &[u8]) -> bool {
        let Ok(record) = decode_context(buffer) else {
            return false;
        };

        self.with_target_thread_mut(handle, |thread| {
            let flags = record.context_flags.or_all();
            thread.context_mut().merge_from(&record, flags);
        })
        .is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        handle::Handle,
        kernel::{CREATE_SUSPENDED, INFINITE, WAIT_FAILED, WAIT_OBJECT_0},
        marshal::{decode_context, encode_context, write_context_flags, CONTEXT_SIZE},
        thread::{ContextFlags, ThreadState, STILL_ACTIVE},
        Kernel,
    };

    #[test]
    fn current_thread_id_is_first_thread() {
        let kernel = Kernel::new();
        assert_eq!(kernel.current_thread_id(), 1000);
        assert_eq!(kernel.thread_id(kernel.current_thread()), 1000);
    }

    #[test]
    fn open_thread_prefers_current_process() {
        let kernel = Kernel::new();
        let first = kernel.create_process("first.exe");
        let second = kernel.create_process("second.exe");
        kernel.with_process_mut(first, |p| p.create_thread().start());
        kernel.with_process_mut(second, |p| p.create_thread().start());

        // All three processes own a thread 1000
        let owner = |handle| match kernel.resolve(handle) {
            Some(crate::kernel::Resolved::Entry(entry)) => entry.object,
            other => panic!("unexpected {other:?}"),
        };
        let handle = kernel.open_thread(0, kernel.current_thread_id());
        assert_eq!(
            owner(handle),
            crate::handle::ObjectRef::Thread {
                pid: kernel.current_process_id(),
                tid: 1000
            }
        );

        // Without the current process in the running, creation order decides
        kernel.with_process_mut(kernel.current_process_id(), |p| p.terminate(0));
        let handle = kernel.open_thread(0, 1000);
        assert_eq!(
            owner(handle),
            crate::handle::ObjectRef::Thread { pid: first, tid: 1000 }
        );

        assert!(kernel.open_thread(0, 4242).is_null());
    }

    #[test]
    fn suspend_resume() {
        let kernel = Kernel::new();
        let handle = kernel.open_thread(0, kernel.current_thread_id());
        assert_eq!(kernel.suspend_thread(handle), 0);
        assert_eq!(kernel.resume_thread(handle), 0);

        assert_eq!(kernel.suspend_thread(Handle::CURRENT_THREAD), 0);
        assert_eq!(kernel.suspend_thread(Handle::CURRENT_THREAD), 1);
        assert_eq!(kernel.resume_thread(Handle::CURRENT_THREAD), 1);

        assert_eq!(kernel.suspend_thread(Handle::NULL), u32::MAX);
        assert_eq!(kernel.resume_thread(Handle::CURRENT_PROCESS), u32::MAX);
    }

    #[test]
    fn create_remote_thread_sets_entry_registers() {
        let kernel = Kernel::new();
        let pid = kernel.create_process("target.exe");
        let process = kernel.open_process(0, pid);

        let (handle, tid) = kernel
            .create_remote_thread(process, 0x1400_0000, 0xDEAD, 0)
            .unwrap();
        assert_eq!(tid, 1000);
        assert_eq!(kernel.thread_id(handle), 1000);

        let (rip, rcx, state) = kernel
            .with_process(pid, |p| {
                let thread = p.thread(tid).unwrap();
                (thread.context().rip, thread.context().rcx, thread.state())
            })
            .unwrap();
        assert_eq!((rip, rcx), (0x1400_0000, 0xDEAD));
        assert_eq!(state, ThreadState::Running);
    }

    #[test]
    fn create_suspended_thread() {
        let kernel = Kernel::new();
        let (handle, tid) = kernel.create_thread(0x1000, 0, CREATE_SUSPENDED).unwrap();
        assert_eq!(tid, 1001);

        let state = |kernel: &Kernel| {
            kernel
                .with_process(kernel.current_process_id(), |p| p.thread(tid).unwrap().state())
                .unwrap()
        };
        assert_eq!(state(&kernel), ThreadState::Initialized);
        assert_eq!(kernel.resume_thread(handle), 0);
        assert_eq!(state(&kernel), ThreadState::Ready);
    }

    #[test]
    fn create_thread_in_terminated_process() {
        let kernel = Kernel::new();
        let pid = kernel.create_process("dead.exe");
        let process = kernel.open_process(0, pid);
        assert!(kernel.terminate_process(process, 1));
        assert!(kernel.create_remote_thread(process, 0x1000, 0, 0).is_none());
        assert!(kernel.create_remote_thread(Handle::NULL, 0x1000, 0, 0).is_none());
    }

    #[test]
    fn exit_codes_and_wait() {
        let kernel = Kernel::new();
        let (handle, _) = kernel.create_thread(0x1000, 0, 0).unwrap();
        assert_eq!(kernel.exit_code_thread(handle), Some(STILL_ACTIVE));

        assert_eq!(kernel.wait_for_single_object(handle, INFINITE), WAIT_OBJECT_0);
        assert_eq!(kernel.exit_code_thread(handle), Some(0));

        let (other, _) = kernel.create_thread(0x1000, 0, 0).unwrap();
        assert!(kernel.terminate_thread(other, 5));
        assert_eq!(kernel.exit_code_thread(other), Some(5));
        assert!(!kernel.terminate_thread(Handle::NULL, 5));
        assert_eq!(kernel.exit_code_thread(Handle::NULL), None);
    }

    #[test]
    fn thread_handle_dies_with_process_threads() {
        let kernel = Kernel::new();
        let pid = kernel.create_process("target.exe");
        let process = kernel.open_process(0, pid);
        let (thread, _) = kernel.create_remote_thread(process, 0x1000, 0, 0).unwrap();

        assert!(kernel.terminate_process(process, 0));
        assert_eq!(kernel.thread_id(thread), 0);
        assert_eq!(kernel.suspend_thread(thread), u32::MAX);
        assert_eq!(kernel.wait_for_single_object(thread, 0), WAIT_FAILED);
    }

    #[test]
    fn get_context_fills_requested_groups() {
        let kernel = Kernel::new();
        let mut buffer = vec![0xEEu8; CONTEXT_SIZE];
        write_context_flags(&mut buffer, ContextFlags::CONTROL).unwrap();

        assert!(kernel.get_thread_context(Handle::CURRENT_THREAD, &mut buffer));
        let context = decode_context(&buffer).unwrap();
        assert_eq!(context.rip, 0x7FF7_0000_1000);
        assert_eq!(context.rsp, 0xE0000);
        assert_eq!(context.eflags, 0x202);
        // Integer registers were not requested and keep the caller's bytes
        assert_eq!(context.rax, 0xEEEE_EEEE_EEEE_EEEE);
    }

    #[test]
    fn zeroed_record_gets_everything() {
        let kernel = Kernel::new();
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        assert!(kernel.get_thread_context(Handle::CURRENT_THREAD, &mut buffer));
        let context = decode_context(&buffer).unwrap();
        assert_eq!(context.context_flags, ContextFlags::ALL);
        assert_eq!(context.seg_cs, 0x33);
        assert_eq!(context.mx_csr, 0x1F80);
    }

    #[test]
    fn set_context_merges_selected_groups() {
        let kernel = Kernel::new();
        let mut buffer = vec![0u8; CONTEXT_SIZE];
        assert!(kernel.get_thread_context(Handle::CURRENT_THREAD, &mut buffer));

        let mut context = decode_context(&buffer).unwrap();
        context.rip = 0x4000;
        context.rax = 0x1234;
        context.context_flags = ContextFlags::INTEGER;
        encode_context(&context, &mut buffer).unwrap();
        assert!(kernel.set_thread_context(Handle::CURRENT_THREAD, &buffer));

        let mut readback = vec![0u8; CONTEXT_SIZE];
        assert!(kernel.get_thread_context(Handle::CURRENT_THREAD, &mut readback));
        let after = decode_context(&readback).unwrap();
        assert_eq!(after.rax, 0x1234);
        assert_eq!(after.rip, 0x7FF7_0000_1000);
    }

    #[test]
    fn context_failures() {
        let kernel = Kernel::new();
        let mut short = vec![0xAAu8; CONTEXT_SIZE - 1];
        assert!(!kernel.get_thread_context(Handle::CURRENT_THREAD, &mut short));
        assert!(short.iter().all(|&b| b == 0xAA));
        assert!(!kernel.set_thread_context(Handle::CURRENT_THREAD, &short));

        let mut buffer = vec![0u8; CONTEXT_SIZE];
        assert!(!kernel.get_thread_context(Handle::NULL, &mut buffer));
        assert!(buffer.iter().all(|&b| b == 0));
    }
}
