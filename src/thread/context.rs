//! Saved x64 register file of a simulated thread.

use bitflags::bitflags;

bitflags! {
    /// Register groups selected by a context transfer (`CONTEXT_*`).
    ///
    /// Every group constant includes the `CONTEXT_AMD64` architecture bit, so
    /// `contains` checks both the architecture and the group.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ContextFlags: u32 {
        /// `CONTEXT_AMD64`
        const AMD64 = 0x0010_0000;
        /// `CONTEXT_CONTROL`: `SegSs`, `Rsp`, `SegCs`, `Rip`, `EFlags`
        const CONTROL = 0x0010_0001;
        /// `CONTEXT_INTEGER`: `Rax`..`R15` except `Rsp`
        const INTEGER = 0x0010_0002;
        /// `CONTEXT_SEGMENTS`: `SegDs`, `SegEs`, `SegFs`, `SegGs`
        const SEGMENTS = 0x0010_0004;
        /// `CONTEXT_FLOATING_POINT`: `MxCsr`, the save area and vector registers
        const FLOATING_POINT = 0x0010_0008;
        /// `CONTEXT_DEBUG_REGISTERS`: `Dr0`..`Dr7` and the branch trace fields
        const DEBUG_REGISTERS = 0x0010_0010;
        /// `CONTEXT_FULL`
        const FULL = Self::CONTROL.bits() | Self::INTEGER.bits() | Self::FLOATING_POINT.bits();
        /// `CONTEXT_ALL`
        const ALL = Self::FULL.bits() | Self::SEGMENTS.bits() | Self::DEBUG_REGISTERS.bits();
    }
}

impl ContextFlags {
    /// Returns `ALL` when no register group is selected, `self` otherwise.
    ///
    /// Callers that pass a zeroed record get every group.
    #[must_use]
    pub fn or_all(self) -> Self {
        if self.difference(Self::AMD64).is_empty() {
            Self::ALL
        } else {
            self
        }
    }
}

/// One 128-bit vector register (`M128A`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct M128A {
    /// Low 64 bits.
    pub low: u64,
    /// High 64 bits.
    pub high: i64,
}

/// Size of the legacy floating point save area (`XMM_SAVE_AREA32`).
pub const FLOAT_SAVE_SIZE: usize = 512;

/// Number of entries in [`ThreadContext::vector_register`].
pub const VECTOR_REGISTER_COUNT: usize = 26;

/// Default `MxCsr`: all exceptions masked, round to nearest.
pub const DEFAULT_MXCSR: u32 = 0x1F80;

/// Full x64 register file (`CONTEXT`).
///
/// Fields are in record order; [`crate::marshal::encode_context`] writes them at the
/// host offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ThreadContext {
    /// Register parameter home addresses.
    pub p_home: [u64; 6],
    /// Groups this record carries.
    pub context_flags: ContextFlags,
    pub mx_csr: u32,
    pub seg_cs: u16,
    pub seg_ds: u16,
    pub seg_es: u16,
    pub seg_fs: u16,
    pub seg_gs: u16,
    pub seg_ss: u16,
    pub eflags: u32,
    pub dr0: u64,
    pub dr1: u64,
    pub dr2: u64,
    pub dr3: u64,
    pub dr6: u64,
    pub dr7: u64,
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbx: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    /// Legacy floating point save area, kept as raw bytes.
    pub flt_save: [u8; FLOAT_SAVE_SIZE],
    pub vector_register: [M128A; VECTOR_REGISTER_COUNT],
    pub vector_control: u64,
    pub debug_control: u64,
    pub last_branch_to_rip: u64,
    pub last_branch_from_rip: u64,
    pub last_exception_to_rip: u64,
    pub last_exception_from_rip: u64,
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self {
            p_home: [0; 6],
            context_flags: ContextFlags::empty(),
            mx_csr: 0,
            seg_cs: 0,
            seg_ds: 0,
            seg_es: 0,
            seg_fs: 0,
            seg_gs: 0,
            seg_ss: 0,
            eflags: 0,
            dr0: 0,
            dr1: 0,
            dr2: 0,
            dr3: 0,
            dr6: 0,
            dr7: 0,
            rax: 0,
            rcx: 0,
            rdx: 0,
            rbx: 0,
            rsp: 0,
            rbp: 0,
            rsi: 0,
            rdi: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rip: 0,
            flt_save: [0; FLOAT_SAVE_SIZE],
            vector_register: [M128A::default(); VECTOR_REGISTER_COUNT],
            vector_control: 0,
            debug_control: 0,
            last_branch_to_rip: 0,
            last_branch_from_rip: 0,
            last_exception_to_rip: 0,
            last_exception_from_rip: 0,
        }
    }
}

impl ThreadContext {
    /// Creates the context a fresh user-mode thread starts with.
    ///
    /// Segment selectors are the usual 64-bit user-mode values (`cs = 0x33`,
    /// `ss = ds = es = gs = 0x2B`, `fs = 0x53`).
    #[must_use]
    pub fn initial(rip: u64, rsp: u64, eflags: u32) -> Self {
        Self {
            context_flags: ContextFlags::FULL,
            mx_csr: DEFAULT_MXCSR,
            seg_cs: 0x33,
            seg_ds: 0x2B,
            seg_es: 0x2B,
            seg_fs: 0x53,
            seg_gs: 0x2B,
            seg_ss: 0x2B,
            eflags,
            rsp,
            rip,
            ..Self::default()
        }
    }

    /// Copies the register groups selected by `flags` from `source`.
    ///
    /// Fields outside the selected groups keep their current value. `p_home`
    /// and `context_flags` are never copied.
    pub fn merge_from(&mut self, source: &ThreadContext, flags: ContextFlags) {
        if flags.contains(ContextFlags::CONTROL) {
            self.seg_cs = source.seg_cs;
            self.seg_ss = source.seg_ss;
            self.eflags = source.eflags;
            self.rsp = source.rsp;
            self.rip = source.rip;
        }

        if flags.contains(ContextFlags::INTEGER) {
            self.rax = source.rax;
            self.rcx = source.rcx;
            self.rdx = source.rdx;
            self.rbx = source.rbx;
            self.rbp = source.rbp;
            self.rsi = source.rsi;
            self.rdi = source.rdi;
            self.r8 = source.r8;
            self.r9 = source.r9;
            self.r10 = source.r10;
            self.r11 = source.r11;
            self.r12 = source.r12;
            self.r13 = source.r13;
            self.r14 = source.r14;
            self.r15 = source.r15;
        }

        if flags.contains(ContextFlags::SEGMENTS) {
            self.seg_ds = source.seg_ds;
            self.seg_es = source.seg_es;
            self.seg_fs = source.seg_fs;
            self.seg_gs = source.seg_gs;
        }

        if flags.contains(ContextFlags::FLOATING_POINT) {
            self.mx_csr = source.mx_csr;
            self.flt_save = source.flt_save;
            self.vector_register = source.vector_register;
            self.vector_control = source.vector_control;
        }

        if flags.contains(ContextFlags::DEBUG_REGISTERS) {
            self.dr0 = source.dr0;
            self.dr1 = source.dr1;
            self.dr2 = source.dr2;
            self.dr3 = source.dr3;
            self.dr6 = source.dr6;
            self.dr7 = source.dr7;
            self.debug_control = source.debug_control;
            self.last_branch_to_rip = source.last_branch_to_rip;
            self.last_branch_from_rip = source.last_branch_from_rip;
            self.last_exception_to_rip = source.last_exception_to_rip;
            self.last_exception_from_rip = source.last_exception_from_rip;
        }
    }
}
