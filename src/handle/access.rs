//! Access rights recorded on handles.
//!
//! The simulation stores the requested mask on every handle entry but never enforces it.

use bitflags::bitflags;

bitflags! {
    /// Process access rights (`PROCESS_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ProcessAccess: u32 {
        /// `PROCESS_TERMINATE`
        const TERMINATE = 0x0001;
        /// `PROCESS_CREATE_THREAD`
        const CREATE_THREAD = 0x0002;
        /// `PROCESS_SET_SESSIONID`
        const SET_SESSIONID = 0x0004;
        /// `PROCESS_VM_OPERATION`
        const VM_OPERATION = 0x0008;
        /// `PROCESS_VM_READ`
        const VM_READ = 0x0010;
        /// `PROCESS_VM_WRITE`
        const VM_WRITE = 0x0020;
        /// `PROCESS_DUP_HANDLE`
        const DUP_HANDLE = 0x0040;
        /// `PROCESS_CREATE_PROCESS`
        const CREATE_PROCESS = 0x0080;
        /// `PROCESS_SET_QUOTA`
        const SET_QUOTA = 0x0100;
        /// `PROCESS_SET_INFORMATION`
        const SET_INFORMATION = 0x0200;
        /// `PROCESS_QUERY_INFORMATION`
        const QUERY_INFORMATION = 0x0400;
        /// `PROCESS_SUSPEND_RESUME`
        const SUSPEND_RESUME = 0x0800;
        /// `PROCESS_QUERY_LIMITED_INFORMATION`
        const QUERY_LIMITED_INFORMATION = 0x1000;
        /// `PROCESS_SET_LIMITED_INFORMATION`
        const SET_LIMITED_INFORMATION = 0x2000;
        /// `PROCESS_ALL_ACCESS`
        const ALL_ACCESS = 0x1F_FFFF;
    }
}

bitflags! {
    /// Thread access rights (`THREAD_*`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ThreadAccess: u32 {
        /// `THREAD_TERMINATE`
        const TERMINATE = 0x0001;
        /// `THREAD_SUSPEND_RESUME`
        const SUSPEND_RESUME = 0x0002;
        /// `THREAD_GET_CONTEXT`
        const GET_CONTEXT = 0x0008;
        /// `THREAD_SET_CONTEXT`
        const SET_CONTEXT = 0x0010;
        /// `THREAD_SET_INFORMATION`
        const SET_INFORMATION = 0x0020;
        /// `THREAD_QUERY_INFORMATION`
        const QUERY_INFORMATION = 0x0040;
        /// `THREAD_SET_THREAD_TOKEN`
        const SET_THREAD_TOKEN = 0x0080;
        /// `THREAD_IMPERSONATE`
        const IMPERSONATE = 0x0100;
        /// `THREAD_DIRECT_IMPERSONATION`
        const DIRECT_IMPERSONATION = 0x0200;
        /// `THREAD_SET_LIMITED_INFORMATION`
        const SET_LIMITED_INFORMATION = 0x0400;
        /// `THREAD_QUERY_LIMITED_INFORMATION`
        const QUERY_LIMITED_INFORMATION = 0x0800;
        /// `THREAD_ALL_ACCESS`
        const ALL_ACCESS = 0x1F_FFFF;
    }
}
