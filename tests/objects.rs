//! Integration tests for handles, processes and modules.

use ntsim::{
    handle::{ObjectKind, ObjectRef},
    kernel::Resolved,
    marshal::{decode_module_info, MODULE_INFO_SIZE},
    prelude::*,
};

fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_module("ntsim", log::LevelFilter::Debug)
        .parse_default_env()
        .is_test(true)
        .format_timestamp(None)
        .try_init();
}

#[test]
fn bootstrap_registry() {
    init_logging();
    let kernel = Kernel::new();
    assert_eq!(kernel.process_ids(), vec![4, 9999]);
    assert_eq!(kernel.current_process_id(), 9999);
    assert_eq!(kernel.process_id(kernel.current_process()), 9999);

    assert_eq!(
        kernel.with_process(4, |system| (system.name().to_string(), system.thread_count())),
        Some(("System".to_string(), 0))
    );
    assert_eq!(
        kernel.with_process(9999, |current| current.thread_count()),
        Some(1)
    );
}

#[test]
fn process_ids_step_by_four() {
    let kernel = Kernel::new();
    let first = kernel.create_process("one.exe");
    let second = kernel.create_process("two.exe");
    let third = kernel.create_process("three.exe");

    assert_eq!(first, 8);
    assert_eq!(second, first + 4);
    assert_eq!(third, second + 4);
}

#[test]
fn handles_are_minted_in_the_current_table() {
    let kernel = Kernel::new();
    let pid = kernel.create_process("target.exe");

    let first = kernel.open_process(ProcessAccess::QUERY_INFORMATION.bits(), pid);
    let second = kernel.open_process(ProcessAccess::ALL_ACCESS.bits(), pid);
    assert_eq!(first.raw(), 4);
    assert_eq!(second.raw(), 8);

    // The target's own table stays empty
    assert_eq!(kernel.with_process(pid, |p| p.handles().len()), Some(0));
    assert_eq!(
        kernel.with_process(kernel.current_process_id(), |p| p.handles().len()),
        Some(2)
    );

    match kernel.resolve(second) {
        Some(Resolved::Entry(entry)) => {
            assert_eq!(entry.object, ObjectRef::Process { pid });
            assert_eq!(entry.access, ProcessAccess::ALL_ACCESS.bits());
            assert_eq!(entry.kind(), ObjectKind::Process);
        }
        other => panic!("unexpected resolution {other:?}"),
    }
}

#[test]
fn close_handle_exactly_once() {
    let kernel = Kernel::new();
    let handle = kernel.open_process(0, 4);
    assert!(kernel.close_handle(handle));
    assert!(!kernel.close_handle(handle));

    // Values are never reused
    assert_eq!(kernel.open_process(0, 4).raw(), handle.raw() + 4);
}

#[test]
fn pseudo_handles_never_touch_the_table() {
    let kernel = Kernel::new();
    assert!(kernel.close_handle(Handle::CURRENT_PROCESS));
    assert!(kernel.close_handle(Handle::CURRENT_THREAD));
    assert!(kernel.close_handle(Handle::from_raw(u64::MAX)));
    assert!(matches!(
        kernel.resolve(Handle::CURRENT_PROCESS),
        Some(Resolved::CurrentProcess)
    ));
    assert!(matches!(
        kernel.resolve(Handle::from_raw(u64::MAX - 1)),
        Some(Resolved::CurrentThread)
    ));
    assert_eq!(
        kernel.with_process(kernel.current_process_id(), |p| p.handles().len()),
        Some(0)
    );
}

#[test]
fn removed_process_degrades_to_not_found() {
    let kernel = Kernel::new();
    let pid = kernel.create_process("gone.exe");
    let handle = kernel.open_process(0, pid);

    assert!(kernel.remove_process(pid));
    assert!(!kernel.remove_process(kernel.current_process_id()));

    assert_eq!(kernel.process_id(handle), 0);
    assert_eq!(kernel.exit_code_process(handle), None);
    assert_eq!(kernel.wait_for_single_object(handle, INFINITE), WAIT_FAILED);
    assert!(kernel.open_process(0, pid).is_null());
    // The stale entry can still be closed
    assert!(kernel.close_handle(handle));
}

#[test]
fn process_termination_keeps_memory_and_handles() -> Result<()> {
    let kernel = Kernel::new();
    let pid = kernel.create_process("victim.exe");
    let process = RemoteProcess::open(&kernel, pid)?;
    let base = process.alloc(0, PAGE_SIZE, PageProtection::READWRITE)?;
    process.write(base, b"kept")?;
    let thread = process.create_thread(0x1400_1000, 0)?;

    assert_eq!(
        kernel.wait_for_single_object(process.handle()?, 0),
        WAIT_TIMEOUT
    );
    process.terminate(0xC000_0005)?;

    assert_eq!(process.exit_code()?, 0xC000_0005);
    assert_eq!(process.read(base, 4)?, b"kept");
    assert!(thread.exit_code().is_err());
    assert_eq!(
        kernel.wait_for_single_object(process.handle()?, 0),
        WAIT_OBJECT_0
    );
    Ok(())
}

#[test]
fn owned_handle_closes_on_every_exit_path() -> Result<()> {
    fn open_and_fail(kernel: &Kernel, pid: u32) -> Result<()> {
        let process = RemoteProcess::open(kernel, pid)?;
        process.read(0x10000, 4)?;
        Err(Error::ApiFailed {
            api: "Test",
            detail: "early exit".to_string(),
        })
    }

    let kernel = Kernel::new();
    let pid = kernel.create_process("scoped.exe");
    assert!(open_and_fail(&kernel, pid).is_err());
    assert_eq!(
        kernel.with_process(kernel.current_process_id(), |p| p.handles().len()),
        Some(0)
    );
    Ok(())
}

#[test]
fn module_lookup_and_exports() -> Result<()> {
    let kernel = Kernel::new();

    let kernel32 = kernel.get_module_handle("kernel32.dll");
    assert_eq!(kernel.get_module_handle("KERNEL32.dll"), kernel32);

    let open_process = kernel.get_proc_address(kernel32, "OpenProcess");
    let read_memory = kernel.get_proc_address(kernel32, "ReadProcessMemory");
    assert_ne!(open_process, read_memory);
    assert_eq!(kernel.get_proc_address(kernel32, "OpenProcess"), open_process);
    assert!(open_process > kernel32);

    let process = RemoteProcess::current(&kernel);
    let info = process.module_info(kernel32)?;
    assert_eq!(info.base_of_dll, kernel32);
    assert!(info.size_of_image > 0);
    assert!(open_process < kernel32 + u64::from(info.size_of_image));
    Ok(())
}

#[test]
fn module_information_record_layout() {
    let kernel = Kernel::new();
    assert!(kernel.register_module("game.dll", 0x1_8000_0000, 0x2_0000));

    let mut buffer = [0u8; MODULE_INFO_SIZE];
    assert!(kernel.get_module_information(
        Handle::CURRENT_PROCESS,
        0x1_8000_0000,
        &mut buffer
    ));
    assert_eq!(&buffer[0..8], &0x1_8000_0000u64.to_le_bytes());
    assert_eq!(&buffer[8..12], &0x2_0000u32.to_le_bytes());
    assert_eq!(&buffer[12..20], &0x1_8000_1000u64.to_le_bytes());

    let info = decode_module_info(&buffer).unwrap();
    assert_eq!(info.entry_point, 0x1_8000_1000);
}

#[test]
fn on_demand_modules_do_not_overlap() {
    let kernel = Kernel::new();
    let names = ["a.dll", "b.dll", "c.dll", "d.dll"];
    let mut bases: Vec<u64> = names
        .iter()
        .map(|name| kernel.get_module_handle(name))
        .collect();
    bases.sort_unstable();
    bases.dedup();
    assert_eq!(bases.len(), names.len());

    let stride = kernel.config().modules.base_stride;
    for pair in bases.windows(2) {
        assert!(pair[1] - pair[0] >= stride);
    }
}

#[test]
fn independent_kernels() {
    let first = Kernel::new();
    let second = Kernel::with_config(KernelConfig::new().with_current_process(500, "other.exe"));

    let pid = first.create_process("only-first.exe");
    assert!(second.open_process(0, pid).is_null());
    assert_eq!(second.current_process_id(), 500);
    assert_eq!(first.current_process_id(), 9999);
}
