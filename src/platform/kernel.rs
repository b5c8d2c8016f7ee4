//! Kernel-mode backend.
//!
//! The loader passes the ntoskrnl base as the first entry argument; header
//! init stows it as platform state and every later module lookup goes
//! through the system module table keyed off it. `ntoskrnl.exe` itself is
//! short-circuited to that base so the bootstrap image resolves without a
//! query.
//!
//! Only `cleanup` has a slot here (`ExFreePool`). The LoadLibrary family
//! does not exist in the kernel, so the dynamic flags are rejected at the
//! declaration site through the capability constants.

use core::ffi::c_void;

use super::Platform;
use crate::{pe, sysmod};

#[cfg(all(feature = "cleanup", target_arch = "x86"))]
pub type CleanupFn = unsafe extern "fastcall" fn(table: *mut c_void, return_address: *mut c_void);
#[cfg(all(feature = "cleanup", not(target_arch = "x86")))]
pub type CleanupFn = unsafe extern "C" fn(table: *mut c_void, return_address: *mut c_void);

/// Frozen prefix of every kernel-mode dispatch table, followed by the
/// platform state block.
#[repr(C)]
pub struct KernelHeader {
    #[cfg(feature = "cleanup")]
    pub cleanup: Option<CleanupFn>,
    #[cfg(feature = "cleanup")]
    pub free: Option<sysmod::ExFreePoolFn>,
    /// The ntoskrnl base handed to `init`.
    pub kernel_base: *mut c_void,
}

#[cfg(feature = "cleanup")]
const _: () = {
    assert!(core::mem::offset_of!(KernelHeader, cleanup) == 0);
    assert!(core::mem::offset_of!(KernelHeader, free) == core::mem::size_of::<usize>());
};

#[cfg(feature = "cleanup")]
extern "C" {
    fn _cleanup_kernelmode();
}

const NTOSKRNL_HASH: u32 = crate::hash::fnv1a("ntoskrnl.exe");
#[cfg(all(feature = "cleanup", not(feature = "init-symbols-by-string")))]
const EX_FREE_POOL_HASH: u32 = crate::hash::fnv1a("ExFreePool");

/// Kernel-mode platform; stateful, carries the kernel base in its header.
pub struct KernelMode;

unsafe impl Platform for KernelMode {
    type Header = KernelHeader;

    const HEADER_INIT: KernelHeader = KernelHeader {
        #[cfg(feature = "cleanup")]
        cleanup: None,
        #[cfg(feature = "cleanup")]
        free: None,
        kernel_base: core::ptr::null_mut(),
    };

    const HAS_DYNAMIC_LOAD: bool = false;
    const HAS_DYNAMIC_UNLOAD: bool = false;
    const HAS_DYNAMIC_RESOLVE: bool = false;

    unsafe fn init_header(
        header: *mut KernelHeader,
        argument1: *mut c_void,
        _argument2: *mut c_void,
    ) -> u32 {
        (*header).kernel_base = argument1;

        #[cfg(feature = "cleanup")]
        {
            let stub = crate::pic::live(_cleanup_kernelmode as usize as *const c_void);
            (*header).cleanup = Some(core::mem::transmute::<*const c_void, CleanupFn>(stub));

            #[cfg(feature = "init-symbols-by-string")]
            let free = pe::lookup_export_by_name(argument1, crate::obf!("ExFreePool"));
            #[cfg(not(feature = "init-symbols-by-string"))]
            let free = pe::lookup_export_by_hash(argument1, EX_FREE_POOL_HASH);

            (*header).free =
                core::mem::transmute::<*mut c_void, Option<sysmod::ExFreePoolFn>>(free);
        }

        0
    }

    unsafe fn find_module_by_name(header: *const KernelHeader, name: *const u8) -> *mut c_void {
        if crate::hash::fnv1a_cstr(name) == NTOSKRNL_HASH {
            return (*header).kernel_base;
        }
        sysmod::find_module_by_name((*header).kernel_base, name)
    }

    unsafe fn find_module_by_hash(header: *const KernelHeader, name_hash: u32) -> *mut c_void {
        if name_hash == NTOSKRNL_HASH {
            return (*header).kernel_base;
        }
        sysmod::find_module_by_hash((*header).kernel_base, name_hash)
    }

    unsafe fn lookup_by_name(module: *mut c_void, name: *const u8) -> *mut c_void {
        pe::lookup_export_by_name(module, name)
    }

    unsafe fn lookup_by_hash(module: *mut c_void, name_hash: u32) -> *mut c_void {
        pe::lookup_export_by_hash(module, name_hash)
    }

    // Statically rejected at every declaration site through the capability
    // constants; these exist so the trait is implemented for any feature set.
    #[cfg(feature = "load-module")]
    unsafe fn load_module(_header: *const KernelHeader, _name: *const u8) -> *mut c_void {
        core::ptr::null_mut()
    }

    #[cfg(feature = "unload-module")]
    unsafe fn unload_module(_header: *const KernelHeader, _module: *mut c_void) {}

    #[cfg(feature = "lookup-symbol")]
    unsafe fn dynamic_lookup(
        _header: *const KernelHeader,
        _module: *mut c_void,
        _name: *const u8,
    ) -> *mut c_void {
        core::ptr::null_mut()
    }
}
