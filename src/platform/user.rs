//! User-mode backend.
//!
//! Header init locates the kernel32 image once through the loader-list fast
//! path and resolves whatever the enabled features need out of it. The
//! resulting slot block is the contract the startup stubs are assembled
//! against:
//!
//! ```text
//! x86 offset   x64 offset   slot            feature
//! +0           +0           cleanup         cleanup
//! +4           +8           free            cleanup
//! +8           +16          load_module     load-module
//! +12          +24          unload_module   unload-module
//! +16          +32          lookup_symbol   lookup-symbol
//! ```
//!
//! A disabled feature removes its slot and shifts the rest up; the stubs
//! are built from the same feature set, so both sides always agree. Do not
//! reorder the fields.

use core::ffi::c_void;

use super::Platform;
use crate::{pe, peb};

#[cfg(all(feature = "cleanup", target_arch = "x86"))]
pub type CleanupFn = unsafe extern "fastcall" fn(table: *mut c_void, return_address: *mut c_void);
#[cfg(all(feature = "cleanup", not(target_arch = "x86")))]
pub type CleanupFn = unsafe extern "C" fn(table: *mut c_void, return_address: *mut c_void);

#[cfg(feature = "cleanup")]
pub type FreeFn =
    unsafe extern "system" fn(address: *mut c_void, size: usize, free_type: u32) -> i32;
#[cfg(feature = "load-module")]
pub type LoadModuleFn = unsafe extern "system" fn(name: *const u8) -> *mut c_void;
#[cfg(feature = "unload-module")]
pub type UnloadModuleFn = unsafe extern "system" fn(module: *mut c_void) -> i32;
#[cfg(feature = "lookup-symbol")]
pub type LookupSymbolFn =
    unsafe extern "system" fn(module: *mut c_void, name: *const u8) -> *mut c_void;

/// Frozen prefix of every user-mode dispatch table.
#[repr(C)]
pub struct UserHeader {
    #[cfg(feature = "cleanup")]
    pub cleanup: Option<CleanupFn>,
    #[cfg(feature = "cleanup")]
    pub free: Option<FreeFn>,
    #[cfg(feature = "load-module")]
    pub load_module: Option<LoadModuleFn>,
    #[cfg(feature = "unload-module")]
    pub unload_module: Option<UnloadModuleFn>,
    #[cfg(feature = "lookup-symbol")]
    pub lookup_symbol: Option<LookupSymbolFn>,
}

#[cfg(any(
    feature = "cleanup",
    feature = "load-module",
    feature = "unload-module",
    feature = "lookup-symbol"
))]
const WORD: usize = core::mem::size_of::<usize>();
#[cfg(any(feature = "load-module", feature = "unload-module", feature = "lookup-symbol"))]
const CLEANUP_SLOTS: usize = if cfg!(feature = "cleanup") { 2 } else { 0 };
#[cfg(any(feature = "unload-module", feature = "lookup-symbol"))]
const LOAD_SLOTS: usize = if cfg!(feature = "load-module") { 1 } else { 0 };
#[cfg(feature = "lookup-symbol")]
const UNLOAD_SLOTS: usize = if cfg!(feature = "unload-module") { 1 } else { 0 };

#[cfg(feature = "cleanup")]
const _: () = {
    assert!(core::mem::offset_of!(UserHeader, cleanup) == 0);
    assert!(core::mem::offset_of!(UserHeader, free) == WORD);
};
#[cfg(feature = "load-module")]
const _: () = assert!(core::mem::offset_of!(UserHeader, load_module) == CLEANUP_SLOTS * WORD);
#[cfg(feature = "unload-module")]
const _: () = assert!(
    core::mem::offset_of!(UserHeader, unload_module) == (CLEANUP_SLOTS + LOAD_SLOTS) * WORD
);
#[cfg(feature = "lookup-symbol")]
const _: () = assert!(
    core::mem::offset_of!(UserHeader, lookup_symbol)
        == (CLEANUP_SLOTS + LOAD_SLOTS + UNLOAD_SLOTS) * WORD
);

#[cfg(feature = "cleanup")]
extern "C" {
    fn _cleanup_usermode();
}

#[cfg(all(
    not(feature = "init-modules-by-string"),
    any(
        feature = "cleanup",
        feature = "load-module",
        feature = "unload-module",
        feature = "lookup-symbol"
    )
))]
const KERNEL32_HASH: u32 = crate::hash::fnv1a("kernel32.dll");
#[cfg(not(feature = "full-module-search"))]
const NTDLL_HASH: u32 = crate::hash::fnv1a("ntdll.dll");
#[cfg(not(feature = "full-module-search"))]
const KERNEL32_FAST_HASH: u32 = crate::hash::fnv1a("kernel32.dll");

#[cfg(any(
    feature = "cleanup",
    feature = "load-module",
    feature = "unload-module",
    feature = "lookup-symbol"
))]
macro_rules! header_symbol {
    ($module:expr, $name:literal) => {{
        #[cfg(feature = "init-symbols-by-string")]
        {
            pe::lookup_export_by_name($module, crate::obf!($name))
        }
        #[cfg(not(feature = "init-symbols-by-string"))]
        {
            const NAME_HASH: u32 = crate::hash::fnv1a($name);
            pe::lookup_export_by_hash($module, NAME_HASH)
        }
    }};
}

/// Stateless user-mode platform.
pub struct UserMode;

unsafe impl Platform for UserMode {
    type Header = UserHeader;

    const HEADER_INIT: UserHeader = UserHeader {
        #[cfg(feature = "cleanup")]
        cleanup: None,
        #[cfg(feature = "cleanup")]
        free: None,
        #[cfg(feature = "load-module")]
        load_module: None,
        #[cfg(feature = "unload-module")]
        unload_module: None,
        #[cfg(feature = "lookup-symbol")]
        lookup_symbol: None,
    };

    const HAS_DYNAMIC_LOAD: bool = cfg!(feature = "load-module");
    const HAS_DYNAMIC_UNLOAD: bool = cfg!(feature = "unload-module");
    const HAS_DYNAMIC_RESOLVE: bool = cfg!(feature = "lookup-symbol");

    unsafe fn init_header(
        header: *mut UserHeader,
        _argument1: *mut c_void,
        _argument2: *mut c_void,
    ) -> u32 {
        // Everything the header hands out comes from kernel32, which is
        // mapped into every user process before any of our code can run.
        #[cfg(any(
            feature = "cleanup",
            feature = "load-module",
            feature = "unload-module",
            feature = "lookup-symbol"
        ))]
        let kernel32 = {
            #[cfg(feature = "init-modules-by-string")]
            {
                Self::find_module_by_name(header, crate::obf!("kernel32.dll"))
            }
            #[cfg(not(feature = "init-modules-by-string"))]
            {
                Self::find_module_by_hash(header, KERNEL32_HASH)
            }
        };

        #[cfg(feature = "cleanup")]
        {
            let stub = crate::pic::live(_cleanup_usermode as usize as *const c_void);
            (*header).cleanup = Some(core::mem::transmute::<*const c_void, CleanupFn>(stub));
            (*header).free = core::mem::transmute::<*mut c_void, Option<FreeFn>>(header_symbol!(
                kernel32,
                "VirtualFree"
            ));
        }
        #[cfg(feature = "lookup-symbol")]
        {
            (*header).lookup_symbol = core::mem::transmute::<*mut c_void, Option<LookupSymbolFn>>(
                header_symbol!(kernel32, "GetProcAddress"),
            );
        }
        #[cfg(feature = "load-module")]
        {
            (*header).load_module = core::mem::transmute::<*mut c_void, Option<LoadModuleFn>>(
                header_symbol!(kernel32, "LoadLibraryA"),
            );
        }
        #[cfg(feature = "unload-module")]
        {
            (*header).unload_module = core::mem::transmute::<*mut c_void, Option<UnloadModuleFn>>(
                header_symbol!(kernel32, "FreeLibrary"),
            );
        }

        let _ = header;
        0
    }

    unsafe fn find_module_by_name(_header: *const UserHeader, name: *const u8) -> *mut c_void {
        #[cfg(not(feature = "full-module-search"))]
        {
            // For a literal caller these fold down to the matching branch.
            let name_hash = crate::hash::fnv1a_cstr(name);
            if name_hash == NTDLL_HASH {
                return peb::module_second();
            }
            if name_hash == KERNEL32_FAST_HASH {
                return peb::module_third();
            }
        }
        peb::find_module_by_name(name)
    }

    unsafe fn find_module_by_hash(_header: *const UserHeader, name_hash: u32) -> *mut c_void {
        #[cfg(not(feature = "full-module-search"))]
        {
            if name_hash == NTDLL_HASH {
                return peb::module_second();
            }
            if name_hash == KERNEL32_FAST_HASH {
                return peb::module_third();
            }
        }
        peb::find_module_by_hash(name_hash)
    }

    unsafe fn lookup_by_name(module: *mut c_void, name: *const u8) -> *mut c_void {
        pe::lookup_export_by_name(module, name)
    }

    unsafe fn lookup_by_hash(module: *mut c_void, name_hash: u32) -> *mut c_void {
        pe::lookup_export_by_hash(module, name_hash)
    }

    #[cfg(feature = "load-module")]
    unsafe fn load_module(header: *const UserHeader, name: *const u8) -> *mut c_void {
        match (*header).load_module {
            Some(load) => load(name),
            None => core::ptr::null_mut(),
        }
    }

    #[cfg(feature = "unload-module")]
    unsafe fn unload_module(header: *const UserHeader, module: *mut c_void) {
        if let Some(unload) = (*header).unload_module {
            unload(module);
        }
    }

    #[cfg(feature = "lookup-symbol")]
    unsafe fn dynamic_lookup(
        header: *const UserHeader,
        module: *mut c_void,
        name: *const u8,
    ) -> *mut c_void {
        match (*header).lookup_symbol {
            Some(lookup) => lookup(module, name),
            None => core::ptr::null_mut(),
        }
    }
}
