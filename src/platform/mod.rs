//! Platform backends.
//!
//! A payload's dispatch table is parameterized by one implementation of
//! [`Platform`]: [`UserMode`] walks the loader list and can reach the
//! LoadLibrary family, [`KernelMode`] queries the system module table and
//! carries the kernel base handed to `init`. The trait itself is
//! OS-independent so the generated table logic can be driven by a synthetic
//! backend under test.

use core::ffi::c_void;

#[cfg(target_os = "windows")]
mod kernel;
#[cfg(target_os = "windows")]
mod user;

#[cfg(target_os = "windows")]
pub use kernel::{KernelHeader, KernelMode};
#[cfg(target_os = "windows")]
pub use user::{UserHeader, UserMode};

/// Resolution backend for a dispatch table.
///
/// # Safety
///
/// Implementations are called during payload init with raw pointers into
/// the table's static storage and must uphold the header layout contract:
/// `Header` is `repr(C)`, its slot order is stable for a given feature set,
/// and `HEADER_INIT` is all-zero so the table can live in zero-initialized
/// storage.
pub unsafe trait Platform: 'static {
    /// Fixed-prefix header embedded at offset zero of the dispatch table,
    /// followed by any platform state.
    type Header: 'static;

    /// Zero value for static initialization.
    const HEADER_INIT: Self::Header;

    /// Whether [`crate::table::flags::DYNAMIC_LOAD`] can work here.
    const HAS_DYNAMIC_LOAD: bool;
    /// Whether [`crate::table::flags::DYNAMIC_UNLOAD`] can work here.
    const HAS_DYNAMIC_UNLOAD: bool;
    /// Whether [`crate::table::flags::DYNAMIC_RESOLVE`] can work here.
    const HAS_DYNAMIC_RESOLVE: bool;

    /// Populates the header slots. Receives the two opaque arguments the
    /// startup stub was invoked with; returns zero on success.
    unsafe fn init_header(
        header: *mut Self::Header,
        argument1: *mut c_void,
        argument2: *mut c_void,
    ) -> u32;

    /// Base of an already-available module, by name.
    unsafe fn find_module_by_name(header: *const Self::Header, name: *const u8) -> *mut c_void;

    /// Base of an already-available module, by folded FNV-1a name hash.
    unsafe fn find_module_by_hash(header: *const Self::Header, name_hash: u32) -> *mut c_void;

    /// Export lookup by exact name.
    unsafe fn lookup_by_name(module: *mut c_void, name: *const u8) -> *mut c_void;

    /// Export lookup by folded FNV-1a name hash.
    unsafe fn lookup_by_hash(module: *mut c_void, name_hash: u32) -> *mut c_void;

    /// Loads a module through the resolved loader slot.
    #[cfg(feature = "load-module")]
    unsafe fn load_module(header: *const Self::Header, name: *const u8) -> *mut c_void;

    /// Releases a module loaded by [`Platform::load_module`].
    #[cfg(feature = "unload-module")]
    unsafe fn unload_module(header: *const Self::Header, module: *mut c_void);

    /// Symbol lookup through the resolved dynamic-lookup slot.
    #[cfg(feature = "lookup-symbol")]
    unsafe fn dynamic_lookup(
        header: *const Self::Header,
        module: *mut c_void,
        name: *const u8,
    ) -> *mut c_void;
}
