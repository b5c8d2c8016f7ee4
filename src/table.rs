//! Dispatch-table building blocks.
//!
//! The table itself is generated per payload by [`crate::imports!`]; this
//! module holds the pieces the generated code leans on: the per-entry flag
//! bits, their validity rules (checked at compile time, exercised by tests
//! here), effective-flag inheritance, and thin feature bridges so that the
//! generated resolution code always type-checks while a disabled feature is
//! still rejected at the declaration site.

use core::ffi::c_void;

use crate::platform::Platform;

pub mod flags {
    //! Per-entry flag bits, combinable with `|` in declarations.

    /// Resolve the symbol through the platform's dynamic lookup slot
    /// (GetProcAddress) instead of parsing exports. Implies the name is
    /// kept as a string. On a module, inherited by all of its symbols.
    pub const DYNAMIC_RESOLVE: u32 = 0x01;

    /// Load the module with the platform loader (LoadLibraryA) instead of
    /// expecting it to already be mapped.
    pub const DYNAMIC_LOAD: u32 = 0x02;

    /// Release the module during teardown. Only valid with
    /// [`DYNAMIC_LOAD`]: a borrowed mapping must never be unloaded.
    pub const DYNAMIC_UNLOAD: u32 = 0x04;

    /// Match the module by name comparison instead of hash. Costs the
    /// name string in the image.
    pub const STRING_MODULE: u32 = 0x08;

    /// Match the symbol by name comparison instead of hash. On a module,
    /// inherited by all of its symbols.
    pub const STRING_SYMBOL: u32 = 0x10;

    /// Bits a symbol inherits from its nearest preceding module.
    pub const INHERITED: u32 = DYNAMIC_RESOLVE | STRING_SYMBOL;

    /// Bits that are meaningful on module entries only.
    pub const MODULE_ONLY: u32 = DYNAMIC_LOAD | DYNAMIC_UNLOAD | STRING_MODULE;
}

/// A module may only request unload if it requested load.
pub const fn module_flags_valid(entry_flags: u32) -> bool {
    entry_flags & flags::DYNAMIC_UNLOAD == 0 || entry_flags & flags::DYNAMIC_LOAD != 0
}

/// Symbols reject the module-only bits outright.
pub const fn symbol_flags_valid(entry_flags: u32) -> bool {
    entry_flags & flags::MODULE_ONLY == 0
}

/// Flags a symbol entry resolves under: its own, plus the inheritable bits
/// of its nearest preceding module.
pub const fn effective_symbol_flags(own: u32, module: u32) -> u32 {
    own | (module & flags::INHERITED)
}

// ============================================================================
// Feature bridges.
//
// Generated entry code calls these unconditionally so that every flag
// combination type-checks; when the backing feature is disabled the
// declaration site has already failed its capability assertion, so the
// fallback bodies are unreachable.
// ============================================================================

#[cfg(feature = "load-module")]
#[inline(always)]
pub unsafe fn load_module<P: Platform>(header: *const P::Header, name: *const u8) -> *mut c_void {
    P::load_module(header, name)
}

#[cfg(not(feature = "load-module"))]
#[inline(always)]
pub unsafe fn load_module<P: Platform>(_header: *const P::Header, _name: *const u8) -> *mut c_void {
    core::ptr::null_mut()
}

#[cfg(feature = "unload-module")]
#[inline(always)]
pub unsafe fn unload_module<P: Platform>(header: *const P::Header, module: *mut c_void) {
    P::unload_module(header, module)
}

#[cfg(not(feature = "unload-module"))]
#[inline(always)]
pub unsafe fn unload_module<P: Platform>(_header: *const P::Header, _module: *mut c_void) {}

#[cfg(feature = "lookup-symbol")]
#[inline(always)]
pub unsafe fn dynamic_lookup<P: Platform>(
    header: *const P::Header,
    module: *mut c_void,
    name: *const u8,
) -> *mut c_void {
    P::dynamic_lookup(header, module, name)
}

#[cfg(not(feature = "lookup-symbol"))]
#[inline(always)]
pub unsafe fn dynamic_lookup<P: Platform>(
    _header: *const P::Header,
    _module: *mut c_void,
    _name: *const u8,
) -> *mut c_void {
    core::ptr::null_mut()
}
