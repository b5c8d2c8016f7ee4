//! User-mode module resolution through the loader list.
//!
//! Every process carries its own record of what is mapped where:
//!
//! ```text
//! PEB --> Ldr --> InLoadOrderModuleList
//!                   [1] the .exe itself
//!                   [2] ntdll.dll          <- module_second()
//!                   [3] kernel32.dll       <- module_third()
//!                   [4] ...
//! ```
//!
//! The first three positions are a loader contract, which is what the fast
//! paths exploit: when the requested module is known at the declaration
//! site to be ntdll or kernel32, init can hop straight to the entry instead
//! of comparing names. `full-module-search` turns the hops off.
//!
//! The structures below are declared locally with only the fields the walk
//! touches by name; `windows-sys` hides most of them behind `Reserved`
//! arrays.

use core::arch::asm;
use core::ffi::c_void;

use windows_sys::Win32::Foundation::UNICODE_STRING;

use crate::{hash, strings};

#[repr(C)]
#[allow(dead_code)]
struct ListEntry {
    flink: *mut ListEntry,
    blink: *mut ListEntry,
}

#[repr(C)]
#[allow(dead_code)]
struct PebLdrData {
    length: u32,
    initialized: u32,
    ss_handle: *mut c_void,
    in_load_order_module_list: ListEntry,
}

/// Loader bookkeeping for one mapped module. The in-load-order links sit at
/// offset zero, so a list entry pointer is also an entry pointer.
#[repr(C)]
#[allow(dead_code)]
struct LdrDataTableEntry {
    in_load_order_links: ListEntry,
    in_memory_order_links: ListEntry,
    in_initialization_order_links: ListEntry,
    dll_base: *mut c_void,
    entry_point: *mut c_void,
    size_of_image: u32,
    full_dll_name: UNICODE_STRING,
    base_dll_name: UNICODE_STRING,
}

#[repr(C)]
#[allow(dead_code)]
struct Peb {
    reserved: [u8; 4],
    mutant: *mut c_void,
    image_base_address: *mut c_void,
    ldr: *mut PebLdrData,
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
compile_error!("the loader-list walk is implemented for x86 and x86_64 only");

#[inline(always)]
unsafe fn current_peb() -> *mut Peb {
    let peb: *mut Peb;
    #[cfg(target_arch = "x86_64")]
    asm!("mov {}, gs:[0x60]", out(reg) peb, options(nostack, preserves_flags));
    #[cfg(target_arch = "x86")]
    asm!("mov {}, fs:[0x30]", out(reg) peb, options(nostack, preserves_flags));
    peb
}

#[inline(always)]
unsafe fn find_module_impl<F: Fn(*const u16) -> bool>(matches: F) -> *mut c_void {
    let ldr = (*current_peb()).ldr;
    let head = core::ptr::addr_of_mut!((*ldr).in_load_order_module_list);
    let mut entry = (*head).flink;
    while entry != head {
        let module = entry as *mut LdrDataTableEntry;
        if matches((*module).base_dll_name.Buffer) {
            return (*module).dll_base;
        }
        entry = (*entry).flink;
    }
    core::ptr::null_mut()
}

/// Base of the first loaded module whose name matches, case-insensitively.
#[inline(always)]
pub unsafe fn find_module_by_name(name: *const u8) -> *mut c_void {
    find_module_impl(|module| unsafe { strings::wcsicmp_narrow(module, name) == 0 })
}

/// Base of the first loaded module whose folded name hash matches.
#[inline(always)]
pub unsafe fn find_module_by_hash(name_hash: u32) -> *mut c_void {
    find_module_impl(|module| unsafe { hash::fnv1a_wstr(module) == name_hash })
}

/// Second load-order entry; by loader contract this is ntdll.dll.
#[inline(always)]
pub unsafe fn module_second() -> *mut c_void {
    let ldr = (*current_peb()).ldr;
    let head = core::ptr::addr_of_mut!((*ldr).in_load_order_module_list);
    let entry = (*(*head).flink).flink;
    (*(entry as *mut LdrDataTableEntry)).dll_base
}

/// Third load-order entry; by loader contract this is the kernel32 image.
#[inline(always)]
pub unsafe fn module_third() -> *mut c_void {
    let ldr = (*current_peb()).ldr;
    let head = core::ptr::addr_of_mut!((*ldr).in_load_order_module_list);
    let entry = (*(*(*head).flink).flink).flink;
    (*(entry as *mut LdrDataTableEntry)).dll_base
}

#[cfg(test)]
mod tests {
    use super::*;

    // Layout checks only; walking a real PEB happens in the demo payloads.
    #[test]
    fn loader_structures_match_the_documented_offsets() {
        use core::mem::offset_of;

        #[cfg(target_pointer_width = "64")]
        {
            assert_eq!(offset_of!(PebLdrData, in_load_order_module_list), 0x10);
            assert_eq!(offset_of!(LdrDataTableEntry, dll_base), 0x30);
            assert_eq!(offset_of!(LdrDataTableEntry, full_dll_name), 0x48);
            assert_eq!(offset_of!(LdrDataTableEntry, base_dll_name), 0x58);
            assert_eq!(offset_of!(Peb, ldr), 0x18);
        }
        #[cfg(target_pointer_width = "32")]
        {
            assert_eq!(offset_of!(PebLdrData, in_load_order_module_list), 0x0c);
            assert_eq!(offset_of!(LdrDataTableEntry, dll_base), 0x18);
            assert_eq!(offset_of!(LdrDataTableEntry, base_dll_name), 0x2c);
            assert_eq!(offset_of!(Peb, ldr), 0x0c);
        }
    }
}
