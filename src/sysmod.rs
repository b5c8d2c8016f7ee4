//! Kernel-mode module enumeration.
//!
//! There is no loader list to walk in the kernel; instead the system module
//! table is queried through `ZwQuerySystemInformation(SystemModuleInformation)`.
//! The three entry points this needs are themselves resolved from the
//! kernel image with the export parser, so the only bootstrap input is the
//! ntoskrnl base the loader hands to `init`.
//!
//! The query wants a caller-supplied buffer and reports the size it needs,
//! so allocation is retried until the length stops mismatching. The buffer
//! is the payload's only heap use and is released on every path out of this
//! module, including failures.

use core::ffi::c_void;

use crate::pe;
use crate::strings;

#[cfg(not(feature = "init-symbols-by-string"))]
use crate::hash;

pub const SYSTEM_MODULE_INFORMATION: u32 = 11;
const STATUS_INFO_LENGTH_MISMATCH: i32 = 0xC000_0004_u32 as i32;
const NON_PAGED_POOL: u32 = 0;

pub type ExAllocatePoolFn =
    unsafe extern "system" fn(pool_type: u32, number_of_bytes: usize) -> *mut c_void;
pub type ExFreePoolFn = unsafe extern "system" fn(pool: *mut c_void);
pub type ZwQuerySystemInformationFn = unsafe extern "system" fn(
    information_class: u32,
    buffer: *mut c_void,
    length: u32,
    return_length: *mut u32,
) -> i32;

#[repr(C)]
pub struct RtlProcessModuleInformation {
    pub section: *mut c_void,
    pub mapped_base: *mut c_void,
    pub image_base: *mut c_void,
    pub image_size: u32,
    pub flags: u32,
    pub load_order_index: u16,
    pub init_order_index: u16,
    pub load_count: u16,
    pub offset_to_file_name: u16,
    pub full_path_name: [u8; 256],
}

#[repr(C)]
pub struct RtlProcessModules {
    pub number_of_modules: u32,
    pub modules: [RtlProcessModuleInformation; 1],
}

#[cfg(not(feature = "init-symbols-by-string"))]
const EX_ALLOCATE_POOL_HASH: u32 = hash::fnv1a("ExAllocatePool");
#[cfg(not(feature = "init-symbols-by-string"))]
const EX_FREE_POOL_HASH: u32 = hash::fnv1a("ExFreePool");
#[cfg(not(feature = "init-symbols-by-string"))]
const ZW_QUERY_SYSTEM_INFORMATION_HASH: u32 = hash::fnv1a("ZwQuerySystemInformation");

unsafe fn find_module_impl<F: Fn(*const u8) -> bool>(
    kernel_base: *mut c_void,
    matches: F,
) -> *mut c_void {
    #[cfg(feature = "init-symbols-by-string")]
    let (allocate, free, query) = (
        pe::lookup_export_by_name(kernel_base, crate::obf!("ExAllocatePool")),
        pe::lookup_export_by_name(kernel_base, crate::obf!("ExFreePool")),
        pe::lookup_export_by_name(kernel_base, crate::obf!("ZwQuerySystemInformation")),
    );
    #[cfg(not(feature = "init-symbols-by-string"))]
    let (allocate, free, query) = (
        pe::lookup_export_by_hash(kernel_base, EX_ALLOCATE_POOL_HASH),
        pe::lookup_export_by_hash(kernel_base, EX_FREE_POOL_HASH),
        pe::lookup_export_by_hash(kernel_base, ZW_QUERY_SYSTEM_INFORMATION_HASH),
    );
    if allocate.is_null() || free.is_null() || query.is_null() {
        return core::ptr::null_mut();
    }

    let allocate: ExAllocatePoolFn = core::mem::transmute(allocate);
    let free: ExFreePoolFn = core::mem::transmute(free);
    let query: ZwQuerySystemInformationFn = core::mem::transmute(query);

    let mut buffer: *mut c_void = core::ptr::null_mut();
    let mut length: u32 = 0;
    loop {
        let mut required: u32 = 0;
        let status = query(SYSTEM_MODULE_INFORMATION, buffer, length, &mut required);
        if status == STATUS_INFO_LENGTH_MISMATCH {
            if !buffer.is_null() {
                free(buffer);
            }
            buffer = allocate(NON_PAGED_POOL, required as usize);
            if buffer.is_null() {
                return core::ptr::null_mut();
            }
            length = required;
            continue;
        }
        if status < 0 || buffer.is_null() {
            if !buffer.is_null() {
                free(buffer);
            }
            return core::ptr::null_mut();
        }
        break;
    }

    let modules = buffer as *const RtlProcessModules;
    let first = (*modules).modules.as_ptr();
    let mut result = core::ptr::null_mut();
    let mut index = 0;
    while index < (*modules).number_of_modules as usize {
        let info = first.add(index);
        let name = (*info)
            .full_path_name
            .as_ptr()
            .add((*info).offset_to_file_name as usize);
        if matches(name) {
            result = (*info).image_base;
            break;
        }
        index += 1;
    }

    free(buffer);
    result
}

/// Base of the loaded system module with the given file name.
#[inline(always)]
pub unsafe fn find_module_by_name(kernel_base: *mut c_void, name: *const u8) -> *mut c_void {
    find_module_impl(kernel_base, |module| unsafe {
        strings::stricmp(module, name) == 0
    })
}

/// Base of the loaded system module whose folded name hash matches.
#[inline(always)]
pub unsafe fn find_module_by_hash(kernel_base: *mut c_void, name_hash: u32) -> *mut c_void {
    find_module_impl(kernel_base, |module| unsafe {
        crate::hash::fnv1a_cstr(module) == name_hash
    })
}
