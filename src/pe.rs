//! PE export-directory resolution.
//!
//! Replaces `GetProcAddress` with a direct walk over a mapped image:
//!
//! ```text
//! DOS header --e_lfanew--> NT headers --> DataDirectory[0]
//!                                              |
//!                                              v
//!                                   IMAGE_EXPORT_DIRECTORY
//!                                     Names[]    -> "FuncA", "FuncB", ...
//!                                     Ordinals[] -> index into Functions[]
//!                                     Functions[]-> export RVAs
//! ```
//!
//! `Names[i]` pairs with `Ordinals[i]`; the ordinal indexes `Functions`.
//! The scan runs from the highest name index down, so when an exporter
//! lists the same name twice the later entry wins regardless of how the
//! table happens to be sorted.
//!
//! With the `forwarder` feature, an export whose RVA lands inside the
//! export directory itself is a forwarder string (`"NTDLL.RtlAllocateHeap"`)
//! and is chased through the loader list recursively. Forward strings name
//! the target without an extension, so `.dll` is appended. Ordinal forwards
//! (`"#41"`) are not supported. Forwarding needs the loader list and is
//! therefore user-mode only.

use core::ffi::c_void;

use windows_sys::Win32::System::Diagnostics::Debug::IMAGE_DIRECTORY_ENTRY_EXPORT;
use windows_sys::Win32::System::SystemServices::{IMAGE_DOS_HEADER, IMAGE_EXPORT_DIRECTORY};

#[cfg(target_arch = "x86")]
use windows_sys::Win32::System::Diagnostics::Debug::IMAGE_NT_HEADERS32 as ImageNtHeaders;
#[cfg(not(target_arch = "x86"))]
use windows_sys::Win32::System::Diagnostics::Debug::IMAGE_NT_HEADERS64 as ImageNtHeaders;

use crate::{hash, strings};

/// Upper bound on a forwarder's target module name, extension included.
#[cfg(all(feature = "forwarder", target_os = "windows"))]
const FORWARD_NAME_MAX: usize = 64;

#[inline(always)]
unsafe fn lookup_impl<F: Fn(*const u8) -> bool>(module: *mut c_void, matches: F) -> *mut c_void {
    let image = module as *const u8;
    let dos = module as *const IMAGE_DOS_HEADER;
    let nt = image.add((*dos).e_lfanew as usize) as *const ImageNtHeaders;
    let directory = (*nt).OptionalHeader.DataDirectory[IMAGE_DIRECTORY_ENTRY_EXPORT as usize];
    let exports = image.add(directory.VirtualAddress as usize) as *const IMAGE_EXPORT_DIRECTORY;

    let names = image.add((*exports).AddressOfNames as usize) as *const u32;
    let mut index = (*exports).NumberOfNames as usize;
    while index > 0 {
        index -= 1;
        let name = image.add(*names.add(index) as usize);
        if matches(name) {
            let functions = image.add((*exports).AddressOfFunctions as usize) as *const u32;
            let ordinals = image.add((*exports).AddressOfNameOrdinals as usize) as *const u16;
            let rva = *functions.add(*ordinals.add(index) as usize);

            #[cfg(all(feature = "forwarder", target_os = "windows"))]
            if rva >= directory.VirtualAddress && rva < directory.VirtualAddress + directory.Size {
                return follow_forwarder(image, rva);
            }

            return image.add(rva as usize) as *mut c_void;
        }
    }
    core::ptr::null_mut()
}

/// Resolves a forwarder string of the form `"TARGETDLL.FuncName"`.
#[cfg(all(feature = "forwarder", target_os = "windows"))]
unsafe fn follow_forwarder(image: *const u8, rva: u32) -> *mut c_void {
    let forward = image.add(rva as usize);

    let dot = strings::strchr(forward, b'.');
    if dot.is_null() {
        return core::ptr::null_mut();
    }

    let symbol = dot.add(1);
    if *symbol == b'#' {
        // Ordinal forward; nothing in the wild we care about uses these.
        return core::ptr::null_mut();
    }

    let module_len = dot.offset_from(forward) as usize;
    let mut target = [0u8; FORWARD_NAME_MAX];
    if module_len + 5 > target.len() {
        return core::ptr::null_mut();
    }
    core::ptr::copy_nonoverlapping(forward, target.as_mut_ptr(), module_len);
    target[module_len..module_len + 4].copy_from_slice(b".dll");

    let module = crate::peb::find_module_by_name(target.as_ptr());
    if module.is_null() {
        return core::ptr::null_mut();
    }
    lookup_export_by_name(module, symbol)
}

/// Export lookup by exact (byte-wise) name.
#[inline(always)]
pub unsafe fn lookup_export_by_name(module: *mut c_void, name: *const u8) -> *mut c_void {
    lookup_impl(module, |export| unsafe { strings::strcmp(export, name) == 0 })
}

/// Export lookup by case-folded FNV-1a hash; the name never leaves the
/// declaration site.
#[inline(always)]
pub unsafe fn lookup_export_by_hash(module: *mut c_void, name_hash: u32) -> *mut c_void {
    lookup_impl(module, |export| unsafe { hash::fnv1a_cstr(export) == name_hash })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthetic single-buffer PE images. RVAs equal buffer offsets, which
    //! is exactly the shape of a mapped image, so the resolver cannot tell
    //! the difference.

    use core::ffi::c_void;
    use core::mem::zeroed;

    use windows_sys::Win32::System::Diagnostics::Debug::IMAGE_DIRECTORY_ENTRY_EXPORT;
    use windows_sys::Win32::System::SystemServices::{IMAGE_DOS_HEADER, IMAGE_EXPORT_DIRECTORY};

    use super::ImageNtHeaders;

    const E_LFANEW: usize = 0x80;
    const EXPORT_DIR: usize = 0x200;
    const NAMES_ARRAY: usize = 0x280;
    const ORDINALS_ARRAY: usize = 0x300;
    const FUNCTIONS_ARRAY: usize = 0x380;
    const STRING_POOL: usize = 0x400;
    const CODE_BASE: usize = 0x800;
    const IMAGE_SIZE: usize = 0x1000;

    #[repr(C, align(16))]
    struct Image([u8; IMAGE_SIZE]);

    pub(crate) struct FakeModule {
        _image: Box<Image>,
        base: *mut u8,
    }

    impl FakeModule {
        /// Builds an image exporting `names` in the given table order. The
        /// export listed at index `i` resolves to `base + rva_of(i)`.
        pub(crate) fn new(names: &[&str]) -> Self {
            assert!(names.len() <= 8);
            let mut image = Box::new(Image([0u8; IMAGE_SIZE]));
            let base = image.0.as_mut_ptr();

            unsafe {
                let mut dos: IMAGE_DOS_HEADER = zeroed();
                dos.e_magic = 0x5A4D;
                dos.e_lfanew = E_LFANEW as i32;
                core::ptr::write(base as *mut IMAGE_DOS_HEADER, dos);

                let mut nt: ImageNtHeaders = zeroed();
                nt.Signature = 0x4550;
                nt.OptionalHeader.DataDirectory[IMAGE_DIRECTORY_ENTRY_EXPORT as usize]
                    .VirtualAddress = EXPORT_DIR as u32;
                nt.OptionalHeader.DataDirectory[IMAGE_DIRECTORY_ENTRY_EXPORT as usize].Size =
                    (STRING_POOL + 0x100 - EXPORT_DIR) as u32;
                core::ptr::write(base.add(E_LFANEW) as *mut ImageNtHeaders, nt);

                let mut exports: IMAGE_EXPORT_DIRECTORY = zeroed();
                exports.NumberOfFunctions = names.len() as u32;
                exports.NumberOfNames = names.len() as u32;
                exports.AddressOfFunctions = FUNCTIONS_ARRAY as u32;
                exports.AddressOfNames = NAMES_ARRAY as u32;
                exports.AddressOfNameOrdinals = ORDINALS_ARRAY as u32;
                core::ptr::write(base.add(EXPORT_DIR) as *mut IMAGE_EXPORT_DIRECTORY, exports);

                let mut string_cursor = STRING_POOL;
                for (index, name) in names.iter().enumerate() {
                    let name_rva = string_cursor;
                    core::ptr::copy_nonoverlapping(
                        name.as_ptr(),
                        base.add(string_cursor),
                        name.len(),
                    );
                    string_cursor += name.len() + 1;

                    core::ptr::write(
                        (base.add(NAMES_ARRAY) as *mut u32).add(index),
                        name_rva as u32,
                    );
                    core::ptr::write(
                        (base.add(ORDINALS_ARRAY) as *mut u16).add(index),
                        index as u16,
                    );
                    core::ptr::write(
                        (base.add(FUNCTIONS_ARRAY) as *mut u32).add(index),
                        Self::rva_of(index),
                    );
                }
            }

            Self { _image: image, base }
        }

        pub(crate) fn base(&self) -> *mut c_void {
            self.base as *mut c_void
        }

        /// Address the export at table index `index` resolves to.
        pub(crate) fn export_address(&self, index: usize) -> *mut c_void {
            (self.base() as usize + Self::rva_of(index) as usize) as *mut c_void
        }

        const fn rva_of(index: usize) -> u32 {
            (CODE_BASE + index * 0x10) as u32
        }
    }
}
