//! Freestanding string primitives.
//!
//! Payloads link no C runtime, so the resolver's string handling is done
//! here with small `#[inline(always)]` routines over raw NUL-terminated
//! pointers. Loader-list module names are UTF-16 while our declarations are
//! narrow, hence the cross-width comparison. Byte-block copy and fill go
//! through `core::ptr`; only operations without a `core` equivalent live in
//! this module.
//!
//! All comparisons fold ASCII `A`–`Z` to lowercase and nothing else. Module
//! and export names are ASCII by convention, so full Unicode case mapping
//! would be wasted bytes.

#[inline(always)]
const fn to_lower(c: u8) -> u8 {
    if c >= b'A' && c <= b'Z' { c + 0x20 } else { c }
}

#[inline(always)]
const fn to_lower_wide(c: u16) -> u16 {
    if c >= b'A' as u16 && c <= b'Z' as u16 { c + 0x20 } else { c }
}

/// Length of a NUL-terminated narrow string, terminator excluded.
#[inline(always)]
pub unsafe fn strlen(text: *const u8) -> usize {
    let mut cursor = text;
    while *cursor != 0 {
        cursor = cursor.add(1);
    }
    cursor.offset_from(text) as usize
}

/// Length of a NUL-terminated UTF-16 string, terminator excluded.
#[inline(always)]
pub unsafe fn wcslen(text: *const u16) -> usize {
    let mut cursor = text;
    while *cursor != 0 {
        cursor = cursor.add(1);
    }
    cursor.offset_from(text) as usize
}

/// Byte-exact comparison of two NUL-terminated strings.
#[inline(always)]
pub unsafe fn strcmp(mut lhs: *const u8, mut rhs: *const u8) -> i32 {
    loop {
        let a = *lhs;
        let b = *rhs;
        if a != b || a == 0 {
            return a as i32 - b as i32;
        }
        lhs = lhs.add(1);
        rhs = rhs.add(1);
    }
}

/// Case-insensitive (ASCII) comparison of two narrow strings.
#[inline(always)]
pub unsafe fn stricmp(mut lhs: *const u8, mut rhs: *const u8) -> i32 {
    loop {
        let a = to_lower(*lhs);
        let b = to_lower(*rhs);
        if a != b || a == 0 {
            return a as i32 - b as i32;
        }
        lhs = lhs.add(1);
        rhs = rhs.add(1);
    }
}

/// Case-insensitive (ASCII) comparison of two UTF-16 strings.
#[inline(always)]
pub unsafe fn wcsicmp(mut lhs: *const u16, mut rhs: *const u16) -> i32 {
    loop {
        let a = to_lower_wide(*lhs);
        let b = to_lower_wide(*rhs);
        if a != b || a == 0 {
            return a as i32 - b as i32;
        }
        lhs = lhs.add(1);
        rhs = rhs.add(1);
    }
}

/// Case-insensitive comparison of a UTF-16 string against a narrow one.
///
/// This is the workhorse of module resolution: the loader stores base names
/// as UTF-16, while declared names are narrow literals.
#[inline(always)]
pub unsafe fn wcsicmp_narrow(mut lhs: *const u16, mut rhs: *const u8) -> i32 {
    loop {
        let a = to_lower_wide(*lhs);
        let b = to_lower_wide(*rhs as u16);
        if a != b || a == 0 {
            return a as i32 - b as i32;
        }
        lhs = lhs.add(1);
        rhs = rhs.add(1);
    }
}

/// First occurrence of `needle` in a NUL-terminated string, or null.
#[inline(always)]
pub unsafe fn strchr(mut text: *const u8, needle: u8) -> *const u8 {
    while *text != 0 {
        if *text == needle {
            return text;
        }
        text = text.add(1);
    }
    core::ptr::null()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strlen_counts_to_terminator() {
        unsafe {
            assert_eq!(strlen(b"kernel32.dll\0".as_ptr()), 12);
            assert_eq!(strlen(b"\0".as_ptr()), 0);
        }
    }

    #[test]
    fn strcmp_is_byte_exact() {
        unsafe {
            assert_eq!(strcmp(b"Sleep\0".as_ptr(), b"Sleep\0".as_ptr()), 0);
            assert!(strcmp(b"Sleep\0".as_ptr(), b"sleep\0".as_ptr()) < 0);
            assert!(strcmp(b"SleepEx\0".as_ptr(), b"Sleep\0".as_ptr()) > 0);
        }
    }

    #[test]
    fn stricmp_folds_ascii_only() {
        unsafe {
            assert_eq!(stricmp(b"KERNEL32.DLL\0".as_ptr(), b"kernel32.dll\0".as_ptr()), 0);
            assert_ne!(stricmp(b"kernel32.dll\0".as_ptr(), b"kernel33.dll\0".as_ptr()), 0);
            // '[' (0x5B) is just past 'Z' and must not fold onto anything.
            assert_ne!(stricmp(b"[\0".as_ptr(), b"{\0".as_ptr()), 0);
        }
    }

    #[test]
    fn wide_comparisons_agree_with_narrow() {
        let wide: Vec<u16> = "NtDll.Dll\0".encode_utf16().collect();
        let other: Vec<u16> = "NTDLL.DLL\0".encode_utf16().collect();
        unsafe {
            assert_eq!(wcslen(wide.as_ptr()), 9);
            assert_eq!(wcsicmp(wide.as_ptr(), other.as_ptr()), 0);
            assert_eq!(wcsicmp_narrow(wide.as_ptr(), b"ntdll.dll\0".as_ptr()), 0);
            assert_ne!(wcsicmp_narrow(wide.as_ptr(), b"ntdll.exe\0".as_ptr()), 0);
        }
    }

    #[test]
    fn strchr_finds_or_nulls() {
        unsafe {
            let text = b"USER32.MessageBoxA\0".as_ptr();
            let dot = strchr(text, b'.');
            assert_eq!(dot.offset_from(text), 6);
            assert!(strchr(text, b'!').is_null());
        }
    }
}
