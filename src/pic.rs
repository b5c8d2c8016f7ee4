//! Position-independence helpers.
//!
//! A payload is copied to an arbitrary base, but on 32-bit x86 the compiler
//! bakes the link-time addresses of statics and literals into the
//! instruction stream as absolute constants. [`live`] rebases such an
//! address at runtime:
//!
//! ```text
//! runtime = _pc() - (_pc as link-time address) + link-time address of x
//! ```
//!
//! `_pc` is a tiny assembly helper that returns its own runtime address via
//! the call/pop trick. Because the payload image is linked without a
//! relocation section, the difference between any two link-time addresses
//! equals the difference between their runtime addresses, so a single delta
//! rebases everything.
//!
//! On 64-bit targets RIP-relative addressing makes all of this unnecessary
//! and [`live`] compiles down to the identity function.

#[cfg(all(target_arch = "x86", target_os = "windows"))]
core::arch::global_asm!(
    ".section .text$10,\"xr\"",
    ".balign 4",
    ".globl __pc",
    "__pc:",
    "call 2f",
    "2:",
    "pop eax",
    "sub eax, 5", // the call above is five bytes; eax now holds _pc itself
    "ret",
    ".text",
);

#[cfg(all(target_arch = "x86", target_os = "windows"))]
extern "C" {
    fn _pc() -> *mut u8;
}

/// Runtime address of an image-resident datum.
#[cfg(all(target_arch = "x86", target_os = "windows"))]
#[inline(always)]
pub fn live<T>(address: *const T) -> *const T {
    unsafe {
        let delta = (_pc() as usize).wrapping_sub(_pc as usize);
        (address as usize).wrapping_add(delta) as *const T
    }
}

/// Runtime address of an image-resident datum, mutable flavor.
#[cfg(all(target_arch = "x86", target_os = "windows"))]
#[inline(always)]
pub fn live_mut<T>(address: *mut T) -> *mut T {
    unsafe {
        let delta = (_pc() as usize).wrapping_sub(_pc as usize);
        (address as usize).wrapping_add(delta) as *mut T
    }
}

#[cfg(not(all(target_arch = "x86", target_os = "windows")))]
#[inline(always)]
pub fn live<T>(address: *const T) -> *const T {
    address
}

#[cfg(not(all(target_arch = "x86", target_os = "windows")))]
#[inline(always)]
pub fn live_mut<T>(address: *mut T) -> *mut T {
    address
}

/// Declares a payload global whose address survives relocation.
///
/// On x86 a plain `static` would be reached through an absolute address, so
/// the storage is hidden behind accessors that go through [`live`]. On
/// 64-bit targets the accessors collapse to direct access.
///
/// ```ignore
/// exordium::pic_global! {
///     static COUNTER: u32 = 0;
/// }
///
/// unsafe {
///     COUNTER.set(COUNTER.get() + 1);
/// }
/// ```
#[macro_export]
macro_rules! pic_global {
    ($(#[$meta:meta])* $vis:vis static $name:ident : $ty:ty = $init:expr;) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        $vis struct $name;

        #[allow(dead_code)]
        impl $name {
            #[inline(always)]
            fn storage() -> *mut $ty {
                static mut STORAGE: $ty = $init;
                unsafe { $crate::pic::live_mut(::core::ptr::addr_of_mut!(STORAGE)) }
            }

            /// Runtime address of the global.
            #[inline(always)]
            $vis fn ptr(&self) -> *mut $ty {
                Self::storage()
            }

            #[inline(always)]
            $vis unsafe fn get(&self) -> $ty {
                Self::storage().read()
            }

            #[inline(always)]
            $vis unsafe fn set(&self, value: $ty) {
                Self::storage().write(value)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn live_is_identity_off_x86() {
        let value = 7u64;
        let address = &value as *const u64;
        assert_eq!(super::live(address), address);
    }

    #[test]
    fn pic_global_round_trips() {
        crate::pic_global! {
            static COUNTER: u32 = 41;
        }

        unsafe {
            assert_eq!(COUNTER.get(), 41);
            COUNTER.set(COUNTER.get() + 1);
            assert_eq!(COUNTER.get(), 42);
            assert_eq!(*COUNTER.ptr(), 42);
        }
    }
}
