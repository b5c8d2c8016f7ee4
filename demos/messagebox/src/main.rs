//! Loads user32.dll on demand, shows a message box with XOR-encoded
//! strings, pokes a forwarded export, frees the library again, and then
//! frees the payload's own memory on the way out (the `cleanup` feature).

#![no_std]
#![no_main]

use core::ffi::c_void;

use exordium::obf;
use exordium::platform::UserMode;

const MB_OK: u32 = 0;
const WM_NULL: u32 = 0;

exordium::imports! {
    platform = UserMode;
    entry = payload;

    module user32 = "user32.dll" [dynamic_load | dynamic_unload] {
        fn MessageBoxA(window: *mut c_void, text: *const u8, caption: *const u8, kind: u32) -> i32;
        // Forwarded on current Windows builds to ntdll!NtdllDefWindowProc_A;
        // resolving it exercises the forwarder chase.
        fn DefWindowProcA(window: *mut c_void, message: u32, wparam: usize, lparam: isize) -> isize;
    }
}

unsafe fn payload(_argument1: *mut c_void, _argument2: *mut c_void) {
    DefWindowProcA(core::ptr::null_mut(), WM_NULL, 0, 0);

    MessageBoxA(
        core::ptr::null_mut(),
        obf!("Hello, World!"),
        obf!("exordium"),
        MB_OK,
    );
}

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}
