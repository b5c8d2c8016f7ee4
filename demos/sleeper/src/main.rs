//! Minimal payload: resolve Sleep by hash and nap for a second. The blob
//! contains neither the string `kernel32.dll` nor `Sleep`.

#![no_std]
#![no_main]

use core::ffi::c_void;

use exordium::platform::UserMode;

exordium::imports! {
    platform = UserMode;
    entry = payload;

    module kernel32 = "kernel32.dll" {
        fn Sleep(milliseconds: u32);
    }
}

unsafe fn payload(_argument1: *mut c_void, _argument2: *mut c_void) {
    Sleep(1000);
}

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}
