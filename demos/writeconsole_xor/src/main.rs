//! Writes a line to the host console. Every string in the blob, the
//! greeting included, sits XOR-encoded until first use.

#![no_std]
#![no_main]

use core::ffi::c_void;

use exordium::platform::UserMode;
use exordium::{obf, strings};

const STD_OUTPUT_HANDLE: u32 = -11i32 as u32;

exordium::imports! {
    platform = UserMode;
    entry = payload;

    module kernel32 = "kernel32.dll" {
        fn GetStdHandle(handle_id: u32) -> *mut c_void;
        fn WriteConsoleA(
            console: *mut c_void,
            buffer: *const u8,
            chars_to_write: u32,
            chars_written: *mut u32,
            reserved: *mut c_void,
        ) -> i32;
    }
}

unsafe fn payload(_argument1: *mut c_void, _argument2: *mut c_void) {
    let console = GetStdHandle(STD_OUTPUT_HANDLE);
    if console.is_null() {
        return;
    }

    let greeting = obf!("Hello from a self-resolving payload!\r\n");
    let mut written = 0u32;
    WriteConsoleA(
        console,
        greeting,
        strings::strlen(greeting) as u32,
        &mut written,
        core::ptr::null_mut(),
    );
}

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}
