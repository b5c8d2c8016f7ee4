//! Kernel-mode payload. A driver-side loader passes the ntoskrnl base as
//! the first entry argument; the ntoskrnl import short-circuits to it and
//! the ksecdd.sys import goes through the system module table.

#![no_std]
#![no_main]

use core::ffi::c_void;

use exordium::platform::KernelMode;

exordium::imports! {
    platform = KernelMode;
    entry = payload;

    module ntoskrnl = "ntoskrnl.exe" {
        fn KeQueryTimeIncrement() -> u32;
    }
    module ksecdd = "ksecdd.sys" {
        fn SystemPrng(buffer: *mut u8, length: usize) -> i32;
    }
}

unsafe fn payload(_argument1: *mut c_void, _argument2: *mut c_void) {
    let _increment = KeQueryTimeIncrement();

    let mut entropy = [0u8; 16];
    SystemPrng(entropy.as_mut_ptr(), entropy.len());
}

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}
