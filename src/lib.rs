//! # Exordium
//!
//! **Exordium** is a compile-time framework for building position-independent
//! Windows payloads in Rust. A payload declares the modules and symbols it
//! needs up front; the framework compiles that declaration into a flat,
//! relocatable blob that carries no imports, no loader metadata and no C
//! runtime, and that resolves everything it needs by itself when the host
//! jumps to its first byte.
//!
//! ## Usage
//!
//! ```ignore
//! #![no_std]
//! #![no_main]
//!
//! use core::ffi::c_void;
//! use exordium::platform::UserMode;
//!
//! exordium::imports! {
//!     platform = UserMode;
//!     entry = payload;
//!
//!     module kernel32 = "kernel32.dll" {
//!         fn Sleep(milliseconds: u32);
//!     }
//!     module user32 = "user32.dll" [dynamic_load | dynamic_unload] {
//!         fn MessageBoxA(window: *mut c_void, text: *const u8,
//!                        caption: *const u8, kind: u32) -> i32;
//!     }
//! }
//!
//! unsafe fn payload(_argument1: *mut c_void, _argument2: *mut c_void) {
//!     Sleep(1000);
//!     MessageBoxA(core::ptr::null_mut(),
//!                 exordium::obf!("Hello, World!"),
//!                 exordium::obf!("exordium"),
//!                 0);
//! }
//!
//! #[panic_handler]
//! fn panic(_: &core::panic::PanicInfo) -> ! {
//!     loop {}
//! }
//! ```
//!
//! ## How it works
//!
//! The [`imports!`] block expands to a single `repr(C)` static, the
//! *dispatch table*: a small platform header (resolved loader entry points,
//! read by the startup stubs at fixed offsets), followed by one slot per
//! declared module or symbol in declaration order.
//!
//! The assembly prologue calls the generated `_entry` with two opaque
//! arguments. `_entry` rebases a pointer to the table (absolute addresses
//! are stale on 32-bit x86; see [`pic`]), runs `init` to fill every slot
//! by walking the loader list ([`peb`]) or the system module table
//! ([`sysmod`]) and parsing export directories ([`pe`]), then runs the
//! user body and tears the table down again. Any resolution failure makes
//! `init` return the ordinal of the failing declaration, and `_entry`
//! returns without running the body.
//!
//! Names are matched by case-folded FNV-1a hash ([`hash`]) unless a
//! declaration opts into string comparison, so a default build contains
//! none of its module or symbol names. Strings the payload does keep can be
//! XOR-encoded at compile time with [`obf!`] / [`obfw!`].
//!
//! ## Feature flags
//!
//! Every feature adds code or dispatch-table slots to the payload, so all
//! of them are off by default.
//!
//! ```toml
//! [features]
//! cleanup                = [] # self-free on exit; implies `startup`
//! load-module            = [] # LoadLibraryA slot, enables `dynamic_load`
//! unload-module          = [] # FreeLibrary slot, enables `dynamic_unload`
//! lookup-symbol          = [] # GetProcAddress slot, enables `dynamic_resolve`
//! xor-string             = [] # obf!/obfw! encode their literals
//! forwarder              = [] # chase forwarded exports (user mode)
//! full-module-search     = [] # disable the ntdll/kernel32 fast paths
//! init-modules-by-string = [] # header init finds kernel32 by name
//! init-symbols-by-string = [] # header init resolves its symbols by name
//! startup                = [] # assemble _init/_start/_cleanup stubs
//! ```
//!
//! ## Building a blob
//!
//! Payload crates build against a `*-pc-windows-gnu` target with the linker
//! script under `demos/`, which pins the section order (`.text$00` startup
//! stub first, generated `_entry` next, everything else after) and keeps
//! relocations out of the image; `objcopy -O binary` then yields the flat
//! blob. `exordium_runner` maps a blob into RWX memory, calls offset zero
//! with two optional arguments, and reports whether the payload freed
//! itself. See the crates under `demos/` for working examples of both
//! modes.

#![cfg_attr(not(test), no_std)]
#![allow(clippy::missing_safety_doc)]

pub mod hash;
pub mod obf;
pub mod pe;
pub mod pic;
pub mod platform;
pub mod strings;
pub mod sysmod;
pub mod table;

#[cfg(target_os = "windows")]
pub mod peb;

#[cfg(all(target_os = "windows", feature = "startup"))]
pub mod arch;

mod imports;

pub use platform::Platform;
pub use table::flags;
