//! Startup and cleanup stubs.
//!
//! These are the only pieces of the payload written in assembly, and they
//! are bound to the rest of the image by two contracts:
//!
//! * **Section order.** The linker script sorts `.text$*` contributions, so
//!   `_init` (`.text$00`) is the first byte of the blob and the address the
//!   host jumps to. `_pc` and `_start` follow in `.text$10`, and the
//!   generated `_entry` sits in `.text$20` ahead of the compiled code.
//!
//! * **Header offsets.** With `cleanup` enabled, the epilogue reads the
//!   `cleanup` slot at table offset 0 and `cleanup` itself reads `free` at
//!   one word. Those offsets are pinned by assertions on the platform
//!   header types.
//!
//! Control flow: the host calls `_init(arg1, arg2)`, which reaches the
//! generated `_entry` with both arguments intact. Without `cleanup`,
//! `_start` simply returns to the host afterwards. With it, `_start` pops
//! the host's return address, tail-calls `cleanup(table, return_address)`,
//! and the cleanup stub in turn tail-calls the platform free routine,
//! `VirtualFree(image, 0, MEM_RELEASE)` in user mode or `ExFreePool(image)`
//! in kernel mode, with the stack arranged so that the free routine
//! returns straight to the host. Nothing of the payload executes after
//! that jump; its backing memory is already condemned.

#[cfg(target_arch = "x86")]
mod x86;
#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
compile_error!("startup stubs are implemented for x86 and x86_64 only");
