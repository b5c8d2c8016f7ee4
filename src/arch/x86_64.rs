// x64 startup. Arguments arrive in rcx/rdx and are forwarded to _entry
// untouched. All image references are RIP-relative, so the blob needs no
// fixups regardless of where the host mapped it.

core::arch::global_asm!(
    ".section .text$00,\"xr\"",
    ".balign 16",
    ".globl _init",
    "_init:",
    "jmp _start",
    ".text",
);

#[cfg(not(feature = "cleanup"))]
core::arch::global_asm!(
    ".section .text$10,\"xr\"",
    ".balign 16",
    ".globl _start",
    "_start:",
    "sub rsp, 0x28",
    "call _entry",
    "add rsp, 0x28",
    "ret",
    ".text",
);

#[cfg(feature = "cleanup")]
core::arch::global_asm!(
    ".section .text$10,\"xr\"",
    ".balign 16",
    ".globl _start",
    "_start:",
    "sub rsp, 0x28",
    "call _entry",
    "add rsp, 0x28",
    // Hand off to cleanup(table, return_address). The host's return
    // address comes off the stack here and travels in rdx; the free
    // routine at the end of the chain returns on it directly.
    "pop rdx",
    "lea rcx, [rip + __DISPATCH_TABLE]",
    "mov rax, [rcx]",
    "jmp rax",
    "",
    ".globl _cleanup_usermode",
    "_cleanup_usermode:",
    // rcx = table, rdx = host return address.
    "mov rax, [rcx + 8]",  // free_ = VirtualFree
    "push rdx",
    "lea rcx, [rip + _init]",
    "xor edx, edx",        // dwSize = 0
    "mov r8d, 0x8000",     // MEM_RELEASE
    "jmp rax",
    "",
    ".globl _cleanup_kernelmode",
    "_cleanup_kernelmode:",
    "mov rax, [rcx + 8]",  // free_ = ExFreePool
    "push rdx",
    "lea rcx, [rip + _init]",
    "jmp rax",
    ".text",
);
