// x86 startup. Fastcall: arguments arrive in ecx/edx. Symbol names carry
// the i686 decorations (`_` prefix, `@name@bytes` for fastcall). The blob
// is linked without relocations, so image addresses cannot be taken
// directly; the image base is recovered with the call/pop trick and a
// link-time difference, which the assembler emits as a PC-relative
// constant.

core::arch::global_asm!(
    ".section .text$00,\"xr\"",
    ".balign 16",
    ".globl __init",
    "__init:",
    "jmp __start",
    ".text",
);

#[cfg(not(feature = "cleanup"))]
core::arch::global_asm!(
    ".section .text$10,\"xr\"",
    ".balign 16",
    ".globl __start",
    "__start:",
    "jmp @_entry@8",
    ".text",
);

#[cfg(feature = "cleanup")]
core::arch::global_asm!(
    ".section .text$10,\"xr\"",
    ".balign 16",
    ".globl __start",
    "__start:",
    "call @_entry@8",
    // cleanup(table, return_address), fastcall.
    "pop edx",
    "call 2f",
    "2:",
    "pop ecx",
    "add ecx, offset ___DISPATCH_TABLE - offset 2b",
    "mov eax, [ecx]",
    "jmp eax",
    "",
    ".globl __cleanup_usermode",
    "__cleanup_usermode:",
    // ecx = table, edx = host return address.
    "mov eax, [ecx + 4]",  // free_ = VirtualFree (stdcall)
    "call 3f",
    "3:",
    "pop ecx",
    "add ecx, offset __init - offset 3b",
    "push 0x8000",         // MEM_RELEASE
    "push 0",              // dwSize
    "push ecx",            // lpAddress = image base
    "push edx",            // VirtualFree returns to the host
    "jmp eax",
    "",
    ".globl __cleanup_kernelmode",
    "__cleanup_kernelmode:",
    "mov eax, [ecx + 4]",  // free_ = ExFreePool (stdcall)
    "call 4f",
    "4:",
    "pop ecx",
    "add ecx, offset __init - offset 4b",
    "push ecx",
    "push edx",
    "jmp eax",
    ".text",
);
