//! Case-folding FNV-1a.
//!
//! Module and export names are matched by 32-bit hash so the plaintext never
//! has to be stored in the payload. Declarations hash at compile time (the
//! `const fn` path); init hashes the candidate names it walks at runtime and
//! compares the results.
//!
//! The fold subtracts `0x20` from any byte `>= b'a'` with no upper bound
//! check. That mangles bytes above `z`, which is fine: both sides of every
//! comparison run the same fold, and the names this hash is defined for are
//! ASCII. The missing compare-and-branch matters because the fold is inlined
//! into every name-scan loop.
//!
//! UTF-16 input is hashed by its low byte only, which again is exact for
//! ASCII names.

const OFFSET_BASIS: u32 = 0x811c_9dc5;
const PRIME: u32 = 0x0100_0193;

#[inline(always)]
const fn fold(byte: u8) -> u8 {
    if byte >= b'a' { byte - 0x20 } else { byte }
}

#[inline(always)]
const fn step(hash: u32, byte: u8) -> u32 {
    (hash ^ fold(byte) as u32).wrapping_mul(PRIME)
}

/// Compile-time hash of a declared name.
pub const fn fnv1a(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = OFFSET_BASIS;
    let mut index = 0;
    while index < bytes.len() {
        hash = step(hash, bytes[index]);
        index += 1;
    }
    hash
}

/// Runtime hash of a NUL-terminated narrow string.
#[inline(always)]
pub unsafe fn fnv1a_cstr(mut name: *const u8) -> u32 {
    let mut hash = OFFSET_BASIS;
    while *name != 0 {
        hash = step(hash, *name);
        name = name.add(1);
    }
    hash
}

/// Runtime hash of a NUL-terminated UTF-16 string.
#[inline(always)]
pub unsafe fn fnv1a_wstr(mut name: *const u16) -> u32 {
    let mut hash = OFFSET_BASIS;
    while *name != 0 {
        hash = step(hash, *name as u8);
        name = name.add(1);
    }
    hash
}
