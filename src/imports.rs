//! The import declaration DSL.
//!
//! One [`crate::imports!`] block per payload declares every module and
//! symbol the payload touches and generates the dispatch table around them:
//!
//! ```ignore
//! exordium::imports! {
//!     platform = exordium::platform::UserMode;
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
//! ```
//!
//! The expansion is a single `repr(C)` static: the platform header first,
//! then one word-sized slot per declaration, in declaration order. `init`
//! resolves the slots top to bottom and reports the 1-based ordinal of the
//! first entry that fails; `destroy` runs bottom to top and releases
//! whatever was declared `dynamic_unload`. Each symbol resolves under its
//! own flags plus the inheritable bits of the module above it, and the
//! resolution strategy is chosen while the macro expands, so a hash-matched
//! name never exists as a string in the image.
//!
//! Invalid declarations fail the build with the import named in the
//! message: `dynamic_unload` without `dynamic_load`, module-only flags on a
//! symbol, a symbol with no module above it, or a flag whose feature or
//! platform capability is missing (the kernel backend has none of the
//! dynamic ones).
//!
//! For every `fn` symbol the macro also emits an `#[inline(always)]` proxy
//! function of the same name that reads the slot through the live table
//! pointer and calls it; `static` symbols get a zero-size accessor value
//! with `ptr`/`read`/`write`/`is_resolved`. `entry = path;` additionally
//! emits the `_entry` shim the startup stubs call: init, then the user
//! body, then destroy, or an early return that skips both when init
//! reports a failure.

/// Declares a payload's imports and generates its dispatch table.
#[macro_export]
macro_rules! imports {
    (
        platform = $platform:path;
        $(entry = $entry:path;)?
        $($rest:tt)*
    ) => {
        $crate::__imports_modules! {
            platform = [$platform];
            entry = [$($entry)?];
            queue = [$($rest)*];
            ord = [1u32];
            fields = [];
            zeros = [];
            inits = [];
            destroys = [];
            items = [];
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __imports_modules {
    // module <ident> = "<name>" [flags] { symbols }
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        queue = [module $mid:ident = $mname:literal $([$($mflag:ident)|+])? { $($syms:tt)* } $($rest:tt)*];
        ord = [$ord:expr];
        fields = [$($fields:tt)*];
        zeros = [$($zeros:tt)*];
        inits = [$($inits:tt)*];
        destroys = [$($destroys:tt)*];
        items = [$($items:tt)*];
    ) => {
        $crate::__imports_symbols! {
            platform = [$platform];
            entry = [$($entry)?];
            module = [$mid, $mname, [$($($mflag)*)?]];
            syms = [$($syms)*];
            queue = [$($rest)*];
            ord = [($ord + 1u32)];
            fields = [$($fields)* $mid: *mut ::core::ffi::c_void,];
            zeros = [$($zeros)* $mid: ::core::ptr::null_mut(),];
            inits = [$($inits)* { module $mid, $mname, $ord, [$($($mflag)*)?] }];
            destroys = [{ module $mid, [$($($mflag)*)?] } $($destroys)*];
            items = [$($items)*];
        }
    };

    // Symbols are only valid inside a module block.
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        queue = [fn $($bad:tt)*];
        $($state:tt)*
    ) => {
        ::core::compile_error!("symbol declared before any module; every symbol needs a preceding `module` block");
    };
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        queue = [static $($bad:tt)*];
        $($state:tt)*
    ) => {
        ::core::compile_error!("symbol declared before any module; every symbol needs a preceding `module` block");
    };

    // Declarations exhausted: emit the table, the proxies, and the shim.
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        queue = [];
        ord = [$ord:expr];
        fields = [$($fields:tt)*];
        zeros = [$($zeros:tt)*];
        inits = [$($init:tt)*];
        destroys = [$($destroy:tt)*];
        items = [$($item:tt)*];
    ) => {
        #[repr(C)]
        #[allow(non_snake_case)]
        pub struct __DispatchTable {
            header: <$platform as $crate::platform::Platform>::Header,
            $($fields)*
        }

        $crate::__dispatch_table_static! {
            exported = [$($entry)?];
            platform = [$platform];
            zeros = [$($zeros)*];
        }

        #[allow(dead_code)]
        impl __DispatchTable {
            #[inline(always)]
            fn live() -> *mut __DispatchTable {
                unsafe { $crate::pic::live_mut(::core::ptr::addr_of_mut!(__DISPATCH_TABLE)) }
            }

            /// Resolves every declared entry in declaration order. Returns
            /// zero, or the ordinal of the entry that failed; entries past
            /// it are left untouched.
            unsafe fn init(
                argument1: *mut ::core::ffi::c_void,
                argument2: *mut ::core::ffi::c_void,
            ) -> u32 {
                let table = Self::live();
                let header = ::core::ptr::addr_of_mut!((*table).header);
                let status = <$platform as $crate::platform::Platform>::init_header(
                    header, argument1, argument2,
                );
                if status != 0 {
                    return status;
                }
                $($crate::__init_entry! { table, header, $platform, $init })*
                0
            }

            /// Teardown in reverse declaration order. Must not run after a
            /// failed `init`; the entry shim enforces that.
            unsafe fn destroy(
                argument1: *mut ::core::ffi::c_void,
                argument2: *mut ::core::ffi::c_void,
            ) {
                let table = Self::live();
                let header = ::core::ptr::addr_of_mut!((*table).header);
                $($crate::__destroy_entry! { table, header, $platform, $destroy })*
                let _ = (argument1, argument2, table, header);
            }
        }

        $($crate::__emit_proxy! { $item })*

        $(
            #[inline(always)]
            unsafe fn __entry_impl(
                argument1: *mut ::core::ffi::c_void,
                argument2: *mut ::core::ffi::c_void,
            ) {
                let status = __DispatchTable::init(argument1, argument2);
                if status != 0 {
                    return;
                }
                $entry(argument1, argument2);
                __DispatchTable::destroy(argument1, argument2);
            }

            #[cfg(target_arch = "x86")]
            #[no_mangle]
            #[link_section = ".text$20"]
            pub unsafe extern "fastcall" fn _entry(
                argument1: *mut ::core::ffi::c_void,
                argument2: *mut ::core::ffi::c_void,
            ) {
                __entry_impl(argument1, argument2)
            }

            #[cfg(not(target_arch = "x86"))]
            #[no_mangle]
            #[link_section = ".text$20"]
            pub unsafe extern "C" fn _entry(
                argument1: *mut ::core::ffi::c_void,
                argument2: *mut ::core::ffi::c_void,
            ) {
                __entry_impl(argument1, argument2)
            }
        )?
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __imports_symbols {
    // fn <name>(args) [-> ret] [flags];
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        module = [$mid:ident, $mname:literal, [$($mflag:ident)*]];
        syms = [fn $sname:ident ($($arg:ident : $aty:ty),* $(,)?) $(-> $ret:ty)? $([$($sflag:ident)|+])? ; $($srest:tt)*];
        queue = [$($rest:tt)*];
        ord = [$ord:expr];
        fields = [$($fields:tt)*];
        zeros = [$($zeros:tt)*];
        inits = [$($inits:tt)*];
        destroys = [$($destroys:tt)*];
        items = [$($items:tt)*];
    ) => {
        $crate::__imports_symbols! {
            platform = [$platform];
            entry = [$($entry)?];
            module = [$mid, $mname, [$($mflag)*]];
            syms = [$($srest)*];
            queue = [$($rest)*];
            ord = [($ord + 1u32)];
            fields = [$($fields)* $sname: ::core::option::Option<unsafe extern "system" fn($($aty),*) $(-> $ret)?>,];
            zeros = [$($zeros)* $sname: ::core::option::Option::None,];
            inits = [$($inits)* {
                symbol_fn $sname, $mid, $ord,
                own [$($($sflag)*)?], inherited [$($mflag)*],
                slot [::core::option::Option<unsafe extern "system" fn($($aty),*) $(-> $ret)?>]
            }];
            destroys = [$($destroys)*];
            items = [$($items)* { proxy_fn $sname, ($($arg: $aty),*), [$(-> $ret)?] }];
        }
    };

    // static <name>: <type> [flags];   (value import)
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        module = [$mid:ident, $mname:literal, [$($mflag:ident)*]];
        syms = [static $sname:ident : $sty:ty $([$($sflag:ident)|+])? ; $($srest:tt)*];
        queue = [$($rest:tt)*];
        ord = [$ord:expr];
        fields = [$($fields:tt)*];
        zeros = [$($zeros:tt)*];
        inits = [$($inits:tt)*];
        destroys = [$($destroys:tt)*];
        items = [$($items:tt)*];
    ) => {
        $crate::__imports_symbols! {
            platform = [$platform];
            entry = [$($entry)?];
            module = [$mid, $mname, [$($mflag)*]];
            syms = [$($srest)*];
            queue = [$($rest)*];
            ord = [($ord + 1u32)];
            fields = [$($fields)* $sname: *mut ::core::ffi::c_void,];
            zeros = [$($zeros)* $sname: ::core::ptr::null_mut(),];
            inits = [$($inits)* {
                symbol_val $sname, $mid, $ord,
                own [$($($sflag)*)?], inherited [$($mflag)*]
            }];
            destroys = [$($destroys)*];
            items = [$($items)* { proxy_val $sname, [$sty] }];
        }
    };

    // Module block exhausted: back to the outer queue.
    (
        platform = [$platform:path];
        entry = [$($entry:path)?];
        module = [$mid:ident, $mname:literal, [$($mflag:ident)*]];
        syms = [];
        queue = [$($rest:tt)*];
        ord = [$ord:expr];
        fields = [$($fields:tt)*];
        zeros = [$($zeros:tt)*];
        inits = [$($inits:tt)*];
        destroys = [$($destroys:tt)*];
        items = [$($items:tt)*];
    ) => {
        $crate::__imports_modules! {
            platform = [$platform];
            entry = [$($entry)?];
            queue = [$($rest)*];
            ord = [$ord];
            fields = [$($fields)*];
            zeros = [$($zeros)*];
            inits = [$($inits)*];
            destroys = [$($destroys)*];
            items = [$($items)*];
        }
    };
}

// The table static is exported for the startup stubs only when the
// declaration asked for an entry shim; tests and libraries keep it local.
#[doc(hidden)]
#[macro_export]
macro_rules! __dispatch_table_static {
    (exported = []; platform = [$platform:path]; zeros = [$($zeros:tt)*];) => {
        static mut __DISPATCH_TABLE: __DispatchTable = __DispatchTable {
            header: <$platform as $crate::platform::Platform>::HEADER_INIT,
            $($zeros)*
        };
    };
    (exported = [$entry:path]; platform = [$platform:path]; zeros = [$($zeros:tt)*];) => {
        #[no_mangle]
        static mut __DISPATCH_TABLE: __DispatchTable = __DispatchTable {
            header: <$platform as $crate::platform::Platform>::HEADER_INIT,
            $($zeros)*
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __init_entry {
    ($table:ident, $header:ident, $platform:path, { module $mid:ident, $mname:literal, $ord:expr, [$($flag:ident)*] }) => {{
        const _: () = ::core::assert!(
            $crate::table::module_flags_valid($crate::__flag_bits!($($flag)*)),
            ::core::concat!($mname, ": dynamic_unload requires dynamic_load")
        );
        $crate::__has_flag! { dynamic_load, [$($flag)*],
            {
                const _: () = ::core::assert!(
                    <$platform as $crate::platform::Platform>::HAS_DYNAMIC_LOAD,
                    ::core::concat!($mname, ": dynamic_load needs the load-module feature and a platform that offers it")
                );
                (*$table).$mid = $crate::table::load_module::<$platform>(
                    $header,
                    $crate::__obf_salted!($mname, $ord),
                );
            },
            {
                $crate::__has_flag! { string_module, [$($flag)*],
                    {
                        (*$table).$mid = <$platform as $crate::platform::Platform>::find_module_by_name(
                            $header,
                            $crate::__obf_salted!($mname, $ord),
                        );
                    },
                    {
                        const __NAME_HASH: u32 = $crate::hash::fnv1a($mname);
                        (*$table).$mid = <$platform as $crate::platform::Platform>::find_module_by_hash(
                            $header,
                            __NAME_HASH,
                        );
                    }
                }
            }
        }
        $crate::__has_flag! { dynamic_unload, [$($flag)*],
            {
                const _: () = ::core::assert!(
                    <$platform as $crate::platform::Platform>::HAS_DYNAMIC_UNLOAD,
                    ::core::concat!($mname, ": dynamic_unload needs the unload-module feature and a platform that offers it")
                );
            },
            {}
        }
        if (*$table).$mid.is_null() {
            return $ord;
        }
    }};

    ($table:ident, $header:ident, $platform:path, {
        symbol_fn $sname:ident, $mid:ident, $ord:expr,
        own [$($sflag:ident)*], inherited [$($mflag:ident)*],
        slot [$slot:ty]
    }) => {{
        const _: () = ::core::assert!(
            $crate::table::symbol_flags_valid($crate::__flag_bits!($($sflag)*)),
            ::core::concat!(
                ::core::stringify!($sname),
                ": dynamic_load, dynamic_unload and string_module apply to module entries only"
            )
        );
        $crate::__has_flag! { dynamic_resolve, [$($sflag)* $($mflag)*],
            {
                const _: () = ::core::assert!(
                    <$platform as $crate::platform::Platform>::HAS_DYNAMIC_RESOLVE,
                    ::core::concat!(
                        ::core::stringify!($sname),
                        ": dynamic_resolve needs the lookup-symbol feature and a platform that offers it"
                    )
                );
                let resolved = $crate::table::dynamic_lookup::<$platform>(
                    $header,
                    (*$table).$mid,
                    $crate::__obf_salted!(::core::stringify!($sname), $ord),
                );
                (*$table).$sname =
                    ::core::mem::transmute::<*mut ::core::ffi::c_void, $slot>(resolved);
            },
            {
                $crate::__has_flag! { string_symbol, [$($sflag)* $($mflag)*],
                    {
                        let resolved = <$platform as $crate::platform::Platform>::lookup_by_name(
                            (*$table).$mid,
                            $crate::__obf_salted!(::core::stringify!($sname), $ord),
                        );
                        (*$table).$sname =
                            ::core::mem::transmute::<*mut ::core::ffi::c_void, $slot>(resolved);
                    },
                    {
                        const __NAME_HASH: u32 = $crate::hash::fnv1a(::core::stringify!($sname));
                        let resolved = <$platform as $crate::platform::Platform>::lookup_by_hash(
                            (*$table).$mid,
                            __NAME_HASH,
                        );
                        (*$table).$sname =
                            ::core::mem::transmute::<*mut ::core::ffi::c_void, $slot>(resolved);
                    }
                }
            }
        }
        if (*$table).$sname.is_none() {
            return $ord;
        }
    }};

    ($table:ident, $header:ident, $platform:path, {
        symbol_val $sname:ident, $mid:ident, $ord:expr,
        own [$($sflag:ident)*], inherited [$($mflag:ident)*]
    }) => {{
        const _: () = ::core::assert!(
            $crate::table::symbol_flags_valid($crate::__flag_bits!($($sflag)*)),
            ::core::concat!(
                ::core::stringify!($sname),
                ": dynamic_load, dynamic_unload and string_module apply to module entries only"
            )
        );
        $crate::__has_flag! { dynamic_resolve, [$($sflag)* $($mflag)*],
            {
                const _: () = ::core::assert!(
                    <$platform as $crate::platform::Platform>::HAS_DYNAMIC_RESOLVE,
                    ::core::concat!(
                        ::core::stringify!($sname),
                        ": dynamic_resolve needs the lookup-symbol feature and a platform that offers it"
                    )
                );
                (*$table).$sname = $crate::table::dynamic_lookup::<$platform>(
                    $header,
                    (*$table).$mid,
                    $crate::__obf_salted!(::core::stringify!($sname), $ord),
                );
            },
            {
                $crate::__has_flag! { string_symbol, [$($sflag)* $($mflag)*],
                    {
                        (*$table).$sname = <$platform as $crate::platform::Platform>::lookup_by_name(
                            (*$table).$mid,
                            $crate::__obf_salted!(::core::stringify!($sname), $ord),
                        );
                    },
                    {
                        const __NAME_HASH: u32 = $crate::hash::fnv1a(::core::stringify!($sname));
                        (*$table).$sname = <$platform as $crate::platform::Platform>::lookup_by_hash(
                            (*$table).$mid,
                            __NAME_HASH,
                        );
                    }
                }
            }
        }
        if (*$table).$sname.is_null() {
            return $ord;
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __destroy_entry {
    ($table:ident, $header:ident, $platform:path, { module $mid:ident, [$($flag:ident)*] }) => {
        $crate::__has_flag! { dynamic_unload, [$($flag)*],
            {
                if !(*$table).$mid.is_null() {
                    $crate::table::unload_module::<$platform>($header, (*$table).$mid);
                }
            },
            {}
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __emit_proxy {
    ({ proxy_fn $sname:ident, ($($arg:ident : $aty:ty),*), [$($retpart:tt)*] }) => {
        #[allow(non_snake_case, dead_code)]
        #[inline(always)]
        pub unsafe fn $sname($($arg: $aty),*) $($retpart)* {
            match (*__DispatchTable::live()).$sname {
                ::core::option::Option::Some(function) => function($($arg),*),
                ::core::option::Option::None => ::core::hint::unreachable_unchecked(),
            }
        }
    };
    ({ proxy_val $sname:ident, [$sty:ty] }) => {
        #[allow(non_camel_case_types, dead_code)]
        pub struct $sname;

        #[allow(dead_code)]
        impl $sname {
            /// Address of the resolved export.
            #[inline(always)]
            pub unsafe fn ptr(&self) -> *mut $sty {
                (*__DispatchTable::live()).$sname.cast()
            }

            #[inline(always)]
            pub unsafe fn read(&self) -> $sty {
                self.ptr().read()
            }

            #[inline(always)]
            pub unsafe fn write(&self, value: $sty) {
                self.ptr().write(value)
            }

            #[inline(always)]
            pub unsafe fn is_resolved(&self) -> bool {
                !(*__DispatchTable::live()).$sname.is_null()
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flag_bits {
    () => { 0u32 };
    ($head:ident $($rest:ident)*) => {
        $crate::__flag!($head) | $crate::__flag_bits!($($rest)*)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flag {
    (dynamic_resolve) => { $crate::table::flags::DYNAMIC_RESOLVE };
    (dynamic_load) => { $crate::table::flags::DYNAMIC_LOAD };
    (dynamic_unload) => { $crate::table::flags::DYNAMIC_UNLOAD };
    (string_module) => { $crate::table::flags::STRING_MODULE };
    (string_symbol) => { $crate::table::flags::STRING_SYMBOL };
}

// Token-level flag test: expands the first branch when `$want` occurs in
// the list, the second otherwise. The specific-head rules only fire when
// the head equals the wanted flag; any other head falls through to the
// recursion rule below them.
#[doc(hidden)]
#[macro_export]
macro_rules! __has_flag {
    (dynamic_resolve, [dynamic_resolve $($rest:ident)*], {$($yes:tt)*}, {$($no:tt)*}) => { $($yes)* };
    (dynamic_load, [dynamic_load $($rest:ident)*], {$($yes:tt)*}, {$($no:tt)*}) => { $($yes)* };
    (dynamic_unload, [dynamic_unload $($rest:ident)*], {$($yes:tt)*}, {$($no:tt)*}) => { $($yes)* };
    (string_module, [string_module $($rest:ident)*], {$($yes:tt)*}, {$($no:tt)*}) => { $($yes)* };
    (string_symbol, [string_symbol $($rest:ident)*], {$($yes:tt)*}, {$($no:tt)*}) => { $($yes)* };
    ($want:ident, [$head:ident $($rest:ident)*], {$($yes:tt)*}, {$($no:tt)*}) => {
        $crate::__has_flag! { $want, [$($rest)*], {$($yes)*}, {$($no)*} }
    };
    ($want:ident, [], {$($yes:tt)*}, {$($no:tt)*}) => { $($no)* };
}

#[cfg(test)]
mod tests {
    //! The generated table is driven end-to-end against synthetic modules:
    //! a scenario-local platform serves image bases out of a registry and
    //! counts which lookup path each resolution took, which makes flag
    //! inheritance and teardown order directly observable.

    use crate::pe::fixtures::FakeModule;

    // One mock platform per scenario module, so counters never cross test
    // threads. Items expanded by the macro land in the invoking module.
    macro_rules! mock_platform {
        () => {
            pub struct Mock;
            pub struct MockHeader;

            pub static REGISTRY: ::std::sync::Mutex<::std::vec::Vec<(u32, usize)>> =
                ::std::sync::Mutex::new(::std::vec::Vec::new());
            pub static NAME_LOOKUPS: ::core::sync::atomic::AtomicU32 =
                ::core::sync::atomic::AtomicU32::new(0);
            pub static HASH_LOOKUPS: ::core::sync::atomic::AtomicU32 =
                ::core::sync::atomic::AtomicU32::new(0);
            #[allow(dead_code)]
            pub static DYNAMIC_LOOKUPS: ::core::sync::atomic::AtomicU32 =
                ::core::sync::atomic::AtomicU32::new(0);
            #[allow(dead_code)]
            pub static LOADS: ::core::sync::atomic::AtomicU32 =
                ::core::sync::atomic::AtomicU32::new(0);
            #[allow(dead_code)]
            pub static UNLOADS: ::std::sync::Mutex<::std::vec::Vec<usize>> =
                ::std::sync::Mutex::new(::std::vec::Vec::new());

            #[allow(dead_code)]
            pub fn register(name: &str, base: *mut ::core::ffi::c_void) {
                REGISTRY
                    .lock()
                    .unwrap()
                    .push((crate::hash::fnv1a(name), base as usize));
            }

            fn registry_find(name_hash: u32) -> *mut ::core::ffi::c_void {
                REGISTRY
                    .lock()
                    .unwrap()
                    .iter()
                    .find(|(hash, _)| *hash == name_hash)
                    .map(|(_, base)| *base as *mut ::core::ffi::c_void)
                    .unwrap_or(::core::ptr::null_mut())
            }

            unsafe impl crate::platform::Platform for Mock {
                type Header = MockHeader;
                const HEADER_INIT: MockHeader = MockHeader;
                const HAS_DYNAMIC_LOAD: bool = cfg!(feature = "load-module");
                const HAS_DYNAMIC_UNLOAD: bool = cfg!(feature = "unload-module");
                const HAS_DYNAMIC_RESOLVE: bool = cfg!(feature = "lookup-symbol");

                unsafe fn init_header(
                    _header: *mut MockHeader,
                    _argument1: *mut ::core::ffi::c_void,
                    _argument2: *mut ::core::ffi::c_void,
                ) -> u32 {
                    0
                }

                unsafe fn find_module_by_name(
                    _header: *const MockHeader,
                    name: *const u8,
                ) -> *mut ::core::ffi::c_void {
                    registry_find(crate::hash::fnv1a_cstr(name))
                }

                unsafe fn find_module_by_hash(
                    _header: *const MockHeader,
                    name_hash: u32,
                ) -> *mut ::core::ffi::c_void {
                    registry_find(name_hash)
                }

                unsafe fn lookup_by_name(
                    module: *mut ::core::ffi::c_void,
                    name: *const u8,
                ) -> *mut ::core::ffi::c_void {
                    NAME_LOOKUPS.fetch_add(1, ::core::sync::atomic::Ordering::SeqCst);
                    crate::pe::lookup_export_by_name(module, name)
                }

                unsafe fn lookup_by_hash(
                    module: *mut ::core::ffi::c_void,
                    name_hash: u32,
                ) -> *mut ::core::ffi::c_void {
                    HASH_LOOKUPS.fetch_add(1, ::core::sync::atomic::Ordering::SeqCst);
                    crate::pe::lookup_export_by_hash(module, name_hash)
                }

                #[cfg(feature = "load-module")]
                unsafe fn load_module(
                    _header: *const MockHeader,
                    name: *const u8,
                ) -> *mut ::core::ffi::c_void {
                    LOADS.fetch_add(1, ::core::sync::atomic::Ordering::SeqCst);
                    registry_find(crate::hash::fnv1a_cstr(name))
                }

                #[cfg(feature = "unload-module")]
                unsafe fn unload_module(
                    _header: *const MockHeader,
                    module: *mut ::core::ffi::c_void,
                ) {
                    UNLOADS.lock().unwrap().push(module as usize);
                }

                #[cfg(feature = "lookup-symbol")]
                unsafe fn dynamic_lookup(
                    _header: *const MockHeader,
                    module: *mut ::core::ffi::c_void,
                    name: *const u8,
                ) -> *mut ::core::ffi::c_void {
                    DYNAMIC_LOOKUPS.fetch_add(1, ::core::sync::atomic::Ordering::SeqCst);
                    crate::pe::lookup_export_by_name(module, name)
                }
            }
        };
    }

    mod hash_resolution {
        use super::FakeModule;
        use core::sync::atomic::Ordering;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "hash_res_a.dll" {
                fn FirstExport(value: u32) -> u32;
                fn SecondExport();
            }
        }

        #[test]
        fn every_slot_is_resolved_without_name_comparisons() {
            let module = FakeModule::new(&["FirstExport", "SecondExport"]);
            register("hash_res_a.dll", module.base());

            unsafe {
                let status =
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut());
                assert_eq!(status, 0);

                let table = &*__DispatchTable::live();
                assert_eq!(table.fake, module.base());
                assert_eq!(
                    table.FirstExport.map(|f| f as usize),
                    Some(module.export_address(0) as usize)
                );
                assert_eq!(
                    table.SecondExport.map(|f| f as usize),
                    Some(module.export_address(1) as usize)
                );
            }

            assert_eq!(HASH_LOOKUPS.load(Ordering::SeqCst), 2);
            assert_eq!(NAME_LOOKUPS.load(Ordering::SeqCst), 0);
        }
    }

    mod missing_module {
        use core::sync::atomic::Ordering;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module absent = "never_registered.dll" {
                fn Whatever();
            }
        }

        #[test]
        fn init_reports_the_module_ordinal() {
            unsafe {
                let status =
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut());
                assert_eq!(status, 1);
                // Resolution stopped at the module; the symbol was never tried.
                assert!((*__DispatchTable::live()).Whatever.is_none());
            }
            assert_eq!(HASH_LOOKUPS.load(Ordering::SeqCst), 0);
        }
    }

    mod missing_symbol {
        use super::FakeModule;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "missing_sym.dll" {
                fn Present();
                fn Absent();
            }
        }

        #[test]
        fn init_reports_the_failing_ordinal_and_keeps_earlier_slots() {
            let module = FakeModule::new(&["Present"]);
            register("missing_sym.dll", module.base());

            unsafe {
                let status =
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut());
                assert_eq!(status, 3);

                let table = &*__DispatchTable::live();
                assert_eq!(table.fake, module.base());
                assert!(table.Present.is_some());
                assert!(table.Absent.is_none());
            }
        }
    }

    mod module_wide_string_symbols {
        use super::FakeModule;
        use core::sync::atomic::Ordering;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "inherit_str.dll" [string_symbol] {
                fn PlainSymbol();
            }
        }

        #[test]
        fn symbols_inherit_the_string_strategy() {
            let module = FakeModule::new(&["PlainSymbol"]);
            register("inherit_str.dll", module.base());

            unsafe {
                assert_eq!(
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut()),
                    0
                );
            }
            assert_eq!(NAME_LOOKUPS.load(Ordering::SeqCst), 1);
            assert_eq!(HASH_LOOKUPS.load(Ordering::SeqCst), 0);
        }
    }

    mod symbol_level_string_flag {
        use super::FakeModule;
        use core::sync::atomic::Ordering;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "own_str.dll" {
                fn ByName() [string_symbol];
                fn ByHash();
            }
        }

        #[test]
        fn a_flagless_module_does_not_downgrade_the_symbol() {
            let module = FakeModule::new(&["ByName", "ByHash"]);
            register("own_str.dll", module.base());

            unsafe {
                assert_eq!(
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut()),
                    0
                );
            }
            assert_eq!(NAME_LOOKUPS.load(Ordering::SeqCst), 1);
            assert_eq!(HASH_LOOKUPS.load(Ordering::SeqCst), 1);
        }
    }

    mod string_module_lookup {
        use super::FakeModule;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "by_name_mod.dll" [string_module] {
                fn Export();
            }
        }

        #[test]
        fn the_module_is_found_by_name() {
            let module = FakeModule::new(&["Export"]);
            register("by_name_mod.dll", module.base());

            unsafe {
                assert_eq!(
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut()),
                    0
                );
                assert_eq!((*__DispatchTable::live()).fake, module.base());
            }
        }
    }

    mod value_import {
        use super::FakeModule;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "value_imp.dll" {
                static DataExport: u32;
            }
        }

        #[test]
        fn the_proxy_reads_and_writes_through_the_slot() {
            let module = FakeModule::new(&["DataExport"]);
            register("value_imp.dll", module.base());

            unsafe {
                assert_eq!(
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut()),
                    0
                );
                assert!(DataExport.is_resolved());
                assert_eq!(
                    DataExport.ptr() as usize,
                    module.export_address(0) as usize
                );
                assert_eq!(DataExport.read(), 0);
                DataExport.write(0xDEAD_BEEF);
                assert_eq!(DataExport.read(), 0xDEAD_BEEF);
            }
        }
    }

    mod table_layout {
        use core::ffi::c_void;
        use core::mem::{offset_of, size_of};

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "layout.dll" {
                fn One();
                fn Two();
            }
        }

        #[test]
        fn slots_follow_the_header_in_declaration_order() {
            let word = size_of::<*mut c_void>();
            let header = size_of::<MockHeader>();
            assert_eq!(offset_of!(__DispatchTable, header), 0);
            assert_eq!(offset_of!(__DispatchTable, fake), header);
            assert_eq!(offset_of!(__DispatchTable, One), header + word);
            assert_eq!(offset_of!(__DispatchTable, Two), header + 2 * word);
            assert_eq!(size_of::<__DispatchTable>(), header + 3 * word);
        }
    }

    #[cfg(all(feature = "load-module", feature = "unload-module"))]
    mod dynamic_load_unload {
        use super::FakeModule;
        use core::sync::atomic::Ordering;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module first = "dyn_first.dll" [dynamic_load | dynamic_unload] {
                fn FirstFn();
            }
            module second = "dyn_second.dll" [dynamic_load | dynamic_unload] {
                fn SecondFn();
            }
        }

        #[test]
        fn modules_are_loaded_once_and_unloaded_in_reverse_order() {
            let first = FakeModule::new(&["FirstFn"]);
            let second = FakeModule::new(&["SecondFn"]);
            register("dyn_first.dll", first.base());
            register("dyn_second.dll", second.base());

            unsafe {
                assert_eq!(
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut()),
                    0
                );
                __DispatchTable::destroy(core::ptr::null_mut(), core::ptr::null_mut());
            }

            assert_eq!(LOADS.load(Ordering::SeqCst), 2);
            let unloads = UNLOADS.lock().unwrap();
            assert_eq!(
                unloads.as_slice(),
                &[second.base() as usize, first.base() as usize]
            );
        }
    }

    #[cfg(feature = "lookup-symbol")]
    mod dynamic_resolve_inheritance {
        use super::FakeModule;
        use core::sync::atomic::Ordering;

        mock_platform!();

        crate::imports! {
            platform = Mock;

            module fake = "dyn_res.dll" [dynamic_resolve] {
                fn Resolved();
            }
        }

        #[test]
        fn symbols_route_through_the_dynamic_lookup_slot() {
            let module = FakeModule::new(&["Resolved"]);
            register("dyn_res.dll", module.base());

            unsafe {
                assert_eq!(
                    __DispatchTable::init(core::ptr::null_mut(), core::ptr::null_mut()),
                    0
                );
            }
            assert_eq!(DYNAMIC_LOOKUPS.load(Ordering::SeqCst), 1);
            assert_eq!(NAME_LOOKUPS.load(Ordering::SeqCst), 0);
            assert_eq!(HASH_LOOKUPS.load(Ordering::SeqCst), 0);
        }
    }

    #[cfg(all(feature = "load-module", feature = "unload-module"))]
    mod entry_shim_failure {
        use super::FakeModule;
        use core::ffi::c_void;
        use core::sync::atomic::{AtomicBool, Ordering};

        mock_platform!();

        static BODY_RAN: AtomicBool = AtomicBool::new(false);

        unsafe fn payload_body(_argument1: *mut c_void, _argument2: *mut c_void) {
            BODY_RAN.store(true, Ordering::SeqCst);
        }

        crate::imports! {
            platform = Mock;
            entry = payload_body;

            module loaded = "shim_loaded.dll" [dynamic_load | dynamic_unload] {
                fn Exists();
            }
            module gone = "shim_gone.dll" {
                fn Whatever();
            }
        }

        #[test]
        fn a_failed_init_skips_the_body_and_the_teardown() {
            let module = FakeModule::new(&["Exists"]);
            register("shim_loaded.dll", module.base());
            // "shim_gone.dll" is never registered, so init fails at ordinal 3.

            unsafe {
                _entry(core::ptr::null_mut(), core::ptr::null_mut());
            }

            assert!(!BODY_RAN.load(Ordering::SeqCst));
            // The module loaded before the failure stays resident: teardown
            // must not run on a partially initialized table.
            assert_eq!(LOADS.load(Ordering::SeqCst), 1);
            assert!(UNLOADS.lock().unwrap().is_empty());
        }
    }
}
