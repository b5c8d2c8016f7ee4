//! Host launcher for flat payload blobs.
//!
//! Reads a blob into freshly allocated executable memory, transfers control
//! to offset zero with two optional pointer-sized arguments, and afterwards
//! probes the allocation to tell whether the payload freed itself (the
//! `cleanup` build) or the launcher should. No structure inside the blob is
//! interpreted; the entry contract is just `entry(arg1, arg2)` in the
//! platform's fast-call convention.

#[cfg_attr(not(windows), allow(dead_code))]
mod error;

use error::RunnerError;

fn usage() {
    eprintln!("Usage: exordium_runner <payload.bin> [arg1] [arg2]");
    eprintln!();
    eprintln!("Loads and executes a flat payload blob.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  payload.bin  Path to the payload binary");
    eprintln!("  arg1         Optional first entry argument (decimal or 0x-hex)");
    eprintln!("  arg2         Optional second entry argument (decimal or 0x-hex)");
}

/// strtoull-style: `0x` prefix selects hex, otherwise decimal.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_argument(text: &str) -> Result<usize, RunnerError> {
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| RunnerError::Argument(text.to_string()))
}

#[cfg(windows)]
mod run {
    use std::ffi::c_void;
    use std::path::Path;

    use tracing::info;
    use windows_sys::Win32::Foundation::GetLastError;
    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
        PAGE_EXECUTE_READWRITE, PAGE_NOACCESS,
    };

    use crate::error::RunnerError;

    #[cfg(target_arch = "x86")]
    type PayloadEntry = unsafe extern "fastcall" fn(*mut c_void, *mut c_void);
    #[cfg(not(target_arch = "x86"))]
    type PayloadEntry = unsafe extern "C" fn(*mut c_void, *mut c_void);

    pub fn run(path: &Path, argument1: usize, argument2: usize) -> Result<(), RunnerError> {
        let blob = std::fs::read(path).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if blob.is_empty() {
            return Err(RunnerError::EmptyPayload {
                path: path.to_path_buf(),
            });
        }

        let base = unsafe {
            VirtualAlloc(
                std::ptr::null(),
                blob.len(),
                MEM_COMMIT | MEM_RESERVE,
                PAGE_EXECUTE_READWRITE,
            )
        };
        if base.is_null() {
            return Err(RunnerError::Win32("VirtualAlloc", unsafe { GetLastError() }));
        }

        unsafe {
            std::ptr::copy_nonoverlapping(blob.as_ptr(), base as *mut u8, blob.len());
        }

        info!(bytes = blob.len(), base = ?base, "payload mapped");
        info!("transferring control to offset zero");

        let entry: PayloadEntry = unsafe { std::mem::transmute(base) };
        unsafe {
            entry(argument1 as *mut c_void, argument2 as *mut c_void);
        }

        info!("payload returned");

        // A cleanup-enabled payload released its own backing memory on the
        // way out, in which case reprotecting the range must fail.
        let mut old_protect = 0u32;
        let still_mapped = unsafe {
            VirtualProtect(base, blob.len(), PAGE_NOACCESS, &mut old_protect) != 0
        };
        if still_mapped {
            info!("memory freed by payload: no");
            unsafe {
                VirtualFree(base, 0, MEM_RELEASE);
            }
        } else {
            info!("memory freed by payload: yes");
        }

        Ok(())
    }
}

#[cfg(windows)]
fn main() -> std::process::ExitCode {
    use std::path::PathBuf;

    tracing_subscriber::fmt().with_target(false).init();

    let arguments: Vec<String> = std::env::args().skip(1).collect();
    if arguments.is_empty() {
        usage();
        return std::process::ExitCode::FAILURE;
    }

    let result = (|| -> Result<(), RunnerError> {
        let path = PathBuf::from(&arguments[0]);
        let argument1 = arguments.get(1).map(|a| parse_argument(a)).transpose()?;
        let argument2 = arguments.get(2).map(|a| parse_argument(a)).transpose()?;
        run::run(&path, argument1.unwrap_or(0), argument2.unwrap_or(0))
    })();

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error}");
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(not(windows))]
fn main() -> std::process::ExitCode {
    usage();
    eprintln!();
    eprintln!("exordium_runner executes Windows payloads and only runs on Windows.");
    std::process::ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::parse_argument;

    #[test]
    fn arguments_parse_like_strtoull() {
        assert_eq!(parse_argument("0").unwrap(), 0);
        assert_eq!(parse_argument("1000").unwrap(), 1000);
        assert_eq!(parse_argument("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_argument("0XfffF").unwrap(), 0xffff);
        assert!(parse_argument("banana").is_err());
        assert!(parse_argument("0xzz").is_err());
    }
}
