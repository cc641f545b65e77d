//! The `extern "C"` plugin contract, ported from `s3plugin.h`.
//!
//! This is intentionally a thin shell: every function here does argument
//! marshalling, panic containment, and sentinel-value translation, then
//! immediately defers to [`crate::driver::DriverState`]. No object-store or
//! multipart logic belongs in this file.
//!
//! Two pieces of process-global state live here rather than in `driver`:
//! the [`DriverState`] singleton itself, and the Tokio runtime every sync
//! entry point drives its async work through. Both are built lazily via
//! `OnceLock` on first use and live for the life of the process — rebuilding
//! a `Runtime` around each connect/disconnect cycle would be needless
//! churn, and the host never calls these entry points concurrently with
//! process teardown.

use crate::driver::{DriverState, DISK_FREE_SPACE, DRIVER_NAME, PREFERRED_BUFFER_SIZE, SCHEME};
use crate::error::{DriverError, DriverResult};
use crate::reader::Whence;
use crate::registry::Handle;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_longlong, c_void};
use std::sync::OnceLock;
use tokio::runtime::Runtime;

static DRIVER: OnceLock<DriverState> = OnceLock::new();
static RUNTIME: OnceLock<Runtime> = OnceLock::new();

static DRIVER_NAME_C: OnceLock<CString> = OnceLock::new();
static VERSION_C: OnceLock<CString> = OnceLock::new();
static SCHEME_C: OnceLock<CString> = OnceLock::new();
static LAST_ERROR_C: parking_lot::Mutex<Option<CString>> = parking_lot::Mutex::new(None);

fn driver() -> &'static DriverState {
    DRIVER.get_or_init(DriverState::new)
}

fn runtime() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::new().expect("failed to build the driver's tokio runtime"))
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    runtime().block_on(fut)
}

/// Runs `f`, containing any panic so it cannot unwind across the FFI
/// boundary (undefined behavior in the C ABI). A panic is logged as a
/// protocol error and `default_on_panic` is returned instead.
fn guard<R>(default_on_panic: R, f: impl FnOnce() -> R + std::panic::UnwindSafe) -> R {
    match std::panic::catch_unwind(f) {
        Ok(value) => value,
        Err(_) => {
            record_failure(&DriverError::Protocol(
                "panic caught at driver entry point".to_string(),
            ));
            default_on_panic
        }
    }
}

fn record_failure(err: &DriverError) {
    driver().record_error(err);
}

/// Borrow `ptr` as a `&str` for the duration of the call. Rejects null and
/// non-UTF-8 input; never takes ownership, so the host's buffer is untouched.
unsafe fn read_cstr<'a>(ptr: *const c_char) -> DriverResult<&'a str> {
    if ptr.is_null() {
        return Err(DriverError::InvalidArgument("null path pointer".to_string()));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| DriverError::InvalidArgument(format!("non-UTF-8 path: {e}")))
}

fn bool_to_cint(v: bool) -> c_int {
    if v {
        1
    } else {
        0
    }
}

fn result_bool_to_cint(result: DriverResult<bool>) -> c_int {
    match result {
        Ok(v) => bool_to_cint(v),
        Err(e) => {
            record_failure(&e);
            0
        }
    }
}

fn result_unit_to_one_or_zero(result: DriverResult<()>) -> c_int {
    match result {
        Ok(()) => 1,
        Err(e) => {
            record_failure(&e);
            0
        }
    }
}

fn result_unit_to_zero_or_neg1(result: DriverResult<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => {
            record_failure(&e);
            -1
        }
    }
}

fn result_size_to_longlong(result: DriverResult<u64>) -> c_longlong {
    match result {
        Ok(v) => v.min(i64::MAX as u64) as c_longlong,
        Err(e) => {
            record_failure(&e);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn driver_getDriverName() -> *const c_char {
    DRIVER_NAME_C
        .get_or_init(|| CString::new(DRIVER_NAME).expect("driver name has no interior NUL"))
        .as_ptr()
}

#[no_mangle]
pub extern "C" fn driver_getVersion() -> *const c_char {
    VERSION_C
        .get_or_init(|| CString::new(env!("CARGO_PKG_VERSION")).expect("crate version has no interior NUL"))
        .as_ptr()
}

#[no_mangle]
pub extern "C" fn driver_getScheme() -> *const c_char {
    SCHEME_C
        .get_or_init(|| CString::new(SCHEME).expect("scheme has no interior NUL"))
        .as_ptr()
}

#[no_mangle]
pub extern "C" fn driver_isReadOnly() -> c_int {
    0
}

#[no_mangle]
pub extern "C" fn driver_connect() -> c_int {
    guard(0, || result_unit_to_one_or_zero(block_on(driver().connect())))
}

#[no_mangle]
pub extern "C" fn driver_disconnect() -> c_int {
    guard(0, || result_unit_to_one_or_zero(block_on(driver().disconnect())))
}

#[no_mangle]
pub extern "C" fn driver_isConnected() -> c_int {
    guard(0, || bool_to_cint(driver().is_connected()))
}

#[no_mangle]
pub extern "C" fn driver_getSystemPreferredBufferSize() -> c_longlong {
    PREFERRED_BUFFER_SIZE
}

#[no_mangle]
pub extern "C" fn driver_exist(filename: *const c_char) -> c_int {
    guard(0, || {
        let path = match unsafe { read_cstr(filename) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return 0;
            }
        };
        result_bool_to_cint(block_on(driver().exist(path)))
    })
}

#[no_mangle]
pub extern "C" fn driver_fileExists(filename: *const c_char) -> c_int {
    guard(0, || {
        let path = match unsafe { read_cstr(filename) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return 0;
            }
        };
        result_bool_to_cint(block_on(driver().file_exists(path)))
    })
}

#[no_mangle]
pub extern "C" fn driver_dirExists(filename: *const c_char) -> c_int {
    guard(0, || {
        let path = match unsafe { read_cstr(filename) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return 0;
            }
        };
        result_bool_to_cint(driver().dir_exists(path))
    })
}

#[no_mangle]
pub extern "C" fn driver_getFileSize(filename: *const c_char) -> c_longlong {
    guard(-1, || {
        let path = match unsafe { read_cstr(filename) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return -1;
            }
        };
        result_size_to_longlong(block_on(driver().get_file_size(path)))
    })
}

#[no_mangle]
pub extern "C" fn driver_fopen(filename: *const c_char, mode: c_char) -> *mut c_void {
    guard(std::ptr::null_mut(), || {
        let path = match unsafe { read_cstr(filename) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return std::ptr::null_mut();
            }
        };
        let mode_char = mode as u8 as char;
        match block_on(driver().fopen(path, mode_char)) {
            Ok(handle) => handle as *mut c_void,
            Err(e) => {
                record_failure(&e);
                std::ptr::null_mut()
            }
        }
    })
}

#[no_mangle]
pub extern "C" fn driver_fclose(stream: *mut c_void) -> c_int {
    guard(-1, || {
        if stream.is_null() {
            record_failure(&DriverError::UnknownHandle);
            return -1;
        }
        result_unit_to_zero_or_neg1(block_on(driver().fclose(stream as Handle)))
    })
}

#[no_mangle]
pub extern "C" fn driver_fread(ptr: *mut c_void, size: usize, count: usize, stream: *mut c_void) -> c_longlong {
    guard(-1, || {
        if ptr.is_null() || stream.is_null() {
            record_failure(&DriverError::InvalidArgument("null buffer or stream".to_string()));
            return -1;
        }
        let requested = match size.checked_mul(count) {
            Some(n) => n,
            None => {
                record_failure(&DriverError::Overflow("fread size*count".to_string()));
                return -1;
            }
        };

        match block_on(driver().fread(stream as Handle, requested)) {
            Ok(data) => {
                // SAFETY: the host guarantees `ptr` points to at least
                // `size*count` writable bytes; `data.len() <= requested`.
                unsafe {
                    std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
                }
                data.len() as c_longlong
            }
            Err(e) => {
                record_failure(&e);
                -1
            }
        }
    })
}

#[no_mangle]
pub extern "C" fn driver_fseek(stream: *mut c_void, offset: c_longlong, whence: c_int) -> c_int {
    guard(-1, || {
        if stream.is_null() {
            record_failure(&DriverError::UnknownHandle);
            return -1;
        }
        let whence = match whence {
            0 => Whence::Beg,
            1 => Whence::Cur,
            2 => Whence::End,
            other => {
                record_failure(&DriverError::InvalidArgument(format!("unknown whence: {other}")));
                return -1;
            }
        };
        let result = driver().fseek(stream as Handle, offset, whence).map(|_| ());
        result_unit_to_zero_or_neg1(result)
    })
}

#[no_mangle]
pub extern "C" fn driver_getlasterror() -> *const c_char {
    let message = driver().last_error().unwrap_or_default();
    let c_message = CString::new(message).unwrap_or_else(|_| {
        CString::new("error message contained an interior NUL byte").unwrap()
    });
    let mut slot = LAST_ERROR_C.lock();
    *slot = Some(c_message);
    // SAFETY: the pointer is valid until the next `driver_getlasterror` call
    // replaces `*slot`, matching the `strerror`-style "static buffer" contract.
    slot.as_ref().unwrap().as_ptr()
}

#[no_mangle]
pub extern "C" fn driver_fwrite(ptr: *const c_void, size: usize, count: usize, stream: *mut c_void) -> c_longlong {
    guard(-1, || {
        if ptr.is_null() || stream.is_null() {
            record_failure(&DriverError::InvalidArgument("null buffer or stream".to_string()));
            return -1;
        }
        let requested = match size.checked_mul(count) {
            Some(n) => n,
            None => {
                record_failure(&DriverError::Overflow("fwrite size*count".to_string()));
                return -1;
            }
        };

        // SAFETY: the host guarantees `ptr` points to at least `requested`
        // readable, initialized bytes for the duration of this call.
        let data = unsafe { std::slice::from_raw_parts(ptr as *const u8, requested) };
        match block_on(driver().fwrite(stream as Handle, data)) {
            Ok(written) => written as c_longlong,
            Err(e) => {
                record_failure(&e);
                -1
            }
        }
    })
}

#[no_mangle]
pub extern "C" fn driver_fflush(stream: *mut c_void) -> c_int {
    guard(-1, || {
        if stream.is_null() {
            record_failure(&DriverError::UnknownHandle);
            return -1;
        }
        result_unit_to_zero_or_neg1(driver().fflush(stream as Handle))
    })
}

#[no_mangle]
pub extern "C" fn driver_remove(filename: *const c_char) -> c_int {
    guard(0, || {
        let path = match unsafe { read_cstr(filename) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return 0;
            }
        };
        result_unit_to_one_or_zero(block_on(driver().remove(path)))
    })
}

#[no_mangle]
pub extern "C" fn driver_mkdir(pathname: *const c_char) -> c_int {
    guard(0, || {
        let path = match unsafe { read_cstr(pathname) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return 0;
            }
        };
        result_unit_to_one_or_zero(driver().mkdir(path))
    })
}

#[no_mangle]
pub extern "C" fn driver_rmdir(pathname: *const c_char) -> c_int {
    guard(0, || {
        let path = match unsafe { read_cstr(pathname) } {
            Ok(p) => p,
            Err(e) => {
                record_failure(&e);
                return 0;
            }
        };
        result_unit_to_one_or_zero(driver().rmdir(path))
    })
}

#[no_mangle]
pub extern "C" fn driver_diskFreeSpace(filename: *const c_char) -> c_longlong {
    guard(-1, || {
        if let Err(e) = unsafe { read_cstr(filename) } {
            record_failure(&e);
            return -1;
        }
        if !driver().is_connected() {
            record_failure(&DriverError::NotConnected);
            return -1;
        }
        DISK_FREE_SPACE
    })
}

#[no_mangle]
pub extern "C" fn driver_copyToLocal(sourcefilename: *const c_char, destfilename: *const c_char) -> c_int {
    guard(0, || {
        let (src, dst) = match unsafe { (read_cstr(sourcefilename), read_cstr(destfilename)) } {
            (Ok(s), Ok(d)) => (s, d),
            (Err(e), _) | (_, Err(e)) => {
                record_failure(&e);
                return 0;
            }
        };
        result_unit_to_one_or_zero(block_on(driver().copy_to_local(src, dst)))
    })
}

#[no_mangle]
pub extern "C" fn driver_copyFromLocal(sourcefilename: *const c_char, destfilename: *const c_char) -> c_int {
    guard(0, || {
        let (src, dst) = match unsafe { (read_cstr(sourcefilename), read_cstr(destfilename)) } {
            (Ok(s), Ok(d)) => (s, d),
            (Err(e), _) | (_, Err(e)) => {
                record_failure(&e);
                return 0;
            }
        };
        result_unit_to_one_or_zero(block_on(driver().copy_from_local(src, dst)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn read_cstr_rejects_null() {
        let err = unsafe { read_cstr(std::ptr::null()) }.unwrap_err();
        assert!(matches!(err, DriverError::InvalidArgument(_)));
    }

    #[test]
    fn read_cstr_round_trips_valid_utf8() {
        let c = CString::new("s3://bucket/key").unwrap();
        let s = unsafe { read_cstr(c.as_ptr()) }.unwrap();
        assert_eq!(s, "s3://bucket/key");
    }

    #[test]
    fn result_conversions_use_documented_sentinels() {
        assert_eq!(result_bool_to_cint(Ok(true)), 1);
        assert_eq!(result_bool_to_cint(Ok(false)), 0);
        assert_eq!(result_bool_to_cint(Err(DriverError::UnknownHandle)), 0);

        assert_eq!(result_unit_to_one_or_zero(Ok(())), 1);
        assert_eq!(result_unit_to_one_or_zero(Err(DriverError::UnknownHandle)), 0);

        assert_eq!(result_unit_to_zero_or_neg1(Ok(())), 0);
        assert_eq!(result_unit_to_zero_or_neg1(Err(DriverError::UnknownHandle)), -1);

        assert_eq!(result_size_to_longlong(Ok(42)), 42);
        assert_eq!(result_size_to_longlong(Err(DriverError::UnknownHandle)), -1);
    }

    #[test]
    fn guard_converts_panics_into_the_supplied_sentinel() {
        let result = guard(-1, || -> c_int { panic!("boom") });
        assert_eq!(result, -1);
        assert!(driver().last_error().unwrap().contains("panic"));
    }

    #[test]
    fn version_string_is_exposed_as_c_string() {
        let ptr = driver_getVersion();
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(s, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn scheme_string_matches_build_configuration() {
        let ptr = driver_getScheme();
        let s = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap();
        assert_eq!(s, SCHEME);
    }

    #[test]
    fn is_read_only_reports_false() {
        assert_eq!(driver_isReadOnly(), 0);
    }
}
