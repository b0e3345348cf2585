//! FFI bindings for Synheart Lumen
//!
//! This module provides C-compatible functions for calling Lumen from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `lumen_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::arbiter::ClassificationContext;
use crate::config::LumenConfig;
use crate::dose;
use crate::export;
use crate::pipeline::{process_samples, LumenProcessor, RecordingSession};
use crate::stimulus;
use crate::types::{ClassificationResult, LightType, Sample};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// NULL selects the default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<LumenConfig, String> {
    if config_json.is_null() {
        return Ok(LumenConfig::default());
    }
    let json = cstr_to_string(config_json).ok_or("Invalid config string pointer")?;
    LumenConfig::from_json(&json).map_err(|e| e.to_string())
}

/// NULL means no label, which applies the default melanopic ratio
unsafe fn classification_from_ptr(
    light_type: *const c_char,
) -> Result<Option<ClassificationResult>, String> {
    if light_type.is_null() {
        return Ok(None);
    }
    let name = cstr_to_string(light_type).ok_or("Invalid light type string pointer")?;
    let parsed: LightType = name.parse().map_err(|e: crate::ComputeError| e.to_string())?;
    Ok(Some(ClassificationResult::manual(parsed)))
}

/// Report an error and return NULL
fn fail(msg: &str) -> *mut c_char {
    set_last_error(msg);
    ptr::null_mut()
}

// ============================================================================
// Stateless API
// ============================================================================

/// Process a JSON array of samples and return the result JSON.
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string.
/// - `config_json` and `light_type` may be NULL for defaults.
/// - Returns a newly allocated string that must be freed with `lumen_free_string`.
/// - Returns NULL on error; call `lumen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn lumen_process_json(
    samples_json: *const c_char,
    config_json: *const c_char,
    light_type: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(samples_json) {
        Some(s) => s,
        None => return fail("Invalid samples string pointer"),
    };
    let config = match config_from_ptr(config_json) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let classification = match classification_from_ptr(light_type) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let samples: Vec<Sample> = match serde_json::from_str(&json_str) {
        Ok(s) => s,
        Err(e) => return fail(&format!("Invalid samples JSON: {e}")),
    };

    match process_samples(&samples, classification, &config).and_then(|r| export::to_json(&r)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => fail(&e.to_string()),
    }
}

/// Classify a light source from a JSON classification context.
///
/// # Safety
/// - `context_json` must be a valid null-terminated C string.
/// - `config_json` may be NULL for defaults.
/// - Returns a newly allocated string that must be freed with `lumen_free_string`.
/// - Returns NULL on error; call `lumen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn lumen_classify_json(
    context_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(context_json) {
        Some(s) => s,
        None => return fail("Invalid context string pointer"),
    };
    let config = match config_from_ptr(config_json) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let ctx: ClassificationContext = match serde_json::from_str(&json_str) {
        Ok(c) => c,
        Err(e) => return fail(&format!("Invalid context JSON: {e}")),
    };

    let processor = match LumenProcessor::with_config(config) {
        Ok(p) => p,
        Err(e) => return fail(&e.to_string()),
    };
    match processor.classify(&ctx) {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(json) => string_to_cstr(&json),
            Err(e) => fail(&e.to_string()),
        },
        Err(e) => fail(&e.to_string()),
    }
}

/// Render a result JSON as the `timestamp,lux,melanopic,cs` table.
///
/// # Safety
/// - `result_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `lumen_free_string`.
/// - Returns NULL on error; call `lumen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn lumen_export_csv(result_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(result_json) {
        Some(s) => s,
        None => return fail("Invalid result string pointer"),
    };
    match export::from_json(&json_str) {
        Ok(result) => string_to_cstr(&export::to_csv(&result)),
        Err(e) => fail(&e.to_string()),
    }
}

/// Fit the stimulus steepness from one observation under the default ceiling.
///
/// Degenerate observations return the default steepness.
#[no_mangle]
pub extern "C" fn lumen_fit_steepness(melanopic_lux: f64, observed_cs: f64) -> f64 {
    let defaults = LumenConfig::default().stimulus;
    stimulus::fit_steepness(melanopic_lux, observed_cs, defaults.ceiling, defaults.steepness)
}

/// Fit the suppression sensitivity from one observation.
///
/// Degenerate observations return the default sensitivity.
#[no_mangle]
pub extern "C" fn lumen_fit_sensitivity(dose_hours: f64, observed_msi: f64) -> f64 {
    dose::fit_sensitivity(dose_hours, observed_msi, LumenConfig::default().dose.sensitivity)
}

// ============================================================================
// Recording Session API
// ============================================================================

/// Opaque handle to a RecordingSession
pub struct LumenSessionHandle {
    session: Option<RecordingSession>,
}

/// Create a recording session.
///
/// # Safety
/// - `config_json` may be NULL for defaults.
/// - Must be freed with `lumen_session_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn lumen_session_new(config_json: *const c_char) -> *mut LumenSessionHandle {
    clear_last_error();

    match config_from_ptr(config_json) {
        Ok(config) => Box::into_raw(Box::new(LumenSessionHandle {
            session: Some(RecordingSession::new(config)),
        })),
        Err(e) => {
            set_last_error(&e);
            ptr::null_mut()
        }
    }
}

/// Free a recording session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `lumen_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn lumen_session_free(session: *mut LumenSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Start (or restart) recording.
///
/// # Safety
/// - `session` must be a valid pointer returned by `lumen_session_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn lumen_session_start(session: *mut LumenSessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    match (*session).session.as_mut() {
        Some(s) => match s.start() {
            Ok(()) => 0,
            Err(e) => {
                set_last_error(&e.to_string());
                -1
            }
        },
        None => {
            set_last_error("Session already finished");
            -1
        }
    }
}

/// Push one JSON sample.
///
/// # Safety
/// - `session` must be a valid pointer returned by `lumen_session_new`.
/// - `sample_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn lumen_session_push(
    session: *mut LumenSessionHandle,
    sample_json: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *session;

    let json_str = match cstr_to_string(sample_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid sample string pointer");
            return -1;
        }
    };
    let sample: Sample = match serde_json::from_str(&json_str) {
        Ok(s) => s,
        Err(e) => {
            set_last_error(&format!("Invalid sample JSON: {e}"));
            return -1;
        }
    };

    match handle.session.as_mut() {
        Some(s) => match s.push(sample) {
            Ok(()) => 0,
            Err(e) => {
                set_last_error(&e.to_string());
                -1
            }
        },
        None => {
            set_last_error("Session already finished");
            -1
        }
    }
}

/// Finish the session and return the result JSON.
///
/// The handle stays allocated but accepts no further calls except
/// `lumen_session_free`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `lumen_session_new`.
/// - `light_type` may be NULL for the default melanopic ratio.
/// - Returns a newly allocated string that must be freed with `lumen_free_string`.
/// - Returns NULL on error; call `lumen_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn lumen_session_finish(
    session: *mut LumenSessionHandle,
    light_type: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        return fail("Null session pointer");
    }
    let handle = &mut *session;

    let classification = match classification_from_ptr(light_type) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let recording = match handle.session.take() {
        Some(s) => s,
        None => return fail("Session already finished"),
    };

    match recording
        .finish(classification)
        .and_then(|r| export::to_json(&r))
    {
        Ok(json) => string_to_cstr(&json),
        Err(e) => fail(&e.to_string()),
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Lumen functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Lumen function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn lumen_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Lumen function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn lumen_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Lumen library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn lumen_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
