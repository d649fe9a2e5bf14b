//! FFI interface for C/C++ hosts
//!
//! The host creates a registry handle once, parses documents through it and
//! frees it at shutdown. Results are passed back as JSON strings.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::registry::ParserRegistry;

/// Result struct returned to the host
/// Both pointers are owned by Rust and must be freed via free_search_result
#[repr(C)]
pub struct SearchResultFFI {
    /// JSON array of records (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if parsing failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Create a registry holding the built-in parsers.
///
/// Returns null if the built-in parsers fail to build.
#[no_mangle]
pub extern "C" fn search_registry_new() -> *mut ParserRegistry {
    match ParserRegistry::with_defaults() {
        Ok(registry) => Box::into_raw(Box::new(registry)),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a registry created by search_registry_new
///
/// # Safety
/// - `registry` must have been returned by `search_registry_new` (or be null)
/// - Must only be called once per registry
#[no_mangle]
pub unsafe extern "C" fn search_registry_free(registry: *mut ParserRegistry) {
    if !registry.is_null() {
        drop(Box::from_raw(registry));
    }
}

/// Parse one search response with the named parser.
///
/// # Arguments
/// * `registry` - Handle from `search_registry_new`
/// * `html_ptr` - Pointer to the document (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of the document in bytes
/// * `parser_name` - Registered parser name (null-terminated), e.g. `search_person_parser`
///
/// # Safety
/// - `registry` must be a live handle from `search_registry_new`
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `parser_name` must be a valid null-terminated C string
/// - Caller must free the result via `free_search_result`
#[no_mangle]
pub unsafe extern "C" fn search_parse_ffi(
    registry: *const ParserRegistry,
    html_ptr: *const c_char,
    html_len: usize,
    parser_name: *const c_char,
) -> SearchResultFFI {
    let Some(registry) = registry.as_ref() else {
        return make_error_result("Registry is null");
    };

    let name = if parser_name.is_null() {
        return make_error_result("Parser name is null");
    } else {
        match CStr::from_ptr(parser_name).to_str() {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in parser name"),
        }
    };

    let Some(parser) = registry.get(name) else {
        return make_error_result(&format!("Unknown parser: {}", name));
    };

    let html: &[u8] = if html_ptr.is_null() || html_len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(html_ptr as *const u8, html_len)
    };

    let records = match parser.parse_bytes(html) {
        Ok(records) => records,
        Err(e) => return make_error_result(&e.to_string()),
    };

    match serde_json::to_string(&records) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => SearchResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

/// Free a SearchResultFFI returned by search_parse_ffi
///
/// # Safety
/// - `result` must have been returned by `search_parse_ffi`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_search_result(result: SearchResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

fn make_error_result(msg: &str) -> SearchResultFFI {
    let error_ptr = CString::new(msg)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut());
    SearchResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PERSON_SEARCH_PARSER;

    fn take(result: SearchResultFFI) -> Result<String, String> {
        unsafe {
            let out = if result.error_ptr.is_null() {
                Ok(CStr::from_ptr(result.json_ptr).to_string_lossy().into_owned())
            } else {
                Err(CStr::from_ptr(result.error_ptr).to_string_lossy().into_owned())
            };
            free_search_result(result);
            out
        }
    }

    fn parse(registry: *const ParserRegistry, html: &[u8], name: &str) -> Result<String, String> {
        let name = CString::new(name).unwrap();
        take(unsafe {
            search_parse_ffi(registry, html.as_ptr() as *const c_char, html.len(), name.as_ptr())
        })
    }

    #[test]
    fn test_parse_through_handle() {
        let registry = search_registry_new();
        assert!(!registry.is_null());

        let html = br#"<html><head><title>Mel Gibson</title></head><body>
            <a href="/name/nm0000154/board/">board</a></body></html>"#;
        let json = parse(registry, html, PERSON_SEARCH_PARSER).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["identifier"], "0000154");
        assert_eq!(value[0]["fields"]["name"]["name"], "Gibson, Mel");

        unsafe { search_registry_free(registry) };
    }

    #[test]
    fn test_errors_reported() {
        let registry = search_registry_new();

        let err = parse(registry, b"<html></html>", "nope").unwrap_err();
        assert_eq!(err, "Unknown parser: nope");

        assert_eq!(parse(registry, b"", PERSON_SEARCH_PARSER).unwrap(), "[]");

        let err = parse(registry, b"<p>\xfe</p>", PERSON_SEARCH_PARSER).unwrap_err();
        assert!(err.starts_with("Invalid UTF-8"));

        let err = parse(ptr::null(), b"<p></p>", PERSON_SEARCH_PARSER).unwrap_err();
        assert_eq!(err, "Registry is null");

        unsafe { search_registry_free(registry) };
    }
}
