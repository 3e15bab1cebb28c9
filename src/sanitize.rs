//! Header and multipart string sanitization.
//!
//! Attacker-controlled strings (filenames, field names, content types, header
//! values) are the injection surface of a multipart/HTTP client. Everything
//! that ends up inside a header line goes through [`reject_crlf`] first;
//! strings embedded in a quoted `Content-Disposition` parameter additionally
//! go through [`quote_header_value`].

use crate::error::{Error, Result};

/// Rejects any value containing a carriage return or line feed.
///
/// `what` names the offending input in the error message, e.g.
/// `"multipart filename"`.
pub fn reject_crlf<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.contains(['\r', '\n']) {
        return Err(Error::Validation(format!(
            "{what} must not contain CR or LF characters"
        )));
    }
    Ok(value)
}

/// Escapes backslash and double-quote so a value can sit inside a quoted
/// header parameter.
pub fn quote_header_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
