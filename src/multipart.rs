//! Bounded `multipart/form-data` encoding.
//!
//! The encoder builds the whole payload in memory, checking the running size
//! against the configured ceiling on every appended chunk so an oversized
//! part is rejected without buffering past the limit. Field and file names,
//! filenames, and content types are sanitized before they are written into
//! header lines.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::sanitize::{quote_header_value, reject_crlf};

/// One file entry in a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl FilePart {
    /// Creates a part with the default `application/octet-stream` content
    /// type.
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: "application/octet-stream".to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Encodes fields and files into a `multipart/form-data` body.
///
/// Returns the `Content-Type` header value (with the generated boundary) and
/// the encoded body. Ordinary fields are written before file parts. Fails
/// with [`Error::Validation`] when `files` is empty or any name, filename, or
/// content type contains CR/LF, and with [`Error::PayloadTooLarge`] the
/// moment the running total would exceed `max_total_bytes`.
pub fn encode_multipart(
    fields: &[(String, String)],
    files: &[(String, FilePart)],
    max_total_bytes: usize,
) -> Result<(String, Vec<u8>)> {
    if files.is_empty() {
        return Err(Error::Validation("files must not be empty".to_string()));
    }

    let boundary = format!("----patchclient{}", Uuid::new_v4().simple());
    let mut body: Vec<u8> = Vec::new();

    for (name, value) in fields {
        let safe_name = quote_header_value(reject_crlf(name, "multipart field name")?);
        append_bounded(
            &mut body,
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{safe_name}\"\r\n\r\n"
            )
            .as_bytes(),
            max_total_bytes,
        )?;
        append_bounded(&mut body, value.as_bytes(), max_total_bytes)?;
        append_bounded(&mut body, b"\r\n", max_total_bytes)?;
    }

    for (name, part) in files {
        let safe_name = quote_header_value(reject_crlf(name, "multipart file field name")?);
        let safe_filename = quote_header_value(reject_crlf(&part.filename, "multipart filename")?);
        let safe_content_type = reject_crlf(&part.content_type, "multipart content type")?;
        append_bounded(
            &mut body,
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{safe_name}\"; \
                 filename=\"{safe_filename}\"\r\nContent-Type: {safe_content_type}\r\n\r\n"
            )
            .as_bytes(),
            max_total_bytes,
        )?;
        append_bounded(&mut body, &part.content, max_total_bytes)?;
        append_bounded(&mut body, b"\r\n", max_total_bytes)?;
    }

    append_bounded(
        &mut body,
        format!("--{boundary}--\r\n").as_bytes(),
        max_total_bytes,
    )?;

    Ok((format!("multipart/form-data; boundary={boundary}"), body))
}

fn append_bounded(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<()> {
    if body.len() + chunk.len() > limit {
        return Err(Error::PayloadTooLarge { limit });
    }
    body.extend_from_slice(chunk);
    Ok(())
}
