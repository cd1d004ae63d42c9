use crate::error::{BlobError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use percent_encoding::percent_decode_str;

/// MIME type used when nothing more specific is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Media type assumed for a data URI with an empty media type (RFC 2397).
const IMPLICIT_MIME_TYPE: &str = "text/plain";

const SCHEME: &str = "data:";

/// A decoded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Lower-cased media type essence, parameters dropped.
    pub mime_type: String,
    pub buffer: Bytes,
}

/// Encode `buffer` as `data:<mime_type>;base64,<payload>`.
pub fn encode_data_uri(buffer: &[u8], mime_type: &str) -> String {
    let mime_type = if mime_type.trim().is_empty() {
        DEFAULT_MIME_TYPE
    } else {
        mime_type.trim()
    };

    format!("{}{};base64,{}", SCHEME, mime_type, STANDARD.encode(buffer))
}

/// Parse `data:[<mediatype>][;<param>=<value>]*[;base64],<data>`.
pub fn decode_data_uri(uri: &str) -> Result<DataUri> {
    let rest = match uri.get(..SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &uri[SCHEME.len()..],
        _ => return Err(malformed("missing data: scheme")),
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| malformed("missing ',' separator"))?;

    let mut segments = header.split(';');
    let media_type = segments.next().unwrap_or_default().trim();

    let mut base64 = false;
    let params: Vec<&str> = segments.collect();
    for (index, param) in params.iter().enumerate() {
        if index + 1 == params.len() && param.trim().eq_ignore_ascii_case("base64") {
            base64 = true;
        } else if !param.contains('=') {
            return Err(malformed(&format!("invalid parameter '{}'", param)));
        }
    }

    let mime_type = if media_type.is_empty() {
        IMPLICIT_MIME_TYPE.to_string()
    } else {
        validate_media_type(media_type)?
    };

    let buffer = if base64 {
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|error| malformed(&format!("invalid base64 payload: {}", error)))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(DataUri {
        mime_type,
        buffer: Bytes::from(buffer),
    })
}

fn validate_media_type(media_type: &str) -> Result<String> {
    let valid = media_type
        .split_once('/')
        .map(|(kind, subtype)| {
            !kind.is_empty()
                && !subtype.is_empty()
                && !subtype.contains('/')
                && !media_type.chars().any(|c| c.is_whitespace())
        })
        .unwrap_or(false);

    if !valid {
        return Err(malformed(&format!("invalid media type '{}'", media_type)));
    }

    Ok(media_type.to_ascii_lowercase())
}

fn malformed(reason: &str) -> BlobError {
    BlobError::MalformedDataUri(reason.to_string())
}
