//! Wire-format primitives shared by the request parser and the response writer.

/// Line terminator for every HTTP/1.1 line.
pub const CRLF: &[u8] = b"\r\n";

/// Blank line ending a header (or trailer) section.
pub const HEADERS_END: &[u8] = b"\r\n\r\n";

/// Protocol name and version emitted on every status line.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// The only version the request parser accepts.
pub const SUPPORTED_VERSION: &str = "1.1";

/// Terminating zero-length chunk of a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Separator used when a header name appears more than once.
pub const VALUE_SEPARATOR: &str = ", ";

/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `buf` on CRLF. A trailing segment without a terminator is yielded
/// as the last item.
pub fn split_crlf(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(buf);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, CRLF) {
            Some(i) => {
                rest = Some(&current[i + CRLF.len()..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

/// A token byte: visible ASCII above space, at most `~`, and not a colon.
pub fn is_token_byte(b: u8) -> bool {
    b > b' ' && b <= b'~' && b != b':'
}

/// Renders a field name the way it is usually seen on the wire, e.g.
/// `content-type` and `CONTENT-TYPE` both become `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
