//! Content-Disposition header parsing (filename and filename*).

/// Extracts the file name from a raw Content-Disposition header value.
///
/// `filename="value"` (quoted), `filename=value` (token) and
/// `filename*=UTF-8''percent-encoded` (RFC 5987) are supported;
/// `filename*` wins when both are present.
pub fn parse_content_disposition_filename(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.split(';') {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        match name.as_str() {
            "filename*" => {
                let rest = value
                    .strip_prefix("UTF-8''")
                    .or_else(|| value.strip_prefix("utf-8''"));
                if let Some(rest) = rest {
                    let decoded = percent_decode(rest);
                    if !decoded.is_empty() {
                        return Some(decoded);
                    }
                }
            }
            "filename" => {
                let unquoted = value.trim_matches('"');
                if !unquoted.is_empty() {
                    plain = Some(unquoted.to_string());
                }
            }
            _ => {}
        }
    }

    plain
}

/// Percent-decoding for the RFC 5987 `filename*` value. Invalid escape
/// sequences are passed through literally.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let pair = bytes.get(i + 1..i + 3).and_then(|p| {
                let s = std::str::from_utf8(p).ok()?;
                u8::from_str_radix(s, 16).ok()
            });
            if let Some(b) = pair {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_filename() {
        let r = parse_content_disposition_filename("attachment; filename=\"report.pdf\"");
        assert_eq!(r.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn token_filename() {
        let r = parse_content_disposition_filename("attachment; filename=plain.bin");
        assert_eq!(r.as_deref(), Some("plain.bin"));
    }

    #[test]
    fn filename_star_decoded() {
        let r = parse_content_disposition_filename("attachment; filename*=UTF-8''caf%C3%A9.txt");
        assert_eq!(r.as_deref(), Some("café.txt"));
    }

    #[test]
    fn filename_star_wins() {
        let r = parse_content_disposition_filename(
            "attachment; filename=\"fallback.bin\"; filename*=UTF-8''real%20name.dat",
        );
        assert_eq!(r.as_deref(), Some("real name.dat"));
    }

    #[test]
    fn missing_filename_yields_none() {
        assert_eq!(parse_content_disposition_filename("inline"), None);
    }

    #[test]
    fn bad_percent_sequence_passes_through() {
        let r = parse_content_disposition_filename("attachment; filename*=UTF-8''bad%zzname");
        assert_eq!(r.as_deref(), Some("bad%zzname"));
    }
}
