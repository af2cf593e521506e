//! Filesystem-safe file-name sanitization.

/// Sanitizes a candidate file name for the local filesystem.
///
/// Path separators, NUL and control characters become `_`, runs of `_`
/// collapse, leading/trailing dots and whitespace are trimmed, and the
/// result is capped at 255 bytes (NAME_MAX) on a char boundary.
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let mapped = match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim().trim_matches('.').trim();
    if trimmed.len() <= NAME_MAX {
        return trimmed.to_string();
    }
    let mut take = NAME_MAX;
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_separators() {
        assert_eq!(sanitize_filename("a/b\\c.txt"), "a_b_c.txt");
    }

    #[test]
    fn strips_control_chars_and_collapses() {
        assert_eq!(sanitize_filename("file\x00\x01name.txt"), "file_name.txt");
    }

    #[test]
    fn trims_dots_and_spaces() {
        assert_eq!(sanitize_filename("  ..file.txt.  "), "file.txt");
    }

    #[test]
    fn caps_length_on_char_boundary() {
        let long = "é".repeat(200);
        let s = sanitize_filename(&long);
        assert!(s.len() <= 255);
        assert!(s.is_char_boundary(s.len()));
    }
}
