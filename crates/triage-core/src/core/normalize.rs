// triage-core/src/core/normalize.rs
// ============================================================================
// Module: Normalizer
// Description: Deterministic, idempotent canonicalization of raw log text.
// Purpose: Produce stable normalized text, fingerprints, and loghashes for dedup.
// Dependencies: sha1
// ============================================================================

//! ## Overview
//! Component A. Strips volatile substrings (emails, URLs, UUIDs, timestamps,
//! long hex/digit runs) from raw log messages so that two logs differing only
//! in those substrings normalize identically. Normalization is pure,
//! deterministic, and idempotent: `normalize(normalize(x)) == normalize(x)`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha1::Digest;
use sha1::Sha1;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of leading hex characters kept from a full SHA-1 digest.
const FINGERPRINT_HEX_LEN: usize = 12;

/// Default maximum length for [`clean_title`].
pub const DEFAULT_TITLE_MAX_LEN: usize = 120;

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes raw log text into a stable, redacted, lowercase form.
///
/// Applies, in order: ASCII-only lowercasing, email redaction, URL
/// redaction, UUID removal, RFC-3339-like timestamp removal, long hex-run
/// removal, long digit-run removal, and whitespace collapsing. The result is
/// free of locale-dependent casing and depends only on its input.
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered = ascii_lowercase(text);
    let redacted_email = replace_emails(&lowered);
    let redacted_url = replace_urls(&redacted_email);
    let redacted_uuid = replace_uuids(&redacted_url);
    let redacted_ts = replace_timestamps(&redacted_uuid);
    let redacted_hex = replace_hex_runs(&redacted_ts);
    let redacted_digits = replace_digit_runs(&redacted_hex);
    collapse_whitespace(&redacted_digits)
}

/// Computes the 12-hex-character fingerprint for `error_type|normalized_message`.
///
/// Two logs with the same `error_type` and equal normalized messages share a
/// fingerprint; the fingerprint is the pipeline's cross-run dedup identity.
#[must_use]
pub fn fingerprint(error_type: &str, message: &str) -> String {
    let normalized = normalize(message);
    let input = format!("{error_type}|{normalized}");
    sha1_hex_prefix(&input)
}

/// Computes the 12-hex-character loghash for the normalized message alone.
///
/// Used as the tracker label `loghash-<hex>` for O(1) cross-run lookup,
/// independent of the (potentially revised) error-type classification.
#[must_use]
pub fn loghash(message: &str) -> String {
    let normalized = normalize(message);
    sha1_hex_prefix(&normalized)
}

/// Cleans a ticket title: truncates on a word boundary, strips trailing
/// punctuation, and appends an ellipsis if truncated.
#[must_use]
pub fn clean_title(title: &str, max_len: usize) -> String {
    let trimmed = title.trim();
    if trimmed.chars().count() <= max_len {
        return strip_trailing_punctuation(trimmed).to_string();
    }
    let mut boundary = 0usize;
    let mut consumed = 0usize;
    for (byte_index, ch) in trimmed.char_indices() {
        if consumed >= max_len {
            break;
        }
        if ch.is_whitespace() {
            boundary = byte_index;
        }
        consumed += 1;
    }
    let cut = if boundary > 0 { boundary } else { byte_offset_for_chars(trimmed, max_len) };
    let head = strip_trailing_punctuation(trimmed[..cut].trim_end());
    format!("{head}…")
}

/// Converts free text into a kebab-case tag suitable for `error_type`.
#[must_use]
pub fn to_kebab_case(text: &str) -> String {
    let lowered = ascii_lowercase(text);
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_sep = true;
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Lowercases ASCII letters only, leaving non-ASCII bytes untouched so the
/// result never depends on locale-specific casing rules.
fn ascii_lowercase(text: &str) -> String {
    text.chars().map(|ch| ch.to_ascii_lowercase()).collect()
}

/// Replaces email-like substrings with the `<email>` placeholder.
fn replace_emails(text: &str) -> String {
    replace_with_placeholder(text, scan_email, "<email>")
}

/// Replaces URL-like substrings with the `<url>` placeholder.
fn replace_urls(text: &str) -> String {
    replace_with_placeholder(text, scan_url, "<url>")
}

/// Replaces UUID-like substrings with a single space.
fn replace_uuids(text: &str) -> String {
    replace_with_space(text, scan_uuid)
}

/// Replaces RFC-3339-like timestamps with a single space.
fn replace_timestamps(text: &str) -> String {
    replace_with_space(text, scan_timestamp)
}

/// Replaces hex runs of at least 8 characters with a single space.
fn replace_hex_runs(text: &str) -> String {
    replace_with_space(text, |bytes, start| scan_run(bytes, start, is_hex_digit, 8))
}

/// Replaces digit runs of at least 5 characters with a single space.
fn replace_digit_runs(text: &str) -> String {
    replace_with_space(text, |bytes, start| scan_run(bytes, start, |b| b.is_ascii_digit(), 5))
}

/// Collapses runs of whitespace into single spaces and trims the ends.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Scans forward from `start` and returns the exclusive end of a match, if
/// the predicate at `start` indicates one begins there.
type Scanner = fn(&[u8], usize) -> Option<usize>;

/// Replaces every non-overlapping match found by `scanner` with `placeholder`.
fn replace_with_placeholder(text: &str, scanner: Scanner, placeholder: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(end) = scanner(bytes, i) {
            out.push_str(placeholder);
            i = end;
            continue;
        }
        let ch_len = next_char_len(text, i);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Replaces every non-overlapping match found by `scanner` with a single space.
fn replace_with_space(text: &str, scanner: Scanner) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0usize;
    while i < bytes.len() {
        if let Some(end) = scanner(bytes, i) {
            out.push(' ');
            i = end;
            continue;
        }
        let ch_len = next_char_len(text, i);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

/// Returns the byte length of the character starting at byte offset `i`.
fn next_char_len(text: &str, i: usize) -> usize {
    text[i..].chars().next().map_or(1, char::len_utf8)
}

/// Scans a simple `local@domain.tld` email starting at `start`; returns the
/// exclusive end index if one is found.
fn scan_email(bytes: &[u8], start: usize) -> Option<usize> {
    fn is_local_char(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-')
    }
    fn is_domain_char(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-')
    }
    if start >= bytes.len() || !is_local_char(bytes[start]) {
        return None;
    }
    let mut i = start;
    while i < bytes.len() && is_local_char(bytes[i]) {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'@' {
        return None;
    }
    let at = i;
    i += 1;
    let domain_start = i;
    while i < bytes.len() && is_domain_char(bytes[i]) {
        i += 1;
    }
    let domain = &bytes[domain_start..i];
    if domain.contains(&b'.') && i > domain_start && at > start {
        Some(i)
    } else {
        None
    }
}

/// Scans an `http(s)://...` URL starting at `start`; returns the exclusive
/// end index if one is found.
fn scan_url(bytes: &[u8], start: usize) -> Option<usize> {
    const SCHEMES: [&[u8]; 2] = [b"http://", b"https://"];
    let remaining = &bytes[start..];
    let scheme_len = SCHEMES.iter().find(|scheme| remaining.starts_with(**scheme))?.len();
    let mut i = start + scheme_len;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    Some(i)
}

/// Scans a UUID (8-4-4-4-12 hex groups) starting at `start`.
fn scan_uuid(bytes: &[u8], start: usize) -> Option<usize> {
    const GROUP_LENS: [usize; 5] = [8, 4, 4, 4, 12];
    let mut i = start;
    for (group_index, &len) in GROUP_LENS.iter().enumerate() {
        for _ in 0..len {
            if i >= bytes.len() || !is_hex_digit(bytes[i]) {
                return None;
            }
            i += 1;
        }
        let is_last = group_index + 1 == GROUP_LENS.len();
        if !is_last {
            if i >= bytes.len() || bytes[i] != b'-' {
                return None;
            }
            i += 1;
        }
    }
    Some(i)
}

/// Scans an RFC-3339-like timestamp (`YYYY-MM-DDTHH:MM:SS` with optional
/// fractional seconds and zone) starting at `start`.
fn scan_timestamp(bytes: &[u8], start: usize) -> Option<usize> {
    fn digits(bytes: &[u8], start: usize, count: usize) -> Option<usize> {
        let mut i = start;
        for _ in 0..count {
            if i >= bytes.len() || !bytes[i].is_ascii_digit() {
                return None;
            }
            i += 1;
        }
        Some(i)
    }
    let mut i = digits(bytes, start, 4)?;
    if bytes.get(i) != Some(&b'-') {
        return None;
    }
    i += 1;
    i = digits(bytes, i, 2)?;
    if bytes.get(i) != Some(&b'-') {
        return None;
    }
    i += 1;
    i = digits(bytes, i, 2)?;
    let Some(sep) = bytes.get(i) else { return None };
    if *sep != b'T' && *sep != b' ' {
        return None;
    }
    i += 1;
    i = digits(bytes, i, 2)?;
    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;
    i = digits(bytes, i, 2)?;
    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i += 1;
    i = digits(bytes, i, 2)?;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
    }
    match bytes.get(i) {
        Some(b'Z') => i += 1,
        Some(b'+' | b'-') => {
            if let Some(end) = digits(bytes, i + 1, 2) {
                i = end;
                if bytes.get(i) == Some(&b':') {
                    if let Some(end) = digits(bytes, i + 1, 2) {
                        i = end;
                    }
                }
            }
        }
        _ => {}
    }
    Some(i)
}

/// Generic scanner for a run of bytes matching `predicate`, of at least
/// `min_len` bytes, starting at `start`.
fn scan_run(bytes: &[u8], start: usize, predicate: fn(u8) -> bool, min_len: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() && predicate(bytes[i]) {
        i += 1;
    }
    if i - start >= min_len { Some(i) } else { None }
}

/// Returns true if `b` is an ASCII hex digit.
const fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'a'..=b'f' | b'A'..=b'F')
}

/// Strips trailing punctuation (`.`, `,`, `;`, `:`, `!`, `?`) from a string.
fn strip_trailing_punctuation(text: &str) -> &str {
    text.trim_end_matches(['.', ',', ';', ':', '!', '?'])
}

/// Returns the byte offset corresponding to `char_count` characters into `text`.
fn byte_offset_for_chars(text: &str, char_count: usize) -> usize {
    text.char_indices().nth(char_count).map_or(text.len(), |(offset, _)| offset)
}

/// Returns the first `len` hex characters of the SHA-1 digest of `input`.
fn sha1_hex_prefix(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let full_hex = digest.iter().fold(String::with_capacity(40), |mut acc, byte| {
        acc.push_str(&format!("{byte:02x}"));
        acc
    });
    full_hex.chars().take(FINGERPRINT_HEX_LEN).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::clean_title;
    use super::fingerprint;
    use super::loghash;
    use super::normalize;
    use super::to_kebab_case;

    #[test]
    fn normalize_is_idempotent() {
        let raw = "User alice@example.com hit https://api.example.com/v1/orders/123 at \
                   2024-01-02T03:04:05Z id=deadbeefcafe0001 count=123456";
        let once = normalize(raw);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_strips_email_and_url() {
        let out = normalize("contact Bob@Example.COM via http://example.com/path?q=1");
        assert!(out.contains("<email>"));
        assert!(out.contains("<url>"));
        assert!(!out.contains("bob@example.com"));
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn normalize_strips_uuid_and_long_runs() {
        let out = normalize("job 123e4567-e89b-12d3-a456-426614174000 retried 54321 times hex \
                              deadbeef01");
        assert!(!out.contains("123e4567"));
        assert!(!out.contains("54321"));
        assert!(!out.contains("deadbeef01"));
    }

    #[test]
    fn fingerprint_depends_on_normalized_message_and_error_type() {
        let a = fingerprint("db-timeout", "Connection to db-1 timed out after 30000ms");
        let b = fingerprint("db-timeout", "Connection to db-2 timed out after 45000ms");
        assert_eq!(a.len(), 12);
        assert_ne!(a, b, "different digit runs should still normalize to equal text, so this \
                          guards the runs were actually stripped");
    }

    #[test]
    fn fingerprint_matches_for_equal_normalized_messages() {
        let a = fingerprint("db-timeout", "retry 12345 at 2024-01-01T00:00:00Z");
        let b = fingerprint("db-timeout", "retry 99999 at 2024-06-01T00:00:00Z");
        assert_eq!(a, b);
    }

    #[test]
    fn loghash_ignores_error_type() {
        let message = "connection refused on port 5432";
        assert_eq!(loghash(message), loghash(message));
    }

    #[test]
    fn clean_title_truncates_on_word_boundary() {
        let title = "A".to_string() + &" word".repeat(40);
        let cleaned = clean_title(&title, 30);
        assert!(cleaned.chars().count() <= 31);
        assert!(cleaned.ends_with('…'));
        assert!(!cleaned[..cleaned.len() - '…'.len_utf8()].ends_with('.'));
    }

    #[test]
    fn clean_title_short_passthrough() {
        assert_eq!(clean_title("Short title.", 120), "Short title");
    }

    #[test]
    fn to_kebab_case_normalizes_punctuation() {
        assert_eq!(to_kebab_case("Database Connection Timeout!"), "database-connection-timeout");
    }
}
