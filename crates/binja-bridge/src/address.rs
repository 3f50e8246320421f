//! Address-versus-name detection for identifier routing.

/// Whether `text` reads as an integer, so it should be sent as an address
/// rather than a symbol name.
///
/// Accepts an optional sign, then one of: `dec:`/`decimal:`/`d:` decimal,
/// `hex:`/`h:` hex, `0x`/`0b`/`0o` prefixes, a trailing `h` hex suffix, plain
/// decimal, or plain hex digits. Underscores are allowed as separators.
pub fn is_int_like(text: &str) -> bool {
    let mut s = text.trim();
    if s.is_empty() {
        return false;
    }
    if let Some(rest) = s.strip_prefix(['+', '-']) {
        s = rest.trim();
    }
    if s.is_empty() {
        return false;
    }

    let lowered = s.to_ascii_lowercase();

    for tag in ["dec:", "decimal:", "d:"] {
        if lowered.starts_with(tag) {
            return all_of(s[tag.len()..].trim(), is_dec);
        }
    }
    for tag in ["hex:", "h:"] {
        if lowered.starts_with(tag) {
            return all_of(s[tag.len()..].trim(), is_hex);
        }
    }

    if lowered.starts_with("0x") {
        return all_of(&s[2..], is_hex);
    }
    if lowered.starts_with("0b") {
        return all_of(&s[2..], |c| matches!(c, '0' | '1' | '_'));
    }
    if lowered.starts_with("0o") {
        return all_of(&s[2..], |c| matches!(c, '0'..='7' | '_'));
    }

    if let Some(body) = lowered.strip_suffix('h') {
        if all_of(body, is_hex) {
            return true;
        }
    }

    all_of(s, is_hex)
}

fn is_dec(c: char) -> bool {
    c.is_ascii_digit() || c == '_'
}

fn is_hex(c: char) -> bool {
    c.is_ascii_hexdigit() || c == '_'
}

/// Non-empty and every char satisfies `pred`.
fn all_of(s: &str, pred: impl Fn(char) -> bool) -> bool {
    !s.is_empty() && s.chars().all(pred)
}
