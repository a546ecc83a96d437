//! Value escaping for `gcfg` / INI files.
//!
//! A value on the right-hand side of `key = value` is terminated by a line
//! break, loses surrounding whitespace and is cut at `;` or `#` unless it is
//! quoted. Values that cannot be read back verbatim are therefore emitted as
//! a double-quoted string with `\\`, `\"`, `\n`, `\r` and `\t` escapes.
//!
//! [`escape`] leaves values that are already safe untouched, including values
//! that are already well-formed quoted strings, so escaping is idempotent.
//! The cost is that a raw value which itself looks like a quoted string, such
//! as `"abc"`, is written as is and reads back as `abc`.

/// Characters that end or alter a bare value.
const SPECIAL_CHARS: &[char] = &['"', '\\', ';', '#', '[', ']', '\n', '\r', '\t'];

/// Escapes `value` so it can be written as the right-hand side of a
/// `key = value` line.
pub fn escape(value: &str) -> String {
    if is_bare(value) || is_quoted(value) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Reads a value the way a `gcfg` parser does: surrounding whitespace is
/// dropped and a quoted value has its escapes resolved.
///
/// Returns `None` when the value is not valid `gcfg`.
pub fn unescape(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('"') {
        if trimmed.contains(SPECIAL_CHARS) {
            return None;
        }
        return Some(trimmed.to_string());
    }
    if !is_quoted(trimmed) {
        return None;
    }

    let inner = &trimmed[1..trimmed.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            _ => return None,
        }
    }
    Some(out)
}

/// A bare value survives parsing unchanged.
fn is_bare(value: &str) -> bool {
    value.trim() == value && !value.contains(SPECIAL_CHARS) && !value.chars().any(char::is_control)
}

/// A well-formed quoted value: only known escapes, no bare quote or line break.
fn is_quoted(value: &str) -> bool {
    if value.len() < 2 || !value.starts_with('"') || !value.ends_with('"') {
        return false;
    }

    let mut chars = value[1..value.len() - 1].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if !matches!(chars.next(), Some('\\' | '"' | 'n' | 'r' | 't')) {
                    return false;
                }
            }
            '"' | '\n' | '\r' => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_values_are_unchanged() {
        assert_eq!(escape(""), "");
        assert_eq!(escape("my-project"), "my-project");
        assert_eq!(escape("europe-west3-a"), "europe-west3-a");
        assert_eq!(escape("projects/p/global/networks/default"), "projects/p/global/networks/default");
    }

    #[test]
    fn test_special_values_are_quoted() {
        assert_eq!(escape("a\nb"), "\"a\\nb\"");
        assert_eq!(escape(" padded "), "\" padded \"");
        assert_eq!(escape("[global]"), "\"[global]\"");
        assert_eq!(escape("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(escape("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(escape("tab\there"), "\"tab\\there\"");
        assert_eq!(escape("a\rb"), "\"a\\rb\"");
        assert_eq!(escape("a;comment"), "\"a;comment\"");
    }

    #[test]
    fn test_escape_is_idempotent() {
        let inputs = [
            "",
            "plain",
            "line\nbreak",
            "  leading",
            "trailing  ",
            "[section]",
            "quote\"inside",
            "\\",
            "\"",
            "#hash",
            "mixed [x]\n\t\"y\" \\ z",
            "a\rb",
            "x\r\ny",
        ];
        for input in inputs {
            let once = escape(input);
            assert_eq!(escape(&once), once, "escape not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_escape_round_trips_through_parser() {
        let inputs = [
            "",
            "plain",
            "line\nbreak",
            "  leading",
            "trailing  ",
            "[section]",
            "a]b[c",
            "semi;colon",
            "#hash",
            "back\\slash",
            "tab\tinside",
            "quote\"inside",
            "mixed [x]\n\t\"y\" \\ z",
            "a\rb",
            "x\r\ny",
        ];
        for input in inputs {
            let escaped = escape(input);
            assert!(!escaped.contains(['\n', '\r']), "escaped value contains a line break: {:?}", escaped);
            assert_eq!(unescape(&escaped).as_deref(), Some(input), "round trip failed for {:?}", input);
        }
    }

    #[test]
    fn test_quoted_input_is_kept_verbatim() {
        // Already a well-formed quoted string: kept, so the parser strips the quotes
        let quoted = "\"abc\"";
        assert_eq!(escape(quoted), quoted);
        assert_eq!(unescape(&escape(quoted)).as_deref(), Some("abc"));

        // Not well-formed: quoted again and read back verbatim
        let stray = "\"abc";
        assert_eq!(unescape(&escape(stray)).as_deref(), Some(stray));
    }

    #[test]
    fn test_unescape_rejects_malformed_values() {
        assert_eq!(unescape("\"unterminated"), None);
        assert_eq!(unescape("\"bad \\x escape\""), None);
        assert_eq!(unescape("bare;comment"), None);
    }
}
