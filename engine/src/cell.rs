//! Cell extraction for JSON Lines rows: a forward scan over the raw line
//! bytes that stops at the requested key. Keys are compared byte-wise against
//! the property-name token, values other than the match are skipped by depth
//! tracking, and nothing is allocated until the matched value is rendered.

/// Rendered for a key that is absent or explicitly null.
pub const NULL_CELL: &str = "<null>";
/// Rendered for a line that is empty or fails to parse.
pub const ERROR_CELL: &str = "<error>";
/// Rendered for a nested object value.
pub const OBJECT_CELL: &str = "{...}";
/// Rendered for a nested array value.
pub const ARRAY_CELL: &str = "[...]";

/// Extract the display value of `column_name` from one JSON object line.
///
/// | token | output |
/// |---|---|
/// | string | unquoted value |
/// | integer | decimal render via `i64` |
/// | decimal | decimal render via `f64` |
/// | true / false | `True` / `False` |
/// | null or missing key | `<null>` |
/// | object | `{...}` |
/// | array | `[...]` |
/// | parse error or empty line | `<error>` |
pub fn extract_cell(line: &[u8], column_name: &[u8]) -> String {
    try_extract(line, column_name).unwrap_or_else(|| ERROR_CELL.to_string())
}

fn try_extract(line: &[u8], column_name: &[u8]) -> Option<String> {
    let mut scanner = Scanner { buf: line, pos: 0 };
    scanner.skip_whitespace();
    if scanner.bump()? != b'{' {
        return None;
    }
    scanner.skip_whitespace();
    if scanner.peek()? == b'}' {
        return Some(NULL_CELL.to_string());
    }
    loop {
        scanner.skip_whitespace();
        if scanner.bump()? != b'"' {
            return None;
        }
        let key = scanner.string_contents()?;
        scanner.skip_whitespace();
        if scanner.bump()? != b':' {
            return None;
        }
        scanner.skip_whitespace();
        if key == column_name {
            return scanner.render_value();
        }
        scanner.skip_value()?;
        scanner.skip_whitespace();
        match scanner.bump()? {
            b',' => continue,
            b'}' => return Some(NULL_CELL.to_string()),
            _ => return None,
        }
    }
}

struct Scanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    /// The raw bytes of a string whose opening quote is already consumed;
    /// stops past the closing quote. Escapes are stepped over, not decoded.
    fn string_contents(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        loop {
            match self.bump()? {
                b'"' => return Some(&self.buf[start..self.pos - 1]),
                b'\\' => {
                    self.bump()?;
                }
                _ => {}
            }
        }
    }

    /// Step over one complete value of any kind.
    fn skip_value(&mut self) -> Option<()> {
        match self.peek()? {
            b'"' => {
                self.pos += 1;
                self.string_contents()?;
                Some(())
            }
            b'{' | b'[' => {
                let mut depth = 0usize;
                loop {
                    match self.bump()? {
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Some(());
                            }
                        }
                        b'"' => {
                            self.string_contents()?;
                        }
                        _ => {}
                    }
                }
            }
            _ => {
                // scalar: run to the next structural byte
                while !matches!(self.peek(), None | Some(b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n')) {
                    self.pos += 1;
                }
                Some(())
            }
        }
    }

    /// Render the value at the cursor for display.
    fn render_value(&mut self) -> Option<String> {
        match self.peek()? {
            b'"' => {
                self.pos += 1;
                let raw = self.string_contents()?;
                unescape(raw)
            }
            b'{' => {
                self.skip_value()?;
                Some(OBJECT_CELL.to_string())
            }
            b'[' => {
                self.skip_value()?;
                Some(ARRAY_CELL.to_string())
            }
            b't' => self.literal(b"true", "True"),
            b'f' => self.literal(b"false", "False"),
            b'n' => self.literal(b"null", NULL_CELL),
            _ => {
                let start = self.pos;
                self.skip_value()?;
                let text = std::str::from_utf8(&self.buf[start..self.pos]).ok()?;
                if text.bytes().any(|b| matches!(b, b'.' | b'e' | b'E')) {
                    Some(text.parse::<f64>().ok()?.to_string())
                } else if let Ok(whole) = text.parse::<i64>() {
                    Some(whole.to_string())
                } else {
                    Some(text.parse::<f64>().ok()?.to_string())
                }
            }
        }
    }

    fn literal(&mut self, expected: &[u8], rendered: &str) -> Option<String> {
        if self.buf[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            Some(rendered.to_string())
        } else {
            None
        }
    }
}

/// Decode the standard JSON escapes into a display string.
fn unescape(raw: &[u8]) -> Option<String> {
    if !raw.contains(&b'\\') {
        return Some(String::from_utf8_lossy(raw).into_owned());
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let byte = raw[i];
        if byte != b'\\' {
            out.push(byte);
            i += 1;
            continue;
        }
        let escape = *raw.get(i + 1)?;
        i += 2;
        match escape {
            b'"' => out.push(b'"'),
            b'\\' => out.push(b'\\'),
            b'/' => out.push(b'/'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'u' => {
                let code = hex4(raw.get(i..i + 4)?)?;
                i += 4;
                let ch = if (0xD800..=0xDBFF).contains(&code) {
                    // surrogate pair: the low half must follow immediately
                    if raw.get(i..i + 2)? != b"\\u" {
                        return None;
                    }
                    let low = hex4(raw.get(i + 2..i + 6)?)?;
                    i += 6;
                    char::from_u32(0x10000 + ((code - 0xD800) << 10) + low.checked_sub(0xDC00)?)?
                } else {
                    char::from_u32(code)?
                };
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

fn hex4(bytes: &[u8]) -> Option<u32> {
    let mut value = 0u32;
    for &byte in bytes {
        value = value * 16 + (byte as char).to_digit(16)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(line: &str, name: &str) -> String {
        extract_cell(line.as_bytes(), name.as_bytes())
    }

    #[test]
    fn renders_each_token_kind() {
        let line = r#"{"s":"hi","i":42,"d":3.5,"t":true,"f":false,"n":null,"o":{"x":1},"a":[1,2]}"#;
        assert_eq!(cell(line, "s"), "hi");
        assert_eq!(cell(line, "i"), "42");
        assert_eq!(cell(line, "d"), "3.5");
        assert_eq!(cell(line, "t"), "True");
        assert_eq!(cell(line, "f"), "False");
        assert_eq!(cell(line, "n"), NULL_CELL);
        assert_eq!(cell(line, "o"), OBJECT_CELL);
        assert_eq!(cell(line, "a"), ARRAY_CELL);
    }

    #[test]
    fn missing_key_is_null() {
        assert_eq!(cell(r#"{"a":1}"#, "b"), NULL_CELL);
        assert_eq!(cell(r#"{}"#, "a"), NULL_CELL);
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert_eq!(cell("", "a"), ERROR_CELL);
        assert_eq!(cell("not json", "a"), ERROR_CELL);
        assert_eq!(cell(r#"{"a": }"#, "a"), ERROR_CELL);
        assert_eq!(cell(r#"{"a":1"#, "b"), ERROR_CELL);
    }

    #[test]
    fn skips_nested_structures_before_the_match() {
        let line = r#"{"deep":{"k":[{"x":"}"},2]},"target":"found"}"#;
        assert_eq!(cell(line, "target"), "found");
    }

    #[test]
    fn decodes_string_escapes() {
        assert_eq!(cell(r#"{"a":"line\nbreak"}"#, "a"), "line\nbreak");
        assert_eq!(cell(r#"{"a":"quote\"inside"}"#, "a"), "quote\"inside");
        assert_eq!(cell(r#"{"a":"Aé"}"#, "a"), "Aé");
        assert_eq!(cell(r#"{"a":"😀"}"#, "a"), "😀");
    }

    #[test]
    fn keys_compare_byte_wise() {
        // a key that would only match after escape decoding is not found
        assert_eq!(cell("{\"\\u0061\":1}", "a"), NULL_CELL);
        assert_eq!(cell(r#"{"naïve":1}"#, "naïve"), "1");
        // raw token bytes, escapes included, are what the name matches
        assert_eq!(cell(r#"{"a":1,"sur\"name":"x"}"#, r#"sur\"name"#), "x");
    }

    #[test]
    fn tolerates_whitespace_between_tokens() {
        assert_eq!(cell("{ \"a\" : 7 , \"b\" : 8 }", "b"), "8");
    }

    #[test]
    fn large_integers_render_via_double() {
        assert_eq!(cell(r#"{"a":9223372036854775807}"#, "a"), "9223372036854775807");
        // past the 64-bit range the render goes through f64
        assert_eq!(cell(r#"{"a":18446744073709551615}"#, "a"), "18446744073709552000");
    }
}
