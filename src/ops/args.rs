use crate::error::{Error, Result};


/// Cursor over space-separated status arguments.
///
/// Every malformed field is reported as a misbehaving backend.
pub(crate) struct StatusArgs<'a> {
    line: &'a str,
    rest: &'a str,
}


impl<'a> StatusArgs<'a> {
    /// Starts parsing an argument string.
    ///
    /// * `line` - arguments of one status line
    pub(crate) fn new(line: &'a str) -> Self {
        StatusArgs { line: line, rest: line }
    }

    /// Reads a one-character tag, which must be followed by a space.
    pub(crate) fn tag(&mut self) -> Result<char> {
        let mut chars = self.rest.chars();
        let tag = chars.next()
            .ok_or_else(|| self.violation())?;

        if !chars.as_str().starts_with(' ') {
            return Err(self.violation());
        }

        self.rest = chars.as_str();
        Ok(tag)
    }

    /// Reads an integer which must be followed by a space.
    pub(crate) fn int<T: TryFrom<i64>>(&mut self) -> Result<T> {
        let value = self.int_field()?;
        if !self.rest.starts_with(' ') {
            return Err(self.violation());
        }

        Ok(value)
    }

    /// Reads an integer followed by a space or the end of the arguments.
    pub(crate) fn last_int<T: TryFrom<i64>>(&mut self) -> Result<T> {
        let value = self.int_field()?;
        if !self.rest.is_empty() && !self.rest.starts_with(' ') {
            return Err(self.violation());
        }

        Ok(value)
    }

    /// Reads the next space-delimited word, which must not be empty.
    pub(crate) fn word(&mut self) -> Result<&'a str> {
        let rest = self.rest.trim_start_matches(' ');
        let end = rest.find(' ')
            .unwrap_or(rest.len());

        if 0 == end {
            return Err(self.violation());
        }

        self.rest = &rest[end..];
        Ok(&rest[..end])
    }

    /// Returns everything after the separating spaces, `None` if nothing is left.
    pub(crate) fn tail(&mut self) -> Option<&'a str> {
        let rest = self.rest.trim_start_matches(' ');
        self.rest = "";

        (!rest.is_empty()).then_some(rest)
    }

    fn int_field<T: TryFrom<i64>>(&mut self) -> Result<T> {
        let (value, rest) = parse_long(self.rest)
            .ok_or_else(|| self.violation())?;

        self.rest = rest;
        T::try_from(value)
            .map_err(|_| self.violation())
    }

    fn violation(&self) -> Error {
        Error::misbehaving_backend(self.line)
    }
}


/// Parses a leading integer with automatic base detection.
///
/// Leading spaces and a sign are accepted. `0x` selects hexadecimal,
/// a leading `0` octal, anything else decimal. Returns the value and the
/// unparsed remainder, `None` if no digit was found or the value overflows.
///
/// * `input` - text starting with the number
pub(crate) fn parse_long(input: &str) -> Option<(i64, &str)> {
    let text = input.trim_start_matches(|c: char| c == ' ' || c == '\t');

    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let has_hex_prefix = (text.starts_with("0x") || text.starts_with("0X"))
        && text[2..].starts_with(|c: char| c.is_ascii_hexdigit());

    let (radix, digits) = if has_hex_prefix {
        (16, &text[2..])
    } else if text.starts_with('0') {
        (8, text)
    } else {
        (10, text)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());

    if 0 == end {
        return None;
    }

    let magnitude = i128::from_str_radix(&digits[..end], radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };

    i64::try_from(value)
        .ok()
        .map(|value| (value, &digits[end..]))
}
