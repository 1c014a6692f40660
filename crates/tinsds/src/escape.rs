//! Quoted, escaped representation of arbitrary bytes.
//!
//! The output of [`Sds::append_repr`] is exactly what the double-quote rules of
//! [`split_args`](crate::split_args) decode, so a representation re-tokenizes
//! to the original bytes.

use crate::{allocator::RawAlloc, error::AllocError, sds::Sds};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Value of an ASCII hexadecimal digit.
#[inline]
pub(crate) const fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Escape sequence for `b`, or `None` when the byte is copied verbatim.
fn escape(b: u8) -> Option<([u8; 4], usize)> {
    let short = |c| Some(([b'\\', c, 0, 0], 2));
    match b {
        b'\\' | b'"' => short(b),
        b'\n' => short(b'n'),
        b'\r' => short(b'r'),
        b'\t' => short(b't'),
        0x07 => short(b'a'),
        0x08 => short(b'b'),
        0x20..=0x7e => None,
        _ => Some((
            [
                b'\\',
                b'x',
                HEX_DIGITS[usize::from(b >> 4)],
                HEX_DIGITS[usize::from(b & 0xf)],
            ],
            4,
        )),
    }
}

impl<A: RawAlloc> Sds<A> {
    /// Appends an escaped representation of `bytes`, optionally wrapped in
    /// double quotes.
    ///
    /// `\` and `"` are backslash-escaped, `\n \r \t \a \b` use their short
    /// forms, other bytes outside printable ASCII become `\xhh`.
    ///
    /// ```
    /// use tinsds::Sds;
    ///
    /// let mut s = Sds::new()?;
    /// s.append_repr(b"a\"b\n\x00\xff", true)?;
    /// assert_eq!(s, r#""a\"b\n\x00\xff""#);
    /// # Ok::<(), tinsds::AllocError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails. Output appended before the
    /// failure is kept.
    pub fn append_repr(&mut self, bytes: &[u8], with_quotes: bool) -> Result<(), AllocError> {
        self.reserve(bytes.len() + 2)?;
        if with_quotes {
            self.push(b'"')?;
        }
        let mut rest = bytes;
        while !rest.is_empty() {
            let run = rest.iter().position(|&b| escape(b).is_some()).unwrap_or(rest.len());
            self.append(&rest[..run])?;
            let Some((&b, tail)) = rest[run..].split_first() else {
                break;
            };
            if let Some((seq, n)) = escape(b) {
                self.append(&seq[..n])?;
            }
            rest = tail;
        }
        if with_quotes {
            self.push(b'"')?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::hex_val;
    use crate::Sds;

    #[test]
    fn hex_digits() {
        assert_eq!(hex_val(b'0'), Some(0));
        assert_eq!(hex_val(b'a'), Some(10));
        assert_eq!(hex_val(b'F'), Some(15));
        assert_eq!(hex_val(b'g'), None);
        assert_eq!(hex_val(b' '), None);
    }

    #[rstest]
    #[case(b"", false, r"")]
    #[case(b"", true, r#""""#)]
    #[case(b"plain text", false, r"plain text")]
    #[case(b"\\", true, r#""\\""#)]
    #[case(b"\x07\x08\t\r\n", false, r"\a\b\t\r\n")]
    #[case(b"\x00\x1f\x7f\x80\xff", false, r"\x00\x1f\x7f\x80\xff")]
    #[case(b"'single'", true, r#""'single'""#)]
    fn repr_cases(#[case] input: &[u8], #[case] quoted: bool, #[case] expected: &str) {
        let mut s = Sds::new().unwrap();
        s.append_repr(input, quoted).unwrap();
        assert_eq!(s, expected);
        s.assert_invariants();
    }

    #[test]
    fn repr_appends_after_existing_content() {
        let mut s = Sds::from_bytes(b"key=").unwrap();
        s.append_repr(b"v\0", true).unwrap();
        assert_eq!(s, r#"key="v\x00""#);
    }
}
