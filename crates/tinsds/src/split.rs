//! Splitting, shell-style tokenizing and joining.

use alloc::vec::Vec;

use bstr::ByteSlice;

use crate::{
    allocator::{Heap, RawAlloc},
    error::{AllocError, SplitArgsError},
    escape::hex_val,
    sds::Sds,
    tracing_compat::debug,
};

fn push_part<T>(parts: &mut Vec<T>, part: T) -> Result<(), AllocError> {
    parts.try_reserve(1).map_err(|_| AllocError::OutOfMemory {
        size: core::mem::size_of::<T>().saturating_mul(parts.len().saturating_add(1)),
    })?;
    parts.push(part);
    Ok(())
}

/// Splits `bytes` on every occurrence of `sep`.
///
/// Empty fields are kept, so `n` separators always produce `n + 1` fields.
/// Occurrences are matched left to right without overlap. An empty input or
/// separator produces no fields.
///
/// ```
/// let fields = tinsds::split(b"a,b,,c", b",")?;
/// assert_eq!(fields, ["a", "b", "", "c"]);
/// # Ok::<(), tinsds::AllocError>(())
/// ```
///
/// # Errors
///
/// Returns [`AllocError`] if the allocator fails. Fields built so far are
/// released.
pub fn split(bytes: &[u8], sep: &[u8]) -> Result<Vec<Sds>, AllocError> {
    split_in(bytes, sep, Heap)
}

/// Like [`split`], allocating every field from `alloc`.
///
/// # Errors
///
/// Returns [`AllocError`] if the allocator fails.
pub fn split_in<A: RawAlloc + Clone>(
    bytes: &[u8],
    sep: &[u8],
    alloc: A,
) -> Result<Vec<Sds<A>>, AllocError> {
    let mut fields = Vec::new();
    if bytes.is_empty() || sep.is_empty() {
        return Ok(fields);
    }
    let mut rest = bytes;
    while let Some(at) = rest.find(sep) {
        push_part(&mut fields, Sds::from_bytes_in(&rest[..at], alloc.clone())?)?;
        rest = &rest[at + sep.len()..];
    }
    push_part(&mut fields, Sds::from_bytes_in(rest, alloc)?)?;
    Ok(fields)
}

/// Blank skipping between tokens follows C `isspace`.
#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Double { open: usize },
    Single { open: usize },
}

/// Splits a command line into arguments.
///
/// Tokens are separated by blanks. Inside double quotes, `\xHH` decodes to
/// one byte, `\n \r \t \b \a` to the matching control byte and any other
/// escaped byte stands for itself. Inside single quotes only `\'` is an
/// escape. A closing quote must be followed by a blank or the end of input.
/// The line ends at its first zero byte.
///
/// ```
/// let args = tinsds::split_args(br#"set key "hello\nworld" 'it\'s'"#)?;
/// assert_eq!(args, ["set", "key", "hello\nworld", "it's"]);
/// # Ok::<(), tinsds::SplitArgsError>(())
/// ```
///
/// # Errors
///
/// [`SplitArgsError::UnterminatedQuote`] and
/// [`SplitArgsError::TrailingCharacter`] for malformed quoting,
/// [`SplitArgsError::Alloc`] if memory runs out. No tokens are returned on
/// error.
pub fn split_args(line: &[u8]) -> Result<Vec<Sds>, SplitArgsError> {
    split_args_in(line, Heap)
}

/// Like [`split_args`], allocating every token from `alloc`.
///
/// # Errors
///
/// See [`split_args`].
pub fn split_args_in<A: RawAlloc + Clone>(
    line: &[u8],
    alloc: A,
) -> Result<Vec<Sds<A>>, SplitArgsError> {
    let line = line.find_byte(0).map_or(line, |nul| &line[..nul]);
    let mut tokens = Vec::new();
    let mut pos = 0;
    loop {
        while line.get(pos).copied().is_some_and(is_space) {
            pos += 1;
        }
        if pos == line.len() {
            return Ok(tokens);
        }
        let mut token = Sds::new_in(alloc.clone())?;
        pos = match read_token(line, pos, &mut token) {
            Ok(end) => end,
            Err(err) => {
                debug!(%err, parsed = tokens.len(), "rejected argument line");
                return Err(err);
            }
        };
        push_part(&mut tokens, token)?;
    }
}

/// Decodes one token starting at `pos` and returns the position after it.
fn read_token<A: RawAlloc>(
    line: &[u8],
    mut pos: usize,
    token: &mut Sds<A>,
) -> Result<usize, SplitArgsError> {
    let mut state = QuoteState::Unquoted;
    loop {
        let Some(&c) = line.get(pos) else {
            return match state {
                QuoteState::Unquoted => Ok(pos),
                QuoteState::Double { open } => Err(SplitArgsError::UnterminatedQuote {
                    quote: '"',
                    position: open,
                }),
                QuoteState::Single { open } => Err(SplitArgsError::UnterminatedQuote {
                    quote: '\'',
                    position: open,
                }),
            };
        };
        let next = line.get(pos + 1).copied();
        match state {
            QuoteState::Unquoted => match c {
                b' ' | b'\n' | b'\r' | b'\t' => return Ok(pos),
                b'"' => state = QuoteState::Double { open: pos },
                b'\'' => state = QuoteState::Single { open: pos },
                _ => token.push(c)?,
            },
            QuoteState::Double { .. } => match (c, next) {
                (b'\\', Some(b'x')) => {
                    let hi = line.get(pos + 2).copied().and_then(hex_val);
                    let lo = line.get(pos + 3).copied().and_then(hex_val);
                    if let (Some(hi), Some(lo)) = (hi, lo) {
                        token.push((hi << 4) | lo)?;
                        pos += 3;
                    } else {
                        token.push(b'x')?;
                        pos += 1;
                    }
                }
                (b'\\', Some(escaped)) => {
                    token.push(match escaped {
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        b'b' => 0x08,
                        b'a' => 0x07,
                        other => other,
                    })?;
                    pos += 1;
                }
                (b'"', next) => return close_quote('"', pos, next),
                _ => token.push(c)?,
            },
            QuoteState::Single { .. } => match (c, next) {
                (b'\\', Some(b'\'')) => {
                    token.push(b'\'')?;
                    pos += 1;
                }
                (b'\'', next) => return close_quote('\'', pos, next),
                _ => token.push(c)?,
            },
        }
        pos += 1;
    }
}

fn close_quote(quote: char, pos: usize, next: Option<u8>) -> Result<usize, SplitArgsError> {
    match next {
        Some(b) if !is_space(b) => Err(SplitArgsError::TrailingCharacter {
            quote,
            position: pos,
        }),
        _ => Ok(pos + 1),
    }
}

impl Sds<Heap> {
    /// Concatenates `parts` with `sep` between consecutive parts.
    ///
    /// ```
    /// use tinsds::Sds;
    ///
    /// let joined = Sds::join(["a", "b", "c"], b", ")?;
    /// assert_eq!(joined, "a, b, c");
    /// # Ok::<(), tinsds::AllocError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn join<I>(parts: I, sep: &[u8]) -> Result<Self, AllocError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        Self::join_in(parts, sep, Heap)
    }

    /// Concatenates buffers with `sep` between consecutive ones.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn join_sds<B: RawAlloc>(parts: &[Sds<B>], sep: &[u8]) -> Result<Self, AllocError> {
        Self::join_in(parts, sep, Heap)
    }
}

impl<A: RawAlloc> Sds<A> {
    /// Like [`Sds::join`], allocating the result from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn join_in<I>(parts: I, sep: &[u8], alloc: A) -> Result<Self, AllocError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut joined = Self::new_in(alloc)?;
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.append(sep)?;
            }
            joined.append(part.as_ref())?;
        }
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use rstest::rstest;

    use super::{split, split_args};
    use crate::{Sds, SplitArgsError};

    fn fields(bytes: &[u8], sep: &[u8]) -> Vec<Vec<u8>> {
        split(bytes, sep)
            .unwrap()
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect()
    }

    #[rstest]
    #[case(b"a,b,,c", b",", &[b"a" as &[u8], b"b", b"", b"c"])]
    #[case(b",a,", b",", &[b"" as &[u8], b"a", b""])]
    #[case(b"abc", b",", &[b"abc" as &[u8]])]
    #[case(b"foo--bar--", b"--", &[b"foo" as &[u8], b"bar", b""])]
    #[case(b"aaa", b"aa", &[b"" as &[u8], b"a"])]
    #[case(b"a", b"abc", &[b"a" as &[u8]])]
    #[case(b"x\0y", b"\0", &[b"x" as &[u8], b"y"])]
    fn split_cases(#[case] input: &[u8], #[case] sep: &[u8], #[case] expected: &[&[u8]]) {
        assert_eq!(fields(input, sep), expected);
    }

    #[test]
    fn degenerate_split_is_empty() {
        assert!(split(b"", b",").unwrap().is_empty());
        assert!(split(b"abc", b"").unwrap().is_empty());
    }

    fn args(line: &[u8]) -> Vec<Vec<u8>> {
        split_args(line)
            .unwrap()
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect()
    }

    #[rstest]
    #[case(br#"foo bar "hello\nworld""#, &[b"foo" as &[u8], b"bar", b"hello\nworld"])]
    #[case(b"  spaced \t out\r\n", &[b"spaced" as &[u8], b"out"])]
    #[case(br#""\x41\x7a\xff" "\xZZ""#, &[b"Az\xff" as &[u8], b"xZZ"])]
    #[case(br#""\q\"\\""#, &[b"q\"\\" as &[u8]])]
    #[case(br#""\a\b\t\r""#, &[b"\x07\x08\t\r" as &[u8]])]
    #[case(br"'it\'s' 'a\nb'", &[b"it's" as &[u8], b"a\\nb"])]
    #[case(br#"foo"bar baz" x"#, &[b"foobar baz" as &[u8], b"x"])]
    #[case(br#""" ''"#, &[b"" as &[u8], b""])]
    #[case(b"a\x0bb", &[b"a\x0bb" as &[u8]])]
    #[case(b"before\0after", &[b"before" as &[u8]])]
    fn split_args_cases(#[case] line: &[u8], #[case] expected: &[&[u8]]) {
        assert_eq!(args(line), expected);
    }

    #[rstest]
    #[case(b"")]
    #[case(b"   \t\n")]
    #[case(b"\0 ignored")]
    fn split_args_empty(#[case] line: &[u8]) {
        assert!(split_args(line).unwrap().is_empty());
    }

    #[rstest]
    #[case(br#"foo "bar"#, SplitArgsError::UnterminatedQuote { quote: '"', position: 4 })]
    #[case(br"foo 'bar", SplitArgsError::UnterminatedQuote { quote: '\'', position: 4 })]
    #[case(br#""abc\"#, SplitArgsError::UnterminatedQuote { quote: '"', position: 0 })]
    #[case(br#""foo"bar"#, SplitArgsError::TrailingCharacter { quote: '"', position: 4 })]
    #[case(br"'foo'bar", SplitArgsError::TrailingCharacter { quote: '\'', position: 4 })]
    fn split_args_errors(#[case] line: &[u8], #[case] expected: SplitArgsError) {
        assert_eq!(split_args(line), Err(expected));
    }

    #[test]
    fn join_variants() {
        assert_eq!(Sds::join(["a", "b"], b"|").unwrap(), "a|b");
        assert_eq!(Sds::join(Vec::<&[u8]>::new(), b"|").unwrap(), "");
        let parts = [Sds::from_bytes(b"x").unwrap(), Sds::from_bytes(b"\0").unwrap()];
        let joined = Sds::join_sds(&parts, b", ").unwrap();
        assert_eq!(joined, b"x, \0");
    }
}
