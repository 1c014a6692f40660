//! Formatted appends.
//!
//! Two paths are offered:
//!
//! - [`Sds::append_printf`] accepts any [`fmt::Arguments`]. Output is rendered
//!   into a scratch area first (on the stack up to [`STACK_SCRATCH`] bytes,
//!   then on the heap, doubling until it fits) and appended in one step, so a
//!   failure never leaves partial output behind.
//! - [`Sds::append_fmt`] understands a small fixed token set and writes each
//!   piece straight into the buffer after sizing it exactly.

use alloc::vec::Vec;
use core::fmt;

use bstr::ByteSlice;

use crate::{
    allocator::{Heap, RawAlloc},
    error::{AllocError, FormatError},
    sds::Sds,
    tracing_compat::trace,
};

/// Size of the on-stack scratch used by [`Sds::append_printf`].
const STACK_SCRATCH: usize = 1024;

/// Longest decimal rendering of a 64-bit integer, sign included.
const DECIMAL_MAX: usize = 21;

/// Writes the decimal digits of `v` right-aligned in `buf` and returns the
/// index of the first digit.
#[allow(clippy::cast_possible_truncation)]
fn write_digits(mut v: u64, buf: &mut [u8; DECIMAL_MAX]) -> usize {
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            return i;
        }
    }
}

pub(crate) fn fmt_u64(v: u64, buf: &mut [u8; DECIMAL_MAX]) -> &[u8] {
    let start = write_digits(v, buf);
    &buf[start..]
}

pub(crate) fn fmt_i64(v: i64, buf: &mut [u8; DECIMAL_MAX]) -> &[u8] {
    let mut start = write_digits(v.unsigned_abs(), buf);
    if v < 0 {
        start -= 1;
        buf[start] = b'-';
    }
    &buf[start..]
}

/// An argument for [`Sds::append_fmt`].
///
/// Usually built with [`fmt_args!`](crate::fmt_args), which picks the variant
/// from the argument's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmtArg<'a> {
    /// Raw bytes, rendered by `%s`.
    Str(&'a [u8]),
    /// Another buffer's content, rendered by `%S`.
    Buf(&'a [u8]),
    /// `%i`
    Int(i32),
    /// `%I`
    Long(i64),
    /// `%u`
    UInt(u32),
    /// `%U`
    ULong(u64),
    /// `%c`
    Byte(u8),
}

impl<'a> From<&'a str> for FmtArg<'a> {
    fn from(s: &'a str) -> Self {
        FmtArg::Str(s.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for FmtArg<'a> {
    fn from(s: &'a [u8]) -> Self {
        FmtArg::Str(s)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for FmtArg<'a> {
    fn from(s: &'a [u8; N]) -> Self {
        FmtArg::Str(s)
    }
}

impl<'a, A: RawAlloc> From<&'a Sds<A>> for FmtArg<'a> {
    fn from(s: &'a Sds<A>) -> Self {
        FmtArg::Buf(s.as_bytes())
    }
}

impl From<i32> for FmtArg<'_> {
    fn from(v: i32) -> Self {
        FmtArg::Int(v)
    }
}

impl From<i64> for FmtArg<'_> {
    fn from(v: i64) -> Self {
        FmtArg::Long(v)
    }
}

impl From<u32> for FmtArg<'_> {
    fn from(v: u32) -> Self {
        FmtArg::UInt(v)
    }
}

impl From<u64> for FmtArg<'_> {
    fn from(v: u64) -> Self {
        FmtArg::ULong(v)
    }
}

impl From<u8> for FmtArg<'_> {
    fn from(v: u8) -> Self {
        FmtArg::Byte(v)
    }
}

/// Collects what a formatter produces into a fixed scratch area, counting the
/// bytes that did not fit.
struct ScratchWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
    needed: usize,
}

impl<'a> ScratchWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            written: 0,
            needed: 0,
        }
    }

    fn truncated(&self) -> bool {
        self.needed > self.written
    }

    fn output(&self) -> &[u8] {
        &self.buf[..self.written]
    }
}

impl fmt::Write for ScratchWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let take = bytes.len().min(self.buf.len() - self.written);
        self.buf[self.written..self.written + take].copy_from_slice(&bytes[..take]);
        self.written += take;
        self.needed = self.needed.saturating_add(bytes.len());
        Ok(())
    }
}

fn render<'a>(
    scratch: &'a mut [u8],
    args: fmt::Arguments<'_>,
) -> Result<ScratchWriter<'a>, FormatError> {
    let mut w = ScratchWriter::new(scratch);
    fmt::write(&mut w, args).map_err(|_| FormatError::Formatter)?;
    Ok(w)
}

impl Sds<Heap> {
    /// Creates a buffer holding the decimal rendering of `v`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn from_i64(v: i64) -> Result<Self, AllocError> {
        Self::from_bytes(fmt_i64(v, &mut [0; DECIMAL_MAX]))
    }

    /// Creates a buffer holding the decimal rendering of `v`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn from_u64(v: u64) -> Result<Self, AllocError> {
        Self::from_bytes(fmt_u64(v, &mut [0; DECIMAL_MAX]))
    }
}

impl<A: RawAlloc> Sds<A> {
    /// Appends the output of any `Display`/`Debug` formatting.
    ///
    /// Prefer the [`append_printf!`](crate::append_printf) macro:
    ///
    /// ```
    /// use tinsds::{Sds, append_printf};
    ///
    /// let mut s = Sds::from_bytes(b"sum: ")?;
    /// append_printf!(s, "{} + {} = {:>4}", 1, 2, 1 + 2)?;
    /// assert_eq!(s, "sum: 1 + 2 =    3");
    /// # Ok::<(), tinsds::FormatError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// [`FormatError::Formatter`] if a formatting trait reports an error,
    /// [`FormatError::Alloc`] if memory runs out. The buffer is unchanged in
    /// both cases.
    pub fn append_printf(&mut self, args: fmt::Arguments<'_>) -> Result<(), FormatError> {
        if let Some(s) = args.as_str() {
            return Ok(self.append(s.as_bytes())?);
        }

        let mut stack = [0u8; STACK_SCRATCH];
        let w = render(&mut stack, args)?;
        if !w.truncated() {
            return Ok(self.append(w.output())?);
        }

        let mut size = STACK_SCRATCH;
        let mut needed = w.needed;
        loop {
            size = size.saturating_mul(2).max(needed);
            trace!(size, "escalating format scratch");
            let mut heap = Vec::new();
            heap.try_reserve_exact(size)
                .map_err(|_| AllocError::OutOfMemory { size })?;
            heap.resize(size, 0);
            let w = render(&mut heap, args)?;
            if !w.truncated() {
                return Ok(self.append(w.output())?);
            }
            needed = w.needed;
        }
    }

    /// Appends `fmt` with each `%` token replaced by the next argument.
    ///
    /// | token | argument |
    /// |-------|----------|
    /// | `%s`, `%S` | [`FmtArg::Str`] or [`FmtArg::Buf`] |
    /// | `%i` | [`FmtArg::Int`] |
    /// | `%I` | [`FmtArg::Int`] or [`FmtArg::Long`] |
    /// | `%u` | [`FmtArg::UInt`] |
    /// | `%U` | [`FmtArg::UInt`] or [`FmtArg::ULong`] |
    /// | `%c` | [`FmtArg::Byte`] |
    /// | `%%` | none, emits `%` |
    ///
    /// Any other `%x` emits `x`; a lone `%` at the end emits nothing. Surplus
    /// arguments are ignored.
    ///
    /// ```
    /// use tinsds::{Sds, fmt_args};
    ///
    /// let name = Sds::from_bytes(b"job")?;
    /// let mut s = Sds::new()?;
    /// s.append_fmt("%S#%U: %i%% (%s)", &fmt_args![&name, 42u64, -7, "ok"])?;
    /// assert_eq!(s, "job#42: -7% (ok)");
    /// # Ok::<(), tinsds::FormatError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// [`FormatError::MissingArgument`] or [`FormatError::ArgumentMismatch`]
    /// when the arguments do not fit the tokens, [`FormatError::Alloc`] if
    /// memory runs out. On error the content is restored to what it was
    /// before the call.
    pub fn append_fmt(&mut self, fmt: &str, args: &[FmtArg<'_>]) -> Result<(), FormatError> {
        let start = self.len();
        let result = self.append_fmt_tokens(fmt.as_bytes(), args);
        if result.is_err() {
            self.truncate(start);
        }
        result
    }

    fn append_fmt_tokens(&mut self, fmt: &[u8], args: &[FmtArg<'_>]) -> Result<(), FormatError> {
        self.reserve(fmt.len().saturating_mul(2))?;

        let mut next = 0;
        let mut rest = fmt;
        while !rest.is_empty() {
            let Some(pct) = rest.find_byte(b'%') else {
                self.append(rest)?;
                break;
            };
            self.append(&rest[..pct])?;
            let Some(&spec) = rest.get(pct + 1) else {
                break;
            };
            rest = &rest[pct + 2..];

            if !matches!(spec, b's' | b'S' | b'i' | b'I' | b'u' | b'U' | b'c') {
                self.push(spec)?;
                continue;
            }
            let index = next;
            next += 1;
            let arg = args.get(index).ok_or(FormatError::MissingArgument {
                spec: char::from(spec),
                index,
            })?;
            let mut digits = [0; DECIMAL_MAX];
            let mut byte = [0; 1];
            let bytes: &[u8] = match (spec, *arg) {
                (b's' | b'S', FmtArg::Str(s) | FmtArg::Buf(s)) => s,
                (b'i' | b'I', FmtArg::Int(v)) => fmt_i64(i64::from(v), &mut digits),
                (b'I', FmtArg::Long(v)) => fmt_i64(v, &mut digits),
                (b'u' | b'U', FmtArg::UInt(v)) => fmt_u64(u64::from(v), &mut digits),
                (b'U', FmtArg::ULong(v)) => fmt_u64(v, &mut digits),
                (b'c', FmtArg::Byte(b)) => {
                    byte[0] = b;
                    &byte
                }
                _ => {
                    return Err(FormatError::ArgumentMismatch {
                        spec: char::from(spec),
                        index,
                    });
                }
            };
            self.append(bytes)?;
        }
        Ok(())
    }
}

impl<A: RawAlloc> fmt::Write for Sds<A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
