//! Binary-safe dynamic byte strings.
//!
//! An [`Sds`] keeps its length and capacity in a small header stored right
//! before the bytes, always followed by a zero terminator, so the content can
//! be handed to C-style consumers as-is while still holding arbitrary binary
//! data. Header width adapts to the string size (see [`SizeClass`]).
//!
//! ```
//! use tinsds::{Sds, fmt_args, split_args};
//!
//! let mut line = Sds::from_bytes(b"set ")?;
//! line.append_repr(b"user:\x01", true)?;
//! line.append_fmt(" %I", &fmt_args![42i64])?;
//! assert_eq!(line, r#"set "user:\x01" 42"#);
//!
//! let args = split_args(&line)?;
//! assert_eq!(args, ["set", "user:\x01", "42"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![no_std]
#![allow(missing_docs)]
extern crate alloc;

#[cfg(test)]
extern crate std;

mod allocator;
mod edit;
mod error;
mod escape;
mod format;
mod header;
mod options;
mod sds;
mod split;
mod tracing_compat;

#[cfg(test)]
mod tests;

pub use allocator::{Heap, RawAlloc};
pub use error::{AllocError, FormatError, SplitArgsError};
pub use format::FmtArg;
pub use header::SizeClass;
pub use options::{GrowthMode, MAX_PREALLOC};
pub use sds::Sds;
pub use split::{split, split_args, split_args_in, split_in};

/// Builds an array of [`FmtArg`] for [`Sds::append_fmt`], choosing each
/// variant from the argument's type.
///
/// ```rust
/// # use tinsds::{fmt_args, FmtArg};
/// let args = fmt_args!["id", 7u64, b'!'];
/// assert_eq!(
///     args,
///     [FmtArg::Str(b"id"), FmtArg::ULong(7), FmtArg::Byte(b'!')]
/// );
/// ```
#[macro_export]
macro_rules! fmt_args {
    ( $( $arg:expr ),* $(,)? ) => {
        [$($crate::FmtArg::from($arg)),*]
    };
}

/// Appends `format!`-style output to a buffer through
/// [`Sds::append_printf`].
#[macro_export]
macro_rules! append_printf {
    ($dst:expr, $($arg:tt)*) => {
        $dst.append_printf(::core::format_args!($($arg)*))
    };
}
