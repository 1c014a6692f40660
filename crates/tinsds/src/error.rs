use thiserror::Error;

/// Failure to obtain memory for a buffer.
///
/// This is the only failure mode of constructors and growth operations. When
/// it is returned from a mutating method the buffer is left exactly as it was
/// before the call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The requested size does not fit in `usize` once header and terminator
    /// are accounted for.
    #[error("capacity overflow")]
    CapacityOverflow,
    /// The allocator could not provide a block of `size` bytes.
    #[error("allocator failed to provide {size} bytes")]
    OutOfMemory { size: usize },
}

/// Errors produced by [`Sds::append_fmt`](crate::Sds::append_fmt) and
/// [`Sds::append_printf`](crate::Sds::append_printf).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// A `%` token consumed more arguments than were supplied.
    #[error("missing argument {index} for '%{spec}'")]
    MissingArgument { spec: char, index: usize },
    /// The argument at `index` cannot be rendered by the `%spec` token.
    #[error("argument {index} does not match '%{spec}'")]
    ArgumentMismatch { spec: char, index: usize },
    /// A `Display` or `Debug` implementation reported an error.
    #[error("formatter error")]
    Formatter,
}

/// Errors produced by [`split_args`](crate::split_args).
///
/// No tokens are returned alongside an error: everything built before the
/// failure has already been released.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitArgsError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// Input ended inside a quoted token opened at `position`.
    #[error("unterminated {quote} quote opened at byte {position}")]
    UnterminatedQuote { quote: char, position: usize },
    /// A closing quote at `position` is directly followed by a non-space byte.
    #[error("closing {quote} quote at byte {position} must be followed by a space")]
    TrailingCharacter { quote: char, position: usize },
}
