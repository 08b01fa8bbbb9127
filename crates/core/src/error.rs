//! Error types for Ripple sequences and operators.

use alloc::string::String;
use core::fmt;

/// Result type alias for Ripple operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error conditions raised by sources and delivered through `on_error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A positional argument lies outside the sequence.
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// `index + count` runs past the end of the sequence.
    RangeOutOfBounds {
        index: usize,
        count: usize,
        len: usize,
    },
    /// An edit that needs at least one item received none.
    EmptyItems,
    /// Move target falls inside the moved range or past the end.
    InvalidMove {
        old_index: usize,
        count: usize,
        new_index: usize,
    },
    /// The stream already completed or failed.
    Terminated,
    /// A change arrived while the operator was still processing the previous one.
    Reentrant,
    /// Failure raised by a producer and propagated downstream.
    Upstream {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for length {}", index, len)
            }
            Error::RangeOutOfBounds { index, count, len } => {
                write!(
                    f,
                    "Range {}..{} out of bounds for length {}",
                    index,
                    index.saturating_add(*count),
                    len
                )
            }
            Error::EmptyItems => write!(f, "Expected at least one item"),
            Error::InvalidMove {
                old_index,
                count,
                new_index,
            } => {
                write!(
                    f,
                    "Invalid move of {} items from {} to {}",
                    count, old_index, new_index
                )
            }
            Error::Terminated => write!(f, "Stream already terminated"),
            Error::Reentrant => write!(f, "Change delivered while the previous one is in progress"),
            Error::Upstream { message } => write!(f, "Upstream error: {}", message),
        }
    }
}

impl Error {
    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { index, len }
    }

    /// Creates a range out of bounds error.
    pub fn range_out_of_bounds(index: usize, count: usize, len: usize) -> Self {
        Error::RangeOutOfBounds { index, count, len }
    }

    /// Creates an invalid move error.
    pub fn invalid_move(old_index: usize, count: usize, new_index: usize) -> Self {
        Error::InvalidMove {
            old_index,
            count,
            new_index,
        }
    }

    /// Creates an upstream error carrying an application message.
    pub fn upstream(message: impl Into<String>) -> Self {
        Error::Upstream {
            message: message.into(),
        }
    }

    /// Checks that `index` addresses an existing element.
    pub fn check_index(index: usize, len: usize) -> Result<()> {
        if index < len {
            Ok(())
        } else {
            Err(Error::index_out_of_range(index, len))
        }
    }

    /// Checks that `index` is a valid insertion point (`0..=len`).
    pub fn check_insertion_point(index: usize, len: usize) -> Result<()> {
        if index <= len {
            Ok(())
        } else {
            Err(Error::index_out_of_range(index, len))
        }
    }

    /// Checks that `index..index + count` lies within the sequence.
    pub fn check_range(index: usize, count: usize, len: usize) -> Result<()> {
        match index.checked_add(count) {
            Some(end) if end <= len => Ok(()),
            _ => Err(Error::range_out_of_bounds(index, count, len)),
        }
    }
}
