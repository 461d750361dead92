// Copyright (C) 2026 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of smolt.
//
// smolt is free software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// smolt is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even
// the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along with smolt.  If not,
// see <http://www.gnu.org/licenses/>.
//! [smolt](crate) host-side errors
//!
//! Nothing on the target ever returns an error: a full transport blocks or drops data instead.
//! Errors only arise when reassembling records on the host.

use crate::shape::ArgumentShape;

use backtrace::Backtrace;

/// [smolt](crate) error type
///
/// [smolt](crate) eschews libraries like [thiserror], [anyhow] & [Snafu] in favor of a
/// straightforward enumeration with a few match arms chosen on the basis what the caller will
/// need to repond.
///
/// [thiserror]: https://docs.rs/thiserror
/// [anyhow]: https://docs.rs/anyhow
/// [Snafu]: https://docs.rs/snafu/latest/snafu
#[non_exhaustive]
pub enum Error {
    /// A tag word with no entry in the decode table
    UnknownTag { tag: u32, back: Backtrace },
    /// A record ran out of words before its arguments did
    Truncated {
        tag: u32,
        needed: usize,
        available: usize,
        back: Backtrace,
    },
    /// An argument shape that can't be reassembled (nested spans, odd widths)
    UnsupportedShape {
        shape: ArgumentShape,
        back: Backtrace,
    },
    /// A ring-buffer image that isn't a whole number of words, or cursors that lie outside it
    BadImage {
        len: usize,
        write_idx: usize,
        tag_idx: usize,
        back: Backtrace,
    },
    /// A placeholder in a message's format text that can't be rendered: a malformed or unknown
    /// format spec, one that doesn't suit its argument, or one with no argument left
    BadPlaceholder {
        format: &'static str,
        placeholder: String,
        back: Backtrace,
    },
}

impl std::fmt::Display for Error {
    // `Error` is non-exhaustive so that adding variants won't be a breaking change to our
    // callers. That means the compiler won't catch us if we miss a variant here, so we
    // always include a `_` arm.
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnknownTag { tag, .. } => write!(f, "Unknown tag {:#010x}", tag),
            Error::Truncated {
                tag,
                needed,
                available,
                ..
            } => write!(
                f,
                "Record {:#010x} needs at least {} words, but only {} remain",
                tag, needed, available
            ),
            Error::UnsupportedShape { shape, .. } => {
                write!(f, "Can't decode arguments of shape {}", shape)
            }
            Error::BadImage {
                len,
                write_idx,
                tag_idx,
                ..
            } => write!(
                f,
                "A {}-byte ring buffer image with write index {} & tag index {} is malformed",
                len, write_idx, tag_idx
            ),
            Error::BadPlaceholder {
                format,
                placeholder,
                ..
            } => write!(f, "Can't render {} in {:?}", placeholder, format),
            _ => write!(f, "Other smolt error"),
        }
    }
}

impl std::fmt::Debug for Error {
    #[allow(unreachable_patterns)]
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::UnknownTag { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::Truncated { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::UnsupportedShape { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::BadImage { back, .. } => write!(f, "{}\n{:?}", self, back),
            Error::BadPlaceholder { back, .. } => write!(f, "{}\n{:?}", self, back),
            err => write!(f, "smolt error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
