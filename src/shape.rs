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

//! Argument shapes: the compile-time description of a value's wire layout.
//!
//! Every argument passed to a logging call site is mapped, by its static type alone, onto exactly
//! one [`ArgumentShape`]. The shape list becomes part of the call site's [key](crate::tag::Key),
//! which means the same format text logged with different argument types always mints different
//! [`Tag`](crate::tag::Tag)s, and an off-target decoder can pick one decode plan per tag.
//!
//! The mapping is the [`Shape`] trait. Types with no mapping simply don't implement it, so trying
//! to log one is a build failure:
//!
//! ```compile_fail
//! use smolt::{log, transport::Discard, Logger};
//! let logger = Logger::new(Discard);
//! let p: *const u8 = core::ptr::null();
//! log!(logger, "pointer: {}", p); // raw pointers have no wire shape
//! ```

use crate::ser::Scalar;

type StdResult<T, E> = core::result::Result<T, E>;

/// The length of a span or text view: either part of the type, or known only at run time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, u8)]
pub enum Length {
    /// The length is fixed by the type; no length word goes on the wire
    Fixed(usize),
    /// The length is carried on the wire in a trailing word
    Dynamic,
}

/// Canonical wire-shape descriptor for a loggable type.
///
/// The layout is `#[repr(C, u8)]` because shapes are embedded in each
/// [`CallSite`](crate::tag::CallSite) record in the target image, where decode tooling reads them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, u8)]
pub enum ArgumentShape {
    Bool,
    /// Unsigned integer of the given width in bits
    UnsignedInt(u8),
    /// Two's-complement signed integer of the given width in bits
    SignedInt(u8),
    /// IEEE-754 binary floating point of the given width in bits
    Float(u8),
    /// Contiguous read-only view of scalar elements
    Span {
        element: &'static ArgumentShape,
        length: Length,
    },
    /// Read-only character sequence
    String {
        element: &'static ArgumentShape,
        length: Length,
    },
}

impl ArgumentShape {
    /// Size in bytes of one value of this shape, if it is a scalar.
    pub const fn size(&self) -> Option<usize> {
        match self {
            ArgumentShape::Bool => Some(1),
            ArgumentShape::UnsignedInt(width)
            | ArgumentShape::SignedInt(width)
            | ArgumentShape::Float(width) => Some(*width as usize / 8),
            ArgumentShape::Span { .. } | ArgumentShape::String { .. } => None,
        }
    }
    pub const fn is_scalar(&self) -> bool {
        self.size().is_some()
    }
}

impl core::fmt::Display for ArgumentShape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> StdResult<(), core::fmt::Error> {
        match self {
            ArgumentShape::Bool => write!(f, "bool"),
            ArgumentShape::UnsignedInt(width) => write!(f, "u{}", width),
            ArgumentShape::SignedInt(width) => write!(f, "i{}", width),
            ArgumentShape::Float(width) => write!(f, "f{}", width),
            ArgumentShape::Span {
                element,
                length: Length::Fixed(n),
            } => write!(f, "&[{}; {}]", element, n),
            ArgumentShape::Span {
                element,
                length: Length::Dynamic,
            } => write!(f, "&[{}]", element),
            ArgumentShape::String {
                element,
                length: Length::Fixed(n),
            } => write!(f, "Text<{}, {}>", element, n),
            ArgumentShape::String {
                element,
                length: Length::Dynamic,
            } => write!(f, "&str<{}>", element),
        }
    }
}

/// Compile-time mapping from a type to its [`ArgumentShape`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be logged",
    label = "no wire shape for `{Self}`",
    note = "loggable arguments are `bool`, integers of up to 64 bits, `f32`, `f64`, `&[T; N]` & \
            `&[T]` of those, `&str` and `Text`"
)]
pub trait Shape {
    const SHAPE: ArgumentShape;
}

const BYTE: ArgumentShape = ArgumentShape::UnsignedInt(8);

macro_rules! scalar_shapes {
    ($($t:ty => $shape:expr),* $(,)?) => {
        $(
            impl Shape for $t {
                const SHAPE: ArgumentShape = $shape;
            }
        )*
    };
}

scalar_shapes! {
    bool => ArgumentShape::Bool,
    u8 => ArgumentShape::UnsignedInt(8),
    u16 => ArgumentShape::UnsignedInt(16),
    u32 => ArgumentShape::UnsignedInt(32),
    u64 => ArgumentShape::UnsignedInt(64),
    usize => ArgumentShape::UnsignedInt(usize::BITS as u8),
    i8 => ArgumentShape::SignedInt(8),
    i16 => ArgumentShape::SignedInt(16),
    i32 => ArgumentShape::SignedInt(32),
    i64 => ArgumentShape::SignedInt(64),
    isize => ArgumentShape::SignedInt(isize::BITS as u8),
    f32 => ArgumentShape::Float(32),
    f64 => ArgumentShape::Float(64),
}

impl<T: Scalar, const N: usize> Shape for &[T; N] {
    const SHAPE: ArgumentShape = ArgumentShape::Span {
        element: &T::SHAPE,
        length: Length::Fixed(N),
    };
}

impl<T: Scalar> Shape for &[T] {
    const SHAPE: ArgumentShape = ArgumentShape::Span {
        element: &T::SHAPE,
        length: Length::Dynamic,
    };
}

impl Shape for &str {
    const SHAPE: ArgumentShape = ArgumentShape::String {
        element: &BYTE,
        length: Length::Dynamic,
    };
}

/// A text view whose length is part of its type.
///
/// `&str` carries its length at run time, so logging one costs a length word on the wire. When
/// the text is a fixed-size byte array (a name field, a tag in a protocol header), wrap it in a
/// [`Text`] and the length rides along in the call site's shape instead.
///
/// ```rust
/// use smolt::shape::{ArgumentShape, Length, Shape, Text};
/// let name = Text::new(b"motor");
/// assert_eq!(
///     <Text<'static, 5> as Shape>::SHAPE,
///     ArgumentShape::String { element: &ArgumentShape::UnsignedInt(8), length: Length::Fixed(5) }
/// );
/// assert_eq!(name.as_bytes(), b"motor");
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Text<'a, const N: usize>(&'a [u8; N]);

impl<'a, const N: usize> Text<'a, N> {
    pub const fn new(bytes: &'a [u8; N]) -> Text<'a, N> {
        Text(bytes)
    }
    pub const fn as_bytes(&self) -> &'a [u8; N] {
        self.0
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Text<'a, N> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Text(bytes)
    }
}

impl<const N: usize> Shape for Text<'_, N> {
    const SHAPE: ArgumentShape = ArgumentShape::String {
        element: &BYTE,
        length: Length::Fixed(N),
    };
}

#[cfg(test)]
mod test {

    use super::*;

    fn shape_of<T: Shape>(_: &T) -> ArgumentShape {
        T::SHAPE
    }

    #[test]
    fn scalars() {
        assert_eq!(shape_of(&true), ArgumentShape::Bool);
        assert_eq!(shape_of(&0u8), ArgumentShape::UnsignedInt(8));
        assert_eq!(shape_of(&0u16), ArgumentShape::UnsignedInt(16));
        assert_eq!(shape_of(&0u32), ArgumentShape::UnsignedInt(32));
        assert_eq!(shape_of(&0u64), ArgumentShape::UnsignedInt(64));
        assert_eq!(shape_of(&0i8), ArgumentShape::SignedInt(8));
        assert_eq!(shape_of(&0i16), ArgumentShape::SignedInt(16));
        assert_eq!(shape_of(&0i32), ArgumentShape::SignedInt(32));
        assert_eq!(shape_of(&0i64), ArgumentShape::SignedInt(64));
        assert_eq!(shape_of(&0f32), ArgumentShape::Float(32));
        assert_eq!(shape_of(&0f64), ArgumentShape::Float(64));
        assert_eq!(
            shape_of(&0usize),
            ArgumentShape::UnsignedInt(usize::BITS as u8)
        );
        assert_eq!(shape_of(&0isize), ArgumentShape::SignedInt(isize::BITS as u8));
    }

    #[test]
    fn views() {
        let fixed: &[u16; 3] = &[1, 2, 3];
        assert_eq!(
            shape_of(&fixed),
            ArgumentShape::Span {
                element: &ArgumentShape::UnsignedInt(16),
                length: Length::Fixed(3)
            }
        );

        let dynamic: &[u64] = &[1, 2, 3];
        assert_eq!(
            shape_of(&dynamic),
            ArgumentShape::Span {
                element: &ArgumentShape::UnsignedInt(64),
                length: Length::Dynamic
            }
        );

        assert_eq!(
            shape_of(&"abcde"),
            ArgumentShape::String {
                element: &ArgumentShape::UnsignedInt(8),
                length: Length::Dynamic
            }
        );
        assert_eq!(
            shape_of(&Text::new(b"abcde")),
            ArgumentShape::String {
                element: &ArgumentShape::UnsignedInt(8),
                length: Length::Fixed(5)
            }
        );
    }

    #[test]
    fn sizes_and_names() {
        assert_eq!(ArgumentShape::Bool.size(), Some(1));
        assert_eq!(ArgumentShape::SignedInt(16).size(), Some(2));
        assert_eq!(ArgumentShape::Float(64).size(), Some(8));
        assert!(!<&str as Shape>::SHAPE.is_scalar());

        assert_eq!(format!("{}", <&[f32; 2] as Shape>::SHAPE), "&[f32; 2]");
        assert_eq!(format!("{}", <&[i8] as Shape>::SHAPE), "&[i8]");
        assert_eq!(format!("{}", <&str as Shape>::SHAPE), "&str<u8>");
        assert_eq!(format!("{}", <Text<'static, 4> as Shape>::SHAPE), "Text<u8, 4>");
    }
}
