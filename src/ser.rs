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

//! Value serialization: turning arguments into 32-bit wire words.
//!
//! | type                         | words                   | encoding                              |
//! |------------------------------|-------------------------|---------------------------------------|
//! | `bool`, integers ≤ 32 bits   | 1                       | bit pattern, sign- or zero-extended   |
//! | `f32`                        | 1                       | IEEE-754 bits                         |
//! | 64-bit integers, `f64`       | 2                       | high word, then low word              |
//! | `&[T; N]`, [`Text`]          | ⌈N·size/4⌉              | packed little-endian bytes            |
//! | `&[T]`, `&str`               | ⌈N·size/4⌉ + 1          | as above, then the element count      |
//!
//! Span data words go out from the highest-offset chunk down to the lowest; the last, partial
//! chunk (if any) is zero-padded & sent first. Combined with [`Arguments`] serializing in reverse
//! declaration order, a record read back-to-front (which is how a [`RingBuffer`] stores it) comes
//! out in natural order: tag, first argument, second argument, ... with each span's length ahead
//! of its data & each 64-bit value low word first.
//!
//! [`RingBuffer`]: crate::transport::RingBuffer

use crate::shape::{ArgumentShape, Shape, Text};
use crate::transport::Transport;

/// A value that can be written to a [`Transport`] as a sequence of words.
pub trait Serialize {
    fn serialize<T: Transport + ?Sized>(&self, transport: &T);
}

/// Types that may appear as elements of a span: fixed-size values with a little-endian byte
/// representation.
pub trait Scalar: Shape + Copy {
    /// Size in bytes
    const SIZE: usize;
    /// Byte `index` of the little-endian representation; `index < SIZE`
    fn le_byte(self, index: usize) -> u8;
}

macro_rules! narrow {
    ($($t:ty),*) => {
        $(
            impl Serialize for $t {
                #[inline]
                fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
                    transport.write_value(*self as u32);
                }
            }
        )*
    };
}

narrow!(bool, u8, u16, u32, i8, i16, i32);

#[inline]
fn write_u64<T: Transport + ?Sized>(transport: &T, bits: u64) {
    transport.write_value((bits >> 32) as u32);
    transport.write_value(bits as u32);
}

impl Serialize for u64 {
    #[inline]
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_u64(transport, *self)
    }
}

impl Serialize for i64 {
    #[inline]
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_u64(transport, *self as u64)
    }
}

impl Serialize for usize {
    #[inline]
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        if usize::BITS > 32 {
            write_u64(transport, *self as u64)
        } else {
            transport.write_value(*self as u32)
        }
    }
}

impl Serialize for isize {
    #[inline]
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        if isize::BITS > 32 {
            write_u64(transport, *self as u64)
        } else {
            transport.write_value(*self as u32)
        }
    }
}

impl Serialize for f32 {
    #[inline]
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        transport.write_value(self.to_bits())
    }
}

impl Serialize for f64 {
    #[inline]
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_u64(transport, self.to_bits())
    }
}

impl Scalar for bool {
    const SIZE: usize = 1;
    fn le_byte(self, _index: usize) -> u8 {
        self as u8
    }
}

macro_rules! scalar {
    ($($t:ty),*) => {
        $(
            impl Scalar for $t {
                const SIZE: usize = core::mem::size_of::<$t>();
                #[inline]
                fn le_byte(self, index: usize) -> u8 {
                    self.to_le_bytes()[index]
                }
            }
        )*
    };
}

scalar!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

/// Write the data words of a span: highest-offset chunk first, zero padding in the unused tail
/// bytes of the last chunk.
fn write_span<T: Transport + ?Sized, S: Scalar>(transport: &T, items: &[S]) {
    let len = items.len() * S::SIZE;
    for chunk in (0..len.div_ceil(4)).rev() {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let offset = chunk * 4 + i;
            if offset < len {
                *byte = items[offset / S::SIZE].le_byte(offset % S::SIZE);
            }
        }
        transport.write_value(u32::from_le_bytes(bytes));
    }
}

impl<S: Scalar, const N: usize> Serialize for &[S; N] {
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_span(transport, self.as_slice())
    }
}

impl<S: Scalar> Serialize for &[S] {
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_span(transport, self);
        transport.write_value(self.len() as u32);
    }
}

impl Serialize for &str {
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_span(transport, self.as_bytes());
        transport.write_value(self.len() as u32);
    }
}

impl<const N: usize> Serialize for Text<'_, N> {
    fn serialize<T: Transport + ?Sized>(&self, transport: &T) {
        write_span(transport, self.as_bytes().as_slice())
    }
}

/// The argument list of one logging statement: a tuple of up to twelve loggable values.
pub trait Arguments {
    /// The members' shapes, in declaration order
    const SHAPES: &'static [ArgumentShape];
    /// Serialize the members, last one first.
    fn serialize_reversed<T: Transport + ?Sized>(&self, transport: &T);
}

impl Arguments for () {
    const SHAPES: &'static [ArgumentShape] = &[];
    #[inline]
    fn serialize_reversed<T: Transport + ?Sized>(&self, _transport: &T) {}
}

// The second list is the first list's indices, reversed.
macro_rules! arguments {
    ($($ty:ident $idx:tt),+ ; $($rev:tt)+) => {
        impl<$($ty: Shape + Serialize),+> Arguments for ($($ty,)+) {
            const SHAPES: &'static [ArgumentShape] = &[$(<$ty as Shape>::SHAPE),+];
            #[inline]
            fn serialize_reversed<T: Transport + ?Sized>(&self, transport: &T) {
                $(self.$rev.serialize(transport);)+
            }
        }
    };
}

arguments!(A0 0; 0);
arguments!(A0 0, A1 1; 1 0);
arguments!(A0 0, A1 1, A2 2; 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3; 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4; 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5; 5 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6; 6 5 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7; 7 6 5 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7, A8 8; 8 7 6 5 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7, A8 8, A9 9; 9 8 7 6 5 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7, A8 8, A9 9, A10 10;
           10 9 8 7 6 5 4 3 2 1 0);
arguments!(A0 0, A1 1, A2 2, A3 3, A4 4, A5 5, A6 6, A7 7, A8 8, A9 9, A10 10, A11 11;
           11 10 9 8 7 6 5 4 3 2 1 0);
