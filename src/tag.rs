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

//! Call-site keys & the tags minted from them.
//!
//! # Introduction
//!
//! Each logging statement is identified on the wire by a single word: its [`Tag`]. Nothing about
//! the statement (format text, source location, argument types) is transmitted; all of it lives
//! in a [`CallSite`] record in the target image, and the tag is simply that record's address.
//!
//! The record is built entirely at compile time. A call site's identity is the pair of
//!
//! 1. a [`Key`]: a (usually zero-sized) type carrying the format text & optional [`Location`] as
//!    associated constants
//!
//! 2. an argument tuple type implementing [`Arguments`], which contributes its
//!    [shapes](crate::shape::ArgumentShape)
//!
//! and the record for a given `(K, A)` is an associated constant of a private generic type. The
//! compiler instantiates it only for pairs that are actually logged, so dead call sites cost
//! nothing, and it instantiates it once per pair, so every use of the same key with the same
//! argument types, however often it is inlined, shares one tag.
//!
//! # Uniqueness
//!
//! Two different keys produce records with different contents (different text, location or
//! shapes), and two live objects with different contents cannot share an address: distinct keys
//! always map to distinct tags. Identical keys share one tag within a crate; across codegen units
//! the compiler is free to duplicate a constant, which is why the release profile of a firmware
//! image should use a single codegen unit. A duplicated record is still a complete, correct
//! decode-table entry.
//!
//! # Decode tables
//!
//! [`CallSite`] is `#[repr(C)]` and self-describing. Off-target tooling builds the decode table
//! by reading the record at each tag address; [`crate::decode::DecodeTable`] does the same thing
//! in-process for host tests.

use crate::ser::Arguments;
use crate::shape::ArgumentShape;

use core::marker::PhantomData;

type StdResult<T, E> = core::result::Result<T, E>;

/// A source location: file, line & column of the logging statement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Location {
    file: &'static str,
    line: u32,
    column: u32,
}

impl Location {
    pub const fn new(file: &'static str, line: u32, column: u32) -> Location {
        Location { file, line, column }
    }
    pub const fn file(&self) -> &'static str {
        self.file
    }
    pub const fn line(&self) -> u32 {
        self.line
    }
    pub const fn column(&self) -> u32 {
        self.column
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> StdResult<(), core::fmt::Error> {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The compile-time half of a call-site key.
///
/// Implemented by the zero-sized types that [`log!`](crate::log) declares at each call site, and
/// by the named keys declared with [`key!`](crate::key). Leaving [`Key::LOCATION`] at `None` makes
/// every statement that uses the key (with the same argument types) share one tag.
pub trait Key {
    /// The format text, with `{}` placeholders
    const FORMAT: &'static str;
    /// Where the statement lives, if that's part of its identity
    const LOCATION: Option<Location> = None;
}

/// Everything a decoder needs to know about one logging statement.
#[derive(Debug, PartialEq, Eq)]
#[repr(C)]
pub struct CallSite {
    format: &'static str,
    location: Option<Location>,
    shapes: &'static [ArgumentShape],
}

impl CallSite {
    pub const fn format(&self) -> &'static str {
        self.format
    }
    pub const fn location(&self) -> Option<Location> {
        self.location
    }
    /// The argument shapes, in declaration order
    pub const fn shapes(&self) -> &'static [ArgumentShape] {
        self.shapes
    }
}

impl core::fmt::Display for CallSite {
    // Mirrors the listing format of the tag-extraction tooling: `file:line "format", shapes`
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> StdResult<(), core::fmt::Error> {
        if let Some(location) = &self.location {
            write!(f, "{} ", location)?;
        }
        write!(f, "\"{}\"", self.format)?;
        for shape in self.shapes {
            write!(f, ", {}", shape)?;
        }
        Ok(())
    }
}

// The build-time entity for one `(K, A)` pair.
struct Entity<K, A>(PhantomData<fn() -> (K, A)>);

impl<K: Key, A: Arguments> Entity<K, A> {
    const CALLSITE: &'static CallSite = &CallSite {
        format: K::FORMAT,
        location: K::LOCATION,
        shapes: A::SHAPES,
    };
}

/// Build-unique identifier of a call site.
///
/// A [`Tag`] is a reference to the call site's [`CallSite`] record; on the wire it travels as
/// [`Tag::word`]. Tags are only meaningful together with the build that minted them.
#[derive(Copy, Clone, Debug)]
pub struct Tag {
    site: &'static CallSite,
}

impl Tag {
    /// Mint the tag for key `K` logged with arguments of type `A`.
    ///
    /// Kept out of line so that every statement in a crate that names the same `(K, A)` reads the
    /// same copy of the record.
    #[inline(never)]
    pub fn of<K: Key, A: Arguments>() -> Tag {
        Tag {
            site: Entity::<K, A>::CALLSITE,
        }
    }
    /// The pointer-width value of this tag
    pub fn addr(&self) -> usize {
        self.site as *const CallSite as usize
    }
    /// The wire representation of this tag. Targets are 32-bit, so this is the address itself;
    /// on wider hosts it is the low word, which is unique within any one image smaller than 4GiB.
    pub fn word(&self) -> u32 {
        self.addr() as u32
    }
    pub fn callsite(&self) -> &'static CallSite {
        self.site
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.site, other.site)
    }
}

impl Eq for Tag {}

impl core::hash::Hash for Tag {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::shape::Text;

    crate::key!(Started = "started in {} ms");
    crate::key!(Stopped = "stopped in {} ms");
    crate::key!(Empty = "");

    struct HereA;
    impl Key for HereA {
        const FORMAT: &'static str = "x={}";
        const LOCATION: Option<Location> = Some(Location::new("main.rs", 10, 5));
    }
    struct HereB;
    impl Key for HereB {
        const FORMAT: &'static str = "x={}";
        const LOCATION: Option<Location> = Some(Location::new("main.rs", 11, 5));
    }

    #[test]
    fn distinct_keys() {
        // format text
        assert_ne!(
            Tag::of::<Started, (u32,)>(),
            Tag::of::<Stopped, (u32,)>()
        );
        // argument shapes
        assert_ne!(Tag::of::<Started, (u32,)>(), Tag::of::<Started, (i32,)>());
        assert_ne!(Tag::of::<Started, (u32,)>(), Tag::of::<Started, (u64,)>());
        assert_ne!(Tag::of::<Started, (u32,)>(), Tag::of::<Started, (u32, u32)>());
        assert_ne!(
            Tag::of::<Started, (Text<'static, 4>,)>(),
            Tag::of::<Started, (Text<'static, 5>,)>()
        );
        // location only
        assert_ne!(Tag::of::<HereA, (i32,)>(), Tag::of::<HereB, (i32,)>());
        assert_ne!(
            Tag::of::<HereA, (i32,)>().word(),
            Tag::of::<HereB, (i32,)>().word()
        );
    }

    fn started_elsewhere() -> Tag {
        Tag::of::<Started, (u32,)>()
    }

    #[test]
    fn identical_keys() {
        let a = Tag::of::<Started, (u32,)>();
        let b = started_elsewhere();
        assert_eq!(a, b);
        assert_eq!(a.word(), b.word());
        // lifetimes are not part of the key
        fn borrowed<'a>(_: &'a str) -> Tag {
            Tag::of::<Started, (&'a str,)>()
        }
        let owned = std::string::String::from("temporary");
        assert_eq!(borrowed(&owned), Tag::of::<Started, (&'static str,)>());
    }

    #[test]
    fn records() {
        let tag = Tag::of::<HereA, (i32, &'static [u8])>();
        let site = tag.callsite();
        assert_eq!(site.format(), "x={}");
        assert_eq!(site.location(), Some(Location::new("main.rs", 10, 5)));
        assert_eq!(
            site.shapes(),
            &[
                ArgumentShape::SignedInt(32),
                ArgumentShape::Span {
                    element: &ArgumentShape::UnsignedInt(8),
                    length: crate::shape::Length::Dynamic,
                }
            ]
        );
        assert_eq!(format!("{}", site), "main.rs:10 \"x={}\", i32, &[u8]");

        let empty = Tag::of::<Empty, ()>();
        assert_eq!(empty.callsite().shapes().len(), 0);
        assert_eq!(empty.callsite().location(), None);
        assert_eq!(format!("{}", empty.callsite()), "\"\"");

        // records are word-aligned so that tags never collide in their low bits
        assert_eq!(tag.addr() % core::mem::align_of::<CallSite>(), 0);
    }
}
