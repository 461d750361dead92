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

//! The logger facade.
//!
//! [`Logger`] ties a [`Transport`] to call-site tags: for each statement it checks whether the
//! transport is listening, serializes the arguments (last one first) & closes the record with the
//! statement's tag. Statements are usually written with the [`log!`](crate::log) macro, which
//! declares a fresh call-site [`Key`] on the spot.

use crate::ser::Arguments;
use crate::tag::{Key, Tag};
use crate::transport::Transport;

/// Structured, deferred-formatting logging over a [`Transport`].
///
/// The transport may be owned or borrowed (`Logger<&RingBuffer<N>>`), since every `&T` is itself a
/// [`Transport`].
#[derive(Debug, Default)]
pub struct Logger<T: Transport> {
    transport: T,
}

impl<T: Transport> Logger<T> {
    pub const fn new(transport: T) -> Logger<T> {
        Logger { transport }
    }
    pub fn transport(&self) -> &T {
        &self.transport
    }
    pub fn into_inner(self) -> T {
        self.transport
    }
    /// Log one record for call-site key `K`.
    ///
    /// If the transport reports itself disabled, nothing is written; `args` has already been
    /// evaluated by then, but none of it is serialized. Otherwise the record is written as a
    /// contiguous run of transport calls: the arguments' words in reverse declaration order, then
    /// the tag. Nothing here guards against a preempting caller interleaving its own record.
    #[inline]
    pub fn log<K: Key, A: Arguments>(&self, args: A) {
        if !self.transport.is_enabled() {
            return;
        }
        args.serialize_reversed(&self.transport);
        self.transport.write_tag(Tag::of::<K, A>().word());
    }
}

/// Log a statement.
///
/// ```rust
/// use smolt::{key, log, transport::Discard, Logger};
///
/// let logger = Logger::new(Discard);
///
/// // format text & arguments; the key includes this file, line & column
/// log!(logger, "x={}, y={}", 1u8, -2i64);
/// // location only
/// log!(logger);
/// // a named key without location: every statement using it shares one tag
/// key!(Heartbeat = "heartbeat {}");
/// log!(logger, Heartbeat, 17u32);
/// ```
///
/// Each argument must implement [`Shape`](crate::shape::Shape) &
/// [`Serialize`](crate::ser::Serialize); anything else is a compile-time error.
#[macro_export]
macro_rules! log {
    ($logger:expr, $format:literal $(, $arg:expr)* $(,)?) => {{
        #[allow(non_camel_case_types)]
        struct __smolt_call_site;
        impl $crate::tag::Key for __smolt_call_site {
            const FORMAT: &'static str = $format;
            const LOCATION: ::core::option::Option<$crate::tag::Location> =
                ::core::option::Option::Some($crate::tag::Location::new(
                    ::core::file!(),
                    ::core::line!(),
                    ::core::column!(),
                ));
        }
        $logger.log::<__smolt_call_site, _>(($($arg,)*))
    }};
    ($logger:expr, $key:path $(, $arg:expr)* $(,)?) => {{
        $logger.log::<$key, _>(($($arg,)*))
    }};
    ($logger:expr $(,)?) => {
        $crate::log!($logger, "")
    };
}

/// Declare a named call-site key without a location.
///
/// ```rust
/// smolt::key!(pub BootTime = "booted in {} ms");
/// ```
#[macro_export]
macro_rules! key {
    ($(#[$meta:meta])* $vis:vis $name:ident = $format:literal) => {
        $(#[$meta])*
        $vis struct $name;
        impl $crate::tag::Key for $name {
            const FORMAT: &'static str = $format;
        }
    };
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::ser::Serialize;
    use crate::shape::{Shape, Text};
    use crate::transport::testing::{FakeItm, Recorder, Written};
    use crate::transport::{Discard, Itm, RingBuffer};

    crate::key!(XEquals = "x={}");
    crate::key!(Bytes = "bytes: {}");

    #[test]
    fn scenario_a() {
        let logger = Logger::new(Discard);
        crate::log!(logger, "x={}", -5i32);
        crate::log!(logger, XEquals, -5i32);

        let rb = RingBuffer::<16>::new();
        let logger = Logger::new(&rb);
        crate::log!(logger, XEquals, -5i32);
        assert_eq!(rb.write_index(), 14);
        assert_eq!(rb.tag_index(), 14);
        assert_eq!(rb.word(15), 0xffff_fffb);
        assert_eq!(rb.word(14), Tag::of::<XEquals, (i32,)>().word());
        assert_eq!(rb.word(13), 0);

        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        crate::log!(logger, "x={}", -5i32);
        let writes = recorder.writes.borrow().clone();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], Written::Value(0xffff_fffb));
        assert!(matches!(writes[1], Written::Tag(tag) if tag != 0));
    }

    #[test]
    fn scenario_b() {
        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        let empty: &[u8] = &[];
        crate::log!(logger, Bytes, empty);
        assert_eq!(
            *recorder.writes.borrow(),
            vec![
                Written::Value(0),
                Written::Tag(Tag::of::<Bytes, (&[u8],)>().word())
            ]
        );
    }

    #[test]
    fn scenario_c() {
        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        crate::log!(logger, "name: {}", Text::new(b"abcde"));
        let writes = recorder.writes.borrow();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], Written::Value(0x65));
        assert_eq!(writes[1], Written::Value(0x6463_6261));
        assert!(matches!(writes[2], Written::Tag(_)));
    }

    #[test]
    fn scenario_d() {
        let recorder = Recorder::disabled();
        let logger = Logger::new(&recorder);
        crate::log!(logger, "{} {} {} {}", 1u8, 2u16, "three", 4.0f64);
        crate::log!(logger);
        assert!(recorder.writes.borrow().is_empty());
        assert_eq!(recorder.checks.get(), 2);

        recorder.enabled.set(true);
        crate::log!(logger, "{} {} {} {}", 1u8, 2u16, "three", 4.0f64);
        // 1 + 1 + (2 + 1) + 2 values, then the tag
        assert_eq!(recorder.words().len(), 8);
    }

    #[test]
    fn location_only() {
        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        crate::log!(logger);
        crate::log!(logger,);
        let writes = recorder.writes.borrow();
        assert_eq!(writes.len(), 2);
        match (writes[0], writes[1]) {
            (Written::Tag(a), Written::Tag(b)) => assert_ne!(a, b),
            other => panic!("expected two tags, got {:?}", other),
        }
    }

    #[test]
    fn one_tag_per_call_site() {
        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        for i in 0..3u32 {
            crate::log!(logger, "tick {}", i);
        }
        crate::log!(logger, "tick {}", 3u32);
        let tags: Vec<u32> = recorder
            .writes
            .borrow()
            .iter()
            .filter_map(|w| match w {
                Written::Tag(t) => Some(*t),
                Written::Value(_) => None,
            })
            .collect();
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0], tags[1]);
        assert_eq!(tags[1], tags[2]);
        // same text & types, different line
        assert_ne!(tags[2], tags[3]);
        assert_eq!(recorder.values(), vec![0, 1, 2, 3]);
    }

    fn report<T: Shape + Serialize>(logger: &Logger<&Recorder>, value: T) {
        crate::log!(logger, "value: {}", value);
    }

    #[test]
    fn types_are_part_of_the_key() {
        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        report(&logger, 1u8);
        report(&logger, 2u8);
        report(&logger, 3i64);
        let words = recorder.words();
        // [1, tag(u8), 2, tag(u8), 0, 3, tag(i64)]
        assert_eq!(words.len(), 7);
        assert_eq!(words[1], words[3]);
        assert_ne!(words[1], words[6]);
    }

    #[test]
    fn named_keys_merge() {
        let recorder = Recorder::new();
        let logger = Logger::new(&recorder);
        crate::log!(logger, XEquals, 1i32);
        crate::log!(logger, XEquals, 2i32);
        crate::log!(logger, XEquals, 3u32);
        let words = recorder.words();
        assert_eq!(words[1], Tag::of::<XEquals, (i32,)>().word());
        assert_eq!(words[1], words[3]);
        assert_eq!(words[5], Tag::of::<XEquals, (u32,)>().word());
        assert_ne!(words[3], words[5]);
    }

    #[test]
    fn over_itm() {
        let fake = FakeItm::new();
        fake.enable(24);
        fake.enable(25);
        let logger = Logger::new(unsafe { Itm::from_raw_parts(fake.block(), 24) });
        crate::log!(logger, XEquals, 7i32);
        assert_eq!(fake.stim(25), 7);
        assert_eq!(fake.stim(24), Tag::of::<XEquals, (i32,)>().word());

        let fake = FakeItm::new();
        let logger = Logger::new(unsafe { Itm::from_raw_parts(fake.block(), 24) });
        crate::log!(logger, XEquals, 7i32);
        assert!((0..=255).all(|port| fake.stim(port) == 1));
    }
}
