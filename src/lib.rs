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
//! Deferred-formatting binary logging for resource-constrained targets.
//!
//! # Introduction
//!
//! Formatting log messages on a microcontroller is expensive: the formatting machinery costs
//! flash, the formatted text costs bandwidth on whatever link carries it off the chip, and the
//! time spent doing both is time the firmware isn't spending on its actual job. [`smolt`](crate)
//! defers all of that to the host. A logging statement writes only a compact sequence of 32-bit
//! words: its raw argument values, followed by a *tag* identifying the statement. The format
//! text, source location & argument types never leave the build; they sit in a read-only record
//! whose address *is* the tag, so a host-side tool with access to the firmware image can turn
//! the words back into text.
//!
//! The pieces are:
//!
//! - [`shape`]: the compile-time type signature of each loggable argument type; anything
//!   without a [`Shape`](shape::Shape) simply can't be logged
//! - [`tag`]: call-site keys & the [`Tag`]s minted from them
//! - [`ser`]: how each value is laid out as words
//! - [`transport`]: where the words go; [`Discard`](transport::Discard), the Cortex-M
//!   [`Itm`](transport::Itm) and an in-RAM [`RingBuffer`](transport::RingBuffer) are provided
//! - [`logger`]: the [`Logger`] facade & the [`log!`] macro
//!
//! With the `std` feature (on by default) two host-side modules join them: [`decode`], which
//! reassembles records into messages given a table of tags, and [`error`].
//!
//! # Usage
//!
//! ```rust
//! use smolt::{log, transport::RingBuffer, Logger};
//!
//! static LOG_BUF: RingBuffer<256> = RingBuffer::new();
//! static LOGGER: Logger<&RingBuffer<256>> = Logger::new(&LOG_BUF);
//!
//! let celsius = -4i16;
//! log!(LOGGER, "temperature is {} C, fan {}", celsius, true);
//! ```
//!
//! The buffer now holds three words: the tag, `0xffff_fffc` and `1`. Nothing was formatted.
//!
//! Arguments whose type can't be logged are rejected when the firmware is built:
//!
//! ```compile_fail
//! use smolt::{log, transport::Discard, Logger};
//!
//! let logger = Logger::new(Discard);
//! log!(logger, "{}", String::from("no owned strings"));
//! ```
//!
//! # Build configuration
//!
//! Every logging statement declares its own key type, and each key is instantiated once per
//! crate. For keys shared between crates (see [`key!`]) to land on a single tag, build release
//! images with `codegen-units = 1` & `lto = true`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "std")]
pub mod decode;
#[cfg(feature = "std")]
pub mod error;
pub mod logger;
pub mod ser;
pub mod shape;
pub mod tag;
pub mod transport;

pub use logger::Logger;
pub use tag::{CallSite, Key, Location, Tag};
