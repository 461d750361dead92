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

//! Host-side reassembly of records into messages.
//!
//! Building a decode table from a firmware image's debug metadata is the job of external tooling.
//! This module covers the other half: given a table, turn wire words back into [`Message`]s. It is
//! what host tests & simulators use, registering the [`Tag`]s they care about in-process.
//!
//! Words arrive in one of two orders:
//!
//! - *drain order*, as read upward out of a [`RingBuffer`](crate::transport::RingBuffer): each
//!   record's tag first, then its arguments in declaration order. See
//!   [`DecodeTable::decode_drained`] & [`ring_image`].
//!
//! - *emission order*, as sent over a streaming transport such as the ITM: argument words
//!   (last argument first), then the tag. See [`Assembler`].
//!
//! ```rust
//! use smolt::{decode::DecodeTable, key, log, tag::Tag, transport::RingBuffer, Logger};
//!
//! key!(Reading = "sensor {} read {}");
//!
//! let rb = RingBuffer::<64>::new();
//! let logger = Logger::new(&rb);
//! log!(logger, Reading, 3u8, -40i16);
//!
//! let mut table = DecodeTable::new();
//! table.register(Tag::of::<Reading, (u8, i16)>());
//! let messages = table.decode_drained(&rb.drain().collect::<Vec<_>>());
//! assert_eq!(messages[0].to_string(), "sensor 3 read -40");
//! ```

use crate::error::{Error, Result};
use crate::shape::{ArgumentShape, Length};
use crate::tag::{CallSite, Location, Tag};
use crate::transport::drain_order;

use backtrace::Backtrace;
use bytes::Buf;
use chrono::prelude::*;
use tracing::{debug, warn};

use std::collections::HashMap;
use std::fmt::Write;

type StdResult<T, E> = std::result::Result<T, E>;

/// One decoded argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    F32(f32),
    F64(f64),
    List(Vec<Value>),
    Text(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Display,
    Debug,
    LowerHex,
    UpperHex,
    Octal,
    Binary,
    LowerExp,
    UpperExp,
}

/// A parsed placeholder: `{}` or `{:[[fill]align][+][#][0][width][.precision][type]}`, where
/// type is one of `?`, `x`, `X`, `o`, `b`, `e` or `E`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Conversion {
    fill: char,
    align: Option<Align>,
    plus: bool,
    alternate: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
    kind: Kind,
}

// sign, radix prefix, digits & whether the value is numeric
type Pieces = (&'static str, &'static str, String, bool);

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '^' => Some(Align::Center),
        '>' => Some(Align::Right),
        _ => None,
    }
}

fn digits(text: &str) -> (Option<usize>, &str) {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    (text[..end].parse().ok(), &text[end..])
}

impl Conversion {
    /// Parse the text between a placeholder's braces
    fn parse(text: &str) -> Option<Conversion> {
        let mut rest = match text.strip_prefix(':') {
            Some(spec) => spec,
            None if text.is_empty() => "",
            None => return None,
        };
        let mut conversion = Conversion {
            fill: ' ',
            align: None,
            plus: false,
            alternate: false,
            zero: false,
            width: None,
            precision: None,
            kind: Kind::Display,
        };
        let mut chars = rest.chars();
        match (chars.next(), chars.next().and_then(align_of)) {
            (Some(fill), Some(align)) => {
                conversion.fill = fill;
                conversion.align = Some(align);
                rest = &rest[fill.len_utf8() + 1..];
            }
            (Some(c), None) if align_of(c).is_some() => {
                conversion.align = align_of(c);
                rest = &rest[1..];
            }
            _ => (),
        }
        if let Some(r) = rest.strip_prefix('+') {
            conversion.plus = true;
            rest = r;
        }
        if let Some(r) = rest.strip_prefix('#') {
            conversion.alternate = true;
            rest = r;
        }
        if let Some(r) = rest.strip_prefix('0') {
            conversion.zero = true;
            rest = r;
        }
        let (width, r) = digits(rest);
        conversion.width = width;
        rest = r;
        if let Some(r) = rest.strip_prefix('.') {
            let (precision, r) = digits(r);
            conversion.precision = Some(precision?);
            rest = r;
        }
        conversion.kind = match rest {
            "" => Kind::Display,
            "?" => Kind::Debug,
            "x" => Kind::LowerHex,
            "X" => Kind::UpperHex,
            "o" => Kind::Octal,
            "b" => Kind::Binary,
            "e" => Kind::LowerExp,
            "E" => Kind::UpperExp,
            _ => return None,
        };
        Some(conversion)
    }

    /// Render `value`, or `None` if this conversion doesn't apply to it. Lists apply the
    /// conversion to each element.
    fn apply(&self, value: &Value) -> Option<String> {
        if let Value::List(items) = value {
            let items = items
                .iter()
                .map(|item| self.apply(item))
                .collect::<Option<Vec<_>>>()?;
            return Some(format!("[{}]", items.join(", ")));
        }
        let (sign, prefix, body, numeric) = match value {
            Value::Unsigned(x) => self.integer(false, *x)?,
            Value::Signed(x) => self.integer(*x < 0, x.unsigned_abs())?,
            Value::F32(x) => (self.sign(x.is_sign_negative()), "", self.real(x.abs())?, true),
            Value::F64(x) => (self.sign(x.is_sign_negative()), "", self.real(x.abs())?, true),
            Value::Bool(x) => ("", "", self.text(&x.to_string(), x)?, false),
            Value::Text(x) => ("", "", self.text(x, x)?, false),
            Value::List(_) => return None,
        };
        let len = sign.len() + prefix.len() + body.chars().count();
        let pad = self.width.unwrap_or(0).saturating_sub(len);
        let fill = |n: usize| std::iter::repeat(self.fill).take(n).collect::<String>();
        if self.zero && numeric {
            return Some(format!("{}{}{}{}", sign, prefix, "0".repeat(pad), body));
        }
        let default = if numeric { Align::Right } else { Align::Left };
        let (before, after) = match self.align.unwrap_or(default) {
            Align::Left => (0, pad),
            Align::Center => (pad / 2, pad - pad / 2),
            Align::Right => (pad, 0),
        };
        Some(format!("{}{}{}{}{}", fill(before), sign, prefix, body, fill(after)))
    }

    fn sign(&self, negative: bool) -> &'static str {
        match (negative, self.plus) {
            (true, _) => "-",
            (false, true) => "+",
            (false, false) => "",
        }
    }

    // Negative values print as a minus sign & their magnitude, in every radix.
    fn integer(&self, negative: bool, magnitude: u64) -> Option<Pieces> {
        let (prefix, body) = match self.kind {
            Kind::LowerHex => ("0x", format!("{:x}", magnitude)),
            Kind::UpperHex => ("0x", format!("{:X}", magnitude)),
            Kind::Octal => ("0o", format!("{:o}", magnitude)),
            Kind::Binary => ("0b", format!("{:b}", magnitude)),
            _ => ("", self.real(magnitude)?),
        };
        let prefix = if self.alternate { prefix } else { "" };
        Some((self.sign(negative), prefix, body, true))
    }

    fn real<T>(&self, magnitude: T) -> Option<String>
    where
        T: std::fmt::Display + std::fmt::Debug + std::fmt::LowerExp + std::fmt::UpperExp,
    {
        Some(match (self.kind, self.precision) {
            (Kind::Display, None) => format!("{}", magnitude),
            (Kind::Display, Some(p)) => format!("{:.*}", p, magnitude),
            (Kind::Debug, None) => format!("{:?}", magnitude),
            (Kind::Debug, Some(p)) => format!("{:.*?}", p, magnitude),
            (Kind::LowerExp, None) => format!("{:e}", magnitude),
            (Kind::LowerExp, Some(p)) => format!("{:.*e}", p, magnitude),
            (Kind::UpperExp, None) => format!("{:E}", magnitude),
            (Kind::UpperExp, Some(p)) => format!("{:.*E}", p, magnitude),
            _ => return None,
        })
    }

    fn text<T: std::fmt::Debug + ?Sized>(&self, text: &str, value: &T) -> Option<String> {
        match self.kind {
            Kind::Display => Some(match self.precision {
                Some(p) => text.chars().take(p).collect(),
                None => text.to_string(),
            }),
            Kind::Debug => Some(format!("{:?}", value)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        match self {
            Value::Bool(x) => write!(f, "{}", x),
            Value::Unsigned(x) => write!(f, "{}", x),
            Value::Signed(x) => write!(f, "{}", x),
            Value::F32(x) => write!(f, "{}", x),
            Value::F64(x) => write!(f, "{}", x),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Text(text) => write!(f, "{}", text),
        }
    }
}

/// A decoded record: the call site it came from, and its arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    site: &'static CallSite,
    args: Vec<Value>,
}

impl Message {
    pub fn site(&self) -> &'static CallSite {
        self.site
    }
    pub fn args(&self) -> &[Value] {
        &self.args
    }
    pub fn location(&self) -> Option<Location> {
        self.site.location()
    }
    /// The message text, or an error naming the first placeholder that couldn't be rendered.
    ///
    /// Each placeholder takes the next argument: `{}` as-is, `{:...}` per its format spec (fill,
    /// alignment, `+`, `#`, `0`, width, precision & one of `?`, `x`, `X`, `o`, `b`, `e`, `E`).
    /// `{{` & `}}` are literal braces. The [`Display`](std::fmt::Display) impl renders the same
    /// text, but copies any placeholder it can't render through unchanged.
    pub fn text(&self) -> Result<String> {
        match self.interpolate() {
            (text, None) => Ok(text),
            (_, Some(placeholder)) => Err(Error::BadPlaceholder {
                format: self.site.format(),
                placeholder,
                back: Backtrace::new(),
            }),
        }
    }
    /// Forward this message to whatever `tracing` subscriber is installed, as an INFO event with
    /// target `smolt`. A message whose text can't be fully rendered is preceded by a warning.
    pub fn emit(&self) {
        if let Err(err) = self.text() {
            warn!("{}", err);
        }
        match self.site.location() {
            Some(location) => tracing::info!(
                target: "smolt",
                file = location.file(),
                line = location.line(),
                "{}",
                self
            ),
            None => tracing::info!(target: "smolt", "{}", self),
        }
    }

    // The text, plus the first placeholder that had to be copied through
    fn interpolate(&self) -> (String, Option<String>) {
        let mut text = String::new();
        let mut bad = None;
        let mut args = self.args.iter();
        let mut chars = self.site.format().chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    let placeholder = if closed {
                        format!("{{{}}}", inner)
                    } else {
                        format!("{{{}", inner)
                    };
                    let rendered = match (closed, args.next()) {
                        (true, Some(arg)) => {
                            Conversion::parse(&inner).and_then(|conversion| conversion.apply(arg))
                        }
                        _ => None,
                    };
                    match rendered {
                        Some(rendered) => text.push_str(&rendered),
                        None => {
                            text.push_str(&placeholder);
                            bad.get_or_insert(placeholder);
                        }
                    }
                }
                c => text.push(c),
            }
        }
        (text, bad)
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> StdResult<(), std::fmt::Error> {
        f.write_str(&self.interpolate().0)
    }
}

// A cursor over one record's words, in drain order.
struct Words<'a> {
    tag: u32,
    words: &'a [u32],
    pos: usize,
}

impl<'a> Words<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u32]> {
        let available = self.words.len() - self.pos;
        if count > available {
            return Err(Error::Truncated {
                tag: self.tag,
                needed: self.pos + count,
                available: self.words.len(),
                back: Backtrace::new(),
            });
        }
        let taken = &self.words[self.pos..self.pos + count];
        self.pos += count;
        Ok(taken)
    }
    fn next(&mut self) -> Result<u32> {
        Ok(self.take(1)?[0])
    }
    // A span's bytes: the length word (if it's not part of the type), then the data words in
    // little-endian order.
    fn bytes(&mut self, size: usize, length: Length) -> Result<Vec<u8>> {
        let count = match length {
            Length::Fixed(n) => n,
            Length::Dynamic => self.next()? as usize,
        };
        let len = count * size;
        let mut bytes: Vec<u8> = self
            .take(len.div_ceil(4))?
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        bytes.truncate(len);
        Ok(bytes)
    }
}

fn unsupported(shape: &ArgumentShape) -> Error {
    Error::UnsupportedShape {
        shape: *shape,
        back: Backtrace::new(),
    }
}

// Interpret the low bits of `bits` as a value of scalar `shape`.
fn scalar(shape: &ArgumentShape, bits: u64) -> Option<Value> {
    match *shape {
        ArgumentShape::Bool => Some(Value::Bool(bits != 0)),
        ArgumentShape::UnsignedInt(width @ 1..=64) => Some(Value::Unsigned(if width == 64 {
            bits
        } else {
            bits & ((1u64 << width) - 1)
        })),
        ArgumentShape::SignedInt(width @ 1..=64) => {
            let shift = 64 - width as u32;
            Some(Value::Signed(((bits << shift) as i64) >> shift))
        }
        ArgumentShape::Float(32) => Some(Value::F32(f32::from_bits(bits as u32))),
        ArgumentShape::Float(64) => Some(Value::F64(f64::from_bits(bits))),
        _ => None,
    }
}

fn decode_value(shape: &ArgumentShape, words: &mut Words<'_>) -> Result<Value> {
    match shape {
        ArgumentShape::Span { element, length } => {
            let size = element
                .size()
                .filter(|size| *size > 0)
                .ok_or_else(|| unsupported(shape))?;
            let items = words
                .bytes(size, *length)?
                .chunks(size)
                .map(|chunk| {
                    let bits = chunk
                        .iter()
                        .rev()
                        .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);
                    scalar(element, bits).ok_or_else(|| unsupported(shape))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(items))
        }
        ArgumentShape::String { element, length } => {
            if element.size() != Some(1) {
                return Err(unsupported(shape));
            }
            let bytes = words.bytes(1, *length)?;
            Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
        scalar_shape => {
            let bits = match scalar_shape.size() {
                Some(size) if size > 4 => {
                    let pair = words.take(2)?;
                    ((pair[1] as u64) << 32) | pair[0] as u64
                }
                _ => words.next()? as u64,
            };
            scalar(scalar_shape, bits).ok_or_else(|| unsupported(scalar_shape))
        }
    }
}

/// Map from tag word to call site.
#[derive(Clone, Debug, Default)]
pub struct DecodeTable {
    sites: HashMap<u32, &'static CallSite>,
}

impl DecodeTable {
    pub fn new() -> DecodeTable {
        DecodeTable::default()
    }
    pub fn register(&mut self, tag: Tag) {
        self.sites.insert(tag.word(), tag.callsite());
    }
    pub fn get(&self, tag: u32) -> Option<&'static CallSite> {
        self.sites.get(&tag).copied()
    }
    pub fn len(&self) -> usize {
        self.sites.len()
    }
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (u32, &'static CallSite)> + '_ {
        self.sites.iter().map(|(tag, site)| (*tag, *site))
    }
    /// Reassemble the record closed by `tag` from `words`, which hold its arguments in drain
    /// order (possibly followed by older data). Returns the message & the number of words used.
    pub fn decode(&self, tag: u32, words: &[u32]) -> Result<(Message, usize)> {
        let site = self.get(tag).ok_or_else(|| Error::UnknownTag {
            tag,
            back: Backtrace::new(),
        })?;
        let mut cursor = Words { tag, words, pos: 0 };
        let args = site
            .shapes()
            .iter()
            .map(|shape| decode_value(shape, &mut cursor))
            .collect::<Result<Vec<_>>>()?;
        Ok((Message { site, args }, cursor.pos))
    }
    /// Decode a ring buffer's contents, as returned by
    /// [`RingBuffer::drain`](crate::transport::RingBuffer::drain) or [`ring_image`].
    ///
    /// Walks records newest-first & stops at the first word that was never written (zero), at an
    /// unknown tag, or at a record whose older words have been overwritten. Only an unknown tag
    /// in place of the newest record is worth a warning. Returns the messages oldest first.
    pub fn decode_drained(&self, words: &[u32]) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut pos = 0;
        while pos < words.len() && words[pos] != 0 {
            match self.decode(words[pos], &words[pos + 1..]) {
                Ok((message, used)) => {
                    messages.push(message);
                    pos += 1 + used;
                }
                // Once the ring has wrapped, the oldest record is usually cut short: either it
                // runs out of words, or a leftover argument word turns up where a tag should be.
                Err(err @ Error::Truncated { .. }) => {
                    debug!("oldest record at word {} was overwritten: {}", pos, err);
                    break;
                }
                Err(err @ Error::UnknownTag { .. }) if !messages.is_empty() => {
                    debug!("oldest record at word {} was overwritten: {}", pos, err);
                    break;
                }
                Err(err) => {
                    warn!("stopped decoding at word {}: {}", pos, err);
                    break;
                }
            }
        }
        messages.reverse();
        messages
    }
}

impl Extend<Tag> for DecodeTable {
    fn extend<I: IntoIterator<Item = Tag>>(&mut self, iter: I) {
        for tag in iter {
            self.register(tag);
        }
    }
}

impl FromIterator<Tag> for DecodeTable {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut table = DecodeTable::new();
        table.extend(iter);
        table
    }
}

/// Turn a raw ring-buffer image (the buffer's words as little-endian bytes, e.g. read off the
/// target by a debugger) plus its two cursors into drain-ordered words.
pub fn ring_image<B: Buf>(mut image: B, write_idx: usize, tag_idx: usize) -> Result<Vec<u32>> {
    let len = image.remaining();
    let depth = len / 4;
    if len % 4 != 0 || depth == 0 || write_idx >= depth || tag_idx >= depth {
        return Err(Error::BadImage {
            len,
            write_idx,
            tag_idx,
            back: Backtrace::new(),
        });
    }
    let mut data = Vec::with_capacity(depth);
    while image.has_remaining() {
        data.push(image.get_u32_le());
    }
    Ok(drain_order(depth, write_idx, tag_idx)
        .map(|index| data[index])
        .collect())
}

/// A word from a streaming transport, tagged with its role.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Word {
    Value(u32),
    Tag(u32),
}

impl Word {
    /// Classify a word received on ITM stimulus port `port`, given the tag `channel` the target
    /// was configured with. Words from unrelated ports yield `None`.
    pub fn from_itm_port(channel: u8, port: u8, word: u32) -> Option<Word> {
        if port == channel {
            Some(Word::Tag(word))
        } else if Some(port) == channel.checked_add(1) {
            Some(Word::Value(word))
        } else {
            None
        }
    }
}

/// Reassembles records from a stream of words in emission order.
///
/// Value words are buffered until a tag arrives; every tag closes exactly one record. Words left
/// over ahead of a record (the remains of a record cut short by preemption or by the transport
/// being disabled) are dropped.
#[derive(Debug)]
pub struct Assembler<'t> {
    table: &'t DecodeTable,
    pending: Vec<u32>,
}

impl<'t> Assembler<'t> {
    pub fn new(table: &'t DecodeTable) -> Assembler<'t> {
        Assembler {
            table,
            pending: Vec::new(),
        }
    }
    /// Value words received since the last tag
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
    /// Feed one word; returns the message when `word` completes a record. On error the buffered
    /// words are dropped all the same.
    pub fn push(&mut self, word: Word) -> Result<Option<Message>> {
        match word {
            Word::Value(value) => {
                self.pending.push(value);
                Ok(None)
            }
            Word::Tag(tag) => {
                let mut words = std::mem::take(&mut self.pending);
                words.reverse();
                let (message, used) = self.table.decode(tag, &words)?;
                if used < words.len() {
                    debug!(
                        "dropping {} stale words ahead of record {:#010x}",
                        words.len() - used,
                        tag
                    );
                }
                Ok(Some(message))
            }
        }
    }
}

/// Renders [`Message`]s as lines of text.
pub struct Render {
    timestamp: bool,
    location: bool,
}

impl std::default::Default for Render {
    fn default() -> Self {
        Render {
            timestamp: true,
            location: true,
        }
    }
}

pub struct RenderBuilder {
    imp: Render,
}

impl RenderBuilder {
    pub fn with_timestamp(mut self, timestamp: bool) -> Self {
        self.imp.timestamp = timestamp;
        self
    }
    pub fn with_location(mut self, location: bool) -> Self {
        self.imp.location = location;
        self
    }
    pub fn build(self) -> Render {
        self.imp
    }
}

impl Render {
    pub fn builder() -> RenderBuilder {
        RenderBuilder {
            imp: Render::default(),
        }
    }
    /// Render `message` as `HH:MM:SS file:line text`, leaving out whatever is configured off. The
    /// timestamp defaults to now.
    pub fn render(&self, message: &Message, timestamp: Option<DateTime<Utc>>) -> String {
        let mut line = String::new();
        if self.timestamp {
            // Writing to a `String` can't fail.
            let _ = write!(
                line,
                "{} ",
                timestamp.unwrap_or_else(Utc::now).format("%H:%M:%S")
            );
        }
        if self.location {
            if let Some(location) = message.location() {
                let _ = write!(line, "{} ", location);
            }
        }
        let _ = write!(line, "{}", message);
        line
    }
}
