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

//! The smolt transport layer.
//!
//! This module defines the [`Transport`] trait that all implementations must support, along with
//! three implementations:
//!
//! - [`Discard`]: drops everything; logging through it compiles away entirely
//! - [`Itm`]: the Cortex-M Instrumentation Trace Macrocell, a hardware FIFO per stimulus port
//! - [`RingBuffer`]: a fixed-capacity circular buffer in RAM, drained by a debugger after the fact
//!
//! # Examples
//!
//! To log into a ring buffer that lives in a `static`:
//!
//! ```rust
//! use smolt::{log, transport::RingBuffer, Logger};
//!
//! static LOG_BUF: RingBuffer<256> = RingBuffer::new();
//! static LOGGER: Logger<&RingBuffer<256>> = Logger::new(&LOG_BUF);
//!
//! log!(LOGGER, "value: {}", 42u32);
//! assert_eq!(LOG_BUF.write_index(), 254); // one value word, one tag word
//! ```
//!
//! On a Cortex-M part with a trace probe attached, via the ITM on the default channels (24 for
//! tags, 25 for values):
//!
//! ```no_run
//! use smolt::{transport::Itm, Logger};
//!
//! // Safety: nothing else in this program uses the core peripherals
//! let peripherals = unsafe { cortex_m::Peripherals::steal() };
//! let logger = Logger::new(Itm::new(peripherals.ITM, 24));
//! ```

use cortex_m::peripheral::itm::RegisterBlock;
use cortex_m::peripheral::ITM;

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      transport mechanisms                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Operations all transport layers must support.
///
/// A record is written as zero or more [`write_value`](Transport::write_value) calls followed by
/// exactly one [`write_tag`](Transport::write_tag). Neither can fail: instrumentation must never
/// become a new failure mode for the instrumented program, so a transport that runs out of room
/// either blocks or drops data, as documented on each implementation.
///
/// Methods take `&self` because a transport is typically shared between mainline code & interrupt
/// handlers. Record boundaries are *not* protected: a caller that preempts another mid-record will
/// interleave its words with the interrupted record's. Callers that need atomic records must
/// provide their own mutual exclusion around the whole logging call.
pub trait Transport {
    /// Write one argument word.
    fn write_value(&self, word: u32);
    /// Write the tag word that closes a record.
    fn write_tag(&self, word: u32);
    /// Whether anybody is listening.
    ///
    /// Transports with no notion of enablement keep the default; the check then folds away at
    /// compile time. When this returns `false`, the logger writes nothing at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    #[inline]
    fn write_value(&self, word: u32) {
        (**self).write_value(word)
    }
    #[inline]
    fn write_tag(&self, word: u32) {
        (**self).write_tag(word)
    }
    #[inline]
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// A transport that drops everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct Discard;

impl Transport for Discard {
    #[inline(always)]
    fn write_value(&self, _word: u32) {}
    #[inline(always)]
    fn write_tag(&self, _word: u32) {}
}

/// Tags go to this stimulus port by default; values to the next one
pub const DEFAULT_CHANNEL: u8 = 24;

/// Logging over the Cortex-M Instrumentation Trace Macrocell.
///
/// Tags are written to stimulus port `channel`, values to port `channel + 1`, so that the
/// receiving end can tell them apart without any framing. Each write spins until the port's
/// FIFO has room. There is no timeout: if the trace port never drains, the writer blocks forever.
///
/// [`is_enabled`](Transport::is_enabled) reports whether both ports are enabled in the
/// trace-enable registers. That check and the writes that follow are not atomic; if the ports
/// are disabled (or the writer preempted) mid-record, a partial record goes out, which the
/// decoder discards when the next tag arrives.
#[derive(Debug)]
pub struct Itm {
    block: *mut RegisterBlock,
    channel: u8,
}

// Safety: the ITM arbitrates individual word writes in hardware; `Itm` holds no other state.
unsafe impl Send for Itm {}
unsafe impl Sync for Itm {}

impl Itm {
    /// Take over the core's ITM, logging on `channel` & `channel + 1`.
    ///
    /// Panics if `channel` is 255.
    pub fn new(_itm: ITM, channel: u8) -> Itm {
        unsafe { Itm::from_raw_parts(ITM::PTR as *mut RegisterBlock, channel) }
    }
    /// Construct an [`Itm`] transport over an arbitrary register block.
    ///
    /// # Safety
    ///
    /// `block` must be valid for volatile reads & writes of the stimulus ports `channel` and
    /// `channel + 1` and of the trace-enable registers, for the lifetime of the returned value.
    /// Nothing else may be writing to those two ports.
    pub const unsafe fn from_raw_parts(block: *mut RegisterBlock, channel: u8) -> Itm {
        assert!(channel < u8::MAX, "the value port is channel + 1");
        Itm { block, channel }
    }
    pub fn builder() -> ItmBuilder {
        ItmBuilder {
            block: ITM::PTR as *mut RegisterBlock,
            channel: DEFAULT_CHANNEL,
        }
    }
    /// The tag port; values go to the port after it
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    fn port_enabled(&self, port: u8) -> bool {
        let ter = unsafe { (*self.block).ter[port as usize / 32].read() };
        (ter >> (port % 32)) & 1 == 1
    }

    fn write_port(&self, port: u8, word: u32) {
        let stim = unsafe { &mut (*self.block).stim[port as usize] };
        while !stim.is_fifo_ready() {
            core::hint::spin_loop();
        }
        stim.write_u32(word)
    }
}

impl Transport for Itm {
    fn write_value(&self, word: u32) {
        self.write_port(self.channel + 1, word)
    }
    fn write_tag(&self, word: u32) {
        self.write_port(self.channel, word)
    }
    fn is_enabled(&self) -> bool {
        self.port_enabled(self.channel) && self.port_enabled(self.channel + 1)
    }
}

/// Configure an [`Itm`] transport.
pub struct ItmBuilder {
    block: *mut RegisterBlock,
    channel: u8,
}

impl ItmBuilder {
    pub fn channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
    /// Use the register block at `block` instead of the core's own
    pub fn register_block(mut self, block: *mut RegisterBlock) -> Self {
        self.block = block;
        self
    }
    /// # Safety
    ///
    /// As for [`Itm::from_raw_parts`], with the configured register block.
    pub unsafe fn build(self) -> Itm {
        Itm::from_raw_parts(self.block, self.channel)
    }
}

/// A fixed-capacity circular buffer of words in RAM.
///
/// Each value write moves the write cursor *down* one slot (wrapping from 0 to `DEPTH - 1`) and
/// stores the word there; the oldest data is silently overwritten. Each tag write does the same &
/// then records the cursor in `tag_idx`, marking the most recent complete record. Reading upward
/// from `tag_idx` therefore yields the newest record first, each record starting with its tag &
/// followed by its arguments in declaration order; see [`RingBuffer::drain`].
///
/// The buffer assumes a single writer. It is built on relaxed atomic loads & stores only (no
/// read-modify-write), so it may live in a `static` on cores without atomic RMW instructions, and
/// so that a debugger sees a consistent word in each slot.
#[derive(Debug)]
pub struct RingBuffer<const DEPTH: usize> {
    data: [AtomicU32; DEPTH],
    write_idx: AtomicUsize,
    tag_idx: AtomicUsize,
}

impl<const DEPTH: usize> RingBuffer<DEPTH> {
    const NONEMPTY: () = assert!(DEPTH > 0, "a ring buffer needs at least one word");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONEMPTY;
        RingBuffer {
            data: [const { AtomicU32::new(0) }; DEPTH],
            write_idx: AtomicUsize::new(0),
            tag_idx: AtomicUsize::new(0),
        }
    }
    pub const fn depth(&self) -> usize {
        DEPTH
    }
    /// Slot most recently written
    pub fn write_index(&self) -> usize {
        self.write_idx.load(Ordering::Relaxed)
    }
    /// Slot holding the most recent tag
    pub fn tag_index(&self) -> usize {
        self.tag_idx.load(Ordering::Relaxed)
    }
    /// The word in slot `index`; panics if `index >= DEPTH`
    pub fn word(&self, index: usize) -> u32 {
        self.data[index].load(Ordering::Relaxed)
    }
    /// The buffer contents in drain order: starting at the most recent tag & moving upward, with
    /// the words of any record begun after that tag left out.
    ///
    /// This is a snapshot only if nobody is writing concurrently.
    pub fn drain(&self) -> impl Iterator<Item = u32> + '_ {
        drain_order(DEPTH, self.write_index(), self.tag_index()).map(|index| self.word(index))
    }
}

impl<const DEPTH: usize> Default for RingBuffer<DEPTH> {
    fn default() -> Self {
        RingBuffer::new()
    }
}

impl<const DEPTH: usize> Transport for RingBuffer<DEPTH> {
    fn write_value(&self, word: u32) {
        let index = match self.write_idx.load(Ordering::Relaxed) {
            0 => DEPTH - 1,
            index => index - 1,
        };
        self.data[index].store(word, Ordering::Relaxed);
        self.write_idx.store(index, Ordering::Relaxed);
    }
    fn write_tag(&self, word: u32) {
        self.write_value(word);
        self.tag_idx
            .store(self.write_idx.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}

/// Slot indices of a ring buffer of `depth` words, in drain order.
///
/// Starts at `tag_idx` & wraps around, omitting the `(tag_idx - write_idx) mod depth` slots
/// written since the last tag (an incomplete record).
pub(crate) fn drain_order(
    depth: usize,
    write_idx: usize,
    tag_idx: usize,
) -> impl Iterator<Item = usize> {
    let partial = if depth == 0 {
        0
    } else {
        (tag_idx + depth - write_idx) % depth
    };
    (0..depth - partial).map(move |i| (tag_idx + i) % depth)
}


#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn ring_buffer_cursor() {
        let rb = RingBuffer::<4>::new();
        assert_eq!(rb.depth(), 4);
        assert_eq!((rb.write_index(), rb.tag_index()), (0, 0));

        rb.write_value(1);
        assert_eq!(rb.write_index(), 3);
        assert_eq!(rb.word(3), 1);
        rb.write_tag(100);
        assert_eq!((rb.write_index(), rb.tag_index()), (2, 2));
        assert_eq!(rb.word(2), 100);

        // wraps around, overwriting the oldest words without complaint
        rb.write_value(2);
        rb.write_value(3);
        rb.write_tag(200);
        assert_eq!((rb.write_index(), rb.tag_index()), (3, 3));
        assert_eq!(
            (0..4).map(|i| rb.word(i)).collect::<Vec<_>>(),
            vec![3, 2, 100, 200]
        );
    }

    #[test]
    fn ring_buffer_drain() {
        let rb = RingBuffer::<8>::new();
        // never written: everything, all zero
        assert_eq!(rb.drain().collect::<Vec<_>>(), vec![0; 8]);

        rb.write_value(1);
        rb.write_tag(100);
        rb.write_value(2);
        rb.write_value(3);
        rb.write_tag(200);
        assert_eq!(
            rb.drain().collect::<Vec<_>>(),
            vec![200, 3, 2, 100, 1, 0, 0, 0]
        );

        // a record in progress is left out
        rb.write_value(4);
        rb.write_value(5);
        assert_eq!(rb.drain().collect::<Vec<_>>(), vec![200, 3, 2, 100, 1, 0]);
    }

    #[test]
    fn drain_order_wraps() {
        assert_eq!(drain_order(4, 1, 1).collect::<Vec<_>>(), vec![1, 2, 3, 0]);
        assert_eq!(drain_order(4, 3, 1).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(drain_order(0, 0, 0).count(), 0);
    }

    #[test]
    fn itm_ports() {
        let fake = testing::FakeItm::new();
        let itm = unsafe { Itm::from_raw_parts(fake.block(), 24) };
        assert_eq!(itm.channel(), 24);
        assert!(!itm.is_enabled());
        itm.write_value(0xdead_beef);
        itm.write_tag(0x2000_0101);
        assert_eq!(fake.stim(25), 0xdead_beef);
        assert_eq!(fake.stim(24), 0x2000_0101);
        // still ready (both words were odd), so another record goes straight through
        itm.write_value(7);
        assert_eq!(fake.stim(25), 7);

        fake.enable(24);
        assert!(!itm.is_enabled());
        fake.enable(25);
        assert!(itm.is_enabled());

        // the two ports may straddle trace-enable registers
        fake.disable_all();
        fake.enable(31);
        let itm = unsafe {
            Itm::builder()
                .channel(31)
                .register_block(fake.block())
                .build()
        };
        assert!(!itm.is_enabled());
        fake.enable(32);
        assert!(itm.is_enabled());
        itm.write_value(0x55);
        assert_eq!(fake.stim(32), 0x55);
    }

    #[test]
    #[should_panic]
    fn itm_last_channel() {
        let fake = testing::FakeItm::new();
        let _ = unsafe { Itm::from_raw_parts(fake.block(), 255) };
    }

    #[test]
    fn discard() {
        // nothing to observe; just be sure it's usable by reference & by value
        let d = Discard;
        d.write_value(1);
        (&d).write_tag(2);
        assert!(d.is_enabled());
    }
}
