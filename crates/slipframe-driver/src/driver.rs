use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use slipframe_codec::{decode, encode, is_valid, ErrorMode, END};
use tracing::{debug, trace, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Outcome of pulling from a [`Driver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// A decoded message.
    Message(Bytes),
    /// No complete packet is buffered yet (non-blocking pull only).
    Pending,
    /// End of input was signalled and every buffered packet has been pulled.
    Closed,
}

impl Next {
    /// The message, if this is [`Next::Message`].
    pub fn into_message(self) -> Option<Bytes> {
        match self {
            Next::Message(msg) => Some(msg),
            Next::Pending | Next::Closed => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Wait {
    No,
    Forever,
    Until(Instant, Duration),
}

struct State {
    /// Bytes after the last `END` seen. Never contains an `END`.
    buffer: BytesMut,
    /// Complete, non-empty, still-encoded packets in arrival order.
    packets: VecDeque<Bytes>,
    error_mode: ErrorMode,
    finished: bool,
}

impl State {
    /// Move every complete packet from the buffer to the queue, scanning
    /// from `from`. Returns the number of packets queued.
    fn split_packets(&mut self, mut from: usize) -> usize {
        let mut queued = 0;
        while let Some(pos) = self.buffer[from..].iter().position(|&b| b == END) {
            let packet = self.buffer.split_to(from + pos).freeze();
            self.buffer.advance(1);
            from = 0;
            if !packet.is_empty() {
                self.packets.push_back(packet);
                queued += 1;
            }
        }
        queued
    }
}

/// Stateful SLIP framer.
///
/// State machine per ingested chunk:
/// ```text
/// ACCUMULATING ──END found──▶ PACKET_READY ──queued──▶ ACCUMULATING
/// ```
/// There is no terminal state; a driver lives as long as its connection.
pub struct Driver {
    leading_end: AtomicBool,
    state: Mutex<State>,
    ready: Condvar,
}

impl Driver {
    /// Create a driver with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    /// Create a driver with explicit configuration.
    pub fn with_config(config: DriverConfig) -> Self {
        Self {
            leading_end: AtomicBool::new(config.leading_end),
            state: Mutex::new(State {
                buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
                packets: VecDeque::new(),
                error_mode: config.error_mode,
                finished: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is only mutated in small, non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encode a message into a packet ready to be written to the transport.
    ///
    /// Does not touch the receive side.
    pub fn send(&self, message: &[u8]) -> Bytes {
        encode(message, self.sends_leading_end())
    }

    /// Feed one chunk of inbound bytes.
    ///
    /// Complete packets are queued for [`get`](Self::get); trailing bytes
    /// after the last `END` are kept as the start of the next packet. Empty
    /// packets between consecutive `END` bytes are dropped.
    ///
    /// An empty `chunk` signals end of input: any unterminated bytes become a
    /// final packet and blocked readers observe [`Next::Closed`] once the
    /// queue drains.
    pub fn receive(&self, chunk: &[u8]) {
        let mut state = self.lock();

        let queued = if chunk.is_empty() {
            state.finished = true;
            let mut queued = 0;
            if !state.buffer.is_empty() {
                let packet = state.buffer.split().freeze();
                state.packets.push_back(packet);
                queued = 1;
            }
            debug!(queued, pending = state.packets.len(), "end of input");
            queued
        } else {
            let from = state.buffer.len();
            state.buffer.extend_from_slice(chunk);
            state.split_packets(from)
        };

        trace!(
            chunk = chunk.len(),
            queued,
            buffered = state.buffer.len(),
            pending = state.packets.len(),
            "framed inbound chunk"
        );
        drop(state);

        if queued > 0 || chunk.is_empty() {
            self.ready.notify_all();
        }
    }

    /// Pull the next message without blocking.
    ///
    /// Returns [`Next::Pending`] when no complete packet is buffered.
    pub fn try_get(&self) -> Result<Next> {
        self.next(Wait::No)
    }

    /// Pull the next message, blocking until one is available.
    ///
    /// Returns [`Next::Closed`] instead of blocking once end of input has
    /// been signalled and the queue is empty.
    pub fn get(&self) -> Result<Next> {
        self.next(Wait::Forever)
    }

    /// Pull the next message, blocking for at most `timeout`.
    ///
    /// Returns [`DriverError::Timeout`] when the deadline passes; nothing is
    /// consumed in that case. A timeout too large to represent as a deadline
    /// waits without one.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Next> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.next(Wait::Until(deadline, timeout)),
            None => self.next(Wait::Forever),
        }
    }

    fn next(&self, wait: Wait) -> Result<Next> {
        let mut state = self.lock();
        loop {
            if let Some(packet) = state.packets.pop_front() {
                let mode = state.error_mode;
                drop(state);
                return decode_packet(packet, mode);
            }
            if state.finished {
                return Ok(Next::Closed);
            }

            state = match wait {
                Wait::No => return Ok(Next::Pending),
                Wait::Forever => self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Wait::Until(deadline, timeout) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(DriverError::Timeout(timeout));
                    }
                    self.ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Iterate over the messages that can be pulled without blocking.
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { driver: self }
    }

    /// Discard queued packets and any partial packet in the buffer.
    ///
    /// End-of-input state is kept.
    pub fn flush(&self) {
        let mut state = self.lock();
        let dropped = state.packets.len();
        let partial = state.buffer.len();
        state.packets.clear();
        state.buffer.clear();
        drop(state);
        debug!(dropped, partial, "flushed driver buffers");
    }

    /// Current decode policy.
    pub fn error_mode(&self) -> ErrorMode {
        self.lock().error_mode
    }

    /// Change the decode policy for subsequent pulls.
    pub fn set_error_mode(&self, mode: ErrorMode) {
        self.lock().error_mode = mode;
    }

    /// Whether [`send`](Self::send) emits a leading `END`.
    pub fn sends_leading_end(&self) -> bool {
        self.leading_end.load(Ordering::SeqCst)
    }

    /// Change the leading-`END` setting for subsequent sends.
    pub fn set_leading_end(&self, leading_end: bool) {
        self.leading_end.store(leading_end, Ordering::SeqCst);
    }

    /// Override the leading-`END` setting until the guard is dropped.
    pub fn override_leading_end(&self, leading_end: bool) -> LeadingEndGuard<'_> {
        let previous = self.leading_end.swap(leading_end, Ordering::SeqCst);
        LeadingEndGuard {
            driver: self,
            previous,
        }
    }

    /// Number of complete packets waiting to be pulled.
    pub fn pending_packets(&self) -> usize {
        self.lock().packets.len()
    }

    /// Number of bytes held as an incomplete packet.
    pub fn buffered_len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Whether end of input has been signalled.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }
}

fn decode_packet(packet: Bytes, mode: ErrorMode) -> Result<Next> {
    match decode(&packet, mode) {
        Ok(msg) => {
            if !mode.is_strict() && tracing::enabled!(tracing::Level::DEBUG) && !is_valid(&packet)
            {
                debug!(len = packet.len(), "tolerated malformed packet");
            }
            Ok(Next::Message(msg))
        }
        Err(source) => {
            warn!(error = %source, len = packet.len(), "rejected malformed packet");
            Err(DriverError::Protocol { source, packet })
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Driver")
            .field("leading_end", &self.sends_leading_end())
            .field("error_mode", &state.error_mode)
            .field("pending_packets", &state.packets.len())
            .field("buffered", &state.buffer.len())
            .field("finished", &state.finished)
            .finish()
    }
}

/// Restores the previous leading-`END` setting when dropped.
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct LeadingEndGuard<'a> {
    driver: &'a Driver,
    previous: bool,
}

impl Drop for LeadingEndGuard<'_> {
    fn drop(&mut self) {
        self.driver.set_leading_end(self.previous);
    }
}

/// Non-blocking iterator returned by [`Driver::try_iter`].
///
/// Stops at the first [`Next::Pending`] or [`Next::Closed`]; protocol errors
/// are yielded and iteration continues with the next packet.
pub struct TryIter<'a> {
    driver: &'a Driver,
}

impl Iterator for TryIter<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.driver.try_get() {
            Ok(Next::Message(msg)) => Some(Ok(msg)),
            Ok(Next::Pending) | Ok(Next::Closed) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use slipframe_codec::ProtocolError;

    use super::*;

    fn message(next: Next) -> Bytes {
        match next {
            Next::Message(msg) => msg,
            other => panic!("expected message, got {other:?}"),
        }
    }

    fn stream_of(driver: &Driver, msgs: &[&[u8]]) -> Vec<u8> {
        msgs.iter().flat_map(|m| driver.send(m).to_vec()).collect()
    }

    #[test]
    fn send_honors_leading_end_flag() {
        let driver = Driver::new();
        assert_eq!(driver.send(b"hi").as_ref(), b"hi\xc0");

        driver.set_leading_end(true);
        assert_eq!(driver.send(b"hi").as_ref(), b"\xc0hi\xc0");
        assert!(driver.sends_leading_end());
    }

    #[test]
    fn leading_end_override_reverts_on_drop() {
        let driver = Driver::with_config(DriverConfig::default().with_leading_end(true));
        {
            let _guard = driver.override_leading_end(false);
            assert_eq!(driver.send(b"x").as_ref(), b"x\xc0");
        }
        assert!(driver.sends_leading_end());
        assert_eq!(driver.send(b"x").as_ref(), b"\xc0x\xc0");
    }

    #[test]
    fn send_leaves_receive_state_alone() {
        let driver = Driver::new();
        driver.receive(b"part");
        let _ = driver.send(b"\xc0\xdb");
        assert_eq!(driver.buffered_len(), 4);
        assert_eq!(driver.pending_packets(), 0);
    }

    #[test]
    fn single_message() {
        let driver = Driver::new();
        driver.receive(b"hello\xc0");
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"hello");
        assert_eq!(driver.try_get().unwrap(), Next::Pending);
    }

    #[test]
    fn multiple_messages_in_one_chunk() {
        let driver = Driver::new();
        driver.receive(b"\xc0one\xc0two\xc0\xc0three\xc0");
        let got: Vec<Bytes> = driver.try_iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![&b"one"[..], &b"two"[..], &b"three"[..]]);
    }

    #[test]
    fn partial_packet_stays_buffered() {
        let driver = Driver::new();
        driver.receive(b"hel");
        assert_eq!(driver.try_get().unwrap(), Next::Pending);
        assert_eq!(driver.buffered_len(), 3);

        driver.receive(b"lo\xc0wor");
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"hello");
        assert_eq!(driver.try_get().unwrap(), Next::Pending);
        assert_eq!(driver.buffered_len(), 3);
    }

    #[test]
    fn chunk_boundaries_do_not_change_result() {
        let encoder = Driver::with_config(DriverConfig::default().with_leading_end(true));
        let msgs: [&[u8]; 4] = [b"alpha", b"\xc0\xdb", b"x", b"a longer \xdb\xc0 message"];
        let wire = stream_of(&encoder, &msgs);

        let whole = Driver::new();
        whole.receive(&wire);
        let expected: Vec<Bytes> = whole.try_iter().map(|r| r.unwrap()).collect();
        assert_eq!(expected.len(), msgs.len());

        for chunk_size in [1, 2, 3, 7, wire.len()] {
            let driver = Driver::new();
            for chunk in wire.chunks(chunk_size) {
                driver.receive(chunk);
            }
            let got: Vec<Bytes> = driver.try_iter().map(|r| r.unwrap()).collect();
            assert_eq!(got, expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn consecutive_ends_yield_no_messages() {
        let driver = Driver::new();
        driver.receive(b"\xc0\xc0\xc0");
        assert_eq!(driver.try_get().unwrap(), Next::Pending);
        assert_eq!(driver.pending_packets(), 0);
        assert_eq!(driver.buffered_len(), 0);
    }

    #[test]
    fn strict_error_is_local_to_one_packet() {
        let driver = Driver::new();
        driver.receive(b"good\xc0\xdb\xc0after\xc0");

        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"good");

        let err = driver.try_get().unwrap_err();
        match err {
            DriverError::Protocol { source, packet } => {
                assert_eq!(source, ProtocolError::DanglingEscape { offset: 0 });
                assert_eq!(packet.as_ref(), b"\xdb");
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"after");
    }

    #[test]
    fn relaxed_mode_tolerates_dangling_escape() {
        let driver = Driver::with_config(DriverConfig::default().with_error_mode(ErrorMode::Relaxed));
        driver.receive(b"\xdb\xc0");
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"\xdb");
    }

    #[test]
    fn error_mode_applies_at_pull_time() {
        let driver = Driver::new();
        driver.receive(b"a\xdb\x01\xc0");
        driver.set_error_mode(ErrorMode::Relaxed);
        assert_eq!(driver.error_mode(), ErrorMode::Relaxed);
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"a\xdb\x01");
    }

    #[test]
    fn flush_discards_everything() {
        let driver = Driver::new();
        driver.receive(b"one\xc0two\xc0partial");
        assert_eq!(driver.pending_packets(), 2);

        driver.flush();
        assert_eq!(driver.pending_packets(), 0);
        assert_eq!(driver.buffered_len(), 0);
        assert_eq!(driver.try_get().unwrap(), Next::Pending);

        driver.receive(b"fresh\xc0");
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"fresh");
    }

    #[test]
    fn end_of_input_promotes_residue_and_closes() {
        let driver = Driver::new();
        driver.receive(b"first\xc0last");
        driver.receive(b"");

        assert!(driver.is_finished());
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"first");
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"last");
        assert_eq!(driver.try_get().unwrap(), Next::Closed);
        assert_eq!(driver.get().unwrap(), Next::Closed);
        assert_eq!(
            driver.get_timeout(Duration::from_secs(5)).unwrap(),
            Next::Closed
        );
    }

    #[test]
    fn get_timeout_expires_without_data() {
        let driver = Driver::new();
        driver.receive(b"incomplete");

        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let err = driver.get_timeout(timeout).unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() >= timeout);
        assert_eq!(driver.buffered_len(), 10);
    }

    #[test]
    fn timeout_does_not_consume_later_packet() {
        let driver = Driver::new();
        assert!(driver.get_timeout(Duration::from_millis(10)).is_err());
        driver.receive(b"late\xc0");
        assert_eq!(message(driver.try_get().unwrap()).as_ref(), b"late");
    }

    #[test]
    fn get_timeout_wakes_when_packet_completes() {
        let driver = Arc::new(Driver::new());
        driver.receive(b"wai");

        let producer = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                driver.receive(b"ted\xc0");
            })
        };

        let start = Instant::now();
        let next = driver.get_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(message(next).as_ref(), b"waited");
        assert!(start.elapsed() < Duration::from_secs(5));

        producer.join().unwrap();
    }

    #[test]
    fn get_timeout_with_unbounded_duration_returns_queued_message() {
        let driver = Driver::new();
        driver.receive(b"x\xc0");
        let next = driver.get_timeout(Duration::MAX).unwrap();
        assert_eq!(message(next).as_ref(), b"x");
    }

    #[test]
    fn get_timeout_with_unbounded_duration_waits_for_packet() {
        let driver = Arc::new(Driver::new());

        let producer = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                driver.receive(b"late\xc0");
            })
        };

        let next = driver.get_timeout(Duration::MAX).unwrap();
        assert_eq!(message(next).as_ref(), b"late");
        producer.join().unwrap();
    }

    #[test]
    fn blocking_get_wakes_when_packet_completes() {
        let driver = Arc::new(Driver::new());
        driver.receive(b"bl");

        let producer = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                driver.receive(b"ocked\xc0");
            })
        };

        let next = driver.get().unwrap();
        assert_eq!(message(next).as_ref(), b"blocked");
        assert_eq!(driver.pending_packets(), 0);
        producer.join().unwrap();
    }

    #[test]
    fn blocking_get_unblocks_on_end_of_input() {
        let driver = Arc::new(Driver::new());

        let consumer = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || driver.get().unwrap())
        };

        thread::sleep(Duration::from_millis(20));
        driver.receive(b"");
        assert_eq!(consumer.join().unwrap(), Next::Closed);
    }

    #[test]
    fn concurrent_producer_preserves_fifo_order() {
        let driver = Arc::new(Driver::new());
        let wire: Vec<u8> = (0..200u32)
            .flat_map(|i| driver.send(format!("msg-{i}").as_bytes()).to_vec())
            .collect();

        let producer = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || {
                for chunk in wire.chunks(5) {
                    driver.receive(chunk);
                }
            })
        };

        for i in 0..200u32 {
            let next = driver.get_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(message(next).as_ref(), format!("msg-{i}").as_bytes());
        }

        producer.join().unwrap();
    }

    #[test]
    fn try_iter_yields_errors_and_continues() {
        let driver = Driver::new();
        driver.receive(b"a\xc0b\xdb\x00\xc0c\xc0");
        let results: Vec<Result<Bytes>> = driver.try_iter().collect();
        assert_eq!(results.len(), 3);
        assert!(results[1].as_ref().unwrap_err().is_protocol());
        assert_eq!(results[2].as_ref().unwrap().as_ref(), b"c");
    }

    #[test]
    fn debug_output_reports_state() {
        let driver = Driver::new();
        driver.receive(b"x\xc0y");
        let dbg = format!("{driver:?}");
        assert!(dbg.contains("pending_packets: 1"));
        assert!(dbg.contains("buffered: 1"));
    }
}
