//! Routes HDLC payloads from a single physical transport onto numbered
//! logical channels, and frames per-channel writes back onto the wire.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use vserial_core::{ChannelConfig, Error, MIN_ROUTABLE_FRAME_LEN, MultiplexerConfig, Result, Transport};
use vserial_protocol::{Framer, Receiver, Statistics};

use crate::channel::ChannelQueue;

/// Combined observable statistics: the Receiver's frame-level counters plus
/// the routing-level `bad_channel` counter, which only the Multiplexer can
/// own since it alone holds the channel map.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MuxStatistics {
    #[serde(flatten)]
    pub frame: Statistics,
    pub bad_channel: u64,
}

/// A `Transport` that can be cloned and shared between the background
/// reader (which only calls `read_byte`) and the Framer (which only calls
/// `write_all`), serializing both sides through one lock.
#[derive(Clone)]
struct SharedTransport<T> {
    inner: Arc<Mutex<T>>,
}

impl<T: Transport> Transport for SharedTransport<T> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.inner.lock().unwrap().read_byte()
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.lock().unwrap().write_all(buf)
    }
}

type ChannelMap = Arc<RwLock<HashMap<u8, Arc<ChannelQueue>>>>;

/// Owns the background reader, the channel map, and the framed write path
/// for a single transport.
pub struct Multiplexer<T: Transport + 'static> {
    channels: ChannelMap,
    framer: Arc<Framer<SharedTransport<T>>>,
    shutdown: Arc<AtomicBool>,
    bad_channel: Arc<AtomicU64>,
    frame_stats: Arc<Mutex<Statistics>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: MultiplexerConfig,
}

impl<T: Transport + 'static> Multiplexer<T> {
    /// Wrap `transport`, starting the background reader immediately.
    pub fn new(transport: T, config: MultiplexerConfig) -> Arc<Self> {
        let shared = Arc::new(Mutex::new(transport));
        let reader_transport = SharedTransport {
            inner: shared.clone(),
        };
        let writer_transport = SharedTransport { inner: shared };

        let channels: ChannelMap = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let bad_channel = Arc::new(AtomicU64::new(0));
        let frame_stats = Arc::new(Mutex::new(Statistics::default()));

        let mux = Arc::new(Self {
            channels: channels.clone(),
            framer: Arc::new(Framer::new(writer_transport)),
            shutdown: shutdown.clone(),
            bad_channel: bad_channel.clone(),
            frame_stats: frame_stats.clone(),
            reader: Mutex::new(None),
            config,
        });

        let mut receiver = Receiver::new(reader_transport);
        let handle = thread::Builder::new()
            .name("vserial-mux-reader".into())
            .spawn(move || {
                info!("multiplexer reader started");
                loop {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    match receiver.get() {
                        Ok(Some(payload)) => {
                            *frame_stats.lock().unwrap() = receiver.statistics();
                            route(&channels, &payload, &bad_channel);
                        }
                        Ok(None) => {
                            *frame_stats.lock().unwrap() = receiver.statistics();
                        }
                        Err(e) => {
                            error!(error = %e, "transport read failed, reader exiting");
                            break;
                        }
                    }
                }
                shutdown.store(true, Ordering::Release);
                for queue in channels.read().unwrap().values() {
                    queue.wake_all();
                }
                info!("multiplexer reader stopped");
            })
            .expect("failed to spawn multiplexer reader thread");

        *mux.reader.lock().unwrap() = Some(handle);
        mux
    }

    /// Register a new channel. Rejects a duplicate registration rather than
    /// silently reinitializing a queue a caller may already hold a handle to.
    pub fn add_channel(&self, num: u8, config: Option<ChannelConfig>) -> Result<()> {
        let mut channels = self.channels.write().unwrap();
        if channels.contains_key(&num) {
            return Err(Error::channel_already_registered(num));
        }
        let capacity = config
            .map(|c| c.capacity)
            .unwrap_or(self.config.default_channel_capacity);
        channels.insert(
            num,
            Arc::new(ChannelQueue::new(capacity, self.shutdown.clone())),
        );
        debug!(channel = num, capacity, "channel registered");
        Ok(())
    }

    /// Read up to `length` bytes from channel `num`'s queue. Each byte gets
    /// its own `timeout` budget; a gap exceeding it ends the read early with
    /// whatever was gathered so far, not an error.
    pub fn channel_read(&self, num: u8, length: usize, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let queue = self.queue_for(num)?;
        let timeout = timeout.unwrap_or(self.config.read_timeout);

        let mut out = Vec::with_capacity(length);
        while out.len() < length {
            match queue.get(timeout) {
                Some(byte) => out.push(byte),
                None => break,
            }
        }
        Ok(out)
    }

    /// Frame `(num, 0, data)` and write it to the transport.
    pub fn channel_write(&self, num: u8, data: &[u8]) -> Result<()> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::MultiplexerShutdown);
        }
        self.framer.send(num, 0, data)
    }

    /// A convenience handle bundling `channel_read`/`channel_write` for one
    /// channel number. Registers the channel if it doesn't already exist.
    pub fn open(self: &Arc<Self>, num: u8, config: Option<ChannelConfig>) -> Result<Channel<T>> {
        match self.add_channel(num, config) {
            Ok(()) | Err(Error::ChannelAlreadyRegistered { .. }) => {}
            Err(e) => return Err(e),
        }
        Ok(Channel {
            mux: Arc::clone(self),
            channel: num,
        })
    }

    /// Snapshot the combined frame/routing counters.
    pub fn statistics(&self) -> MuxStatistics {
        MuxStatistics {
            frame: *self.frame_stats.lock().unwrap(),
            bad_channel: self.bad_channel.load(Ordering::Relaxed),
        }
    }

    /// Signal the background reader to stop and wait for it to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for queue in self.channels.read().unwrap().values() {
            queue.wake_all();
        }
        if let Some(handle) = self.reader.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn queue_for(&self, num: u8) -> Result<Arc<ChannelQueue>> {
        self.channels
            .read()
            .unwrap()
            .get(&num)
            .cloned()
            .ok_or_else(|| Error::channel_not_registered(num))
    }
}

impl<T: Transport + 'static> Drop for Multiplexer<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn route(channels: &ChannelMap, payload: &[u8], bad_channel: &AtomicU64) {
    // The Receiver has already stripped the 4-byte FCS, so the routable
    // floor here is MIN_ROUTABLE_FRAME_LEN minus those 4 bytes.
    const MIN_ROUTABLE_PAYLOAD_LEN: usize = MIN_ROUTABLE_FRAME_LEN - 4;
    if payload.len() < MIN_ROUTABLE_PAYLOAD_LEN {
        warn!(len = payload.len(), "payload too short to carry a channel header, dropped");
        return;
    }
    let chan = payload[0];
    let data = &payload[2..];

    let queues = channels.read().unwrap();
    match queues.get(&chan) {
        Some(queue) => {
            debug!(channel = chan, len = data.len(), "routed payload");
            queue.put_bulk(data);
        }
        None => {
            bad_channel.fetch_add(1, Ordering::Relaxed);
            warn!(channel = chan, "payload for unregistered channel, dropped");
        }
    }
}

/// A handle bound to one channel of a [`Multiplexer`].
pub struct Channel<T: Transport + 'static> {
    mux: Arc<Multiplexer<T>>,
    channel: u8,
}

impl<T: Transport + 'static> Channel<T> {
    /// Read up to `length` bytes, see [`Multiplexer::channel_read`].
    pub fn read(&self, length: usize, timeout: Option<Duration>) -> Result<Vec<u8>> {
        self.mux.channel_read(self.channel, length, timeout)
    }

    /// Frame and send `data`, see [`Multiplexer::channel_write`].
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.mux.channel_write(self.channel, data)
    }

    /// `true` if this channel's queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.mux
            .queue_for(self.channel)
            .map(|q| q.is_full())
            .unwrap_or(false)
    }

    /// `true` if this channel's queue has nothing buffered.
    pub fn is_empty(&self) -> bool {
        self.mux
            .queue_for(self.channel)
            .map(|q| q.is_empty())
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vserial_core::LoopbackTransport;

    fn paired_muxes() -> (Arc<Multiplexer<LoopbackTransport>>, Arc<Multiplexer<LoopbackTransport>>) {
        let (a, b) = LoopbackTransport::pair(Duration::from_millis(50));
        let config = MultiplexerConfig {
            read_timeout: Duration::from_millis(100),
            ..MultiplexerConfig::default()
        };
        (Multiplexer::new(a, config), Multiplexer::new(b, config))
    }

    #[test]
    fn channel_not_registered_read_fails() {
        let (mux, _peer) = paired_muxes();
        let err = mux.channel_read(9, 1, None).unwrap_err();
        assert!(matches!(err, Error::ChannelNotRegistered { channel: 9 }));
    }

    #[test]
    fn duplicate_add_channel_is_rejected() {
        let (mux, _peer) = paired_muxes();
        mux.add_channel(0, None).unwrap();
        let err = mux.add_channel(0, None).unwrap_err();
        assert!(matches!(err, Error::ChannelAlreadyRegistered { channel: 0 }));
    }

    #[test]
    fn s7_mux_routing_across_two_channels() {
        let (left, right) = paired_muxes();
        let left_ch0 = left.open(0, None).unwrap();
        let left_ch1 = left.open(1, None).unwrap();
        right.add_channel(0, None).unwrap();
        right.add_channel(1, None).unwrap();

        left_ch0.write(b"foo").unwrap();
        left_ch1.write(b"bar").unwrap();

        let got0 = right.channel_read(0, 3, Some(Duration::from_millis(200))).unwrap();
        let got1 = right.channel_read(1, 3, Some(Duration::from_millis(200))).unwrap();
        assert_eq!(got0, b"foo");
        assert_eq!(got1, b"bar");
    }

    #[test]
    fn s8_bounded_channel_backpressure() {
        let (left, right) = paired_muxes();
        right.add_channel(0, Some(ChannelConfig::bounded(5))).unwrap();
        let left_ch0 = left.open(0, None).unwrap();

        left_ch0.write(b"foo").unwrap();
        left_ch0.write(b"bar").unwrap();

        let got = right.channel_read(0, 5, Some(Duration::from_millis(200))).unwrap();
        assert_eq!(got, b"fooba");
        let rest = right.channel_read(0, 1, Some(Duration::from_millis(200))).unwrap();
        assert_eq!(rest, b"r");
    }

    #[test]
    fn routing_to_unregistered_channel_bumps_bad_channel_counter() {
        let (left, right) = paired_muxes();
        right.add_channel(0, None).unwrap();
        let left_ch7 = left.open(7, None).unwrap();

        left_ch7.write(b"x").unwrap();
        // Give the background reader time to route (and drop) the frame.
        std::thread::sleep(Duration::from_millis(150));
        assert!(right.statistics().bad_channel >= 1);
    }
}
