//! Flow-controlled byte transport.
//!
//! Owns the two fixed-size channels between the physical link and the
//! decoder. The inbound side intercepts remote XON/XOFF and emits its own
//! when occupancy crosses the configured watermarks; the layers above only
//! see `submit_outbound`/`poll_inbound`, both non-blocking.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Resume-transmission flow-control byte.
pub const XON: u8 = 0x11;
/// Pause-transmission flow-control byte.
pub const XOFF: u8 = 0x13;

/// Capacity of each direction's buffer, matching the historical terminal
/// hardware sizing.
pub const BUFFER_CAPACITY: usize = 2048;

#[derive(Error, Debug)]
pub enum TransportError {
    /// The outbound buffer cannot take the submitted bytes. Retry after
    /// flow control drains the buffer; not fatal.
    #[error("outbound buffer full, {rejected} bytes rejected")]
    Full { rejected: usize },

    /// The physical link failed or disconnected. Fatal for the session.
    #[error("link lost: {0}")]
    LinkLost(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Watermark configuration for XON/XOFF emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    /// Inbound occupancy at which XOFF is sent and reads pause.
    pub high_water: usize,
    /// Inbound occupancy at which XON is sent and reads resume.
    pub low_water: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            high_water: 1536,
            low_water: 512,
        }
    }
}

impl FlowConfig {
    /// Force the watermarks into a sane relation with the buffer size.
    pub fn normalized(self) -> Self {
        let high_water = self.high_water.clamp(2, BUFFER_CAPACITY);
        let low_water = self.low_water.min(high_water - 1);
        Self {
            high_water,
            low_water,
        }
    }
}

/// Snapshot of the transport's flow-control state, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowStatus {
    /// We sent XOFF; physical reads are suspended.
    pub reads_paused: bool,
    /// The remote sent XOFF; our data sends are suspended.
    pub sends_paused: bool,
    pub inbound: usize,
    pub outbound: usize,
}

/// The two buffered channels plus flow-control state.
pub struct Transport {
    inbound: VecDeque<u8>,
    outbound: VecDeque<u8>,
    /// XON/XOFF we still owe the link. Never gated by `sends_paused`.
    flow_out: VecDeque<u8>,
    config: FlowConfig,
    reads_paused: bool,
    sends_paused: bool,
}

impl Transport {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            inbound: VecDeque::with_capacity(BUFFER_CAPACITY),
            outbound: VecDeque::with_capacity(BUFFER_CAPACITY),
            flow_out: VecDeque::new(),
            config: config.normalized(),
            reads_paused: false,
            sends_paused: false,
        }
    }

    /// Enqueue bytes for transmission. Non-blocking; fails without side
    /// effects when the buffer cannot take the whole slice.
    pub fn submit_outbound(&mut self, bytes: &[u8]) -> Result<()> {
        if self.outbound.len() + bytes.len() > BUFFER_CAPACITY {
            return Err(TransportError::Full {
                rejected: bytes.len(),
            });
        }
        self.outbound.extend(bytes);
        Ok(())
    }

    /// Bytes newly arrived since the last poll. Never blocks; an empty
    /// result just means nothing arrived. Draining the buffer below the
    /// low watermark queues XON and resumes reads.
    pub fn poll_inbound(&mut self) -> Vec<u8> {
        let drained: Vec<u8> = self.inbound.drain(..).collect();
        if self.reads_paused && self.inbound.len() <= self.config.low_water {
            self.flow_out.push_back(XON);
            self.reads_paused = false;
            debug!("inbound below low water, resuming with XON");
        }
        drained
    }

    /// Accept bytes from the physical link. Remote XON/XOFF is intercepted
    /// here and never reaches the decoder; crossing the high watermark
    /// queues a single XOFF and pauses reads.
    pub fn ingest(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match b {
                XOFF => {
                    self.sends_paused = true;
                    debug!("remote XOFF, pausing sends");
                }
                XON => {
                    self.sends_paused = false;
                    debug!("remote XON, resuming sends");
                }
                _ => {
                    if self.inbound.len() >= BUFFER_CAPACITY {
                        warn!("inbound buffer full, dropping byte 0x{:02X}", b);
                        continue;
                    }
                    self.inbound.push_back(b);
                }
            }
        }
        if !self.reads_paused && self.inbound.len() >= self.config.high_water {
            self.flow_out.push_back(XOFF);
            self.reads_paused = true;
            debug!(
                occupancy = self.inbound.len(),
                "inbound above high water, pausing with XOFF"
            );
        }
    }

    /// Whether physical reads should stay suspended.
    pub fn reads_paused(&self) -> bool {
        self.reads_paused
    }

    /// Everything ready to go out on the link: owed flow-control bytes
    /// first, then data unless the remote has us paused.
    pub fn take_writable(&mut self) -> Vec<u8> {
        let mut out: Vec<u8> = self.flow_out.drain(..).collect();
        if !self.sends_paused {
            out.extend(self.outbound.drain(..));
        }
        out
    }

    pub fn status(&self) -> FlowStatus {
        FlowStatus {
            reads_paused: self.reads_paused,
            sends_paused: self.sends_paused,
            inbound: self.inbound.len(),
            outbound: self.outbound.len(),
        }
    }

    /// Teardown: discard buffered bytes and reset flow state.
    pub fn clear(&mut self) {
        self.inbound.clear();
        self.outbound.clear();
        self.flow_out.clear();
        self.reads_paused = false;
        self.sends_paused = false;
    }
}

/// A physical byte link.
///
/// `recv` returns `Ok(0)` when nothing is pending right now (it may wait
/// briefly); any `Err` means the link is gone. `try_split` hands out an
/// independent handle so a reader thread and a writer can coexist.
pub trait Link: Send {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn send_all(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn try_split(&self) -> io::Result<Box<dyn Link>>;
}

/// TCP implementation of [`Link`].
pub struct TcpLink {
    stream: TcpStream,
}

impl TcpLink {
    /// Read timeout keeps the reader thread responsive to pause/stop flags.
    const READ_TIMEOUT: Duration = Duration::from_millis(50);

    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(Self::READ_TIMEOUT))?;
        Ok(Self { stream })
    }
}

impl Link for TcpLink {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the link",
            )),
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn send_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)
    }

    fn try_split(&self) -> io::Result<Box<dyn Link>> {
        Ok(Box::new(TcpLink {
            stream: self.stream.try_clone()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Transport {
        Transport::new(FlowConfig {
            high_water: 8,
            low_water: 2,
        })
    }

    #[test]
    fn test_high_water_emits_single_xoff() {
        let mut transport = small();

        transport.ingest(&[b'a'; 7]);
        assert!(!transport.reads_paused());
        assert!(transport.take_writable().is_empty());

        transport.ingest(&[b'b']);
        assert!(transport.reads_paused());
        assert_eq!(transport.take_writable(), vec![XOFF]);

        // Staying above the mark must not emit again.
        transport.ingest(&[b'c']);
        assert!(transport.take_writable().is_empty());
    }

    #[test]
    fn test_drain_below_low_water_emits_single_xon() {
        let mut transport = small();
        transport.ingest(&[b'a'; 8]);
        assert_eq!(transport.take_writable(), vec![XOFF]);

        let drained = transport.poll_inbound();
        assert_eq!(drained.len(), 8);
        assert!(!transport.reads_paused());
        assert_eq!(transport.take_writable(), vec![XON]);

        // Second poll with nothing buffered stays quiet.
        assert!(transport.poll_inbound().is_empty());
        assert!(transport.take_writable().is_empty());
    }

    #[test]
    fn test_remote_xoff_gates_data_but_not_flow_bytes() {
        let mut transport = small();
        transport.submit_outbound(b"hello").unwrap();
        transport.ingest(&[XOFF]);

        assert!(transport.status().sends_paused);
        assert!(transport.take_writable().is_empty());

        // Our own flow control still goes out while paused.
        transport.ingest(&[b'x'; 8]);
        assert_eq!(transport.take_writable(), vec![XOFF]);

        transport.ingest(&[XON]);
        assert_eq!(transport.take_writable(), b"hello".to_vec());
    }

    #[test]
    fn test_flow_bytes_never_reach_inbound() {
        let mut transport = small();
        transport.ingest(&[b'a', XOFF, b'b', XON, b'c']);
        assert_eq!(transport.poll_inbound(), b"abc".to_vec());
    }

    #[test]
    fn test_submit_outbound_full() {
        let mut transport = Transport::new(FlowConfig::default());
        transport.submit_outbound(&[0u8; BUFFER_CAPACITY]).unwrap();

        let err = transport.submit_outbound(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, TransportError::Full { rejected: 3 }));

        // Failed submit must not partially enqueue.
        assert_eq!(transport.status().outbound, BUFFER_CAPACITY);
    }

    #[test]
    fn test_inbound_overflow_drops_bytes() {
        let mut transport = Transport::new(
            FlowConfig {
                high_water: BUFFER_CAPACITY,
                low_water: 0,
            }
            .normalized(),
        );
        transport.ingest(&vec![b'x'; BUFFER_CAPACITY + 5]);
        assert_eq!(transport.status().inbound, BUFFER_CAPACITY);
    }

    #[test]
    fn test_status_snapshot() {
        let mut transport = small();
        transport.ingest(b"abc");
        transport.submit_outbound(b"de").unwrap();

        assert_eq!(
            transport.status(),
            FlowStatus {
                reads_paused: false,
                sends_paused: false,
                inbound: 3,
                outbound: 2,
            }
        );
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut transport = small();
        transport.ingest(&[b'a'; 8]);
        transport.submit_outbound(b"xyz").unwrap();
        transport.clear();

        assert_eq!(
            transport.status(),
            FlowStatus {
                reads_paused: false,
                sends_paused: false,
                inbound: 0,
                outbound: 0,
            }
        );
        assert!(transport.take_writable().is_empty());
    }

    #[test]
    fn test_normalized_keeps_low_below_high() {
        let config = FlowConfig {
            high_water: 100,
            low_water: 400,
        }
        .normalized();
        assert!(config.low_water < config.high_water);

        let config = FlowConfig {
            high_water: 10_000,
            low_water: 512,
        }
        .normalized();
        assert_eq!(config.high_water, BUFFER_CAPACITY);
    }
}
