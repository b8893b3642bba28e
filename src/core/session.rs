//! Session management.
//!
//! Wires a physical link, the flow-controlled transport, the decoder, and
//! the terminal state machine together. A reader thread delivers link bytes
//! over a channel; everything else runs on the caller's thread, so decode
//! and apply stay in strict arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::proto::{Decoder, Diagnostic, TerminalState};
use super::render::Render;
use super::transport::{FlowConfig, FlowStatus, Link, Transport, TransportError};

/// A PLATO session: one link, one transport, one terminal state.
pub struct Session {
    /// Terminal state, exclusively owned here.
    pub state: TerminalState,
    decoder: Decoder,
    transport: Transport,
    /// Write half of the link.
    link: Option<Box<dyn Link>>,
    /// Running flag shared with the reader thread.
    running: Arc<AtomicBool>,
    /// Mirrors the transport's reads-paused state for the reader thread.
    paused: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    inbound_rx: Option<Receiver<Vec<u8>>>,
}

impl Session {
    pub fn new(flow: FlowConfig) -> Self {
        Self {
            state: TerminalState::new(),
            decoder: Decoder::new(),
            transport: Transport::new(flow),
            link: None,
            running: Arc::new(AtomicBool::new(false)),
            paused: Arc::new(AtomicBool::new(false)),
            reader_thread: None,
            inbound_rx: None,
        }
    }

    /// Attach a link and spawn the reader thread. The reader honors the
    /// pause flag, so XOFF really does stop physical reads.
    pub fn start(&mut self, link: Box<dyn Link>) -> Result<(), TransportError> {
        let mut reader = link.try_split().map_err(TransportError::LinkLost)?;
        self.link = Some(link);
        self.running.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        self.inbound_rx = Some(rx);

        let running = self.running.clone();
        let paused = self.paused.clone();
        let handle = thread::spawn(move || {
            let mut buffer = vec![0u8; 1024];
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if paused.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(5));
                    continue;
                }
                match reader.recv(&mut buffer) {
                    Ok(0) => {}
                    Ok(n) => {
                        if tx.send(buffer[..n].to_vec()).is_err() {
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("link read failed: {}", e);
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });
        self.reader_thread = Some(handle);
        Ok(())
    }

    /// Whether the link is still up.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drive one ingest → decode → apply → flush cycle. Returns true when
    /// at least one command was applied.
    pub fn pump(&mut self, out: &mut impl Render) -> Result<bool, TransportError> {
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        if let Some(rx) = &self.inbound_rx {
            loop {
                match rx.try_recv() {
                    Ok(data) => chunks.push(data),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.running.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        }
        for chunk in &chunks {
            self.transport.ingest(chunk);
        }
        self.sync_pause_flag();
        self.process(out)
    }

    /// Feed bytes as if they arrived from the link, then process them.
    /// Used by the loopback demo and by tests; the network path goes
    /// through [`Session::pump`].
    pub fn inject(&mut self, bytes: &[u8], out: &mut impl Render) -> Result<bool, TransportError> {
        self.transport.ingest(bytes);
        self.sync_pause_flag();
        self.process(out)
    }

    fn process(&mut self, out: &mut impl Render) -> Result<bool, TransportError> {
        let bytes = self.transport.poll_inbound();
        self.sync_pause_flag();

        let mut processed = false;
        if !bytes.is_empty() {
            let commands = self.decoder.feed(&bytes);
            for diagnostic in self.decoder.take_diagnostics() {
                match diagnostic {
                    Diagnostic::MalformedCommand { byte, offset } => {
                        warn!("malformed byte 0x{:02X} at offset {}, skipped", byte, offset);
                    }
                    Diagnostic::CoordinateOutOfRange { x, y } => {
                        warn!("coordinate ({}, {}) out of range, clamped", x, y);
                    }
                }
            }
            for command in commands {
                debug!(?command, "apply");
                self.state.apply(command, out);
                processed = true;
            }
        }

        self.flush_outbound()?;
        Ok(processed)
    }

    /// Queue user-input bytes upstream and push them onto the link.
    pub fn send_input(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.transport.submit_outbound(bytes)?;
        self.flush_outbound()
    }

    /// Flow-control snapshot, surfaced for logging and tests.
    pub fn flow_status(&self) -> FlowStatus {
        self.transport.status()
    }

    fn flush_outbound(&mut self) -> Result<(), TransportError> {
        let pending = self.transport.take_writable();
        if pending.is_empty() {
            return Ok(());
        }
        let running = &self.running;
        if let Some(link) = &mut self.link {
            if let Err(e) = link.send_all(&pending) {
                running.store(false, Ordering::SeqCst);
                return Err(TransportError::LinkLost(e));
            }
        }
        Ok(())
    }

    fn sync_pause_flag(&self) {
        self.paused
            .store(self.transport.reads_paused(), Ordering::SeqCst);
    }

    /// Stop the reader, drop buffered bytes, release the link.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        self.inbound_rx = None;
        self.link = None;
        self.transport.clear();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
