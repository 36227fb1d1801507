//! PTY Streams
//!
//! Bridges the blocking PTY master to async code: a reader thread pushes
//! output chunks into a tokio channel, a writer thread drains input from a
//! std channel into the master.

use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{channel, Sender as StdSender};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

const READ_BUFFER_SIZE: usize = 8192;
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;
const MAX_CONSECUTIVE_WRITE_ERRORS: u32 = 3;
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// PTY I/O channels
pub struct PtyStreams {
    /// Output bytes from the PTY; closes at EOF
    output_rx: UnboundedReceiver<Vec<u8>>,
    /// Input bytes for the PTY
    input_tx: StdSender<Vec<u8>>,
}

impl PtyStreams {
    /// Start the reader and writer threads for a PTY master
    pub fn spawn(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        let (output_tx, output_rx) = unbounded_channel::<Vec<u8>>();
        let (input_tx, input_rx) = channel::<Vec<u8>>();

        thread::spawn(move || read_loop(reader, output_tx));
        thread::spawn(move || {
            let mut writer = writer;
            write_loop(&mut *writer, input_rx);
        });

        Self {
            output_rx,
            input_tx,
        }
    }

    /// Split into the output receiver and the input sender
    pub fn into_parts(self) -> (UnboundedReceiver<Vec<u8>>, StdSender<Vec<u8>>) {
        (self.output_rx, self.input_tx)
    }
}

fn read_loop(mut reader: Box<dyn Read + Send>, output_tx: UnboundedSender<Vec<u8>>) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut consecutive_errors = 0;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("PTY read EOF");
                break;
            }
            Ok(n) => {
                consecutive_errors = 0;
                if output_tx.send(buf[..n].to_vec()).is_err() {
                    debug!("PTY output receiver dropped, stopping reader thread");
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                // Linux reports EIO on the master once the last slave fd closes
                #[cfg(unix)]
                if e.raw_os_error() == Some(nix::libc::EIO) {
                    debug!("PTY slave closed (EIO)");
                    break;
                }

                consecutive_errors += 1;
                warn!(
                    "PTY read error ({}): {} (attempt {}/{})",
                    e.kind(),
                    e,
                    consecutive_errors,
                    MAX_CONSECUTIVE_READ_ERRORS
                );
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    error!("PTY read: too many consecutive errors, stopping reader thread");
                    break;
                }
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
    debug!("PTY reader thread exiting");
}

fn write_loop(writer: &mut dyn Write, input_rx: std::sync::mpsc::Receiver<Vec<u8>>) {
    let mut consecutive_errors = 0;

    while let Ok(data) = input_rx.recv() {
        let mut attempts = 0;
        loop {
            match writer.write_all(&data) {
                Ok(()) => {
                    consecutive_errors = 0;
                    if let Err(e) = writer.flush() {
                        debug!("PTY flush error: {}", e);
                    }
                    break;
                }
                Err(e) => {
                    attempts += 1;
                    if e.kind() == ErrorKind::Interrupted {
                        continue;
                    }
                    if e.kind() == ErrorKind::WouldBlock && attempts < MAX_WRITE_ATTEMPTS {
                        thread::sleep(Duration::from_millis(10));
                        continue;
                    }

                    consecutive_errors += 1;
                    warn!(
                        "PTY write error ({}): {} (consecutive errors: {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_WRITE_ERRORS
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_WRITE_ERRORS {
                        error!("PTY write: too many consecutive errors, stopping writer thread");
                        return;
                    }
                    break;
                }
            }
        }
    }
    debug!("PTY writer thread exiting");
}

/// Incremental UTF-8 decoder for PTY output.
///
/// PTY reads split the stream at arbitrary byte offsets, so a multi-byte
/// character (every kana and kanji) may straddle two chunks. Incomplete
/// trailing sequences are held back until the next chunk; genuinely invalid
/// bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as is complete
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        let mut keep_from = self.pending.len();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            keep_from = self.pending.len() - after.len();
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..keep_from);
        out
    }

    /// Flush whatever is still pending, lossily
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
