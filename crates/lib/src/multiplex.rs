//! Stream multiplexing: copy bytes from many sources to many sinks.
//!
//! The multiplexer fans every chunk read from every source out to every
//! still-open sink, in real time, until all sources are exhausted. It is the
//! foundation for live log capture: a step's container output goes to the
//! console and the build log simultaneously.
//!
//! Each source is drained by a lightweight task that funnels decoded text
//! into a single mpsc merge point; one receive loop writes to the sinks.
//! Per-source byte order is preserved; interleaving between sources is
//! arbitrary.

use std::io::Write;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

/// A readable byte source. Sources are treated as UTF-8 text streams.
pub type Source = Box<dyn AsyncRead + Send + Unpin>;

/// A writable sink. A sink that fails a write or flush is considered closed
/// and is silently pruned from the active set.
pub type Sink = Box<dyn Write + Send>;

const READ_BUF_SIZE: usize = 8192;

/// Copies data from a set of sources to a set of sinks.
pub struct Multiplexer {
  sources: Vec<Source>,
  sinks: Vec<Sink>,
}

impl Multiplexer {
  pub fn new() -> Self {
    Self {
      sources: Vec::new(),
      sinks: Vec::new(),
    }
  }

  pub fn add_source(&mut self, source: Source) {
    self.sources.push(source);
  }

  pub fn add_sink(&mut self, sink: Sink) {
    self.sinks.push(sink);
  }

  /// Number of sinks still accepting writes.
  pub fn open_sinks(&self) -> usize {
    self.sinks.len()
  }

  /// Blocks until every source has been read to end-of-stream.
  ///
  /// A read error on a source is treated as end-of-stream for that source
  /// only. Sink failures never abort the copy; the failing sink is dropped
  /// for subsequent writes.
  pub async fn run(&mut self) {
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let mut readers = JoinSet::new();
    for source in self.sources.drain(..) {
      readers.spawn(pump_source(source, tx.clone()));
    }
    drop(tx);

    // The channel closes once every reader task has finished.
    while let Some(text) = rx.recv().await {
      self.fan_out(&text);
    }

    while readers.join_next().await.is_some() {}
  }

  /// Writes a synthetic line to all open sinks, outside the read loop.
  ///
  /// Used for status markers such as step pass/fail lines, including after
  /// `run()` has returned.
  pub fn write(&mut self, text: &str) {
    self.fan_out(text);
  }

  fn fan_out(&mut self, text: &str) {
    self.sinks.retain_mut(|sink| {
      match sink.write_all(text.as_bytes()).and_then(|()| sink.flush()) {
        Ok(()) => true,
        Err(e) => {
          debug!(error = %e, "dropping closed sink");
          false
        }
      }
    });
  }
}

impl Default for Multiplexer {
  fn default() -> Self {
    Self::new()
  }
}

/// Reads a source to end-of-stream, sending decoded text to the merge point.
async fn pump_source(mut source: Source, tx: mpsc::Sender<String>) {
  let mut pending: Vec<u8> = Vec::new();
  let mut buf = [0u8; READ_BUF_SIZE];

  loop {
    match source.read(&mut buf).await {
      // Zero bytes read signals end-of-stream.
      Ok(0) => break,
      Ok(n) => {
        pending.extend_from_slice(&buf[..n]);
        let text = drain_utf8(&mut pending);
        if !text.is_empty() && tx.send(text).await.is_err() {
          break;
        }
      }
      // Read errors end this source, not the whole multiplexer.
      Err(e) => {
        debug!(error = %e, "source read error, treating as end-of-stream");
        break;
      }
    }
  }

  // An incomplete trailing sequence at EOF can never complete.
  if !pending.is_empty() {
    let _ = tx.send(String::from_utf8_lossy(&pending).into_owned()).await;
  }
}

/// Decodes the longest valid UTF-8 prefix of `pending`, leaving any
/// incomplete trailing multi-byte sequence buffered for the next read.
/// Invalid bytes in the middle of the stream are replaced.
fn drain_utf8(pending: &mut Vec<u8>) -> String {
  let mut out = String::new();

  loop {
    match std::str::from_utf8(pending) {
      Ok(text) => {
        out.push_str(text);
        pending.clear();
        break;
      }
      Err(e) => {
        let valid = e.valid_up_to();
        out.push_str(&String::from_utf8_lossy(&pending[..valid]));

        match e.error_len() {
          // Invalid sequence: replace it and keep decoding.
          Some(len) => {
            out.push(char::REPLACEMENT_CHARACTER);
            pending.drain(..valid + len);
          }
          // Incomplete trailing sequence: keep it for the next read.
          None => {
            pending.drain(..valid);
            break;
          }
        }
      }
    }
  }

  out
}
