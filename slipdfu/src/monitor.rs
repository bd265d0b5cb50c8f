//! Native serial monitor primitives.
//!
//! The session side wraps a serial port for writing and control-line
//! access; `LineReader` turns the raw byte stream into complete text
//! lines, holding any partial line across reads so nothing is lost
//! at read boundaries.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "native")]
use std::io::Write as _;

/// A native monitor session wrapping a serial port connection.
#[cfg(feature = "native")]
pub struct MonitorSession {
    port: Box<dyn serialport::SerialPort>,
}

#[cfg(feature = "native")]
impl MonitorSession {
    /// Open a monitor session on the specified port and baud rate.
    pub fn open(port_name: &str, baud_rate: u32) -> crate::Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(std::time::Duration::from_millis(50))
            .open()?;
        Ok(Self { port })
    }

    /// Create a cloned reader handle for a background read loop.
    pub fn try_clone_reader(&self) -> crate::Result<Box<dyn serialport::SerialPort>> {
        Ok(self.port.try_clone()?)
    }

    /// Send one line of input to the device, CRLF-terminated.
    pub fn send_line(&mut self, line: &str) -> crate::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\r\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Set DTR line state.
    pub fn set_data_terminal_ready(&mut self, enabled: bool) -> crate::Result<()> {
        self.port.write_data_terminal_ready(enabled)?;
        Ok(())
    }

    /// Set RTS line state.
    pub fn set_request_to_send(&mut self, enabled: bool) -> crate::Result<()> {
        self.port.write_request_to_send(enabled)?;
        Ok(())
    }
}

/// One observation from the monitor's read side.
#[derive(Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A complete line, without its terminator.
    Line(String),
    /// The cancel flag was raised.
    Cancelled,
    /// The stream ended (device unplugged or port closed).
    Disconnected,
}

/// Splits a byte stream into lines, keeping a residual partial line
/// across reads.
///
/// Lines end at `\n`; a trailing `\r` is stripped so CRLF devices
/// read the same as LF devices. Bytes that are not valid UTF-8 are
/// replaced at line granularity, after framing, so a multi-byte
/// character split across two reads still decodes intact.
pub struct LineReader<R: Read> {
    source: R,
    residual: Vec<u8>,
    ready: std::collections::VecDeque<String>,
    cancel: Arc<AtomicBool>,
}

impl<R: Read> LineReader<R> {
    /// Wrap a byte source. The cancel flag may be set from another
    /// thread to stop the monitor.
    pub fn new(source: R, cancel: Arc<AtomicBool>) -> Self {
        Self {
            source,
            residual: Vec::new(),
            ready: std::collections::VecDeque::new(),
            cancel,
        }
    }

    /// Block until the next event.
    ///
    /// Read timeouts are treated as "no data yet" and keep the loop
    /// alive; only a zero-length read reports `Disconnected`, after
    /// flushing any residual partial line as a final `Line`.
    pub fn next_event(&mut self) -> crate::Result<MonitorEvent> {
        let mut scratch = [0u8; 1024];

        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(MonitorEvent::Line(line));
            }
            if self.cancel.load(Ordering::Relaxed) {
                return Ok(MonitorEvent::Cancelled);
            }

            match self.source.read(&mut scratch) {
                Ok(0) => {
                    if self.residual.is_empty() {
                        return Ok(MonitorEvent::Disconnected);
                    }
                    let line = Self::decode_line(std::mem::take(&mut self.residual));
                    return Ok(MonitorEvent::Line(line));
                },
                Ok(n) => self.accept(&scratch[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
                Err(e) => return Err(crate::Error::Io(e)),
            }
        }
    }

    fn accept(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                let line = Self::decode_line(std::mem::take(&mut self.residual));
                self.ready.push_back(line);
            } else {
                self.residual.push(byte);
            }
        }
    }

    fn decode_line(mut raw: Vec<u8>) -> String {
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        String::from_utf8_lossy(&raw).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Byte source that yields chunks one at a time, then EOF.
    struct ChunkSource {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkSource {
        fn new(chunks: &[&[u8]]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            }
        }
    }

    impl Read for ChunkSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                },
                None => Ok(0),
            }
        }
    }

    fn reader(chunks: &[&[u8]]) -> LineReader<ChunkSource> {
        LineReader::new(ChunkSource::new(chunks), Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_lines_split_across_reads() {
        let mut r = reader(&[b"hel", b"lo\nwor", b"ld\n"]);
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Line("hello".into()));
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Line("world".into()));
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Disconnected);
    }

    #[test]
    fn test_crlf_terminator_stripped() {
        let mut r = reader(&[b"ok\r\n"]);
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Line("ok".into()));
    }

    #[test]
    fn test_residual_flushed_on_disconnect() {
        let mut r = reader(&[b"partial"]);
        assert_eq!(
            r.next_event().unwrap(),
            MonitorEvent::Line("partial".into())
        );
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Disconnected);
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        // '你' is E4 BD A0; split it between two reads
        let mut r = reader(&[&[0xE4, 0xBD], &[0xA0, b'\n']]);
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Line("你".into()));
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut r = reader(&[&[0xFF, b'A', b'\n']]);
        assert_eq!(
            r.next_event().unwrap(),
            MonitorEvent::Line("\u{FFFD}A".into())
        );
    }

    #[test]
    fn test_cancel_flag_stops_reader() {
        // Source that always times out
        struct Quiet;
        impl Read for Quiet {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"))
            }
        }
        let cancel = Arc::new(AtomicBool::new(true));
        let mut r = LineReader::new(Quiet, cancel);
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Cancelled);
    }

    #[test]
    fn test_buffered_lines_drain_before_cancel() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut r = LineReader::new(ChunkSource::new(&[b"a\nb\n"]), Arc::clone(&cancel));
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Line("a".into()));
        cancel.store(true, Ordering::Relaxed);
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Line("b".into()));
        assert_eq!(r.next_event().unwrap(), MonitorEvent::Cancelled);
    }
}
