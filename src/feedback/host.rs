//! Host link seam and a line-based serial implementation
//!
//! Outbound traffic is one line per message. Both directions run on
//! background threads and only meet the tick loop through channels, so
//! neither sending nor polling ever waits. A host that stops reading fills
//! the bounded outbound backlog and further lines are dropped.

use crate::error::SinkError;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError, TrySendError};
use std::thread;
use std::time::Duration;

/// Lines that may wait for the writer thread before new ones are dropped
pub const OUTBOUND_BACKLOG: usize = 64;

/// Read and write timeout on a real serial port
const SERIAL_TIMEOUT: Duration = Duration::from_millis(500);

/// Bidirectional, line-oriented byte stream to the host
pub trait HostLink {
    /// Send one line; the newline is added by the link
    fn send_line(&mut self, line: &str) -> Result<(), SinkError>;

    /// Next complete inbound line, without waiting
    fn poll_line(&mut self) -> Result<Option<String>, SinkError>;
}

/// Host link over any writer plus a reader, each drained on its own thread
pub struct SerialHostLink {
    outbound: Option<SyncSender<String>>,
    inbound: Option<Receiver<String>>,
}

impl SerialHostLink {
    /// Outbound-only link
    pub fn new<W>(out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            outbound: spawn_writer(out),
            inbound: None,
        }
    }

    /// Link that also reads lines from `input`
    pub fn with_reader<W, R>(out: W, input: R) -> Self
    where
        W: Write + Send + 'static,
        R: Read + Send + 'static,
    {
        Self {
            outbound: spawn_writer(out),
            inbound: spawn_reader(input),
        }
    }

    /// Open a serial port, e.g. `/dev/ttyACM0`
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SinkError> {
        let port = serialport::new(path, baud_rate)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|e| SinkError::Unavailable(format!("{}: {}", path, e)))?;
        let reader = port
            .try_clone()
            .map_err(|e| SinkError::Unavailable(format!("{}: {}", path, e)))?;
        log::info!("host link on {} at {} baud", path, baud_rate);
        Ok(Self::with_reader(port, reader))
    }
}

/// Errors a timed-out or interrupted port raises while still usable
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

fn spawn_writer<W>(mut out: W) -> Option<SyncSender<String>>
where
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel::<String>(OUTBOUND_BACKLOG);
    let spawned = thread::Builder::new()
        .name("host-link-writer".into())
        .spawn(move || {
            for line in rx {
                let written = writeln!(out, "{}", line).and_then(|_| out.flush());
                match written {
                    Ok(()) => {}
                    Err(e) if is_transient(&e) => log::debug!("host link write skipped: {}", e),
                    Err(e) => {
                        log::warn!("host link write failed: {}", e);
                        break;
                    }
                }
            }
        });

    match spawned {
        Ok(_) => Some(tx),
        Err(e) => {
            log::warn!("could not start host link writer: {}", e);
            None
        }
    }
}

fn spawn_reader<R>(input: R) -> Option<Receiver<String>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("host-link-reader".into())
        .spawn(move || read_lines(input, tx));

    match spawned {
        Ok(_) => Some(rx),
        Err(e) => {
            log::warn!("could not start host link reader: {}", e);
            None
        }
    }
}

/// Forward each newline-terminated line until EOF or a hard read error
///
/// A line that is not valid UTF-8 is skipped on its own.
fn read_lines<R: Read>(input: R, tx: Sender<String>) {
    let mut reader = BufReader::new(input);
    let mut buf = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let bytes = std::mem::take(&mut buf);
                match String::from_utf8(bytes) {
                    Ok(mut line) => {
                        let len = line.trim_end_matches(['\r', '\n']).len();
                        line.truncate(len);
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::debug!("host link line skipped: {}", e),
                }
            }
            // Partial data stays in `buf` until the rest of the line arrives
            Err(e) if is_transient(&e) => {}
            Err(e) => {
                log::debug!("host link read failed: {}", e);
                break;
            }
        }
    }
}

impl HostLink for SerialHostLink {
    fn send_line(&mut self, line: &str) -> Result<(), SinkError> {
        let Some(tx) = self.outbound.as_ref() else {
            return Err(SinkError::Unavailable("host link writer stopped".into()));
        };
        match tx.try_send(line.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkError::Backlogged),
            Err(TrySendError::Disconnected(_)) => {
                self.outbound = None;
                Err(SinkError::Unavailable("host link writer stopped".into()))
            }
        }
    }

    fn poll_line(&mut self) -> Result<Option<String>, SinkError> {
        let Some(rx) = self.inbound.as_ref() else {
            return Ok(None);
        };
        match rx.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                // Host closed its side; outbound may still work
                log::info!("host link input closed");
                self.inbound = None;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    /// Writer whose bytes stay visible to the test
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writer that blocks until its gate is dropped, then reports the peer gone
    struct StalledWriter {
        gate: Receiver<()>,
    }

    impl Write for StalledWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            let _ = self.gate.recv();
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn eventually(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn poll_until_some(link: &mut SerialHostLink) -> Option<String> {
        let mut found = None;
        eventually(|| {
            found = link.poll_line().unwrap();
            found.is_some()
        });
        found
    }

    #[test]
    fn send_line_appends_newline() {
        let out = SharedBuf::default();
        let mut link = SerialHostLink::new(out.clone());
        link.send_line(r#"{"type":"layer_change"}"#).unwrap();
        link.send_line("second").unwrap();
        let expected = "{\"type\":\"layer_change\"}\nsecond\n";
        assert!(eventually(|| out.text() == expected), "got {:?}", out.text());
    }

    #[test]
    fn stalled_host_drops_lines_without_waiting() {
        let (gate, wait) = mpsc::channel();
        let mut link = SerialHostLink::new(StalledWriter { gate: wait });

        let started = Instant::now();
        let results: Vec<_> = (0..200).map(|i| link.send_line(&format!("line {}", i))).collect();
        assert!(started.elapsed() < Duration::from_secs(1));

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        // One line may already sit in the stalled writer
        assert!((OUTBOUND_BACKLOG..=OUTBOUND_BACKLOG + 1).contains(&accepted));
        for err in results.into_iter().filter_map(Result::err) {
            assert!(matches!(err, SinkError::Backlogged));
            assert!(!err.is_fatal_for_sink());
        }

        // Once the writer gives up the link reports itself gone
        drop(gate);
        let gone = eventually(|| {
            matches!(link.send_line("late"), Err(SinkError::Unavailable(_)))
        });
        assert!(gone);
    }

    #[test]
    fn outbound_only_link_never_has_input() {
        let mut link = SerialHostLink::new(io::sink());
        assert_eq!(link.poll_line().unwrap(), None);
    }

    #[test]
    fn reads_lines_in_order() {
        let input = Cursor::new(b"debugging\r\nreviewing\n".to_vec());
        let mut link = SerialHostLink::with_reader(io::sink(), input);
        assert_eq!(poll_until_some(&mut link).as_deref(), Some("debugging"));
        assert_eq!(poll_until_some(&mut link).as_deref(), Some("reviewing"));
    }

    #[test]
    fn invalid_utf8_line_is_skipped() {
        let input = Cursor::new(b"\xff\xfe\ndebugging\nunterminated".to_vec());
        let mut link = SerialHostLink::with_reader(io::sink(), input);
        assert_eq!(poll_until_some(&mut link).as_deref(), Some("debugging"));
        assert_eq!(poll_until_some(&mut link).as_deref(), Some("unterminated"));
    }

    #[test]
    fn closed_input_is_not_an_error() {
        let mut link = SerialHostLink::with_reader(io::sink(), Cursor::new(Vec::new()));
        let closed = eventually(|| {
            assert_eq!(link.poll_line().unwrap(), None);
            link.inbound.is_none()
        });
        assert!(closed);
        assert!(link.send_line("still writable").is_ok());
    }

    #[test]
    fn missing_serial_port_is_unavailable() {
        let result = SerialHostLink::open("/dev/ctrl-macropad-no-such-port", 115_200);
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
    }
}
