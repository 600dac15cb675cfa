use crate::global_variables::LINK_TIMEOUT_MS;
use serialport::SerialPort;
use std::io::{self, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Opens the byte link to the signal board. The command channel owns the
/// connector and calls it again whenever the link has to be re-established.
pub trait Connector {
    type Link: Write;

    fn connect(&mut self) -> io::Result<Self::Link>;

    /// Human-readable name of the far end, for logs and errors.
    fn target(&self) -> String;
}

/// A serial port, opened at a fixed baud (8N1) with a short timeout.
#[derive(Debug, Clone)]
pub struct DeviceConnector {
    path: String,
    baud_rate: u32,
    timeout: Duration,
}

impl DeviceConnector {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            timeout: Duration::from_millis(LINK_TIMEOUT_MS),
        }
    }
}

impl Connector for DeviceConnector {
    type Link = Box<dyn SerialPort>;

    fn connect(&mut self) -> io::Result<Box<dyn SerialPort>> {
        let port = serialport::new(self.path.as_str(), self.baud_rate)
            .timeout(self.timeout)
            .open()?;
        Ok(port)
    }

    fn target(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}

/// A serial-over-TCP bridge (e.g. ser2net) in front of the board.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    write_timeout: Duration,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            write_timeout: Duration::from_millis(LINK_TIMEOUT_MS),
        }
    }
}

impl Connector for TcpConnector {
    type Link = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(&self.address)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.write_timeout))?;
        Ok(stream)
    }

    fn target(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

#[derive(Debug, Default)]
struct Recording {
    transcript: Vec<u8>,
    connects: usize,
    refuse_connects: usize,
    fail_writes: usize,
}

/// Keeps every byte that would have gone to the board. Used for dry runs
/// without hardware attached, and as the link in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    shared: Arc<Mutex<Recording>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything written so far, decoded as text.
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.lock().transcript).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.transcript().lines().map(str::to_string).collect()
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    /// Makes the next `n` connect attempts fail.
    pub fn refuse_next_connects(&self, n: usize) {
        self.lock().refuse_connects = n;
    }

    /// Makes the next `n` writes fail as if the cable had been pulled.
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().fail_writes = n;
    }
}

impl Connector for RecordingConnector {
    type Link = RecordingLink;

    fn connect(&mut self) -> io::Result<RecordingLink> {
        let mut rec = self.lock();
        if rec.refuse_connects > 0 {
            rec.refuse_connects -= 1;
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "recording link refused",
            ));
        }
        rec.connects += 1;
        Ok(RecordingLink {
            shared: Arc::clone(&self.shared),
        })
    }

    fn target(&self) -> String {
        "dry-run".to_string()
    }
}

#[derive(Debug)]
pub struct RecordingLink {
    shared: Arc<Mutex<Recording>>,
}

impl Write for RecordingLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rec = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if rec.fail_writes > 0 {
            rec.fail_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link dropped"));
        }
        rec.transcript.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
