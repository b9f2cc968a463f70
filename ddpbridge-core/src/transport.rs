//! Serial transport: framed writes to the device, diagnostic reads from it
//!
//! The writer and reader are generic over `Write`/`Read` so the serial port
//! can be swapped for an in-memory buffer in tests. The dispatch engine is
//! the only writer; the reader owns a cloned handle on its own thread.

use crate::cobs;
use crate::constants::{
    DIAGNOSTIC_PREFIX, ERROR_BACKOFF, FRAME_DELIMITER, MAX_SERIAL_LINE, SERIAL_POLL_IDLE,
    SERIAL_READ_TIMEOUT, SERIAL_WRITE_TIMEOUT,
};
use crate::error::BridgeError;
use crate::telemetry::{Severity, Telemetry};
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[cfg(feature = "logging")]
use tracing::debug;

/// Encodes packets and writes them to the device
pub struct SerialWriter<W: Write> {
    link: W,
    telemetry: Arc<Telemetry>,
}

impl<W: Write> SerialWriter<W> {
    /// Wrap a writable link
    pub fn new(link: W, telemetry: Arc<Telemetry>) -> Self {
        Self { link, telemetry }
    }

    /// Frame `packet`, write it and flush
    ///
    /// Failures are logged and counted, never propagated: a missing device
    /// must not stop the bridge, and the next packet is attempted normally.
    pub fn send_packet(&mut self, packet: &[u8]) -> bool {
        let encoded = cobs::encode(packet);
        match self.write_encoded(&encoded) {
            Ok(()) => {
                self.telemetry.record_sent(packet.len());
                self.telemetry.set_connected(true);
                true
            }
            Err(e) => {
                self.telemetry.record_write_error();
                self.telemetry.set_connected(false);
                self.telemetry
                    .log(Severity::Error, format!("[ERROR] Serial write failed: {}", e));
                false
            }
        }
    }

    /// Write a single delimiter to check the link accepts data
    pub fn write_test(&mut self) -> io::Result<()> {
        self.write_encoded(&[FRAME_DELIMITER])
    }

    /// Underlying link
    pub fn get_ref(&self) -> &W {
        &self.link
    }

    /// Unwrap the link
    pub fn into_inner(self) -> W {
        self.link
    }

    fn write_encoded(&mut self, encoded: &[u8]) -> io::Result<()> {
        self.link.write_all(encoded)?;
        self.link.flush()
    }
}

/// Extracts diagnostic lines from the inbound byte stream
///
/// Complete `\n`-terminated lines are decoded (lossy UTF-8), trimmed, and
/// kept only if they start with the diagnostic prefix. Inbound COBS frames
/// are skipped up to their delimiter without being interpreted.
#[derive(Debug)]
pub struct LineScanner {
    buf: Vec<u8>,
    prefix: String,
    max_buffer: usize,
}

impl LineScanner {
    /// Scanner keeping lines that start with `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            buf: Vec::new(),
            prefix: prefix.into(),
            max_buffer: MAX_SERIAL_LINE,
        }
    }

    /// Consume a chunk, returning the diagnostic lines it completed
    ///
    /// The buffer is walked in arrival order: each `0x00` discards the
    /// framed bytes before it, each `\n` completes a line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(idx) = memchr::memchr2(b'\n', FRAME_DELIMITER, &self.buf[start..]) {
            let end = start + idx;
            if self.buf[end] == b'\n' {
                let line = String::from_utf8_lossy(&self.buf[start..end]);
                let line = line.trim();
                if !line.is_empty() && line.starts_with(self.prefix.as_str()) {
                    lines.push(line.to_string());
                }
            }
            start = end + 1;
        }
        self.buf.drain(..start);

        if self.buf.len() > self.max_buffer {
            self.buf.clear();
        }

        lines
    }

    /// Bytes waiting for a newline or delimiter
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineScanner {
    fn default() -> Self {
        Self::new(DIAGNOSTIC_PREFIX)
    }
}

/// Reads the device side of the link on its own thread
pub struct SerialReader<R: Read> {
    link: R,
    scanner: LineScanner,
    telemetry: Arc<Telemetry>,
}

impl<R: Read> SerialReader<R> {
    /// Reader surfacing lines that start with `prefix`
    pub fn new(link: R, prefix: impl Into<String>, telemetry: Arc<Telemetry>) -> Self {
        Self {
            link,
            scanner: LineScanner::new(prefix),
            telemetry,
        }
    }

    /// Read one chunk and process it
    ///
    /// Returns the number of bytes read; timeouts count as zero.
    pub fn poll(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match self.link.read(buf) {
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(0)
            }
            Err(e) => return Err(e),
        };

        if n > 0 {
            self.telemetry.record_serial_bytes(n);
            for line in self.scanner.feed(&buf[..n]) {
                self.telemetry.record_device_line(&line);
            }
        }
        Ok(n)
    }

    /// Run until `shutdown` is set
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let mut buf = [0u8; 1024];
        while !shutdown.load(Ordering::Relaxed) {
            match self.poll(&mut buf) {
                Ok(0) => thread::sleep(SERIAL_POLL_IDLE),
                Ok(_) => {}
                Err(e) => {
                    self.telemetry
                        .log(Severity::Error, format!("[ERROR] Serial RX: {}", e));
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        #[cfg(feature = "logging")]
        debug!("Serial reader stopped");
    }
}

/// Read and write handles onto one serial device
pub struct SerialLink {
    /// Handle for the reader thread, with the short read timeout
    pub reader: Box<dyn SerialPort>,
    /// Handle for the dispatch engine, with the longer write timeout
    pub writer: Box<dyn SerialPort>,
}

/// Open a serial device and split it into reader and writer handles
pub fn open_link(path: &str, baud: u32) -> Result<SerialLink, BridgeError> {
    let serial_err = |source| BridgeError::Serial {
        port: path.to_string(),
        source,
    };

    let reader = serialport::new(path, baud)
        .timeout(SERIAL_READ_TIMEOUT)
        .open()
        .map_err(serial_err)?;

    // Timeouts are per handle, so the clone can carry the write bound
    let mut writer = reader.try_clone().map_err(serial_err)?;
    writer.set_timeout(SERIAL_WRITE_TIMEOUT).map_err(serial_err)?;

    Ok(SerialLink { reader, writer })
}

/// Serial ports visible to the OS
pub fn list_ports() -> Result<Vec<SerialPortInfo>, BridgeError> {
    Ok(serialport::available_ports()?)
}

/// Human-readable description of a port
pub fn describe_port(info: &SerialPortInfo) -> String {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB Serial");
            let manufacturer = usb.manufacturer.as_deref().unwrap_or("");
            format!("{} {}", manufacturer, product).trim().to_string()
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

/// Pick the device most likely to be the LED controller
///
/// Prefers a port whose description mentions "Pico" or "USB Serial",
/// falling back to the first port listed.
pub fn select_port(ports: &[SerialPortInfo]) -> Option<String> {
    ports
        .iter()
        .find(|info| {
            let description = describe_port(info);
            description.contains("Pico") || description.contains("USB Serial")
        })
        .or_else(|| ports.first())
        .map(|info| info.port_name.clone())
}

/// Auto-detect the controller's serial port
pub fn detect_port() -> Result<String, BridgeError> {
    select_port(&list_ports()?).ok_or(BridgeError::NoSerialPort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    struct FailingLink;

    impl Write for FailingLink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "device unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_frames_and_counts() {
        let telemetry = Arc::new(Telemetry::new("mem"));
        let mut writer = SerialWriter::new(Vec::new(), Arc::clone(&telemetry));

        assert!(writer.send_packet(&[1, 0, 2]));
        assert_eq!(writer.get_ref(), &vec![0x02, 0x01, 0x02, 0x02, 0x00]);

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.packets_sent, 1);
        assert_eq!(snapshot.bytes_sent, 3);
        assert!(telemetry.is_connected());
    }

    #[test]
    fn test_writer_failure_is_counted_not_fatal() {
        let telemetry = Arc::new(Telemetry::new("mem"));
        let mut writer = SerialWriter::new(FailingLink, Arc::clone(&telemetry));

        assert!(!writer.send_packet(&[1, 2, 3]));
        assert!(!writer.send_packet(&[4, 5, 6]));

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.write_errors, 2);
        assert_eq!(snapshot.packets_sent, 0);
        assert!(!telemetry.is_connected());
        assert!(telemetry
            .recent_events()
            .iter()
            .any(|e| e.message.contains("Serial write failed")));
    }

    #[test]
    fn test_write_test_sends_delimiter() {
        let telemetry = Arc::new(Telemetry::new("mem"));
        let mut writer = SerialWriter::new(Vec::new(), telemetry);
        writer.write_test().unwrap();
        assert_eq!(writer.into_inner(), vec![0x00]);
    }

    #[test]
    fn test_scanner_filters_prefix() {
        let mut scanner = LineScanner::default();
        let lines = scanner.feed(b"[DDPico] [Info] ready\r\nnoise line\n  [DDPico] ok  \n");
        assert_eq!(lines, vec!["[DDPico] [Info] ready", "[DDPico] ok"]);
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn test_scanner_joins_split_lines() {
        let mut scanner = LineScanner::default();
        assert!(scanner.feed(b"[DDP").is_empty());
        assert_eq!(scanner.feed(b"ico] hi\n"), vec!["[DDPico] hi"]);
    }

    #[test]
    fn test_scanner_discards_frames() {
        let mut scanner = LineScanner::default();
        let mut stream = cobs::encode(&[0x41, 0, 1, 1]).to_vec();
        stream.extend_from_slice(b"[DDPico] after\n");

        assert_eq!(scanner.feed(&stream), vec!["[DDPico] after"]);

        assert!(scanner.feed(&cobs::encode(&[9, 9, 9])).is_empty());
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn test_scanner_line_after_frame_in_one_read() {
        let mut scanner = LineScanner::default();
        let mut stream = b"[DDPico] before\n".to_vec();
        stream.extend_from_slice(&cobs::encode(&[0x41, 0x0A, 0x01]));
        stream.extend_from_slice(b"[DDPico] after\n");
        stream.extend_from_slice(&cobs::encode(&[1, 2]));

        assert_eq!(
            scanner.feed(&stream),
            vec!["[DDPico] before", "[DDPico] after"]
        );
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn test_scanner_resets_runaway_buffer() {
        let mut scanner = LineScanner::default();
        scanner.feed(&vec![b'x'; MAX_SERIAL_LINE + 1]);
        assert_eq!(scanner.pending(), 0);
    }

    #[test]
    fn test_reader_surfaces_lines() {
        let telemetry = Arc::new(Telemetry::new("mem"));
        let input: &[u8] = b"[DDPico] [Info] Firmware version: 1.0.0\nboot noise\n";
        let mut reader = SerialReader::new(input, DIAGNOSTIC_PREFIX, Arc::clone(&telemetry));

        let mut buf = [0u8; 256];
        assert_eq!(reader.poll(&mut buf).unwrap(), input.len());

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.device_lines, 1);
        assert_eq!(snapshot.bytes_received, input.len() as u64);
        assert_eq!(
            telemetry.recent_events()[0].message,
            "[DDPico] [Info] Firmware version: 1.0.0"
        );
    }

    fn usb_port(name: &str, product: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x2E8A,
                pid: 0x000A,
                serial_number: None,
                manufacturer: Some("Raspberry Pi".to_string()),
                product: Some(product.to_string()),
            }),
        }
    }

    #[test]
    fn test_select_port_prefers_pico() {
        let ports = vec![
            SerialPortInfo {
                port_name: "/dev/ttyS0".to_string(),
                port_type: SerialPortType::Unknown,
            },
            usb_port("/dev/ttyACM0", "Pico"),
        ];
        assert_eq!(select_port(&ports), Some("/dev/ttyACM0".to_string()));
    }

    #[test]
    fn test_select_port_falls_back_to_first() {
        let ports = vec![SerialPortInfo {
            port_name: "COM3".to_string(),
            port_type: SerialPortType::PciPort,
        }];
        assert_eq!(select_port(&ports), Some("COM3".to_string()));
        assert_eq!(select_port(&[]), None);
    }
}
