//! Bridge orchestration: open both endpoints and run the worker threads
//!
//! Four threads run until the shutdown flag is raised:
//!
//! - `udp-rx`: [`NetworkReceiver`] feeding the ingress queue
//! - `serial-rx`: [`SerialReader`] surfacing device diagnostics
//! - `dispatch`: [`DispatchEngine`], the only serial writer
//! - `stats`: [`Reporter`] summaries and the stats feed
//!
//! Stopping raises the flag and closes the queue so the dispatch thread
//! wakes immediately, then joins everything.

use crate::config::BridgeConfig;
use crate::constants::{INGRESS_QUEUE_CAPACITY, RECV_TIMEOUT, STATS_TICK};
use crate::dispatch::DispatchEngine;
use crate::error::BridgeError;
use crate::pattern::TestPattern;
use crate::queue::IngressQueue;
use crate::receiver::{self, NetworkReceiver, RawDatagram};
use crate::settings::SharedSettings;
use crate::telemetry::{Reporter, Severity, Telemetry};
use crate::transport::{self, SerialReader, SerialWriter};
use std::io::{Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(feature = "logging")]
use tracing::{debug, info};

/// A configured bridge that has not opened its endpoints yet
pub struct Bridge {
    config: BridgeConfig,
    serial_port: String,
    telemetry: Arc<Telemetry>,
    settings: Arc<SharedSettings>,
    shutdown: Arc<AtomicBool>,
}

impl Bridge {
    /// Validate `config` and resolve the serial device
    ///
    /// Auto-detects the port when the config leaves it unset.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let serial_port = match &config.serial_port {
            Some(port) => port.clone(),
            None => {
                let port = transport::detect_port()?;
                #[cfg(feature = "logging")]
                info!("Auto-detected serial port {}", port);
                port
            }
        };

        Ok(Self {
            telemetry: Arc::new(Telemetry::new(serial_port.clone())),
            settings: Arc::new(SharedSettings::new(config.tweening)),
            shutdown: Arc::new(AtomicBool::new(false)),
            serial_port,
            config,
        })
    }

    /// Resolved serial device
    pub fn serial_port(&self) -> &str {
        &self.serial_port
    }

    /// Telemetry sink shared by every thread
    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Runtime settings handle
    pub fn settings(&self) -> Arc<SharedSettings> {
        Arc::clone(&self.settings)
    }

    /// Flag that stops the bridge when raised
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Open the serial device and UDP socket, then start the threads
    ///
    /// Either endpoint failing to open is fatal. A failed write test is
    /// only a warning.
    pub fn start(self) -> Result<RunningBridge, BridgeError> {
        self.telemetry.log(
            Severity::Info,
            format!(
                "[SERIAL] Attempting to connect to {} @ {} baud...",
                self.serial_port, self.config.baud
            ),
        );
        let link = match transport::open_link(&self.serial_port, self.config.baud) {
            Ok(link) => link,
            Err(e) => {
                self.telemetry
                    .log(Severity::Error, format!("[ERROR] Serial connection failed: {}", e));
                return Err(e);
            }
        };
        self.telemetry.log(
            Severity::Info,
            format!("[SERIAL] Connected to {} @ {} baud", self.serial_port, self.config.baud),
        );

        let socket = match receiver::bind(self.config.udp_port) {
            Ok(socket) => socket,
            Err(e) => {
                self.telemetry
                    .log(Severity::Error, format!("[ERROR] UDP bind failed: {}", e));
                return Err(e);
            }
        };

        self.start_with(link.reader, link.writer, socket)
    }

    /// Start the threads over already-open endpoints
    ///
    /// The socket gets the receive timeout applied so the UDP thread sees
    /// the shutdown flag. If any thread fails to spawn, those already
    /// started are stopped before the error is returned.
    pub fn start_with<R, W>(
        self,
        reader: R,
        writer: W,
        socket: UdpSocket,
    ) -> Result<RunningBridge, BridgeError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let local_addr = socket.local_addr()?;
        let queue = Arc::new(IngressQueue::new(INGRESS_QUEUE_CAPACITY));

        let mut writer = SerialWriter::new(writer, Arc::clone(&self.telemetry));
        match writer.write_test() {
            Ok(()) => {
                self.telemetry.set_connected(true);
                self.telemetry.log(
                    Severity::Info,
                    "[SERIAL] Write test successful - port is ready for transmission",
                );
            }
            Err(e) => self
                .telemetry
                .log(Severity::Warn, format!("[WARN] Serial write test failed: {}", e)),
        }

        self.telemetry
            .log(Severity::Info, format!("[UDP] Listening on {}", local_addr));

        let mut handles = Vec::with_capacity(4);
        if let Err(e) = self.spawn_workers(&mut handles, &queue, reader, writer, socket) {
            self.telemetry
                .log(Severity::Error, format!("[ERROR] Failed to start workers: {}", e));
            halt(&self.shutdown, &queue, handles, &self.telemetry);
            return Err(e);
        }

        self.telemetry
            .log(Severity::Info, "[BRIDGE] DDP Serial Bridge started");
        self.telemetry.log(
            Severity::Info,
            format!(
                "[CONFIG] Configure DDP software to send to 127.0.0.1:{}",
                local_addr.port()
            ),
        );

        Ok(RunningBridge {
            handles,
            queue,
            telemetry: self.telemetry,
            settings: self.settings,
            shutdown: self.shutdown,
            local_addr,
        })
    }

    fn spawn_workers<R, W>(
        &self,
        handles: &mut Vec<JoinHandle<()>>,
        queue: &Arc<IngressQueue<RawDatagram>>,
        reader: R,
        mut writer: SerialWriter<W>,
        socket: UdpSocket,
    ) -> Result<(), BridgeError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let port = socket.local_addr()?.port();

        let telemetry = Arc::clone(&self.telemetry);
        let mut network = NetworkReceiver::new(socket, Arc::clone(queue), telemetry);
        let shutdown = Arc::clone(&self.shutdown);
        handles.push(spawn("udp-rx", move || network.run(&shutdown))?);

        let prefix = self.config.diagnostic_prefix.clone();
        let mut serial = SerialReader::new(reader, prefix, Arc::clone(&self.telemetry));
        let shutdown = Arc::clone(&self.shutdown);
        handles.push(spawn("serial-rx", move || serial.run(&shutdown))?);

        let reporter = Reporter::new(Arc::clone(&self.telemetry), port);
        let shutdown = Arc::clone(&self.shutdown);
        handles.push(spawn("stats", move || reporter.run(&shutdown))?);

        let pattern = self
            .config
            .test_pattern
            .then(|| TestPattern::new(self.config.led_count));
        let telemetry = Arc::clone(&self.telemetry);
        let led_count = self.config.led_count;
        let settings = Arc::clone(&self.settings);
        let queue = Arc::clone(queue);
        let shutdown = Arc::clone(&self.shutdown);
        handles.push(spawn("dispatch", move || {
            // The sweep runs on the writer's own thread ahead of any DDP traffic
            if let Some(pattern) = pattern {
                pattern.send(&mut writer, &telemetry, &shutdown);
            }
            DispatchEngine::new(led_count, queue, settings, telemetry, writer, shutdown).run();
        })?);

        Ok(())
    }
}

fn spawn<F>(name: &str, f: F) -> Result<JoinHandle<()>, BridgeError>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new().name(name.to_string()).spawn(f)?)
}

/// Raise the shutdown flag, wake the dispatch thread and join `handles`
fn halt(
    shutdown: &AtomicBool,
    queue: &IngressQueue<RawDatagram>,
    handles: Vec<JoinHandle<()>>,
    telemetry: &Telemetry,
) {
    shutdown.store(true, Ordering::Relaxed);
    queue.close();

    for handle in handles {
        #[cfg(feature = "logging")]
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            telemetry.log(Severity::Error, "[ERROR] Worker thread panicked");
        }
        #[cfg(feature = "logging")]
        debug!("Joined {}", name);
    }
}

/// A bridge whose threads are running
pub struct RunningBridge {
    handles: Vec<JoinHandle<()>>,
    queue: Arc<IngressQueue<RawDatagram>>,
    telemetry: Arc<Telemetry>,
    settings: Arc<SharedSettings>,
    shutdown: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl RunningBridge {
    /// Address the UDP socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Telemetry sink
    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Runtime settings handle
    pub fn settings(&self) -> Arc<SharedSettings> {
        Arc::clone(&self.settings)
    }

    /// Flag that stops the bridge when raised
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Block until the shutdown flag is raised, then stop
    pub fn wait(self) {
        while !self.shutdown.load(Ordering::Relaxed) {
            thread::sleep(STATS_TICK);
        }
        self.stop();
    }

    /// Raise the shutdown flag and join every thread
    pub fn stop(self) {
        self.telemetry
            .log(Severity::Info, "[BRIDGE] Shutting down...");
        halt(&self.shutdown, &self.queue, self.handles, &self.telemetry);
        self.telemetry.log(Severity::Info, "[BRIDGE] Closed");
    }
}
