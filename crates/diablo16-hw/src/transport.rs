//! Byte transport between the dispatcher and the controller.

use crate::{Error, Result};
use std::io::{Read, Write};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

/// Byte-level link to the controller.
///
/// The dispatcher owns its transport exclusively. `read` never blocks: it
/// returns `None` when nothing is buffered.
pub trait Transport {
    /// Queues one byte for transmission.
    fn write(&mut self, byte: u8) -> Result<()>;

    /// Reads one byte if one is buffered.
    fn read(&mut self) -> Result<Option<u8>>;

    /// Number of bytes buffered and ready to read.
    fn available(&mut self) -> Result<usize>;

    /// Pushes queued bytes out. Called once per transmitted command.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, byte: u8) -> Result<()> {
        (**self).write(byte)
    }

    fn read(&mut self) -> Result<Option<u8>> {
        (**self).read()
    }

    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Read timeout handed to the OS port. Reads only happen once bytes are
/// known to be buffered, so this only bounds pathological cases.
const PORT_TIMEOUT: Duration = Duration::from_millis(50);

/// Transport over a serial port (8N1, no flow control).
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    port_path: String,
    outgoing: Vec<u8>,
}

impl SerialTransport {
    /// Opens the serial port at `port_path`.
    pub fn open(port_path: &str, baud_rate: u32) -> Result<Self> {
        let port = tokio_serial::new(port_path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| {
                // Report a missing device distinctly from other open failures
                if let tokio_serial::ErrorKind::Io(kind) = &e.kind {
                    if (*kind == std::io::ErrorKind::NotFound
                        || *kind == std::io::ErrorKind::PermissionDenied)
                        && !std::path::Path::new(port_path).exists()
                    {
                        return Error::PortNotFound(port_path.to_string());
                    }
                }
                if e.kind == tokio_serial::ErrorKind::NoDevice {
                    return Error::PortNotFound(port_path.to_string());
                }
                Error::Serial(e)
            })?;

        info!("Serial port opened: {} @ {} baud", port_path, baud_rate);

        Ok(Self {
            port,
            port_path: port_path.to_string(),
            outgoing: Vec::with_capacity(64),
        })
    }
}

/// Writes out and empties `outgoing`.
///
/// The buffer is emptied even when the port fails, so a failed command is
/// never resent in front of the next one.
fn write_out<W: Write + ?Sized>(port: &mut W, outgoing: &mut Vec<u8>) -> Result<()> {
    let bytes = std::mem::take(outgoing);
    port.write_all(&bytes)?;
    port.flush()?;
    Ok(())
}

impl Transport for SerialTransport {
    fn write(&mut self, byte: u8) -> Result<()> {
        self.outgoing.push(byte);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<u8>> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        self.port.read_exact(&mut buf)?;
        Ok(Some(buf[0]))
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn flush(&mut self) -> Result<()> {
        if self.outgoing.is_empty() {
            return Ok(());
        }
        debug!(
            "Writing {} bytes to {}: {:02X?}",
            self.outgoing.len(),
            self.port_path,
            self.outgoing
        );
        write_out(&mut *self.port, &mut self.outgoing)
    }
}
