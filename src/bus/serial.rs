use super::{Bus, BusError, Result};
use log::{debug, info};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// A serial port as offered to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: Option<String>,
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{} - {}", self.name, description),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The bus on a real serial port, 8 data bits, no parity, 1 stop bit
pub struct SerialBus {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialBus {
    pub fn open(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;
        info!("Opened serial port {} at {} baud", name, baud_rate);
        Ok(SerialBus {
            port,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Bus for SerialBus {
    fn clear_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(BusError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        debug!("{}: read timeout set to {:?}", self.name, timeout);
        self.port.set_timeout(timeout)?;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.port.timeout()
    }
}

#[cfg(not(feature = "test-mock"))]
pub fn list_ports() -> Vec<PortInfo> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::error!("Failed to enumerate serial ports: {}", e);
            return vec![];
        }
    };

    ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                serialport::SerialPortType::UsbPort(usb) => usb.product.or(usb.manufacturer),
                serialport::SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
                serialport::SerialPortType::PciPort => Some("PCI".to_string()),
                _ => None,
            };
            PortInfo {
                name: port.port_name,
                description: description.filter(|d| !d.is_empty() && d != "n/a"),
            }
        })
        .collect()
}

#[cfg(feature = "test-mock")]
pub fn list_ports() -> Vec<PortInfo> {
    // Mock implementation for tests
    vec![
        PortInfo {
            name: "/dev/mock0".to_string(),
            description: Some("Mock Port 1".to_string()),
        },
        PortInfo {
            name: "/dev/mock1".to_string(),
            description: None,
        },
    ]
}
