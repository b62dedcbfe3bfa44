//! A microcontroller board link: digital writes to drive solenoids/relays,
//! analog reads for non-ESP-NOW sensors wired directly to the board.
//!
//! Grounded on `control/arduino.py`'s `m1Digital_Write`/`m2Read_Analog`
//! pair. The original speaks Firmata over USB via `pymata4`; this
//! reimplementation drives the same two operations over a simple
//! line-oriented serial protocol (`D,<pin>,<value>\n` / `A,<pin>\n` ->
//! `<value>\n`), matching the "attempt connection, fall back to a logged
//! simulated board on failure" behavior so scene scripts never have to
//! check whether hardware is attached.

use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{info, warn};

use crate::doors::Board as DoorBoard;

const READ_TIMEOUT: Duration = Duration::from_millis(100);

enum Link {
    Connected {
        writer: Mutex<Box<dyn serialport::SerialPort>>,
        reader: Mutex<BufReader<Box<dyn serialport::SerialPort>>>,
    },
    Simulated,
}

/// One physical board (e.g. "M1" or "M2" in the historical naming).
pub struct Board {
    name: String,
    link: Link,
    simulated_analog: AtomicU32,
}

impl Board {
    /// Attempt to open `port_name` at `baud`; on any failure, fall back to
    /// a simulated board that logs every write and returns 0 for reads.
    pub fn connect(name: &str, port_name: &str, baud: u32) -> Self {
        match serialport::new(port_name, baud).timeout(READ_TIMEOUT).open() {
            Ok(port) => {
                info!("board {} connected on {}", name, port_name);
                let reader_port = port.try_clone().expect("cloning serial handle for reader");
                Self {
                    name: name.to_string(),
                    link: Link::Connected {
                        writer: Mutex::new(port),
                        reader: Mutex::new(BufReader::new(reader_port)),
                    },
                    simulated_analog: AtomicU32::new(0),
                }
            }
            Err(e) => {
                warn!("board {} not found on {}, simulating: {}", name, port_name, e);
                Self {
                    name: name.to_string(),
                    link: Link::Simulated,
                    simulated_analog: AtomicU32::new(0),
                }
            }
        }
    }

    pub fn digital_write(&self, pin: u8, value: bool) {
        match &self.link {
            Link::Connected { writer, .. } => {
                let line = format!("D,{},{}\n", pin, value as u8);
                if let Err(e) = writer.lock().unwrap().write_all(line.as_bytes()) {
                    warn!("board {} write failed: {}", self.name, e);
                }
            }
            Link::Simulated => {
                info!("(simulated) board {} digital_write(pin={}, value={})", self.name, pin, value);
            }
        }
    }

    pub fn analog_read(&self, pin: u8) -> u16 {
        match &self.link {
            Link::Connected { writer, reader } => {
                {
                    let mut w = writer.lock().unwrap();
                    if let Err(e) = w.write_all(format!("A,{pin}\n").as_bytes()) {
                        warn!("board {} analog_read request failed: {}", self.name, e);
                        return 0;
                    }
                }
                let mut line = String::new();
                let mut r = reader.lock().unwrap();
                match r.read_line(&mut line) {
                    Ok(0) => 0,
                    Ok(_) => line.trim().parse().unwrap_or(0),
                    Err(_) => 0,
                }
            }
            Link::Simulated => self.simulated_analog.load(Ordering::Relaxed) as u16,
        }
    }
}

impl DoorBoard for Board {
    fn write_solenoid(&self, pin: u8, energize: bool) {
        self.digital_write(pin, energize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_board_analog_read_defaults_to_zero() {
        let board = Board {
            name: "test".to_string(),
            link: Link::Simulated,
            simulated_analog: AtomicU32::new(0),
        };
        assert_eq!(board.analog_read(3), 0);
    }

    #[test]
    fn simulated_board_digital_write_does_not_panic() {
        let board = Board {
            name: "test".to_string(),
            link: Link::Simulated,
            simulated_analog: AtomicU32::new(0),
        };
        board.digital_write(4, true);
    }
}
