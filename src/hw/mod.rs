//! Microcontroller board links.

pub mod board;

use std::sync::Arc;

use crate::config::{BOARD_BAUD, BOARD_PORT_HINTS};

pub use board::Board;

/// The two fixed boards ("M1"/"M2" in the historical naming): M1 drives
/// door solenoids and relays, M2 exposes analog inputs alongside its own
/// digital outputs.
pub struct Boards {
    pub m1: Arc<Board>,
    pub m2: Arc<Board>,
}

impl Boards {
    pub fn connect() -> Self {
        Self {
            m1: Arc::new(Board::connect("M1", BOARD_PORT_HINTS[0], BOARD_BAUD)),
            m2: Arc::new(Board::connect("M2", BOARD_PORT_HINTS[1], BOARD_BAUD)),
        }
    }
}
