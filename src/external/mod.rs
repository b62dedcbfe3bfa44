//! External control surfaces: the HTTP operator facade today, with the
//! [`OperatorCommands`] trait it's built on kept separate so a GUI could
//! share it (see section 6 of the design doc / `control/ui.py` in the
//! historical layout).

pub mod http;
pub mod operator;

pub use operator::OperatorCommands;
