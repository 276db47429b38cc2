//! Wire format shared between the host and the drive microcontroller.
//!
//! Outbound traffic is a single opcode byte, an optional argument byte and a
//! carriage return. Inbound traffic is short ASCII frames, either wrapped in
//! `<...>` or terminated by CR/LF.

pub mod command;
pub mod frame;
pub mod response;
pub mod telemetry;

pub use command::{Command, TERMINATOR};
pub use frame::{FrameEvent, FrameParser};
pub use response::Response;
pub use telemetry::{EventKind, RovEvent};
