//! Binary records carried inside queue segments.
//!
//! A data entry starts with an `int` count followed by that many curve-data
//! records; a negative count turns the entry into a control command. Records
//! are decoded into [`Batch`] before any store logic looks at them.

pub mod decode;
pub mod encode;
pub mod record;
pub mod wire;

pub use decode::decode;
pub use record::{
    Batch, Command1d, Command2d, DisplayMode, Opcode, Payload, Record1d, Record2d, TypeTag,
};
pub use wire::{WireReader, WireWriter};
