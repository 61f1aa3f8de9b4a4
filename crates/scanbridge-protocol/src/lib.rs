//! Wire-level protocol for the scanner driver.
//!
//! The driver exposes one command channel taking an opcode and an XML payload,
//! and one event channel delivering XML documents. This crate holds the opcode
//! table ([`opcode`]), the request document builder ([`builder`]) and the
//! payload codec ([`codec`]).

pub mod builder;
pub mod codec;
pub mod opcode;

pub use builder::InArgsBuilder;
pub use opcode::{Opcode, OpcodeSpec, PROTOCOL_TABLE, PayloadShape, ResponseShape};
