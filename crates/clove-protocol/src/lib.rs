//! Clove Protocol - the syscall ABI of the Clove agent kernel.
//!
//! This crate provides:
//! - The fixed 17-byte little-endian frame header and async frame I/O
//! - The opcode registry
//! - Typed request payloads for every syscall
//!
//! # Wire format
//!
//! ```text
//! offset 0   u32 LE  magic = 0x41474E54 ("AGNT")
//! offset 4   u32 LE  agent_id
//! offset 8   u8      opcode
//! offset 9   u64 LE  payload_length
//! offset 17  bytes   payload
//! ```
//!
//! Payloads above the framing layer are UTF-8 JSON, except `NOOP` which
//! carries opaque bytes echoed back verbatim.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod frame;
mod opcode;
pub mod payload;

pub use frame::{Frame, FrameError, HEADER_LEN, MAGIC, MAX_PAYLOAD, read_frame, write_frame};
pub use opcode::Opcode;
