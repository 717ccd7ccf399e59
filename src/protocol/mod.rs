//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │      JSON Payload (Len)     │
//! └──────────┴─────────────────────────────┘
//! ```
//! Len is big-endian and at most [`MAX_FRAME_SIZE`].
//!
//! ### Request
//! `{"id": "...", "reads": [...], "conditions": {k: v|null}, "writes": {k: v|null}}`
//!
//! A `null` condition means the key must be absent; a `null` write removes it.
//!
//! ### Response
//! - `{"id": "...", "result": {k: v|null}}`
//! - `{"id": "...", "error": "...", "unavailable": bool}`

mod codec;
mod message;

pub use codec::{
    decode_frame, encode_frame, read_frame, write_frame, HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use message::{Request, Response};
