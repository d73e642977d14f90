//! # Reply correlation.
//!
//! Device protocols answer asynchronously: a ping ack, a one-wire search
//! result or a time query arrives on an inbound handler, not on the caller.
//! [`Correlator`] lets the caller wait for the reply keyed by a message id
//! without polling.
//!
//! ## Flow
//! ```text
//! caller                         Correlator                    inbound handler
//!   │ await_reply(key, t, send)      │                                │
//!   ├──────────────────────────────► │ pending fresh? ── yes ─► return│
//!   │                                │ no: register waiter            │
//!   │ ◄── send() (after arming) ──── │                                │
//!   │                                │ ◄────────── signal(key, value) ┤
//!   │ ◄──────────── Some(value) ──── │                                │
//! ```
//!
//! ## Rules
//! - At most one of {waiter, pending reply} exists per key.
//! - A reply that arrives with no waiter is kept for [`PENDING_GRACE`]; older
//!   replies are discarded, never delivered.
//! - A timed-out, cancelled or dropped wait yields `None`, never an error.

mod registry;

pub use registry::{Armed, Correlator, Waiter, PENDING_GRACE};
