#![no_std]

//! SAE J1939 address claiming and per-peer frame connections on top of a raw
//! CAN socket.
//!
//! Every controller application on a J1939 bus is identified by a 64-bit
//! [`Name`] and must own a one-byte source address before it may talk.
//! Ownership is decided on the wire: a device broadcasts an address claim,
//! waits out a 250 ms settle window, and yields to any challenger whose NAME
//! has a lower numeric value. This crate provides the pieces of that dance:
//!
//! - [`Id`] / [`Frame`]: the 29-bit identifier codec and the canonical
//!   address-claim / cannot-claim / address-request frames,
//! - [`Network`]: the shared `NAME <-> address` table observed on the bus,
//! - [`AddressClaimer`]: the timed state machine that acquires and defends
//!   an address for a local NAME,
//! - [`Connection`]: a per-peer send/receive engine that stamps source and
//!   destination addresses from the network map at send time and filters
//!   inbound traffic by it.
//!
//! Everything is single-threaded cooperative: socket reads, writes and the
//! settle timer multiplex on one executor, in the embassy style.

// Pulls in the host critical-section implementation for the test build.
#[cfg(test)]
use critical_section as _;

/// Highest address a controller application can claim.
pub const MAX_UNICAST_ADDRESS: u8 = 0xFD;

/// The "idle" source address, used by devices that hold no address
/// (cannot-claim frames are sent from here).
pub const NULL_ADDRESS: u8 = 0xFE;

/// The global (broadcast) destination address.
pub const GLOBAL_ADDRESS: u8 = 0xFF;

mod id;
pub use id::{Format, Id, IdError};

mod name;
pub use name::Name;

mod frame;
pub use frame::{
    Frame, CLAIM_PRIORITY, PF_ADDRESS_CLAIM, PF_REQUEST, PGN_ADDRESS_CLAIM, PGN_REQUEST,
};

mod network;
pub use network::{Claim, Network, NetworkError};

mod filter;
pub use filter::Filter;

pub mod claimer;
pub use claimer::{AddressClaimer, ClaimError, ClaimObserver, State, CLAIM_TIMEOUT};

pub mod connection;
pub use connection::{AsyncCan, Connection, ConnectionHandle, ConnectionObserver, SendError};
