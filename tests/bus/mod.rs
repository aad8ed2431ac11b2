//! Mock-bus plumbing shared by the integration tests.
//!
//! Real CAN controllers do not receive their own transmissions, so the
//! "wire" here is a pair of one-way pubsub channels: each node publishes to
//! the channel the other side subscribes to.

#![allow(dead_code)]

use std::convert::Infallible;

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    pubsub::{PubSubChannel, Publisher, Subscriber},
};
use embedded_can::Id;
use j1939::AsyncCan;

pub const WIRE_CAP: usize = 16;
pub const WIRE_SUBS: usize = 4;
pub const WIRE_PUBS: usize = 4;

/// One direction of the bus.
pub type Wire = PubSubChannel<CriticalSectionRawMutex, BusFrame, WIRE_CAP, WIRE_SUBS, WIRE_PUBS>;

pub type WireTx<'a> = Publisher<'a, CriticalSectionRawMutex, BusFrame, WIRE_CAP, WIRE_SUBS, WIRE_PUBS>;
pub type WireRx<'a> = Subscriber<'a, CriticalSectionRawMutex, BusFrame, WIRE_CAP, WIRE_SUBS, WIRE_PUBS>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusFrame {
    id: Id,
    data: heapless::Vec<u8, 8>,
}

impl embedded_can::Frame for BusFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Some(Self {
            id: id.into(),
            data: heapless::Vec::from_slice(data).ok()?,
        })
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A node's view of the bus: receives one wire, transmits on the other.
pub struct FakeCan<'a> {
    rx: WireRx<'a>,
    tx: WireTx<'a>,
}

impl<'a> FakeCan<'a> {
    pub fn new(rx: &'a Wire, tx: &'a Wire) -> Self {
        Self {
            rx: rx.subscriber().unwrap(),
            tx: tx.publisher().unwrap(),
        }
    }
}

impl AsyncCan for FakeCan<'_> {
    type Error = Infallible;

    type Frame = BusFrame;

    async fn send(&mut self, frame: BusFrame) -> Result<(), Infallible> {
        self.tx.publish_immediate(frame);
        Ok(())
    }

    async fn receive(&mut self) -> Result<BusFrame, Infallible> {
        Ok(self.rx.next_message_pure().await)
    }
}
