//! Per-peer J1939 connections.
//!
//! A [`Connection`] pairs one raw CAN socket with the shared
//! [`Network`] map: outgoing frames get their source (and, for directed
//! sends, destination) addresses stamped from the map at call time, and
//! inbound frames are dropped unless their addresses line up with the
//! configured local and target NAMEs. Sending happens through the
//! [`ConnectionHandle`] half, over a caller-sized FIFO that the connection
//! drains one write at a time.

use embassy_futures::select::{select, Either};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    zerocopy_channel::{Channel, Receiver, Sender},
};

use crate::{Filter, Frame, Name, Network};

mod async_can;

pub use async_can::AsyncCan;

/// Synchronous rejection of a misused send API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendError {
    /// `broadcast` was handed a directed frame.
    NotBroadcast,
    /// `send`/`send_to` was handed a broadcast frame.
    NotDirected,
    NoLocalName,
    NoTargetName,
    /// The local NAME holds no address in the network map.
    LocalUnbound,
    /// The target NAME holds no address in the network map.
    TargetUnbound,
}

/// Lifecycle and traffic notifications from a [`Connection`].
///
/// `on_read` and `on_error` carry the substance; the rest default to
/// no-ops.
pub trait ConnectionObserver<E> {
    fn on_start(&mut self) {}

    fn on_destroy(&mut self) {}

    /// An inbound frame that passed address validation.
    fn on_read(&mut self, frame: &Frame);

    /// An outbound frame that finished writing to the socket.
    fn on_send(&mut self, frame: &Frame) {
        let _ = frame;
    }

    /// A socket failure; the connection is done after reporting one.
    fn on_error(&mut self, context: &'static str, error: &E);
}

/// The receive-and-drain half of a connection. Owns the socket.
pub struct Connection<'a, C: AsyncCan, O: ConnectionObserver<C::Error>> {
    can: C,
    network: &'a Network,
    local_name: Option<Name>,
    target_name: Option<Name>,
    observer: O,
    rx: Receiver<'a, CriticalSectionRawMutex, Frame>,
}

/// The sending half. Stamps addresses from the network map and enqueues;
/// senders back-pressure when the queue is full, frames are never dropped.
pub struct ConnectionHandle<'a> {
    tx: Sender<'a, CriticalSectionRawMutex, Frame>,
    network: &'a Network,
    local_name: Option<Name>,
    target_name: Option<Name>,
}

async fn receive_frame<C: AsyncCan>(can: &mut C) -> Result<Option<Frame>, C::Error> {
    let raw = can.receive().await?;
    // Standard-format frames have no place on a J1939 bus.
    Ok(Frame::from_can_frame(&raw))
}

impl<'a, C, O> Connection<'a, C, O>
where
    C: AsyncCan,
    O: ConnectionObserver<C::Error>,
{
    /// Build a connection over `can`, with its outgoing queue living in the
    /// caller-provided `channel` buffer.
    ///
    /// `local_name` scopes inbound directed traffic to our claimed address
    /// and is required for sending; `target_name` pins the peer this
    /// connection talks to. Leave both unset for a promiscuous connection
    /// (the right shape for feeding an
    /// [`AddressClaimer`](crate::AddressClaimer)).
    pub fn new(
        can: C,
        network: &'a Network,
        local_name: Option<Name>,
        target_name: Option<Name>,
        observer: O,
        channel: &'a mut Channel<'_, CriticalSectionRawMutex, Frame>,
    ) -> (Self, ConnectionHandle<'a>) {
        let (tx, rx) = channel.split();

        (
            Self {
                can,
                network,
                local_name,
                target_name,
                observer,
                rx,
            },
            ConnectionHandle {
                tx,
                network,
                local_name,
                target_name,
            },
        )
    }

    /// Bind the socket, installing receive filters. Failures go to
    /// `on_error` and are returned.
    pub fn open(&mut self, filters: &[Filter]) -> Result<(), C::Error> {
        if let Err(error) = self.can.open(filters) {
            self.observer.on_error("open", &error);
            return Err(error);
        }
        Ok(())
    }

    /// Announce the connection as live.
    pub fn start(&mut self) {
        self.observer.on_start();
    }

    pub fn local_name(&self) -> Option<Name> {
        self.local_name
    }

    pub fn target_name(&self) -> Option<Name> {
        self.target_name
    }

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Drive the connection until the next accepted inbound frame.
    ///
    /// Queued outgoing frames drain in FIFO order, one write in flight at
    /// a time, with `on_send` after each completed write. Inbound frames
    /// that fail address validation are dropped silently. A socket error
    /// is reported through `on_error` and ends the connection; the caller
    /// drops it, which closes the socket.
    pub async fn poll(&mut self) -> Result<Frame, C::Error> {
        loop {
            match select(self.rx.receive(), receive_frame(&mut self.can)).await {
                Either::First(slot) => {
                    let frame = slot.clone();
                    self.rx.receive_done();

                    if let Err(error) = self.can.send(frame.to_can_frame()).await {
                        self.observer.on_error("write", &error);
                        return Err(error);
                    }
                    self.observer.on_send(&frame);
                }
                Either::Second(Ok(Some(frame))) => {
                    if self.accepts(&frame) {
                        self.observer.on_read(&frame);
                        return Ok(frame);
                    }
                }
                Either::Second(Ok(None)) => {}
                Either::Second(Err(error)) => {
                    self.observer.on_error("read", &error);
                    return Err(error);
                }
            }
        }
    }

    /// The raw-socket filters cannot pin dynamic addresses, so every
    /// inbound frame is checked against the map: directed traffic must be
    /// for our current address, and with a target configured it must come
    /// from the target's current address.
    fn accepts(&self, frame: &Frame) -> bool {
        if self.local_name.is_none() && self.target_name.is_none() {
            return true;
        }

        if let Some(local) = self.local_name {
            if !frame.is_broadcast()
                && self.network.find_address(local) != Some(frame.id.destination())
            {
                return false;
            }
        }

        if let Some(target) = self.target_name {
            if self.network.find_address(target) != Some(frame.id.source()) {
                return false;
            }
        }

        true
    }
}

impl<C: AsyncCan, O: ConnectionObserver<C::Error>> Drop for Connection<'_, C, O> {
    fn drop(&mut self) {
        self.can.close();
        self.observer.on_destroy();
    }
}

impl ConnectionHandle<'_> {
    pub fn local_name(&self) -> Option<Name> {
        self.local_name
    }

    pub fn target_name(&self) -> Option<Name> {
        self.target_name
    }

    /// Enqueue a frame exactly as given.
    pub async fn send_raw(&mut self, frame: Frame) {
        *self.tx.send().await = frame;
        self.tx.send_done();
    }

    /// Enqueue a broadcast frame, stamping the source address from the
    /// local NAME's current binding.
    pub async fn broadcast(&mut self, mut frame: Frame) -> Result<(), SendError> {
        if !frame.is_broadcast() {
            return Err(SendError::NotBroadcast);
        }
        let local = self.local_name.ok_or(SendError::NoLocalName)?;
        let source = self
            .network
            .find_address(local)
            .ok_or(SendError::LocalUnbound)?;

        frame.id.set_source(source);
        self.send_raw(frame).await;
        Ok(())
    }

    /// Enqueue a directed frame to the configured target NAME.
    pub async fn send(&mut self, frame: Frame) -> Result<(), SendError> {
        let target = self.target_name.ok_or(SendError::NoTargetName)?;
        self.send_to(target, frame).await
    }

    /// Enqueue a directed frame to an explicit peer, stamping source and
    /// destination from the map's current bindings.
    pub async fn send_to(&mut self, target: Name, mut frame: Frame) -> Result<(), SendError> {
        if frame.is_broadcast() {
            return Err(SendError::NotDirected);
        }
        let local = self.local_name.ok_or(SendError::NoLocalName)?;
        let source = self
            .network
            .find_address(local)
            .ok_or(SendError::LocalUnbound)?;
        let destination = self
            .network
            .find_address(target)
            .ok_or(SendError::TargetUnbound)?;

        frame.id.set_source(source);
        frame.id.set_pdu_specific(destination);
        self.send_raw(frame).await;
        Ok(())
    }
}
