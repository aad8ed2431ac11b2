//! Dynamic address claiming.
//!
//! [`StateMachine`] is the pure protocol core; [`AddressClaimer`] wraps it
//! with the one piece of real time the protocol needs: the 250 ms settle
//! window after each claim. The claimer owns no socket: frames go out
//! through [`ClaimObserver::on_frame`] and come in through
//! [`AddressClaimer::process`], so it composes with a
//! [`Connection`](crate::Connection) (or anything else) in a single
//! `select` loop:
//!
//! ```ignore
//! loop {
//!     match select(connection.poll(), claimer.tick()).await {
//!         Either::First(Ok(frame)) => claimer.process(&frame),
//!         Either::First(Err(_)) => break,
//!         Either::Second(()) => {}
//!     }
//! }
//! ```

use core::future::pending;

use embassy_time::{Duration, Instant, Timer};

use crate::{Frame, Name, Network, GLOBAL_ADDRESS};

mod machine;
pub use machine::{ClaimError, ClaimObserver, State, StateMachine};

/// The settle window: how long a claim must stand unchallenged before the
/// address is considered won.
pub const CLAIM_TIMEOUT: Duration = Duration::from_millis(250);

/// Acquires and defends one address for one local NAME.
///
/// Feed it every address-claim and request frame seen on the bus via
/// [`process`](Self::process) and keep [`tick`](Self::tick) polled; it
/// drives the [`Network`] map and emits protocol frames through the
/// observer.
pub struct AddressClaimer<'n, O: ClaimObserver> {
    machine: StateMachine,
    network: &'n Network,
    observer: O,
    deadline: Option<Instant>,
    jitter_max: Duration,
    jitter_state: u64,
}

impl<'n, O: ClaimObserver> AddressClaimer<'n, O> {
    pub fn new(name: Name, network: &'n Network, observer: O) -> Self {
        Self {
            machine: StateMachine::new(name),
            network,
            observer,
            deadline: None,
            jitter_max: Duration::from_millis(0),
            jitter_state: name.raw() | 1,
        }
    }

    /// Stretch each settle window by a uniform random extra in
    /// `0..=max`, desynchronizing devices that power up together. Zero
    /// (the default) keeps runs bit-exact.
    pub fn set_jitter(&mut self, max: Duration) {
        self.jitter_max = max;
    }

    pub fn name(&self) -> Name {
        self.machine.name()
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    /// The owned address, once the contest has settled.
    pub fn address(&self) -> Option<u8> {
        self.machine.address()
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Start contesting for `preferred`, or the lowest free address when
    /// that is taken.
    pub fn start_address_claim(&mut self, preferred: u8) {
        let before = self.machine.state();
        self.machine
            .start_claim(preferred, self.network, &mut self.observer);
        self.update_deadline(before);
    }

    /// Feed one inbound frame. Anything other than an address claim or an
    /// address request (global, or directed at our address) is ignored.
    pub fn process(&mut self, frame: &Frame) {
        if frame.is_address_claim() {
            let Some(remote) = frame.claimed_name() else {
                self.observer.on_error("process", ClaimError::BadFrame);
                return;
            };
            #[cfg(feature = "defmt")]
            defmt::debug!("address claim from {=u8:x} by {}", frame.id.source(), remote);
            let before = self.machine.state();
            self.machine
                .handle_claim(remote, frame.id.source(), self.network, &mut self.observer);
            self.update_deadline(before);
        } else if frame.is_address_request() {
            let destination = frame.id.destination();
            let ours = match self.machine.state() {
                State::Claiming(address) | State::Claimed(address) => Some(address),
                _ => None,
            };
            if destination == GLOBAL_ADDRESS || Some(destination) == ours {
                self.machine.handle_request(&mut self.observer);
            }
        }
    }

    /// Release any binding and go back to [`State::NoAddress`].
    pub fn stop(&mut self) {
        self.machine.stop(self.network, &mut self.observer);
        self.deadline = None;
    }

    /// Wait out the settle window, then finalize the claim. Pends forever
    /// while no window is armed; meant to live in a `select` with the
    /// frame source.
    pub async fn tick(&mut self) {
        match self.deadline {
            Some(at) => Timer::at(at).await,
            None => pending::<()>().await,
        }
        self.deadline = None;
        #[cfg(feature = "defmt")]
        defmt::debug!("claim settled for {}", self.machine.name());
        self.machine.timeout(&mut self.observer);
    }

    /// Rearm the settle window when a claim for a new candidate went out;
    /// a defense of the same candidate leaves the running window alone.
    fn update_deadline(&mut self, before: State) {
        match self.machine.state() {
            State::Claiming(candidate) if before != State::Claiming(candidate) => self.arm(),
            State::Claiming(_) => {}
            _ => self.deadline = None,
        }
    }

    fn arm(&mut self) {
        self.deadline = Some(Instant::now() + CLAIM_TIMEOUT + self.jitter());
    }

    fn jitter(&mut self) -> Duration {
        let max_ms = self.jitter_max.as_millis();
        if max_ms == 0 {
            return Duration::from_millis(0);
        }
        // xorshift64; spread is all that matters here.
        let mut x = self.jitter_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.jitter_state = x;
        Duration::from_millis(x % (max_ms + 1))
    }
}

impl<O: ClaimObserver> Drop for AddressClaimer<'_, O> {
    fn drop(&mut self) {
        if matches!(self.machine.state(), State::Claimed(_)) {
            self.network.release(self.machine.name());
            self.observer.on_address_lost(self.machine.name());
        }
    }
}
