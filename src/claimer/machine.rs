use crate::{Claim, Frame, Name, Network, NetworkError, MAX_UNICAST_ADDRESS};

/// Where a local NAME stands in the address contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No binding; the effective source is the null address.
    NoAddress,
    /// A claim for this address is on the wire, inside its settle window.
    Claiming(u8),
    /// The settle window passed without defeat; the address is owned.
    Claimed(u8),
    /// Every address was refused or the bus is full. The machine keeps
    /// answering requests with cannot-claim until restarted.
    CannotClaim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimError {
    /// An address-claim frame without its mandatory 8-byte NAME payload.
    BadFrame,
    Network(NetworkError),
}

/// The capability set a claimer drives its surroundings through.
///
/// `on_frame` carries every frame the claimer wants on the wire; the rest
/// report protocol milestones. Only the frame sink and the two address
/// notifications have no default.
pub trait ClaimObserver {
    /// The local NAME now owns `address`.
    fn on_address(&mut self, name: Name, address: u8);

    /// The local NAME no longer owns its address.
    fn on_address_lost(&mut self, name: Name);

    /// A NAME not seen before announced itself at `address`.
    fn on_new_controller(&mut self, name: Name, address: u8) {
        let _ = (name, address);
    }

    /// A claim or cannot-claim frame to transmit.
    fn on_frame(&mut self, frame: Frame);

    fn on_error(&mut self, context: &'static str, error: ClaimError) {
        let _ = (context, error);
    }
}

/// The address-claim protocol core for one local NAME.
///
/// Purely event-driven: the caller feeds claims, requests, the settle
/// timeout, and start/stop commands; outputs leave through a
/// [`ClaimObserver`]. Timing lives one layer up, in
/// [`AddressClaimer`](super::AddressClaimer).
pub struct StateMachine {
    name: Name,
    state: State,
}

impl StateMachine {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            state: State::NoAddress,
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The owned address, once the contest has settled.
    pub fn address(&self) -> Option<u8> {
        match self.state {
            State::Claimed(address) => Some(address),
            _ => None,
        }
    }

    /// The address this machine currently answers for, claimed or not.
    fn candidate(&self) -> Option<u8> {
        match self.state {
            State::Claiming(address) | State::Claimed(address) => Some(address),
            _ => None,
        }
    }

    /// Begin contesting for `preferred`, or the lowest free address when
    /// `preferred` is taken. Ignored while a contest is already running.
    pub fn start_claim(&mut self, preferred: u8, net: &Network, out: &mut impl ClaimObserver) {
        if !matches!(self.state, State::NoAddress | State::CannotClaim) {
            return;
        }
        let candidate = if net.available(preferred) {
            Some(preferred)
        } else {
            net.first_free_address(0)
        };
        self.claim_from(candidate, net, out);
    }

    /// A remote device claimed `source`. Updates the map first, then reacts:
    /// defend our slot against lower-priority challengers, yield it to
    /// higher-priority ones and contest the next free address.
    pub fn handle_claim(
        &mut self,
        remote: Name,
        source: u8,
        net: &Network,
        out: &mut impl ClaimObserver,
    ) {
        if source > MAX_UNICAST_ADDRESS {
            // A cannot-claim: the device is on the bus but holds nothing.
            if let Err(error) = net.register(remote) {
                out.on_error("register", ClaimError::Network(error));
            }
            return;
        }

        let newcomer = !net.contains(remote);
        match net.try_claim(remote, source) {
            Ok(Claim::Rejected) => {
                // The slot stays with its holder; remember the loser anyway.
                if let Err(error) = net.register(remote) {
                    out.on_error("register", ClaimError::Network(error));
                }
            }
            Ok(_) => {}
            Err(error) => {
                out.on_error("claim", ClaimError::Network(error));
                return;
            }
        }
        if newcomer {
            out.on_new_controller(remote, source);
        }

        let Some(current) = self.candidate() else {
            return;
        };
        if current != source {
            return;
        }

        if self.name.has_priority_over(remote) {
            // We win: re-announce. The settle window is untouched.
            out.on_frame(Frame::address_claim(self.name, current));
        } else {
            // Defeat, including the pathological same-NAME claim.
            net.release(self.name);
            if matches!(self.state, State::Claimed(_)) {
                out.on_address_lost(self.name);
            }
            self.recontest(current, net, out);
        }
    }

    /// Someone asked who owns which address. A settled machine re-announces
    /// its claim; in any other state the answer is cannot-claim.
    pub fn handle_request(&mut self, out: &mut impl ClaimObserver) {
        match self.state {
            State::Claimed(address) => out.on_frame(Frame::address_claim(self.name, address)),
            _ => out.on_frame(Frame::cannot_claim(self.name)),
        }
    }

    /// The settle window elapsed without defeat.
    pub fn timeout(&mut self, out: &mut impl ClaimObserver) {
        if let State::Claiming(address) = self.state {
            self.state = State::Claimed(address);
            out.on_address(self.name, address);
        }
    }

    /// Give up any binding and go quiet.
    pub fn stop(&mut self, net: &Network, out: &mut impl ClaimObserver) {
        match self.state {
            State::Claimed(_) => {
                net.release(self.name);
                out.on_address_lost(self.name);
            }
            State::Claiming(_) => net.release(self.name),
            _ => {}
        }
        self.state = State::NoAddress;
    }

    /// Contest the lowest free address after `contested`, wrapping to the
    /// bottom of the range before giving up.
    fn recontest(&mut self, contested: u8, net: &Network, out: &mut impl ClaimObserver) {
        let candidate = net
            .first_free_address(contested.saturating_add(1))
            .or_else(|| net.first_free_address(0));
        self.claim_from(candidate, net, out);
    }

    fn claim_from(
        &mut self,
        mut candidate: Option<u8>,
        net: &Network,
        out: &mut impl ClaimObserver,
    ) {
        while let Some(address) = candidate {
            match net.try_claim(self.name, address) {
                Ok(Claim::Rejected) => {
                    candidate = net.first_free_address(address.saturating_add(1));
                }
                Ok(_) => {
                    out.on_frame(Frame::address_claim(self.name, address));
                    self.state = State::Claiming(address);
                    return;
                }
                Err(error) => {
                    out.on_error("claim", ClaimError::Network(error));
                    candidate = net.first_free_address(address.saturating_add(1));
                }
            }
        }
        out.on_frame(Frame::cannot_claim(self.name));
        self.state = State::CannotClaim;
    }
}
