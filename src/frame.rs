use crate::{Id, Name, GLOBAL_ADDRESS, NULL_ADDRESS};

/// PDU format of the address-claim parameter group.
pub const PF_ADDRESS_CLAIM: u8 = 0xee;
/// Address Claimed / Cannot Claim, PGN 60928.
pub const PGN_ADDRESS_CLAIM: u32 = 0x00ee00;

/// PDU format of the request parameter group.
pub const PF_REQUEST: u8 = 0xea;
/// Request, PGN 59904.
pub const PGN_REQUEST: u32 = 0x00ea00;

/// Priority of address management frames.
pub const CLAIM_PRIORITY: u8 = 6;

/// A single J1939 protocol data unit: a 29-bit identifier and up to eight
/// data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub id: Id,
    pub data: heapless::Vec<u8, 8>,
}

impl Frame {
    /// An empty frame, for initializing queue buffers.
    pub const DEFAULT: Self = Self {
        id: Id::from_can_id(embedded_can::ExtendedId::ZERO),
        data: heapless::Vec::new(),
    };

    /// Build a frame from an identifier and up to 8 data bytes. Returns
    /// `None` when the payload is oversized.
    pub fn new(id: Id, data: &[u8]) -> Option<Self> {
        Some(Self {
            id,
            data: heapless::Vec::from_slice(data).ok()?,
        })
    }

    /// The address-claim frame announcing that `name` owns `source`.
    pub fn address_claim(name: Name, source: u8) -> Self {
        Self {
            // Field values are compile-time valid.
            id: Id::new(CLAIM_PRIORITY, PGN_ADDRESS_CLAIM, source, GLOBAL_ADDRESS).unwrap(),
            data: heapless::Vec::from_slice(&name.to_le_bytes()).unwrap(),
        }
    }

    /// The cannot-claim frame: an address claim sent from the null address,
    /// announcing that `name` holds nothing.
    pub fn cannot_claim(name: Name) -> Self {
        Self::address_claim(name, NULL_ADDRESS)
    }

    /// A global request for the address-claim PGN, asking every device on
    /// the bus to announce its address.
    pub fn address_request() -> Self {
        Self {
            id: Id::new(CLAIM_PRIORITY, PGN_REQUEST, NULL_ADDRESS, GLOBAL_ADDRESS).unwrap(),
            data: heapless::Vec::from_slice(&PGN_ADDRESS_CLAIM.to_le_bytes()[..3]).unwrap(),
        }
    }

    pub fn is_address_claim(&self) -> bool {
        self.id.pgn() == PGN_ADDRESS_CLAIM
    }

    /// True for request frames asking for the address-claim PGN.
    /// Requests for other groups are not this crate's business.
    pub fn is_address_request(&self) -> bool {
        self.id.pgn() == PGN_REQUEST
            && self.data.len() >= 3
            && self.data[..3] == PGN_ADDRESS_CLAIM.to_le_bytes()[..3]
    }

    pub fn is_broadcast(&self) -> bool {
        self.id.is_broadcast()
    }

    /// The NAME carried by an address-claim frame, or `None` if this is not
    /// a claim or the payload is not the mandatory 8 bytes.
    pub fn claimed_name(&self) -> Option<Name> {
        if !self.is_address_claim() {
            return None;
        }
        let bytes: [u8; 8] = self.data.as_slice().try_into().ok()?;
        Some(Name::from_le_bytes(bytes))
    }

    pub fn to_can_frame<T: embedded_can::Frame>(&self) -> T {
        T::new(self.id, &self.data).unwrap()
    }

    /// Convert a received CAN frame. Standard-format (11-bit) frames have
    /// no place on a J1939 bus and map to `None`.
    pub fn from_can_frame<T: embedded_can::Frame>(frame: &T) -> Option<Self> {
        match frame.id() {
            embedded_can::Id::Extended(id) => Self::new(Id::from_can_id(id), frame.data()),
            embedded_can::Id::Standard(_) => None,
        }
    }
}
