use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use heapless::FnvIndexMap;

use crate::{Name, MAX_UNICAST_ADDRESS};

/// Most NAMEs the map can register at once. The 254 claimable addresses
/// plus headroom for devices parked without one.
pub const MAX_CONTROLLERS: usize = 256;

const ADDRESS_SLOTS: usize = MAX_UNICAST_ADDRESS as usize + 1;

/// Outcome of offering a `(name, address)` binding to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Claim {
    /// The address was free and is now bound to the NAME.
    Inserted,
    /// The binding already existed.
    Refreshed,
    /// The address was held by a lower-priority NAME, which lost it and
    /// remains registered without an address.
    Displaced { displaced: Name },
    /// The address is held by a higher-priority NAME; nothing changed.
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkError {
    /// The address is not in the claimable range `0..=253`.
    AddressOutOfRange,
    /// No room to register another NAME.
    TableFull,
}

struct Table {
    /// NAME → claimed address. `None` marks a device known to the bus but
    /// currently holding no address.
    names: FnvIndexMap<u64, Option<u8>, MAX_CONTROLLERS>,
    /// address → NAME, the reverse index.
    addresses: [Option<Name>; ADDRESS_SLOTS],
}

impl Table {
    const fn new() -> Self {
        Self {
            names: FnvIndexMap::new(),
            addresses: [None; ADDRESS_SLOTS],
        }
    }

    fn unbind(&mut self, name: Name) {
        if let Some(entry) = self.names.get_mut(&name.raw()) {
            if let Some(address) = entry.take() {
                self.addresses[address as usize] = None;
            }
        }
    }

    fn bind(&mut self, name: Name, address: u8) -> Result<(), NetworkError> {
        self.unbind(name);
        self.names
            .insert(name.raw(), Some(address))
            .map_err(|_| NetworkError::TableFull)?;
        self.addresses[address as usize] = Some(name);
        Ok(())
    }
}

/// The authoritative view of `NAME ↔ address` bindings observed on one bus.
///
/// The map is internally synchronized and meant to be shared by reference
/// between an [`AddressClaimer`](crate::AddressClaimer) and any number of
/// [`Connection`](crate::Connection)s. The claimer is the only writer for
/// the local NAME; connections only read, to stamp and filter addresses.
///
/// Invariants, upheld by every mutator:
/// each address in `0..=253` is bound to at most one NAME, each NAME holds
/// at most one address, and the two indexes always mirror each other.
pub struct Network {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Table>>,
}

impl Network {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Table::new())),
        }
    }

    /// Offer a `(name, address)` binding, arbitrating by NAME priority.
    ///
    /// A NAME that already holds a different address is moved, never
    /// duplicated. The losing side of a [`Claim::Displaced`] stays
    /// registered without an address.
    pub fn try_claim(&self, name: Name, address: u8) -> Result<Claim, NetworkError> {
        if address > MAX_UNICAST_ADDRESS {
            return Err(NetworkError::AddressOutOfRange);
        }
        self.inner.lock(|table| {
            let mut table = table.borrow_mut();
            match table.addresses[address as usize] {
                None => {
                    table.bind(name, address)?;
                    Ok(Claim::Inserted)
                }
                Some(holder) if holder == name => Ok(Claim::Refreshed),
                Some(holder) => {
                    if name.has_priority_over(holder) {
                        table.unbind(holder);
                        table.bind(name, address)?;
                        Ok(Claim::Displaced { displaced: holder })
                    } else {
                        Ok(Claim::Rejected)
                    }
                }
            }
        })
    }

    /// Register a NAME without an address (it announced cannot-claim, or
    /// was seen sourcing from the null address). A NAME that already holds
    /// an address keeps it.
    pub fn register(&self, name: Name) -> Result<(), NetworkError> {
        self.inner.lock(|table| {
            let mut table = table.borrow_mut();
            if table.names.contains_key(&name.raw()) {
                return Ok(());
            }
            table
                .names
                .insert(name.raw(), None)
                .map(|_| ())
                .map_err(|_| NetworkError::TableFull)
        })
    }

    /// Drop any address binding for `name`; the NAME stays registered.
    pub fn release(&self, name: Name) {
        self.inner.lock(|table| table.borrow_mut().unbind(name));
    }

    /// Remove the NAME entirely.
    pub fn forget(&self, name: Name) {
        self.inner.lock(|table| {
            let mut table = table.borrow_mut();
            table.unbind(name);
            table.names.remove(&name.raw());
        });
    }

    /// Drop every registered NAME and binding.
    pub fn clear(&self) {
        self.inner.lock(|table| {
            let mut table = table.borrow_mut();
            table.names.clear();
            table.addresses = [None; ADDRESS_SLOTS];
        });
    }

    pub fn contains(&self, name: Name) -> bool {
        self.inner
            .lock(|table| table.borrow().names.contains_key(&name.raw()))
    }

    /// The address currently claimed by `name`, if any.
    pub fn find_address(&self, name: Name) -> Option<u8> {
        self.inner
            .lock(|table| table.borrow().names.get(&name.raw()).copied().flatten())
    }

    /// The NAME currently holding `address`, if any.
    pub fn find_name(&self, address: u8) -> Option<Name> {
        if address > MAX_UNICAST_ADDRESS {
            return None;
        }
        self.inner
            .lock(|table| table.borrow().addresses[address as usize])
    }

    /// Whether `address` is claimable right now. The null and global
    /// addresses are never available.
    pub fn available(&self, address: u8) -> bool {
        if address > MAX_UNICAST_ADDRESS {
            return false;
        }
        self.inner
            .lock(|table| table.borrow().addresses[address as usize].is_none())
    }

    /// True once every address in `0..=253` is bound.
    pub fn is_full(&self) -> bool {
        self.address_count() == ADDRESS_SLOTS
    }

    /// Number of bound addresses.
    pub fn address_count(&self) -> usize {
        self.inner.lock(|table| {
            table
                .borrow()
                .addresses
                .iter()
                .filter(|slot| slot.is_some())
                .count()
        })
    }

    /// Number of registered NAMEs, with or without an address.
    pub fn name_count(&self) -> usize {
        self.inner.lock(|table| table.borrow().names.len())
    }

    /// The lowest unbound address at or above `from`, if one exists.
    /// No wrap-around; callers wanting it start over from zero.
    pub fn first_free_address(&self, from: u8) -> Option<u8> {
        self.inner.lock(|table| {
            let table = table.borrow();
            (from..=MAX_UNICAST_ADDRESS).find(|&a| table.addresses[a as usize].is_none())
        })
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}
