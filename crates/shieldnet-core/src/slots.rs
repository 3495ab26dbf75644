//! Fixed-capacity inbound client table.
//!
//! Slots are positions in an array of `Option<S>`. A new client takes the
//! first empty slot; the slot index carries no other meaning.

use crate::transport::ClientSocket;

/// Table of up to `N` inbound sockets.
#[derive(Debug)]
pub struct ClientTable<S, const N: usize> {
    slots: [Option<S>; N],
}

impl<S, const N: usize> ClientTable<S, N> {
    /// Create a table with every slot empty.
    pub fn new() -> Self {
        Self { slots: std::array::from_fn(|_| None) }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Socket in `slot`, if occupied.
    pub fn get(&self, slot: usize) -> Option<&S> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Mutable socket in `slot`, if occupied.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut S> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Place `socket` in the first empty slot.
    ///
    /// Hands the socket back when the table is full.
    pub fn insert(&mut self, socket: S) -> Result<usize, S> {
        match self.slots.iter().position(Option::is_none) {
            Some(slot) => {
                self.slots[slot] = Some(socket);
                Ok(slot)
            },
            None => Err(socket),
        }
    }

    /// Empty `slot`, returning what it held.
    pub fn take(&mut self, slot: usize) -> Option<S> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Occupied sockets in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut S> {
        self.slots.iter_mut().flatten()
    }

    /// Indices of occupied slots in order.
    pub fn occupied_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| slot.as_ref().map(|_| i))
    }
}

impl<S: ClientSocket, const N: usize> ClientTable<S, N> {
    /// Close and free every slot whose socket is no longer connected.
    ///
    /// Calls `on_removed` with each freed slot index and returns how many
    /// were freed.
    pub fn prune(&mut self, mut on_removed: impl FnMut(usize)) -> usize {
        let mut removed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let dead = slot.as_mut().is_some_and(|socket| !socket.is_connected());
            if dead {
                if let Some(mut socket) = slot.take() {
                    socket.stop();
                }
                on_removed(index);
                removed += 1;
            }
        }
        removed
    }
}

impl<S, const N: usize> Default for ClientTable<S, N> {
    fn default() -> Self {
        Self::new()
    }
}
