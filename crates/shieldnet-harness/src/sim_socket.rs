//! Simulated TCP connection.
//!
//! Each connection is one [`Pipe`] shared by two handles: the [`SimSocket`]
//! the node holds and the [`SimPeer`] the test holds. Bytes a peer sends can
//! be delivered at once or split into chunks that arrive on later
//! [`crate::SimNetwork::deliver_pending`] calls.

use std::{cell::RefCell, collections::VecDeque, io, rc::Rc};

use shieldnet_core::{ClientSocket, NetworkAddress};
use shieldnet_proto::ByteSource;

#[derive(Debug)]
pub(crate) struct Pipe {
    /// Bytes readable by the node
    to_device: VecDeque<u8>,
    /// Chunks not yet delivered to the node
    in_flight: VecDeque<Vec<u8>>,
    /// Everything the node has written
    from_device: Vec<u8>,
    peer_open: bool,
    device_open: bool,
}

impl Pipe {
    pub(crate) fn open() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            to_device: VecDeque::new(),
            in_flight: VecDeque::new(),
            from_device: Vec::new(),
            peer_open: true,
            device_open: true,
        }))
    }

    /// Move the next in-flight chunk to the readable queue.
    pub(crate) fn deliver_one(&mut self) -> bool {
        match self.in_flight.pop_front() {
            Some(chunk) if self.device_open => {
                self.to_device.extend(chunk);
                true
            },
            Some(_) | None => false,
        }
    }
}

/// Node-side end of a simulated connection.
#[derive(Debug)]
pub struct SimSocket {
    pipe: Rc<RefCell<Pipe>>,
    peer: NetworkAddress,
}

impl SimSocket {
    pub(crate) fn new(pipe: Rc<RefCell<Pipe>>, peer: NetworkAddress) -> Self {
        Self { pipe, peer }
    }
}

impl ByteSource for SimSocket {
    fn read_byte(&mut self) -> Option<u8> {
        let mut pipe = self.pipe.borrow_mut();
        if !pipe.device_open {
            return None;
        }
        pipe.to_device.pop_front()
    }
}

impl ClientSocket for SimSocket {
    fn is_connected(&mut self) -> bool {
        let pipe = self.pipe.borrow();
        pipe.device_open && (pipe.peer_open || !pipe.to_device.is_empty())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut pipe = self.pipe.borrow_mut();
        if !pipe.device_open || !pipe.peer_open {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
        }
        pipe.from_device.extend_from_slice(bytes);
        Ok(())
    }

    fn stop(&mut self) {
        let mut pipe = self.pipe.borrow_mut();
        pipe.device_open = false;
        pipe.to_device.clear();
        pipe.in_flight.clear();
    }

    fn peer(&self) -> Option<NetworkAddress> {
        Some(self.peer)
    }
}

/// Test-side end of a simulated connection.
#[derive(Debug, Clone)]
pub struct SimPeer {
    pipe: Rc<RefCell<Pipe>>,
    addr: NetworkAddress,
}

impl SimPeer {
    pub(crate) fn new(pipe: Rc<RefCell<Pipe>>, addr: NetworkAddress) -> Self {
        Self { pipe, addr }
    }

    pub(crate) fn pipe(&self) -> &Rc<RefCell<Pipe>> {
        &self.pipe
    }

    /// This peer's own address.
    pub fn addr(&self) -> NetworkAddress {
        self.addr
    }

    /// Make `bytes` readable by the node immediately.
    ///
    /// Bytes sent after [`Self::close`] or after the node stopped the
    /// socket are dropped.
    pub fn send(&self, bytes: &[u8]) {
        let mut pipe = self.pipe.borrow_mut();
        if pipe.peer_open && pipe.device_open {
            pipe.to_device.extend(bytes.iter().copied());
        }
    }

    /// Queue `chunks` for delivery, one per
    /// [`crate::SimNetwork::deliver_pending`] call.
    pub fn send_chunks(&self, chunks: impl IntoIterator<Item = Vec<u8>>) {
        let mut pipe = self.pipe.borrow_mut();
        if pipe.peer_open && pipe.device_open {
            pipe.in_flight.extend(chunks);
        }
    }

    /// Close this end. Unread bytes stay readable by the node.
    pub fn close(&self) {
        let mut pipe = self.pipe.borrow_mut();
        pipe.peer_open = false;
        pipe.in_flight.clear();
    }

    /// Whether the node still holds its end open.
    pub fn is_open_on_node(&self) -> bool {
        self.pipe.borrow().device_open
    }

    /// Bytes sent but not yet read by the node.
    pub fn unread(&self) -> usize {
        self.pipe.borrow().to_device.len()
    }

    /// Everything the node has written so far.
    pub fn received(&self) -> Vec<u8> {
        self.pipe.borrow().from_device.clone()
    }

    /// Received bytes split into CRLF-terminated lines.
    ///
    /// A trailing unterminated fragment is left out.
    pub fn received_lines(&self) -> Vec<String> {
        let received = self.received();
        let text = String::from_utf8_lossy(&received);
        let mut lines: Vec<String> = text.split("\r\n").map(str::to_string).collect();
        // Text after the last terminator is incomplete
        lines.pop();
        lines
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn pair() -> (SimSocket, SimPeer) {
        let pipe = Pipe::open();
        let addr = NetworkAddress::new(Ipv4Addr::new(10, 0, 0, 2), 40000);
        (SimSocket::new(Rc::clone(&pipe), addr), SimPeer::new(pipe, addr))
    }

    #[test]
    fn peer_close_keeps_unread_bytes_connected() {
        let (mut socket, peer) = pair();
        peer.send(b"xy");
        peer.close();

        assert!(socket.is_connected());
        assert_eq!(socket.read_byte(), Some(b'x'));
        assert_eq!(socket.read_byte(), Some(b'y'));
        assert!(!socket.is_connected());
    }

    #[test]
    fn stop_discards_unread_bytes() {
        let (mut socket, peer) = pair();
        peer.send(b"abc");
        socket.stop();

        assert_eq!(socket.read_byte(), None);
        assert!(!peer.is_open_on_node());
        assert_eq!(peer.unread(), 0);
    }

    #[test]
    fn write_to_closed_peer_fails() {
        let (mut socket, peer) = pair();
        socket.write_all(b"one\r\n").unwrap();
        peer.close();

        let err = socket.write_all(b"two\r\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(peer.received_lines(), vec!["one".to_string()]);
    }

    #[test]
    fn chunks_arrive_one_at_a_time() {
        let (mut socket, peer) = pair();
        peer.send_chunks([b"<a".to_vec(), b"b>".to_vec()]);
        assert_eq!(socket.read_byte(), None);

        assert!(peer.pipe().borrow_mut().deliver_one());
        assert_eq!(peer.unread(), 2);
        assert!(peer.pipe().borrow_mut().deliver_one());
        assert!(!peer.pipe().borrow_mut().deliver_one());
        assert_eq!(peer.unread(), 4);
    }
}
