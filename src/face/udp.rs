//! UDP faces: one encoded `Packet` per datagram.

use std::{collections::VecDeque, io, net::SocketAddr};

use tokio::{net::UdpSocket, time::Instant};

use super::{
    pit::sleep_until_deadline, Consumer, FaceError, FaceEvent, FilterTable, InterestDisposition,
    InterestHandler, PendingInterestTable, Producer,
};
use crate::{
    crypto::HmacKey,
    name::Name,
    packets::{Data, Interest, Packet, Signer, Verification, MAX_PACKET_SIZE},
};

/// Client side: sends Interests to one remote and matches the Data it returns.
///
/// Sends go through a nonblocking std handle on the same socket, so they
/// never depend on tokio write readiness.
pub struct UdpConsumer {
    socket: UdpSocket,
    sender: std::net::UdpSocket,
    pit: PendingInterestTable,
    ready: VecDeque<FaceEvent>,
    verify_key: Option<HmacKey>,
    buf: Vec<u8>,
}

impl UdpConsumer {
    /// Binds `local` and connects to `remote`.
    pub async fn connect(
        local: SocketAddr,
        remote: SocketAddr,
        verify_key: Option<HmacKey>,
    ) -> Result<Self, FaceError> {
        let std_socket = std::net::UdpSocket::bind(local)?;
        std_socket.connect(remote)?;
        std_socket.set_nonblocking(true)?;
        let sender = std_socket.try_clone()?;
        let socket = UdpSocket::from_std(std_socket)?;
        log::debug!(
            "Consumer face {} connected to {}",
            socket.local_addr()?,
            remote
        );

        Ok(UdpConsumer {
            socket,
            sender,
            pit: PendingInterestTable::new(),
            ready: VecDeque::new(),
            verify_key,
            buf: vec![0u8; MAX_PACKET_SIZE],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn handle_datagram(&mut self, len: usize) {
        let data = match Packet::from_bytes(&self.buf[..len]) {
            Ok(Packet::Data(data)) => data,
            Ok(Packet::Interest(interest)) => {
                log::debug!("Ignoring Interest {} on consumer face", interest.name);
                return;
            }
            Err(e) => {
                log::debug!("Dropping undecodable datagram ({} bytes): {}", len, e);
                return;
            }
        };

        match data.verify(self.verify_key.as_ref()) {
            Verification::Valid => {}
            Verification::Unverified => {
                log::debug!("Accepting keyed Data {} without a key to check it", data.name)
            }
            Verification::Invalid => {
                log::warn!("Dropping Data {} with invalid signature", data.name);
                return;
            }
        }

        match self.pit.satisfy(&data.name) {
            Some(interest) => self.ready.push_back(FaceEvent::Data { interest, data }),
            None => log::debug!("Dropping unsolicited Data {}", data.name),
        }
    }
}

impl Consumer for UdpConsumer {
    fn express_interest(&mut self, interest: Interest) -> Result<(), FaceError> {
        let deadline = Instant::now() + interest.lifetime();
        if !self.pit.insert(interest.name.clone(), deadline) {
            return Err(FaceError::DuplicateInterest(interest.name));
        }

        let bytes = Packet::Interest(interest).to_bytes()?;
        self.sender.send(&bytes)?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<FaceEvent, FaceError> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(event);
            }

            let deadline = self.pit.next_deadline();
            let received = tokio::select! {
                result = self.socket.recv(&mut self.buf) => Some(result),
                _ = sleep_until_deadline(deadline) => None,
            };

            match received {
                Some(Ok(len)) => self.handle_datagram(len),
                Some(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    // ICMP port unreachable from the remote; the Interests will time out.
                    log::debug!("Remote refused datagram: {}", e);
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    for name in self.pit.expire(Instant::now()) {
                        self.ready.push_back(FaceEvent::Timeout(name));
                    }
                }
            }
        }
    }

    fn pending_interests(&self) -> usize {
        self.pit.len()
    }
}

/// Server side: answers Interests arriving from any peer.
pub struct UdpProducer {
    socket: UdpSocket,
    sender: std::net::UdpSocket,
    signer: Signer,
    filters: FilterTable,
    buf: Vec<u8>,
}

/// Producer handle bound to the peer that sent the Interest being handled.
struct Reply<'a> {
    sender: &'a std::net::UdpSocket,
    signer: &'a Signer,
    peer: SocketAddr,
}

impl Producer for Reply<'_> {
    fn sign(
        &self,
        name: Name,
        content: Vec<u8>,
        freshness: Option<u32>,
    ) -> Result<Data, FaceError> {
        Ok(self.signer.sign(name, content, freshness)?)
    }

    fn put(&mut self, data: Data) -> Result<(), FaceError> {
        let bytes = Packet::Data(data).to_bytes()?;
        self.sender.send_to(&bytes, self.peer)?;
        Ok(())
    }
}

impl UdpProducer {
    /// Binds the listening socket without needing a runtime.
    ///
    /// Used by the server to claim its address before daemonizing.
    pub fn bind_std(addr: SocketAddr) -> Result<std::net::UdpSocket, FaceError> {
        let socket = std::net::UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    /// Wraps a socket from `bind_std`; must be called inside a tokio runtime.
    pub fn from_std(socket: std::net::UdpSocket, signer: Signer) -> Result<Self, FaceError> {
        Ok(UdpProducer {
            sender: socket.try_clone()?,
            socket: UdpSocket::from_std(socket)?,
            signer,
            filters: FilterTable::default(),
            buf: vec![0u8; MAX_PACKET_SIZE],
        })
    }

    pub async fn bind(addr: SocketAddr, signer: Signer) -> Result<Self, FaceError> {
        Self::from_std(Self::bind_std(addr)?, signer)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Installs `handler` for Interests under `prefix`.
    pub fn register_prefix(&mut self, prefix: Name, handler: Box<dyn InterestHandler>) {
        self.filters.register(prefix, handler);
    }

    /// Receives one datagram and dispatches it to the registered filters.
    pub async fn process_next(&mut self) -> Result<(), FaceError> {
        let (len, peer) = self.socket.recv_from(&mut self.buf).await?;

        let interest = match Packet::from_bytes(&self.buf[..len]) {
            Ok(Packet::Interest(interest)) => interest,
            Ok(Packet::Data(data)) => {
                log::debug!("Ignoring Data {} from {} on producer face", data.name, peer);
                return Ok(());
            }
            Err(e) => {
                log::debug!("Dropping undecodable datagram from {}: {}", peer, e);
                return Ok(());
            }
        };

        let mut reply = Reply {
            sender: &self.sender,
            signer: &self.signer,
            peer,
        };
        if self.filters.dispatch(&interest, &mut reply) == InterestDisposition::NotHandled {
            log::debug!("No filter answered Interest {} from {}", interest.name, peer);
        }
        Ok(())
    }

    /// Serves Interests until a receive error occurs.
    pub async fn run(&mut self) -> Result<(), FaceError> {
        loop {
            self.process_next().await?;
        }
    }
}
