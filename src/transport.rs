//! The network capability used by the server pool.
//!
//! Everything above this module talks to servers through `Transport`, so
//! tests can put a simulated hierarchy behind it.

use std::io;
use std::net::SocketAddr;

use byteorder::{BigEndian, ByteOrder};
use futures_util::future::{BoxFuture, FutureExt};
use log::trace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use crate::address_family;

/// A datagram channel to a single server
///
/// The underlying socket is closed when the channel is dropped.
pub trait UdpChannel: Send {
    fn send<'a>(&'a mut self, packet: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;

    /// Waits for the next datagram, returning its length and sender
    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<(usize, SocketAddr)>>;
}

pub trait Transport: Send + Sync + 'static {
    /// Opens a fresh channel (and local port) for one query attempt
    fn open_udp(&self, server: SocketAddr) -> BoxFuture<'_, io::Result<Box<dyn UdpChannel>>>;

    /// Sends `query` over TCP with 2-byte length framing and returns the
    /// framed response
    fn exchange_tcp<'a>(
        &'a self,
        server: SocketAddr,
        query: &'a [u8],
    ) -> BoxFuture<'a, io::Result<Vec<u8>>>;
}

/// Real sockets through tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct NetTransport;

struct NetUdpChannel {
    socket: UdpSocket,
}

impl UdpChannel for NetUdpChannel {
    fn send<'a>(&'a mut self, packet: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        async move {
            let sent = self.socket.send(packet).await?;
            if sent != packet.len() {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to send entire packet",
                ));
            }
            Ok(())
        }
        .boxed()
    }

    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<(usize, SocketAddr)>> {
        self.socket.recv_from(buf).boxed()
    }
}

impl Transport for NetTransport {
    fn open_udp(&self, server: SocketAddr) -> BoxFuture<'_, io::Result<Box<dyn UdpChannel>>> {
        async move {
            let socket = UdpSocket::from_std(address_family::bind_for(&server)?)?;
            socket.connect(server).await?;
            trace!("opened {:?} for {}", socket.local_addr(), server);
            Ok(Box::new(NetUdpChannel { socket }) as Box<dyn UdpChannel>)
        }
        .boxed()
    }

    fn exchange_tcp<'a>(
        &'a self,
        server: SocketAddr,
        query: &'a [u8],
    ) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        async move {
            if query.len() > u16::MAX as usize {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "query too large for TCP framing",
                ));
            }
            let mut stream = TcpStream::connect(server).await?;
            trace!("connected to {} over tcp", server);

            let mut framed = vec![0u8; 2 + query.len()];
            BigEndian::write_u16(&mut framed[..2], query.len() as u16);
            framed[2..].copy_from_slice(query);
            stream.write_all(&framed).await?;

            let mut len = [0u8; 2];
            stream.read_exact(&mut len).await?;
            let mut response = vec![0u8; BigEndian::read_u16(&len) as usize];
            stream.read_exact(&mut response).await?;
            Ok(response)
        }
        .boxed()
    }
}
