//! Asking a set of servers for one question, with timeouts and failover.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace, warn};
use tokio::time::{timeout_at, Instant};

use crate::dns_parser::{self, Message, Name, Question};
use crate::transaction::{InFlightQuery, TransactionManager};
use crate::transport::Transport;
use crate::Error;

/// Servers believed to be authoritative for `zone`, in the order they
/// should be tried
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerSet {
    pub zone: Name,
    pub servers: Vec<SocketAddr>,
}

impl ServerSet {
    pub fn new(zone: Name, servers: Vec<SocketAddr>) -> ServerSet {
        ServerSet { zone, servers }
    }
}

impl fmt::Display for ServerSet {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} via {:?}", self.zone, self.servers)
    }
}

pub struct ServerPool<T> {
    transport: T,
    transactions: TransactionManager,
    timeout: Duration,
    max_attempts: usize,
    udp_payload_size: u16,
    receive_limit: usize,
}

impl<T: Transport> ServerPool<T> {
    pub fn new(
        transport: T,
        timeout: Duration,
        max_attempts: usize,
        udp_payload_size: u16,
        receive_limit: usize,
    ) -> Self {
        ServerPool {
            transport,
            transactions: TransactionManager::new(),
            timeout,
            max_attempts,
            udp_payload_size,
            receive_limit,
        }
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    /// Sends `question` to the servers of `set` until one gives a usable
    /// answer
    ///
    /// Attempts go round robin over the servers in order, at least one per
    /// server and `max_attempts` in total. Timeouts, network errors,
    /// malformed and lame replies move on to the next attempt.
    pub async fn query(&self, set: &ServerSet, question: &Question) -> Result<Message, Error> {
        let attempts = self.max_attempts.max(set.servers.len());
        for (attempt, &server) in set.servers.iter().cycle().take(attempts).enumerate() {
            trace!("attempt {} of {}: {} to {}", attempt + 1, attempts, question, server);
            match self.exchange(server, question).await {
                Ok(response) if response.header.response_code.is_lame() => {
                    warn!(
                        "{} answered {} with {:?}",
                        server, question, response.header.response_code
                    );
                }
                Ok(response) => return Ok(response),
                Err(err) => debug!("{} failed for {}: {}", server, question, err),
            }
        }
        Err(Error::AllServersUnreachable {
            zone: set.zone.clone(),
        })
    }

    /// One attempt against one server: UDP first, TCP when the answer did
    /// not fit
    async fn exchange(&self, server: SocketAddr, question: &Question) -> Result<Message, Error> {
        match self.exchange_udp(server, question).await {
            Err(Error::TruncatedResponse(_)) => {
                debug!("{} truncated the answer to {}, retrying over tcp", server, question);
                self.exchange_tcp(server, question).await
            }
            result => result,
        }
    }

    async fn exchange_udp(&self, server: SocketAddr, question: &Question) -> Result<Message, Error> {
        let inflight = self.transactions.begin(server, question)?;
        let query = self.encode_query(&inflight)?;
        let deadline = Instant::now() + self.timeout;

        let mut channel = timeout_at(deadline, self.transport.open_udp(server))
            .await
            .map_err(|_| Error::Timeout(server))??;
        channel.send(&query).await?;
        trace!("sent {} bytes to {} with id {}", query.len(), inflight.peer(), inflight.id());

        // One byte more than allowed tells oversized datagrams apart
        let mut buf = vec![0u8; self.receive_limit + 1];
        loop {
            let (len, from) = timeout_at(deadline, channel.recv(&mut buf))
                .await
                .map_err(|_| Error::Timeout(server))??;
            let packet = &buf[..len];

            let response = match Message::parse_limited(packet, self.receive_limit) {
                Ok(response) => response,
                Err(dns_parser::Error::TruncatedResponse { .. }) if from == server => {
                    return Err(Error::TruncatedResponse(server));
                }
                Err(err) if from == server && carries_id(packet, inflight.id()) => {
                    warn!("couldn't parse packet from {:?}: {}", from, err);
                    return Err(err.into());
                }
                Err(err) => {
                    trace!("ignoring garbage from {:?}: {}", from, err);
                    continue;
                }
            };

            if !inflight.matches(&response, from) {
                continue;
            }
            if response.header.truncated {
                return Err(Error::TruncatedResponse(server));
            }
            return Ok(response);
        }
    }

    async fn exchange_tcp(&self, server: SocketAddr, question: &Question) -> Result<Message, Error> {
        let inflight = self.transactions.begin(server, question)?;
        let query = self.encode_query(&inflight)?;

        let packet = tokio::time::timeout(self.timeout, self.transport.exchange_tcp(server, &query))
            .await
            .map_err(|_| Error::Timeout(server))??;
        let response = Message::parse(&packet)?;
        if !inflight.matches(&response, server) {
            warn!("tcp response from {} does not match its query", server);
            return Err(Error::UnexpectedResponse(server));
        }
        Ok(response)
    }

    fn encode_query(&self, inflight: &InFlightQuery<'_>) -> Result<Vec<u8>, Error> {
        let query = Message::query(inflight.id(), inflight.question().clone(), self.udp_payload_size);
        Ok(query.to_bytes()?)
    }
}

fn carries_id(packet: &[u8], id: u16) -> bool {
    packet.len() >= 2 && BigEndian::read_u16(&packet[..2]) == id
}
