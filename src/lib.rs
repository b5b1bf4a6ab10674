//! An iterative DNS resolver: questions are answered by walking the
//! delegation chain from the root servers, caching what is learned on the
//! way.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

mod address_family;
pub mod cache;
pub mod config;
pub mod dns_parser;
mod error;
pub mod pool;
mod referral;
pub mod transaction;
pub mod transport;

#[cfg(test)]
mod mock;

pub use crate::cache::{Cache, Cached, NegativeKind};
pub use crate::config::{ResolverConfig, ROOT_SERVERS};
pub use crate::error::Error;
pub use crate::referral::Resolution;
pub use crate::transport::{NetTransport, Transport};

use crate::dns_parser::{Message, Opcode, Question, ResourceRecord, ResponseCode};
use crate::pool::ServerPool;

pub const DNS_PORT: u16 = 53;
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Handle to a resolver
///
/// Clones share the cache and the in-flight transaction ids, so one
/// resolver can serve any number of concurrent resolutions.
pub struct Resolver<T = NetTransport> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    config: ResolverConfig,
    cache: Cache,
    pool: ServerPool<T>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Resolver {
            inner: self.inner.clone(),
        }
    }
}

impl Resolver<NetTransport> {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_transport(config, NetTransport)
    }
}

impl<T: Transport> Resolver<T> {
    pub fn with_transport(config: ResolverConfig, transport: T) -> Self {
        let pool = ServerPool::new(
            transport,
            config.timeout,
            config.max_attempts,
            config.udp_payload_size,
            config.udp_receive_limit(),
        );
        Resolver {
            inner: Arc::new(Inner {
                config,
                cache: Cache::new(),
                pool,
            }),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &Cache {
        &self.inner.cache
    }

    /// Resolves `question` into a recursive response message
    ///
    /// The id of the returned message is 0; callers answering a client
    /// replace it with the client's.
    pub async fn resolve(&self, question: &Question) -> Result<Message, Error> {
        let resolution = self
            .resolve_with_depth(question, self.inner.config.max_depth)
            .await?;
        let mut request = Message::query(0, question.clone(), 0);
        request.header.recursion_desired = true;
        Ok(resolution.into_response(&request))
    }

    /// Like `resolve`, giving up once `limit` has passed
    ///
    /// Everything still in flight is dropped, which releases its sockets
    /// and transaction ids.
    pub async fn resolve_timeout(&self, question: &Question, limit: Duration) -> Result<Message, Error> {
        match tokio::time::timeout(limit, self.resolve(question)).await {
            Ok(result) => result,
            Err(_) => {
                debug!("resolving {} took longer than {:?}", question, limit);
                Err(Error::DeadlineExceeded)
            }
        }
    }

    /// Answers a client's wire-format request received over UDP
    ///
    /// Only requests that can't be decoded, or that are responses
    /// themselves, are errors; anything else gets a response packet. The
    /// packet fits the payload size the client advertised (512 bytes
    /// without EDNS0), otherwise it is cut down to the question with TC
    /// set.
    pub async fn handle_packet(&self, packet: &[u8]) -> Result<Vec<u8>, Error> {
        let request = Message::parse(packet)?;
        if !request.header.query {
            return Err(Error::NotAQuery);
        }

        let mut response = Message::response_to(&request);
        if request.header.opcode != Opcode::StandardQuery {
            debug!("refusing opcode {:?}", request.header.opcode);
            response.header.response_code = ResponseCode::NotImplemented;
        } else if let Some(question) = request.questions.first() {
            match self
                .resolve_with_depth(question, self.inner.config.max_depth)
                .await
            {
                Ok(resolution) => response = resolution.into_response(&request),
                Err(err) => {
                    warn!("failed to resolve {}: {}", question, err);
                    response.header.response_code = ResponseCode::ServerFailure;
                }
            }
        } else {
            response.header.response_code = ResponseCode::FormatError;
        }

        let limit = match request.udp_payload_size() {
            Some(size) => {
                response
                    .additional
                    .push(ResourceRecord::opt(self.inner.config.udp_payload_size));
                size.max(512)
            }
            None => 512,
        };
        Ok(response.to_bytes_limited(usize::from(limit))?)
    }
}
