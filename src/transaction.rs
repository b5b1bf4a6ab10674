//! Query ids and matching of responses to the queries that caused them.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Mutex;

use log::trace;
use rand::{rngs::OsRng, Rng};

use crate::dns_parser::{Message, Question};
use crate::Error;

const RANDOM_DRAWS: usize = 16;

/// A fresh query id from the operating system's CSPRNG
///
/// Uniform over the whole 16-bit space; predictable ids make cache
/// poisoning by id guessing trivial.
pub fn next_transaction_id() -> u16 {
    OsRng.gen::<u16>()
}

/// Registry of ids currently awaiting a response, per peer
#[derive(Debug, Default)]
pub struct TransactionManager {
    in_flight: Mutex<HashSet<(SocketAddr, u16)>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a query to `peer` under an id not already in flight
    /// towards that peer
    ///
    /// The id is released when the returned guard is dropped. After a few
    /// colliding draws the remaining ids are scanned from a random start;
    /// when every id is taken the query can't be sent.
    pub fn begin(&self, peer: SocketAddr, question: &Question) -> Result<InFlightQuery<'_>, Error> {
        let mut in_flight = self.in_flight.lock().unwrap();
        let mut id = (0..RANDOM_DRAWS)
            .map(|_| next_transaction_id())
            .find(|&id| !in_flight.contains(&(peer, id)));
        if id.is_none() {
            let start = next_transaction_id();
            id = (0..=u16::MAX)
                .map(|offset| start.wrapping_add(offset))
                .find(|&id| !in_flight.contains(&(peer, id)));
        }
        let id = id.ok_or(Error::TransactionIdsExhausted(peer))?;
        in_flight.insert((peer, id));

        Ok(InFlightQuery {
            manager: self,
            id,
            question: question.clone(),
            peer,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    fn finish(&self, peer: SocketAddr, id: u16) {
        self.in_flight.lock().unwrap().remove(&(peer, id));
    }
}

/// A query that was (or is about to be) sent and awaits its response
#[derive(Debug)]
pub struct InFlightQuery<'a> {
    manager: &'a TransactionManager,
    id: u16,
    question: Question,
    peer: SocketAddr,
}

impl<'a> InFlightQuery<'a> {
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether `response`, received from `from`, answers this query
    pub fn matches(&self, response: &Message, from: SocketAddr) -> bool {
        matches(response, self.id, &self.question, self.peer, from)
    }
}

impl<'a> Drop for InFlightQuery<'a> {
    fn drop(&mut self) {
        self.manager.finish(self.peer, self.id);
    }
}

/// A response is accepted only if it comes from the peer that was asked,
/// carries the query id, is flagged as a response and echoes the question.
/// Names compare case-insensitively since they are stored lowercased.
pub fn matches(
    response: &Message,
    expected_id: u16,
    expected_question: &Question,
    expected_peer: SocketAddr,
    from: SocketAddr,
) -> bool {
    if from != expected_peer {
        trace!("response from {} while waiting for {}", from, expected_peer);
        return false;
    }
    if response.header.id != expected_id {
        trace!(
            "response id {} does not match query id {}",
            response.header.id,
            expected_id
        );
        return false;
    }
    if response.header.query {
        trace!("packet from {} is not a response", from);
        return false;
    }
    match response.questions.as_slice() {
        [question] if question == expected_question => true,
        _ => {
            trace!("response from {} does not echo {}", from, expected_question);
            false
        }
    }
}
