//! An in-memory DNS hierarchy behind the `Transport` trait.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::dns_parser::{Message, Name, Question, RRData, ResourceRecord, ResponseCode, Soa};
use crate::transport::{Transport, UdpChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proto {
    Udp,
    Tcp,
}

pub enum Reply {
    Message(Message),
    Raw(Vec<u8>),
    /// A datagram that claims to come from another address
    Spoofed(SocketAddr, Message),
    Silence,
    Sequence(Vec<Reply>),
}

type Handler = Arc<dyn Fn(&Message, Proto) -> Reply + Send + Sync>;

#[derive(Clone, Default)]
pub struct MockNetwork {
    servers: Arc<Mutex<HashMap<SocketAddr, Handler>>>,
    attempts: Arc<Mutex<Vec<SocketAddr>>>,
    questions: Arc<Mutex<Vec<(SocketAddr, Question)>>>,
    live_channels: Arc<AtomicUsize>,
    pub tcp_queries: Arc<AtomicUsize>,
}

pub fn addr(ip: [u8; 4]) -> SocketAddr {
    SocketAddr::new(IpAddr::from(ip), 53)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve<F>(&self, server: SocketAddr, handler: F)
    where
        F: Fn(&Message, Proto) -> Reply + Send + Sync + 'static,
    {
        self.servers.lock().unwrap().insert(server, Arc::new(handler));
    }

    /// Every server a channel was opened to, in order
    pub fn queried(&self) -> Vec<SocketAddr> {
        self.attempts.lock().unwrap().clone()
    }

    /// Every question a server actually received
    pub fn questions(&self) -> Vec<(SocketAddr, Question)> {
        self.questions.lock().unwrap().clone()
    }

    pub fn open_channels(&self) -> usize {
        self.live_channels.load(Ordering::SeqCst)
    }

    fn respond(&self, server: SocketAddr, packet: &[u8], proto: Proto) -> Vec<(Vec<u8>, SocketAddr)> {
        let query = Message::parse(packet).expect("resolver sent a malformed query");
        self.questions
            .lock()
            .unwrap()
            .push((server, query.questions[0].clone()));
        let handler = self.servers.lock().unwrap().get(&server).cloned();
        let mut datagrams = Vec::new();
        if let Some(handler) = handler {
            flatten((*handler)(&query, proto), server, &mut datagrams);
        }
        datagrams
    }
}

fn flatten(reply: Reply, server: SocketAddr, out: &mut Vec<(Vec<u8>, SocketAddr)>) {
    match reply {
        Reply::Message(message) => out.push((message.to_bytes().unwrap(), server)),
        Reply::Raw(bytes) => out.push((bytes, server)),
        Reply::Spoofed(from, message) => out.push((message.to_bytes().unwrap(), from)),
        Reply::Silence => (),
        Reply::Sequence(replies) => {
            for reply in replies {
                flatten(reply, server, out);
            }
        }
    }
}

struct MockChannel {
    network: MockNetwork,
    server: SocketAddr,
    pending: VecDeque<(Vec<u8>, SocketAddr)>,
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.network.live_channels.fetch_sub(1, Ordering::SeqCst);
    }
}

impl UdpChannel for MockChannel {
    fn send<'a>(&'a mut self, packet: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        let replies = self.network.respond(self.server, packet, Proto::Udp);
        self.pending.extend(replies);
        future::ready(Ok(())).boxed()
    }

    fn recv<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<(usize, SocketAddr)>> {
        match self.pending.pop_front() {
            Some((datagram, from)) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                future::ready(Ok((len, from))).boxed()
            }
            None => future::pending().boxed(),
        }
    }
}

impl Transport for MockNetwork {
    fn open_udp(&self, server: SocketAddr) -> BoxFuture<'_, io::Result<Box<dyn UdpChannel>>> {
        self.attempts.lock().unwrap().push(server);
        if !self.servers.lock().unwrap().contains_key(&server) {
            let err = io::Error::new(io::ErrorKind::ConnectionRefused, "no such server");
            return future::ready(Err(err)).boxed();
        }
        self.live_channels.fetch_add(1, Ordering::SeqCst);
        let channel = MockChannel {
            network: self.clone(),
            server,
            pending: VecDeque::new(),
        };
        future::ready(Ok(Box::new(channel) as Box<dyn UdpChannel>)).boxed()
    }

    fn exchange_tcp<'a>(
        &'a self,
        server: SocketAddr,
        query: &'a [u8],
    ) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        self.tcp_queries.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.respond(server, query, Proto::Tcp).into_iter();
        match replies.next() {
            Some((packet, _)) => future::ready(Ok(packet)).boxed(),
            None => future::ready(Err(io::ErrorKind::ConnectionReset.into())).boxed(),
        }
    }
}

pub fn name(s: &str) -> Name {
    s.parse().unwrap()
}

pub fn a(owner: &str, ip: [u8; 4], ttl: u32) -> ResourceRecord {
    ResourceRecord::new(name(owner), ttl, RRData::A(Ipv4Addr::from(ip)))
}

pub fn ns(zone: &str, target: &str, ttl: u32) -> ResourceRecord {
    ResourceRecord::new(name(zone), ttl, RRData::NS(name(target)))
}

pub fn cname(owner: &str, target: &str, ttl: u32) -> ResourceRecord {
    ResourceRecord::new(name(owner), ttl, RRData::CNAME(name(target)))
}

pub fn soa(zone: &str, ttl: u32, minimum_ttl: u32) -> ResourceRecord {
    ResourceRecord::new(
        name(zone),
        ttl,
        RRData::SOA(Soa {
            primary_ns: name(&format!("ns1.{}", zone)),
            mailbox: name(&format!("hostmaster.{}", zone)),
            serial: 1,
            refresh: 7200,
            retry: 3600,
            expire: 1_209_600,
            minimum_ttl,
        }),
    )
}

/// A non-authoritative delegation of `zone` to `nameservers`, with glue for
/// those that have an address
pub fn referral(query: &Message, zone: &str, nameservers: &[(&str, Option<[u8; 4]>)]) -> Reply {
    let mut response = Message::response_to(query);
    response.header.recursion_available = false;
    for &(target, glue) in nameservers {
        response.nameservers.push(ns(zone, target, 172_800));
        if let Some(ip) = glue {
            response.additional.push(a(target, ip, 172_800));
        }
    }
    Reply::Message(response)
}

pub fn authoritative(query: &Message, answers: Vec<ResourceRecord>) -> Reply {
    let mut response = Message::response_to(query);
    response.header.authoritative = true;
    response.header.recursion_available = false;
    response.answers = answers;
    Reply::Message(response)
}

pub fn nxdomain(query: &Message, zone: &str, negative_ttl: u32) -> Reply {
    let mut response = Message::response_to(query);
    response.header.authoritative = true;
    response.header.recursion_available = false;
    response.header.response_code = ResponseCode::NameError;
    response.nameservers.push(soa(zone, 3600, negative_ttl));
    Reply::Message(response)
}
