use std::fmt;

use super::{Class, Header, Name, Opcode, RRData, ResponseCode, Type};

/// A DNS message, either a query or a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub nameservers: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

/// A parsed chunk of data in the Query section of the packet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub qname: Name,
    pub qtype: Type,
    pub qclass: Class,
}

/// A single DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: Name,
    pub cls: Class,
    pub ttl: u32,
    pub data: RRData,
}

impl Question {
    pub fn new(qname: Name, qtype: Type) -> Question {
        Question {
            qname,
            qtype,
            qclass: Class::IN,
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} {}", self.qname, self.qtype)
    }
}

impl ResourceRecord {
    pub fn new(name: Name, ttl: u32, data: RRData) -> ResourceRecord {
        ResourceRecord {
            name,
            cls: Class::IN,
            ttl,
            data,
        }
    }

    pub fn typ(&self) -> Type {
        self.data.typ()
    }

    /// EDNS0 pseudo-record advertising `udp_payload` bytes
    pub fn opt(udp_payload: u16) -> ResourceRecord {
        ResourceRecord {
            name: Name::root(),
            cls: Class::Unknown(udp_payload),
            ttl: 0,
            data: RRData::Unknown {
                typ: Type::OPT,
                data: Vec::new(),
            },
        }
    }
}

impl Message {
    /// An iterative query (RD clear) for a single question
    ///
    /// When `udp_payload` is above the classic 512 byte limit, an EDNS0 OPT
    /// pseudo-record advertising it is added.
    pub fn query(id: u16, question: Question, udp_payload: u16) -> Message {
        let mut additional = Vec::new();
        if udp_payload > 512 {
            additional.push(ResourceRecord::opt(udp_payload));
        }
        Message {
            header: Header {
                id,
                query: true,
                opcode: Opcode::StandardQuery,
                authoritative: false,
                truncated: false,
                recursion_desired: false,
                recursion_available: false,
                authenticated_data: false,
                checking_disabled: false,
                response_code: ResponseCode::NoError,
                questions: 1,
                answers: 0,
                nameservers: 0,
                additional: additional.len() as u16,
            },
            questions: vec![question],
            answers: Vec::new(),
            nameservers: Vec::new(),
            additional,
        }
    }

    /// An empty response echoing the id, opcode, RD bit and questions of
    /// `request`
    pub fn response_to(request: &Message) -> Message {
        Message {
            header: Header {
                id: request.header.id,
                query: false,
                opcode: request.header.opcode,
                authoritative: false,
                truncated: false,
                recursion_desired: request.header.recursion_desired,
                recursion_available: true,
                authenticated_data: false,
                checking_disabled: request.header.checking_disabled,
                response_code: ResponseCode::NoError,
                questions: request.questions.len() as u16,
                answers: 0,
                nameservers: 0,
                additional: 0,
            },
            questions: request.questions.clone(),
            answers: Vec::new(),
            nameservers: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// The UDP payload size advertised by an EDNS0 OPT record, if any
    pub fn udp_payload_size(&self) -> Option<u16> {
        self.additional
            .iter()
            .find(|rr| rr.typ() == Type::OPT)
            .map(|rr| u16::from(rr.cls))
    }

    /// The SOA record of the authority section, if any
    pub fn soa(&self) -> Option<(&ResourceRecord, &super::Soa)> {
        self.nameservers.iter().find_map(|rr| match rr.data {
            RRData::SOA(ref soa) => Some((rr, soa)),
            _ => None,
        })
    }
}
