use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::{Error, Name, Type};

/// Start of authority record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    pub primary_ns: Name,
    pub mailbox: Name,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    /// Upper bound for caching negative answers (RFC 2308)
    pub minimum_ttl: u32,
}

/// The enumeration that represents known types of DNS resource records data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RRData {
    CNAME(Name),
    NS(Name),
    PTR(Name),
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    SOA(Soa),
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name,
    },
    MX {
        preference: u16,
        exchange: Name,
    },
    TXT(Vec<u8>),
    // Anything that can't be parsed yet
    Unknown {
        typ: Type,
        data: Vec<u8>,
    },
}

impl RRData {
    pub fn typ(&self) -> Type {
        match *self {
            RRData::CNAME(..) => Type::CNAME,
            RRData::NS(..) => Type::NS,
            RRData::PTR(..) => Type::PTR,
            RRData::A(..) => Type::A,
            RRData::AAAA(..) => Type::AAAA,
            RRData::SOA(..) => Type::SOA,
            RRData::SRV { .. } => Type::SRV,
            RRData::MX { .. } => Type::MX,
            RRData::TXT(..) => Type::TXT,
            RRData::Unknown { typ, .. } => typ,
        }
    }

    pub fn write_to<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        match *self {
            RRData::CNAME(ref name) | RRData::NS(ref name) | RRData::PTR(ref name) => {
                name.write_to(writer)
            }

            RRData::A(ip) => writer.write_u32::<BigEndian>(ip.into()),

            RRData::AAAA(ip) => {
                for segment in ip.segments().iter() {
                    writer.write_u16::<BigEndian>(*segment)?;
                }
                Ok(())
            }
            RRData::SOA(ref soa) => {
                soa.primary_ns.write_to(writer)?;
                soa.mailbox.write_to(writer)?;
                writer.write_u32::<BigEndian>(soa.serial)?;
                writer.write_u32::<BigEndian>(soa.refresh)?;
                writer.write_u32::<BigEndian>(soa.retry)?;
                writer.write_u32::<BigEndian>(soa.expire)?;
                writer.write_u32::<BigEndian>(soa.minimum_ttl)
            }
            RRData::SRV {
                priority,
                weight,
                port,
                ref target,
            } => {
                writer.write_u16::<BigEndian>(priority)?;
                writer.write_u16::<BigEndian>(weight)?;
                writer.write_u16::<BigEndian>(port)?;
                target.write_to(writer)
            }
            RRData::MX {
                preference,
                ref exchange,
            } => {
                writer.write_u16::<BigEndian>(preference)?;
                exchange.write_to(writer)
            }
            RRData::TXT(ref data) => writer.write_all(data),
            RRData::Unknown { ref data, .. } => writer.write_all(data),
        }
    }

    /// Decodes the rdata found at `original[start..end]`
    ///
    /// Names inside the rdata may point anywhere earlier in `original`,
    /// but must not run past `end`.
    pub fn parse(typ: Type, original: &[u8], start: usize, end: usize) -> Result<RRData, Error> {
        let rdata = &original[start..end];
        let name_at = |pos: usize| -> Result<(Name, usize), Error> {
            let (name, after) = Name::scan(&original[..end], pos)?;
            Ok((name, after))
        };
        let whole_name = |pos: usize| -> Result<Name, Error> {
            let (name, after) = name_at(pos)?;
            if after != end {
                return Err(Error::WrongRdataLength);
            }
            Ok(name)
        };
        match typ {
            Type::A => {
                if rdata.len() != 4 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::A(Ipv4Addr::from(BigEndian::read_u32(rdata))))
            }
            Type::AAAA => {
                if rdata.len() != 16 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::AAAA(Ipv6Addr::new(
                    BigEndian::read_u16(&rdata[0..2]),
                    BigEndian::read_u16(&rdata[2..4]),
                    BigEndian::read_u16(&rdata[4..6]),
                    BigEndian::read_u16(&rdata[6..8]),
                    BigEndian::read_u16(&rdata[8..10]),
                    BigEndian::read_u16(&rdata[10..12]),
                    BigEndian::read_u16(&rdata[12..14]),
                    BigEndian::read_u16(&rdata[14..16]),
                )))
            }
            Type::CNAME => Ok(RRData::CNAME(whole_name(start)?)),
            Type::NS => Ok(RRData::NS(whole_name(start)?)),
            Type::PTR => Ok(RRData::PTR(whole_name(start)?)),
            Type::SOA => {
                let (primary_ns, pos) = name_at(start)?;
                let (mailbox, pos) = name_at(pos)?;
                if end - pos != 20 {
                    return Err(Error::WrongRdataLength);
                }
                let fields = &original[pos..end];
                Ok(RRData::SOA(Soa {
                    primary_ns,
                    mailbox,
                    serial: BigEndian::read_u32(&fields[0..4]),
                    refresh: BigEndian::read_u32(&fields[4..8]),
                    retry: BigEndian::read_u32(&fields[8..12]),
                    expire: BigEndian::read_u32(&fields[12..16]),
                    minimum_ttl: BigEndian::read_u32(&fields[16..20]),
                }))
            }
            Type::MX => {
                if rdata.len() < 3 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::MX {
                    preference: BigEndian::read_u16(&rdata[..2]),
                    exchange: whole_name(start + 2)?,
                })
            }
            Type::SRV => {
                if rdata.len() < 7 {
                    return Err(Error::WrongRdataLength);
                }
                Ok(RRData::SRV {
                    priority: BigEndian::read_u16(&rdata[..2]),
                    weight: BigEndian::read_u16(&rdata[2..4]),
                    port: BigEndian::read_u16(&rdata[4..6]),
                    target: whole_name(start + 6)?,
                })
            }
            Type::TXT => Ok(RRData::TXT(rdata.to_vec())),
            typ => Ok(RRData::Unknown {
                typ,
                data: rdata.to_vec(),
            }),
        }
    }
}
