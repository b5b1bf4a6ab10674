use byteorder::{BigEndian, ByteOrder};

use super::{Class, Error, Header, Message, Name, Question, RRData, ResourceRecord, Type};

impl Message {
    /// Parse a full DNS message
    ///
    /// Every byte of `data` has to be accounted for by the section counts
    /// in the header.
    pub fn parse(data: &[u8]) -> Result<Message, Error> {
        let header = Header::parse(data)?;
        let mut offset = Header::size();

        let mut questions = Vec::with_capacity(header.questions as usize);
        for _ in 0..header.questions {
            let (qname, end) = Name::scan(data, offset)?;
            if end + 4 > data.len() {
                return Err(Error::UnexpectedEOF);
            }
            questions.push(Question {
                qname,
                qtype: BigEndian::read_u16(&data[end..end + 2]).into(),
                qclass: BigEndian::read_u16(&data[end + 2..end + 4]).into(),
            });
            offset = end + 4;
        }

        let answers = parse_records(data, &mut offset, header.answers)?;
        let nameservers = parse_records(data, &mut offset, header.nameservers)?;
        let additional = parse_records(data, &mut offset, header.additional)?;

        if offset != data.len() {
            return Err(Error::TrailingData(data.len() - offset));
        }

        Ok(Message {
            header,
            questions,
            answers,
            nameservers,
            additional,
        })
    }

    /// Same as `parse`, but refuses to look at anything larger than `max`
    /// bytes
    pub fn parse_limited(data: &[u8], max: usize) -> Result<Message, Error> {
        if data.len() > max {
            return Err(Error::TruncatedResponse {
                len: data.len(),
                max,
            });
        }
        Message::parse(data)
    }
}

impl Header {
    pub fn size() -> usize {
        12
    }
}

fn parse_records(data: &[u8], offset: &mut usize, count: u16) -> Result<Vec<ResourceRecord>, Error> {
    // each record takes at least 11 bytes, don't trust the count blindly
    let mut records = Vec::with_capacity((count as usize).min(data.len() / 11));
    for _ in 0..count {
        records.push(parse_record(data, offset)?);
    }
    Ok(records)
}

fn parse_record(data: &[u8], offset: &mut usize) -> Result<ResourceRecord, Error> {
    let (name, pos) = Name::scan(data, *offset)?;
    if pos + 10 > data.len() {
        return Err(Error::UnexpectedEOF);
    }
    let typ = Type::from(BigEndian::read_u16(&data[pos..pos + 2]));
    let cls = Class::from(BigEndian::read_u16(&data[pos + 2..pos + 4]));
    let ttl = BigEndian::read_u32(&data[pos + 4..pos + 8]);
    let rdlen = BigEndian::read_u16(&data[pos + 8..pos + 10]) as usize;
    let start = pos + 10;
    let end = start + rdlen;
    if end > data.len() {
        return Err(Error::UnexpectedEOF);
    }
    let data = RRData::parse(typ, data, start, end)?;
    *offset = end;
    Ok(ResourceRecord {
        name,
        cls,
        ttl,
        data,
    })
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::dns_parser::{Opcode, ResponseCode};

    #[test]
    fn parse_example_query() {
        let query = b"\x06%\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
                      \x07example\x03com\x00\x00\x01\x00\x01";
        let packet = Message::parse(query).unwrap();
        assert_eq!(packet.header.id, 1573);
        assert!(packet.header.query);
        assert_eq!(packet.header.opcode, Opcode::StandardQuery);
        assert_eq!(packet.questions.len(), 1);
        assert_eq!(packet.questions[0].qtype, Type::A);
        assert_eq!(packet.questions[0].qclass, Class::IN);
        assert_eq!(packet.questions[0].qname.to_string(), "example.com.");
        assert_eq!(packet.answers.len(), 0);
    }

    #[test]
    fn parse_example_response() {
        let response = b"\x06%\x81\x80\x00\x01\x00\x01\x00\x00\x00\x00\
                         \x07example\x03com\x00\x00\x01\x00\x01\
                         \xc0\x0c\x00\x01\x00\x01\x00\x00\x04\xf8\
                         \x00\x04]\xb8\xd8\"";
        let packet = Message::parse(response).unwrap();
        assert!(!packet.header.query);
        assert!(packet.header.recursion_available);
        assert_eq!(packet.header.response_code, ResponseCode::NoError);
        assert_eq!(packet.answers.len(), 1);
        assert_eq!(packet.answers[0].name.to_string(), "example.com.");
        assert_eq!(packet.answers[0].cls, Class::IN);
        assert_eq!(packet.answers[0].ttl, 1272);
        assert_eq!(
            packet.answers[0].data,
            RRData::A(Ipv4Addr::new(93, 184, 216, 34))
        );
    }

    #[test]
    fn count_mismatch_is_an_error() {
        // claims one answer but carries none
        let short = b"\x06%\x81\x80\x00\x01\x00\x01\x00\x00\x00\x00\
                      \x07example\x03com\x00\x00\x01\x00\x01";
        assert!(matches!(Message::parse(short), Err(Error::UnexpectedEOF)));

        // claims no questions but carries one
        let long = b"\x06%\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\
                     \x07example\x03com\x00\x00\x01\x00\x01";
        assert!(matches!(Message::parse(long), Err(Error::TrailingData(17))));
    }

    #[test]
    fn oversized_datagram_is_truncated() {
        let data = vec![0u8; 600];
        assert!(matches!(
            Message::parse_limited(&data, 512),
            Err(Error::TruncatedResponse { len: 600, max: 512 })
        ));
    }

    #[test]
    fn record_running_past_end() {
        let response = b"\x06%\x81\x80\x00\x00\x00\x01\x00\x00\x00\x00\
                         \x00\x00\x01\x00\x01\x00\x00\x04\xf8\x00\x08\x01\x02";
        assert!(matches!(
            Message::parse(response),
            Err(Error::UnexpectedEOF)
        ));
    }
}
