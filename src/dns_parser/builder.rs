use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::{Error, Header, Message, Question, ResourceRecord};

pub enum Questions {}
pub enum Answers {}
pub enum Nameservers {}
pub enum Additional {}

pub trait MoveTo<T> {}
impl<T> MoveTo<T> for T {}

impl MoveTo<Answers> for Questions {}

impl MoveTo<Nameservers> for Questions {}
impl MoveTo<Nameservers> for Answers {}

impl MoveTo<Additional> for Questions {}
impl MoveTo<Additional> for Answers {}
impl MoveTo<Additional> for Nameservers {}

/// Allows to build a DNS packet
///
/// Sections have to be filled in wire order; the type parameter tracks
/// which section is being written. Names are written uncompressed.
pub struct Builder<S> {
    buf: Vec<u8>,
    max_size: Option<usize>,
    _state: PhantomData<S>,
}

impl Builder<Questions> {
    /// Starts a packet with the flags of `header`
    ///
    /// Section counts of `header` are ignored, they are maintained by the
    /// `add_*` methods.
    pub fn with_header(header: &Header) -> Builder<Questions> {
        let mut buf = Vec::with_capacity(512);
        let head = Header {
            questions: 0,
            answers: 0,
            nameservers: 0,
            additional: 0,
            ..*header
        };
        buf.extend([0u8; 12].iter());
        head.write(&mut buf[..12]);
        Builder {
            buf,
            max_size: None,
            _state: PhantomData,
        }
    }
}

impl<T> Builder<T> {
    fn write_rr(&mut self, record: &ResourceRecord) -> Result<(), Error> {
        record.name.write_to(&mut self.buf)?;
        self.buf.write_u16::<BigEndian>(record.typ().into())?;
        self.buf.write_u16::<BigEndian>(record.cls.into())?;
        self.buf.write_u32::<BigEndian>(record.ttl)?;

        let size_offset = self.buf.len();
        self.buf.write_u16::<BigEndian>(0)?;

        let data_offset = self.buf.len();
        record.data.write_to(&mut self.buf)?;
        let data_size = self.buf.len() - data_offset;
        if data_size > u16::MAX as usize {
            return Err(Error::WrongRdataLength);
        }

        BigEndian::write_u16(
            &mut self.buf[size_offset..size_offset + 2],
            data_size as u16,
        );
        Ok(())
    }

    /// Returns the final packet
    ///
    /// When packet is not truncated method returns `Ok(packet)`. If
    /// packet is larger than the maximum size the TC bit is set and the
    /// method returns `Err(packet)`. In both cases the packet is fully
    /// valid.
    pub fn build(mut self) -> Result<Vec<u8>, Vec<u8>> {
        match self.max_size {
            Some(max_size) if self.buf.len() > max_size => {
                Header::set_truncated(&mut self.buf[..12]);
                Err(self.buf)
            }
            _ => Ok(self.buf),
        }
    }

    pub fn move_to<U>(self) -> Builder<U>
    where
        T: MoveTo<U>,
    {
        Builder {
            buf: self.buf,
            max_size: self.max_size,
            _state: PhantomData,
        }
    }

    pub fn set_max_size(&mut self, max_size: Option<usize>) {
        self.max_size = max_size;
    }
}

impl<T: MoveTo<Questions>> Builder<T> {
    /// Adds a question to the packet
    pub fn add_question(self, question: &Question) -> Result<Builder<Questions>, Error> {
        let mut builder = self.move_to::<Questions>();

        question.qname.write_to(&mut builder.buf)?;
        builder.buf.write_u16::<BigEndian>(question.qtype.into())?;
        builder.buf.write_u16::<BigEndian>(question.qclass.into())?;
        Header::inc_questions(&mut builder.buf).ok_or(Error::TooManyRecords)?;
        Ok(builder)
    }
}

impl<T: MoveTo<Answers>> Builder<T> {
    pub fn add_answer(self, record: &ResourceRecord) -> Result<Builder<Answers>, Error> {
        let mut builder = self.move_to::<Answers>();

        builder.write_rr(record)?;
        Header::inc_answers(&mut builder.buf).ok_or(Error::TooManyRecords)?;
        Ok(builder)
    }
}

impl<T: MoveTo<Nameservers>> Builder<T> {
    pub fn add_nameserver(self, record: &ResourceRecord) -> Result<Builder<Nameservers>, Error> {
        let mut builder = self.move_to::<Nameservers>();

        builder.write_rr(record)?;
        Header::inc_nameservers(&mut builder.buf).ok_or(Error::TooManyRecords)?;
        Ok(builder)
    }
}

impl<T: MoveTo<Additional>> Builder<T> {
    pub fn add_additional(self, record: &ResourceRecord) -> Result<Builder<Additional>, Error> {
        let mut builder = self.move_to::<Additional>();

        builder.write_rr(record)?;
        Header::inc_additional(&mut builder.buf).ok_or(Error::TooManyRecords)?;
        Ok(builder)
    }
}

impl Message {
    /// Encodes the message
    ///
    /// Header counts are taken from the section lengths, not from
    /// `self.header`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(self.encode(None)?.unwrap_or_else(|x| x))
    }

    /// Encodes the message for a client that accepts at most `max_size`
    /// bytes
    ///
    /// A message that does not fit is replaced by its header and question
    /// section with the TC bit set, telling the client to retry over TCP.
    pub fn to_bytes_limited(&self, max_size: usize) -> Result<Vec<u8>, Error> {
        match self.encode(Some(max_size))? {
            Ok(packet) => Ok(packet),
            Err(_) => {
                let mut questions = Builder::with_header(&self.header);
                for question in &self.questions {
                    questions = questions.add_question(question)?;
                }
                let mut packet = questions.build().unwrap_or_else(|x| x);
                Header::set_truncated(&mut packet[..12]);
                Ok(packet)
            }
        }
    }

    fn encode(&self, max_size: Option<usize>) -> Result<Result<Vec<u8>, Vec<u8>>, Error> {
        let mut questions = Builder::with_header(&self.header);
        questions.set_max_size(max_size);
        for question in &self.questions {
            questions = questions.add_question(question)?;
        }
        let mut answers = questions.move_to::<Answers>();
        for record in &self.answers {
            answers = answers.add_answer(record)?;
        }
        let mut nameservers = answers.move_to::<Nameservers>();
        for record in &self.nameservers {
            nameservers = nameservers.add_nameserver(record)?;
        }
        let mut additional = nameservers.move_to::<Additional>();
        for record in &self.additional {
            additional = additional.add_additional(record)?;
        }
        Ok(additional.build())
    }
}
