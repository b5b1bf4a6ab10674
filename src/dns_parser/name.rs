use std::fmt;
use std::io;
use std::str::{from_utf8, FromStr};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use super::Error;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

/// A domain name
///
/// Labels are stored lowercased, so comparing and hashing names is
/// case-insensitive. The root is the name without labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    labels: Vec<String>,
}

impl Name {
    pub fn root() -> Name {
        Name { labels: Vec::new() }
    }

    /// Reads a possibly compressed name starting at `start` in `original`
    ///
    /// Returns the name and the offset just past its in-place encoding.
    /// Compression pointers have to point strictly before the labels that
    /// refer to them, which rules out loops.
    pub fn scan(original: &[u8], start: usize) -> Result<(Name, usize), Error> {
        let mut labels = Vec::new();
        let mut wire_len = 1;
        let mut pos = start;
        let mut limit = start;
        let mut end = None;
        loop {
            let byte = *original.get(pos).ok_or(Error::UnexpectedEOF)?;
            if byte == 0 {
                let end = end.unwrap_or(pos + 1);
                return Ok((Name { labels }, end));
            } else if byte & 0b1100_0000 == 0b1100_0000 {
                if original.len() < pos + 2 {
                    return Err(Error::UnexpectedEOF);
                }
                let off =
                    (BigEndian::read_u16(&original[pos..pos + 2]) & !0b1100_0000_0000_0000) as usize;
                if off >= limit {
                    return Err(Error::PointerLoop);
                }
                end.get_or_insert(pos + 2);
                limit = off;
                pos = off;
            } else if byte & 0b1100_0000 == 0 {
                let len = byte as usize;
                let label = original
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(Error::UnexpectedEOF)?;
                let label = from_utf8(label).map_err(|_| Error::LabelIsNotAscii)?;
                wire_len += len + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(Error::NameTooLong);
                }
                labels.push(label.to_ascii_lowercase());
                pos += len + 1;
            } else {
                return Err(Error::UnknownLabelFormat);
            }
        }
    }

    pub fn from_labels<I, S>(labels: I) -> Result<Name, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut wire_len = 1;
        let mut result = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if label.is_empty() {
                return Err(Error::EmptyLabel);
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(Error::LabelTooLong);
            }
            wire_len += label.len() + 1;
            if wire_len > MAX_NAME_LEN {
                return Err(Error::NameTooLong);
            }
            result.push(label.to_ascii_lowercase());
        }
        Ok(Name { labels: result })
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// True if `self` is `zone` or lies below it
    pub fn is_subdomain_of(&self, zone: &Name) -> bool {
        self.labels.ends_with(&zone.labels)
    }

    /// This name followed by each of its ancestors, ending with the root
    pub fn ancestors(&self) -> impl Iterator<Item = Name> + '_ {
        (0..=self.labels.len()).map(move |skip| Name {
            labels: self.labels[skip..].to_vec(),
        })
    }

    pub fn write_to<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        for label in &self.labels {
            writer.write_u8(label.len() as u8)?;
            writer.write_all(label.as_bytes())?;
        }
        writer.write_u8(0)
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(name: &str) -> Result<Name, Error> {
        let name = name.strip_suffix('.').unwrap_or(name);
        if name.is_empty() {
            return Ok(Name::root());
        }
        Name::from_labels(name.split('.'))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return fmt.write_str(".");
        }
        for label in &self.labels {
            fmt.write_str(label)?;
            fmt.write_str(".")?;
        }
        Ok(())
    }
}
