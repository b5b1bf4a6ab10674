//! Records learned during resolution, kept until their TTL runs out.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use log::trace;
use tokio::time::Instant;

use crate::dns_parser::{Class, Name, ResourceRecord, Type};

/// What kind of authoritative absence a negative entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeKind {
    /// The name does not exist at all
    NxDomain,
    /// The name exists but has no records of the asked type
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: Name,
    pub typ: Type,
    pub class: Class,
}

/// A cache hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached {
    Records(Vec<ResourceRecord>),
    Negative(NegativeKind),
}

#[derive(Debug)]
struct CacheEntry {
    data: Cached,
    inserted: Instant,
    ttl: u32,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.inserted + Duration::from_secs(u64::from(self.ttl))
    }

    fn snapshot(&self, now: Instant) -> (Cached, u32) {
        let age = now.saturating_duration_since(self.inserted).as_secs();
        (self.data.clone(), age.min(u64::from(u32::MAX)) as u32)
    }
}

/// Shared by every resolution running on a `Resolver`
///
/// Entries are only dropped when a lookup finds them expired. Concurrent
/// inserts for one key resolve as last write wins.
#[derive(Debug, Default)]
pub struct Cache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &Name, typ: Type, class: Class) -> Option<Cached> {
        self.lookup_at(name, typ, class, Instant::now())
    }

    /// The entry for `(name, typ, class)` exactly as it was inserted
    pub fn lookup_at(&self, name: &Name, typ: Type, class: Class, now: Instant) -> Option<Cached> {
        self.entry_at(name, typ, class, now).map(|(data, _)| data)
    }

    /// Like `lookup`, with record TTLs reduced by the time spent in the cache
    pub fn lookup_remaining(&self, name: &Name, typ: Type, class: Class) -> Option<Cached> {
        self.lookup_remaining_at(name, typ, class, Instant::now())
    }

    pub fn lookup_remaining_at(
        &self,
        name: &Name,
        typ: Type,
        class: Class,
        now: Instant,
    ) -> Option<Cached> {
        let (data, age) = self.entry_at(name, typ, class, now)?;
        Some(match data {
            Cached::Records(mut records) => {
                for record in &mut records {
                    record.ttl = record.ttl.saturating_sub(age);
                }
                Cached::Records(records)
            }
            negative => negative,
        })
    }

    /// An unexpired entry and its age in whole seconds
    fn entry_at(&self, name: &Name, typ: Type, class: Class, now: Instant) -> Option<(Cached, u32)> {
        let key = CacheKey {
            name: name.clone(),
            typ,
            class,
        };
        {
            let entries = self.entries.read().unwrap();
            match entries.get(&key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.snapshot(now)),
                Some(_) => (),
            }
        }

        // The entry may have been replaced between the two locks
        let mut entries = self.entries.write().unwrap();
        if let Entry::Occupied(entry) = entries.entry(key) {
            if entry.get().is_expired(now) {
                trace!("evicting expired {} {}", entry.key().name, entry.key().typ);
                entry.remove();
            } else {
                return Some(entry.get().snapshot(now));
            }
        }
        None
    }

    /// Caches records grouped by name, type and class
    ///
    /// Each group replaces whatever was cached under its key and lives as
    /// long as the smallest TTL in the group.
    pub fn insert(&self, records: &[ResourceRecord]) {
        self.insert_at(records, Instant::now())
    }

    pub fn insert_at(&self, records: &[ResourceRecord], now: Instant) {
        let mut groups: Vec<(CacheKey, Vec<ResourceRecord>)> = Vec::new();
        for record in records {
            let key = CacheKey {
                name: record.name.clone(),
                typ: record.typ(),
                class: record.cls,
            };
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(record.clone()),
                None => groups.push((key, vec![record.clone()])),
            }
        }

        let mut entries = self.entries.write().unwrap();
        for (key, group) in groups {
            let ttl = group.iter().map(|rr| rr.ttl).min().unwrap_or(0);
            trace!("caching {} {} for {}s", key.name, key.typ, ttl);
            entries.insert(
                key,
                CacheEntry {
                    data: Cached::Records(group),
                    inserted: now,
                    ttl,
                },
            );
        }
    }

    /// Remembers that `name` has no `typ` records until `ttl` runs out
    pub fn insert_negative(&self, name: &Name, typ: Type, class: Class, ttl: u32, kind: NegativeKind) {
        self.insert_negative_at(name, typ, class, ttl, kind, Instant::now())
    }

    pub fn insert_negative_at(
        &self,
        name: &Name,
        typ: Type,
        class: Class,
        ttl: u32,
        kind: NegativeKind,
        now: Instant,
    ) {
        trace!("caching {:?} for {} {} for {}s", kind, name, typ, ttl);
        let key = CacheKey {
            name: name.clone(),
            typ,
            class,
        };
        self.entries.write().unwrap().insert(
            key,
            CacheEntry {
                data: Cached::Negative(kind),
                inserted: now,
                ttl,
            },
        );
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
