//! The iterative walk from the root (or the closest cached delegation)
//! down to the servers that can answer a question.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use futures_util::future::{BoxFuture, FutureExt};
use log::{debug, trace, warn};
use multimap::MultiMap;

use crate::cache::{Cached, NegativeKind};
use crate::dns_parser::{Class, Message, Name, Question, RRData, ResourceRecord, ResponseCode, Type};
use crate::pool::ServerSet;
use crate::transport::Transport;
use crate::{Error, Resolver};

/// Outcome of a resolution that reached a definitive answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Records answering the question, preceded by the CNAME records that
    /// led to them
    Answer(Vec<ResourceRecord>),
    /// The name or the type does not exist; `aliases` are the CNAME records
    /// followed before finding out
    Negative {
        kind: NegativeKind,
        aliases: Vec<ResourceRecord>,
    },
}

impl Resolution {
    pub fn records(&self) -> &[ResourceRecord] {
        match *self {
            Resolution::Answer(ref records) => records,
            Resolution::Negative { ref aliases, .. } => aliases,
        }
    }

    pub fn is_nxdomain(&self) -> bool {
        matches!(
            *self,
            Resolution::Negative {
                kind: NegativeKind::NxDomain,
                ..
            }
        )
    }

    /// A recursive response to `request` carrying this resolution
    pub fn into_response(self, request: &Message) -> Message {
        let mut response = Message::response_to(request);
        if self.is_nxdomain() {
            response.header.response_code = ResponseCode::NameError;
        }
        response.answers = match self {
            Resolution::Answer(records) => records,
            Resolution::Negative { aliases, .. } => aliases,
        };
        response.header.answers = response.answers.len() as u16;
        response
    }
}

/// Limits shared by a resolution and every nameserver lookup it triggers
#[derive(Debug)]
pub(crate) struct Budget {
    queries_left: usize,
    nesting: usize,
}

impl Budget {
    pub(crate) fn new(max_queries: usize) -> Budget {
        Budget {
            queries_left: max_queries,
            nesting: 0,
        }
    }

    fn spend(&mut self) -> Result<(), Error> {
        if self.queries_left == 0 {
            return Err(Error::TooManyReferrals);
        }
        self.queries_left -= 1;
        Ok(())
    }
}

/// What a response (or the cache) means for the walk
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Answer(Vec<ResourceRecord>),
    /// CNAME records ending at a name whose records are still unknown
    Alias(Vec<ResourceRecord>, Name),
    Referral {
        zone: Name,
        targets: Vec<Name>,
    },
    Negative {
        kind: NegativeKind,
        negative_ttl: Option<u32>,
    },
    NoProgress,
}

fn type_matches(qtype: Type, typ: Type) -> bool {
    qtype == typ || (qtype == Type::All && typ != Type::OPT)
}

fn class_matches(qclass: Class, cls: Class) -> bool {
    qclass == cls || qclass == Class::Any
}

/// Follows the answer section from the question name through CNAMEs
fn follow_answers(question: &Question, answers: &[ResourceRecord]) -> Option<Step> {
    let mut name = question.qname.clone();
    let mut chain = Vec::new();
    for _ in 0..=answers.len() {
        let matching: Vec<ResourceRecord> = answers
            .iter()
            .filter(|rr| {
                rr.name == name
                    && class_matches(question.qclass, rr.cls)
                    && type_matches(question.qtype, rr.typ())
            })
            .cloned()
            .collect();
        if !matching.is_empty() {
            chain.extend(matching);
            return Some(Step::Answer(chain));
        }

        let alias = answers.iter().find_map(|rr| match rr.data {
            RRData::CNAME(ref target) if rr.name == name => Some((rr, target)),
            _ => None,
        });
        match alias {
            Some((rr, target)) => {
                chain.push(rr.clone());
                name = target.clone();
            }
            None => break,
        }
    }

    if chain.is_empty() {
        None
    } else {
        Some(Step::Alias(chain, name))
    }
}

/// The first delegation in `nameservers` that moves below `zone` towards
/// the question name
fn delegation(question: &Question, zone: &Name, nameservers: &[ResourceRecord]) -> Option<Step> {
    let child = nameservers
        .iter()
        .filter(|rr| rr.typ() == Type::NS)
        .map(|rr| &rr.name)
        .find(|owner| {
            question.qname.is_subdomain_of(owner) && owner.is_subdomain_of(zone) && *owner != zone
        })?
        .clone();
    let targets = nameservers
        .iter()
        .filter_map(|rr| match rr.data {
            RRData::NS(ref target) if rr.name == child => Some(target.clone()),
            _ => None,
        })
        .collect();
    Some(Step::Referral {
        zone: child,
        targets,
    })
}

/// Decides what a response from the servers of `zone` means for `question`
fn classify(question: &Question, zone: &Name, response: &Message) -> Step {
    if let Some(step) = follow_answers(question, &response.answers) {
        return step;
    }

    let header = &response.header;
    let soa = response.soa();
    // RFC 2308: the lesser of the SOA's own TTL and its minimum field
    let negative_ttl = soa.map(|(rr, soa)| rr.ttl.min(soa.minimum_ttl));
    let denial = header.authoritative || soa.is_some();

    match header.response_code {
        ResponseCode::NameError if denial => Step::Negative {
            kind: NegativeKind::NxDomain,
            negative_ttl,
        },
        ResponseCode::NoError => {
            if let Some(referral) = delegation(question, zone, &response.nameservers) {
                referral
            } else if denial {
                Step::Negative {
                    kind: NegativeKind::NoData,
                    negative_ttl,
                }
            } else {
                Step::NoProgress
            }
        }
        _ => Step::NoProgress,
    }
}

fn check_depth(depth: usize, max_depth: usize) -> Result<(), Error> {
    if depth > max_depth {
        debug!("giving up after {} referrals", depth - 1);
        return Err(Error::TooManyReferrals);
    }
    Ok(())
}

impl<T: Transport> Resolver<T> {
    /// Resolves `question` with at most `max_depth` referrals and CNAME
    /// hops
    pub async fn resolve_with_depth(
        &self,
        question: &Question,
        max_depth: usize,
    ) -> Result<Resolution, Error> {
        let mut budget = Budget::new(self.inner.config.max_queries);
        self.walk(question.clone(), max_depth, &mut budget).await
    }

    pub(crate) fn walk<'a>(
        &'a self,
        question: Question,
        max_depth: usize,
        budget: &'a mut Budget,
    ) -> BoxFuture<'a, Result<Resolution, Error>> {
        async move {
            let mut question = question;
            let mut aliases = Vec::new();
            let mut depth = 0;
            let mut visited = HashSet::new();

            'start: loop {
                let mut servers = self.closest_servers(&question.qname);
                debug!("resolving {} starting at {}", question, servers);

                loop {
                    match self.cached_answer(&question) {
                        Some(Step::Answer(records)) => {
                            debug!("{} answered from cache", question);
                            aliases.extend(records);
                            return Ok(Resolution::Answer(aliases));
                        }
                        Some(Step::Negative { kind, .. }) => {
                            debug!("{} is cached as {:?}", question, kind);
                            return Ok(Resolution::Negative { kind, aliases });
                        }
                        Some(Step::Alias(chain, target)) => {
                            debug!("{} is a cached alias for {}", question.qname, target);
                            depth += 1;
                            check_depth(depth, max_depth)?;
                            aliases.extend(chain);
                            question.qname = target;
                            continue 'start;
                        }
                        _ => (),
                    }

                    if !visited.insert((question.qname.clone(), servers.clone())) {
                        warn!("already asked {} for {}", servers, question);
                        return Err(Error::NoProgress(question.qname));
                    }
                    budget.spend()?;
                    let response = self.inner.pool.query(&servers, &question).await?;

                    match classify(&question, &servers.zone, &response) {
                        Step::Answer(records) => {
                            self.inner.cache.insert(&records);
                            aliases.extend(records);
                            return Ok(Resolution::Answer(aliases));
                        }
                        Step::Alias(chain, target) => {
                            debug!("{} is an alias for {}", question.qname, target);
                            self.inner.cache.insert(&chain);
                            depth += 1;
                            check_depth(depth, max_depth)?;
                            aliases.extend(chain);
                            question.qname = target;
                            continue 'start;
                        }
                        Step::Referral { zone, targets } => {
                            depth += 1;
                            check_depth(depth, max_depth)?;
                            debug!("{} delegates {} to {:?}", servers.zone, zone, targets);
                            servers = self
                                .follow_referral(&servers.zone, zone, targets, &response, max_depth, budget)
                                .await?;
                        }
                        Step::Negative { kind, negative_ttl } => {
                            debug!("{} does not exist ({:?})", question, kind);
                            if let Some(ttl) = negative_ttl {
                                self.inner.cache.insert_negative(
                                    &question.qname,
                                    question.qtype,
                                    question.qclass,
                                    ttl,
                                    kind,
                                );
                            }
                            return Ok(Resolution::Negative { kind, aliases });
                        }
                        Step::NoProgress => {
                            warn!("{} gave no usable answer for {}", servers, question);
                            return Err(Error::NoProgress(question.qname));
                        }
                    }
                }
            }
        }
        .boxed()
    }

    fn cached_answer(&self, question: &Question) -> Option<Step> {
        let cache = &self.inner.cache;
        match cache.lookup_remaining(&question.qname, question.qtype, question.qclass) {
            Some(Cached::Records(records)) => return Some(Step::Answer(records)),
            Some(Cached::Negative(kind)) => {
                return Some(Step::Negative {
                    kind,
                    negative_ttl: None,
                })
            }
            None => (),
        }

        if question.qtype == Type::CNAME {
            return None;
        }
        match cache.lookup_remaining(&question.qname, Type::CNAME, question.qclass) {
            Some(Cached::Records(records)) => {
                let target = records.iter().find_map(|rr| match rr.data {
                    RRData::CNAME(ref target) => Some(target.clone()),
                    _ => None,
                })?;
                Some(Step::Alias(records, target))
            }
            _ => None,
        }
    }

    /// The deepest cached delegation above `name` whose nameservers have
    /// cached addresses, or the root servers
    pub(crate) fn closest_servers(&self, name: &Name) -> ServerSet {
        for zone in name.ancestors() {
            if let Some(Cached::Records(records)) =
                self.inner.cache.lookup(&zone, Type::NS, Class::IN)
            {
                let targets: Vec<Name> = records
                    .iter()
                    .filter_map(|rr| match rr.data {
                        RRData::NS(ref target) => Some(target.clone()),
                        _ => None,
                    })
                    .collect();
                let servers = self.cached_addresses(&targets);
                if !servers.is_empty() {
                    return ServerSet::new(zone, servers);
                }
                trace!("no cached addresses for the nameservers of {}", zone);
            }
        }
        self.root_servers()
    }

    fn root_servers(&self) -> ServerSet {
        let config = &self.inner.config;
        let servers = config
            .root_servers
            .iter()
            .filter(|ip| config.ipv6 || ip.is_ipv4())
            .map(|&ip| SocketAddr::new(ip, config.port))
            .collect();
        ServerSet::new(Name::root(), servers)
    }

    fn cached_addresses(&self, targets: &[Name]) -> Vec<SocketAddr> {
        let mut addresses = MultiMap::new();
        for target in targets {
            for &typ in &[Type::A, Type::AAAA] {
                if let Some(Cached::Records(records)) =
                    self.inner.cache.lookup(target, typ, Class::IN)
                {
                    for rr in &records {
                        if let Some(ip) = address_of(rr) {
                            addresses.insert(target.clone(), ip);
                        }
                    }
                }
            }
        }
        self.server_addresses(targets, &addresses)
    }

    /// Addresses of `targets` in nameserver order, IPv4 before IPv6
    fn server_addresses(&self, targets: &[Name], addresses: &MultiMap<Name, IpAddr>) -> Vec<SocketAddr> {
        let config = &self.inner.config;
        let mut servers = Vec::new();
        for want_v4 in &[true, false] {
            if !*want_v4 && !config.ipv6 {
                continue;
            }
            for target in targets {
                for ip in addresses.get_vec(target).into_iter().flatten() {
                    let server = SocketAddr::new(*ip, config.port);
                    if ip.is_ipv4() == *want_v4 && !servers.contains(&server) {
                        servers.push(server);
                    }
                }
            }
        }
        servers
    }

    /// Caches the delegation of `zone` found in `response` and returns the
    /// servers to ask next
    ///
    /// Glue is only trusted for nameserver names inside `parent`, the zone
    /// of the servers that sent it.
    async fn follow_referral(
        &self,
        parent: &Name,
        zone: Name,
        targets: Vec<Name>,
        response: &Message,
        max_depth: usize,
        budget: &mut Budget,
    ) -> Result<ServerSet, Error> {
        let nameservers: Vec<ResourceRecord> = response
            .nameservers
            .iter()
            .filter(|rr| rr.name == zone && rr.typ() == Type::NS)
            .cloned()
            .collect();

        let mut glue = Vec::new();
        let mut addresses = MultiMap::new();
        for rr in &response.additional {
            let ip = match address_of(rr) {
                Some(ip) if targets.contains(&rr.name) => ip,
                _ => continue,
            };
            if !rr.name.is_subdomain_of(parent) {
                trace!("ignoring out of bailiwick glue {} from {}", rr.name, parent);
                continue;
            }
            addresses.insert(rr.name.clone(), ip);
            glue.push(rr.clone());
        }

        self.inner.cache.insert(&nameservers);
        self.inner.cache.insert(&glue);

        let mut servers = self.server_addresses(&targets, &addresses);
        if servers.is_empty() {
            servers = self.cached_addresses(&targets);
        }
        if servers.is_empty() {
            servers = self
                .resolve_nameservers(&zone, &targets, max_depth, budget)
                .await?;
        }
        Ok(ServerSet::new(zone, servers))
    }

    /// Looks up addresses for nameservers that came without glue
    async fn resolve_nameservers(
        &self,
        zone: &Name,
        targets: &[Name],
        max_depth: usize,
        budget: &mut Budget,
    ) -> Result<Vec<SocketAddr>, Error> {
        if budget.nesting >= self.inner.config.max_nesting {
            debug!("nameserver lookups for {} nested too deep", zone);
            return Err(Error::TooManyReferrals);
        }

        budget.nesting += 1;
        let mut servers = Vec::new();
        let mut result = Ok(());
        for target in targets {
            if target.is_subdomain_of(zone) {
                // only reachable through the zone it serves
                debug!("{} is inside {} but has no glue", target, zone);
                continue;
            }
            debug!("looking up nameserver {} for {}", target, zone);
            let question = Question::new(target.clone(), Type::A);
            match self.walk(question, max_depth, budget).await {
                Ok(Resolution::Answer(records)) => {
                    servers.extend(
                        records
                            .iter()
                            .filter_map(address_of)
                            .map(|ip| SocketAddr::new(ip, self.inner.config.port)),
                    );
                }
                Ok(_) => debug!("nameserver {} has no address", target),
                Err(Error::TooManyReferrals) => {
                    result = Err(Error::TooManyReferrals);
                    break;
                }
                Err(err) => debug!("couldn't resolve nameserver {}: {}", target, err),
            }
            if !servers.is_empty() {
                break;
            }
        }
        budget.nesting -= 1;

        result?;
        if servers.is_empty() {
            return Err(Error::NoNameservers(zone.clone()));
        }
        Ok(servers)
    }
}

fn address_of(rr: &ResourceRecord) -> Option<IpAddr> {
    match rr.data {
        RRData::A(ip) => Some(ip.into()),
        RRData::AAAA(ip) => Some(ip.into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::mock::{self, a, cname, name, MockNetwork, Reply};
    use crate::ResolverConfig;

    fn question(qname: &str, qtype: Type) -> Question {
        Question::new(name(qname), qtype)
    }

    fn resolver(network: &MockNetwork, roots: &[[u8; 4]]) -> Resolver<MockNetwork> {
        mock::init_logging();
        let config = ResolverConfig::default()
            .with_root_servers(roots.iter().map(|&ip| IpAddr::from(ip)).collect());
        Resolver::with_transport(config, network.clone())
    }

    const ROOT: [u8; 4] = [198, 41, 0, 4];
    const COM: [u8; 4] = [192, 5, 6, 30];
    const EXAMPLE_COM: [u8; 4] = [192, 0, 2, 53];

    /// root -> com. -> example.com., the last one serving a few names
    fn example_hierarchy() -> MockNetwork {
        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            mock::referral(query, "com", &[("a.gtld-servers.net", Some(COM))])
        });
        network.serve(mock::addr(COM), |query, _| {
            mock::referral(query, "example.com", &[("ns1.example.com", Some(EXAMPLE_COM))])
        });
        network.serve(mock::addr(EXAMPLE_COM), |query, _| {
            let q = &query.questions[0];
            match (q.qname.to_string().as_str(), q.qtype) {
                ("www.example.com.", Type::A) => {
                    mock::authoritative(query, vec![a("www.example.com", [93, 184, 216, 34], 300)])
                }
                ("alias.example.com.", Type::A) => mock::authoritative(
                    query,
                    vec![
                        cname("alias.example.com", "www.example.com", 600),
                        a("www.example.com", [93, 184, 216, 34], 300),
                    ],
                ),
                ("away.example.com.", Type::A) => mock::authoritative(
                    query,
                    vec![cname("away.example.com", "www.example.com", 600)],
                ),
                ("www.example.com.", _) => {
                    let Reply::Message(mut response) = mock::nxdomain(query, "example.com", 120) else {
                        unreachable!()
                    };
                    response.header.response_code = ResponseCode::NoError;
                    Reply::Message(response)
                }
                _ => mock::nxdomain(query, "example.com", 300),
            }
        });
        network
    }

    #[test]
    fn classify_referral_needs_progress() {
        let q = question("www.example.com", Type::A);
        let query = Message::query(1, q.clone(), 512);
        let Reply::Message(response) =
            mock::referral(&query, "example.com", &[("ns1.example.com", None)])
        else {
            unreachable!()
        };

        assert_eq!(
            classify(&q, &name("com"), &response),
            Step::Referral {
                zone: name("example.com"),
                targets: vec![name("ns1.example.com")],
            }
        );
        // same zone again, or a zone above the current one
        assert_eq!(classify(&q, &name("example.com"), &response), Step::NoProgress);
        assert_eq!(
            classify(&q, &name("www.example.com"), &response),
            Step::NoProgress
        );
        // a delegation for somewhere else entirely
        let other = question("www.example.org", Type::A);
        assert_eq!(classify(&other, &name("com"), &response), Step::NoProgress);
    }

    #[test]
    fn classify_negative_answers() {
        let q = question("nope.example.com", Type::A);
        let query = Message::query(1, q.clone(), 512);
        let Reply::Message(mut response) = mock::nxdomain(&query, "example.com", 60) else {
            unreachable!()
        };
        assert_eq!(
            classify(&q, &name("example.com"), &response),
            Step::Negative {
                kind: NegativeKind::NxDomain,
                negative_ttl: Some(60),
            }
        );

        response.header.response_code = ResponseCode::NoError;
        response.nameservers[0].ttl = 30;
        assert_eq!(
            classify(&q, &name("example.com"), &response),
            Step::Negative {
                kind: NegativeKind::NoData,
                negative_ttl: Some(30),
            }
        );

        // NXDOMAIN without authority or SOA proves nothing
        response.header.response_code = ResponseCode::NameError;
        response.header.authoritative = false;
        response.nameservers.clear();
        assert_eq!(classify(&q, &name("example.com"), &response), Step::NoProgress);
    }

    #[test]
    fn follow_answers_through_cnames() {
        let q = question("a.example", Type::A);
        let answers = vec![
            a("b.example", [192, 0, 2, 7], 60),
            cname("a.example", "b.example", 60),
        ];
        assert_eq!(
            follow_answers(&q, &answers),
            Some(Step::Answer(vec![
                cname("a.example", "b.example", 60),
                a("b.example", [192, 0, 2, 7], 60),
            ]))
        );

        let dangling = vec![cname("a.example", "c.example", 60)];
        assert_eq!(
            follow_answers(&q, &dangling),
            Some(Step::Alias(dangling.clone(), name("c.example")))
        );

        // asking for the CNAME itself
        let q = question("a.example", Type::CNAME);
        assert_eq!(
            follow_answers(&q, &dangling),
            Some(Step::Answer(dangling.clone()))
        );

        // loops inside one response end as an alias
        let looping = vec![
            cname("a.example", "b.example", 60),
            cname("b.example", "a.example", 60),
        ];
        let q = question("a.example", Type::A);
        assert!(matches!(
            follow_answers(&q, &looping),
            Some(Step::Alias(..))
        ));
    }

    #[tokio::test]
    async fn walks_from_the_root_and_caches_delegations() {
        let network = example_hierarchy();
        let resolver = resolver(&network, &[ROOT]);

        let resolution = resolver
            .resolve_with_depth(&question("www.example.com", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Answer(vec![a("www.example.com", [93, 184, 216, 34], 300)])
        );
        assert_eq!(
            network.queried(),
            vec![mock::addr(ROOT), mock::addr(COM), mock::addr(EXAMPLE_COM)]
        );

        let cache = resolver.cache();
        assert!(cache.lookup(&name("com"), Type::NS, Class::IN).is_some());
        assert!(cache.lookup(&name("example.com"), Type::NS, Class::IN).is_some());
        assert!(cache
            .lookup(&name("www.example.com"), Type::A, Class::IN)
            .is_some());
        assert!(cache.lookup(&Name::root(), Type::NS, Class::IN).is_none());
        assert!(cache
            .lookup(&name("ns1.example.com"), Type::A, Class::IN)
            .is_some());

        // answered from cache
        resolver
            .resolve_with_depth(&question("www.example.com", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(network.queried().len(), 3);

        // a sibling starts at the cached example.com servers
        let resolution = resolver
            .resolve_with_depth(&question("alias.example.com", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(resolution.records().len(), 2);
        assert_eq!(network.queried().len(), 4);
        assert_eq!(network.queried()[3], mock::addr(EXAMPLE_COM));
    }

    #[tokio::test]
    async fn cname_chain_returns_alias_and_target() {
        let network = example_hierarchy();
        let resolver = resolver(&network, &[ROOT]);

        let resolution = resolver
            .resolve_with_depth(&question("alias.example.com", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Answer(vec![
                cname("alias.example.com", "www.example.com", 600),
                a("www.example.com", [93, 184, 216, 34], 300),
            ])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dangling_cname_is_followed_from_the_start() {
        let network = example_hierarchy();
        let resolver = resolver(&network, &[ROOT]);

        let resolution = resolver
            .resolve_with_depth(&question("away.example.com", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Answer(vec![
                cname("away.example.com", "www.example.com", 600),
                a("www.example.com", [93, 184, 216, 34], 300),
            ])
        );
        let asked: Vec<String> = network
            .questions()
            .into_iter()
            .map(|(_, q)| q.qname.to_string())
            .collect();
        // the target is asked straight at the cached example.com servers
        assert_eq!(
            asked,
            vec![
                "away.example.com.",
                "away.example.com.",
                "away.example.com.",
                "www.example.com."
            ]
        );

        // the CNAME is cached and followed without asking again
        let before = network.queried().len();
        let again = resolver
            .resolve_with_depth(&question("away.example.com", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(again, resolution);
        assert_eq!(network.queried().len(), before);
    }

    #[tokio::test]
    async fn cname_loops_hit_the_depth_limit() {
        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            let q = &query.questions[0];
            let target = if q.qname == name("ping.test") {
                "pong.test"
            } else {
                "ping.test"
            };
            let owner = q.qname.to_string();
            mock::authoritative(query, vec![cname(&owner, target, 60)])
        });
        let resolver = resolver(&network, &[ROOT]);

        let err = resolver
            .resolve_with_depth(&question("ping.test", Type::A), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyReferrals));
    }

    #[tokio::test]
    async fn uncacheable_cname_loop_is_no_progress() {
        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            let q = &query.questions[0];
            let target = if q.qname == name("a.test") {
                "b.test"
            } else {
                "a.test"
            };
            let owner = q.qname.to_string();
            mock::authoritative(query, vec![cname(&owner, target, 0)])
        });
        let resolver = resolver(&network, &[ROOT]);

        let err = resolver
            .resolve_with_depth(&question("a.test", Type::A), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoProgress(ref qname) if *qname == name("a.test")));
        assert_eq!(network.queried().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_answers_carry_the_remaining_ttl() {
        let network = example_hierarchy();
        let resolver = resolver(&network, &[ROOT]);
        let q = question("www.example.com", Type::A);

        resolver.resolve_with_depth(&q, 20).await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;

        let resolution = resolver.resolve_with_depth(&q, 20).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Answer(vec![a("www.example.com", [93, 184, 216, 34], 200)])
        );
        assert_eq!(network.queried().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn nxdomain_is_cached_for_the_negative_ttl() {
        let network = example_hierarchy();
        let resolver = resolver(&network, &[ROOT]);
        let q = question("nope.example.com", Type::A);

        let resolution = resolver.resolve_with_depth(&q, 20).await.unwrap();
        assert!(resolution.is_nxdomain());
        assert_eq!(network.queried().len(), 3);
        assert_eq!(
            resolver.cache().lookup(&q.qname, Type::A, Class::IN),
            Some(Cached::Negative(NegativeKind::NxDomain))
        );

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(resolver.resolve_with_depth(&q, 20).await.unwrap().is_nxdomain());
        assert_eq!(network.queried().len(), 3);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(resolver.resolve_with_depth(&q, 20).await.unwrap().is_nxdomain());
        assert_eq!(network.queried().len(), 4);
    }

    #[tokio::test]
    async fn nodata_is_not_nxdomain() {
        let network = example_hierarchy();
        let resolver = resolver(&network, &[ROOT]);
        let q = question("www.example.com", Type::AAAA);

        let resolution = resolver.resolve_with_depth(&q, 20).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Negative {
                kind: NegativeKind::NoData,
                aliases: vec![],
            }
        );
        assert_eq!(
            resolver.cache().lookup(&q.qname, Type::AAAA, Class::IN),
            Some(Cached::Negative(NegativeKind::NoData))
        );
    }

    /// Every server delegates one label further down, forever
    fn endless_delegation(network: &MockNetwork, servers: u8) {
        for k in 0..servers {
            network.serve(mock::addr([10, 0, 0, k]), move |query, _| {
                let labels = query.questions[0].qname.labels();
                let zone = Name::from_labels(&labels[labels.len() - (k as usize + 1)..]).unwrap();
                let glue = format!("ns.{}", zone);
                mock::referral(query, &zone.to_string(), &[(glue.as_str(), Some([10, 0, 0, k + 1]))])
            });
        }
    }

    #[tokio::test]
    async fn endless_referrals_stop_at_max_depth() {
        let network = MockNetwork::new();
        endless_delegation(&network, 40);
        let resolver = resolver(&network, &[[10, 0, 0, 0]]);

        let labels: Vec<String> = (1..=30).rev().map(|i| format!("l{}", i)).collect();
        let qname = Name::from_labels(&labels).unwrap();
        let err = resolver
            .resolve_with_depth(&Question::new(qname, Type::A), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyReferrals));
        assert_eq!(network.queried().len(), 21);
    }

    #[tokio::test]
    async fn referral_to_same_zone_is_no_progress() {
        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            mock::referral(query, "com", &[("a.gtld-servers.net", Some(COM))])
        });
        // the com servers keep pointing at themselves
        network.serve(mock::addr(COM), |query, _| {
            mock::referral(query, "com", &[("a.gtld-servers.net", Some(COM))])
        });
        let resolver = resolver(&network, &[ROOT]);

        let err = resolver
            .resolve_with_depth(&question("www.example.com", Type::A), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoProgress(_)));
        assert_eq!(network.queried().len(), 2);
    }

    #[tokio::test]
    async fn nameservers_without_glue_are_resolved() {
        const ORG: [u8; 4] = [199, 19, 56, 1];
        const NET: [u8; 4] = [192, 5, 6, 31];
        const EXAMPLE_NET: [u8; 4] = [198, 51, 100, 53];

        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            if query.questions[0].qname.is_subdomain_of(&name("org")) {
                mock::referral(query, "org", &[("a0.org-servers.net", Some(ORG))])
            } else {
                mock::referral(query, "net", &[("a.gtld-servers.net", Some(NET))])
            }
        });
        // example.org is served by a host in another zone, no glue
        network.serve(mock::addr(ORG), |query, _| {
            mock::referral(query, "example.org", &[("ns1.example.net", None)])
        });
        network.serve(mock::addr(NET), |query, _| {
            mock::referral(query, "example.net", &[("ns1.example.net", Some(EXAMPLE_NET))])
        });
        network.serve(mock::addr(EXAMPLE_NET), |query, _| {
            let q = &query.questions[0];
            if q.qname == name("ns1.example.net") {
                mock::authoritative(query, vec![a("ns1.example.net", EXAMPLE_NET, 3600)])
            } else {
                mock::authoritative(query, vec![a("www.example.org", [203, 0, 113, 80], 60)])
            }
        });
        let resolver = resolver(&network, &[ROOT]);

        let resolution = resolver
            .resolve_with_depth(&question("www.example.org", Type::A), 20)
            .await
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Answer(vec![a("www.example.org", [203, 0, 113, 80], 60)])
        );
        assert_eq!(
            network.queried(),
            vec![
                mock::addr(ROOT),
                mock::addr(ORG),
                mock::addr(ROOT),
                mock::addr(NET),
                mock::addr(EXAMPLE_NET),
            ]
        );
        // the nameserver's address came from the example.net glue
        assert!(resolver
            .cache()
            .lookup(&name("ns1.example.net"), Type::A, Class::IN)
            .is_some());
    }

    #[tokio::test]
    async fn out_of_bailiwick_glue_is_ignored() {
        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            mock::referral(query, "com", &[("a.gtld-servers.net", Some(COM))])
        });
        // com servers try to plant an address for a name under org
        network.serve(mock::addr(COM), |query, _| {
            mock::referral(query, "example.com", &[("ns.victim.org", Some([6, 6, 6, 6]))])
        });
        let resolver = resolver(&network, &[ROOT]);

        let _ = resolver
            .resolve_with_depth(&question("www.example.com", Type::A), 20)
            .await;
        assert!(resolver
            .cache()
            .lookup(&name("ns.victim.org"), Type::A, Class::IN)
            .is_none());
        assert!(!network.queried().contains(&mock::addr([6, 6, 6, 6])));
    }

    #[tokio::test]
    async fn nested_lookups_share_the_query_budget() {
        let network = MockNetwork::new();
        // every zone is served by a nameserver in a sibling zone, without glue
        network.serve(mock::addr(ROOT), |query, _| {
            let zone = query.questions[0].qname.labels().last().cloned().unwrap();
            let next = format!("ns.x{}", zone);
            mock::referral(query, &zone, &[(next.as_str(), None)])
        });
        let config = ResolverConfig {
            max_queries: 10,
            max_nesting: 100,
            root_servers: vec![IpAddr::from(ROOT)],
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_transport(config, network.clone());

        let err = resolver
            .resolve_with_depth(&question("www.a", Type::A), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyReferrals));
        assert_eq!(network.queried().len(), 10);
    }

    #[tokio::test]
    async fn nesting_is_bounded() {
        let network = MockNetwork::new();
        network.serve(mock::addr(ROOT), |query, _| {
            let zone = query.questions[0].qname.labels().last().cloned().unwrap();
            let next = format!("ns.x{}", zone);
            mock::referral(query, &zone, &[(next.as_str(), None)])
        });
        let config = ResolverConfig {
            max_nesting: 3,
            root_servers: vec![IpAddr::from(ROOT)],
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_transport(config, network.clone());

        let err = resolver
            .resolve_with_depth(&question("www.a", Type::A), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyReferrals));
        assert_eq!(network.queried().len(), 4);
    }
}
