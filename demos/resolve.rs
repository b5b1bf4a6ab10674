use std::env;

use iterdns::dns_parser::{Question, Type};
use iterdns::{Resolver, ResolverConfig};

#[tokio::main]
pub async fn main() {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters("iterdns=debug");
    builder.init();

    let mut args = env::args().skip(1);
    let name = args.next().unwrap_or_else(|| "www.example.com".to_owned());
    let qtype = match args.next().as_deref() {
        None | Some("A") => Type::A,
        Some("AAAA") => Type::AAAA,
        Some("NS") => Type::NS,
        Some("MX") => Type::MX,
        Some("TXT") => Type::TXT,
        Some("SOA") => Type::SOA,
        Some("CNAME") => Type::CNAME,
        Some(other) => panic!("unsupported type {}", other),
    };

    // e.g. ROOT_SERVERS=198.41.0.4,199.9.14.201
    let mut config = ResolverConfig::default();
    if let Ok(list) = env::var("ROOT_SERVERS") {
        config = config.with_root_servers(ResolverConfig::parse_root_servers(&list).unwrap());
    }

    let resolver = Resolver::new(config);
    let question = Question::new(name.parse().unwrap(), qtype);
    match resolver.resolve(&question).await {
        Ok(response) => {
            println!(";; {:?}", response.header.response_code);
            for record in &response.answers {
                println!("{}\t{}\t{:?}", record.name, record.ttl, record.data);
            }
        }
        Err(err) => println!(";; failed: {}", err),
    }
}
