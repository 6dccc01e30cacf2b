use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    lookup::Ipv4Lookup,
    proto::op::ResponseCode,
    system_conf,
};

pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Resolve {
    /// Returns the first published A address for `domain`, or `None` when the
    /// name does not exist or carries no A record.
    async fn lookup_a(&self, domain: &str) -> anyhow::Result<Option<String>>;
}

pub struct HickoryResolver {
    config: ResolverConfig,
    opts: ResolverOpts,
}

impl HickoryResolver {
    pub fn new(config: ResolverConfig, mut opts: ResolverOpts) -> Self {
        opts.timeout = LOOKUP_TIMEOUT;
        opts.attempts = 1;

        Self { config, opts }
    }

    pub fn from_system_conf() -> anyhow::Result<Self> {
        let (config, opts) = system_conf::read_system_conf()?;

        Ok(Self::new(config, opts))
    }
}

/// NXDOMAIN and an empty NOERROR answer mean the record is absent; any other
/// outcome without records (SERVFAIL, REFUSED, ...) is a failure.
fn classify(lookup: Result<Ipv4Lookup, ResolveError>) -> anyhow::Result<Option<String>> {
    let err = match lookup {
        Ok(lookup) => return Ok(lookup.iter().next().map(|a| a.0.to_string())),
        Err(err) => err,
    };

    match err.kind() {
        ResolveErrorKind::NoRecordsFound {
            response_code: ResponseCode::NXDomain | ResponseCode::NoError,
            ..
        } => Ok(None),
        _ => Err(err.into()),
    }
}

#[async_trait]
impl Resolve for HickoryResolver {
    async fn lookup_a(&self, domain: &str) -> anyhow::Result<Option<String>> {
        // Fresh resolver per lookup so nothing is cached between invocations.
        let resolver = TokioAsyncResolver::tokio(self.config.clone(), self.opts.clone());

        let lookup = match tokio::time::timeout(LOOKUP_TIMEOUT, resolver.ipv4_lookup(domain)).await
        {
            Ok(res) => res,
            Err(_) => anyhow::bail!("DNS lookup for {} timed out", domain),
        };

        classify(lookup)
    }
}

pub async fn needs_update(
    resolver: &(dyn Resolve + Send + Sync),
    domain: &str,
    candidate: &str,
) -> anyhow::Result<bool> {
    let Some(existing) = resolver.lookup_a(domain).await? else {
        tracing::debug!(domain = %domain, "Could not retrieve existing record");
        return Ok(true);
    };

    let differs = existing != candidate;

    tracing::debug!(
        domain = %domain,
        candidate = %candidate,
        existing = %existing,
        differs,
        "Compared published record against candidate"
    );

    Ok(differs)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        net::{Ipv4Addr, SocketAddr},
        sync::Mutex,
    };

    use hickory_resolver::{
        config::NameServerConfigGroup,
        proto::{
            op::{Message, MessageType, OpCode, Query},
            rr::{Name, RData, Record, RecordType, rdata::A},
        },
    };
    use tokio::net::UdpSocket;

    use super::*;

    /// Answers every lookup from a swappable published value.
    pub struct StubResolver {
        pub published: Mutex<Result<Option<String>, String>>,
    }

    impl StubResolver {
        pub fn published(addr: &str) -> Self {
            Self {
                published: Mutex::new(Ok(Some(addr.to_string()))),
            }
        }

        pub fn absent() -> Self {
            Self {
                published: Mutex::new(Ok(None)),
            }
        }

        pub fn failing(msg: &str) -> Self {
            Self {
                published: Mutex::new(Err(msg.to_string())),
            }
        }

        pub fn publish(&self, addr: &str) {
            *self.published.lock().unwrap() = Ok(Some(addr.to_string()));
        }
    }

    #[async_trait]
    impl Resolve for StubResolver {
        async fn lookup_a(&self, _domain: &str) -> anyhow::Result<Option<String>> {
            self.published
                .lock()
                .unwrap()
                .clone()
                .map_err(|msg| anyhow::anyhow!(msg))
        }
    }

    fn no_records(response_code: ResponseCode) -> ResolveError {
        let query = Query::query(Name::from_ascii("home.example.net.").unwrap(), RecordType::A);
        ResolveErrorKind::NoRecordsFound {
            query: Box::new(query),
            soa: None,
            negative_ttl: None,
            response_code,
            trusted: false,
        }
        .into()
    }

    #[test]
    fn test_classify_no_records() {
        assert_eq!(classify(Err(no_records(ResponseCode::NXDomain))).unwrap(), None);
        assert_eq!(classify(Err(no_records(ResponseCode::NoError))).unwrap(), None);

        for code in [ResponseCode::ServFail, ResponseCode::Refused, ResponseCode::FormErr] {
            assert!(classify(Err(no_records(code))).is_err(), "{:?}", code);
        }

        assert!(classify(Err(ResolveError::from("connection refused"))).is_err());
    }

    /// Answers every query on a loopback socket with `code` and, if given,
    /// a single A record.
    async fn spawn_responder(code: ResponseCode, answer: Option<Ipv4Addr>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
                let request = Message::from_vec(&buf[..len]).unwrap();

                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(OpCode::Query)
                    .set_recursion_desired(request.recursion_desired())
                    .set_recursion_available(true)
                    .set_response_code(code);
                response.add_queries(request.queries().to_vec());
                if let Some(ip) = answer {
                    let name = request.queries()[0].name().clone();
                    response.add_answer(Record::from_rdata(name, 60, RData::A(A(ip))));
                }

                socket
                    .send_to(&response.to_vec().unwrap(), peer)
                    .await
                    .unwrap();
            }
        });

        addr
    }

    async fn lookup_via(
        code: ResponseCode,
        answer: Option<Ipv4Addr>,
    ) -> anyhow::Result<Option<String>> {
        let server = spawn_responder(code, answer).await;
        let config = ResolverConfig::from_parts(
            None,
            vec![],
            NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true),
        );

        HickoryResolver::new(config, ResolverOpts::default())
            .lookup_a("home.example.net.")
            .await
    }

    #[tokio::test]
    async fn test_hickory_lookup_outcomes() {
        assert_eq!(
            lookup_via(ResponseCode::NoError, Some(Ipv4Addr::new(203, 0, 113, 7)))
                .await
                .unwrap()
                .as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(lookup_via(ResponseCode::NXDomain, None).await.unwrap(), None);
        assert_eq!(lookup_via(ResponseCode::NoError, None).await.unwrap(), None);
        assert!(lookup_via(ResponseCode::ServFail, None).await.is_err());
        assert!(lookup_via(ResponseCode::Refused, None).await.is_err());
    }

    #[tokio::test]
    async fn test_same_address_needs_no_update() {
        let resolver = StubResolver::published("203.0.113.7");

        for _ in 0..2 {
            assert!(
                !needs_update(&resolver, "home.example.net", "203.0.113.7")
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_different_address_needs_update() {
        let resolver = StubResolver::published("198.51.100.1");

        assert!(
            needs_update(&resolver, "home.example.net", "203.0.113.7")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_comparison_is_literal() {
        let resolver = StubResolver::published("203.0.113.7");

        assert!(
            needs_update(&resolver, "home.example.net", "203.0.113.007")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_absent_record_needs_update() {
        let resolver = StubResolver::absent();

        for candidate in ["203.0.113.7", "198.51.100.1", ""] {
            assert!(
                needs_update(&resolver, "home.example.net", candidate)
                    .await
                    .unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let resolver = StubResolver::failing("SERVFAIL");

        let err = needs_update(&resolver, "home.example.net", "203.0.113.7")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "SERVFAIL");
    }
}
