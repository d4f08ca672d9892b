//! Build DNS answers from registry records.
//!
//! Each query is a read-through lookup: nothing is cached between queries and
//! the registry is never written to from here.

use hickory_proto::rr::rdata::{A, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use tracing::{debug, error, warn};

use crate::classify::{classify, EntityKind};
use crate::config::DnsConfig;
use crate::error::RegistryError;
use crate::records::{RecordStore, Target};

/// Records making up a positive response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Answer {
    /// Answer section, in registry order.
    pub answers: Vec<Record>,
    /// Additional section (glue A records for SRV targets).
    pub additionals: Vec<Record>,
}

/// Outcome of resolving one question.
#[derive(Debug)]
pub enum Resolution {
    /// Records to return.
    Answer(Answer),
    /// Nothing to return; rendered as a name error.
    NotFound,
    /// The registry failed; rendered as a server failure.
    Error(RegistryError),
}

/// Resolution engine for `nodes` and `services` queries.
#[derive(Clone)]
pub struct Resolver {
    store: RecordStore,
    domain: String,
    ttl: u32,
}

impl Resolver {
    /// Create a resolver for the configured domain and response TTL.
    pub fn new(store: RecordStore, config: &DnsConfig) -> Self {
        Self {
            store,
            domain: config.normalized_domain(),
            ttl: config.ttl,
        }
    }

    /// Served domain, normalized with a trailing dot.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Classify and answer a question.
    pub async fn resolve(&self, qname: &Name, qtype: RecordType) -> Resolution {
        let question = qname.to_ascii().to_lowercase();
        let entity = classify(&question, qtype, &self.domain);

        let result = match (entity.kind, qtype) {
            (EntityKind::Unknown, _) => {
                debug!(name = %question, "invalid query");
                return Resolution::NotFound;
            }
            (EntityKind::Service, RecordType::A) => self.services_a(qname, &entity.name).await,
            (EntityKind::Service, RecordType::SRV) => {
                self.services_srv(qname, &entity.name).await
            }
            (EntityKind::Node, RecordType::A) => self.nodes_a(qname, &entity.name).await,
            (kind, qtype) => {
                debug!(name = %question, kind = kind.as_str(), ?qtype, "unsupported query type");
                return Resolution::NotFound;
            }
        };

        match result {
            Ok(Some(answer)) => Resolution::Answer(answer),
            Ok(None) => {
                debug!(name = %question, "not found");
                Resolution::NotFound
            }
            Err(e) if e.is_not_found() => {
                debug!(name = %question, key = %e.key(), "key not found");
                Resolution::NotFound
            }
            Err(e) => {
                error!(name = %question, key = %e.key(), error = %e, "registry lookup failed");
                Resolution::Error(e)
            }
        }
    }

    /// A records for a node.
    pub async fn nodes_a(
        &self,
        qname: &Name,
        name: &str,
    ) -> Result<Option<Answer>, RegistryError> {
        let Some(ip) = self.store.get_node(name).await?.and_then(|n| n.address()) else {
            return Ok(None);
        };

        Ok(Some(Answer {
            answers: vec![self.a_record(qname.clone(), ip)],
            additionals: Vec::new(),
        }))
    }

    /// A records for every instance of a service that lives on a local node.
    ///
    /// External targets and instances whose node can't be resolved are
    /// skipped.
    pub async fn services_a(
        &self,
        qname: &Name,
        name: &str,
    ) -> Result<Option<Answer>, RegistryError> {
        let instances = self.store.get_service(name).await?;

        let mut answers = Vec::with_capacity(instances.len());
        for instance in &instances {
            let Target::LocalNode(node) = &instance.target else {
                continue;
            };
            if let Some(ip) = self.node_address(node).await {
                answers.push(self.a_record(qname.clone(), ip));
            }
        }

        if answers.is_empty() {
            return Ok(None);
        }
        Ok(Some(Answer {
            answers,
            additionals: Vec::new(),
        }))
    }

    /// SRV records for every instance of a service, with glue A records for
    /// local node targets.
    ///
    /// An SRV answer is emitted for each instance even when its node can't be
    /// resolved; only the glue record is dropped.
    pub async fn services_srv(
        &self,
        qname: &Name,
        name: &str,
    ) -> Result<Option<Answer>, RegistryError> {
        let instances = self.store.get_service(name).await?;

        let mut answer = Answer {
            answers: Vec::with_capacity(instances.len()),
            additionals: Vec::with_capacity(instances.len()),
        };
        for instance in &instances {
            let (target, node) = match &instance.target {
                Target::ExternalHost(host) => (host.clone(), None),
                Target::LocalNode(node) => (format!("{}.{}", node, self.domain), Some(node)),
            };
            let target = match Name::from_ascii(&target) {
                Ok(mut target) => {
                    target.set_fqdn(true);
                    target
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "skipping service instance with invalid target");
                    continue;
                }
            };

            let srv = SRV::new(instance.priority, instance.weight, instance.port, target.clone());
            answer
                .answers
                .push(self.record(qname.clone(), RData::SRV(srv)));

            let Some(node) = node else {
                continue;
            };
            if let Some(ip) = self.node_address(node).await {
                answer.additionals.push(self.a_record(target, ip));
            }
        }

        if answer.answers.is_empty() {
            return Ok(None);
        }
        Ok(Some(answer))
    }

    /// Best-effort node lookup used for glue; failures are logged only.
    async fn node_address(&self, node: &str) -> Option<Ipv4Addr> {
        match self.store.get_node(node).await {
            Ok(record) => record.and_then(|r| r.address()),
            Err(e) => {
                debug!(node, error = %e, "skipping unresolvable node target");
                None
            }
        }
    }

    fn a_record(&self, name: Name, ip: Ipv4Addr) -> Record {
        self.record(name, RData::A(A::from(ip)))
    }

    fn record(&self, name: Name, rdata: RData) -> Record {
        let mut record = Record::from_rdata(name, self.ttl, rdata);
        record.set_dns_class(DNSClass::IN);
        record
    }
}
