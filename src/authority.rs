//! Hickory DNS authority backed by the registry.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{NS, SOA};
use hickory_proto::rr::{DNSClass, LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    AuthLookup, Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords,
    MessageRequest, UpdateResult, ZoneType,
};
use hickory_server::server::RequestInfo;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

use crate::config::DnsConfig;
use crate::metrics::{self, QueryResult, Timer};
use crate::resolver::{Answer, Resolution, Resolver};

/// Authority serving `nodes` and `services` names under the configured
/// domain.
pub struct RegistryAuthority {
    origin: LowerName,
    resolver: Resolver,
    config: Arc<DnsConfig>,
    serial: u32,
}

impl RegistryAuthority {
    /// Create an authority for the resolver's domain.
    pub fn new(config: DnsConfig, resolver: Resolver) -> Result<Self, hickory_proto::ProtoError> {
        let origin = Name::from_ascii(resolver.domain())?.into();
        let serial = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(1);

        Ok(Self {
            origin,
            resolver,
            config: Arc::new(config),
            serial,
        })
    }

    /// Build the SOA record for this zone.
    fn build_soa_record(&self) -> RecordSet {
        let soa = SOA::new(
            Name::from_ascii(&self.config.soa.mname).unwrap_or_else(|_| Name::root()),
            Name::from_ascii(&self.config.soa.rname).unwrap_or_else(|_| Name::root()),
            self.serial,
            self.config.soa.refresh as i32,
            self.config.soa.retry as i32,
            self.config.soa.expire as i32,
            self.config.soa.minimum,
        );

        let name = Name::from(self.origin.clone());
        let mut record_set = RecordSet::new(name.clone(), RecordType::SOA, 0);
        let mut record = Record::from_rdata(name, self.config.ttl, RData::SOA(soa));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        record_set
    }

    /// Build an NS record for this zone.
    fn build_ns_record(&self) -> RecordSet {
        let name = Name::from(self.origin.clone());
        let ns_name = Name::from_ascii(&self.config.soa.mname).unwrap_or_else(|_| Name::root());

        let mut record_set = RecordSet::new(name.clone(), RecordType::NS, 0);
        let mut record = Record::from_rdata(name, self.config.ttl, RData::NS(NS(ns_name)));
        record.set_dns_class(DNSClass::IN);
        record_set.insert(record, 0);

        record_set
    }

    fn apex(
        &self,
        record_set: RecordSet,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<AuthLookup> {
        LookupControlFlow::Break(Ok(AuthLookup::answers(
            LookupRecords::new(lookup_options, Arc::new(record_set)),
            None,
        )))
    }
}

/// Group records into record sets by owner and type, in first-seen order.
fn record_sets(records: Vec<Record>) -> Vec<Arc<RecordSet>> {
    let mut sets: Vec<RecordSet> = Vec::new();
    for record in records {
        let existing = sets
            .iter_mut()
            .find(|s| s.name() == record.name() && s.record_type() == record.record_type());
        match existing {
            Some(set) => {
                set.insert(record, 0);
            }
            None => {
                let mut set = RecordSet::new(record.name().clone(), record.record_type(), 0);
                set.insert(record, 0);
                sets.push(set);
            }
        }
    }
    sets.into_iter().map(Arc::new).collect()
}

fn to_lookup(answer: Answer, lookup_options: LookupOptions) -> AuthLookup {
    let answers = LookupRecords::many(lookup_options, record_sets(answer.answers));
    let additionals = (!answer.additionals.is_empty())
        .then(|| LookupRecords::many(lookup_options, record_sets(answer.additionals)));
    AuthLookup::answers(answers, additionals)
}

#[async_trait]
impl Authority for RegistryAuthority {
    type Lookup = AuthLookup;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = format!("{:?}", rtype);

        trace!(name = %name, rtype = ?rtype, "DNS lookup");

        if *name == self.origin {
            match rtype {
                RecordType::SOA => {
                    debug!(name = %name, "SOA lookup");
                    metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                    return self.apex(self.build_soa_record(), lookup_options);
                }
                RecordType::NS => {
                    debug!(name = %name, "NS lookup");
                    metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                    return self.apex(self.build_ns_record(), lookup_options);
                }
                _ => {}
            }
        }

        let qname = Name::from(name.clone());
        match self.resolver.resolve(&qname, rtype).await {
            Resolution::Answer(answer) => {
                debug!(
                    name = %name,
                    rtype = ?rtype,
                    answers = answer.answers.len(),
                    additionals = answer.additionals.len(),
                    "returning records"
                );
                metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed());
                LookupControlFlow::Break(Ok(to_lookup(answer, lookup_options)))
            }
            Resolution::NotFound => {
                metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
            }
            Resolution::Error(_) => {
                metrics::record_query(&rtype_str, QueryResult::Error, timer.elapsed());
                LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::ServFail)))
            }
        }
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.lookup(
            request_info.query.name(),
            request_info.query.query_type(),
            lookup_options,
        )
        .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NoError)))
    }

    async fn update(&self, _update: &MessageRequest) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}
