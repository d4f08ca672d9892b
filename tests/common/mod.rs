//! Shared test infrastructure for catalog and loopback integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{Catalog, MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use etcd_dns::config::Config;
use etcd_dns::memory::MemoryRegistry;
use etcd_dns::server::{self, DnsServer};

// --- Constants ---

pub const DOMAIN: &str = "svc.";
pub const PREFIX: &str = "/svc";
pub const TTL: u32 = 30;

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to `Catalog::handle_request()`.
/// The response is serialized via `MessageResponse::destructive_emit()` and stored
/// as raw wire-format bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Registry builders ---

/// Registry seeded with entries under [`PREFIX`].
pub struct TestRegistryBuilder {
    registry: MemoryRegistry,
}

impl TestRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: MemoryRegistry::new(),
        }
    }

    /// Register a node with an IPv4 address.
    pub fn node(self, name: &str, ip: Ipv4Addr) -> Self {
        self.raw(
            &format!("{PREFIX}/nodes/{name}"),
            &format!(r#"{{"ip":"{ip}"}}"#),
        )
    }

    /// Register a service instance.
    pub fn instance(
        self,
        service: &str,
        instance: &str,
        priority: u16,
        weight: u16,
        port: u16,
        target: &str,
    ) -> Self {
        self.raw(
            &format!("{PREFIX}/services/{service}/{instance}"),
            &format!(
                r#"{{"priority":{priority},"weight":{weight},"port":{port},"target":"{target}"}}"#
            ),
        )
    }

    /// Store an arbitrary value.
    pub fn raw(self, key: &str, value: &str) -> Self {
        self.registry.insert(key, value);
        self
    }

    pub fn build(self) -> MemoryRegistry {
        self.registry
    }
}

// --- Config builders ---

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.registry.prefix = PREFIX.to_string();
    config.dns.domain = DOMAIN.to_string();
    config.dns.ttl = TTL;
    config
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` from a client address.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    let src: SocketAddr = "10.0.0.1:12345".parse().unwrap();
    Request::new(msg, src, Protocol::Udp)
}

/// Build a Catalog answering from `registry`.
pub fn build_catalog(config: Config, registry: MemoryRegistry) -> Catalog {
    let authority = DnsServer::new(config)
        .authority(Arc::new(registry))
        .expect("failed to create RegistryAuthority");
    server::catalog(authority)
}

// --- Response helpers ---

/// Execute a query through the catalog and return the parsed response.
pub async fn execute_query(
    catalog: &Catalog,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, id);
    let handler = TestResponseHandler::new();
    catalog.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

/// Extract A addresses from a record section.
pub fn extract_a_ips(records: &[Record]) -> Vec<Ipv4Addr> {
    records
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Extract `(priority, weight, port, target)` from SRV answers, sorted.
pub fn extract_srv(msg: &Message) -> Vec<(u16, u16, u16, String)> {
    let mut srv: Vec<(u16, u16, u16, String)> = msg
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::SRV(srv) => Some((
                srv.priority(),
                srv.weight(),
                srv.port(),
                srv.target().to_ascii(),
            )),
            _ => None,
        })
        .collect();
    srv.sort();
    srv
}

/// Extract `(owner, address)` pairs from the additional section.
pub fn extract_glue(msg: &Message) -> Vec<(String, Ipv4Addr)> {
    let mut glue: Vec<(String, Ipv4Addr)> = msg
        .additionals()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some((r.name().to_ascii(), Ipv4Addr::from(*a))),
            _ => None,
        })
        .collect();
    glue.sort();
    glue
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected A addresses.
pub fn assert_a_response(msg: &Message, expected_ips: &[Ipv4Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let mut actual = extract_a_ips(msg.answers());
    actual.sort();
    let mut expected_ips: Vec<Ipv4Addr> = expected_ips.to_vec();
    expected_ips.sort();
    assert_eq!(
        actual, expected_ips,
        "A records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected_ips
    );
}
