//! Tier 1: Catalog-level integration tests for resolution.
//!
//! These tests go through Hickory's full `Catalog` → `RequestHandler::handle_request()`
//! → `Authority::search()` → `Resolver` pipeline against an in-memory registry.
//! No network access required.

mod common;

use std::net::Ipv4Addr;

use common::*;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, RecordType};

const WEB1: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
const WEB2: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 6);

// =========================================================================
// Nodes
// =========================================================================

#[tokio::test]
async fn node_a_returns_address() {
    let registry = TestRegistryBuilder::new().node("web1", WEB1).build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "web1.nodes.svc.", RecordType::A, 1).await;

    assert_a_response(&msg, &[WEB1]);
    assert!(msg.header().authoritative());
    assert_eq!(msg.answers()[0].ttl(), TTL);
}

#[tokio::test]
async fn node_query_is_case_insensitive() {
    let registry = TestRegistryBuilder::new().node("web1", WEB1).build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "WEB1.Nodes.SVC.", RecordType::A, 2).await;

    assert_a_response(&msg, &[WEB1]);
}

#[tokio::test]
async fn missing_node_is_nxdomain() {
    let registry = TestRegistryBuilder::new().node("web1", WEB1).build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "ghost.nodes.svc.", RecordType::A, 3).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
    assert!(msg.answers().is_empty());
}

#[tokio::test]
async fn node_without_address_is_nxdomain() {
    let registry = TestRegistryBuilder::new()
        .raw("/svc/nodes/web1", r#"{"ip":""}"#)
        .build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "web1.nodes.svc.", RecordType::A, 4).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
}

#[tokio::test]
async fn node_srv_is_nxdomain() {
    let registry = TestRegistryBuilder::new().node("web1", WEB1).build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "web1.nodes.svc.", RecordType::SRV, 5).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
}

// =========================================================================
// Services
// =========================================================================

#[tokio::test]
async fn service_a_returns_node_addresses() {
    let registry = TestRegistryBuilder::new()
        .node("web1", WEB1)
        .instance("api", "1", 0, 0, 8080, "web1")
        .build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "api.services.svc.", RecordType::A, 10).await;

    assert_a_response(&msg, &[WEB1]);
}

#[tokio::test]
async fn service_srv_returns_target_and_glue() {
    let registry = TestRegistryBuilder::new()
        .node("web1", WEB1)
        .instance("api", "1", 0, 0, 8080, "web1")
        .build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "api.services.svc.", RecordType::SRV, 11).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(
        extract_srv(&msg),
        vec![(0, 0, 8080, "web1.svc.".to_string())]
    );
    assert_eq!(extract_glue(&msg), vec![("web1.svc.".to_string(), WEB1)]);
}

#[tokio::test]
async fn service_srv_without_node_keeps_answer() {
    let registry = TestRegistryBuilder::new()
        .instance("api", "1", 0, 0, 8080, "web1")
        .build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "api.services.svc.", RecordType::SRV, 12).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert_eq!(
        extract_srv(&msg),
        vec![(0, 0, 8080, "web1.svc.".to_string())]
    );
    assert!(extract_glue(&msg).is_empty());
}

#[tokio::test]
async fn service_a_without_node_is_nxdomain() {
    let registry = TestRegistryBuilder::new()
        .instance("api", "1", 0, 0, 8080, "web1")
        .build();
    let catalog = build_catalog(test_config(), registry);

    let msg = execute_query(&catalog, "api.services.svc.", RecordType::A, 13).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
}

#[tokio::test]
async fn external_target_is_verbatim_without_glue() {
    let registry = TestRegistryBuilder::new()
        .node("web1", WEB1)
        .instance("db", "1", 10, 5, 5432, "db.example.com.")
        .build();
    let catalog = build_catalog(test_config(), registry);

    let srv = execute_query(&catalog, "db.services.svc.", RecordType::SRV, 14).await;
    assert_response_code(&srv, ResponseCode::NoError);
    assert_eq!(
        extract_srv(&srv),
        vec![(10, 5, 5432, "db.example.com.".to_string())]
    );
    assert!(extract_glue(&srv).is_empty());

    // No local address to synthesize for an external host.
    let a = execute_query(&catalog, "db.services.svc.", RecordType::A, 15).await;
    assert_response_code(&a, ResponseCode::NXDomain);
}

#[tokio::test]
async fn mixed_instances() {
    let registry = TestRegistryBuilder::new()
        .node("web1", WEB1)
        .node("web2", WEB2)
        .instance("api", "web1", 1, 10, 8080, "web1")
        .instance("api", "web2", 1, 20, 8080, "web2")
        .instance("api", "ghost", 2, 0, 8080, "ghost")
        .instance("api", "ext", 3, 0, 443, "api.example.com.")
        .instance("api", "incomplete", 0, 0, 9999, "")
        .raw("/svc/services/api/garbage", "not json")
        .build();
    let catalog = build_catalog(test_config(), registry);

    let a = execute_query(&catalog, "api.services.svc.", RecordType::A, 20).await;
    assert_a_response(&a, &[WEB1, WEB2]);

    let srv = execute_query(&catalog, "api.services.svc.", RecordType::SRV, 21).await;
    assert_response_code(&srv, ResponseCode::NoError);
    assert_eq!(
        extract_srv(&srv),
        vec![
            (1, 10, 8080, "web1.svc.".to_string()),
            (1, 20, 8080, "web2.svc.".to_string()),
            (2, 0, 8080, "ghost.svc.".to_string()),
            (3, 0, 443, "api.example.com.".to_string()),
        ]
    );
    assert_eq!(
        extract_glue(&srv),
        vec![
            ("web1.svc.".to_string(), WEB1),
            ("web2.svc.".to_string(), WEB2),
        ]
    );
}

#[tokio::test]
async fn service_with_no_valid_instances_is_nxdomain() {
    let registry = TestRegistryBuilder::new()
        .instance("api", "1", 0, 0, 8080, "")
        .raw("/svc/services/api/2", "garbage")
        .build();
    let catalog = build_catalog(test_config(), registry);

    for (id, rtype) in [(30, RecordType::A), (31, RecordType::SRV)] {
        let msg = execute_query(&catalog, "api.services.svc.", rtype, id).await;
        assert_response_code(&msg, ResponseCode::NXDomain);
        assert!(msg.answers().is_empty());
    }
}

#[tokio::test]
async fn missing_service_is_nxdomain() {
    let catalog = build_catalog(test_config(), TestRegistryBuilder::new().build());

    let msg = execute_query(&catalog, "api.services.svc.", RecordType::SRV, 32).await;

    assert_response_code(&msg, ResponseCode::NXDomain);
}

// =========================================================================
// Classification
// =========================================================================

#[tokio::test]
async fn unknown_kind_is_nxdomain_without_registry_read() {
    let registry = TestRegistryBuilder::new().node("web1", WEB1).build();
    let catalog = build_catalog(test_config(), registry.clone());
    let reads = registry.reads();

    for (id, name) in [(40, "web1.hosts.svc."), (41, "web1.svc."), (42, "nodes.svc.")] {
        let msg = execute_query(&catalog, name, RecordType::A, id).await;
        assert_response_code(&msg, ResponseCode::NXDomain);
    }

    // SOA lookups for negative answers never touch the registry either.
    assert_eq!(registry.reads(), reads);
}

#[tokio::test]
async fn unsupported_type_is_nxdomain() {
    let registry = TestRegistryBuilder::new()
        .node("web1", WEB1)
        .instance("api", "1", 0, 0, 8080, "web1")
        .build();
    let catalog = build_catalog(test_config(), registry);

    for (id, name) in [(50, "web1.nodes.svc."), (51, "api.services.svc.")] {
        let msg = execute_query(&catalog, name, RecordType::AAAA, id).await;
        assert_response_code(&msg, ResponseCode::NXDomain);
    }
}

// =========================================================================
// Zone apex
// =========================================================================

#[tokio::test]
async fn apex_soa() {
    let catalog = build_catalog(test_config(), TestRegistryBuilder::new().build());

    let msg = execute_query(&catalog, DOMAIN, RecordType::SOA, 60).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert!(matches!(msg.answers()[0].data(), RData::SOA(_)));
}

#[tokio::test]
async fn apex_ns() {
    let catalog = build_catalog(test_config(), TestRegistryBuilder::new().build());

    let msg = execute_query(&catalog, DOMAIN, RecordType::NS, 61).await;

    assert_response_code(&msg, ResponseCode::NoError);
    assert!(matches!(msg.answers()[0].data(), RData::NS(_)));
}

#[tokio::test]
async fn other_zone_is_refused() {
    let catalog = build_catalog(test_config(), TestRegistryBuilder::new().build());

    let msg = execute_query(&catalog, "web1.nodes.example.com.", RecordType::A, 62).await;

    assert_response_code(&msg, ResponseCode::Refused);
}
