//! Map DNS question names onto registry entities.
//!
//! ```text
//! web1.nodes.<domain>           A    -> (web1, Node)
//! api.services.<domain>         A/SRV -> (api, Service)
//! _api._tcp.services.<domain>   SRV  -> (api, Service)
//! ```

use hickory_proto::rr::RecordType;

/// What kind of registry entity a question refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// `<name>.nodes.<domain>`
    Node,
    /// `<name>.services.<domain>` or `_<name>._<proto>.services.<domain>`
    Service,
    /// Anything else.
    Unknown,
}

impl EntityKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Service => "service",
            EntityKind::Unknown => "unknown",
        }
    }

    fn from_label(label: &str) -> Self {
        match label {
            "nodes" => EntityKind::Node,
            "services" => EntityKind::Service,
            _ => EntityKind::Unknown,
        }
    }
}

/// Result of classifying a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Entity name; empty when `kind` is `Unknown`.
    pub name: String,
    /// Entity kind.
    pub kind: EntityKind,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            name: String::new(),
            kind: EntityKind::Unknown,
        }
    }

    fn new(name: &str, kind: EntityKind) -> Self {
        if kind == EntityKind::Unknown || name.is_empty() {
            return Self::unknown();
        }
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// Classify `question` (fully qualified) against `domain` (normalized, with
/// trailing dot).
pub fn classify(question: &str, qtype: RecordType, domain: &str) -> Classification {
    let question = question.to_lowercase();
    let Some(rest) = question.strip_suffix(domain) else {
        return Classification::unknown();
    };
    let Some(rest) = rest.strip_suffix('.') else {
        return Classification::unknown();
    };

    let labels: Vec<&str> = rest.split('.').collect();
    match labels.as_slice() {
        [name, kind] => Classification::new(name, EntityKind::from_label(kind)),
        [service, proto, "services"]
            if qtype == RecordType::SRV && matches!(*proto, "_tcp" | "_udp") =>
        {
            match service.strip_prefix('_') {
                Some(name) => Classification::new(name, EntityKind::Service),
                None => Classification::unknown(),
            }
        }
        _ => Classification::unknown(),
    }
}
