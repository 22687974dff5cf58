use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Message exchange pattern of a transport configuration.
///
/// The pattern decides how an IntegrationStep's operation reference is
/// treated when a copy crosses a scope boundary: an inbound transport with an
/// asynchronous response means the referenced operation is a *correlated
/// response operation* and has to be cloned alongside the copy rather than
/// aliased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mep {
    InboundRequestResponse,
    InboundRequestAsynchronousResponse,
    OutboundRequestResponse,
    OutboundRequestAsynchronousResponse,
    OutboundNotification,
}

impl Mep {
    pub fn is_inbound_async(&self) -> bool {
        matches!(self, Mep::InboundRequestAsynchronousResponse)
    }

    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            Mep::OutboundRequestResponse
                | Mep::OutboundRequestAsynchronousResponse
                | Mep::OutboundNotification
        )
    }
}

/// Activation state of an event trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerState {
    Active,
    Inactive,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mep_direction_predicates() {
        assert!(Mep::InboundRequestAsynchronousResponse.is_inbound_async());
        assert!(!Mep::InboundRequestResponse.is_inbound_async());
        assert!(Mep::OutboundNotification.is_outbound());
        assert!(!Mep::InboundRequestAsynchronousResponse.is_outbound());
    }

    #[test]
    fn mep_serializes_kebab_case() {
        let json = serde_json::to_string(&Mep::InboundRequestAsynchronousResponse).unwrap();
        assert_eq!(json, "\"inbound-request-asynchronous-response\"");
    }
}
