//! Service element state

use std::sync::Arc;

use trellis_core::{ServiceKind, ServiceResult, Variant};

/// Invocation input handed to a service delegate
#[derive(Clone, Debug, Default)]
pub struct ServiceRequest {
    /// Decoded payload, if the caller sent one
    pub payload: Option<Variant>,
    /// Correlation id of the originating message, zero for local calls
    pub context_id: u64,
}

impl ServiceRequest {
    pub fn new(payload: Option<Variant>, context_id: u64) -> Self {
        ServiceRequest {
            payload,
            context_id,
        }
    }
}

/// Service delegate signature
pub type ServiceFn = Arc<dyn Fn(ServiceRequest) -> ServiceResult<Variant> + Send + Sync>;

/// Shared state of a service element
///
/// Invocation is a straight passthrough to the delegate. Panics and errors
/// propagate to the caller; containment is the dispatcher's job, not the
/// element's.
#[derive(Clone)]
pub struct ServicePoint {
    kind: ServiceKind,
    delegate: ServiceFn,
}

impl ServicePoint {
    pub fn new(
        kind: ServiceKind,
        delegate: impl Fn(ServiceRequest) -> ServiceResult<Variant> + Send + Sync + 'static,
    ) -> Self {
        ServicePoint {
            kind,
            delegate: Arc::new(delegate),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn invoke(&self, request: ServiceRequest) -> ServiceResult<Variant> {
        (self.delegate)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{MessageCode, ServiceError};

    #[test]
    fn test_invoke_passes_payload_through() {
        let point = ServicePoint::new(ServiceKind::Action, |req| {
            Ok(req.payload.unwrap_or(Variant::Null))
        });
        assert_eq!(point.kind(), ServiceKind::Action);
        let out = point
            .invoke(ServiceRequest::new(Some(Variant::I32(3)), 0))
            .unwrap();
        assert_eq!(out, Variant::I32(3));
    }

    #[test]
    fn test_invoke_propagates_errors() {
        let point = ServicePoint::new(ServiceKind::Getter, |_req| {
            Err(ServiceError::failure(MessageCode::NotFound, "no such thing"))
        });
        let err = point.invoke(ServiceRequest::default()).unwrap_err();
        assert_eq!(err.code(), MessageCode::NotFound);
    }
}
