//! Error types for the nimbus reconciliation engine
//!
//! The taxonomy follows the engine's failure model: configuration errors are
//! fatal at construction time, capacity errors require a spec change,
//! execution-failed errors are retried by the invoking scheduler, and
//! recognized transitional provider conditions are converted into clean
//! pass-cancellation by the lifecycle controller rather than surfaced as
//! errors.

use thiserror::Error;

/// Classified provider failure kinds.
///
/// Every provider call is classified exactly once, at the SDK adapter
/// boundary. Callers branch on the kind; nothing downstream inspects
/// provider error strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// The resource already exists (e.g. duplicate stack create)
    AlreadyExists,
    /// The resource does not exist (never created, or already gone)
    NotFound,
    /// A deletion is already in flight for the resource
    DeleteInProgress,
    /// An update is already in flight for the resource
    UpdateInProgress,
    /// The resource exists but is not yet in a state that accepts the
    /// requested operation (e.g. instance still stopping)
    ResourceNotReady,
    /// Anything the adapter could not classify; propagated verbatim
    Other,
}

impl ProviderErrorKind {
    /// Transitional kinds are expected mid-reconciliation and are converted
    /// into a cancelled pass by the lifecycle controller, never into errors.
    pub fn is_transitional(self) -> bool {
        !matches!(self, ProviderErrorKind::Other)
    }
}

/// A classified error from a cloud provider call.
///
/// Carries the operation name and resource identifier so failures can be
/// diagnosed without re-wrapping at every call site.
#[derive(Debug, Error)]
#[error("provider error [{operation}] on {resource}: {message}")]
pub struct ProviderError {
    /// Classified failure kind
    pub kind: ProviderErrorKind,
    /// Provider operation that failed (e.g. "create_stack")
    pub operation: &'static str,
    /// Identifier of the resource the operation targeted
    pub resource: String,
    /// Provider-supplied failure description
    pub message: String,
}

impl ProviderError {
    /// Create a provider error with the given classification
    pub fn new(
        kind: ProviderErrorKind,
        operation: &'static str,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation,
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// True when this error represents a recognized transitional condition
    pub fn is_transitional(&self) -> bool {
        self.kind.is_transitional()
    }
}

/// Main error type for nimbus operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid engine configuration, detected at construction time.
    /// Never retried; the deployment must be fixed.
    #[error("configuration error [{component}]: {message}")]
    Configuration {
        /// Component or field that is misconfigured
        component: String,
        /// Description of what is invalid
        message: String,
    },

    /// The parent address block cannot satisfy the required zone count.
    /// A hard failure: the declarative spec must be changed.
    #[error("subnet capacity exhausted in {parent}: {message}")]
    Capacity {
        /// Parent CIDR that ran out of room
        parent: String,
        /// Description of the shortfall
        message: String,
    },

    /// The provider returned something the engine cannot act on, such as
    /// an unexpected cardinality. Fatal for this pass; the scheduler retries.
    #[error("execution failed [{operation}]: {message}")]
    ExecutionFailed {
        /// Operation that produced the unusable result
        operation: String,
        /// Description of what was wrong
        message: String,
    },

    /// A requested output key is missing from a ready stack.
    /// Distinct from a transitioning stack, where absence is expected.
    #[error("output {key:?} not found in stack {stack}")]
    OutputNotFound {
        /// Stack whose outputs were consulted
        stack: String,
        /// The missing output key
        key: String,
    },

    /// A classified cloud provider failure
    #[error(transparent)]
    Provider {
        /// The classified provider error
        #[from]
        source: ProviderError,
    },

    /// Kubernetes API error from a declarative-store read
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: msg.into(),
        }
    }

    /// Create a capacity error for the given parent block
    pub fn capacity(parent: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Capacity {
            parent: parent.into(),
            message: msg.into(),
        }
    }

    /// Create an execution-failed error
    pub fn execution_failed(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create an output-not-found error
    pub fn output_not_found(stack: impl Into<String>, key: impl Into<String>) -> Self {
        Self::OutputNotFound {
            stack: stack.into(),
            key: key.into(),
        }
    }

    /// True when this error wraps a recognized transitional provider
    /// condition. The lifecycle controller is the only place that acts on
    /// this; everything below it propagates.
    pub fn is_transitional(&self) -> bool {
        matches!(self, Error::Provider { source } if source.is_transitional())
    }

    /// Whether the invoking scheduler should retry the pass.
    ///
    /// Configuration and capacity errors require human intervention;
    /// everything else is worth another pass.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Configuration { .. } => false,
            Error::Capacity { .. } => false,
            Error::ExecutionFailed { .. } => true,
            Error::OutputNotFound { .. } => true,
            Error::Provider { .. } => true,
            Error::Kube { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitional_kinds_cover_the_recognized_conditions() {
        assert!(ProviderErrorKind::AlreadyExists.is_transitional());
        assert!(ProviderErrorKind::NotFound.is_transitional());
        assert!(ProviderErrorKind::DeleteInProgress.is_transitional());
        assert!(ProviderErrorKind::UpdateInProgress.is_transitional());
        assert!(ProviderErrorKind::ResourceNotReady.is_transitional());
        assert!(!ProviderErrorKind::Other.is_transitional());
    }

    #[test]
    fn provider_error_display_includes_operation_and_resource() {
        let err = ProviderError::new(
            ProviderErrorKind::AlreadyExists,
            "create_stack",
            "nimbus-tenant-a1b2c",
            "stack already exists",
        );
        let s = err.to_string();
        assert!(s.contains("create_stack"));
        assert!(s.contains("nimbus-tenant-a1b2c"));
        assert!(s.contains("already exists"));
    }

    #[test]
    fn error_transitional_only_for_provider_kinds() {
        let transitional: Error = ProviderError::new(
            ProviderErrorKind::DeleteInProgress,
            "delete_stack",
            "s",
            "in progress",
        )
        .into();
        assert!(transitional.is_transitional());

        let opaque: Error =
            ProviderError::new(ProviderErrorKind::Other, "delete_stack", "s", "boom").into();
        assert!(!opaque.is_transitional());

        assert!(!Error::execution_failed("find_master", "two instances").is_transitional());
        assert!(!Error::capacity("10.0.0.0/24", "5 zones requested").is_transitional());
    }

    #[test]
    fn configuration_and_capacity_are_not_retryable() {
        assert!(!Error::configuration("scheme", "chunk prefix too small").is_retryable());
        assert!(!Error::capacity("10.0.0.0/24", "no free chunks").is_retryable());
        assert!(Error::execution_failed("op", "bad cardinality").is_retryable());
        assert!(Error::output_not_found("stack", "VPCID").is_retryable());
    }

    #[test]
    fn output_not_found_names_stack_and_key() {
        let err = Error::output_not_found("nimbus-tenant-x", "WorkerASGName");
        assert!(err.to_string().contains("nimbus-tenant-x"));
        assert!(err.to_string().contains("WorkerASGName"));
    }
}
