//! Stack status reading and classification
//!
//! Collapses the provider's status vocabulary into the four classes the
//! lifecycle controller acts on. Outputs of a transitioning stack may be
//! incomplete; callers cancel the pass instead of reading them.

use std::collections::BTreeMap;
use std::sync::Arc;

use nimbus_common::{Error, Result};
use tracing::debug;

use crate::aws::StackClient;

/// What a provider status means for the reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    /// The stack does not exist; the create path applies
    Absent,
    /// The stack is mid-operation; outputs are untrustworthy, cancel the pass
    Transitioning,
    /// The stack settled in a failed state; operator attention required
    Failed,
    /// The stack is stable and its outputs are trustworthy
    Ready,
}

/// Classify a provider status string.
///
/// Statuses this engine does not know are treated as transitioning: the
/// conservative reading keeps outputs untrusted until the vocabulary is
/// extended deliberately.
pub fn classify(status: &str) -> StatusClass {
    match status {
        "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "UPDATE_ROLLBACK_COMPLETE" => StatusClass::Ready,
        "CREATE_FAILED" | "ROLLBACK_FAILED" | "ROLLBACK_COMPLETE" | "DELETE_FAILED"
        | "UPDATE_FAILED" | "UPDATE_ROLLBACK_FAILED" => StatusClass::Failed,
        "DELETE_COMPLETE" => StatusClass::Absent,
        _ => StatusClass::Transitioning,
    }
}

/// A stack's status class plus its outputs, as read in one describe call
#[derive(Clone, Debug)]
pub struct StackFacts {
    stack_name: String,
    class: StatusClass,
    raw_status: Option<String>,
    outputs: BTreeMap<String, String>,
}

impl StackFacts {
    /// Facts for a stack that does not exist
    pub fn absent(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            class: StatusClass::Absent,
            raw_status: None,
            outputs: BTreeMap::new(),
        }
    }

    /// Facts for an existing stack
    pub fn existing(
        stack_name: impl Into<String>,
        raw_status: impl Into<String>,
        outputs: BTreeMap<String, String>,
    ) -> Self {
        let raw = raw_status.into();
        Self {
            stack_name: stack_name.into(),
            class: classify(&raw),
            raw_status: Some(raw),
            outputs,
        }
    }

    /// Name of the described stack
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Status class
    pub fn class(&self) -> StatusClass {
        self.class
    }

    /// The provider's raw status string, when the stack exists
    pub fn raw_status(&self) -> Option<&str> {
        self.raw_status.as_deref()
    }

    /// Value of one published output.
    ///
    /// A missing key on a ready stack is a distinct error; callers never
    /// consult outputs of a transitioning stack.
    pub fn output(&self, key: &str) -> Result<&str> {
        self.outputs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::output_not_found(&self.stack_name, key))
    }
}

/// Reads and classifies the current state of a named stack
pub struct StatusReader {
    stacks: Arc<dyn StackClient>,
}

impl StatusReader {
    /// Create a reader over the given stack client
    pub fn new(stacks: Arc<dyn StackClient>) -> Self {
        Self { stacks }
    }

    /// Describe the named stack and classify its status
    pub async fn describe(&self, stack_name: &str) -> Result<StackFacts> {
        let facts = match self.stacks.describe_stack(stack_name).await? {
            None => StackFacts::absent(stack_name),
            Some(remote) => StackFacts::existing(stack_name, remote.status, remote.outputs),
        };
        debug!(
            stack = stack_name,
            class = ?facts.class(),
            status = facts.raw_status().unwrap_or("-"),
            "described stack"
        );
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{MockStackClient, RemoteStack};

    #[test]
    fn classification_table() {
        assert_eq!(classify("CREATE_COMPLETE"), StatusClass::Ready);
        assert_eq!(classify("UPDATE_COMPLETE"), StatusClass::Ready);
        assert_eq!(classify("UPDATE_ROLLBACK_COMPLETE"), StatusClass::Ready);

        assert_eq!(classify("CREATE_IN_PROGRESS"), StatusClass::Transitioning);
        assert_eq!(classify("UPDATE_IN_PROGRESS"), StatusClass::Transitioning);
        assert_eq!(classify("DELETE_IN_PROGRESS"), StatusClass::Transitioning);
        assert_eq!(classify("ROLLBACK_IN_PROGRESS"), StatusClass::Transitioning);
        assert_eq!(
            classify("UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"),
            StatusClass::Transitioning
        );

        assert_eq!(classify("CREATE_FAILED"), StatusClass::Failed);
        assert_eq!(classify("ROLLBACK_COMPLETE"), StatusClass::Failed);
        assert_eq!(classify("DELETE_FAILED"), StatusClass::Failed);

        assert_eq!(classify("DELETE_COMPLETE"), StatusClass::Absent);
    }

    #[test]
    fn unknown_statuses_stay_untrusted() {
        assert_eq!(classify("REVIEW_IN_PROGRESS"), StatusClass::Transitioning);
        assert_eq!(classify("SOMETHING_NEW"), StatusClass::Transitioning);
    }

    #[test]
    fn missing_output_is_a_distinct_error() {
        let facts = StackFacts::existing(
            "nimbus-tenant-x",
            "CREATE_COMPLETE",
            BTreeMap::from([("VPCID".to_string(), "vpc-1".to_string())]),
        );
        assert_eq!(facts.output("VPCID").unwrap(), "vpc-1");

        let err = facts.output("WorkerASGName").unwrap_err();
        assert!(matches!(err, Error::OutputNotFound { .. }));
    }

    #[tokio::test]
    async fn describe_maps_missing_stack_to_absent() {
        let mut stacks = MockStackClient::new();
        stacks
            .expect_describe_stack()
            .withf(|name| name == "nimbus-tenant-x")
            .returning(|_| Ok(None));

        let reader = StatusReader::new(Arc::new(stacks));
        let facts = reader.describe("nimbus-tenant-x").await.unwrap();
        assert_eq!(facts.class(), StatusClass::Absent);
        assert_eq!(facts.raw_status(), None);
    }

    #[tokio::test]
    async fn describe_classifies_existing_stack() {
        let mut stacks = MockStackClient::new();
        stacks.expect_describe_stack().returning(|_| {
            Ok(Some(RemoteStack {
                status: "UPDATE_IN_PROGRESS".to_string(),
                outputs: BTreeMap::new(),
            }))
        });

        let reader = StatusReader::new(Arc::new(stacks));
        let facts = reader.describe("nimbus-tenant-x").await.unwrap();
        assert_eq!(facts.class(), StatusClass::Transitioning);
        assert_eq!(facts.raw_status(), Some("UPDATE_IN_PROGRESS"));
    }
}
