//! Template renderer seam
//!
//! The engine supplies parameters and never inspects the rendered body;
//! the actual template source and rendering mechanics live with the
//! external renderer collaborator.

use std::collections::BTreeMap;

use nimbus_common::crd::ScalingBounds;
use nimbus_common::Result;

#[cfg(test)]
use mockall::automock;

use crate::config::EncrypterBackend;
use crate::snapshot::ZoneSubnets;
use crate::stack::StackState;

/// Everything the renderer needs to produce a stack template body
#[derive(Clone, Debug)]
pub struct StackParameters {
    /// Cluster identifier resources are tagged with
    pub cluster_id: String,
    /// Shape of the stack to render
    pub state: StackState,
    /// Worker scaling-group bounds
    pub bounds: ScalingBounds,
    /// AZ-to-subnet mapping; complete for every required zone
    pub zones: BTreeMap<String, ZoneSubnets>,
    /// Whether DNS records are rendered into the stack
    pub route53_enabled: bool,
    /// Secret encryption backend identifier
    pub encrypter: EncrypterBackend,
}

/// Renders stack parameters into an opaque template body
#[cfg_attr(test, automock)]
pub trait TemplateRenderer: Send + Sync {
    /// Produce the template body for the given parameters
    fn render(&self, params: &StackParameters) -> Result<String>;
}
