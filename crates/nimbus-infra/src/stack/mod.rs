//! Stack lifecycle: status reading, shape, and the controller

mod controller;
mod state;
mod status;

pub use controller::{DeleteOutcome, PassOutcome, StackController, StackControllerDeps};
pub use state::{
    stack_name, StackState, OUTPUT_DATA_VOLUME_SIZE, OUTPUT_IMAGE_ID, OUTPUT_INSTANCE_TYPE,
    OUTPUT_PEERING_ID, OUTPUT_VERSION_TAG, OUTPUT_VPC_ID, OUTPUT_WORKER_ASG_NAME,
    STACK_NAME_PREFIX,
};
pub use status::{classify, StackFacts, StatusClass, StatusReader};
