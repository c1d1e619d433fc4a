//! Domain model (ids, operations, status, decisions, errors).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod operation;
pub mod status;

pub use decision::Decision;
pub use errors::{DeliveryError, RelayError, StoreError};
pub use ids::OperationId;
pub use operation::{
    DeliveryResponse, Method, NewOperation, OutgoingRequest, QueuedOperation,
    is_credential_header,
};
pub use status::{DrainSummary, QueueStats, QueueStatus};
