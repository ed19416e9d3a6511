mod envelope;
mod error;
pub mod events;
mod idempotency;
pub mod sidecar;
mod subscription;
pub mod token;

pub use envelope::Envelope;
pub use error::SidecarError;
pub use idempotency::IdempotencyGuard;
pub use subscription::EventStatus;
