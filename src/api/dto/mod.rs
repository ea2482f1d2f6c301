//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain types that already serialize in their wire shape ([`Settings`],
//! [`UpdateAdvice`], listings) are returned directly; the types here only
//! cover request bodies and composite responses.
//!
//! [`Settings`]: crate::domain::Settings
//! [`UpdateAdvice`]: crate::domain::UpdateAdvice

pub mod device_dto;
pub mod release_dto;

pub use device_dto::*;
pub use release_dto::*;
