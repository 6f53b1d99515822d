//! Data Transfer Objects for REST request/response serialization.

pub mod count_dto;
pub mod grafana_dto;
pub mod system_dto;

pub use count_dto::*;
pub use grafana_dto::*;
pub use system_dto::*;
