//! Data Transfer Objects (DTOs) for Hiroba.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket frame DTOs (inbound commands, outbound events)
//! - `http`: HTTP API request / response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
