//! Request and Response models for the relay API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    AnalysisRequest, ChannelStreamRequest, ChannelsRequest, EmailValidationRequest, SearchQuery,
    VariantQuery,
};
pub use responses::{
    CacheStatsResponse, ClearResponse, DataResponse, HealthResponse, InvalidateResponse,
    QuotaResponse,
};
