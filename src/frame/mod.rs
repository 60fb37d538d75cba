//! Frame and response data model.
//!
//! This module handles:
//! - The response/frame/field schema exchanged with the query backend
//! - Classifying frames into rows or series
//! - Deriving the identity key used to match frames across waves

pub mod identity;
pub mod schema;

// Re-export main types
pub use identity::{resolve_and_memoize, resolve_frame_key, FrameKey, FrameKind};
pub use schema::{Field, FieldType, Frame, FrameMeta, LoadingState, QueryError, Response, Stat};
