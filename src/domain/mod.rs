//! Pure types shared by every layer: errors, the wire format, and job entities.

pub mod delimiters;
pub mod entities;
pub mod errors;
