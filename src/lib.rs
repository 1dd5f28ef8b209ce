//! aqflow - streaming daily aggregation of air-quality readings
//!
//! Readings arrive as `{timestamp, value}` JSON payloads, are grouped by UTC
//! calendar day and reduced to a single daily average that is published once
//! per day to an outbound queue.

pub mod emitter;
pub mod pipeline;
pub mod source;
