//! Staffetta is a stale-while-revalidate HTTP gateway.
//!
//! It sits between clients and an origin server and answers cacheable
//! GET/HEAD requests from an in-process response cache. A cached response
//! is served even when it is older than the freshness window; staleness
//! only schedules a detached refresh against the origin, so the requester
//! never waits on revalidation.

pub mod cache;
pub mod config;
pub mod infra;
