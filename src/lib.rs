//! varco: a small caching gateway that serves stored-procedure results over HTTP.
//!
//! One GET endpoint, one query type: the client names an action, varco answers
//! with the cached JSON document for it or, on a miss, invokes the MySQL stored
//! procedure of the same name, serializes its result set, and populates the
//! Redis cache for the next caller.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
