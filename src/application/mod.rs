//! Application services layer: the request pipeline and its seams.

pub mod error;
pub mod gateway;
pub mod repos;
pub mod serialize;
