//! Library crate for courtside-back, exposing modules for binaries and tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod gateways;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;
