// src/lib.rs

//! tourwatch library: tour-date normalization, change detection and
//! announcement.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
