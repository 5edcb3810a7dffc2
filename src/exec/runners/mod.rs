// src/exec/runners/mod.rs

//! One function per step kind. Each posts exactly one terminal event for its
//! step; engine and filesystem errors become failure events here.

pub mod caches;
pub mod cleanup;
pub mod container;
pub mod health;
pub mod image;
pub mod network;
pub mod setup;
