// SPDX-License-Identifier: Apache-2.0
//! A store-agnostic adapter over the remote key/value + pub/sub backend the
//! cluster coordination core shares with no other subsystem knowledge: get
//! /set/del, list ops, sorted sets, publish/subscribe, and an atomic
//! set-if-absent lock. The `redis`-backed implementation is the default;
//! `FakeStore` is an in-memory stand-in for tests.

pub mod backoff;
mod error;
pub mod fake_store;
pub mod keys;
pub mod redis_store;
mod store;

pub use error::StoreError;
pub use fake_store::FakeStore;
pub use redis_store::RedisStore;
pub use store::{ClusterStore, Subscription};
