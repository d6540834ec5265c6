// SPDX-License-Identifier: Apache-2.0
//! Shared application services for the cluster node daemon (local config).
//! Keeps storage adapters thin and framework-agnostic.

pub mod config;
