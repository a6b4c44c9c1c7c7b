// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod store;
pub mod network;
pub mod notary;
pub mod flows;
pub mod tracker;
pub mod node;
pub mod cluster;
pub mod api;
pub mod server;
