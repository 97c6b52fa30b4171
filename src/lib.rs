//! Waitlist signup gateway: `POST /api/waitlist` forwards a validated email
//! to one list-management provider (Kit, Brevo, Supabase, or Kit behind a
//! local dedup file), `GET /api/waitlist` lists what the provider holds.
//!
//! Request flow: `routes` -> `gateway::Gateway` -> provider (`gateway::Kit`
//! etc) -> `provider_client::ProviderClient` -> network.

pub mod configuration;
pub mod domain;
pub mod gateway;
pub mod provider_client;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod utils;
