//! Lead Capture API Library
//!
//! Backend for a marketing landing page: captures contact/demo form
//! submissions, classifies them into market segments, stores them locally,
//! fans them out to best-effort sinks (HubSpot CRM, EmailJS, a custom
//! webhook), logs interaction events and exports leads as CSV.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `analytics`: Event tracking and summaries.
//! - `classifier`: Market segment classification.
//! - `config`: Configuration management.
//! - `crm_client`: HubSpot CRM client.
//! - `email_client`: EmailJS client.
//! - `errors`: Error handling types.
//! - `export`: CSV export.
//! - `handlers`: HTTP request handlers.
//! - `integrity`: Checksummed storage envelopes.
//! - `lead_capture`: Submission pipeline.
//! - `models`: Core data models.
//! - `sanitize`: Form input normalization.
//! - `sinks`: Notification sinks.
//! - `storage`: Local lead and event stores.

pub mod api;
pub mod core;
pub mod integrations;

pub mod analytics;
pub mod classifier;
pub mod config;
pub mod crm_client;
pub mod email_client;
pub mod errors;
pub mod export;
pub mod handlers;
pub mod integrity;
pub mod lead_capture;
pub mod models;
pub mod sanitize;
pub mod sinks;
pub mod storage;
