//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Delve, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Research (`/api/research`)
//! - `POST /api/research` - Run a query to completion and return the report
//! - `POST /api/research/stream` - Same, streaming `step` events over SSE
//! - `DELETE /api/research/{run_id}` - Cancel a run in flight
//!
//! ## Runs (`/api/runs`)
//! - `GET /api/runs` - Recently finished runs
//! - `GET /api/runs/{run_id}` - One finished run with its step log
//!
//! ## System
//! - `GET /api/health` - Health check endpoint
//! - `GET /api/welcome` - Chat greeting
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI document is served at `/api-docs/openapi.json`. When the
//! `swagger-ui` feature is enabled, interactive API documentation is
//! available at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

pub use routes::{ApiDoc, build_app, create_router};
