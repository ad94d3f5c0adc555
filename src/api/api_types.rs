//! Request and response bodies exchanged with the GrowDesk REST API.
//!
//! These types are separate from domain types so request payloads can carry
//! only the fields an endpoint expects.

use serde::{Deserialize, Serialize};

use super::types::User;

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
  pub email: String,
  pub password: String,
  pub first_name: String,
  pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
  pub token: String,
  pub user: User,
}

// ============================================================================
// Tickets
// ============================================================================

/// Body of `POST /tickets`
#[derive(Debug, Clone, Serialize)]
pub struct TicketCreateData {
  pub title: String,
  pub description: String,
  pub priority: String,
  pub category: String,
}

/// Body of `PUT /tickets/:id`; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdateData {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_to: Option<String>,
}

impl TicketUpdateData {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.status.is_none()
      && self.priority.is_none()
      && self.category.is_none()
      && self.assigned_to.is_none()
  }
}

/// Body of `POST /tickets/:id/assign`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
  pub assigned_to: String,
  pub status: String,
}

/// Body of `PUT /tickets/:id/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusRequest {
  pub status: String,
}

// ============================================================================
// Startup descriptor
// ============================================================================

/// Static descriptor announcing the current cache cleanup version.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheDescriptor {
  #[serde(default)]
  pub id: serde_json::Value,
  pub version: u64,
}
