//! Caching implementations for GrowDesk types.

use serde_json::Value;

use crate::cache::{Cacheable, CATEGORIES_KEY, TICKETS_KEY, USERS_KEY};

use super::types::{Category, Role, Ticket, User};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Category {
  fn storage_key() -> &'static str {
    CATEGORIES_KEY
  }

  fn has_basic_shape(value: &Value) -> bool {
    has_fields(value, &["id", "name"])
  }

  fn seed() -> Vec<Self> {
    mock_categories()
  }
}

impl Cacheable for User {
  fn storage_key() -> &'static str {
    USERS_KEY
  }

  fn has_basic_shape(value: &Value) -> bool {
    has_fields(value, &["id", "email"])
  }

  fn seed() -> Vec<Self> {
    mock_users()
  }
}

impl Cacheable for Ticket {
  fn storage_key() -> &'static str {
    TICKETS_KEY
  }

  fn has_basic_shape(value: &Value) -> bool {
    has_fields(value, &["id", "title"])
  }

  fn seed() -> Vec<Self> {
    mock_tickets()
  }
}

/// True when `value` is an object carrying every field in `fields`.
fn has_fields(value: &Value, fields: &[&str]) -> bool {
  value
    .as_object()
    .is_some_and(|obj| fields.iter().all(|f| obj.contains_key(*f)))
}

// ============================================================================
// Mock datasets
// ============================================================================

pub fn mock_categories() -> Vec<Category> {
  [
    (1, "Soporte Técnico", "Problemas técnicos y asistencia"),
    (2, "Ventas", "Consultas sobre productos y servicios"),
    (3, "Facturación", "Problemas con pagos y facturas"),
    (4, "General", "Consultas generales"),
  ]
  .into_iter()
  .map(|(id, name, description)| Category {
    id,
    name: name.to_string(),
    description: description.to_string(),
  })
  .collect()
}

pub fn mock_users() -> Vec<User> {
  [
    ("1", "admin@growdesk.com", "Admin", "Sistema", Role::Admin, "Tecnología"),
    ("2", "asistente@growdesk.com", "María", "González", Role::Assistant, "Soporte"),
    ("3", "empleado@growdesk.com", "Juan", "Pérez", Role::Employee, "Ventas"),
  ]
  .into_iter()
  .map(|(id, email, first, last, role, department)| User {
    id: id.to_string(),
    email: email.to_string(),
    first_name: first.to_string(),
    last_name: last.to_string(),
    role,
    department: Some(department.to_string()),
    active: Some(true),
  })
  .collect()
}

pub fn mock_tickets() -> Vec<Ticket> {
  [
    (
      "TICKET-20250301090000",
      "No puedo acceder al correo",
      "El cliente de correo rechaza mi contraseña desde esta mañana",
      "open",
      "MEDIUM",
      "Soporte Técnico",
      "2",
      "2025-03-01T09:00:00Z",
    ),
    (
      "TICKET-20250305143000",
      "Error en la factura de marzo",
      "El importe facturado no coincide con el contrato",
      "in_progress",
      "HIGH",
      "Facturación",
      "2",
      "2025-03-05T14:30:00Z",
    ),
    (
      "TICKET-20250310101500",
      "Consulta sobre planes",
      "Quisiera conocer las diferencias entre los planes disponibles",
      "closed",
      "LOW",
      "Ventas",
      "",
      "2025-03-10T10:15:00Z",
    ),
  ]
  .into_iter()
  .map(
    |(id, title, description, status, priority, category, assigned_to, at)| Ticket {
      id: id.to_string(),
      title: title.to_string(),
      description: description.to_string(),
      status: status.to_string(),
      priority: priority.to_string(),
      category: category.to_string(),
      created_by: "3".to_string(),
      assigned_to: assigned_to.to_string(),
      created_at: at.to_string(),
      updated_at: at.to_string(),
    },
  )
  .collect()
}
