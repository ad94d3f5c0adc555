//! Strict shape validators for raw cached entries.

use serde_json::Value;

use crate::api::types::Role;

pub fn is_valid_user(value: &Value) -> bool {
  let Some(obj) = value.as_object() else {
    return false;
  };

  let id_ok = matches!(obj.get("id"), Some(Value::String(_)) | Some(Value::Number(_)));
  let role_ok = obj
    .get("role")
    .and_then(Value::as_str)
    .is_some_and(|role| Role::ALL.iter().any(|r| r.as_str() == role));

  id_ok && role_ok && all_strings(value, &["email", "firstName", "lastName"])
}

pub fn is_valid_ticket(value: &Value) -> bool {
  all_strings(value, &["id", "title", "status", "priority"])
}

pub fn is_valid_category(value: &Value) -> bool {
  value.get("id").is_some_and(|id| id.is_u64()) && all_strings(value, &["name"])
}

fn all_strings(value: &Value, fields: &[&str]) -> bool {
  value
    .as_object()
    .is_some_and(|obj| fields.iter().all(|f| obj.get(*f).is_some_and(Value::is_string)))
}
