use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a help-desk user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Assistant,
  Employee,
}

impl Role {
  pub const ALL: [Role; 3] = [Role::Admin, Role::Assistant, Role::Employee];

  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Assistant => "assistant",
      Role::Employee => "employee",
    }
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Role::ALL
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| format!("unknown role '{}' (expected admin, assistant or employee)", s))
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Help-desk user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  /// Kept as text; cached directories may hold numeric ids
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub email: String,
  pub first_name: String,
  pub last_name: String,
  pub role: Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub department: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
}

impl User {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// Accept an id written either as a JSON string or a JSON number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(serde_json::Number),
  }

  Ok(match Id::deserialize(deserializer)? {
    Id::Text(id) => id,
    Id::Number(id) => id.to_string(),
  })
}

/// Support ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub priority: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub created_by: String,
  #[serde(default)]
  pub assigned_to: String,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

/// Ticket category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub description: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_role_parse() {
    assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
    assert!("Admin".parse::<Role>().is_err());
  }

  #[test]
  fn test_user_numeric_id_becomes_text() {
    let user: User = serde_json::from_str(
      r#"{"id":4,"email":"a@b.c","firstName":"Ana","lastName":"Ruiz","role":"admin"}"#,
    )
    .unwrap();
    assert_eq!(user.id, "4");
    assert!(serde_json::to_string(&user).unwrap().contains(r#""id":"4""#));
  }

  #[test]
  fn test_user_full_name_and_unknown_role() {
    let user: User = serde_json::from_str(
      r#"{"id":"9","email":"a@b.c","firstName":"Ana","lastName":"Ruiz","role":"employee"}"#,
    )
    .unwrap();
    assert_eq!(user.full_name(), "Ana Ruiz");
    assert!(user.department.is_none());

    let unknown = r#"{"id":"9","email":"a@b.c","firstName":"A","lastName":"R","role":"root"}"#;
    assert!(serde_json::from_str::<User>(unknown).is_err());
  }
}
