use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::repository::Resource;
use crate::database::schema::{is_valid_email, Document, FieldSpec, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub const ALL: &'static [&'static str] = &["user", "guide", "lead-guide", "admin"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid_email(value: &serde_json::Value, _doc: &Document) -> bool {
    value.as_str().map(is_valid_email).unwrap_or(false)
}

pub static USER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new(
        "users",
        vec![
            FieldSpec::string("name").required("Please tell us your name").trim(),
            FieldSpec::string("email")
                .required("Provide an email")
                .trim()
                .lowercase()
                .check(valid_email, "Provide a valid email"),
            FieldSpec::string("photo").default("default.jpg"),
            FieldSpec::string("role")
                .one_of(Role::ALL, "Role is either: user, guide, lead-guide, admin")
                .default("user"),
            FieldSpec::string("password")
                .required("Provide a password")
                .min_len(8, "A password must have at least 8 characters")
                .hidden()
                .internal(),
            FieldSpec::string("passwordConfirm").hidden().internal(),
            FieldSpec::date("passwordChangedAt").hidden().internal(),
            FieldSpec::string("passwordResetToken").hidden().internal(),
            FieldSpec::date("passwordResetExpires").hidden().internal(),
            FieldSpec::boolean("active").default(true).hidden().internal(),
        ],
    )
    .unique(&["email"])
    .soft_delete("active")
});

/// Typed view of a stored user, as attached to authenticated requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo: Option<String>,
    pub role: Role,
    #[serde(rename = "password", default, skip_serializing)]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active", skip_serializing)]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn from_document(doc: &Document) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(doc.clone()))
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

impl Resource for User {
    const COLLECTION: &'static str = "users";

    fn schema() -> &'static Schema {
        &USER_SCHEMA
    }
}
