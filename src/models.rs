//! Users, blogs and comments.

use crate::declare_model;
use crate::error::SchemaError;
use crate::orm::{Field, Model, ModelMeta, ModelSchema};
use serde_json::Value;

/// 50-char id: zero-padded millisecond timestamp, random uuid hex, `000`.
pub fn next_id() -> String {
    format!(
        "{:015}{}000",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Seconds since the epoch, as stored in `created_at`.
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn id_field() -> Field {
    Field::string()
        .ddl("varchar(50)")
        .primary_key()
        .default_with(|| Value::String(next_id()))
}

fn created_at_field() -> Field {
    Field::float().default_with(|| Value::from(now_timestamp()))
}

declare_model!(
    User,
    ModelSchema::new("User")
        .table("users")
        .field("id", id_field())
        .field("email", Field::string().ddl("varchar(50)"))
        .field("passwd", Field::string().ddl("varchar(50)"))
        .field("admin", Field::boolean())
        .field("name", Field::string().ddl("varchar(50)"))
        .field("image", Field::string().ddl("varchar(500)"))
        .field("created_at", created_at_field())
);

declare_model!(
    Blog,
    ModelSchema::new("Blog")
        .table("blogs")
        .field("id", id_field())
        .field("user_id", Field::string().ddl("varchar(50)"))
        .field("user_name", Field::string().ddl("varchar(50)"))
        .field("user_image", Field::string().ddl("varchar(500)"))
        .field("name", Field::string().ddl("varchar(50)"))
        .field("summary", Field::string().ddl("varchar(200)"))
        .field("content", Field::text())
        .field("created_at", created_at_field())
);

declare_model!(
    Comment,
    ModelSchema::new("Comment")
        .table("comments")
        .field("id", id_field())
        .field("blog_id", Field::string().ddl("varchar(50)"))
        .field("user_id", Field::string().ddl("varchar(50)"))
        .field("user_name", Field::string().ddl("varchar(50)"))
        .field("user_image", Field::string().ddl("varchar(500)"))
        .field("content", Field::text())
        .field("created_at", created_at_field())
);

/// Masked stand-in for password digests in responses.
pub const MASKED_PASSWD: &str = "******";

impl User {
    pub fn id(&self) -> &str {
        self.0.get_str("id").unwrap_or_default()
    }

    pub fn email(&self) -> &str {
        self.0.get_str("email").unwrap_or_default()
    }

    pub fn passwd(&self) -> &str {
        self.0.get_str("passwd").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.get_str("name").unwrap_or_default()
    }

    pub fn image(&self) -> &str {
        self.0.get_str("image").unwrap_or_default()
    }

    /// Stored booleans may come back as 0/1 from older rows.
    pub fn admin(&self) -> bool {
        match self.0.get("admin") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        }
    }

    pub fn mask_passwd(&mut self) {
        self.0.set("passwd", MASKED_PASSWD);
    }
}

impl Blog {
    pub fn id(&self) -> &str {
        self.0.get_str("id").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.get_str("name").unwrap_or_default()
    }

    pub fn content(&self) -> &str {
        self.0.get_str("content").unwrap_or_default()
    }
}

impl Comment {
    pub fn content(&self) -> &str {
        self.0.get_str("content").unwrap_or_default()
    }
}

/// Resolve every model's metadata now so a bad declaration stops startup with an error.
pub fn register_all() -> Result<Vec<&'static ModelMeta>, SchemaError> {
    Ok(vec![User::try_meta()?, Blog::try_meta()?, Comment::try_meta()?])
}
