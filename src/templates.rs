//! HTML template rendering.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use minijinja::{path_loader, Environment};
use serde_json::Value;

/// Renders a named template with a JSON object as context.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, context: &Value) -> Result<String, AppError>;
}

/// Templates loaded from a directory on disk.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new(dir: &str) -> Self {
        tracing::info!(path = %dir, "loading templates");
        let mut env = Environment::new();
        env.set_loader(path_loader(dir));
        env.add_filter("datetime", datetime_filter);
        Templates { env }
    }
}

impl TemplateRenderer for Templates {
    fn render(&self, name: &str, context: &Value) -> Result<String, AppError> {
        let tmpl = self.env.get_template(name)?;
        Ok(tmpl.render(context)?)
    }
}

fn datetime_filter(t: f64) -> String {
    relative_time(t, Utc::now().timestamp() as f64)
}

/// Relative English description of `t` as seen at `now`, both in epoch seconds.
pub fn relative_time(t: f64, now: f64) -> String {
    let delta = (now - t) as i64;
    if delta < 60 {
        return "1 minute ago".to_string();
    }
    if delta < 3600 {
        return plural(delta / 60, "minute");
    }
    if delta < 86400 {
        return plural(delta / 3600, "hour");
    }
    if delta < 604800 {
        return plural(delta / 86400, "day");
    }
    match DateTime::<Utc>::from_timestamp(t as i64, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => String::new(),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
