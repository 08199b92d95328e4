//! `{{field}}` substitution for alert commands.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use super::AlertNotice;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown template field `{0}`")]
    UnknownField(String),
}

/// Notice values available to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    MonitorName,
    AlertCount,
    FailureCount,
    IsUp,
    LastSuccess,
    LastCheckOutput,
    AlertMessage,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "monitor_name" => Field::MonitorName,
            "alert_count" => Field::AlertCount,
            "failure_count" => Field::FailureCount,
            "is_up" => Field::IsUp,
            "last_success" => Field::LastSuccess,
            "last_check_output" => Field::LastCheckOutput,
            "alert_message" => Field::AlertMessage,
            _ => return None,
        };
        Some(field)
    }

    fn value(self, notice: &AlertNotice) -> String {
        match self {
            Field::MonitorName => notice.monitor_name.clone(),
            Field::AlertCount => notice.alert_count.to_string(),
            Field::FailureCount => notice.failure_count.to_string(),
            Field::IsUp => notice.is_up.to_string(),
            Field::LastSuccess => notice
                .last_success
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            Field::LastCheckOutput => notice.last_check_output.clone(),
            Field::AlertMessage => notice.message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Field),
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compile a template, rejecting unknown fields.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let re = PLACEHOLDER
            .get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap());

        let mut segments = Vec::new();
        let mut last = 0;

        for caps in re.captures_iter(source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let field = Field::parse(name.as_str())
                .ok_or_else(|| TemplateError::UnknownField(name.as_str().to_string()))?;

            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Field(field));
            last = whole.end();
        }

        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, notice: &AlertNotice) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(&field.value(notice)),
            }
        }
        out
    }
}
