//! Document information dictionary

use crate::object::Dict;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Producer written when none is configured
pub const DEFAULT_PRODUCER: &str = "pdf-emit";

/// Descriptive metadata written to the `/Info` dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// Application that created the original content
    pub creator: Option<String>,
    pub producer: String,
    pub creation: Option<DateTime<FixedOffset>>,
    pub modified: Option<DateTime<FixedOffset>>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: None,
            author: None,
            subject: None,
            keywords: None,
            creator: None,
            producer: DEFAULT_PRODUCER.to_string(),
            creation: None,
            modified: None,
        }
    }
}

impl Metadata {
    pub fn to_info_dict(&self) -> Dict {
        let mut dict = Dict::new();
        let texts = [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("Creator", &self.creator),
        ];
        for (key, value) in texts {
            if let Some(value) = value {
                dict.insert_text(key, value);
            }
        }
        if !self.producer.is_empty() {
            dict.insert_text("Producer", &self.producer);
        }
        if let Some(date) = &self.creation {
            dict.insert_string("CreationDate", format_date(date));
        }
        if let Some(date) = &self.modified {
            dict.insert_string("ModDate", format_date(date));
        }
        dict
    }
}

/// PDF date string: `D:YYYYMMDDHHmmSS+HH'mm'`
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    let offset = date.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        date.format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}
