//! DASH media URL templates.
//!
//! Supports the `$RepresentationID$`, `$Number$`, `$SubNumber$`,
//! `$Bandwidth$` and `$Time$` identifiers with optional `%0<width><format>`
//! specifiers, plus the `$$` escape.

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use regex::{Captures, Regex};
use tracing::warn;

use crate::uri::{resolve_uris, UriProvider};

/// Widest `%0<width>` specifier honoured; wider ones are ignored.
const MAX_WIDTH: usize = 32;

static TEMPLATE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(RepresentationID|Number|SubNumber|Bandwidth|Time)?(?:%0([0-9]+)([diouxX]))?\$")
        .expect("template identifier pattern is valid")
});

/// Values available for substitution. `None` leaves the identifier untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateValues<'a> {
    pub representation_id: Option<&'a str>,
    pub number: Option<u64>,
    pub sub_number: Option<u64>,
    pub bandwidth: Option<u64>,
    /// Media time in timescale units; rounded to the nearest integer.
    pub time: Option<f64>,
}

/// Fill a media URL template.
pub fn fill_uri_template(template: &str, values: &TemplateValues<'_>) -> String {
    TEMPLATE_IDENTIFIER
        .replace_all(template, |caps: &Captures<'_>| substitute(template, caps, values))
        .into_owned()
}

fn substitute(template: &str, caps: &Captures<'_>, values: &TemplateValues<'_>) -> String {
    let whole = &caps[0];
    let Some(name) = caps.get(1).map(|m| m.as_str()) else {
        if whole == "$$" {
            return "$".to_string();
        }
        warn!("URL template has a format specifier without identifier: {}", template);
        return whole.to_string();
    };
    let mut width = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
    if width.is_some_and(|w| w > MAX_WIDTH) {
        warn!(
            "URL template width specifier exceeds {} digits, ignoring it: {}",
            MAX_WIDTH, template
        );
        width = None;
    }
    let format = caps.get(3).map(|m| m.as_str());

    let value = match name {
        "RepresentationID" => {
            let Some(id) = values.representation_id else {
                return missing(template, name, whole);
            };
            if width.is_some() {
                warn!(
                    "URL template should not contain a width specifier for \"RepresentationID\": {}",
                    template
                );
                width = None;
            }
            return pad(id.to_string(), width);
        }
        "Number" => values.number,
        "SubNumber" => values.sub_number,
        "Bandwidth" => values.bandwidth,
        "Time" => values.time.map(|time| {
            if (time - time.round()).abs() >= 0.2 {
                warn!("Calculated $Time$ value {} is not close to an integer", time);
            }
            time.round().max(0.0) as u64
        }),
        _ => None,
    };

    let Some(value) = value else {
        return missing(template, name, whole);
    };

    let formatted = match format {
        Some("o") => format!("{:o}", value),
        Some("x") => format!("{:x}", value),
        Some("X") => format!("{:X}", value),
        _ => value.to_string(),
    };
    pad(formatted, width)
}

fn missing(template: &str, name: &str, whole: &str) -> String {
    warn!(
        "URL template does not have an available substitution for identifier \"{}\": {}",
        name, template
    );
    whole.to_string()
}

fn pad(value: String, width: Option<usize>) -> String {
    let width = width.unwrap_or(1);
    if value.len() >= width {
        value
    } else {
        format!("{}{}", "0".repeat(width - value.len()), value)
    }
}

/// A [`UriProvider`] that fills a media template on first use and caches the
/// resolved URIs.
#[derive(Debug)]
pub struct TemplateUris {
    template: Arc<str>,
    representation_id: Arc<str>,
    base_uris: Arc<[String]>,
    number: Option<u64>,
    sub_number: Option<u64>,
    bandwidth: Option<u64>,
    time: Option<f64>,
    resolved: OnceCell<Vec<String>>,
}

impl TemplateUris {
    pub fn new(template: Arc<str>, representation_id: Arc<str>, base_uris: Arc<[String]>) -> Self {
        Self {
            template,
            representation_id,
            base_uris,
            number: None,
            sub_number: None,
            bandwidth: None,
            time: None,
            resolved: OnceCell::new(),
        }
    }

    pub fn number(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn sub_number(mut self, sub_number: u64) -> Self {
        self.sub_number = Some(sub_number);
        self
    }

    pub fn bandwidth(mut self, bandwidth: Option<u64>) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }
}

impl UriProvider for TemplateUris {
    fn resolve(&self) -> Vec<String> {
        self.resolved
            .get_or_init(|| {
                let media = fill_uri_template(
                    &self.template,
                    &TemplateValues {
                        representation_id: Some(&self.representation_id),
                        number: self.number,
                        sub_number: self.sub_number,
                        bandwidth: self.bandwidth,
                        time: self.time,
                    },
                );
                resolve_uris(&self.base_uris, &[media])
            })
            .clone()
    }
}
