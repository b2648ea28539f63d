use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use geokit_types::StyleColor;
use log::warn;
use regex::Regex;

use super::XmlElement;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

/// Removes HTML tags from the text and collapses the remaining whitespace.
pub fn strip_html(text: &str) -> String {
    let stripped = HTML_TAG.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a date/time in one of the forms used by XML feeds: RFC 3339, RFC 2822 (RSS `pubDate`), local date-time
/// without offset (interpreted as UTC) or a bare date.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(date.and_utc());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(date.and_utc());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

/// Parses a boolean written as `true`/`false`, `1`/`0` or `yes`/`no` (case-insensitive).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_logged<T>(element: &str, value: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    let result = parse(value);
    if result.is_none() {
        warn!("Skipping malformed value of <{element}>: {value:?}");
    }

    result
}

impl XmlElement {
    /// Trimmed text content of the element, or `None` if it is empty. With `strip` set, HTML tags are removed.
    pub fn value(&self, strip: bool) -> Option<String> {
        let text = self.text();
        let text = if strip { strip_html(&text) } else { text.trim().to_string() };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Text content of the first child element with the given name.
    pub fn child_string(&self, name: &str, strip: bool) -> Option<String> {
        self.child(name).and_then(|child| child.value(strip))
    }

    /// Content of the first child element with the given name parsed as a double. Malformed values are skipped.
    pub fn child_f64(&self, name: &str) -> Option<f64> {
        let value = self.child_string(name, false)?;
        parse_logged(name, &value, |v| v.parse().ok())
    }

    /// Content of the first child element with the given name parsed as an integer. Malformed values are skipped.
    pub fn child_i64(&self, name: &str) -> Option<i64> {
        let value = self.child_string(name, false)?;
        parse_logged(name, &value, |v| v.parse().ok())
    }

    /// Content of the first child element with the given name parsed as a boolean. Malformed values are skipped.
    pub fn child_bool(&self, name: &str) -> Option<bool> {
        let value = self.child_string(name, false)?;
        parse_logged(name, &value, parse_bool)
    }

    /// Content of the first child element with the given name parsed as a date. Malformed values are skipped.
    pub fn child_datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        let value = self.child_string(name, false)?;
        parse_logged(name, &value, parse_datetime)
    }

    /// Content of the first child element with the given name parsed as a KML color (`aabbggrr`).
    pub fn child_kml_color(&self, name: &str) -> Option<StyleColor> {
        let value = self.child_string(name, false)?;
        parse_logged(name, &value, StyleColor::try_from_kml_hex)
    }

    /// Value of the attribute parsed as a double. Malformed values are skipped.
    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        let value = self.attr(name)?;
        parse_logged(name, value, |v| v.trim().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn html_stripping() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>\n<br/>"), "Hello world");
        assert_eq!(strip_html("plain"), "plain");
    }

    #[test]
    fn datetimes() {
        let date = parse_datetime("2009-10-17T18:37:26Z").unwrap();
        assert_eq!((date.year(), date.hour()), (2009, 18));

        let date = parse_datetime("Sat, 07 Sep 2002 09:42:31 GMT").unwrap();
        assert_eq!(date.day(), 7);

        let date = parse_datetime("2009-10-17T18:37:26+02:00").unwrap();
        assert_eq!(date.hour(), 16);

        assert!(parse_datetime("2012-01-05").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn typed_children() {
        let root = parse_document(
            br#"<wpt lat="1.5" lon="bad">
                <ele> 12.5 </ele>
                <sat>x</sat>
                <visible>1</visible>
                <color>ff0000ff</color>
                <desc><![CDATA[<i>text</i>]]></desc>
            </wpt>"#,
        )
        .unwrap();

        assert_eq!(root.child_f64("ele"), Some(12.5));
        assert_eq!(root.child_i64("sat"), None);
        assert_eq!(root.child_bool("visible"), Some(true));
        assert_eq!(root.child_kml_color("color"), Some(StyleColor::RED));
        assert_eq!(root.child_string("desc", true).as_deref(), Some("text"));
        assert_eq!(root.child_string("desc", false).as_deref(), Some("<i>text</i>"));
        assert_eq!(root.attr_f64("lat"), Some(1.5));
        assert_eq!(root.attr_f64("lon"), None);
    }
}
