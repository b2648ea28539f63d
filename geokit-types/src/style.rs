//! Styles of geometries and the style table of a dataset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Color representation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StyleColor {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl From<String> for StyleColor {
    fn from(value: String) -> Self {
        Self::try_from_hex(&value).unwrap_or(StyleColor::BLACK)
    }
}

impl From<StyleColor> for String {
    fn from(val: StyleColor) -> Self {
        val.to_hex()
    }
}

impl StyleColor {
    /// Transparent color: `#00000000`
    pub const TRANSPARENT: StyleColor = StyleColor::rgba(0, 0, 0, 0);
    /// Red color: `#FF0000FF`
    pub const RED: StyleColor = StyleColor::rgba(255, 0, 0, 255);
    /// Green color: `#00FF00FF`
    pub const GREEN: StyleColor = StyleColor::rgba(0, 255, 0, 255);
    /// Blue color: `#0000FFFF`
    pub const BLUE: StyleColor = StyleColor::rgba(0, 0, 255, 255);
    /// White color: `#FFFFFFFF`
    pub const WHITE: StyleColor = StyleColor::rgba(255, 255, 255, 255);
    /// Black color: `#000000FF`
    pub const BLACK: StyleColor = StyleColor::rgba(0, 0, 0, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Converts the color into u8 array (RGBA).
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts the color into HEX8 string: `#RRGGBBAA`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Converts the color into HEX6 string without alpha: `#RRGGBB`.
    pub fn to_rgb_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Parses a color from the hex string. Hex string can be either HEX6 (`#RRGGBB`) or HEX8 (`#RRGGBBAA`).
    pub fn try_from_hex(hex_string: &str) -> Option<Self> {
        let hex = hex_string.trim().strip_prefix('#')?;
        if hex.len() != 6 && hex.len() != 8 {
            return None;
        }

        let r = parse_byte(hex, 0)?;
        let g = parse_byte(hex, 2)?;
        let b = parse_byte(hex, 4)?;
        let a = if hex.len() == 8 {
            parse_byte(hex, 6)?
        } else {
            255
        };

        Some(Self { r, g, b, a })
    }

    /// Parses a KML color, which is written as `aabbggrr` (optionally prefixed with `#`). Six-digit values are
    /// treated as `bbggrr` with full opacity.
    pub fn try_from_kml_hex(hex_string: &str) -> Option<Self> {
        let hex = hex_string.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        match hex.len() {
            8 => Some(Self {
                a: parse_byte(hex, 0)?,
                b: parse_byte(hex, 2)?,
                g: parse_byte(hex, 4)?,
                r: parse_byte(hex, 6)?,
            }),
            6 => Some(Self {
                a: 255,
                b: parse_byte(hex, 0)?,
                g: parse_byte(hex, 2)?,
                r: parse_byte(hex, 4)?,
            }),
            _ => None,
        }
    }

    /// Converts the color into KML `aabbggrr` string.
    pub fn to_kml_hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}{:02x}", self.a, self.b, self.g, self.r)
    }

    /// Returns a new color instance, copied from the base one but with the given alpha channel.
    pub fn with_alpha(&self, a: u8) -> Self {
        Self { a, ..*self }
    }

    /// Returns true if the color is fully transparent (`a == 0`).
    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Red component of the color in RGBA space.
    pub fn r(&self) -> u8 {
        self.r
    }

    /// Green component of the color in RGBA space.
    pub fn g(&self) -> u8 {
        self.g
    }

    /// Blue component of the color in RGBA space.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Opacity component of the color.
    pub fn a(&self) -> u8 {
        self.a
    }
}

fn parse_byte(hex: &str, offset: usize) -> Option<u8> {
    u8::from_str_radix(hex.get(offset..offset + 2)?, 16).ok()
}

/// Visual style of a geometry.
///
/// All the fields are optional: an unset field means "use the default of the consumer".
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Url of the icon used for points.
    pub icon_url: Option<String>,
    /// Scale of the icon.
    pub icon_scale: Option<f64>,
    /// Tint of the icon.
    pub icon_color: Option<StyleColor>,
    /// Rotation of the icon in degrees.
    pub icon_heading: Option<f64>,
    /// Color of lines and polygon outlines.
    pub stroke_color: Option<StyleColor>,
    /// Width of lines and polygon outlines in pixels.
    pub stroke_thickness: Option<f64>,
    /// Fill color of polygons.
    pub fill_color: Option<StyleColor>,
    /// Whether polygons are filled.
    pub fill_polygon: Option<bool>,
    /// Whether polygons are outlined.
    pub outline_polygon: Option<bool>,
}

impl ShapeStyle {
    /// Combines two styles. Fields set in `other` take precedence over the fields of `self`.
    pub fn merge(&self, other: &ShapeStyle) -> ShapeStyle {
        ShapeStyle {
            icon_url: other.icon_url.clone().or_else(|| self.icon_url.clone()),
            icon_scale: other.icon_scale.or(self.icon_scale),
            icon_color: other.icon_color.or(self.icon_color),
            icon_heading: other.icon_heading.or(self.icon_heading),
            stroke_color: other.stroke_color.or(self.stroke_color),
            stroke_thickness: other.stroke_thickness.or(self.stroke_thickness),
            fill_color: other.fill_color.or(self.fill_color),
            fill_polygon: other.fill_polygon.or(self.fill_polygon),
            outline_polygon: other.outline_polygon.or(self.outline_polygon),
        }
    }

    /// Whether polygons with this style are filled. Defaults to `true`.
    pub fn fills(&self) -> bool {
        self.fill_polygon.unwrap_or(true)
    }

    /// Whether polygons with this style are outlined. Defaults to `true`.
    pub fn outlines(&self) -> bool {
        self.outline_polygon.unwrap_or(true)
    }

    /// Returns true if no field of the style is set.
    pub fn is_empty(&self) -> bool {
        self == &ShapeStyle::default()
    }
}

/// Reference of a style in the [`Styles`] table of a dataset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StyleId(usize);

impl StyleId {
    /// Position of the style in the table.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Prefix of the keys generated for styles embedded directly into geometries.
pub const EMBEDDED_STYLE_PREFIX: &str = "embeddedStyle_";

/// Table of styles of a dataset. Geometries refer to the entries of the table with [`StyleId`]s.
///
/// Every style has a unique string key, that is preserved from the source document (e.g. KML style `id`) so that
/// writers can reproduce it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Styles {
    entries: Vec<(String, ShapeStyle)>,
    index: HashMap<String, usize>,
    embedded_count: usize,
}

impl Styles {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a style with the given key. If the key is already present, the style is replaced and the existing id
    /// is returned.
    pub fn insert(&mut self, key: impl Into<String>, style: ShapeStyle) -> StyleId {
        let key = key.into();
        if let Some(&index) = self.index.get(&key) {
            self.entries[index].1 = style;
            return StyleId(index);
        }

        let index = self.entries.len();
        self.index.insert(key.clone(), index);
        self.entries.push((key, style));
        StyleId(index)
    }

    /// Inserts a style that has no key in the source document, generating a key of the form `embeddedStyle_N`. The
    /// counter is local to this table.
    pub fn insert_embedded(&mut self, style: ShapeStyle) -> StyleId {
        loop {
            let key = format!("{EMBEDDED_STYLE_PREFIX}{}", self.embedded_count);
            self.embedded_count += 1;
            if !self.index.contains_key(&key) {
                return self.insert(key, style);
            }
        }
    }

    /// Returns the style by its id.
    pub fn get(&self, id: StyleId) -> Option<&ShapeStyle> {
        self.entries.get(id.0).map(|(_, style)| style)
    }

    /// Returns the key of the style.
    pub fn key(&self, id: StyleId) -> Option<&str> {
        self.entries.get(id.0).map(|(key, _)| key.as_str())
    }

    /// Finds the id of the style with the given key.
    pub fn find(&self, key: &str) -> Option<StyleId> {
        self.index.get(key).map(|&index| StyleId(index))
    }

    /// Returns the style with the given key.
    pub fn get_by_key(&self, key: &str) -> Option<&ShapeStyle> {
        self.find(key).and_then(|id| self.get(id))
    }

    /// Iterates over all styles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StyleId, &str, &ShapeStyle)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, (key, style))| (StyleId(index), key.as_str(), style))
    }

    /// Number of styles in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves all styles of `other` into this table. Styles whose key already exists in this table are not copied:
    /// the existing entry is kept. Generated `embeddedStyle_N` keys are an exception, since equal keys of two
    /// tables do not mean equal styles: a colliding embedded style gets a new generated key.
    ///
    /// Returns the mapping from the ids of `other` to the ids in this table, indexed by [`StyleId::index`].
    pub fn append(&mut self, other: Styles) -> Vec<StyleId> {
        other
            .entries
            .into_iter()
            .map(|(key, style)| match self.find(&key) {
                Some(_) if key.starts_with(EMBEDDED_STYLE_PREFIX) => self.insert_embedded(style),
                Some(id) => id,
                None => self.insert(key, style),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_serialization() {
        let hex = "#FF1000AA";
        let color = StyleColor::try_from_hex(hex).unwrap();
        assert_eq!(&color.to_hex(), hex);
        assert_eq!(StyleColor::try_from_hex("#FF1000").unwrap().a(), 255);
        assert!(StyleColor::try_from_hex("FF1000").is_none());
        assert!(StyleColor::try_from_hex("#FF10").is_none());
    }

    #[test]
    fn kml_colors() {
        let color = StyleColor::try_from_kml_hex("7f00ff00").unwrap();
        assert_eq!(color, StyleColor::rgba(0, 255, 0, 127));
        assert_eq!(color.to_kml_hex(), "7f00ff00");
        assert_eq!(
            StyleColor::try_from_kml_hex("ff0000ff").unwrap(),
            StyleColor::RED
        );
    }

    #[test]
    fn merge_prefers_other() {
        let base = ShapeStyle {
            stroke_color: Some(StyleColor::RED),
            stroke_thickness: Some(2.0),
            ..Default::default()
        };
        let over = ShapeStyle {
            stroke_color: Some(StyleColor::BLUE),
            fill_polygon: Some(false),
            ..Default::default()
        };

        let merged = base.merge(&over);
        assert_eq!(merged.stroke_color, Some(StyleColor::BLUE));
        assert_eq!(merged.stroke_thickness, Some(2.0));
        assert!(!merged.fills());
        assert!(merged.outlines());
    }

    #[test]
    fn embedded_keys_are_sequential() {
        let mut styles = Styles::new();
        let a = styles.insert_embedded(ShapeStyle::default());
        let b = styles.insert_embedded(ShapeStyle::default());
        assert_eq!(styles.key(a), Some("embeddedStyle_0"));
        assert_eq!(styles.key(b), Some("embeddedStyle_1"));
    }

    #[test]
    fn append_keeps_existing() {
        let mut first = Styles::new();
        let red = ShapeStyle {
            stroke_color: Some(StyleColor::RED),
            ..Default::default()
        };
        first.insert("a", red.clone());

        let mut second = Styles::new();
        second.insert("b", ShapeStyle::default());
        second.insert("a", ShapeStyle::default());

        let mapping = first.append(second);
        assert_eq!(mapping.len(), 2);
        assert_eq!(first.key(mapping[0]), Some("b"));
        assert_eq!(mapping[1], first.find("a").unwrap());
        assert_eq!(first.get_by_key("a"), Some(&red));
    }

    #[test]
    fn append_renames_colliding_embedded_styles() {
        let red = ShapeStyle {
            stroke_color: Some(StyleColor::RED),
            ..Default::default()
        };
        let blue = ShapeStyle {
            stroke_color: Some(StyleColor::BLUE),
            ..Default::default()
        };

        let mut first = Styles::new();
        first.insert_embedded(red.clone());
        let mut second = Styles::new();
        second.insert_embedded(blue.clone());

        let mapping = first.append(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.key(mapping[0]), Some("embeddedStyle_1"));
        assert_eq!(first.get(mapping[0]), Some(&blue));
        assert_eq!(first.get_by_key("embeddedStyle_0"), Some(&red));
    }
}
