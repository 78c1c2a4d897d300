//! Colors, palettes and per-feature coloring shared by both map tools.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    lib::errors::GisError,
    tools::vector::{
        table::{as_f64, join_key},
        FeatureTable,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub(crate) fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }
}

const NAMED: &[(&str, Rgb)] = &[
    ("black", Rgb(0, 0, 0)),
    ("white", Rgb(255, 255, 255)),
    ("gray", Rgb(128, 128, 128)),
    ("grey", Rgb(128, 128, 128)),
    ("red", Rgb(255, 0, 0)),
    ("green", Rgb(0, 128, 0)),
    ("blue", Rgb(0, 0, 255)),
    ("yellow", Rgb(255, 255, 0)),
    ("orange", Rgb(255, 165, 0)),
    ("purple", Rgb(128, 0, 128)),
    ("brown", Rgb(165, 42, 42)),
    ("pink", Rgb(255, 192, 203)),
    ("cyan", Rgb(0, 255, 255)),
    ("magenta", Rgb(255, 0, 255)),
    ("navy", Rgb(0, 0, 128)),
    ("teal", Rgb(0, 128, 128)),
    ("olive", Rgb(128, 128, 0)),
    ("darkgreen", Rgb(0, 100, 0)),
    ("lightblue", Rgb(173, 216, 230)),
    ("lightgreen", Rgb(144, 238, 144)),
];

const TAB10: [Rgb; 10] = [
    Rgb(0x1f, 0x77, 0xb4),
    Rgb(0xff, 0x7f, 0x0e),
    Rgb(0x2c, 0xa0, 0x2c),
    Rgb(0xd6, 0x27, 0x28),
    Rgb(0x94, 0x67, 0xbd),
    Rgb(0x8c, 0x56, 0x4b),
    Rgb(0xe3, 0x77, 0xc2),
    Rgb(0x7f, 0x7f, 0x7f),
    Rgb(0xbc, 0xbd, 0x22),
    Rgb(0x17, 0xbe, 0xcf),
];

const TAB20_LIGHT: [Rgb; 10] = [
    Rgb(0xae, 0xc7, 0xe8),
    Rgb(0xff, 0xbb, 0x78),
    Rgb(0x98, 0xdf, 0x8a),
    Rgb(0xff, 0x98, 0x96),
    Rgb(0xc5, 0xb0, 0xd5),
    Rgb(0xc4, 0x9c, 0x94),
    Rgb(0xf7, 0xb6, 0xd2),
    Rgb(0xc7, 0xc7, 0xc7),
    Rgb(0xdb, 0xdb, 0x8d),
    Rgb(0x9e, 0xda, 0xe5),
];

const VIRIDIS: [Rgb; 5] = [
    Rgb(0x44, 0x01, 0x54),
    Rgb(0x3b, 0x52, 0x8b),
    Rgb(0x21, 0x91, 0x8c),
    Rgb(0x5e, 0xc9, 0x62),
    Rgb(0xfd, 0xe7, 0x25),
];

const GREYS: [Rgb; 2] = [Rgb(0xff, 0xff, 0xff), Rgb(0, 0, 0)];

/// Color for the `index`-th layer when its style names none.
pub(crate) fn layer_color(index: usize) -> Rgb {
    TAB10[index % TAB10.len()]
}

/// Named color or `#rgb` / `#rrggbb`; `tab:blue` style names pick from tab10.
pub(crate) fn parse_color(raw: &str) -> Result<Rgb, GisError> {
    let name = raw.trim().to_ascii_lowercase();
    let unknown = || GisError::invalid_input(format!("unknown color '{raw}'"));
    if let Some(hex) = name.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(unknown());
        }
        let digits = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => return Err(unknown()),
        };
        let channel =
            |at: usize| u8::from_str_radix(&digits[at..at + 2], 16).map_err(|_| unknown());
        return Ok(Rgb(channel(0)?, channel(2)?, channel(4)?));
    }
    if let Some(tab) = name.strip_prefix("tab:") {
        const ORDER: [&str; 10] = [
            "blue", "orange", "green", "red", "purple", "brown", "pink", "gray", "olive", "cyan",
        ];
        return ORDER
            .iter()
            .position(|candidate| *candidate == tab)
            .map(|at| TAB10[at])
            .ok_or_else(unknown);
    }
    NAMED
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, rgb)| *rgb)
        .ok_or_else(unknown)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Palette {
    Tab10,
    Tab20,
    Viridis,
    Greys,
}

impl Palette {
    /// `None` picks viridis for numbers and tab20 for categories.
    pub(crate) fn parse(raw: Option<&str>, numeric: bool) -> Result<Self, GisError> {
        match raw.map(|name| name.trim().to_ascii_lowercase()).as_deref() {
            None if numeric => Ok(Self::Viridis),
            None => Ok(Self::Tab20),
            Some("tab10") => Ok(Self::Tab10),
            Some("tab20") => Ok(Self::Tab20),
            Some("viridis") => Ok(Self::Viridis),
            Some("greys" | "grays" | "gray") => Ok(Self::Greys),
            Some(other) => Err(GisError::invalid_input(format!(
                "unknown cmap '{other}'; use tab10, tab20, viridis or greys"
            ))),
        }
    }

    fn stops(self) -> Vec<Rgb> {
        match self {
            Self::Tab10 => TAB10.to_vec(),
            Self::Tab20 => TAB10.iter().zip(TAB20_LIGHT).flat_map(|(d, l)| [*d, l]).collect(),
            Self::Viridis => VIRIDIS.to_vec(),
            Self::Greys => GREYS.to_vec(),
        }
    }

    fn is_ramp(self) -> bool {
        matches!(self, Self::Viridis | Self::Greys)
    }

    /// Color at `t` in `[0, 1]`; qualitative palettes pick the nearest entry.
    pub(crate) fn sample(self, t: f64) -> Rgb {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (stops.len() - 1) as f64;
        if !self.is_ramp() {
            return stops[scaled.round() as usize];
        }
        let low = scaled.floor() as usize;
        let high = (low + 1).min(stops.len() - 1);
        stops[low].lerp(stops[high], scaled - low as f64)
    }

    /// Color of the `index`-th of `count` categories.
    pub(crate) fn category(self, index: usize, count: usize) -> Rgb {
        if self.is_ramp() {
            let t = if count > 1 { index as f64 / (count - 1) as f64 } else { 0.0 };
            return self.sample(t);
        }
        let stops = self.stops();
        stops[index % stops.len()]
    }
}

/// Per-feature colors (`None` for nulls) and the matching legend entries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnColors {
    pub colors: Vec<Option<Rgb>>,
    pub legend: Vec<(String, Rgb)>,
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Color every feature by `column`: numbers on a ramp, anything else by category.
pub(crate) fn column_colors(
    table: &FeatureTable,
    column: &str,
    cmap: Option<&str>,
) -> Result<ColumnColors, GisError> {
    let index = table.require_column(column)?;
    let values: Vec<&Value> = table.features.iter().map(|f| &f.values[index]).collect();
    let numeric = values
        .iter()
        .filter(|value| !value.is_null())
        .all(|value| value.is_number());
    let palette = Palette::parse(cmap, numeric)?;

    if numeric {
        let numbers: Vec<Option<f64>> = values.iter().map(|value| as_f64(value)).collect();
        let (low, high) = numbers.iter().flatten().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(low, high), v| (low.min(*v), high.max(*v)),
        );
        if low > high {
            return Ok(ColumnColors {
                colors: vec![None; values.len()],
                legend: Vec::new(),
            });
        }
        let span = high - low;
        let position = |v: f64| if span > 0.0 { (v - low) / span } else { 0.0 };
        return Ok(ColumnColors {
            colors: numbers
                .iter()
                .map(|v| v.map(|v| palette.sample(position(v))))
                .collect(),
            legend: vec![
                (format!("{column} = {low}"), palette.sample(0.0)),
                (format!("{column} = {high}"), palette.sample(position(high))),
            ],
        });
    }

    let mut categories: BTreeMap<String, String> = BTreeMap::new();
    for value in &values {
        if let Some(key) = join_key(value) {
            categories.entry(key).or_insert_with(|| display(value));
        }
    }
    let count = categories.len();
    let assigned: BTreeMap<&str, Rgb> = categories
        .keys()
        .enumerate()
        .map(|(at, key)| (key.as_str(), palette.category(at, count)))
        .collect();
    Ok(ColumnColors {
        colors: values
            .iter()
            .map(|value| join_key(value).and_then(|key| assigned.get(key.as_str()).copied()))
            .collect(),
        legend: categories
            .iter()
            .map(|(key, label)| (label.clone(), assigned[key.as_str()]))
            .collect(),
    })
}
