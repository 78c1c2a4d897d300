//! GAL (neighbour lists) and GWT (weighted links) weights files.

use std::{collections::HashMap, fmt::Write as _, path::Path};

use serde_json::Value;

use crate::lib::{errors::GisError, fs};

use super::weights::{id_label, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    Gal,
    Gwt,
}

impl WeightsFormat {
    pub fn parse(raw: &str) -> Result<Self, GisError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gal" => Ok(Self::Gal),
            "gwt" => Ok(Self::Gwt),
            other => Err(GisError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, GisError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::parse(extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gal => "gal",
            Self::Gwt => "gwt",
        }
    }
}

pub fn render(weights: &Weights, format: WeightsFormat) -> String {
    let mut out = String::new();
    match format {
        WeightsFormat::Gal => {
            let _ = writeln!(out, "{}", weights.n());
            for (row, links) in weights.neighbors.iter().enumerate() {
                let _ = writeln!(out, "{} {}", id_label(&weights.ids[row]), links.len());
                let line: Vec<String> = links
                    .iter()
                    .map(|&j| id_label(&weights.ids[j]))
                    .collect();
                let _ = writeln!(out, "{}", line.join(" "));
            }
        }
        WeightsFormat::Gwt => {
            let _ = writeln!(out, "0 {} unknown unknown", weights.n());
            let rows = weights.neighbors.iter().zip(&weights.weights);
            for (row, (links, values)) in rows.enumerate() {
                for (&j, w) in links.iter().zip(values) {
                    let _ = writeln!(
                        out,
                        "{} {} {}",
                        id_label(&weights.ids[row]),
                        id_label(&weights.ids[j]),
                        w
                    );
                }
            }
        }
    }
    out
}

pub fn write(weights: &Weights, path: &Path, format: WeightsFormat) -> Result<(), GisError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| GisError::io(parent, err))?;
    }
    fs::write_text(path, &render(weights, format))
}

fn parse_id(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Numbers rows in order of first appearance.
#[derive(Default)]
struct IdIndex {
    ids: Vec<Value>,
    rows: HashMap<String, usize>,
}

impl IdIndex {
    fn row(&mut self, raw: &str) -> usize {
        if let Some(&row) = self.rows.get(raw) {
            return row;
        }
        let row = self.ids.len();
        self.ids.push(parse_id(raw));
        self.rows.insert(raw.to_string(), row);
        row
    }
}

fn malformed(path: &Path, detail: &str) -> GisError {
    GisError::statistics(format!(
        "malformed weights file {}: {detail}",
        path.display()
    ))
}

fn header_count(line: &str, path: &Path) -> Result<usize, GisError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let raw = match tokens.as_slice() {
        [n] => n,
        [_, n, ..] => n,
        [] => return Err(malformed(path, "empty header")),
    };
    raw.parse()
        .map_err(|_| malformed(path, "header does not hold the observation count"))
}

fn link(links: &mut Vec<Vec<(usize, f64)>>, from: usize, to: usize, weight: f64) {
    let needed = from.max(to) + 1;
    if links.len() < needed {
        links.resize(needed, Vec::new());
    }
    links[from].push((to, weight));
}

pub fn parse(text: &str, format: WeightsFormat, path: &Path) -> Result<Weights, GisError> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines.next().ok_or_else(|| malformed(path, "file is empty"))?;
    let n = header_count(header, path)?;
    let mut index = IdIndex::default();
    let mut links: Vec<Vec<(usize, f64)>> = Vec::new();
    match format {
        WeightsFormat::Gal => {
            while let Some(line) = lines.next() {
                let mut tokens = line.split_whitespace();
                let (Some(id), Some(count)) = (tokens.next(), tokens.next()) else {
                    return Err(malformed(path, "expected '<id> <count>'"));
                };
                let count: usize = count
                    .parse()
                    .map_err(|_| malformed(path, "neighbour count is not an integer"))?;
                let from = index.row(id);
                let neighbours: Vec<&str> = if count == 0 {
                    Vec::new()
                } else {
                    lines
                        .next()
                        .ok_or_else(|| malformed(path, "missing neighbour line"))?
                        .split_whitespace()
                        .collect()
                };
                if neighbours.len() != count {
                    return Err(malformed(path, "neighbour count does not match the list"));
                }
                for neighbour in neighbours {
                    let to = index.row(neighbour);
                    link(&mut links, from, to, 1.0);
                }
            }
        }
        WeightsFormat::Gwt => {
            for line in lines {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                let [from, to, weight] = tokens.as_slice() else {
                    return Err(malformed(path, "expected '<id> <id> <weight>'"));
                };
                let weight: f64 = weight
                    .parse()
                    .map_err(|_| malformed(path, "weight is not a number"))?;
                let from = index.row(from);
                let to = index.row(to);
                link(&mut links, from, to, weight);
            }
        }
    }
    if index.ids.len() != n {
        return Err(malformed(
            path,
            &format!("header declares {n} observations but {} were found", index.ids.len()),
        ));
    }
    links.resize(n, Vec::new());
    let mut neighbors = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for mut row in links {
        row.sort_by_key(|(j, _)| *j);
        neighbors.push(row.iter().map(|(j, _)| *j).collect());
        weights.push(row.iter().map(|(_, w)| *w).collect());
    }
    Weights::new(index.ids, neighbors, weights)
}

pub fn read(path: &Path) -> Result<Weights, GisError> {
    let format = WeightsFormat::from_path(path)?;
    let text = fs::read_text(path)?;
    parse(&text, format, path)
}
