//! Best-effort counts of optional map metadata: object placements under
//! `objects/`, `placements/`, `wmo/` and `m2/`, and `anchors/landmarks.csv`.
//!
//! Unreadable files count as empty; nothing here can fail a build.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

const PLACEMENT_DIRS: [&str; 4] = ["objects", "placements", "wmo", "m2"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObjectCounts {
    pub source_files: usize,
    pub entries: usize,
    pub wmo: usize,
    pub m2: usize,
}

impl ObjectCounts {
    fn add(&mut self, other: ObjectCounts) {
        self.source_files += other.source_files;
        self.entries += other.entries;
        self.wmo += other.wmo;
        self.m2 += other.m2;
    }

    fn tally_kind(&mut self, kind: &str) {
        match kind.to_ascii_lowercase().as_str() {
            "wmo" => self.wmo += 1,
            "m2" => self.m2 += 1,
            _ => {}
        }
    }
}

fn files_with_ext(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(ext)))
        .collect();
    out.sort();
    out
}

/// A list of rows tagged by `type` (or `kind`), or an object holding
/// `objects`, `wmo` and/or `m2` lists.
fn count_json(path: &Path) -> ObjectCounts {
    let mut out = ObjectCounts::default();
    let payload: Value = match fs::read_to_string(path).map(|s| serde_json::from_str(&s)) {
        Ok(Ok(v)) => v,
        _ => {
            debug!("unreadable placement file {}", path.display());
            return out;
        }
    };
    match payload {
        Value::Array(rows) => {
            out.entries = rows.len();
            for row in rows.iter().filter_map(Value::as_object) {
                let kind = row.get("type").or_else(|| row.get("kind"));
                if let Some(kind) = kind.and_then(Value::as_str) {
                    out.tally_kind(kind);
                }
            }
        }
        Value::Object(map) => {
            let len = |key: &str| map.get(key).and_then(Value::as_array).map(Vec::len);
            if let Some(n) = len("objects") {
                out.entries += n;
            }
            if let Some(n) = len("wmo") {
                out.wmo += n;
                out.entries += n;
            }
            if let Some(n) = len("m2") {
                out.m2 += n;
                out.entries += n;
            }
        }
        _ => {}
    }
    out
}

fn count_csv(path: &Path) -> ObjectCounts {
    let mut out = ObjectCounts::default();
    let Ok(mut reader) = csv::Reader::from_path(path) else {
        return out;
    };
    let kind_col = match reader.headers() {
        Ok(h) => h.iter().position(|c| c == "type").or_else(|| h.iter().position(|c| c == "kind")),
        Err(_) => return out,
    };
    for record in reader.records() {
        let Ok(record) = record else {
            debug!("malformed row in {}", path.display());
            return ObjectCounts::default();
        };
        out.entries += 1;
        if let Some(kind) = kind_col.and_then(|i| record.get(i)) {
            out.tally_kind(kind);
        }
    }
    out
}

/// Totals over every placement file; `source_files` counts every JSON and
/// CSV file found, readable or not.
pub fn count_object_placements(map_dir: &Path, warnings: &mut Vec<String>) -> ObjectCounts {
    let roots: Vec<PathBuf> = PLACEMENT_DIRS.iter().map(|d| map_dir.join(d)).filter(|p| p.is_dir()).collect();
    if roots.is_empty() {
        let msg = "no objects/, placements/, wmo/ or m2/ directory; object placements not counted".to_string();
        warn!("{msg}");
        warnings.push(msg);
        return ObjectCounts::default();
    }
    let mut total = ObjectCounts::default();
    for root in &roots {
        for path in files_with_ext(root, "json") {
            total.add(ObjectCounts { source_files: 1, ..count_json(&path) });
        }
        for path in files_with_ext(root, "csv") {
            total.add(ObjectCounts { source_files: 1, ..count_csv(&path) });
        }
    }
    total
}

/// Row count of `anchors/landmarks.csv`, 0 when absent or unreadable.
pub fn count_anchors(map_dir: &Path, warnings: &mut Vec<String>) -> usize {
    let path = map_dir.join("anchors").join("landmarks.csv");
    if !path.exists() {
        let msg = format!("{} not found; no anchors loaded", path.display());
        warn!("{msg}");
        warnings.push(msg);
        return 0;
    }
    match csv::Reader::from_path(&path) {
        Ok(mut reader) => reader.records().filter(|r| r.is_ok()).count(),
        Err(e) => {
            let msg = format!("cannot read {}: {e}", path.display());
            warn!("{msg}");
            warnings.push(msg);
            0
        }
    }
}
