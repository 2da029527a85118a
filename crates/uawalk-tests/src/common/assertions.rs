// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Assertion Helpers

use std::collections::BTreeSet;
use std::path::Path;

use uawalk_opcua::PathRecord;

/// Reads a CSV result file, asserting the header, and returns its rows.
pub fn read_csv_rows(path: &Path) -> Vec<(String, String)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .unwrap_or_else(|e| panic!("failed to open {}: {}", path.display(), e));

    let headers = reader.headers().expect("CSV header").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["PATH", "NAME"]);

    reader
        .records()
        .map(|row| {
            let row = row.expect("CSV row");
            assert_eq!(row.len(), 2, "row must have two fields: {:?}", row);
            (row[0].to_string(), row[1].to_string())
        })
        .collect()
}

/// Collects records into a `(path, name)` set.
pub fn record_set(records: &[PathRecord]) -> BTreeSet<(String, String)> {
    records
        .iter()
        .map(|r| (r.path.clone(), r.name.clone()))
        .collect()
}

/// Builds a `(path, name)` set from literals.
pub fn expected_set(rows: &[(&str, &str)]) -> BTreeSet<(String, String)> {
    rows.iter()
        .map(|(path, name)| (path.to_string(), name.to_string()))
        .collect()
}

/// Asserts every record's path ends with `/` followed by its name.
pub fn assert_paths_end_with_names(records: &[PathRecord]) {
    for record in records {
        assert!(
            record.path.starts_with('/'),
            "path must be absolute: {}",
            record.path
        );
        assert!(
            record.path.ends_with(&format!("/{}", record.name)),
            "path {} must end with name {}",
            record.path,
            record.name
        );
    }
}
