// File: corpus.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, trace};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ArgumentError;

/// File name suffix marking a benign request.
pub const WHITE_SUFFIX: &str = "white";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    White,
    Black,
}

impl Label {
    pub fn from_path(path: &Path) -> Self {
        if path.to_string_lossy().ends_with(WHITE_SUFFIX) {
            Label::White
        } else {
            Label::Black
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub path: PathBuf,
    pub label: Label,
}

impl TestCase {
    pub fn new(path: PathBuf) -> Self {
        let label = Label::from_path(&path);
        Self { path, label }
    }
}

/// Every regular file below `dir`, sorted by path. A plain file is a corpus of one.
pub fn collect(dir: &Path) -> Result<Vec<TestCase>, ArgumentError> {
    let unreadable = |source| ArgumentError::CorpusUnreadable {
        dir: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    if fs::metadata(dir).map_err(unreadable)?.is_file() {
        files.push(dir.to_path_buf());
    } else {
        walk(dir, &mut files).map_err(unreadable)?;
    }

    if files.is_empty() {
        return Err(ArgumentError::EmptyCorpus(dir.to_path_buf()));
    }

    files.sort();
    debug!("Collected {} request templates from {}", files.len(), dir.display());
    Ok(files.into_iter().map(TestCase::new).collect())
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, files)?;
        } else if file_type.is_file() || path.is_file() {
            trace!("Found template {}", path.display());
            files.push(path);
        }
    }
    Ok(())
}
