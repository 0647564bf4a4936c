// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::new_without_default)]

pub mod aggregate;
pub mod calibrate;
pub mod cli;
pub mod codec;
pub mod config;
pub mod connection;
pub mod corpus;
pub mod error;
pub mod pool;
pub mod replay;
pub mod report;
pub mod scan;
