//! UDF on-disk structure toolkit
//!
//! Decodes raw UDF (ECMA 167 / OSTA) images into structure dumps and
//! synthesizes minimal valid-shaped images for use as fuzzing seeds
//!
//! Decoding never trusts the input: every field access is bounds checked
//! and corrupt structures degrade into partial output instead of failures

#![warn(missing_docs)]

pub mod reader;
pub mod udf;
