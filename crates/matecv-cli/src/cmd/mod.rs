// crates/matecv-cli/src/cmd/mod.rs

pub mod convert;
pub mod inspect;
