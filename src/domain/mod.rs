//! Core domain types and logic.

pub mod observation;
pub mod bar;
pub mod cusum;
pub mod builder;
pub mod validator;
pub mod summary;
pub mod config_validation;
pub mod error;
