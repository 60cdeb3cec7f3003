//! One module per metadata source.

pub(crate) mod app_service;
pub(crate) mod aws;
pub(crate) mod azure;
pub(crate) mod gcp;
