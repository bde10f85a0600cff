//! Utility functions for the favicon resolver
//!
//! Currently this only hosts domain/host classification helpers; anything
//! that needs to reason about URL shape goes through here so the rules
//! stay in one place.

pub mod domain;

pub use domain::{domain_of, is_subdomain, normalize_url_scheme, parent_domain};
