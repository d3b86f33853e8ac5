//! Input validation for API requests.
//!
//! This module provides validation functions for API request data,
//! ensuring all inputs meet the required format and constraints.
//!
//! For collecting multiple validation errors and returning them as an ApiError,
//! use the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use crate::db::{Coordinates, ListingForm, PriceInput};

use super::error::{ApiError, ValidationErrorBuilder};

lazy_static! {
    /// Deliberately loose: one @, no whitespace, a dot in the domain part
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

/// Validate a required free-text field with a maximum length
pub fn validate_required_text(value: &str, label: &str, max_len: usize) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} is required", label));
    }

    if trimmed.chars().count() > max_len {
        return Err(format!("{} is too long (max {} characters)", label, max_len));
    }

    Ok(())
}

/// Validate an optional free-text field
pub fn validate_optional_text(value: &Option<String>, label: &str, max_len: usize) -> Result<(), String> {
    if let Some(v) = value {
        if v.chars().count() > max_len {
            return Err(format!("{} is too long (max {} characters)", label, max_len));
        }
    }

    Ok(())
}

/// Validate coordinates picked on the map
pub fn validate_coordinates(coords: &Option<Coordinates>) -> Result<(), String> {
    if let Some(c) = coords {
        if !c.lat.is_finite() || !(-90.0..=90.0).contains(&c.lat) {
            return Err("Latitude must be between -90 and 90".to_string());
        }
        if !c.lng.is_finite() || !(-180.0..=180.0).contains(&c.lng) {
            return Err("Longitude must be between -180 and 180".to_string());
        }
    }

    Ok(())
}

/// Validate the price list of a listing form
pub fn validate_prices(prices: &[PriceInput]) -> Result<(), String> {
    if prices.is_empty() {
        return Err("At least one price is required".to_string());
    }

    let mut seen = HashSet::new();
    for price in prices {
        if price.amount <= 0 {
            return Err(format!("The {} price must be greater than 0", price.period));
        }
        if !seen.insert(price.period) {
            return Err(format!("The {} price is listed more than once", price.period));
        }
    }

    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("Password must contain both letters and digits".to_string());
    }

    Ok(())
}

/// Validate a UUID string
pub fn validate_uuid(id: &str, field_name: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err(format!("{} is required", field_name));
    }

    if uuid::Uuid::parse_str(id).is_err() {
        return Err(format!("Invalid {} format", field_name));
    }

    Ok(())
}

/// Validate a listing create/update form
pub fn validate_listing_form(form: &ListingForm) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_required_text(&form.name, "Name", 120) {
        errors.add("name", e);
    }

    if let Err(e) = validate_required_text(&form.address, "Address", 500) {
        errors.add("address", e);
    }

    if let Err(e) = validate_required_text(&form.area, "Area", 120) {
        errors.add("area", e);
    }

    if let Err(e) = validate_coordinates(&form.coordinates) {
        errors.add("coordinates", e);
    }

    if let Err(e) = validate_optional_text(&form.rules, "Rules", 5000) {
        errors.add("rules", e);
    }

    if let Err(e) = validate_optional_text(&form.notes, "Notes", 5000) {
        errors.add("notes", e);
    }

    if let Err(e) = validate_prices(&form.prices) {
        errors.add("prices", e);
    }

    errors.finish()
}
