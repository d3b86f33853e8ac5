use anyhow::{Context, Result};
use std::path::Path;

use crate::db::{Coordinates, PricePeriod};

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Format an amount of rupiah with dot thousand separators, e.g. `Rp 1.500.000`
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// Price with its billing period, e.g. `Rp 1.500.000 / bulan`
pub fn format_price(amount: i64, period: PricePeriod) -> String {
    let unit = match period {
        PricePeriod::Weekly => "minggu",
        PricePeriod::Monthly => "bulan",
        PricePeriod::Yearly => "tahun",
    };
    format!("{} / {}", format_rupiah(amount), unit)
}

pub fn format_coordinates(coords: &Coordinates) -> String {
    format!("{:.6}, {:.6}", coords.lat, coords.lng)
}
