//! Database seeders for built-in data
//!
//! The amenity (fasilitas) catalog ships with the facilities most kos
//! listings advertise. Admins can extend it at runtime.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Seed the built-in amenity catalog (runs on every startup to add new entries)
pub async fn seed_amenities(pool: &SqlitePool) -> Result<()> {
    info!("Seeding built-in amenities...");

    // Format: (id, name, category)
    let amenities: Vec<(&str, &str, &str)> = vec![
        // ==================== ROOM ====================
        ("room-ac", "AC", "room"),
        ("room-fan", "Kipas Angin", "room"),
        ("room-bed", "Kasur", "room"),
        ("room-wardrobe", "Lemari", "room"),
        ("room-desk", "Meja Belajar", "room"),
        ("room-window", "Jendela", "room"),
        ("room-tv", "TV", "room"),
        // ==================== BATHROOM ====================
        ("bath-ensuite", "Kamar Mandi Dalam", "bathroom"),
        ("bath-shared", "Kamar Mandi Luar", "bathroom"),
        ("bath-water-heater", "Water Heater", "bathroom"),
        ("bath-shower", "Shower", "bathroom"),
        // ==================== SHARED ====================
        ("shared-wifi", "WiFi", "shared"),
        ("shared-kitchen", "Dapur Bersama", "shared"),
        ("shared-laundry", "Laundry", "shared"),
        ("shared-fridge", "Kulkas Bersama", "shared"),
        ("shared-dispenser", "Dispenser", "shared"),
        ("shared-cleaning", "Layanan Kebersihan", "shared"),
        // ==================== PARKING ====================
        ("parking-motorbike", "Parkir Motor", "parking"),
        ("parking-car", "Parkir Mobil", "parking"),
        // ==================== SECURITY ====================
        ("security-cctv", "CCTV", "security"),
        ("security-guard", "Penjaga Kos", "security"),
        ("security-access-card", "Akses Kartu", "security"),
    ];

    let mut inserted = 0u64;
    for (id, name, category) in &amenities {
        let result = sqlx::query(
            r#"
            INSERT INTO amenities (id, name, category) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, category = excluded.category
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(category)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    info!(count = amenities.len(), affected = inserted, "Amenity catalog seeded");
    Ok(())
}
