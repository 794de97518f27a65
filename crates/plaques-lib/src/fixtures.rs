//! Small seeded plaques table for tests.
//!
//! The schema mirrors the analytic table's columns. Four rows cover the
//! interesting shapes: a fully populated plaque, one whose projected position
//! differs from the camera position, one with only camera coordinates and one
//! with nothing but an id.

use std::path::Path;

use rusqlite::Connection;

use crate::config::TableName;
use crate::error::Result;
use crate::repository::PlaqueRepository;
use crate::store::SqliteStore;

/// Identifiers of the seeded rows.
pub mod fixture_ids {
    pub const ANNE: &str = "plq-anne";
    pub const MULTATULI: &str = "plq-multatuli";
    pub const ANNO_1650: &str = "plq-1650";
    pub const BARE: &str = "plq-bare";
}

/// Table name used by the fixture.
pub const FIXTURE_TABLE: &str = "plaques";

const SCHEMA: &str = "
CREATE TABLE plaques (
    id TEXT NOT NULL PRIMARY KEY,
    text TEXT,
    confidence REAL,
    latitude REAL,
    longitude REAL,
    projected_latitude REAL,
    projected_longitude REAL,
    image_url TEXT,
    cropped_image_url TEXT,
    plaque_image_url TEXT,
    camera_bearing REAL,
    camera_pitch REAL,
    exif_latitude REAL,
    exif_longitude REAL,
    exif_altitude REAL,
    exif_camera_make TEXT,
    exif_camera_model TEXT,
    exif_image_width INTEGER,
    exif_image_height INTEGER,
    exif_captured_at TEXT,
    yolo_confidence REAL,
    yolo_bbox_x REAL,
    yolo_bbox_y REAL,
    yolo_bbox_width REAL,
    yolo_bbox_height REAL,
    yolo_image_width INTEGER,
    yolo_image_height INTEGER,
    google_vision_text TEXT,
    google_vision_confidence REAL,
    openai_text TEXT,
    openai_confidence REAL,
    claude_text TEXT,
    claude_confidence REAL,
    azure_text TEXT,
    azure_confidence REAL,
    ocr_consensus_score REAL,
    ocr_agreement_matrix TEXT,
    estimated_distance_m REAL,
    offset_bearing REAL,
    offset_direction TEXT,
    crop_x INTEGER,
    crop_y INTEGER,
    crop_width INTEGER,
    crop_height INTEGER,
    created_at TEXT
);
";

const SEED: &str = r#"
INSERT INTO plaques (
    id, text, confidence, latitude, longitude, projected_latitude, projected_longitude,
    image_url, cropped_image_url, plaque_image_url, camera_bearing, camera_pitch,
    exif_latitude, exif_longitude, exif_altitude, exif_camera_make, exif_camera_model,
    exif_image_width, exif_image_height, exif_captured_at,
    yolo_confidence, yolo_bbox_x, yolo_bbox_y, yolo_bbox_width, yolo_bbox_height,
    yolo_image_width, yolo_image_height,
    google_vision_text, google_vision_confidence, openai_text, openai_confidence,
    claude_text, claude_confidence, azure_text, azure_confidence,
    ocr_consensus_score, ocr_agreement_matrix,
    estimated_distance_m, offset_bearing, offset_direction,
    crop_x, crop_y, crop_width, crop_height, created_at
) VALUES (
    'plq-anne', 'Hier woonde Anne Frank', 0.95, 52.3751, 4.8838, 52.3752, 4.8840,
    'https://images.example.org/anne.jpg', 'https://images.example.org/anne-crop.jpg',
    'https://images.example.org/anne-plaque.jpg', 87.5, -3.0,
    52.3751, 4.8838, 2.1, 'Apple', 'iPhone 14 Pro', 4032, 3024, '2023-05-02T10:00:00Z',
    0.91, 1200.0, 800.0, 640.0, 320.0, 4032, 3024,
    'Hier woonde Anne Frank', 0.97, 'Hier woonde Anne Frank', 0.93,
    'Hier woonde Anne Frank', 0.95, NULL, NULL,
    0.96, '[[1.0,0.98],[0.98,1.0]]',
    12.5, 90.0, 'E',
    1180, 780, 680, 360, '2023-05-03T08:30:00Z'
);
INSERT INTO plaques (
    id, text, confidence, latitude, longitude, projected_latitude, projected_longitude,
    camera_bearing, created_at
) VALUES (
    'plq-multatuli', 'In dit huis woonde Multatuli', 0.85, 52.3700, 4.8800, 52.3785, 4.8865,
    12.0, '2023-06-11T14:00:00Z'
);
INSERT INTO plaques (id, text, confidence, latitude, longitude, created_at)
VALUES ('plq-1650', 'Gebouwd anno 1650', 0.55, 52.0907, 5.1214, '2023-07-20T09:15:00Z');
INSERT INTO plaques (id) VALUES ('plq-bare');
"#;

/// Create the plaques table on `conn` and insert the fixture rows.
pub fn seed(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute_batch(SEED)?;
    Ok(())
}

/// In-memory connection holding the seeded table.
pub fn fixture_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory sqlite");
    seed(&conn).expect("seed fixture table");
    conn
}

/// Repository over a fresh in-memory fixture.
pub fn fixture_repository() -> PlaqueRepository {
    PlaqueRepository::new(
        SqliteStore::from_connection(fixture_connection())
            .expect("register sqlite functions")
            .into(),
        TableName::new(FIXTURE_TABLE).expect("valid fixture table name"),
    )
}

/// Write the fixture to a database file at `path`.
pub fn write_fixture_db(path: &Path) -> Result<()> {
    let conn = Connection::open(path)?;
    seed(&conn)
}
