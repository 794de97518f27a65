//! Plaque observation records and the row-to-document mapping.
//!
//! Stores return flat rows keyed by column name. [`Plaque::from_row`] lifts a
//! row into the nested document served by every endpoint. Each optional
//! nested object is built only from its own source columns and serializes as
//! `null` when every one of those columns is null.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};

/// A single result row: column name to JSON value, in select order.
pub type Row = Map<String, Value>;

/// Text reported when no recognition result is stored.
pub const TEXT_PLACEHOLDER: &str = "No text detected";

/// A plaque observation shaped for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plaque {
    pub id: String,
    pub text: String,
    pub confidence: f64,
    pub location: Option<Location>,
    pub camera: Option<Camera>,
    pub images: Option<Images>,
    pub exif: Option<Exif>,
    pub detection: Option<Detection>,
    pub ocr: Option<Ocr>,
    pub geometry: Option<Geometry>,
    pub created_at: Option<String>,
}

/// Where a display location was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Plaque position projected from the camera pose and distance.
    Projected,
    /// Raw position of the camera.
    Camera,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub source: LocationSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Images {
    pub original: Option<String>,
    pub cropped: Option<String>,
    pub plaque: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exif {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub captured_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i64,
    pub height: i64,
}

/// Object-detector output for the plaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: Option<f64>,
    pub bounding_box: Option<BoundingBox>,
    pub image_size: Option<Dimensions>,
}

/// One OCR/vision service's reading of the plaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrReading {
    pub text: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrServices {
    pub google_vision: Option<OcrReading>,
    pub openai: Option<OcrReading>,
    pub claude: Option<OcrReading>,
    pub azure: Option<OcrReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub score: Option<f64>,
    pub agreement_matrix: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ocr {
    pub services: Option<OcrServices>,
    pub consensus: Option<Consensus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Camera-to-plaque geometry derived during processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub estimated_distance_m: Option<f64>,
    pub offset_bearing: Option<f64>,
    pub offset_direction: Option<String>,
    pub crop: Option<CropRect>,
}

impl Plaque {
    /// Shape a flat result row into a plaque document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingId`] when the row has no usable `id`.
    pub fn from_row(row: &Row) -> Result<Self> {
        let id = match row.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::MissingId),
        };

        Ok(Self {
            id,
            text: string(row, "text").unwrap_or_else(|| TEXT_PLACEHOLDER.to_string()),
            confidence: float(row, "confidence").unwrap_or(0.0),
            location: location(row),
            camera: camera(row),
            images: images(row),
            exif: exif(row),
            detection: detection(row),
            ocr: ocr(row),
            geometry: geometry(row),
            created_at: string(row, "created_at"),
        })
    }

    /// Shape every row, failing on the first malformed one.
    pub fn from_rows(rows: &[Row]) -> Result<Vec<Self>> {
        rows.iter().map(Self::from_row).collect()
    }
}

fn location(row: &Row) -> Option<Location> {
    let pair = |lat: &str, lon: &str| Some((float(row, lat)?, float(row, lon)?));

    if let Some((latitude, longitude)) = pair("projected_latitude", "projected_longitude") {
        return Some(Location {
            latitude,
            longitude,
            source: LocationSource::Projected,
        });
    }

    pair("latitude", "longitude").map(|(latitude, longitude)| Location {
        latitude,
        longitude,
        source: LocationSource::Camera,
    })
}

fn camera(row: &Row) -> Option<Camera> {
    let camera = Camera {
        latitude: float(row, "latitude"),
        longitude: float(row, "longitude"),
        bearing: float(row, "camera_bearing"),
        pitch: float(row, "camera_pitch"),
    };
    let any = camera.latitude.is_some()
        || camera.longitude.is_some()
        || camera.bearing.is_some()
        || camera.pitch.is_some();
    any.then_some(camera)
}

fn images(row: &Row) -> Option<Images> {
    let images = Images {
        original: string(row, "image_url"),
        cropped: string(row, "cropped_image_url"),
        plaque: string(row, "plaque_image_url"),
    };
    let any = images.original.is_some() || images.cropped.is_some() || images.plaque.is_some();
    any.then_some(images)
}

fn exif(row: &Row) -> Option<Exif> {
    let exif = Exif {
        latitude: float(row, "exif_latitude"),
        longitude: float(row, "exif_longitude"),
        altitude: float(row, "exif_altitude"),
        camera_make: string(row, "exif_camera_make"),
        camera_model: string(row, "exif_camera_model"),
        width: int(row, "exif_image_width"),
        height: int(row, "exif_image_height"),
        captured_at: string(row, "exif_captured_at"),
    };
    let any = exif.latitude.is_some()
        || exif.longitude.is_some()
        || exif.altitude.is_some()
        || exif.camera_make.is_some()
        || exif.camera_model.is_some()
        || exif.width.is_some()
        || exif.height.is_some()
        || exif.captured_at.is_some();
    any.then_some(exif)
}

fn detection(row: &Row) -> Option<Detection> {
    let bounding_box = match (
        float(row, "yolo_bbox_x"),
        float(row, "yolo_bbox_y"),
        float(row, "yolo_bbox_width"),
        float(row, "yolo_bbox_height"),
    ) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(BoundingBox {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    };
    let image_size = match (int(row, "yolo_image_width"), int(row, "yolo_image_height")) {
        (Some(width), Some(height)) => Some(Dimensions { width, height }),
        _ => None,
    };
    let confidence = float(row, "yolo_confidence");

    if confidence.is_none() && bounding_box.is_none() && image_size.is_none() {
        return None;
    }
    Some(Detection {
        confidence,
        bounding_box,
        image_size,
    })
}

fn reading(row: &Row, service: &str) -> Option<OcrReading> {
    let text = string(row, &format!("{}_text", service));
    let confidence = float(row, &format!("{}_confidence", service));
    if text.is_none() && confidence.is_none() {
        return None;
    }
    Some(OcrReading { text, confidence })
}

fn ocr(row: &Row) -> Option<Ocr> {
    let services = OcrServices {
        google_vision: reading(row, "google_vision"),
        openai: reading(row, "openai"),
        claude: reading(row, "claude"),
        azure: reading(row, "azure"),
    };
    let services = (services.google_vision.is_some()
        || services.openai.is_some()
        || services.claude.is_some()
        || services.azure.is_some())
    .then_some(services);

    let consensus = Consensus {
        score: float(row, "ocr_consensus_score"),
        agreement_matrix: agreement_matrix(row),
    };
    let consensus = (consensus.score.is_some() || consensus.agreement_matrix.is_some())
        .then_some(consensus);

    if services.is_none() && consensus.is_none() {
        return None;
    }
    Some(Ocr {
        services,
        consensus,
    })
}

fn agreement_matrix(row: &Row) -> Option<Value> {
    match row.get("ocr_agreement_matrix")? {
        Value::Null => None,
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "discarding unparsable ocr_agreement_matrix");
                None
            }
        },
        other => Some(other.clone()),
    }
}

fn geometry(row: &Row) -> Option<Geometry> {
    let crop = match (
        int(row, "crop_x"),
        int(row, "crop_y"),
        int(row, "crop_width"),
        int(row, "crop_height"),
    ) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(CropRect {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    };
    let geometry = Geometry {
        estimated_distance_m: float(row, "estimated_distance_m"),
        offset_bearing: float(row, "offset_bearing"),
        offset_direction: string(row, "offset_direction"),
        crop,
    };
    let any = geometry.estimated_distance_m.is_some()
        || geometry.offset_bearing.is_some()
        || geometry.offset_direction.is_some()
        || geometry.crop.is_some();
    any.then_some(geometry)
}

// Column accessors. BigQuery hands back numbers as strings and SQLite may
// hold integers in REAL columns, so both are accepted.

fn float(row: &Row, column: &str) -> Option<f64> {
    let value = match row.get(column)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn int(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn string(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
