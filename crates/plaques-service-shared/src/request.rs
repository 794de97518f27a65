//! Request types and validation for HTTP endpoints.
//!
//! Query parameters arrive as raw strings so that malformed numbers are
//! reported through [`ApiError`] like every other validation failure. Blank
//! values are treated as absent.

use serde::{Deserialize, Serialize};

use plaques_lib::{Filter, GeoBounds, Page};

use crate::ApiError;

/// Largest page a caller may request.
pub const MAX_LIMIT: u32 = 1000;

/// Validation trait for request types.
///
/// Implementations should validate all fields and return an `ApiError` for
/// invalid input.
pub trait Validate {
    /// Validate the request, returning an error if invalid.
    ///
    /// The `request_id` is echoed in any returned `ApiError`.
    ///
    /// Returns a boxed `ApiError` to avoid large `Result::Err` variants.
    fn validate(&self, request_id: &str) -> Result<(), Box<ApiError>>;
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn bad_request(message: String, request_id: &str) -> Box<ApiError> {
    Box::new(ApiError::bad_request(message, request_id))
}

/// Request for a single plaque.
///
/// The id comes from the `id` query parameter, or from the trailing path
/// segment of `/api/v1/detail/{id}` when the query parameter is blank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailRequest {
    #[serde(default)]
    pub id: Option<String>,
}

impl DetailRequest {
    /// Fill in the id from the path when the query string did not supply one.
    pub fn with_path_id(mut self, path_id: impl Into<String>) -> Self {
        if present(&self.id).is_none() {
            self.id = Some(path_id.into());
        }
        self
    }

    /// The trimmed id, if one was supplied.
    pub fn id(&self) -> Option<&str> {
        present(&self.id)
    }
}

impl Validate for DetailRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ApiError>> {
        if self.id().is_none() {
            return Err(bad_request(
                "The 'id' parameter is required and cannot be empty".to_string(),
                request_id,
            ));
        }
        Ok(())
    }
}

/// Paging and filter parameters shared by the list and search endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub offset: Option<String>,
    #[serde(default)]
    pub confidence_threshold: Option<String>,
    #[serde(default)]
    pub north: Option<String>,
    #[serde(default)]
    pub south: Option<String>,
    #[serde(default)]
    pub east: Option<String>,
    #[serde(default)]
    pub west: Option<String>,
}

impl ListRequest {
    /// Parse `limit` (1..=1000, default 100) and `offset` (default 0).
    pub fn page(&self, request_id: &str) -> Result<Page, Box<ApiError>> {
        let mut page = Page::default();

        if let Some(raw) = present(&self.limit) {
            page.limit = raw
                .parse::<u32>()
                .ok()
                .filter(|limit| (1..=MAX_LIMIT).contains(limit))
                .ok_or_else(|| {
                    bad_request(
                        format!(
                            "The 'limit' parameter must be an integer between 1 and {}",
                            MAX_LIMIT
                        ),
                        request_id,
                    )
                })?;
        }

        if let Some(raw) = present(&self.offset) {
            page.offset = raw.parse::<u32>().map_err(|_| {
                bad_request(
                    "The 'offset' parameter must be a non-negative integer".to_string(),
                    request_id,
                )
            })?;
        }

        Ok(page)
    }

    /// Parse `confidence_threshold` and the optional bounding box.
    pub fn filter(&self, request_id: &str) -> Result<Filter, Box<ApiError>> {
        let min_confidence = match present(&self.confidence_threshold) {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .ok()
                    .filter(|c| (0.0..=1.0).contains(c))
                    .ok_or_else(|| {
                        bad_request(
                            "The 'confidence_threshold' parameter must be a number between 0 and 1"
                                .to_string(),
                            request_id,
                        )
                    })?,
            ),
            None => None,
        };

        Ok(Filter {
            min_confidence,
            bbox: self.bbox(request_id)?,
        })
    }

    fn bbox(&self, request_id: &str) -> Result<Option<GeoBounds>, Box<ApiError>> {
        let sides = [
            ("north", present(&self.north)),
            ("south", present(&self.south)),
            ("east", present(&self.east)),
            ("west", present(&self.west)),
        ];
        let given = sides.iter().filter(|(_, v)| v.is_some()).count();
        if given == 0 {
            return Ok(None);
        }
        if given < sides.len() {
            return Err(bad_request(
                "A bounding box requires all of 'north', 'south', 'east' and 'west'".to_string(),
                request_id,
            ));
        }

        let coordinate = |name: &str, raw: Option<&str>, bound: f64| {
            raw.and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite() && v.abs() <= bound)
                .ok_or_else(|| {
                    bad_request(
                        format!(
                            "The '{}' parameter must be a number between -{} and {}",
                            name, bound, bound
                        ),
                        request_id,
                    )
                })
        };

        let bounds = GeoBounds {
            north: coordinate("north", sides[0].1, 90.0)?,
            south: coordinate("south", sides[1].1, 90.0)?,
            east: coordinate("east", sides[2].1, 180.0)?,
            west: coordinate("west", sides[3].1, 180.0)?,
        };

        if bounds.south > bounds.north {
            return Err(bad_request(
                "The 'south' parameter must not be greater than 'north'".to_string(),
                request_id,
            ));
        }

        Ok(Some(bounds))
    }
}

impl Validate for ListRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ApiError>> {
        self.page(request_id)?;
        self.filter(request_id)?;
        Ok(())
    }
}

/// Request for a text search.
///
/// The search text is taken from `text`, then `q`, then `plaque_text`; the
/// first non-blank value wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub plaque_text: Option<String>,
    #[serde(flatten)]
    pub window: ListRequest,
}

impl SearchRequest {
    /// The effective search text, trimmed.
    pub fn text(&self) -> Option<&str> {
        present(&self.text)
            .or_else(|| present(&self.q))
            .or_else(|| present(&self.plaque_text))
    }
}

impl Validate for SearchRequest {
    fn validate(&self, request_id: &str) -> Result<(), Box<ApiError>> {
        if self.text().is_none() {
            return Err(bad_request(
                "A search text is required in 'text', 'q' or 'plaque_text'".to_string(),
                request_id,
            ));
        }
        self.window.validate(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(pairs: &[(&str, &str)]) -> ListRequest {
        let mut request = ListRequest::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "limit" => request.limit = value,
                "offset" => request.offset = value,
                "confidence_threshold" => request.confidence_threshold = value,
                "north" => request.north = value,
                "south" => request.south = value,
                "east" => request.east = value,
                "west" => request.west = value,
                other => panic!("unexpected key {}", other),
            }
        }
        request
    }

    #[test]
    fn test_detail_requires_id() {
        let request = DetailRequest::default();
        let err = request.validate("req-1").unwrap_err();
        assert_eq!(err.status().as_u16(), 400);
        assert!(err.message.contains("'id'"));

        let blank = DetailRequest {
            id: Some("   ".to_string()),
        };
        assert!(blank.validate("req-1").is_err());
    }

    #[test]
    fn test_detail_query_id_wins_over_path() {
        let request = DetailRequest {
            id: Some("from-query".to_string()),
        }
        .with_path_id("from-path");
        assert_eq!(request.id(), Some("from-query"));

        let request = DetailRequest {
            id: Some("".to_string()),
        }
        .with_path_id("from-path");
        assert_eq!(request.id(), Some("from-path"));
    }

    #[test]
    fn test_page_defaults() {
        let page = list(&[]).page("req").unwrap();
        assert_eq!(page, Page { limit: 100, offset: 0 });

        let page = list(&[("limit", ""), ("offset", " ")]).page("req").unwrap();
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(
            list(&[("limit", "1000"), ("offset", "40")]).page("req").unwrap(),
            Page {
                limit: 1000,
                offset: 40
            }
        );
        assert!(list(&[("limit", "0")]).page("req").is_err());
        assert!(list(&[("limit", "1001")]).page("req").is_err());
        assert!(list(&[("limit", "ten")]).page("req").is_err());
        assert!(list(&[("offset", "-1")]).page("req").is_err());
    }

    #[test]
    fn test_confidence_threshold_range() {
        let filter = list(&[("confidence_threshold", "0.75")]).filter("req").unwrap();
        assert_eq!(filter.min_confidence, Some(0.75));

        assert!(list(&[("confidence_threshold", "1.5")]).filter("req").is_err());
        assert!(list(&[("confidence_threshold", "-0.1")]).filter("req").is_err());
        assert!(list(&[("confidence_threshold", "NaN")]).filter("req").is_err());
    }

    #[test]
    fn test_bbox_all_or_nothing() {
        let err = list(&[("north", "53"), ("south", "52")])
            .filter("req-bbox")
            .unwrap_err();
        assert!(err.message.contains("bounding box"));
        assert_eq!(err.request_id, "req-bbox");

        let filter = list(&[("north", "53"), ("south", "52"), ("east", "5"), ("west", "4")])
            .filter("req")
            .unwrap();
        assert_eq!(
            filter.bbox,
            Some(GeoBounds {
                north: 53.0,
                south: 52.0,
                east: 5.0,
                west: 4.0
            })
        );
    }

    #[test]
    fn test_bbox_ranges() {
        let out_of_range = list(&[("north", "91"), ("south", "52"), ("east", "5"), ("west", "4")]);
        assert!(out_of_range.filter("req").unwrap_err().message.contains("'north'"));

        let bad_lon = list(&[("north", "53"), ("south", "52"), ("east", "181"), ("west", "4")]);
        assert!(bad_lon.filter("req").is_err());

        let inverted = list(&[("north", "52"), ("south", "53"), ("east", "5"), ("west", "4")]);
        assert!(inverted.filter("req").unwrap_err().message.contains("'south'"));

        // west > east is an antimeridian box, not an error
        let wrapped = list(&[("north", "10"), ("south", "-10"), ("east", "-170"), ("west", "170")]);
        assert!(wrapped.filter("req").unwrap().bbox.unwrap().crosses_antimeridian());
    }

    #[test]
    fn test_search_text_precedence() {
        let request = SearchRequest {
            text: Some(" ".to_string()),
            q: Some("woonde".to_string()),
            plaque_text: Some("ignored".to_string()),
            window: ListRequest::default(),
        };
        assert_eq!(request.text(), Some("woonde"));
        assert!(request.validate("req").is_ok());

        let missing = SearchRequest::default();
        assert!(missing.validate("req").unwrap_err().message.contains("'q'"));
    }

    #[test]
    fn test_search_validates_window() {
        let request = SearchRequest {
            text: Some("anne".to_string()),
            window: list(&[("limit", "5000")]),
            ..Default::default()
        };
        assert!(request.validate("req").is_err());
    }
}
