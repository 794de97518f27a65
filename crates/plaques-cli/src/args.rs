//! Value parsers and store resolution for command-line arguments.

use std::path::PathBuf;

use plaques_lib::{GeoBounds, StoreConfig};

/// Store settings given on the command line; each overrides its environment
/// variable.
#[derive(Debug, Clone, Default)]
pub struct StoreOverrides {
    /// `PLAQUES_DB_PATH`
    pub db: Option<PathBuf>,
    /// `PLAQUES_TABLE`
    pub table: Option<String>,
    /// `PLAQUES_BACKEND`
    pub backend: Option<String>,
}

impl StoreOverrides {
    /// Resolve the store configuration, consulting `env` for anything not
    /// given on the command line.
    pub fn resolve<F>(&self, env: F) -> plaques_lib::Result<StoreConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        StoreConfig::from_lookup(|key| {
            let flag = match key {
                "PLAQUES_DB_PATH" => self.db.as_ref().map(|p| p.display().to_string()),
                "PLAQUES_TABLE" => self.table.clone(),
                "PLAQUES_BACKEND" => self.backend.clone(),
                _ => None,
            };
            flag.or_else(|| env(key))
        })
    }
}

/// Parse a confidence threshold in `0..=1`.
pub fn parse_confidence(raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|c| (0.0..=1.0).contains(c))
        .ok_or_else(|| format!("'{}' is not a number between 0 and 1", raw))
}

/// Parse `north,south,east,west` into a bounding box.
pub fn parse_bbox(raw: &str) -> Result<GeoBounds, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("'{}' must be four numbers: north,south,east,west", raw))?;

    let [north, south, east, west] = parts[..] else {
        return Err(format!(
            "'{}' must be four numbers: north,south,east,west",
            raw
        ));
    };

    if !(-90.0..=90.0).contains(&north) || !(-90.0..=90.0).contains(&south) {
        return Err("latitudes must be between -90 and 90".to_string());
    }
    if !(-180.0..=180.0).contains(&east) || !(-180.0..=180.0).contains(&west) {
        return Err("longitudes must be between -180 and 180".to_string());
    }
    if south > north {
        return Err("south must not be greater than north".to_string());
    }

    Ok(GeoBounds {
        north,
        south,
        east,
        west,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaques_lib::BackendConfig;

    #[test]
    fn test_parse_confidence() {
        assert_eq!(parse_confidence("0.5"), Ok(0.5));
        assert_eq!(parse_confidence(" 1 "), Ok(1.0));
        assert!(parse_confidence("1.01").is_err());
        assert!(parse_confidence("high").is_err());
    }

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("53.0, 52.0, 5.0, 4.0").unwrap();
        assert_eq!(bbox.north, 53.0);
        assert_eq!(bbox.west, 4.0);

        assert!(parse_bbox("53,52,5").is_err());
        assert!(parse_bbox("53,52,5,x").is_err());
        assert!(parse_bbox("95,52,5,4").is_err());
        assert!(parse_bbox("52,53,5,4").is_err());
        assert!(parse_bbox("10,-10,-170,170").unwrap().crosses_antimeridian());
    }

    #[test]
    fn test_flags_override_environment() {
        let overrides = StoreOverrides {
            db: Some(PathBuf::from("/tmp/local.db")),
            table: None,
            backend: None,
        };
        let config = overrides
            .resolve(|key| match key {
                "PLAQUES_DB_PATH" => Some("/data/other.db".to_string()),
                "PLAQUES_TABLE" => Some("street_plaques".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.table.as_str(), "street_plaques");
        match config.backend {
            BackendConfig::Sqlite { path } => assert_eq!(path, PathBuf::from("/tmp/local.db")),
            other => panic!("unexpected backend: {:?}", other),
        }
    }
}
