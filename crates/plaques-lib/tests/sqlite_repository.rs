use std::path::Path;

use plaques_lib::{Filter, GeoBounds, Page, PlaqueRepository, Result, StoreConfig};
use rusqlite::Connection;
use tempfile::TempDir;

fn write_db(path: &Path) {
    let conn = Connection::open(path).expect("create sqlite file");
    conn.execute_batch(
        "CREATE TABLE street_plaques (
             id TEXT NOT NULL,
             text TEXT,
             confidence REAL,
             latitude REAL,
             longitude REAL,
             projected_latitude REAL,
             projected_longitude REAL
         );
         INSERT INTO street_plaques VALUES ('nz-1', 'Kia ora', 0.8, -41.28, 174.77, NULL, NULL);
         INSERT INTO street_plaques VALUES ('fj-1', 'Bula', 0.7, -18.14, 178.44, NULL, NULL);
         INSERT INTO street_plaques VALUES ('ws-1', 'Talofa', 0.6, -13.83, -171.76, NULL, NULL);
         INSERT INTO street_plaques VALUES ('nl-1', 'Hier woonde', 0.9, 52.37, 4.88, NULL, NULL);",
    )
    .expect("seed sqlite file");
}

fn repository(dir: &TempDir) -> Result<PlaqueRepository> {
    let path = dir.path().join("plaques.db");
    write_db(&path);
    let path = path.to_string_lossy().into_owned();

    let config = StoreConfig::from_lookup(|key| match key {
        "PLAQUES_TABLE" => Some("street_plaques".to_string()),
        "PLAQUES_DB_PATH" => Some(path.clone()),
        _ => None,
    })?;
    PlaqueRepository::from_config(&config)
}

#[tokio::test]
async fn list_from_configured_file() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = repository(&dir)?;

    let page = repo.list(&Filter::default(), Page::default()).await?;
    assert_eq!(page.total, 4);
    let ids: Vec<&str> = page.plaques.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["nl-1", "nz-1", "fj-1", "ws-1"]);
    Ok(())
}

#[tokio::test]
async fn bbox_across_antimeridian() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = repository(&dir)?;

    let filter = Filter {
        min_confidence: None,
        bbox: Some(GeoBounds {
            north: -10.0,
            south: -45.0,
            east: -170.0,
            west: 175.0,
        }),
    };
    let page = repo.list(&filter, Page::default()).await?;

    // Wellington (174.77) lies west of the box.
    let ids: Vec<&str> = page.plaques.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["fj-1", "ws-1"]);
    assert_eq!(page.total, 2);
    Ok(())
}

#[tokio::test]
async fn offset_past_end_returns_empty_page() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = repository(&dir)?;

    let page = repo
        .list(&Filter::default(), Page { limit: 10, offset: 50 })
        .await?;
    assert!(page.plaques.is_empty());
    assert_eq!(page.total, 4);
    Ok(())
}

#[tokio::test]
async fn search_with_confidence_filter() -> Result<()> {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = repository(&dir)?;

    let filter = Filter {
        min_confidence: Some(0.65),
        bbox: None,
    };
    let hits = repo.search("a", &filter, Page::default()).await?;
    let ids: Vec<&str> = hits.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["nz-1", "fj-1"]);
    Ok(())
}

#[test]
fn missing_database_file_is_a_config_error() {
    let err = StoreConfig::from_lookup(|key| match key {
        "PLAQUES_DB_PATH" => Some("/nonexistent/plaques.db".to_string()),
        _ => None,
    })
    .and_then(|config| PlaqueRepository::from_config(&config))
    .expect_err("missing file is rejected");
    assert_eq!(err.reason(), "config");
}
