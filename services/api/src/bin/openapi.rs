//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the notes API to disk.
//!
//! Usage: `openapi [OUTPUT]`, where `OUTPUT` defaults to `openapi.json`.

use api_lib::web::rest::ApiDoc;
use std::path::{Path, PathBuf};
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

/// Renders `api_doc` as pretty JSON and writes it to `path`, creating the
/// parent directory when needed.
fn write_document(
    api_doc: &utoipa::openapi::OpenApi,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, api_doc.to_pretty_json()?)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let api_doc = ApiDoc::openapi();
    write_document(&api_doc, &output)?;
    println!(
        "Wrote {} paths of the notes API to {}",
        api_doc.paths.paths.len(),
        output.display()
    );
    Ok(())
}
