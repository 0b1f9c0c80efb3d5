//! services/api/src/bin/openapi.rs
//!
//! This binary generates the OpenAPI 3.0 specifications for both desks and
//! saves them to `tax_openapi.json` and `docs_openapi.json`.

use api_lib::web::rest::{DocsApiDoc, TaxApiDoc};
use utoipa::OpenApi;

/// Generates the OpenAPI specification and writes it to a file.
fn generate_spec(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec_json = api_doc.to_pretty_json()?;
    std::fs::write(path, spec_json)?;
    println!("✅ OpenAPI specification generated at {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    generate_spec(TaxApiDoc::openapi(), "tax_openapi.json")?;
    generate_spec(DocsApiDoc::openapi(), "docs_openapi.json")?;
    Ok(())
}
