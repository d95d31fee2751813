//! Print the OpenAPI document as JSON.

use color_eyre::eyre::Result;
use tokengate::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    color_eyre::install()?;
    let json = ApiDoc::openapi().to_pretty_json()?;
    std::io::Write::write_all(&mut std::io::stdout().lock(), json.as_bytes())?;
    Ok(())
}
