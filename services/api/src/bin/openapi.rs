//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI specification for the API service to stdout, for
//! generating clients or documentation without starting the server.

use api_lib::web::ApiDoc;
use utoipa::OpenApi;

fn main() {
    match ApiDoc::openapi().to_pretty_json() {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize the OpenAPI document: {e}");
            std::process::exit(1);
        }
    }
}
