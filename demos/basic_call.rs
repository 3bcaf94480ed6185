//! Basic example sending a query and a file upload to a GraphQL server.
//!
//! This example shows how to:
//! - Create a client and set an authentication header
//! - Send a query with variables and retries
//! - Upload a file using the multipart request convention
//! - Inspect the call history
//!
//! Run with: `cargo run --example basic_call -- <graphql-url>`

use kirjava::{Client, Error, InMemoryFile, Operation};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("kirjava=debug,basic_call=info")
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://countries.trevorblades.com/".to_string());

    let mut client = Client::new(&url)?;
    client.set_header("User-Agent", "kirjava-demo/0.1")?;
    println!("Using {}", client);

    println!("=== Query Example ===");
    let operation = Operation::new("query($code: ID!) { country(code: $code) { name capital } }")
        .variable("code", "FI")
        .retries(2)
        .retry_statuses([502, 503, 504]);

    match client.execute(operation).await {
        Ok(result) => {
            if let Some(errors) = result.get("errors") {
                println!("GraphQL errors: {}", errors);
            } else {
                println!("Data: {}", result["data"]);
            }
        }
        Err(Error::NonJsonResponse { message, .. }) => println!("{}", message),
        Err(e) => return Err(e),
    }
    println!();

    println!("=== Upload Example ===");
    let upload = Operation::new("mutation($file: Upload!) { upload(file: $file) }")
        .variable("file", InMemoryFile::new("hello.txt", "Hello from kirjava"));

    match client.execute(upload).await {
        Ok(result) => println!("Upload result: {}", result),
        Err(e) => println!("Upload failed: {}", e),
    }
    println!();

    println!("=== History ===");
    for entry in client.history() {
        println!(
            "{} (variables: {}) -> errors: {}",
            entry.request.query,
            serde_json::Value::Object(entry.request.variables.clone()),
            entry.has_errors()
        );
    }

    Ok(())
}
