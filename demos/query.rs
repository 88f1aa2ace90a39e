//! Query a distributed object and print its fields as JSON.
//!
//! ```text
//! RUST_LOG=debug cargo run --example query -- \
//!     127.0.0.1:7199 schema.json 4003 10001 [Class field ...]
//! ```
//!
//! Without a class every field is requested; the reply names the class.

use std::sync::Arc;

use astron_db_client::{DatabaseClient, DcSchema, MdConnection, SchemaRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:7199".to_string());
    let schema_path = args.next().ok_or("missing schema path")?;
    let db: u64 = args.next().ok_or("missing database channel")?.parse()?;
    let do_id: u32 = args.next().ok_or("missing doId")?.parse()?;
    let class_name = args.next();
    let field_names: Vec<String> = args.collect();

    let schema = Arc::new(DcSchema::from_json(&std::fs::read_to_string(&schema_path)?)?);
    let dclass = match &class_name {
        Some(name) => Some(
            schema
                .class_by_name(name)
                .ok_or_else(|| format!("unknown class {}", name))?,
        ),
        None => None,
    };

    let self_channel = 1_000_000 + u64::from(std::process::id());
    let conn = MdConnection::builder(self_channel)
        .connection_name("astron-db-query")
        .connect(&addr)
        .await?;
    let client = DatabaseClient::new(conn, schema);

    let names: Vec<&str> = field_names.iter().map(String::as_str).collect();
    let mut rx = client.query_object_future(db, do_id, dclass.as_ref(), &names)?;

    loop {
        let inbound = client.recv_and_dispatch().await?;
        tracing::debug!(bytes = inbound.datagram.len(), "dispatched {:?}", inbound.dispatch);

        if let Ok(result) = rx.try_recv() {
            match result {
                Some(object) => {
                    println!("{} {}", object.dclass.name(), do_id);
                    println!("{}", serde_json::to_string_pretty(&object.fields)?);
                }
                None => println!("object {} not found", do_id),
            }
            return Ok(());
        }
    }
}
