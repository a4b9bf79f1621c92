use schemars::schema_for;
use schemasync_core::DiffResult;

fn main() {
    let schema = schema_for!(DiffResult);
    let json = serde_json::to_string_pretty(&schema).expect("serialize json schema");
    println!("{json}");
}
