//! Smart playlist command implementations.
//!
//! Both commands work on the base64 info and criteria records exactly as
//! they appear in the library file; no database is needed.

use serde::Serialize;
use serde_json::Value as JsonValue;

use rusqlite::types::Value;

use crate::cli::SmartCommands;
use crate::error::Result;
use crate::model::Timestamp;
use crate::smart::{compile_smart, decode_smart, CompileContext};

#[derive(Serialize)]
struct SqlOutput {
    sql: String,
    params: Vec<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_time: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Execute smart commands.
///
/// # Errors
///
/// Returns `Decode` if either record is not valid base64 or its fixed
/// header is truncated.
pub fn execute(command: &SmartCommands, json: bool) -> Result<()> {
    match command {
        SmartCommands::Decode { info, criteria } => decode(info, criteria, json),
        SmartCommands::Sql { info, criteria } => sql(info, criteria, json),
    }
}

fn decode(info: &str, criteria: &str, json: bool) -> Result<()> {
    let smart = decode_smart(info, criteria)?;
    if json {
        println!("{}", serde_json::to_string(&smart)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&smart)?);
    }
    Ok(())
}

fn param_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::from(*i),
        Value::Real(f) => JsonValue::from(*f),
        Value::Text(s) => JsonValue::from(s.as_str()),
        Value::Blob(b) => JsonValue::from(format!("<{} bytes>", b.len())),
    }
}

fn sql(info: &str, criteria: &str, json: bool) -> Result<()> {
    let smart = decode_smart(info, criteria)?;
    let query = compile_smart(&smart, &CompileContext::new(Timestamp::now()));
    let output = SqlOutput {
        sql: query.select_sql(),
        params: query.params().iter().map(param_json).collect(),
        max_size: query.max_size,
        max_time: query.max_time,
        warnings: query.warnings.clone(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", output.sql);
    if !output.params.is_empty() {
        let params: Vec<String> = output.params.iter().map(ToString::to_string).collect();
        println!("-- params: {}", params.join(", "));
    }
    if let Some(size) = output.max_size {
        println!("-- truncate at {size} bytes");
    }
    if let Some(time) = output.max_time {
        println!("-- truncate at {time} ms");
    }
    for warning in &output.warnings {
        println!("-- warning: {warning}");
    }
    Ok(())
}
