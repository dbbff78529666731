//! Projecting arguments into a config struct and back into command-line
//! flags.
//!
//! `echo 1 { verbose: true } 2` becomes `{"@": [1, 2], "verbose": true}`,
//! and `args` renders that as `1 2 --verbose`.

use serde_json::{Map, Value as Json};
use stsh_types::{Error, Value};

use crate::context::ExecContext;
use crate::eval;
use crate::operand::Operand;
use crate::scope::Scope;

/// Key collecting positional arguments.
pub const POSITIONAL: &str = "@";

/// Merge arguments into one config object.
///
/// Struct values contribute their fields, later ones winning. Everything
/// else is appended to the positional list. Streams contribute each of
/// their elements.
pub fn to_config(
    ctx: &ExecContext,
    scope: &Scope,
    args: Vec<Operand>,
) -> Result<Map<String, Json>, Error> {
    let mut config = Map::new();
    let mut positional = Vec::new();
    for arg in args {
        for value in eval::to_values(ctx, scope, arg)? {
            match value.to_json() {
                Json::Object(fields) => config.extend(fields),
                other => positional.push(other),
            }
        }
    }
    if !positional.is_empty() {
        config.insert(POSITIONAL.to_string(), Json::Array(positional));
    }
    Ok(config)
}

/// Render a config object as command-line arguments.
pub fn to_args(config: &Map<String, Json>) -> Vec<String> {
    let mut args: Vec<String> = match config.get(POSITIONAL) {
        Some(Json::Array(items)) => items.iter().map(render).collect(),
        Some(other) => vec![render(other)],
        None => Vec::new(),
    };

    let mut keys: Vec<&String> = config.keys().filter(|k| *k != POSITIONAL).collect();
    keys.sort();
    for key in keys {
        let flag = match (&config[key], key.chars().count()) {
            (Json::Bool(true), 1) => format!("-{key}"),
            (Json::Bool(true), _) => format!("--{key}"),
            (value, _) => format!("--{key}={}", render(value)),
        };
        args.push(flag);
    }
    args
}

fn render(json: &Json) -> String {
    Value::Json(json.clone()).render()
}
