use serde_json::Value;

/// Valid JSON documents covering every JSON type, nesting, escapes and
/// irregular whitespace.
pub const JSON_DOCUMENTS: &[&str] = &[
    r#"{"a":1}"#,
    r#"[1,2,3]"#,
    r#"{ "spaced" : [ 1 , 2 ] , "z": {}, "a": [] }"#,
    r#"{"nested":{"list":[true,false,null],"text":"héllo \"quoted\"\n"},"n":-12.5}"#,
    r#"{"b":2,"a":1,"unicode":"日本語","exp":1e3}"#,
    "null",
    "\"plain\"",
    "42",
    "[]",
];

/// Malformed documents the engine must reject.
pub const INVALID_JSON_DOCUMENTS: &[&str] = &["{", "{'single': 1}", "[1,]", "undefined", ""];

pub fn parse(json: &str) -> Value {
    serde_json::from_str(json).expect("fixture should be valid JSON")
}

/// Compare two JSON texts ignoring whitespace, key order and number
/// spelling (`1e3` equals `1000`).
pub fn assert_json_equivalent(actual: &str, expected: &str) {
    assert_eq!(
        normalize_numbers(parse(actual)),
        normalize_numbers(parse(expected)),
        "actual JSON: {actual}"
    );
}

/// Rewrite every number as an `f64` so integer and float spellings of the
/// same value compare equal.
pub fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(number) => number
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Number(number), Value::Number),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_numbers).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, normalize_numbers(value)))
                .collect(),
        ),
        other => other,
    }
}
