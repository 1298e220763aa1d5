//! Response decoding and error classification

use serde_json::{Map, Value};
use tracing::warn;
use url::form_urlencoded;

use crate::config::ResponseFormat;
use crate::error::IdentityProviderError;
use crate::transport::HttpResponse;
use crate::{Error, Result};

/// Decode a body per the configured format
pub(crate) fn parse_value(response: &HttpResponse, format: ResponseFormat) -> Result<Value> {
    match format {
        ResponseFormat::Json => parse_json(&response.body),
        ResponseFormat::UrlEncoded => Ok(Value::Object(parse_urlencoded(&response.body))),
        ResponseFormat::Auto => {
            let content_type = response
                .header("content-type")
                .unwrap_or_default()
                .to_ascii_lowercase();
            if content_type.contains("urlencoded") {
                Ok(Value::Object(parse_urlencoded(&response.body)))
            } else if content_type.contains("json") {
                parse_json(&response.body)
            } else {
                parse_json(&response.body).or_else(|e| {
                    let form = parse_urlencoded(&response.body);
                    if form.is_empty() { Err(e) } else { Ok(Value::Object(form)) }
                })
            }
        }
    }
}

/// Decode a body that must be a field map
pub(crate) fn parse_object(response: &HttpResponse, format: ResponseFormat) -> Result<Map<String, Value>> {
    match parse_value(response, format)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::response_parsing(
            "Invalid response received from authorization server: expected an object",
            &response.body,
        )),
    }
}

fn parse_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| {
        Error::response_parsing(
            format!("Invalid response received from authorization server: expected JSON ({e})"),
            body,
        )
    })
}

fn parse_urlencoded(body: &[u8]) -> Map<String, Value> {
    form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Fail when the body carries a populated error field, or when the status
/// is a client/server error. Runs identically for every response the engine
/// parses.
pub(crate) fn check_response(
    response: &HttpResponse,
    data: &Map<String, Value>,
    error_key: &str,
    code_key: Option<&str>,
) -> Result<()> {
    if let Some(error) = data.get(error_key).filter(|v| !is_empty_value(v)) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let code = code_key
            .and_then(|key| data.get(key))
            .map_or(0, coerce_code);
        let description = data
            .get("error_description")
            .and_then(Value::as_str)
            .map(String::from);

        warn!(status = response.status, error = %message, code, "Authorization server returned an error");
        return Err(IdentityProviderError {
            message,
            description,
            code,
            status: response.status,
            body: response.text(),
        }
        .into());
    }

    if response.status >= 400 {
        warn!(status = response.status, "Authorization server returned an error status");
        return Err(IdentityProviderError {
            message: format!("HTTP {}", response.status),
            description: None,
            code: i64::from(response.status),
            status: response.status,
            body: response.text(),
        }
        .into());
    }

    Ok(())
}

/// null, false, "", "0", 0, [] and {} count as "no error"
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty() || s == "0",
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Integer coercion: numbers truncate, strings use their leading integer, anything else is 0
#[allow(clippy::cast_possible_truncation)]
fn coerce_code(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => leading_integer(s),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map_or(0, |n| sign * n)
}
