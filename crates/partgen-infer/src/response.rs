use partgen_core::DimensionRecord;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseError {
    #[error("no JSON object found in model response")]
    NoObject,
    #[error("model response is not valid JSON: {0}")]
    Json(String),
    #[error("model response does not describe a dimension record: {0}")]
    Shape(String),
}

/// The span from the first `{` to the last `}`, which drops code fences and
/// any chatter around the object.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

pub fn parse_response(text: &str) -> Result<DimensionRecord, ResponseError> {
    let object = extract_object(text).ok_or(ResponseError::NoObject)?;

    let value: Value = match serde_json::from_str(object) {
        Ok(v) => v,
        // Models regularly answer with Python-style single quotes.
        Err(first) if object.contains('\'') => serde_json::from_str(&object.replace('\'', "\""))
            .map_err(|_| ResponseError::Json(first.to_string()))?,
        Err(err) => return Err(ResponseError::Json(err.to_string())),
    };

    let value = match value {
        Value::Object(mut map) if map.contains_key("dimensions") && !map.contains_key("width") => {
            map.remove("dimensions").unwrap_or(Value::Null)
        }
        other => other,
    };

    DimensionRecord::deserialize(value).map_err(|e| ResponseError::Shape(e.to_string()))
}
