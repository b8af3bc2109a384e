use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::foundation::error::{VidgraphError, VidgraphResult};

/// Parse node parameters. `null` means "all defaults".
pub(crate) fn parse<T: DeserializeOwned + Default>(
    kind: &str,
    value: &serde_json::Value,
) -> VidgraphResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| VidgraphError::validation(format!("invalid {kind} params: {e}")))
}

/// Replace one field of `params` and re-validate the whole set.
pub(crate) fn update<T: Serialize + DeserializeOwned + Default>(
    kind: &str,
    params: &T,
    key: &str,
    value: &serde_json::Value,
) -> VidgraphResult<T> {
    let mut obj = match serde_json::to_value(params)? {
        serde_json::Value::Object(map) => map,
        _ => return Err(VidgraphError::validation(format!("{kind} params are not an object"))),
    };
    if !obj.contains_key(key) {
        return Err(VidgraphError::validation(format!(
            "{kind} node has no parameter '{key}'"
        )));
    }
    obj.insert(key.to_owned(), value.clone());
    parse(kind, &serde_json::Value::Object(obj))
}

pub(crate) fn to_value<T: Serialize>(params: &T) -> serde_json::Value {
    serde_json::to_value(params).unwrap_or(serde_json::Value::Null)
}

pub(crate) fn check_unit(kind: &str, key: &str, v: f32) -> VidgraphResult<()> {
    if !v.is_finite() || !(0.0..=1.0).contains(&v) {
        return Err(VidgraphError::validation(format!(
            "{kind}.{key} must be finite and within [0, 1]"
        )));
    }
    Ok(())
}
