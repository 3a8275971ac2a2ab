use super::*;
use crate::path;

fn obj(fields: &[(&str, Json)]) -> Json {
    Json::Object(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

#[test]
fn get_returns_undefined_for_missing_terminal() {
    let value = obj(&[("numClicks", Json::Int(5))]);
    assert_eq!(value.get(&path!["missing"]).unwrap(), &Json::Undefined);
}

#[test]
fn get_fails_invalid_path_when_parent_missing() {
    let value = obj(&[]);
    let err = value.get(&path!["a", "b"]).unwrap_err();
    assert_eq!(err, OtError::InvalidPath);
}

#[test]
fn set_replaces_existing_key() {
    let mut value = obj(&[("numClicks", Json::Int(5))]);
    value.set(&path!["numClicks"], Json::Int(6)).unwrap();
    assert_eq!(value.get(&path!["numClicks"]).unwrap(), &Json::Int(6));
}

#[test]
fn set_inserts_new_key() {
    let mut value = obj(&[]);
    value.set(&path!["a"], Json::Int(1)).unwrap();
    assert_eq!(value, obj(&[("a", Json::Int(1))]));
}

#[test]
fn set_fails_when_intermediate_missing() {
    let mut value = obj(&[]);
    let err = value.set(&path!["a", "b"], Json::Int(1)).unwrap_err();
    assert_eq!(err, OtError::InvalidPath);
}

#[test]
fn list_insert_at_length_succeeds() {
    let mut value = Json::List(vec![Json::Int(1)]);
    value.list_insert(&path![1], Json::Int(2)).unwrap();
    assert_eq!(value, Json::List(vec![Json::Int(1), Json::Int(2)]));
}

#[test]
fn list_insert_past_length_fails() {
    let mut value = Json::List(vec![Json::Int(1)]);
    let err = value.list_insert(&path![2], Json::Int(2)).unwrap_err();
    assert_eq!(err, OtError::InvalidPath);
}

#[test]
fn utf16_string_roundtrips_through_serde_json() {
    let s = Utf16String::from("héllo");
    assert_eq!(s.to_string_lossy(), "héllo");
}

#[test]
fn json_roundtrips_through_serde_value() {
    let value = serde_json::json!({"a": 1, "b": [1, 2, "x"], "c": null});
    let json = Json::from(value.clone());
    assert_eq!(json.to_serde(), value);
}
