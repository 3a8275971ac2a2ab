use proptest::prelude::*;

use super::*;
use crate::path;

fn obj(fields: &[(&str, Json)]) -> Json {
    Json::Object(fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

#[test]
fn object_replace_checks_old_and_sets_new() {
    let value = obj(&[("numClicks", Json::Int(5))]);
    let ops =
        vec![Op { p: path!["numClicks"], kind: OpKind::ObjectReplace { old: Json::Int(5), new: Json::Int(6) } }];
    let result = apply(&ops, &value).unwrap();
    assert_eq!(result, obj(&[("numClicks", Json::Int(6))]));
}

#[test]
fn object_replace_fails_on_stale_old() {
    let value = obj(&[("numClicks", Json::Int(5))]);
    let ops =
        vec![Op { p: path!["numClicks"], kind: OpKind::ObjectReplace { old: Json::Int(4), new: Json::Int(6) } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::OldDataMismatch);
}

#[test]
fn object_insert_fails_when_key_already_present() {
    let value = obj(&[("a", Json::Int(1))]);
    let ops = vec![Op { p: path!["a"], kind: OpKind::ObjectInsert { value: Json::Int(2) } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::OldDataMismatch);
}

#[test]
fn list_delete_fails_on_stale_old() {
    let value = Json::List(vec![Json::Int(1), Json::Int(2)]);
    let ops = vec![Op { p: path![0], kind: OpKind::ListDelete { old: Json::Int(9) } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::OldDataMismatch);
}

#[test]
fn list_insert_at_length_succeeds_past_length_fails() {
    let value = Json::List(vec![Json::Int(1)]);
    let ok = vec![Op { p: path![1], kind: OpKind::ListInsert { value: Json::Int(2) } }];
    assert_eq!(apply(&ok, &value).unwrap(), Json::List(vec![Json::Int(1), Json::Int(2)]));

    let too_far = vec![Op { p: path![2], kind: OpKind::ListInsert { value: Json::Int(2) } }];
    assert_eq!(apply(&too_far, &value).unwrap_err(), OtError::InvalidPath);
}

#[test]
fn string_insert_past_length_is_index_out_of_range() {
    let value = obj(&[("s", Json::Str("hi".into()))]);
    let ops = vec![Op { p: path!["s", 10], kind: OpKind::StringInsert { text: "x".into() } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::IndexOutOfRange);
}

#[test]
fn numeric_add_across_kinds_is_invalid_json_data() {
    let value = obj(&[("x", Json::Number(1.5))]);
    let ops = vec![Op { p: path!["x"], kind: OpKind::NumberAdd { delta: Json::Int(1) } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::InvalidJSONData);
}

#[test]
fn empty_path_is_always_invalid() {
    let value = obj(&[]);
    let ops = vec![Op { p: vec![], kind: OpKind::ObjectInsert { value: Json::Int(1) } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::InvalidPath);
}

#[test]
fn failed_op_list_leaves_caller_value_untouched() {
    // Scenario from spec §8: a list-insert into a key that isn't a sequence fails, and
    // the overall apply call leaves the original value conceptually unmodified (the
    // returned Result is an Err, the caller's Json is never replaced).
    let value = obj(&[]);
    let ops = vec![
        Op { p: path!["a"], kind: OpKind::ObjectInsert { value: Json::Int(1) } },
        Op { p: path!["b", 0], kind: OpKind::ListInsert { value: Json::Str("x".into()) } },
    ];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::InvalidPath);

    let reshaped = obj(&[("b", Json::List(vec![]))]);
    let result = apply(&ops, &reshaped).unwrap();
    assert_eq!(
        result,
        obj(&[("a", Json::Int(1)), ("b", Json::List(vec![Json::Str("x".into())]))])
    );
}

#[test]
fn apply_then_inverse_is_identity() {
    let value = obj(&[("numClicks", Json::Int(5)), ("tags", Json::List(vec![Json::Str("a".into())]))]);
    let ops = vec![
        Op { p: path!["numClicks"], kind: OpKind::ObjectReplace { old: Json::Int(5), new: Json::Int(8) } },
        Op { p: path!["tags", 1], kind: OpKind::ListInsert { value: Json::Str("b".into()) } },
    ];
    let after = apply(&ops, &value).unwrap();
    assert_ne!(after, value);

    let back = apply(&inverse(&ops), &after).unwrap();
    assert_eq!(back, value);
}

#[test]
fn inverse_of_inverse_is_identity() {
    let ops = vec![
        Op { p: path!["numClicks"], kind: OpKind::ObjectReplace { old: Json::Int(5), new: Json::Int(8) } },
        Op { p: path!["tags", 0], kind: OpKind::ListDelete { old: Json::Str("a".into()) } },
    ];
    assert_eq!(inverse(&inverse(&ops)), ops);
}

#[test]
fn subtype_text0_applies_against_embedded_string() {
    let value = obj(&[("body", Json::Str("hello world".into()))]);
    let ops = vec![Op {
        p: path!["body"],
        kind: OpKind::Subtype {
            name: "text0".into(),
            ops: vec![Text0Op::insert(5, ","), Text0Op::delete(0, "he")],
        },
    }];
    let result = apply(&ops, &value).unwrap();
    assert_eq!(result, obj(&[("body", Json::Str("llo, world".into()))]));

    let back = apply(&inverse(&ops), &result).unwrap();
    assert_eq!(back, value);
}

#[test]
fn unrecognized_subtype_is_rejected() {
    let value = obj(&[("body", Json::Str("hi".into()))]);
    let ops =
        vec![Op { p: path!["body"], kind: OpKind::Subtype { name: "rich0".into(), ops: vec![] } }];
    assert_eq!(apply(&ops, &value).unwrap_err(), OtError::UnsupportedSubtype);
}

#[test]
fn wire_op_roundtrips_json0_replace() {
    let op = Op { p: path!["numClicks"], kind: OpKind::ObjectReplace { old: Json::Int(5), new: Json::Int(6) } };
    let text = serde_json::to_string(&op).unwrap();
    assert_eq!(text, r#"{"p":["numClicks"],"oi":6,"od":5}"#);
    let back: Op = serde_json::from_str(&text).unwrap();
    assert_eq!(back, op);
}

#[test]
fn counter_increment_scenario_matches_spec_example() {
    // spec §8 scenario 2: {numClicks:5} -> change to 6.
    let value = obj(&[("numClicks", Json::Int(5))]);
    let ops = vec![Op {
        p: path!["numClicks"],
        kind: OpKind::ObjectReplace { old: Json::Int(5), new: Json::Int(6) },
    }];
    assert_eq!(apply(&ops, &value).unwrap(), obj(&[("numClicks", Json::Int(6))]));
}

#[test]
fn concurrent_numeric_add_scenario_matches_spec_example() {
    // spec §8 scenario 4: a remote `na: 2` lands on top of our local replace to 6.
    let after_local = obj(&[("numClicks", Json::Int(6))]);
    let remote_op = vec![Op { p: path!["numClicks"], kind: OpKind::NumberAdd { delta: Json::Int(2) } }];
    assert_eq!(apply(&remote_op, &after_local).unwrap(), obj(&[("numClicks", Json::Int(8))]));
}

proptest! {
    // Round-trip laws from spec §8: apply/inverse is an identity, inverting twice gets
    // back the original op list, and an empty op list never touches the value.

    #[test]
    fn prop_apply_inverse_is_identity_for_object_replace(before in -1_000_000i64..1_000_000, after in -1_000_000i64..1_000_000) {
        let value = obj(&[("numClicks", Json::Int(before))]);
        let ops = vec![Op {
            p: path!["numClicks"],
            kind: OpKind::ObjectReplace { old: Json::Int(before), new: Json::Int(after) },
        }];
        let applied = apply(&ops, &value).unwrap();
        let restored = apply(&inverse(&ops), &applied).unwrap();
        prop_assert_eq!(restored, value);
    }

    #[test]
    fn prop_inverse_of_inverse_is_identity_for_list_ops(items in proptest::collection::vec("[a-z]{1,4}", 0..6), extra in "[a-z]{1,4}") {
        let value = Json::List(items.iter().cloned().map(|s| Json::Str(s.as_str().into())).collect());
        let ops = vec![Op {
            p: path![items.len()],
            kind: OpKind::ListInsert { value: Json::Str(extra.as_str().into()) },
        }];
        prop_assert_eq!(inverse(&inverse(&ops)), ops.clone());

        let applied = apply(&ops, &value).unwrap();
        let restored = apply(&inverse(&ops), &applied).unwrap();
        prop_assert_eq!(restored, value);
    }

    #[test]
    fn prop_empty_op_list_is_a_no_op(n in -1_000i64..1_000) {
        let value = obj(&[("numClicks", Json::Int(n))]);
        let result = apply(&[], &value).unwrap();
        prop_assert_eq!(result, value);
    }
}
