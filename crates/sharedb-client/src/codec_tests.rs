use super::*;
use crate::ot::OpKind;
use crate::path;
use serde_json::json;

#[test]
fn handshake_request_encodes_with_short_names() {
    let req = HandshakeRequest::new(Some("c1".into()));
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value, json!({"a": "hs", "id": "c1", "protocol": 1, "protocolMinor": 1}));
}

#[test]
fn handshake_request_omits_id_when_absent() {
    let req = HandshakeRequest::new(None);
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value, json!({"a": "hs", "protocol": 1, "protocolMinor": 1}));
}

#[test]
fn subscribe_reply_with_absent_data_and_type_is_not_created() {
    let value = json!({"a": "s", "c": "examples", "d": "counter", "data": {}});
    let reply: SubscribeReply = serde_json::from_value(value).unwrap();
    let snapshot = reply.data.unwrap();
    assert!(snapshot.v == 0 || snapshot.data.is_none());
}

#[test]
fn operation_message_roundtrips_update() {
    let msg = OperationMessage {
        c: "examples".into(),
        d: "counter".into(),
        src: "c1".into(),
        seq: 1,
        v: 3,
        data: OperationData::Update {
            ops: vec![crate::ot::Op {
                p: path!["numClicks"],
                kind: OpKind::ObjectReplace { old: Json::Int(5), new: Json::Int(6) },
            }],
        },
    };
    let text = msg.encode().unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        value,
        json!({
            "a": "op", "c": "examples", "d": "counter", "src": "c1", "seq": 1, "v": 3,
            "op": [{"p": ["numClicks"], "oi": 6, "od": 5}]
        })
    );

    let back = OperationMessage::decode(&value).unwrap();
    assert_eq!(back.data, msg.data);
}

#[test]
fn operation_message_decodes_create() {
    let value = json!({
        "a": "op", "c": "examples", "d": "x", "src": "c1", "seq": 1, "v": 0,
        "create": {"type": "http://sharejs.org/types/JSONv0", "data": {"numClicks": 0}}
    });
    let msg = OperationMessage::decode(&value).unwrap();
    match msg.data {
        OperationData::Create { r#type, data } => {
            assert_eq!(r#type, "http://sharejs.org/types/JSONv0");
            assert_eq!(data, Json::from(json!({"numClicks": 0})));
        }
        other => panic!("expected Create, got {other:?}"),
    }
}

#[test]
fn operation_message_rejects_frame_with_no_payload() {
    let value = json!({"a": "op", "c": "c", "d": "d", "src": "c1", "seq": 1, "v": 0});
    assert!(OperationMessage::decode(&value).is_err());
}

#[test]
fn raw_envelope_peeks_action_and_error() {
    let value = json!({"a": "op", "error": {"code": "ERR_DOC_WAS_DELETED", "message": "gone"}});
    let envelope: RawEnvelope = serde_json::from_value(value).unwrap();
    assert_eq!(envelope.a, "op");
    assert_eq!(envelope.error.unwrap().code, ServerErrorCode::DocWasDeleted);
}

#[test]
fn query_diff_move_decodes() {
    let value = json!({"id": 1, "diff": [{"type": "move", "from": 0, "to": 2, "howMany": 1}]});
    let reply: QueryDiffReply = serde_json::from_value(value).unwrap();
    match &reply.diff[0] {
        QueryDiffOp::Move { from, to, how_many } => {
            assert_eq!((*from, *to, *how_many), (0, 2, 1));
        }
        other => panic!("expected Move, got {other:?}"),
    }
}
