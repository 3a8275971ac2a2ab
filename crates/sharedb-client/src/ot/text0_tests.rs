use super::*;

#[test]
fn insert_and_delete_roundtrip() {
    let mut s = Utf16String::from("hello world");
    let ops = vec![Text0Op::insert(5, ","), Text0Op::delete(0, "he")];
    apply(&ops, &mut s).unwrap();
    assert_eq!(s.to_string_lossy(), "llo, world");

    let inv = inverse(&ops);
    apply(&inv, &mut s).unwrap();
    assert_eq!(s.to_string_lossy(), "hello world");
}

#[test]
fn delete_requires_matching_text() {
    let mut s = Utf16String::from("hello");
    let ops = vec![Text0Op::delete(0, "xy")];
    assert_eq!(apply(&ops, &mut s).unwrap_err(), OtError::OldDataMismatch);
}

#[test]
fn insert_past_end_is_index_out_of_range() {
    let mut s = Utf16String::from("hi");
    let ops = vec![Text0Op::insert(10, "x")];
    assert_eq!(apply(&ops, &mut s).unwrap_err(), OtError::IndexOutOfRange);
}

#[test]
fn inverse_swaps_insert_and_delete_and_reverses_order() {
    let ops = vec![Text0Op::insert(0, "a"), Text0Op::delete(1, "b")];
    let inv = inverse(&ops);
    assert_eq!(inv, vec![Text0Op::insert(1, "b"), Text0Op::delete(0, "a")]);
}
