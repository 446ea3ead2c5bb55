//! Field Codec Scenarios
//!
//! Tuple, enum, bit-list and pointer fields read and written through a
//! declared table.

use core_types::Pointer;
use run_format::{parse_table_format, FormatError, TupleValue};
use run_model::ModelError;
use tests_integration::{declare, model_from, option_lists, test_model, Snapshot};

#[test]
fn test_tuple_subfields_decode_and_write_back() {
    let mut data = vec![0xFF; 0x20];
    data[0] = 0b1011;
    let (mut model, mut history) = model_from(data);
    declare(&mut model, &mut history, 0, "[value.|t|a:|b:]1").unwrap();

    assert_eq!(model.tuple_value(0, 0, "value", "a").unwrap(), TupleValue::Number(3));
    assert_eq!(model.tuple_value(0, 0, "value", "b").unwrap(), TupleValue::Number(2));
    assert_eq!(model.serialize_run(0).unwrap(), "(3 2)");

    let change = history.current_change();
    model.set_tuple_value(change, 0, 0, "value", "a", 0).unwrap();
    model.set_tuple_value(change, 0, 0, "value", "b", 0).unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 0);

    model.set_tuple_value(change, 0, 0, "value", "a", 3).unwrap();
    model.set_tuple_value(change, 0, 0, "value", "b", 2).unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 0b1011);
}

#[test]
fn test_tuple_text_round_trip() {
    let mut data = vec![0xFF; 0x20];
    data[0] = 0b1011;
    let (mut model, mut history) = model_from(data);
    declare(&mut model, &mut history, 0, "[value.|t|a:|b:]1").unwrap();

    model.deserialize_run(history.current_change(), 0, "(0 0)").unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 0);
    model.deserialize_run(history.current_change(), 0, "(3 2)").unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 0b1011);
}

#[test]
fn test_tuple_value_too_wide_is_rejected() {
    let mut data = vec![0xFF; 0x20];
    data[0] = 0b1011;
    let (mut model, mut history) = model_from(data);
    declare(&mut model, &mut history, 0, "[value.|t|a:|b:]1").unwrap();
    let before = Snapshot::of(&model);

    let result = model.set_tuple_value(history.current_change(), 0, 0, "value", "a", 4);
    assert!(result.is_err());
    assert_eq!(Snapshot::of(&model), before);
}

#[test]
fn test_tuple_overflow_fails_parse() {
    let result = parse_table_format("[value.|t|a::::|b:]1", &option_lists());
    assert_eq!(
        result,
        Err(FormatError::BitOverflow {
            tuple: "value".into(),
            bits: 10,
            capacity: 8
        })
    );
}

#[test]
fn test_out_of_range_enum_round_trips_as_number() {
    let mut data = vec![0xFF; 0x20];
    data[0] = 2;
    let (mut model, mut history) = model_from(data);
    declare(&mut model, &mut history, 0, "[kind.options]1").unwrap();

    assert_eq!(model.serialize_run(0).unwrap(), "2");
    let options = model.enum_options(0, 0, "kind").unwrap();
    assert_eq!(options.options(), &["None", "Something Else", "2"]);
    assert!(options.has_synthetic_option());

    let before = Snapshot::of(&model);
    model.deserialize_run(history.current_change(), 0, "2").unwrap();
    assert_eq!(Snapshot::of(&model).digest, before.digest);
    assert_eq!(model.serialize_run(0).unwrap(), "2");
}

#[test]
fn test_enum_labels_and_synthetic_selection() {
    let mut data = vec![0xFF; 0x20];
    data[0] = 2;
    let (mut model, mut history) = model_from(data);
    declare(&mut model, &mut history, 0, "[kind.options]1").unwrap();

    model
        .deserialize_run(history.current_change(), 0, "\"Something Else\"")
        .unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 1);
    assert_eq!(model.serialize_run(0).unwrap(), "\"Something Else\"");

    model.deserialize_run(history.current_change(), 0, "none").unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 0);

    model.deserialize_run(history.current_change(), 0, "2").unwrap();
    // Selecting the synthetic option keeps the literal value
    model.set_enum_option(history.current_change(), 0, 0, "kind", 2).unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 2);
}

#[test]
fn test_bit_list_text() {
    let mut data = vec![0xFF; 0x20];
    data[0] = 0b10;
    let (mut model, mut history) = model_from(data);
    declare(&mut model, &mut history, 0, "[moves|b[]options]1").unwrap();
    assert_eq!(model.run_at(0).map(|run| run.length), Some(1));
    assert_eq!(model.serialize_run(0).unwrap(), "02");

    model.deserialize_run(history.current_change(), 0, "03").unwrap();
    assert_eq!(model.read_value(0, 1).unwrap(), 3);
}

#[test]
fn test_unresolved_bit_list_fails_parse() {
    let result = parse_table_format("[moves|b[]missing]1", &option_lists());
    assert!(matches!(result, Err(FormatError::UnresolvedList { .. })));
}

#[test]
fn test_pointer_text_prefers_hex() {
    let (mut model, mut history) = test_model(0x40);
    let change = history.current_change();
    assert_eq!(
        model.declare_anchor(change, 0x20, "BEEF"),
        Err(ModelError::InvalidName {
            name: "BEEF".into()
        })
    );
    model.declare_anchor(change, 0x30, "target").unwrap();
    model.declare_pointer(change, 0).unwrap();

    model.write_pointer_text(change, 0, "<BEEF>").unwrap();
    assert_eq!(model.read_pointer(0).unwrap(), Pointer::To(0xBEEF));

    model.write_pointer_text(change, 0, "target").unwrap();
    assert_eq!(model.read_pointer(0).unwrap(), Pointer::To(0x30));
    assert_eq!(model.serialize_run(0).unwrap(), "<target>");

    model.write_pointer_text(change, 0, "<null>").unwrap();
    assert_eq!(model.read_pointer(0).unwrap(), Pointer::Null);
    assert_eq!(model.read_value(0, 4).unwrap(), 0);
}

#[test]
fn test_unknown_anchor_writes_nothing() {
    let (mut model, mut history) = test_model(0x40);
    model.declare_pointer(history.current_change(), 0).unwrap();
    history.commit();
    let before = Snapshot::of(&model);

    let result = model.write_pointer_text(history.current_change(), 0, "<missing>");
    assert_eq!(
        result,
        Err(ModelError::InvalidAddress {
            text: "<missing>".into()
        })
    );
    assert_eq!(Snapshot::of(&model), before);
}
