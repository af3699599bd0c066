//! Message, enum and container resolution tests for cel-check.

mod common;

use cel_check::CheckErrorKind;
use cel_check_common::{CelType, CelValue};
use common::{assert_check_error, assert_checks, build, test_env};

const TEST_ALL_TYPES: &str = "test.v1.TestAllTypes";

#[test]
fn message_construction() {
    let ast = build("test.v1.TestAllTypes{single_int64: 1}", |f| {
        let one = f.int(1, 35..36);
        f.message(TEST_ALL_TYPES, vec![("single_int64", one)], 0..37)
    });
    let root = ast.expr.id;

    let result = assert_checks(&test_env(), ast);
    assert_eq!(result.result_type(), Some(&CelType::message(TEST_ALL_TYPES)));
    assert_eq!(result.get_reference(root).unwrap().name, TEST_ALL_TYPES);
}

#[test]
fn message_name_resolves_through_container() {
    let env = test_env().with_container("test.v1").unwrap();
    let ast = build("TestAllTypes{}", |f| f.message("TestAllTypes", vec![], 0..14));
    let result = assert_checks(&env, ast);
    assert_eq!(result.result_type(), Some(&CelType::message(TEST_ALL_TYPES)));

    let env = test_env().with_abbreviations([TEST_ALL_TYPES]).unwrap();
    let ast = build("TestAllTypes{}", |f| f.message("TestAllTypes", vec![], 0..14));
    let result = assert_checks(&env, ast);
    assert_eq!(result.result_type(), Some(&CelType::message(TEST_ALL_TYPES)));
}

#[test]
fn field_initializer_errors() {
    let ast = build("test.v1.TestAllTypes{single_int64: 'a', nope: 1}", |f| {
        let a = f.string("a", 35..38);
        let one = f.int(1, 46..47);
        f.message(TEST_ALL_TYPES, vec![("single_int64", a), ("nope", one)], 0..48)
    });
    let result = assert_check_error(&test_env(), ast);
    let messages: Vec<String> = result.errors.iter().map(|e| e.message()).collect();
    assert_eq!(
        messages,
        vec![
            "expected type of field 'single_int64' is 'int' but provided type is 'string'".to_string(),
            "undefined field 'nope'".to_string(),
        ]
    );
    assert_eq!(result.result_type(), Some(&CelType::message(TEST_ALL_TYPES)));
}

#[test]
fn wrapper_fields_accept_null_and_primitive() {
    let ast = build("test.v1.TestAllTypes{single_int64_wrapper: null, single_value: 1}", |f| {
        let null = f.null(43..47);
        let one = f.int(1, 63..64);
        f.message(
            TEST_ALL_TYPES,
            vec![("single_int64_wrapper", null), ("single_value", one)],
            0..65,
        )
    });
    assert_checks(&test_env(), ast);
}

#[test]
fn unknown_message_type() {
    let ast = build("test.v1.Missing{}", |f| f.message("test.v1.Missing", vec![], 0..17));
    let result = assert_check_error(&test_env(), ast);
    assert_eq!(
        result.errors.errors()[0].message(),
        "undeclared reference to 'test.v1.Missing' (in container '')"
    );
    assert_eq!(result.result_type(), Some(&CelType::Error));
}

#[test]
fn non_message_type_name() {
    let env = test_env().with_variable("x", CelType::Int).unwrap();
    let ast = build("x{}", |f| f.message("x", vec![], 0..3));
    let result = assert_check_error(&env, ast);
    assert!(matches!(
        &result.errors.errors()[0].kind,
        CheckErrorKind::NotAMessageType { name } if name == "x"
    ));
}

#[test]
fn field_selection_on_messages() {
    let env = test_env()
        .with_variable("msg", CelType::message(TEST_ALL_TYPES))
        .unwrap();
    let cases = [
        ("single_int64", CelType::Int),
        ("single_uint32", CelType::UInt),
        ("repeated_int64", CelType::list(CelType::Int)),
        ("single_value", CelType::Dyn),
        ("single_struct", CelType::map(CelType::String, CelType::Dyn)),
        ("single_timestamp", CelType::Timestamp),
        ("single_int64_wrapper", CelType::wrapper(CelType::Int)),
        ("standalone_enum", CelType::Int),
        ("single_nested_message", CelType::message("test.v1.NestedMessage")),
    ];
    for (field, expected) in cases {
        let ast = build("msg.field", |f| {
            let msg = f.ident("msg", 0..3);
            f.select(msg, field, 3..9)
        });
        let result = assert_checks(&env, ast);
        assert_eq!(result.result_type(), Some(&expected), "field {}", field);
    }
}

#[test]
fn nested_selection_and_presence() {
    let env = test_env()
        .with_variable("msg", CelType::message(TEST_ALL_TYPES))
        .unwrap();
    let ast = build("msg.single_nested_message.bb", |f| {
        let msg = f.ident("msg", 0..3);
        let nested = f.select(msg, "single_nested_message", 3..25);
        f.select(nested, "bb", 25..28)
    });
    let result = assert_checks(&env, ast);
    assert_eq!(result.result_type(), Some(&CelType::Int));

    let ast = build("has(msg.single_int64)", |f| {
        let msg = f.ident("msg", 4..7);
        f.has(msg, "single_int64", 0..21)
    });
    let result = assert_checks(&env, ast);
    assert_eq!(result.result_type(), Some(&CelType::Bool));
}

#[test]
fn undefined_message_field() {
    let env = test_env()
        .with_variable("msg", CelType::message(TEST_ALL_TYPES))
        .unwrap();
    let ast = build("msg.nope", |f| {
        let msg = f.ident("msg", 0..3);
        f.select(msg, "nope", 3..8)
    });
    let result = assert_check_error(&env, ast);
    assert_eq!(result.errors.errors()[0].message(), "undefined field 'nope'");
    assert_eq!(result.result_type(), Some(&CelType::Error));
}

#[test]
fn enum_constants_resolve_with_values() {
    let env = test_env().with_container("test.v1").unwrap();
    let ast = build("GlobalEnum.GAR", |f| {
        let e = f.ident("GlobalEnum", 0..10);
        f.select(e, "GAR", 10..14)
    });
    let root = ast.expr.id;

    let result = assert_checks(&env, ast);
    assert_eq!(result.result_type(), Some(&CelType::Int));
    let reference = result.get_reference(root).unwrap();
    assert_eq!(reference.name, "test.v1.GlobalEnum.GAR");
    assert_eq!(reference.value, Some(CelValue::Int(1)));
}

#[test]
fn message_type_identifiers() {
    let ast = build("test.v1.TestAllTypes", |f| {
        let test = f.ident("test", 0..4);
        let v1 = f.select(test, "v1", 4..7);
        f.select(v1, "TestAllTypes", 7..20)
    });
    let result = assert_checks(&test_env(), ast);
    assert_eq!(
        result.result_type(),
        Some(&CelType::type_of(CelType::message(TEST_ALL_TYPES)))
    );

    let ast = build(".google.protobuf.Int64Value", |f| {
        f.ident(".google.protobuf.Int64Value", 0..27)
    });
    let result = assert_checks(&test_env(), ast);
    assert_eq!(
        result.result_type(),
        Some(&CelType::type_of(CelType::wrapper(CelType::Int)))
    );
}

#[test]
fn well_known_message_construction_uses_cel_type() {
    let ast = build("google.protobuf.Int64Value{value: 1}", |f| {
        let one = f.int(1, 34..35);
        f.message("google.protobuf.Int64Value", vec![("value", one)], 0..36)
    });
    let result = assert_checks(&test_env(), ast);
    assert_eq!(result.result_type(), Some(&CelType::wrapper(CelType::Int)));
}

#[test]
fn dynamic_fields_join_to_ambiguous_plus() {
    let env = test_env()
        .with_variable("x", CelType::message(TEST_ALL_TYPES))
        .unwrap();
    let ast = build("x.single_value[23] + x.single_struct['y']", |f| {
        let x = f.ident("x", 0..1);
        let value = f.select(x, "single_value", 1..14);
        let idx = f.int(23, 15..17);
        let lhs = f.call("_[_]", vec![value, idx], 14..18);
        let x = f.ident("x", 21..22);
        let st = f.select(x, "single_struct", 22..36);
        let key = f.string("y", 37..40);
        let rhs = f.call("_[_]", vec![st, key], 36..41);
        f.call("_+_", vec![lhs, rhs], 19..20)
    });
    let root = ast.expr.id;

    let result = assert_checks(&env, ast);
    assert_eq!(result.result_type(), Some(&CelType::Dyn));
    // Nine ids: add_bytes_bytes is declared alongside the other add_ overloads.
    let mut ids = result.get_reference(root).unwrap().overload_ids.clone();
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "add_bytes_bytes",
            "add_double_double",
            "add_duration_duration",
            "add_duration_timestamp",
            "add_int64_int64",
            "add_list_list",
            "add_string_string",
            "add_timestamp_duration",
            "add_uint64_uint64",
        ]
    );
}

#[test]
fn bool_is_not_a_comprehension_range() {
    let env = test_env().with_variable("x", CelType::Bool).unwrap();
    let ast = build("x.all(y, y == true)", |f| {
        let x = f.ident("x", 0..1);
        let y = f.ident("y", 9..10);
        let t = f.bool(true, 14..18);
        let cond = f.call("_==_", vec![y, t], 11..13);
        f.all(x, "y", cond, 1..19)
    });
    let result = assert_check_error(&env, ast);
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(
        &result.errors.errors()[0].kind,
        CheckErrorKind::NotAComprehensionRange { range } if *range == CelType::Bool
    ));
}
