//! Common test utilities for cel-check integration tests.

use std::sync::Arc;

use cel_check::{CheckResult, Env};
use cel_check_common::{Ast, ExprFactory, ProtoTypeProvider, Source, SpannedExpr};
use prost_reflect::prost_types::field_descriptor_proto::{Label, Type};
use prost_reflect::prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto,
};
use prost_reflect::DescriptorPool;

/// Build an AST from a closure over a fresh factory.
#[allow(dead_code)]
pub fn build(source: &str, f: impl FnOnce(&mut ExprFactory) -> SpannedExpr) -> Ast {
    let mut factory = ExprFactory::new();
    let expr = f(&mut factory);
    factory.build(expr, Source::new(source))
}

/// Check an AST and assert it has no errors.
#[allow(dead_code)]
pub fn assert_checks(env: &Env, ast: Ast) -> CheckResult {
    let result = env.check(ast).expect("check aborted");
    if !result.is_ok() {
        panic!("unexpected check errors:\n{}", result.error_report());
    }
    result
}

/// Check an AST and assert it reports at least one error.
#[allow(dead_code)]
pub fn assert_check_error(env: &Env, ast: Ast) -> CheckResult {
    let result = env.check(ast).expect("check aborted");
    if result.is_ok() {
        panic!("expected check errors, got type {:?}", result.result_type());
    }
    result
}

fn field(name: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(str::to_string),
        ..Default::default()
    }
}

fn repeated(mut field: FieldDescriptorProto) -> FieldDescriptorProto {
    field.label = Some(Label::Repeated as i32);
    field
}

/// Descriptor for `test.v1`, holding `TestAllTypes`, `NestedMessage` and
/// `GlobalEnum`.
fn test_file() -> FileDescriptorProto {
    let test_all_types = DescriptorProto {
        name: Some("TestAllTypes".to_string()),
        field: vec![
            field("single_int64", 1, Type::Int64, None),
            field("single_uint32", 2, Type::Uint32, None),
            field("single_string", 3, Type::String, None),
            field("single_bool", 4, Type::Bool, None),
            repeated(field("repeated_int64", 5, Type::Int64, None)),
            field("single_value", 6, Type::Message, Some(".google.protobuf.Value")),
            field("single_struct", 7, Type::Message, Some(".google.protobuf.Struct")),
            field("single_timestamp", 8, Type::Message, Some(".google.protobuf.Timestamp")),
            field("single_int64_wrapper", 9, Type::Message, Some(".google.protobuf.Int64Value")),
            field("standalone_enum", 10, Type::Enum, Some(".test.v1.GlobalEnum")),
            field("single_nested_message", 11, Type::Message, Some(".test.v1.NestedMessage")),
        ],
        ..Default::default()
    };
    let nested = DescriptorProto {
        name: Some("NestedMessage".to_string()),
        field: vec![field("bb", 1, Type::Int32, None)],
        ..Default::default()
    };
    let global_enum = EnumDescriptorProto {
        name: Some("GlobalEnum".to_string()),
        value: ["GOO", "GAR", "GAZ"]
            .iter()
            .zip(0..)
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("test/v1/test_all_types.proto".to_string()),
        package: Some("test.v1".to_string()),
        dependency: vec![
            "google/protobuf/struct.proto".to_string(),
            "google/protobuf/timestamp.proto".to_string(),
            "google/protobuf/wrappers.proto".to_string(),
        ],
        message_type: vec![test_all_types, nested],
        enum_type: vec![global_enum],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// Type provider over the well-known types plus the `test.v1` messages.
#[allow(dead_code)]
pub fn test_provider() -> ProtoTypeProvider {
    let mut pool = DescriptorPool::global();
    pool.add_file_descriptor_proto(test_file())
        .expect("invalid test descriptor");
    ProtoTypeProvider::from_pool(pool)
}

/// Standard environment that knows the `test.v1` messages.
#[allow(dead_code)]
pub fn test_env() -> Env {
    Env::with_standard_library().with_type_provider(Arc::new(test_provider()))
}
