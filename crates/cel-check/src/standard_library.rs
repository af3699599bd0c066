//! Standard library declarations: operators, conversions, built-in
//! functions and type identifiers, with cel-go overload ids.
//!
//! The library is built once per process and shared as the root frame of
//! every standard environment.

use std::sync::{Arc, LazyLock};

use cel_check_common::{CelType, FunctionDecl, OverloadDecl, VariableDecl};

use crate::scope::Scopes;

/// Root scope holding the standard library. Immutable after first use.
pub static STANDARD_LIBRARY: LazyLock<Arc<Scopes>> = LazyLock::new(|| {
    let mut scopes = Scopes::new();
    for decl in standard_idents() {
        scopes.insert_ident(decl);
    }
    for func in standard_functions() {
        scopes.insert_function(func);
    }
    Arc::new(scopes)
});

fn global(id: &str, params: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::function(id, params, result)
}

fn member(id: &str, params: Vec<CelType>, result: CelType) -> OverloadDecl {
    OverloadDecl::method(id, params, result)
}

fn param(name: &str) -> CelType {
    CelType::type_param(name)
}

/// Type identifiers such as `int` and `list`, each typed `type(T)`.
fn standard_idents() -> Vec<VariableDecl> {
    [
        ("bool", CelType::Bool),
        ("bytes", CelType::Bytes),
        ("double", CelType::Double),
        ("int", CelType::Int),
        ("string", CelType::String),
        ("uint", CelType::UInt),
        ("null_type", CelType::Null),
        ("dyn", CelType::Dyn),
        ("list", CelType::list(CelType::Dyn)),
        ("map", CelType::map(CelType::Dyn, CelType::Dyn)),
        ("type", CelType::type_of(CelType::Dyn)),
    ]
    .into_iter()
    .map(|(name, cel_type)| VariableDecl::new(name, CelType::type_of(cel_type)))
    .collect()
}

/// Every standard function declaration.
pub fn standard_functions() -> Vec<FunctionDecl> {
    let mut funcs = Vec::new();
    funcs.extend(arithmetic());
    funcs.extend(comparisons());
    funcs.extend(logic());
    funcs.extend(collections());
    funcs.extend(conversions());
    funcs.extend(strings());
    funcs.extend(time_accessors());
    funcs
}

// ==================== Operators ====================

fn arithmetic() -> Vec<FunctionDecl> {
    use CelType::{Bytes, Double, Duration, Int, String, Timestamp, UInt};
    let list_a = CelType::list(param("A"));

    vec![
        FunctionDecl::new("_+_").with_overloads([
            global("add_int64_int64", vec![Int, Int], Int),
            global("add_uint64_uint64", vec![UInt, UInt], UInt),
            global("add_double_double", vec![Double, Double], Double),
            global("add_string_string", vec![String, String], String),
            global("add_bytes_bytes", vec![Bytes, Bytes], Bytes),
            global("add_list_list", vec![list_a.clone(), list_a.clone()], list_a)
                .with_type_params(["A"]),
            global("add_timestamp_duration", vec![Timestamp, Duration], Timestamp),
            global("add_duration_timestamp", vec![Duration, Timestamp], Timestamp),
            global("add_duration_duration", vec![Duration, Duration], Duration),
        ]),
        FunctionDecl::new("_-_").with_overloads([
            global("subtract_int64_int64", vec![Int, Int], Int),
            global("subtract_uint64_uint64", vec![UInt, UInt], UInt),
            global("subtract_double_double", vec![Double, Double], Double),
            global("subtract_timestamp_timestamp", vec![Timestamp, Timestamp], Duration),
            global("subtract_timestamp_duration", vec![Timestamp, Duration], Timestamp),
            global("subtract_duration_duration", vec![Duration, Duration], Duration),
        ]),
        FunctionDecl::new("_*_").with_overloads([
            global("multiply_int64_int64", vec![Int, Int], Int),
            global("multiply_uint64_uint64", vec![UInt, UInt], UInt),
            global("multiply_double_double", vec![Double, Double], Double),
        ]),
        FunctionDecl::new("_/_").with_overloads([
            global("divide_int64_int64", vec![Int, Int], Int),
            global("divide_uint64_uint64", vec![UInt, UInt], UInt),
            global("divide_double_double", vec![Double, Double], Double),
        ]),
        FunctionDecl::new("_%_").with_overloads([
            global("modulo_int64_int64", vec![Int, Int], Int),
            global("modulo_uint64_uint64", vec![UInt, UInt], UInt),
        ]),
        FunctionDecl::new("-_").with_overloads([
            global("negate_int64", vec![Int], Int),
            global("negate_double", vec![Double], Double),
        ]),
    ]
}

fn comparisons() -> Vec<FunctionDecl> {
    let ordered = [
        ("bool", CelType::Bool),
        ("int64", CelType::Int),
        ("uint64", CelType::UInt),
        ("double", CelType::Double),
        ("string", CelType::String),
        ("bytes", CelType::Bytes),
        ("timestamp", CelType::Timestamp),
        ("duration", CelType::Duration),
    ];
    let numeric = [
        ("int64", CelType::Int),
        ("uint64", CelType::UInt),
        ("double", CelType::Double),
    ];

    let mut funcs = vec![
        FunctionDecl::new("_==_").with_overload(
            global("equals", vec![param("A"), param("A")], CelType::Bool).with_type_params(["A"]),
        ),
        FunctionDecl::new("_!=_").with_overload(
            global("not_equals", vec![param("A"), param("A")], CelType::Bool)
                .with_type_params(["A"]),
        ),
    ];

    for (function, prefix) in [
        ("_<_", "less"),
        ("_<=_", "less_equals"),
        ("_>_", "greater"),
        ("_>=_", "greater_equals"),
    ] {
        let mut decl = FunctionDecl::new(function);
        for (suffix, ty) in &ordered {
            decl.overloads.push(global(
                &format!("{}_{}", prefix, suffix),
                vec![ty.clone(), ty.clone()],
                CelType::Bool,
            ));
        }
        for (lhs_name, lhs) in &numeric {
            for (rhs_name, rhs) in numeric.iter().filter(|(name, _)| name != lhs_name) {
                decl.overloads.push(global(
                    &format!("{}_{}_{}", prefix, lhs_name, rhs_name),
                    vec![lhs.clone(), rhs.clone()],
                    CelType::Bool,
                ));
            }
        }
        funcs.push(decl);
    }
    funcs
}

fn logic() -> Vec<FunctionDecl> {
    use CelType::Bool;

    vec![
        FunctionDecl::new("_&&_")
            .with_overload(global("logical_and", vec![Bool, Bool], Bool).non_strict()),
        FunctionDecl::new("_||_")
            .with_overload(global("logical_or", vec![Bool, Bool], Bool).non_strict()),
        FunctionDecl::new("!_").with_overload(global("logical_not", vec![Bool], Bool)),
        FunctionDecl::new("@not_strictly_false")
            .with_overload(global("not_strictly_false", vec![Bool], Bool).non_strict()),
        FunctionDecl::new("_?_:_").with_overload(
            global("conditional", vec![Bool, param("A"), param("A")], param("A"))
                .with_type_params(["A"])
                .non_strict(),
        ),
    ]
}

fn collections() -> Vec<FunctionDecl> {
    let list_a = CelType::list(param("A"));
    let map_ab = CelType::map(param("A"), param("B"));

    vec![
        FunctionDecl::new("@in").with_overloads([
            global("in_list", vec![param("A"), list_a.clone()], CelType::Bool)
                .with_type_params(["A"]),
            global("in_map", vec![param("A"), map_ab.clone()], CelType::Bool)
                .with_type_params(["A", "B"]),
        ]),
        FunctionDecl::new("_[_]").with_overloads([
            global("index_list", vec![list_a.clone(), CelType::Int], param("A"))
                .with_type_params(["A"]),
            global("index_map", vec![map_ab.clone(), param("A")], param("B"))
                .with_type_params(["A", "B"]),
        ]),
        FunctionDecl::new("size").with_overloads([
            global("size_string", vec![CelType::String], CelType::Int),
            global("size_bytes", vec![CelType::Bytes], CelType::Int),
            global("size_list", vec![list_a.clone()], CelType::Int).with_type_params(["A"]),
            global("size_map", vec![map_ab.clone()], CelType::Int).with_type_params(["A", "B"]),
            member("string_size", vec![CelType::String], CelType::Int),
            member("bytes_size", vec![CelType::Bytes], CelType::Int),
            member("list_size", vec![list_a], CelType::Int).with_type_params(["A"]),
            member("map_size", vec![map_ab], CelType::Int).with_type_params(["A", "B"]),
        ]),
    ]
}

fn conversions() -> Vec<FunctionDecl> {
    use CelType::{Bool, Bytes, Double, Duration, Int, String, Timestamp, UInt};

    vec![
        FunctionDecl::new("bool").with_overloads([
            global("bool_to_bool", vec![Bool], Bool),
            global("string_to_bool", vec![String], Bool),
        ]),
        FunctionDecl::new("bytes").with_overloads([
            global("bytes_to_bytes", vec![Bytes], Bytes),
            global("string_to_bytes", vec![String], Bytes),
        ]),
        FunctionDecl::new("double").with_overloads([
            global("double_to_double", vec![Double], Double),
            global("int64_to_double", vec![Int], Double),
            global("uint64_to_double", vec![UInt], Double),
            global("string_to_double", vec![String], Double),
        ]),
        FunctionDecl::new("duration").with_overloads([
            global("duration_to_duration", vec![Duration], Duration),
            global("string_to_duration", vec![String], Duration),
        ]),
        FunctionDecl::new("dyn")
            .with_overload(global("to_dyn", vec![param("A")], CelType::Dyn).with_type_params(["A"])),
        FunctionDecl::new("int").with_overloads([
            global("int64_to_int64", vec![Int], Int),
            global("uint64_to_int64", vec![UInt], Int),
            global("double_to_int64", vec![Double], Int),
            global("string_to_int64", vec![String], Int),
            global("timestamp_to_int64", vec![Timestamp], Int),
        ]),
        FunctionDecl::new("string").with_overloads([
            global("string_to_string", vec![String], String),
            global("bool_to_string", vec![Bool], String),
            global("int64_to_string", vec![Int], String),
            global("uint64_to_string", vec![UInt], String),
            global("double_to_string", vec![Double], String),
            global("bytes_to_string", vec![Bytes], String),
            global("timestamp_to_string", vec![Timestamp], String),
            global("duration_to_string", vec![Duration], String),
        ]),
        FunctionDecl::new("timestamp").with_overloads([
            global("timestamp_to_timestamp", vec![Timestamp], Timestamp),
            global("string_to_timestamp", vec![String], Timestamp),
            global("int64_to_timestamp", vec![Int], Timestamp),
        ]),
        FunctionDecl::new("type").with_overload(
            global("type", vec![param("A")], CelType::type_of(param("A"))).with_type_params(["A"]),
        ),
        FunctionDecl::new("uint").with_overloads([
            global("uint64_to_uint64", vec![UInt], UInt),
            global("int64_to_uint64", vec![Int], UInt),
            global("double_to_uint64", vec![Double], UInt),
            global("string_to_uint64", vec![String], UInt),
        ]),
    ]
}

fn strings() -> Vec<FunctionDecl> {
    use CelType::{Bool, String};

    vec![
        FunctionDecl::new("contains")
            .with_overload(member("contains_string", vec![String, String], Bool)),
        FunctionDecl::new("endsWith")
            .with_overload(member("ends_with_string", vec![String, String], Bool)),
        FunctionDecl::new("startsWith")
            .with_overload(member("starts_with_string", vec![String, String], Bool)),
        FunctionDecl::new("matches").with_overloads([
            global("matches", vec![String, String], Bool),
            member("matches_string", vec![String, String], Bool),
        ]),
    ]
}

fn time_accessors() -> Vec<FunctionDecl> {
    let timestamp_only = [
        ("getFullYear", "year"),
        ("getMonth", "month"),
        ("getDayOfYear", "day_of_year"),
        ("getDayOfMonth", "day_of_month"),
        ("getDate", "day_of_month_1_based"),
        ("getDayOfWeek", "day_of_week"),
    ];
    let shared = [
        ("getHours", "hours"),
        ("getMinutes", "minutes"),
        ("getSeconds", "seconds"),
        ("getMilliseconds", "milliseconds"),
    ];

    let timestamp_overloads = |suffix: &str| {
        [
            member(
                &format!("timestamp_to_{}", suffix),
                vec![CelType::Timestamp],
                CelType::Int,
            ),
            member(
                &format!("timestamp_to_{}_with_tz", suffix),
                vec![CelType::Timestamp, CelType::String],
                CelType::Int,
            ),
        ]
    };

    let mut funcs: Vec<FunctionDecl> = timestamp_only
        .iter()
        .map(|(name, suffix)| FunctionDecl::new(*name).with_overloads(timestamp_overloads(*suffix)))
        .collect();
    funcs.extend(shared.iter().map(|(name, suffix)| {
        FunctionDecl::new(*name)
            .with_overloads(timestamp_overloads(*suffix))
            .with_overload(member(
                &format!("duration_to_{}", suffix),
                vec![CelType::Duration],
                CelType::Int,
            ))
    }));
    funcs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_library_loads() {
        let scopes = &*STANDARD_LIBRARY;
        assert!(scopes.find_function("_+_").is_some());
        assert!(scopes.find_function("@not_strictly_false").is_some());
        assert_eq!(
            scopes.find_ident("int").unwrap().cel_type,
            CelType::type_of(CelType::Int)
        );
    }

    #[test]
    fn add_operator_overloads() {
        let add = STANDARD_LIBRARY.find_function("_+_").unwrap();
        assert_eq!(add.overloads.len(), 9);
        assert!(add.overloads.iter().all(|o| o.id.starts_with("add_")));
    }

    #[test]
    fn cross_numeric_comparisons() {
        let less = STANDARD_LIBRARY.find_function("_<_").unwrap();
        assert!(less.overloads.iter().any(|o| o.id == "less_int64_double"));
        assert!(less.overloads.iter().any(|o| o.id == "less_double_uint64"));
        assert_eq!(less.overloads.len(), 14);
    }

    #[test]
    fn size_has_global_and_member_forms() {
        let size = STANDARD_LIBRARY.find_function("size").unwrap();
        assert!(size.has_member_overloads());
        assert!(size.has_global_overloads());
    }

    #[test]
    fn time_accessors_cover_durations() {
        let hours = STANDARD_LIBRARY.find_function("getHours").unwrap();
        let ids: Vec<_> = hours.overloads.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["timestamp_to_hours", "timestamp_to_hours_with_tz", "duration_to_hours"]
        );
        let year = STANDARD_LIBRARY.find_function("getFullYear").unwrap();
        assert_eq!(year.overloads.len(), 2);
    }

    #[test]
    fn declarations_pass_merge_validation() {
        for func in standard_functions() {
            let mut validated = FunctionDecl::new(func.name.clone());
            validated
                .merge(func)
                .expect("standard overloads must not collide");
        }
    }
}
