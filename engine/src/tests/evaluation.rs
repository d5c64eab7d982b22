use super::{run_limited, run_unit, tuples};
use crate::{ResourceLimits, SclError, Value};

fn ints(values: &[&[i32]]) -> Vec<Vec<Value>> {
    values
        .iter()
        .map(|row| row.iter().map(|&i| Value::I32(i)).collect())
        .collect()
}

#[test]
fn test_transitive_closure() {
    let ctx = run_unit(
        r#"
        rel edge = {(0, 1), (1, 2), (2, 3)}
        rel path(a, b) = edge(a, b)
        rel path(a, c) = path(a, b), edge(b, c)
        "#,
    );
    assert_eq!(
        tuples(&ctx, "path"),
        ints(&[&[0, 1], &[0, 2], &[0, 3], &[1, 2], &[1, 3], &[2, 3]])
    );
}

#[test]
fn test_mutual_recursion() {
    let ctx = run_unit(
        r#"
        rel num = {(0), (1), (2), (3), (4)}
        rel even(0)
        rel odd(y) = even(x), num(y), y == x + 1
        rel even(y) = odd(x), num(y), y == x + 1
        "#,
    );
    assert_eq!(tuples(&ctx, "even"), ints(&[&[0], &[2], &[4]]));
    assert_eq!(tuples(&ctx, "odd"), ints(&[&[1], &[3]]));
}

#[test]
fn test_stratified_negation() {
    let ctx = run_unit(
        r#"
        rel node = {(1), (2), (3)}
        rel edge = {(1, 2)}
        rel sink(a) = node(a), not edge(a, _)
        "#,
    );
    assert_eq!(tuples(&ctx, "sink"), ints(&[&[2], &[3]]));
}

#[test]
fn test_disjunctive_body() {
    let ctx = run_unit(
        r#"
        rel a = {(1), (2)}
        rel b = {(2), (3)}
        rel either(x) = a(x) or b(x)
        "#,
    );
    assert_eq!(tuples(&ctx, "either"), ints(&[&[1], &[2], &[3]]));
}

#[test]
fn test_constraint_filters_and_binds() {
    let ctx = run_unit(
        r#"
        rel n = {(1), (2), (3)}
        rel big(x) = n(x), x > 1
        rel double(x, y) = n(x), y == x * 2
        "#,
    );
    assert_eq!(tuples(&ctx, "big"), ints(&[&[2], &[3]]));
    assert_eq!(tuples(&ctx, "double"), ints(&[&[1, 2], &[2, 4], &[3, 6]]));
}

#[test]
fn test_repeated_variable_joins_on_equality() {
    let ctx = run_unit(
        r#"
        rel pair = {(1, 1), (1, 2), (3, 3)}
        rel same(x) = pair(x, x)
        "#,
    );
    assert_eq!(tuples(&ctx, "same"), ints(&[&[1], &[3]]));
}

#[test]
fn test_repeated_variable_across_three_columns() {
    let ctx = run_unit(
        r#"
        rel triple = {(1, 1, 1), (2, 2, 3), (4, 4, 4), (5, 6, 5)}
        rel diagonal(x) = triple(x, x, x)
        rel outer(x, y) = triple(x, y, x)
        "#,
    );
    assert_eq!(tuples(&ctx, "diagonal"), ints(&[&[1], &[4]]));
    assert_eq!(
        tuples(&ctx, "outer"),
        ints(&[&[1, 1], &[4, 4], &[5, 6]])
    );
}

#[test]
fn test_division_by_zero_drops_derivation() {
    let ctx = run_unit(
        r#"
        rel p = {(1, 0), (4, 2)}
        rel q(x / y) = p(x, y)
        "#,
    );
    assert_eq!(tuples(&ctx, "q"), ints(&[&[2]]));
}

#[test]
fn test_declared_float_column_widens_integers() {
    let ctx = run_unit(
        r#"
        type number(f64)
        rel number = {(1), (6.9)}
        rel sum(a + b) = number(a), number(b)
        rel hit() = number(1)
        "#,
    );
    assert_eq!(
        tuples(&ctx, "sum"),
        vec![
            vec![Value::F64(2.0)],
            vec![Value::F64(7.9)],
            vec![Value::F64(13.8)]
        ]
    );
    assert_eq!(tuples(&ctx, "hit"), vec![Vec::<Value>::new()]);
}

#[test]
fn test_boolean_xor() {
    let ctx = run_unit(
        r#"
        rel bool1 = {(true)}
        rel bool2 = {(false)}
        rel lor(a ^ b) = bool1(a), bool2(b)
        "#,
    );
    assert_eq!(tuples(&ctx, "lor"), vec![vec![Value::Bool(true)]]);
}

#[test]
fn test_string_values() {
    let ctx = run_unit(
        r#"
        rel parent = {("Emily", "Bob"), ("Bob", "Alice")}
        rel grandparent(a, c) = parent(a, b), parent(b, c)
        rel greeting(a + "!") = grandparent(a, _)
        "#,
    );
    assert_eq!(
        tuples(&ctx, "grandparent"),
        vec![vec![Value::string("Emily"), Value::string("Alice")]]
    );
    assert_eq!(tuples(&ctx, "greeting"), vec![vec![Value::string("Emily!")]]);
}

#[test]
fn test_derived_value_must_fit_declared_type() {
    let mut ctx = crate::Context::new(crate::ProvenanceMode::Unit);
    ctx.add_program("type out(i32)\nrel n = {(1.5)}\nrel out(x) = n(x)")
        .unwrap();
    let err = ctx.run().unwrap_err();
    assert!(matches!(err, SclError::TypeMismatch { ref relation, .. } if relation == "out"));
}

#[test]
fn test_declared_relation_without_tuples_is_empty() {
    let ctx = run_unit("type empty(i32)");
    assert!(ctx.relation("empty").unwrap().is_empty());
}

#[test]
fn test_unknown_relation_lookup() {
    let ctx = run_unit("rel n = {(1)}");
    assert!(matches!(
        ctx.relation("nope"),
        Err(SclError::UnknownRelation(name)) if name == "nope"
    ));
}

#[test]
fn test_iteration_limit() {
    let limits = ResourceLimits {
        max_iterations: 50,
        ..ResourceLimits::default()
    };
    let err = run_limited("rel nat(0)\nrel nat(n + 1) = nat(n)", limits)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SclError::ResourceLimitExceeded { ref limit_name, .. } if limit_name == "max_iterations"
    ));
}

#[test]
fn test_evaluation_time_limit() {
    let limits = ResourceLimits {
        max_iterations: usize::MAX,
        ..ResourceLimits::default().with_evaluation_time_ms(0)
    };
    let err = run_limited("rel nat(0)\nrel nat(n + 1) = nat(n)", limits)
        .err()
        .unwrap();
    assert!(err.is_timeout());
}
