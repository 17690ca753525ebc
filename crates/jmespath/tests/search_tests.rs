//! End-to-end behaviour of compile + evaluate.

use jmespath::{compile, evaluate, search, Error, RuntimeError, Value};

fn json(text: &str) -> Value {
    Value::from_json(text).unwrap_or_else(|err| panic!("bad test JSON {:?}: {}", text, err))
}

fn run(expression: &str, data: &str) -> Value {
    search(expression, &json(data))
        .unwrap_or_else(|err| panic!("search {:?} failed: {}", expression, err))
}

#[test]
fn field_chain() {
    assert_eq!(run("a.b.c", r#"{"a":{"b":{"c":42}}}"#), json("42"));
}

#[test]
fn array_projection_keeps_nulls() {
    assert_eq!(
        run("foo[*].bar", r#"{"foo":[{"bar":1},{"bar":2},{"baz":3}]}"#),
        json("[1,2,null]")
    );
}

#[test]
fn filter_projection_drops_rejected_and_nulls() {
    assert_eq!(
        run(
            "foo[?bar > `1`].baz",
            r#"{"foo":[{"bar":1,"baz":"x"},{"bar":2,"baz":"y"},{"bar":3,"baz":"z"}]}"#
        ),
        json(r#"["y","z"]"#)
    );
}

#[test]
fn multi_select_hash() {
    assert_eq!(
        run("{first: a, rest: b[1:]}", r#"{"a":1,"b":[10,20,30,40]}"#),
        json(r#"{"first":1,"rest":[20,30,40]}"#)
    );
}

#[test]
fn or_falls_back() {
    assert_eq!(run("a || b", r#"{"a":null,"b":"fallback"}"#), json("\"fallback\""));
    assert_eq!(run("a || b", r#"{"a":"hit","b":"fallback"}"#), json("\"hit\""));
}

#[test]
fn function_call() {
    assert_eq!(run("length(items)", r#"{"items":[1,2,3]}"#), json("3"));
}

#[test]
fn merge_flattens() {
    assert_eq!(
        run("foo[]", r#"{"foo":[[1,2],[3],[4,5]]}"#),
        json("[1,2,3,4,5]")
    );
}

#[test]
fn identity() {
    for data in ["null", "3", r#""s""#, "[1,[2]]", r#"{"a":{"b":1}}"#] {
        assert_eq!(run("@", data), json(data));
    }
}

#[test]
fn scalar_projection_idempotence() {
    // With an array of scalars and no trailing expression, the projection
    // is an identity over the array.
    let data = r#"{"foo":[1,2,3]}"#;
    assert_eq!(run("foo[*]", data), run("foo", data));
}

#[test]
fn repeated_evaluation_is_pure() {
    let program = compile("foo[?bar > `1`].baz").unwrap();
    let data = json(r#"{"foo":[{"bar":2,"baz":"y"},{"bar":0,"baz":"n"}]}"#);
    let first = evaluate(&program, &data).unwrap();
    for _ in 0..3 {
        assert_eq!(evaluate(&program, &data).unwrap(), first);
    }
}

#[test]
fn evaluation_does_not_mutate_input() {
    let data = json(r#"{"a":{"b":[1,2,3]},"c":[{"d":1}]}"#);
    let before = data.clone();
    run_all_against(&data);
    assert_eq!(data, before);
}

fn run_all_against(data: &Value) {
    for expression in ["a.b", "a.b[0]", "c[*].d", "{x: a, y: c}", "a.b[::-1]"] {
        let program = compile(expression).unwrap();
        evaluate(&program, data).unwrap();
    }
}

#[test]
fn or_short_circuits_observably() {
    // The rhs calls an unknown function: reaching it is a runtime error,
    // so a truthy lhs must never evaluate it.
    let program = compile("a || boom(b)").unwrap();
    assert_eq!(
        evaluate(&program, &json(r#"{"a":"ok"}"#)).unwrap(),
        json("\"ok\"")
    );
    let err = evaluate(&program, &json(r#"{"a":null}"#)).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownFunction { .. }));
}

#[test]
fn field_and_index_on_null_yield_null() {
    assert_eq!(run("a.b", r#"{"a":null}"#), Value::Null);
    assert_eq!(run("a[0]", r#"{"a":null}"#), Value::Null);
    assert_eq!(run("missing.anything.at.all", "{}"), Value::Null);
}

#[test]
fn index_boundaries() {
    let data = r#"{"a":[10,20,30]}"#;
    assert_eq!(run("a[0]", data), json("10"));
    assert_eq!(run("a[-1]", data), json("30"));
    assert_eq!(run("a[-3]", data), json("10"));
    assert_eq!(run("a[3]", data), Value::Null);
    assert_eq!(run("a[-4]", data), Value::Null);
}

#[test]
fn slice_boundaries() {
    let data = r#"{"a":[1,2,3,4]}"#;
    assert_eq!(run("a[0:0]", data), json("[]"));
    assert_eq!(run("a[::-1]", data), json("[4,3,2,1]"));
    assert_eq!(run("a[1:3]", data), json("[2,3]"));
    assert_eq!(run("a[:2]", data), json("[1,2]"));
    assert_eq!(run("a[::2]", data), json("[1,3]"));
    assert_eq!(run("a[10:20]", data), json("[]"));
}

#[test]
fn multi_select_on_null_is_null() {
    assert_eq!(run("[a, b]", "null"), Value::Null);
    assert_eq!(run("{x: a}", "null"), Value::Null);
    assert_eq!(run("a.[b, c]", r#"{"d":1}"#), Value::Null);
}

#[test]
fn multi_select_list() {
    assert_eq!(
        run("[a, b.c, `9`]", r#"{"a":1,"b":{"c":2}}"#),
        json("[1,2,9]")
    );
}

#[test]
fn arity_violation_is_an_error() {
    let err = search("length(a, b)", &json(r#"{"a":[1]}"#)).unwrap_err();
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::ArityMismatch { got: 2, .. })
    ));
}

#[test]
fn null_policy_mismatch_is_not_an_error() {
    assert_eq!(run("to_number(a)", r#"{"a":[1,2]}"#), Value::Null);
}

#[test]
fn raise_policy_mismatch_is_an_error() {
    let err = search("abs(a)", &json(r#"{"a":"x"}"#)).unwrap_err();
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::InvalidType { index: 0, .. })
    ));
}

#[test]
fn object_projection() {
    assert_eq!(
        run("ops.*.numArgs", r#"{"ops":{"add":{"numArgs":2},"neg":{"numArgs":1}}}"#),
        json("[2,1]")
    );
}

#[test]
fn bare_star_projects_object_values() {
    assert_eq!(run("*.a", r#"{"x":{"a":1},"y":{"a":2}}"#), json("[1,2]"));
}

#[test]
fn projection_on_wrong_type_is_null() {
    assert_eq!(run("a[*]", r#"{"a":{"b":1}}"#), Value::Null);
    assert_eq!(run("a.*", r#"{"a":[1,2]}"#), Value::Null);
    assert_eq!(run("a[*]", r#"{"a":3}"#), Value::Null);
}

#[test]
fn nested_projections() {
    assert_eq!(
        run(
            "foo[*].bar[*].baz",
            r#"{"foo":[{"bar":[{"baz":1},{"baz":2}]},{"bar":[{"baz":3}]}]}"#
        ),
        json("[[1,2],[3]]")
    );
}

#[test]
fn pipe_rebases_projections() {
    // The pipe stops the projection: indexing applies to the projected
    // array, not per element.
    assert_eq!(
        run("foo[*].bar | [0]", r#"{"foo":[{"bar":1},{"bar":2}]}"#),
        json("1")
    );
    assert_eq!(run("a | b", r#"{"a":{"b":7}}"#), json("7"));
}

#[test]
fn merge_then_project() {
    assert_eq!(
        run("foo[].bar", r#"{"foo":[[{"bar":1}],[{"bar":2},{"bar":3}]]}"#),
        json("[1,2,3]")
    );
}

#[test]
fn filter_without_transform_keeps_elements() {
    assert_eq!(
        run("foo[?bar > `1`]", r#"{"foo":[{"bar":1},{"bar":2}]}"#),
        json(r#"[{"bar":2}]"#)
    );
}

#[test]
fn filter_truthiness_predicate() {
    assert_eq!(
        run("foo[?name]", r#"{"foo":[{"name":"a"},{"name":""},{"other":1}]}"#),
        json(r#"[{"name":"a"}]"#)
    );
}

#[test]
fn filter_equality_on_strings() {
    assert_eq!(
        run("foo[?bar == `\"x\"`]", r#"{"foo":[{"bar":"x"},{"bar":"y"}]}"#),
        json(r#"[{"bar":"x"}]"#)
    );
}

#[test]
fn comparison_results() {
    let data = r#"{"a":2,"b":1,"s":"x"}"#;
    assert_eq!(run("a > b", data), json("true"));
    assert_eq!(run("a < b", data), json("false"));
    assert_eq!(run("a >= a", data), json("true"));
    assert_eq!(run("a != b", data), json("true"));
    // Ordering on non-numbers yields null per the language rules.
    assert_eq!(run("s > a", data), Value::Null);
    assert_eq!(run("s == s", data), json("true"));
}

#[test]
fn or_chain() {
    assert_eq!(
        run("a || b || c", r#"{"a":null,"b":null,"c":3}"#),
        json("3")
    );
    // Empty containers are falsy.
    assert_eq!(run("a || b", r#"{"a":[],"b":"x"}"#), json("\"x\""));
}

#[test]
fn quoted_identifiers() {
    assert_eq!(run(r#""foo bar".baz"#, r#"{"foo bar":{"baz":1}}"#), json("1"));
}

#[test]
fn literal_expressions() {
    assert_eq!(run("`{\"k\": [1, 2]}`", "null"), json(r#"{"k":[1,2]}"#));
    assert_eq!(run("'raw string'", "null"), json("\"raw string\""));
}

#[test]
fn functions_compose_with_paths() {
    let data = r#"{"people":[{"age":20},{"age":30},{"age":25}]}"#;
    assert_eq!(run("max(people[*].age)", data), json("30"));
    assert_eq!(run("avg(people[*].age)", data), json("25.0"));
    assert_eq!(run("sort(people[*].age)[-1]", data), json("30"));
    assert_eq!(run("length(keys(@))", r#"{"a":1,"b":2}"#), json("2"));
    assert_eq!(run("to_string(`2`)", "null"), json("\"2\""));
}

#[test]
fn grouping_parentheses() {
    assert_eq!(run("(a || b).c", r#"{"a":null,"b":{"c":5}}"#), json("5"));
}

#[test]
fn compiled_programs_are_shareable_across_threads() {
    let program = std::sync::Arc::new(compile("foo[*].bar").unwrap());
    let data = json(r#"{"foo":[{"bar":1},{"bar":2}]}"#);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let program = std::sync::Arc::clone(&program);
            let data = data.clone();
            std::thread::spawn(move || evaluate(&program, &data).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), json("[1,2]"));
    }
}

#[test]
fn syntax_errors_carry_position() {
    let err = search("foo..bar", &json("{}")).unwrap_err();
    match err {
        Error::Syntax(err) => assert_eq!(err.span.start, 4),
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[test]
fn output_is_freshly_owned() {
    let data = json(r#"{"a":{"b":[1,2]}}"#);
    let mut result = run("a.b", r#"{"a":{"b":[1,2]}}"#);
    if let Value::Array(items) = &mut result {
        items.push(json("3"));
    }
    // The source value is unaffected by mutating the output.
    assert_eq!(data, json(r#"{"a":{"b":[1,2]}}"#));
}
