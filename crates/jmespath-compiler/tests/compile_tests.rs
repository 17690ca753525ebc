//! Program-shape tests: what the compiler emits, where jumps land, and
//! which inputs it rejects.

use jmespath_compiler::{compile, SyntaxError, SyntaxErrorKind};
use jmespath_vm::{Instruction as I, Program, ProjectionKind};

fn program(source: &str) -> Program {
    compile(source).unwrap_or_else(|err| panic!("compile {:?} failed: {}", source, err))
}

fn error(source: &str) -> SyntaxError {
    match compile(source) {
        Ok(program) => panic!("compile {:?} unexpectedly produced {:?}", source, program),
        Err(err) => err,
    }
}

#[test]
fn field_chain() {
    let p = program("a.b.c");
    assert_eq!(
        p.instructions(),
        &[
            I::PushCurrent,
            I::Field("a".to_string()),
            I::Field("b".to_string()),
            I::Field("c".to_string()),
            I::Stop,
        ]
    );
}

#[test]
fn identity_keeps_entry_push() {
    let p = program("@");
    assert_eq!(p.instructions(), &[I::PushCurrent, I::Stop]);
}

#[test]
fn literal_elides_entry_push() {
    let p = program("`2`");
    assert_eq!(
        p.instructions(),
        &[I::Nop, I::Push(2i64.into()), I::Stop]
    );
}

#[test]
fn empty_expression_is_identity() {
    let p = program("");
    assert_eq!(p.instructions(), &[I::Nop, I::Stop]);
}

#[test]
fn quoted_identifier_is_a_field() {
    let p = program(r#""foo bar""#);
    assert_eq!(
        p.instructions(),
        &[I::PushCurrent, I::Field("foo bar".to_string()), I::Stop]
    );
}

#[test]
fn index_and_slice() {
    let p = program("a[0]");
    assert_eq!(
        p.instructions(),
        &[I::PushCurrent, I::Field("a".to_string()), I::Index(0), I::Stop]
    );

    let p = program("a[1:2:3]");
    assert_eq!(
        p.instructions()[2],
        I::Slice {
            start: Some(1),
            stop: Some(2),
            step: Some(3),
        }
    );

    let p = program("a[:]");
    assert_eq!(
        p.instructions()[2],
        I::Slice {
            start: None,
            stop: None,
            step: None,
        }
    );
}

#[test]
fn star_projection_shape() {
    let p = program("foo[*].bar");
    assert_eq!(
        p.instructions(),
        &[
            I::PushCurrent,
            I::Field("foo".to_string()),
            I::Each {
                target: 7,
                kind: ProjectionKind::Array,
            },
            I::MarkCurrent,
            I::Field("bar".to_string()),
            I::PopCurrent,
            I::Jump(2),
            I::Stop,
        ]
    );
}

#[test]
fn object_star_uses_object_kind() {
    let p = program("a.*");
    let each = p
        .instructions()
        .iter()
        .find(|i| matches!(i, I::Each { .. }))
        .expect("projection emitted");
    assert!(matches!(
        each,
        I::Each {
            kind: ProjectionKind::Object,
            ..
        }
    ));
}

#[test]
fn bare_star_is_loose() {
    let p = program("*");
    assert!(matches!(
        p.instructions()[1],
        I::Each {
            kind: ProjectionKind::Loose,
            ..
        }
    ));
}

#[test]
fn or_shape_with_elided_rhs_push() {
    // Literal rhs does not consume the speculative push: a Nop gap stays.
    let p = program("a || `1`");
    assert_eq!(
        p.instructions(),
        &[
            I::PushCurrent,
            I::Field("a".to_string()),
            I::Truthy,
            I::JumpIfTrue(7),
            I::Pop,
            I::Nop,
            I::Push(1i64.into()),
            I::Stop,
        ]
    );
}

#[test]
fn comparison_emits_cmp() {
    use jmespath_foundation::Comparator;
    let p = program("a > `1`");
    assert!(p
        .instructions()
        .iter()
        .any(|i| matches!(i, I::Cmp(Comparator::Gt))));
}

#[test]
fn function_call_counts_arguments() {
    let p = program("starts_with(foo, `\"a\"`)");
    assert!(p.instructions().iter().any(|i| matches!(
        i,
        I::Call { name, argc: 2 } if name == "starts_with"
    )));
}

#[test]
fn function_argument_pushes_elide_for_literals() {
    let p = program("abs(`-2`)");
    assert_eq!(
        p.instructions(),
        &[
            I::Nop, // entry push unused
            I::Nop, // argument push unused: the literal pushes itself
            I::Push((-2i64).into()),
            I::Call {
                name: "abs".to_string(),
                argc: 1,
            },
            I::Stop,
        ]
    );
}

#[test]
fn merge_alone_skips_projection() {
    let p = program("foo[]");
    assert_eq!(
        p.instructions(),
        &[
            I::PushCurrent,
            I::Field("foo".to_string()),
            I::Merge,
            I::Stop,
        ]
    );
}

#[test]
fn merge_with_continuation_projects() {
    let p = program("foo[].bar");
    assert!(p
        .instructions()
        .iter()
        .any(|i| matches!(i, I::Each { .. })));
}

#[test]
fn multi_select_hash_shape() {
    let p = program("{first: a}");
    assert_eq!(
        p.instructions(),
        &[
            I::PushCurrent,
            I::Truthy,
            I::JumpIfFalse(10),
            I::MarkCurrent,
            I::PopCurrent,
            I::Push(jmespath_foundation::Value::Object(Default::default())),
            I::PushCurrent,
            I::Field("a".to_string()),
            I::StoreKey(Some("first".to_string())),
            // target of the guard jump: one past the PopMark
            I::PopMark,
            I::Stop,
        ]
    );
}

#[test]
fn multi_select_list_stores_with_null_keys() {
    let p = program("[a, b]");
    let stores = p
        .instructions()
        .iter()
        .filter(|i| matches!(i, I::StoreKey(None)))
        .count();
    assert_eq!(stores, 2);
}

#[test]
fn every_program_ends_with_stop_and_jumps_resolve() {
    let sources = [
        "@",
        "a.b.c",
        "foo[*].bar",
        "foo[?bar > `1`].baz",
        "{first: a, rest: b[1:]}",
        "a || b || c",
        "foo[] | [0]",
        "length(items)",
        "a.*.b[-1]",
        "[foo, {k: bar}, `3`]",
        "not_null(a, b.c, `[]`)",
        "(a || b).c[0:5:2]",
    ];
    for source in sources {
        let p = program(source);
        assert!(
            matches!(p.instructions().last(), Some(I::Stop)),
            "{source}: missing terminal stop"
        );
        for (at, instruction) in p.instructions().iter().enumerate() {
            if let Some(target) = instruction.jump_target() {
                assert!(
                    target < p.len(),
                    "{source}: jump at {at} to out-of-range {target}"
                );
            }
        }
    }
}

#[test]
fn filter_loop_jumps_back_to_its_each() {
    let p = program("foo[?bar > `1`].baz");
    let each_at = p
        .instructions()
        .iter()
        .position(|i| matches!(i, I::Each { .. }))
        .expect("filter emits a projection");
    let back_jumps = p
        .instructions()
        .iter()
        .filter(|i| matches!(i, I::Jump(target) if *target == each_at))
        .count();
    // One from the rejected branch, one from the accepted transform.
    assert_eq!(back_jumps, 2);
}

#[test]
fn rejects_unexpected_tokens() {
    assert_eq!(error("foo..bar").kind, SyntaxErrorKind::UnexpectedToken);
    assert_eq!(error(".foo").kind, SyntaxErrorKind::UnexpectedToken);
    assert_eq!(error("foo bar").kind, SyntaxErrorKind::UnexpectedToken);
    assert_eq!(error("]").kind, SyntaxErrorKind::UnexpectedToken);
    assert_eq!(error("{a b}").kind, SyntaxErrorKind::UnexpectedToken);
}

#[test]
fn rejects_invalid_slices() {
    assert_eq!(error("a[1:2:3:4]").kind, SyntaxErrorKind::InvalidSyntax);
    assert_eq!(error("a[::0]").kind, SyntaxErrorKind::InvalidSyntax);
}

#[test]
fn rejects_numeric_index_under_object_context() {
    assert_eq!(error("a.[0]").kind, SyntaxErrorKind::InvalidSyntax);
}

#[test]
fn rejects_unterminated_constructs() {
    assert_eq!(error("length(a").kind, SyntaxErrorKind::UnexpectedEof);
    assert_eq!(error("{a: b").kind, SyntaxErrorKind::UnexpectedEof);
    assert_eq!(error("[a, b").kind, SyntaxErrorKind::UnexpectedEof);
    assert_eq!(error("a >").kind, SyntaxErrorKind::UnexpectedEof);
}

#[test]
fn reports_lex_errors_with_offset() {
    let err = error("foo # bar");
    assert_eq!(err.kind, SyntaxErrorKind::Lex);
    assert_eq!(err.span.start, 4);
}

#[test]
fn error_positions_are_byte_offsets() {
    let err = error("foo..bar");
    assert_eq!(err.span.start, 4);
}
