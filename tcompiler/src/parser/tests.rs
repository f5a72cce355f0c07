use super::parse;
use crate::error::ErrorKind;
use crate::ir::ast::*;

fn error_of(source: &str) -> (usize, ErrorKind) {
    let error = parse(source).expect_err("source should not parse");
    let line = error.line().expect("error should carry a line");
    (line, error.kind().cloned().expect("error should carry a kind"))
}

/// Address of the variable referenced alone on `line`.
fn address_at(program: &Program, line: usize) -> Address {
    match &program.commands[line] {
        Command::Reference(Operand::Variable(variable)) => variable.address,
        other => panic!("line {} is not a variable reference: {:?}", line, other),
    }
}

#[test]
fn block_variables_are_released_on_close() {
    let program = parse("block\nint u\nu\nendblock\nint v\nv").expect("parse");
    assert_eq!(address_at(&program, 2), Address::Byte(0x30));
    assert_eq!(address_at(&program, 5), Address::Byte(0x30));
}

#[test]
fn siblings_inside_one_block_get_distinct_addresses() {
    let program = parse("{\nint u\nint v\nbool w\nbool z\nu\nv\nw\nz\n}").expect("parse");
    assert_eq!(address_at(&program, 5), Address::Byte(0x30));
    assert_eq!(address_at(&program, 6), Address::Byte(0x31));
    assert_eq!(address_at(&program, 7), Address::Bit(BitAddress { byte: 0x20, bit: 0 }));
    assert_eq!(address_at(&program, 8), Address::Bit(BitAddress { byte: 0x20, bit: 1 }));
}

#[test]
fn redeclaration_fails_whatever_the_type() {
    assert_eq!(error_of("int x\nbool x"), (1, ErrorKind::VariableExists("x".into())));
    assert_eq!(error_of("int x\nblock\nchar x\nendblock"), (2, ErrorKind::VariableExists("x".into())));
    assert_eq!(error_of("int p2"), (0, ErrorKind::VariableExists("p2".into())));
}

#[test]
fn else_shares_the_if_end_label() {
    let source = "bool ok := true\nif [ok]\nint x := 1\nelse\nint y := 2\ny\nendif";
    let program = parse(source).expect("parse");

    let Command::Else { if_block, block } = &program.commands[3] else {
        panic!("expected else, got {:?}", program.commands[3]);
    };
    let if_frame = program.block(*if_block);
    let else_frame = program.block(*block);
    assert_eq!(if_frame.end_label, Some(Label("l1".into())));
    assert_eq!(else_frame.end_label, if_frame.end_label);
    assert_eq!(if_frame.kind, BlockKind::If { else_label: Some(Label("l2".into())) });

    // `x` was released when the if frame closed.
    assert_eq!(address_at(&program, 5), Address::Byte(0x30));
}

#[test]
fn else_needs_an_open_if() {
    assert_eq!(error_of("else"), (0, ErrorKind::ElseWithoutIf));
    assert_eq!(error_of("while [true]\nelse\nendwhile"), (1, ErrorKind::ElseWithoutIf));
    assert_eq!(error_of("if [true]\nelse\nelse\nendif"), (2, ErrorKind::ElseWithoutIf));
}

#[test]
fn fortil_register_is_released_after_endfortil() {
    let program = parse("fortil 3\nfortil 2\nendfortil\nendfortil\nfortil 4\nendfortil").expect("parse");
    let registers: Vec<Register> = program
        .blocks
        .iter()
        .filter_map(|block| match &block.kind {
            BlockKind::ForTil { register, .. } => Some(*register),
            _ => None,
        })
        .collect();
    assert_eq!(registers, vec![Register(0), Register(1), Register(0)]);
}

#[test]
fn shift_registers_are_only_held_while_parsing() {
    let program = parse("int x := 1 << 2\nfortil x\nendfortil").expect("parse");
    assert_eq!(program.blocks[0].kind, BlockKind::ForTil { top: Label("l3".into()), register: Register(0) });
}

#[test]
fn literal_ranges() {
    assert!(parse("int x := 255").is_ok());
    assert!(parse("int x := 0xff").is_ok());
    assert!(parse("cint x := -128").is_ok());
    assert!(parse("cint x := 127").is_ok());
    assert!(parse("char ch := 'A'").is_ok());

    assert_eq!(error_of("int x := 256"), (0, ErrorKind::InvalidValue("256".into())));
    assert_eq!(error_of("int x := 0x100"), (0, ErrorKind::InvalidValue("0x100".into())));
    assert_eq!(error_of("cint x := 128"), (0, ErrorKind::InvalidValue("128".into())));
    assert_eq!(error_of("cint x := -129"), (0, ErrorKind::InvalidValue("-129".into())));
    assert_eq!(error_of("int x := -1"), (0, ErrorKind::InvalidValue("-1".into())));
    assert_eq!(error_of("char ch := 'ab'"), (0, ErrorKind::InvalidValue("'ab'".into())));
}

#[test]
fn negative_literals_are_signed_constants() {
    let program = parse("cint n\nbool neg := n > -5").expect("parse");
    let Command::Declaration { init: Some(assignment), .. } = &program.commands[1] else {
        panic!("expected an initialized declaration");
    };
    let Expression::Operation(operation) = &assignment.value else {
        panic!("expected an operation");
    };
    let Operation::Bigger(operands) = operation.as_ref() else {
        panic!("expected '>'");
    };
    assert_eq!(
        operands.right,
        Expression::Operand(Operand::Constant(Constant { ty: VarType::Cint, value: 0xFB }))
    );
}

#[test]
fn a_sign_may_be_spaced_from_its_digits() {
    let program = parse("cint x := - 3").expect("parse");
    let Command::Declaration { init: Some(assignment), .. } = &program.commands[0] else {
        panic!("expected an initialized declaration");
    };
    assert_eq!(
        assignment.value,
        Expression::Operand(Operand::Constant(Constant { ty: VarType::Cint, value: 0xFD }))
    );

    assert!(parse("cint n\nbool neg := n > - 5").is_ok());
    assert_eq!(error_of("cint x := - 200"), (0, ErrorKind::InvalidValue("- 200".into())));
    assert_eq!(error_of("int x := - 3"), (0, ErrorKind::InvalidValue("-3".into())));
}

#[test]
fn chains_group_to_the_left() {
    let program = parse("int x\nx := x - 2 - 3").expect("parse");
    let Command::Assignment(assignment) = &program.commands[1] else {
        panic!("expected an assignment");
    };
    let Expression::Operation(outer) = &assignment.value else {
        panic!("expected an operation");
    };
    let Operation::Subtract(operands) = outer.as_ref() else {
        panic!("expected a subtraction");
    };
    assert!(matches!(&operands.left, Expression::Operation(inner) if matches!(inner.as_ref(), Operation::Subtract(_))));
    assert_eq!(
        operands.right,
        Expression::Operand(Operand::Constant(Constant { ty: VarType::Int, value: 3 }))
    );
}

#[test]
fn operand_kinds_must_agree() {
    assert!(matches!(error_of("int x\nbool flag\nx := flag"), (2, ErrorKind::Parameter(_))));
    assert!(matches!(error_of("bool flag := true + 1"), (0, ErrorKind::Parameter(_))));
    assert!(matches!(error_of("bool flag\nflag++"), (1, ErrorKind::Parameter(_))));
    assert!(matches!(error_of("if [5]\nendif"), (0, ErrorKind::Parameter(_))));
    assert!(matches!(error_of("fortil true\nendfortil"), (0, ErrorKind::Parameter(_))));
    assert!(parse("int u\nint v\nbool w := u = v & true").is_ok());
}

#[test]
fn declarations_take_a_name_and_an_optional_value() {
    assert!(matches!(error_of("int x y"), (0, ErrorKind::Parameter(_))));
    assert_eq!(error_of("int 1x"), (0, ErrorKind::InvalidName("1x".into())));
    assert_eq!(error_of("int l3"), (0, ErrorKind::InvalidName("l3".into())));
    assert_eq!(error_of("bool if"), (0, ErrorKind::InvalidName("if".into())));
    assert_eq!(error_of("x := 1"), (0, ErrorKind::InvalidName("x".into())));
}

#[test]
fn bit_of_targets() {
    let program = parse("int flags\nflags.3 := true\np1.0 := flags.3").expect("parse");
    let Command::Assignment(assignment) = &program.commands[1] else {
        panic!("expected an assignment");
    };
    assert!(matches!(&assignment.target, Target::BitOf { bit: 3, .. }));

    assert_eq!(error_of("int f\nf.8 := true"), (1, ErrorKind::InvalidValue("8".into())));
    assert!(matches!(error_of("int f\nf.1 += 1"), (1, ErrorKind::Parameter(_))));
}

#[test]
fn forward_calls_resolve_through_the_signature_pass() {
    let source = "int r := twice[4]\nmethod twice[int v]\nreturn v + v\nendmethod";
    let program = parse(source).expect("parse");

    let method = &program.methods[0];
    assert_eq!(method.label, Label("M1".into()));
    assert_eq!(method.parameters[0].address, Address::Byte(0x31));
    let Command::Declaration { init: Some(assignment), .. } = &program.commands[0] else {
        panic!("expected an initialized declaration");
    };
    assert!(matches!(&assignment.value, Expression::Call(call) if call.method == MethodId(0)));
}

#[test]
fn calls_are_checked_against_the_signature() {
    let method = "\nmethod twice[int v]\nreturn v + v\nendmethod";
    assert!(matches!(error_of(&format!("twice[1, 2]{}", method)), (0, ErrorKind::Parameter(_))));
    assert!(matches!(error_of(&format!("twice[true]{}", method)), (0, ErrorKind::Parameter(_))));
    assert!(matches!(error_of(&format!("twice{}", method)), (0, ErrorKind::InvalidSyntax(_))));
}

#[test]
fn method_storage_stays_reserved_after_endmethod() {
    let source = "method m[int x, bool y]\nint z\nendmethod\nint after\nbool late\nafter\nlate";
    let program = parse(source).expect("parse");

    let method = &program.methods[0];
    assert_eq!(method.parameters[0].address, Address::Byte(0x30));
    assert_eq!(method.parameters[1].address, Address::Bit(BitAddress { byte: 0x20, bit: 0 }));
    assert_eq!(method.variables[0].address, Address::Byte(0x31));
    assert_eq!(address_at(&program, 5), Address::Byte(0x32));
    assert_eq!(address_at(&program, 6), Address::Bit(BitAddress { byte: 0x20, bit: 1 }));
}

#[test]
fn method_names_leave_scope_at_endmethod() {
    assert_eq!(error_of("method m[int x]\nendmethod\nx"), (2, ErrorKind::InvalidName("x".into())));
    let program = parse("method m[int x]\nendmethod\nint x\nx").expect("parse");
    assert_eq!(address_at(&program, 3), Address::Byte(0x31));
}

#[test]
fn blocks_inside_methods_still_release() {
    let source = "method m[]\nblock\nint t\nendblock\nint u\nu\nendmethod";
    let program = parse(source).expect("parse");
    assert_eq!(address_at(&program, 5), Address::Byte(0x30));
}

#[test]
fn assembler_names_are_reserved() {
    assert_eq!(error_of("bool c := true"), (0, ErrorKind::InvalidName("c".into())));
    assert_eq!(error_of("int x\nint ie := 2"), (1, ErrorKind::InvalidName("ie".into())));
    assert_eq!(error_of("int a"), (0, ErrorKind::InvalidName("a".into())));
    assert_eq!(error_of("bool ea"), (0, ErrorKind::InvalidName("ea".into())));
    assert_eq!(error_of("method tmod[]\nendmethod"), (0, ErrorKind::InvalidName("tmod".into())));
    assert_eq!(error_of("method go[int b]\nendmethod"), (0, ErrorKind::InvalidName("b".into())));
}

#[test]
fn method_structure_errors() {
    assert_eq!(error_of("method tick[]\nendmethod\nmethod tick[]\nendmethod"), (2, ErrorKind::InvalidName("tick".into())));
    assert_eq!(error_of("method tick[int x, bool x]\nendmethod"), (0, ErrorKind::VariableExists("x".into())));
    assert_eq!(error_of("method go[]\nendmethod\nint go"), (2, ErrorKind::VariableExists("go".into())));
    assert!(matches!(error_of("method tick[]\nmethod tock[]\nendmethod\nendmethod"), (1, ErrorKind::InvalidSyntax(_))));
    assert!(matches!(error_of("return"), (0, ErrorKind::InvalidSyntax(_))));
    assert!(matches!(error_of("method tick[]\nint x"), (1, ErrorKind::InvalidSyntax(_))));
}

#[test]
fn blocks_must_close_with_their_own_keyword() {
    assert!(matches!(error_of("if [true]\nendwhile"), (1, ErrorKind::InvalidSyntax(_))));
    assert!(matches!(error_of("endif"), (0, ErrorKind::InvalidSyntax(_))));
    assert!(matches!(error_of("break"), (0, ErrorKind::InvalidSyntax(_))));
    assert!(matches!(error_of("while [true]\nint x\n"), (2, ErrorKind::InvalidSyntax(_))));
}

#[test]
fn break_points_at_the_innermost_block() {
    let program = parse("while [true]\nif [true]\nbreak\nendif\nendwhile").expect("parse");
    assert_eq!(program.commands[2], Command::Break(BlockId(1)));
}

#[test]
fn sleep_takes_two_registers_and_gives_them_back() {
    let program = parse("sleep 10\nfortil 1\nendfortil").expect("parse");
    let Command::Sleep(sleep) = &program.commands[0] else {
        panic!("expected sleep");
    };
    assert_eq!((sleep.outer, sleep.inner), (Register(0), Register(1)));
    assert!(matches!(&program.blocks[0].kind, BlockKind::ForTil { register: Register(0), .. }));
}

#[test]
fn ports_are_predeclared() {
    let program = parse("p1 := 5\np1").expect("parse");
    assert_eq!(address_at(&program, 1), Address::Byte(0x90));
}

#[test]
fn capacity_errors_point_at_the_line_that_overflows() {
    let loops = "fortil 1\n".repeat(9);
    assert_eq!(error_of(&loops), (8, ErrorKind::TooManyRegisters));

    let bytes: String = (0..81).map(|n| format!("int v{}\n", n)).collect();
    assert_eq!(error_of(&bytes), (80, ErrorKind::TooManyValues));

    let bools: String = (0..129).map(|n| format!("bool flag{}\n", n)).collect();
    assert_eq!(error_of(&bools), (128, ErrorKind::TooManyBools));
}
