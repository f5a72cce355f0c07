use std::thread;

use tcompiler::{CompileError, CompileOptions, ErrorKind, Interrupt, compile};

const BLINK: &str = "\
; toggles p1.0 while p3.2 is high
int delay := 50
bool running := true

while [running]
    p1.0 := !p1.0
    sleep delay
    if [p3.2 = false]
        running := false
    endif
endwhile
";

const TRAFFIC: &str = "\
cint offset := -4
int phase

method step[int n, bool fast]
    int next := n + 1
    if [next > 3]
        next := 0
    endif
    if [fast]
        return next
    endif
    return next % 2
endmethod

method on_tick[]
    phase := step[phase, true]
endmethod

fortil 10
    phase := step[phase, false]
    p2 := phase << 2
    if [offset < 0]
        offset++
    else
        break
    endif
endfortil
";

#[test]
fn adds_into_a_second_variable() {
    let output = compile("int x := 5\nint y := x + 3\n", &CompileOptions::new()).expect("compile");
    let expected = "\
include reg8051.inc
ljmp main
main:
mov 081h, #07h
x data 030h
mov 030h, #5
y data 031h
mov A, 030h
add A, #3
mov 031h, A
jmp main
end
";
    assert_eq!(output, expected);
}

#[test]
fn compiling_twice_gives_identical_output() {
    let options = CompileOptions::new().with_handler(Interrupt::Timer0, "on_tick");
    let first = compile(TRAFFIC, &options).expect("compile");
    let second = compile(TRAFFIC, &options).expect("compile");
    assert_eq!(first, second);
}

#[test]
fn concurrent_compiles_do_not_share_state() {
    let options = CompileOptions::new();
    let expected = compile(BLINK, &options).expect("compile");

    let outputs: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let options = &options;
                scope.spawn(move || {
                    let source = if i % 2 == 0 { BLINK } else { TRAFFIC };
                    compile(source, options).expect("compile")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("thread")).collect()
    });

    for output in outputs.iter().step_by(2) {
        assert_eq!(output, &expected);
    }
}

#[test]
fn full_programs_compile() {
    let blink = compile(BLINK, &CompileOptions::new()).expect("blink");
    assert!(blink.starts_with("include reg8051.inc\n"));
    assert!(blink.ends_with("jmp main\nend\n"));
    assert!(blink.contains("delay data 030h\n"));
    assert!(blink.contains("running bit 020h.0\n"));

    let options = CompileOptions::new()
        .with_handler(Interrupt::Timer0, "on_tick")
        .with_atomic(true);
    let traffic = compile(TRAFFIC, &options).expect("traffic");
    let main_end = traffic.find("\njmp main\n").expect("main loop");
    let first_method = traffic.find("M1:\n").expect("method label");
    assert!(main_end < first_method, "methods must not sit inside the main loop");
    assert!(traffic.contains("isr_timer0:\n"));
    assert!(traffic.contains("call M2\n"));
    assert_eq!(traffic.matches("djnz R0, ").count(), 1, "fortil counter");
    assert_eq!(traffic.matches("djnz R1, ").count(), 1, "shift loop inside the fortil");
}

#[test]
fn errors_carry_the_offending_line() {
    let source = "int speed\nint mode\n\nint speed := 3";
    let error = compile(source, &CompileOptions::new()).expect_err("redeclaration");
    assert_eq!(
        error,
        CompileError::Source {
            line: 3,
            text: "int speed := 3".to_string(),
            kind: ErrorKind::VariableExists("speed".to_string()),
        }
    );
    assert_eq!(
        error.to_string(),
        "Error at line 4: Variable 'speed' already exists\n    int speed := 3"
    );
}

#[test]
fn raw_text_is_reported_as_written() {
    let error = compile("  INT X := 300 ; too big", &CompileOptions::new()).expect_err("range");
    assert_eq!(error.line(), Some(0));
    assert_eq!(error.kind(), Some(&ErrorKind::InvalidValue("300".to_string())));
    assert!(error.to_string().ends_with("  INT X := 300 ; too big"));
}

#[test]
fn unknown_handlers_are_rejected() {
    let options = CompileOptions::new().with_handler(Interrupt::External0, "missing");
    assert_eq!(
        compile("int x", &options),
        Err(CompileError::UnknownHandler { name: "missing".to_string() })
    );
}

#[test]
fn empty_source_is_just_the_frame() {
    let output = compile("", &CompileOptions::new()).expect("compile");
    assert_eq!(output, "include reg8051.inc\nljmp main\nmain:\nmov 081h, #07h\njmp main\nend\n");
}
