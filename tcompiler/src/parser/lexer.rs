//! Line classification.
//!
//! A line is classified by its first word if that is a keyword, otherwise by
//! the first operator of [`OPERATORS`] it contains outside of `[...]` and
//! `'...'`. The table order is load-bearing: `x += 1` must never be read as
//! an addition and `a != b` never as a negation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    // Keywords
    Int,
    Bool,
    Char,
    Cint,
    IfBlock,
    ElseBlock,
    EndIf,
    WhileBlock,
    EndWhile,
    ForTilBlock,
    EndForTil,
    Block,
    EndBlock,
    Break,
    Method,
    EndMethod,
    Return,
    Sleep,
    // Assignments
    Assignment,
    AddAssignment,
    SubtractAssignment,
    MultiplyAssignment,
    DivideAssignment,
    ModuloAssignment,
    OrAssignment,
    AndAssignment,
    // Operators
    And,
    Or,
    UnEqual,
    Increment,
    Decrement,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Bigger,
    Smaller,
    Not,
    Equal,
    BitOf,
    /// A variable, constant, method call or nothing at all.
    Reference,
}

impl CommandType {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assignment
                | Self::AddAssignment
                | Self::SubtractAssignment
                | Self::MultiplyAssignment
                | Self::DivideAssignment
                | Self::ModuloAssignment
                | Self::OrAssignment
                | Self::AndAssignment
        )
    }

    pub fn is_operator(self) -> bool {
        operator_symbol(self).is_some() && !self.is_assignment()
    }
}

const KEYWORDS: &[(&str, CommandType)] = &[
    ("int", CommandType::Int),
    ("bool", CommandType::Bool),
    ("char", CommandType::Char),
    ("cint", CommandType::Cint),
    ("if", CommandType::IfBlock),
    ("else", CommandType::ElseBlock),
    ("endif", CommandType::EndIf),
    ("while", CommandType::WhileBlock),
    ("endwhile", CommandType::EndWhile),
    ("fortil", CommandType::ForTilBlock),
    ("endfortil", CommandType::EndForTil),
    ("block", CommandType::Block),
    ("{", CommandType::Block),
    ("endblock", CommandType::EndBlock),
    ("}", CommandType::EndBlock),
    ("break", CommandType::Break),
    ("method", CommandType::Method),
    ("endmethod", CommandType::EndMethod),
    ("return", CommandType::Return),
    ("sleep", CommandType::Sleep),
];

/// Operator symbols by descending match priority.
pub const OPERATORS: &[(&str, CommandType)] = &[
    (":=", CommandType::Assignment),
    ("+=", CommandType::AddAssignment),
    ("-=", CommandType::SubtractAssignment),
    ("*=", CommandType::MultiplyAssignment),
    ("/=", CommandType::DivideAssignment),
    ("%=", CommandType::ModuloAssignment),
    ("|=", CommandType::OrAssignment),
    ("&=", CommandType::AndAssignment),
    ("&", CommandType::And),
    ("|", CommandType::Or),
    ("!=", CommandType::UnEqual),
    ("++", CommandType::Increment),
    ("--", CommandType::Decrement),
    ("<<", CommandType::ShiftLeft),
    (">>", CommandType::ShiftRight),
    ("+", CommandType::Add),
    ("-", CommandType::Subtract),
    ("*", CommandType::Multiply),
    ("/", CommandType::Divide),
    ("%", CommandType::Modulo),
    (">", CommandType::Bigger),
    ("<", CommandType::Smaller),
    ("!", CommandType::Not),
    ("=", CommandType::Equal),
    (".", CommandType::BitOf),
];

/// Words that can never name a variable or method.
pub const RESERVED: &[&str] = &[
    // TCode
    "int", "bool", "char", "cint", "if", "else", "endif", "while", "endwhile", "fortil", "endfortil",
    "block", "endblock", "break", "method", "endmethod", "return", "sleep", "include", "true", "false",
    // registers the generated code names
    "a", "b", "c", "ab", "acc", "psw", "sp", "dpl", "dph", "dptr", "pc", "r0", "r1", "r2", "r3", "r4",
    "r5", "r6", "r7",
    // SFRs and SFR bits from reg8051.inc
    "pcon", "tcon", "tmod", "tl0", "tl1", "th0", "th1", "scon", "sbuf", "ie", "ip", "it0", "ie0", "it1",
    "ie1", "tr0", "tf0", "tr1", "tf1", "ri", "ti", "rb8", "tb8", "ren", "sm0", "sm1", "sm2", "ex0",
    "et0", "ex1", "et1", "es", "ea", "px0", "pt0", "px1", "pt1", "ps", "rxd", "txd", "int0", "int1",
    "t0", "t1", "wr", "rd", "p", "ov", "rs0", "rs1", "f0", "ac", "cy",
    // assembler directives
    "data", "bit", "code", "idata", "xdata", "org", "end", "equ", "set", "db", "dw", "ds", "using",
    "main",
];

pub fn classify(line: &str) -> CommandType {
    let first = first_token(line);
    if let Some((_, ty)) = KEYWORDS.iter().find(|(keyword, _)| *keyword == first) {
        return *ty;
    }

    OPERATORS
        .iter()
        .find(|(symbol, _)| find_operator(line, symbol).is_some())
        .map(|(_, ty)| *ty)
        .unwrap_or(CommandType::Reference)
}

pub fn operator_symbol(ty: CommandType) -> Option<&'static str> {
    OPERATORS.iter().find(|(_, t)| *t == ty).map(|(symbol, _)| *symbol)
}

/// The first word of a line, delimited by whitespace or `[`.
pub fn first_token(line: &str) -> &str {
    line.split(|c: char| c.is_whitespace() || c == '[')
        .next()
        .unwrap_or_default()
}

/// Byte offset of the last top-level occurrence of `symbol`.
///
/// Occurrences inside brackets or quotes do not count, and neither does a
/// `-` that is a sign rather than a subtraction.
pub fn find_operator(line: &str, symbol: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut found = None;

    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'\'' => quoted = !quoted,
            b'[' if !quoted => depth += 1,
            b']' if !quoted => depth = depth.saturating_sub(1),
            _ if quoted || depth > 0 => {}
            _ => {
                if bytes[i..].starts_with(symbol.as_bytes()) && !(symbol == "-" && is_sign(bytes, i)) {
                    found = Some(i);
                }
            }
        }
    }

    found
}

/// Splits on every top-level `,`.
pub fn split_arguments(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;

    for (i, ch) in list.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// Text between the first `[` and its matching `]`, plus whatever follows
/// the closing bracket. `None` when there is no balanced pair.
pub fn bracket_content(line: &str) -> Option<(&str, &str)> {
    let start = line.find('[')?;
    let mut depth = 0usize;
    let mut quoted = false;

    for (i, ch) in line[start..].char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => {
                depth -= 1;
                if depth == 0 {
                    let end = start + i;
                    return Some((line[start + 1..end].trim(), line[end + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    None
}

fn is_sign(bytes: &[u8], position: usize) -> bool {
    match bytes[..position].iter().rev().find(|b| !b.is_ascii_whitespace()) {
        None => true,
        Some(previous) => b"+-*/%&|!<>=:.,[".contains(previous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_win_over_operators() {
        assert_eq!(classify("int x := 5"), CommandType::Int);
        assert_eq!(classify("if [a = b]"), CommandType::IfBlock);
        assert_eq!(classify("if[a]"), CommandType::IfBlock);
        assert_eq!(classify("while [x > 0]"), CommandType::WhileBlock);
        assert_eq!(classify("fortil 10"), CommandType::ForTilBlock);
        assert_eq!(classify("{"), CommandType::Block);
        assert_eq!(classify("}"), CommandType::EndBlock);
        assert_eq!(classify("method m[int a]"), CommandType::Method);
        assert_eq!(classify("return a + b"), CommandType::Return);
        assert_eq!(classify("sleep 10"), CommandType::Sleep);
    }

    #[test]
    fn compound_assignment_beats_its_operator() {
        assert_eq!(classify("x += 1"), CommandType::AddAssignment);
        assert_eq!(classify("x -= 1"), CommandType::SubtractAssignment);
        assert_eq!(classify("b &= c"), CommandType::AndAssignment);
        assert_eq!(classify("b |= c"), CommandType::OrAssignment);
        assert_eq!(classify("x := a + b"), CommandType::Assignment);
    }

    #[test]
    fn two_character_operators_beat_one_character_ones() {
        assert_eq!(classify("a != b"), CommandType::UnEqual);
        assert_eq!(classify("x++"), CommandType::Increment);
        assert_eq!(classify("--x"), CommandType::Decrement);
        assert_eq!(classify("a << 2"), CommandType::ShiftLeft);
        assert_eq!(classify("a >> 2"), CommandType::ShiftRight);
        assert_eq!(classify("a < b"), CommandType::Smaller);
        assert_eq!(classify("!a"), CommandType::Not);
        assert_eq!(classify("a = b"), CommandType::Equal);
        assert_eq!(classify("flags.3"), CommandType::BitOf);
    }

    #[test]
    fn brackets_quotes_and_signs_are_not_operators() {
        assert_eq!(classify("m[a + b]"), CommandType::Reference);
        assert_eq!(classify("c = '+'"), CommandType::Equal);
        assert_eq!(classify("x > -5"), CommandType::Bigger);
        assert_eq!(classify("-5"), CommandType::Reference);
        assert_eq!(classify(""), CommandType::Reference);
        assert_eq!(classify("counter"), CommandType::Reference);
    }

    #[test]
    fn operators_split_on_their_last_occurrence() {
        assert_eq!(find_operator("a - b - c", "-"), Some(6));
        assert_eq!(find_operator("x - -5", "-"), Some(2));
        assert_eq!(find_operator("m[a - b]", "-"), None);
    }

    #[test]
    fn arguments_split_on_top_level_commas() {
        assert_eq!(split_arguments("a, m[b, c], ','"), vec!["a", "m[b, c]", "','"]);
        assert!(split_arguments("  ").is_empty());
    }

    #[test]
    fn bracket_content_matches_nested_pairs() {
        assert_eq!(bracket_content("if [m[1] = 2]"), Some(("m[1] = 2", "")));
        assert_eq!(bracket_content("m[a] + 1"), Some(("a", "+ 1")));
        assert_eq!(bracket_content("x = ']'"), None);
        assert_eq!(bracket_content("if [a"), None);
    }
}
