//! The command dispatcher: turns one line of user input into a typed
//! [`Command`], without touching the tracee. Execution is left to the
//! console loop, which matches on the result and drives
//! [`crate::debugger::Debugger`].

mod r#break;
mod memory;
mod register;
mod symbol;

pub use r#break::BreakTarget;
pub use memory::MemoryCommand;
pub use register::RegisterCommand;

use crate::debugger::error::Error;

/// One user command, already parsed into a typed request.
#[derive(Debug)]
pub enum Command {
    Continue,
    Break(BreakTarget),
    Register(RegisterCommand),
    Memory(MemoryCommand),
    StepInstruction,
    StepIn,
    StepOver,
    StepOut,
    Symbol(String),
}

/// The full keyword grammar, in the order ties are broken by: the first
/// matching rule in the table wins.
const KEYWORDS: &[&str] = &[
    "continue", "break", "register", "memory", "stepi", "step", "next", "finish", "symbol",
];

/// Match `token` against `keywords`. Every non-empty prefix of a keyword
/// names it; an exact match always wins (so that `step` picks the `step`
/// keyword rather than being treated as an abbreviation of `stepi`), and
/// among genuine abbreviations the first keyword in table order wins.
/// Shared by the top-level keyword and every sub-command's own grammar
/// (`register dump|read|write`, `memory read|write`), which resolve their
/// sub-keyword by the same rule.
fn match_prefix<'a>(token: &str, keywords: &[&'a str]) -> Option<&'a str> {
    if let Some(&kw) = keywords.iter().find(|&&kw| kw == token) {
        return Some(kw);
    }
    keywords.iter().find(|&&kw| kw.starts_with(token)).copied()
}

fn match_keyword(token: &str) -> Option<&'static str> {
    match_prefix(token, KEYWORDS)
}

/// Split `line` on whitespace and dispatch on the first token's
/// keyword, parsing the remainder as that keyword's own argument
/// grammar. Malformed input at any stage is reported as
/// [`Error::BadCommand`]; nothing here reads or writes the tracee.
pub fn parse(line: &str) -> Result<Command, Error> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&first) = tokens.first() else {
        return Err(Error::BadCommand("empty command".into()));
    };

    let keyword =
        match_keyword(first).ok_or_else(|| Error::BadCommand(format!("unknown command: {first}")))?;

    match keyword {
        "continue" => Ok(Command::Continue),
        "break" => r#break::parse(&tokens[1..]).map(Command::Break),
        "register" => register::parse(&tokens[1..]).map(Command::Register),
        "memory" => memory::parse(&tokens[1..]).map(Command::Memory),
        "stepi" => Ok(Command::StepInstruction),
        "step" => Ok(Command::StepIn),
        "next" => Ok(Command::StepOver),
        "finish" => Ok(Command::StepOut),
        "symbol" => symbol::parse(&tokens[1..]).map(Command::Symbol),
        _ => unreachable!("match_keyword only ever returns a KEYWORDS entry"),
    }
}

/// Parse a `0x`-prefixed (or bare) hex literal, as used by `break`,
/// `register write` and `memory`.
fn parse_hex(token: &str) -> Result<u64, Error> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|_| Error::BadCommand(format!("invalid hex literal: {token}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_keyword_wins_over_abbreviation_ambiguity() {
        // "step" is itself a full keyword and also a prefix of "stepi";
        // the exact match must win so `step` still means step-in.
        assert!(matches!(parse("step").unwrap(), Command::StepIn));
    }

    #[test]
    fn unambiguous_abbreviations_resolve_in_table_order() {
        assert!(matches!(parse("c").unwrap(), Command::Continue));
        assert!(matches!(parse("ste").unwrap(), Command::StepInstruction));
        assert!(matches!(parse("n").unwrap(), Command::StepOver));
        assert!(matches!(parse("f").unwrap(), Command::StepOut));
    }

    #[test]
    fn break_dispatches_to_its_own_grammar() {
        assert!(matches!(
            parse("b 0x1149").unwrap(),
            Command::Break(BreakTarget::Address(0x1149))
        ));
    }

    #[test]
    fn empty_line_is_bad_command() {
        assert!(matches!(parse(""), Err(Error::BadCommand(_))));
        assert!(matches!(parse("   "), Err(Error::BadCommand(_))));
    }

    #[test]
    fn unknown_keyword_is_bad_command() {
        assert!(matches!(parse("frobnicate"), Err(Error::BadCommand(_))));
    }

    #[test]
    fn parse_hex_accepts_with_and_without_prefix() {
        assert_eq!(parse_hex("0x1f").unwrap(), 0x1f);
        assert_eq!(parse_hex("1f").unwrap(), 0x1f);
        assert!(parse_hex("nope").is_err());
    }
}
