//! Help text for the in-scope commands.

pub const HELP: &str = r#"
Available commands:

c, continue                            -- resume the tracee until the next stop
b, break <addr>|<file:line>|<function> -- set a breakpoint
reg, register dump|read|write <name>   -- inspect or change a register
mem, memory read|write <addr>          -- inspect or change tracee memory
stepi                                  -- step one instruction
step                                   -- step until the source line changes
next                                    -- step over a call on the current line
finish                                 -- run until the current function returns
symbol <name>                          -- print a symbol's kind and address
h, help                                -- show this text
q, quit                                -- exit the debugger
"#;

pub fn help_text() -> &'static str {
    HELP
}
