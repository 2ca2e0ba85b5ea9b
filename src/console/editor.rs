//! Line-editor wiring. The editor's own history/completion machinery is
//! an external collaborator's concern; we just ask `rustyline` for a
//! plain history-backed editor, the way the base crate does.

use rustyline::history::MemHistory;
use rustyline::{Config, Editor};

pub type ConsoleEditor = Editor<(), MemHistory>;

pub fn create_editor() -> rustyline::Result<ConsoleEditor> {
    let config = Config::builder().auto_add_history(true).build();
    Editor::with_history(config, MemHistory::new())
}
