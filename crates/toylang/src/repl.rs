//! Interactive REPL.
//!
//! Reads a line at a time: expressions are evaluated and echoed, statements
//! are executed. `q`, `quit` or Ctrl-D terminate the session.

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use toylang_interp::Interpreter;
use toylang_lexer::Source;

pub fn run(interpreter: &mut Interpreter) {
    println!("{}", "toylang REPL".bold().cyan());
    println!("Type a statement or an expression; q or quit to exit");

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(error) => {
            eprintln!("{} {error}", "Error:".red().bold());
            return;
        }
    };
    let history_path = std::env::temp_dir().join(".toylang_history");
    let _ = editor.load_history(&history_path);

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "q" || input == "quit" {
                    break;
                }
                let _ = editor.add_history_entry(input);
                interpreter.execute_or_evaluate(Source::anonymous(input));
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(error) => {
                eprintln!("{} {error}", "Error:".red().bold());
                break;
            }
        }
    }

    let _ = editor.save_history(&history_path);
}
