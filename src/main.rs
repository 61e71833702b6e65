use std::process::exit;

use fuzzai::engine::lifecycle::RunState;
use fuzzai::output::console;

fn main() {
    match fuzzai::app::run_cli() {
        Ok(state) => exit(state.exit_code()),
        Err(e) => {
            eprintln!("{}", console::format_error_line(&e));
            exit(RunState::Aborted.exit_code());
        }
    }
}
