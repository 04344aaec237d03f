use std::process;

fn main() {
    if let Err(e) = drake::cli::run() {
        drake::ui::error(&e.to_string());
        process::exit(e.exit_code());
    }
}
