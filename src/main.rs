use std::process;

fn main() {
    if let Err(e) = tasklens::cli::run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
