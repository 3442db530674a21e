fn main() {
    if let Err(e) = anyload::run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
