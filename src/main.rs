fn main() {
    if let Err(err) = sniffcast::run() {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
