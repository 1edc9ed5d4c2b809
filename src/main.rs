fn main() {
    if let Err(err) = colmap::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
