fn main() {
    if let Err(err) = tabular_load::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
