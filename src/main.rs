fn main() {
    if let Err(err) = kvshell::run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
