fn main() {
    if let Err(err) = bookrent_lib::run() {
        eprintln!("bookrent: {err}");
        std::process::exit(1);
    }
}
