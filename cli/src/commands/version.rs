//! Version command

/// Run the version command.
pub fn run() {
    println!("hardhost {}", env!("CARGO_PKG_VERSION"));
}
