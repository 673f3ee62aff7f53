fn main() {
    let code = match dupvault::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            dupvault::cli::exit_code_for(&err)
        }
    };
    std::process::exit(code);
}
