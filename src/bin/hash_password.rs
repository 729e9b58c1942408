use std::io::{self, BufRead};

/// hash-password
///
/// Prints the bcrypt hash of a password for seeding the `admins` table:
///
/// ```text
/// cargo run --bin hash-password -- 'my password'
/// echo 'my password' | cargo run --bin hash-password
/// ```
fn main() {
    let password = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut line = String::new();
            if let Err(e) = io::stdin().lock().read_line(&mut line) {
                eprintln!("failed to read password from stdin: {e}");
                std::process::exit(1);
            }
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        eprintln!("usage: hash-password <password>  (or pipe it on stdin)");
        std::process::exit(1);
    }

    match bcrypt::hash(&password, bcrypt::DEFAULT_COST) {
        Ok(hash) => println!("{hash}"),
        Err(e) => {
            eprintln!("failed to hash password: {e}");
            std::process::exit(1);
        }
    }
}
