use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::auth::{normalize_token, TokenStore};
use crate::core::config::defaults::ENV_API_TOKEN;

pub fn run_auth() -> Result<(), Box<dyn Error>> {
    print!("Gateway token: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let Some(token) = normalize_token(&input) else {
        eprintln!("❌ No token entered");
        std::process::exit(1);
    };

    TokenStore::open()?.store(&token)?;
    println!("✅ Token stored in the system keyring");
    if std::env::var_os(ENV_API_TOKEN).is_some() {
        eprintln!("⚠️  {ENV_API_TOKEN} is set and takes precedence over the stored token");
    }
    Ok(())
}

pub fn run_deauth() -> Result<(), Box<dyn Error>> {
    if TokenStore::open()?.clear()? {
        println!("✅ Token removed from the system keyring");
    } else {
        println!("No stored token to remove");
    }
    Ok(())
}
