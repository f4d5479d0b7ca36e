//! Credential vault example: keep OLT passwords encrypted until use
//!
//! Stores a password in a [`CredentialVault`], builds a
//! [`SecureAdapterProxy`] for an inventory record and runs one command
//! through it. The password is decrypted only when the proxy first
//! connects.
//!
//! # Usage
//!
//! ```bash
//! OLT_MASTER_KEY=change-me cargo run --example vault_proxy -- --vendor zte --host 10.0.0.5 --user admin --password secret
//! ```

use std::env;

use oltlink::{AdapterFactory, CredentialVault, OltAdapter, OltDevice};
use secrecy::SecretString;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let master = env::var("OLT_MASTER_KEY").unwrap_or_else(|_| "change-me".to_string());

    println!("Deriving vault key...");
    let mut vault = CredentialVault::new(&SecretString::from(master));
    vault.store_credentials("cred-1", &args.user, &SecretString::from(args.password.clone()))?;
    println!(
        "Stored entry: {}",
        vault.get_encrypted("cred-1")?.password.to_base64()
    );

    let device = OltDevice {
        id: "olt-1".to_string(),
        name: args.host.clone(),
        vendor: args.vendor.clone(),
        host: args.host.clone(),
        port: None,
        model: None,
        protocol: None,
        credential_ref: "cred-1".to_string(),
    };

    let factory = AdapterFactory::new();
    let mut olt = factory.create_secure_adapter(&device, &vault)?;
    println!("Proxy: {:?}", olt);

    if !olt.connect().await {
        eprintln!("Could not connect to {}", args.host);
        std::process::exit(1);
    }

    let command = match args.vendor.as_str() {
        "zte" => "show clock",
        _ => "display time",
    };
    println!("\nExecuting: {}", command);
    println!("{}", "-".repeat(50));
    println!("{}", olt.execute_custom_command(command).await?);
    println!("{}", "-".repeat(50));

    olt.disconnect().await;
    Ok(())
}

/// Simple argument parser
struct Args {
    vendor: String,
    host: String,
    user: String,
    password: String,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut vendor = "huawei".to_string();
        let mut host = "localhost".to_string();
        let mut user = "admin".to_string();
        let mut password = String::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--vendor" | "-v" => {
                    i += 1;
                    if i < args.len() {
                        vendor = args[i].to_ascii_lowercase();
                    }
                }
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--password" | "-P" => {
                    i += 1;
                    if i < args.len() {
                        password = args[i].clone();
                    }
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self {
            vendor,
            host,
            user,
            password,
        }
    }
}
