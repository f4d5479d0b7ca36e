//! ONT inventory example: list the ONTs of an OLT with their optical levels
//!
//! # Usage
//!
//! ```bash
//! cargo run --example ont_inventory -- --vendor huawei --host 192.168.1.1 --user admin --password secret
//! ```
//!
//! For ZTE, name the PON port explicitly:
//! ```bash
//! cargo run --example ont_inventory -- --vendor zte --host 10.0.0.5 --user admin --password secret --port-index 1/2/1
//! ```

use std::env;

use oltlink::{AdapterConfig, AdapterFactory, OntLocation, OntRef, OntState};
use secrecy::SecretString;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug to see every command)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let Some(password) = args.password.clone() else {
        eprintln!("Error: --password is required");
        std::process::exit(1);
    };

    let mut config = AdapterConfig::new(&args.host, &args.user, SecretString::from(password));
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    if args.accept_new_host_keys {
        config = config.with_option("host_key_verification", "accept-new");
    }

    let factory = AdapterFactory::new();
    let mut olt = factory.create_adapter(&args.vendor, config)?;

    println!("Connecting to {} ({})...", args.host, olt.vendor());
    if !olt.connect().await {
        eprintln!("Could not connect to {}", args.host);
        std::process::exit(1);
    }

    let info = olt.get_olt_info().await?;
    println!(
        "OLT {} model {} version {}",
        info.hostname.as_deref().unwrap_or("?"),
        info.model.as_deref().unwrap_or("?"),
        info.version.as_deref().unwrap_or("?")
    );

    let location = args.port_index.as_ref().map(|index| match args.vendor.as_str() {
        "zte" => OntLocation::gpon_index(index.clone()),
        _ => parse_frame_slot(index),
    });

    let onts = olt.get_ont_list(location.as_ref()).await?;
    println!("\n{:<6} {:<18} {:<10} {:>10}", "ONT", "Serial", "Status", "Rx (dBm)");
    println!("{}", "-".repeat(48));

    for ont in &onts {
        let Some(ont_id) = ont.ont_id else { continue };
        let reference = match ont.location.clone() {
            Some(location) => OntRef::at(ont_id, location),
            None => OntRef::new(ont_id),
        };

        let rx = if ont.status == OntState::Online {
            olt.get_ont_metrics(&reference)
                .await
                .ok()
                .and_then(|metrics| metrics.rx_power)
                .map(|rx| format!("{:.2}", rx))
        } else {
            None
        };

        println!(
            "{:<6} {:<18} {:<10} {:>10}",
            ont_id,
            ont.serial_number.as_deref().unwrap_or("-"),
            format!("{:?}", ont.status),
            rx.as_deref().unwrap_or("-")
        );
    }
    println!("{}", "-".repeat(48));
    println!("{} ONTs", onts.len());

    olt.disconnect().await;
    Ok(())
}

/// `0/1/0` as a Huawei frame/slot/port location.
fn parse_frame_slot(index: &str) -> OntLocation {
    let parts: Vec<u16> = index.split('/').filter_map(|part| part.parse().ok()).collect();
    match parts[..] {
        [frame, slot, port] => OntLocation::frame_slot(frame, slot, port),
        _ => {
            eprintln!("Error: expected frame/slot/port, got {}", index);
            std::process::exit(1);
        }
    }
}

/// Simple argument parser
struct Args {
    vendor: String,
    host: String,
    port: Option<u16>,
    user: String,
    password: Option<String>,
    port_index: Option<String>,
    accept_new_host_keys: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut vendor = "huawei".to_string();
        let mut host = "localhost".to_string();
        let mut port = None;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut password = env::var("OLT_PASSWORD").ok();
        let mut port_index = None;
        let mut accept_new_host_keys = false;

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
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().ok();
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
                        password = Some(args[i].clone());
                    }
                }
                "--port-index" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        port_index = Some(args[i].clone());
                    }
                }
                "--accept-new" => accept_new_host_keys = true,
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
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
            port,
            user,
            password,
            port_index,
            accept_new_host_keys,
        }
    }

    fn print_help() {
        println!(
            r#"oltlink ont_inventory example

USAGE:
    cargo run --example ont_inventory -- [OPTIONS]

OPTIONS:
    -v, --vendor <VENDOR>     huawei or zte [default: huawei]
    -h, --host <HOST>         OLT address [default: localhost]
    -p, --port <PORT>         CLI port [default: 22 for huawei, 23 for zte]
    -u, --user <USER>         Username [default: $USER]
    -P, --password <PASS>     Password [default: $OLT_PASSWORD]
    -i, --port-index <PON>    PON port, frame/slot/port or shelf/slot/port
    --accept-new              Trust and record unknown SSH host keys
    --help                    Print this help message
"#
        );
    }
}
