//! Build script for applet-runtime
//!
//! Handles configuration merging:
//! 1. Start with library defaults
//! 2. If APPLET_CONFIG_RS env var is set, parse the user's config file
//! 3. Merge user values over defaults (user wins)
//! 4. Generate OUT_DIR/applet_merged_config.rs
//!
//! The user file only lists the values it wants to change, e.g.
//!
//! ```text
//! pub const APPCTX_POOL_SIZE: usize = 65536;
//! pub const LIVELOCK_KILL: bool = true;
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration parameter definition
struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

/// All configuration parameters with their defaults
const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "APPCTX_POOL_SIZE",
        rust_type: "usize",
        default_value: "4096",
    },
    ConfigParam {
        name: "TASK_POOL_SIZE",
        rust_type: "usize",
        default_value: "4096",
    },
    ConfigParam {
        name: "BUFFER_COUNT",
        rust_type: "usize",
        default_value: "256",
    },
    ConfigParam {
        name: "BUFFER_SIZE",
        rust_type: "usize",
        default_value: "16 * 1024",
    },
    ConfigParam {
        name: "MAX_CONTINUE",
        rust_type: "u32",
        default_value: "16",
    },
    ConfigParam {
        name: "CALL_RATE_LIMIT",
        rust_type: "u32",
        default_value: "100_000",
    },
    ConfigParam {
        name: "CALL_RATE_PERIOD_MS",
        rust_type: "u32",
        default_value: "1000",
    },
    ConfigParam {
        name: "LIVELOCK_KILL",
        rust_type: "bool",
        default_value: "false",
    },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("applet_merged_config.rs");

    let mut config: HashMap<&'static str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    let user_path = env::var("APPLET_CONFIG_RS").ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);

        match fs::read_to_string(path) {
            Ok(content) => {
                parse_and_merge(&content, &mut config);
                println!("cargo:warning=Using custom applet config: {}", path);
            }
            Err(e) => {
                println!("cargo:warning=Failed to read APPLET_CONFIG_RS ({}): {}", path, e);
            }
        }
    }

    println!("cargo:rerun-if-env-changed=APPLET_CONFIG_RS");

    let output = generate_config(&config, user_path.is_some());
    fs::write(&dest_path, output).expect("Failed to write merged config");
}

/// Parse the user's config file and merge known values into `config`
fn parse_and_merge(content: &str, config: &mut HashMap<&'static str, String>) {
    for line in content.lines().map(str::trim) {
        if !line.starts_with("pub const ") {
            continue;
        }
        let Some((name, value)) = parse_const_line(line) else {
            continue;
        };
        match CONFIG_PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                config.insert(param.name, value);
            }
            None => println!("cargo:warning=Unknown applet config parameter: {}", name),
        }
    }
}

/// Parse `pub const NAME: TYPE = VALUE;` into (NAME, VALUE)
fn parse_const_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();

    let colon_pos = rest.find(':')?;
    let name = rest[..colon_pos].trim().to_string();

    let eq_pos = rest.find('=')?;
    let semi_pos = rest.rfind(';').unwrap_or(rest.len());
    let value = rest[eq_pos + 1..semi_pos].trim().to_string();

    Some((name, value))
}

/// Generate the merged config Rust file
fn generate_config(config: &HashMap<&'static str, String>, has_user: bool) -> String {
    let mut output = String::new();

    output.push_str("// Auto-generated by build.rs - do not edit\n");
    output.push_str("// Configuration merged from library defaults");
    if has_user {
        output.push_str(" and APPLET_CONFIG_RS");
    }
    output.push_str("\n\n");

    for param in CONFIG_PARAMS {
        let value = config
            .get(param.name)
            .map(String::as_str)
            .unwrap_or(param.default_value);
        output.push_str(&format!(
            "pub const {}: {} = {};\n",
            param.name, param.rust_type, value
        ));
    }

    output
}
