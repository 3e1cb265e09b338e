use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

const ENV_PREFIX: &str = "QSB_";

/// Sources that read `QSB_*` variables from the process environment.
const ENV_READERS: [&str; 4] = [
    "src/env_loader.rs",
    "src/backup/paths.rs",
    "src/backup/config.rs",
    "src/quicksight/aws_cli.rs",
];

fn is_env_key(literal: &str) -> bool {
    literal.strip_prefix(ENV_PREFIX).is_some_and(|rest| {
        !rest.is_empty()
            && rest
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
    })
}

/// Plain string literals in `source`, skipping raw strings and char
/// literals.
fn string_literals(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut literals = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'r' if matches!(bytes.get(i + 1), Some(b'#' | b'"')) => {
                let hashes = bytes[i + 1..].iter().take_while(|b| **b == b'#').count();
                let close = format!("\"{}", "#".repeat(hashes));
                let body = i + 2 + hashes;
                i = source
                    .get(body..)
                    .and_then(|rest| rest.find(&close))
                    .map_or(bytes.len(), |end| body + end + close.len());
            }
            b'\'' if bytes.get(i + 1) == Some(&b'"') => i += 2,
            b'"' => {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] != b'"' {
                    j += if bytes[j] == b'\\' { 2 } else { 1 };
                }
                if let Some(lit) = source.get(start..j.min(bytes.len())) {
                    literals.push(lit);
                }
                i = j + 1;
            }
            _ => i += 1,
        }
    }
    literals
}

fn render_allowlist(keys: &BTreeSet<String>) -> String {
    let mut out = format!("pub const ENV_PREFIX: &str = \"{ENV_PREFIX}\";\n\n");
    out.push_str("pub const GENERATED_QSB_ENV_ALLOWLIST: &[&str] = &[\n");
    for key in keys {
        out.push_str(&format!("    \"{key}\",\n"));
    }
    out.push_str("];\n");
    out
}

fn main() -> std::io::Result<()> {
    let mut keys = BTreeSet::new();
    for reader in ENV_READERS {
        println!("cargo:rerun-if-changed={reader}");
        let source = fs::read_to_string(reader)?;
        keys.extend(
            string_literals(&source)
                .into_iter()
                .filter(|lit| is_env_key(lit))
                .map(str::to_string),
        );
    }

    let out_dir = env::var("OUT_DIR").map_err(std::io::Error::other)?;
    fs::write(
        Path::new(&out_dir).join("qsb_env_allowlist.rs"),
        render_allowlist(&keys),
    )?;

    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        now.as_secs(),
        now.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
