//! Build script for seriq-firmware
//!
//! - Sets up linker search paths and scripts for memory.x
//! - Validates serial.toml at compile time
//! - Emits the validated settings as Rust constants in OUT_DIR

use std::env;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use seriq_hal::UartConfig;

/// Pattern slots are tracked in a 32-bit trigger mask
const MAX_PATTERN_SLOTS: usize = 32;

fn main() {
    setup_linker();
    let config = load_config();
    validate_config(&config);
    write_constants(&config);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SerialToml {
    uart: PortSection,
    #[serde(default)]
    line: UartConfig,
    #[serde(default)]
    buffers: BufferSection,
    #[serde(default, rename = "match")]
    matching: MatchSection,
    #[serde(default)]
    echo: EchoSection,
    #[serde(default)]
    self_check: SelfCheckSection,
    #[serde(default, rename = "reply")]
    replies: Vec<Reply>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PortSection {
    id: u8,
    tx_pin: u8,
    rx_pin: u8,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BufferSection {
    rx: usize,
    tx: usize,
}

impl Default for BufferSection {
    fn default() -> Self {
        Self { rx: 64, tx: 64 }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct MatchSection {
    max_patterns: usize,
    max_seq_len: usize,
    poll_ms: u64,
}

impl Default for MatchSection {
    fn default() -> Self {
        Self {
            max_patterns: 8,
            max_seq_len: 8,
            poll_ms: 10,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct EchoSection {
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SelfCheckSection {
    enabled: bool,
    text: String,
}

impl Default for SelfCheckSection {
    fn default() -> Self {
        Self {
            enabled: false,
            text: "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Reply {
    pattern: String,
    text: String,
}

/// Read and parse serial.toml
fn load_config() -> SerialToml {
    // Re-run if serial.toml changes
    println!("cargo:rerun-if-changed=serial.toml");

    let config_path = Path::new("serial.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: serial.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a serial.toml configuration file.         ║\n\
            ║  Please create one in the seriq-firmware directory.              ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read serial.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    match toml::from_str(&config_content) {
        Ok(config) => config,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid serial.toml                                      ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    }
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.chars().count() > 64 {
                format!("{}...", line.chars().take(61).collect::<String>())
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// RP2040 pins that can carry UART TX (even) or RX (odd) for each UART
fn uart_pins(id: u8) -> &'static [u8] {
    match id {
        0 => &[0, 1, 12, 13, 16, 17, 28, 29],
        1 => &[4, 5, 8, 9, 20, 21, 24, 25],
        _ => &[],
    }
}

/// Cross-check values serde cannot check on its own
fn validate_config(config: &SerialToml) {
    let mut errors = Vec::new();

    let port = &config.uart;
    if port.id > 1 {
        errors.push(format!("[uart] id must be 0 or 1, got {}", port.id));
    } else {
        let pins = uart_pins(port.id);
        if !pins.contains(&port.tx_pin) || port.tx_pin % 2 != 0 {
            errors.push(format!(
                "[uart] tx_pin {} is not a TX pin of UART{}",
                port.tx_pin, port.id
            ));
        }
        if !pins.contains(&port.rx_pin) || port.rx_pin % 2 != 1 {
            errors.push(format!(
                "[uart] rx_pin {} is not an RX pin of UART{}",
                port.rx_pin, port.id
            ));
        }
    }

    if config.buffers.rx == 0 {
        errors.push("[buffers] rx must be non-zero".to_string());
    }
    if config.buffers.tx == 0 {
        errors.push("[buffers] tx must be non-zero".to_string());
    }

    let matching = &config.matching;
    if matching.max_patterns == 0 || matching.max_patterns > MAX_PATTERN_SLOTS {
        errors.push(format!(
            "[match] max_patterns must be 1-{}",
            MAX_PATTERN_SLOTS
        ));
    }
    if matching.max_seq_len == 0 {
        errors.push("[match] max_seq_len must be non-zero".to_string());
    }
    if matching.poll_ms == 0 {
        errors.push("[match] poll_ms must be non-zero".to_string());
    }
    if config.replies.len() > matching.max_patterns {
        errors.push(format!(
            "{} [[reply]] entries but max_patterns is {}",
            config.replies.len(),
            matching.max_patterns
        ));
    }

    let check = &config.self_check;
    if check.enabled {
        if check.text.is_empty() {
            errors.push("[self_check] text must not be empty".to_string());
        }
        // peek can only see what fits in the RX buffer
        if check.text.len() > config.buffers.rx {
            errors.push(format!(
                "[self_check] text is {} bytes, RX buffer holds {}",
                check.text.len(),
                config.buffers.rx
            ));
        }
    }

    for (i, reply) in config.replies.iter().enumerate() {
        if reply.pattern.is_empty() {
            // Would fire on every received byte
            errors.push(format!("[[reply]] {} has an empty pattern", i));
        } else if reply.pattern.len() > matching.max_seq_len {
            println!(
                "cargo:warning=serial.toml: reply {} pattern is {} bytes, only the first {} are matched",
                i,
                reply.pattern.len(),
                matching.max_seq_len
            );
        }
        if reply.text.len() > config.buffers.tx {
            println!(
                "cargo:warning=serial.toml: reply {} text is longer than the TX buffer and will block the sweep",
                i
            );
        }
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid serial configuration                             ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=serial.toml validated successfully");
}

/// Byte string literal usable in a `&'static [u8]` constant
fn byte_literal(text: &str) -> String {
    let mut out = String::from("b\"");
    for byte in text.bytes() {
        write!(out, "\\x{:02x}", byte).unwrap();
    }
    out.push('"');
    out
}

/// Emit serial_config.rs into OUT_DIR
fn write_constants(config: &SerialToml) {
    let line = &config.line;
    let mut out = String::new();

    writeln!(out, "// Generated by build.rs from serial.toml").unwrap();
    writeln!(
        out,
        "pub const UART_ID: seriq_hal_rp2040::UartId = seriq_hal_rp2040::UartId::Uart{};",
        config.uart.id
    )
    .unwrap();
    writeln!(out, "pub const TX_PIN: u8 = {};", config.uart.tx_pin).unwrap();
    writeln!(out, "pub const RX_PIN: u8 = {};", config.uart.rx_pin).unwrap();
    writeln!(
        out,
        "pub const LINE: seriq_hal::UartConfig = seriq_hal::UartConfig {{ \
         baudrate: {}, \
         data_bits: seriq_hal::DataBits::{:?}, \
         stop_bits: seriq_hal::StopBits::{:?}, \
         parity: seriq_hal::Parity::{:?} }};",
        line.baudrate, line.data_bits, line.stop_bits, line.parity
    )
    .unwrap();
    writeln!(out, "pub const RX_CAPACITY: usize = {};", config.buffers.rx).unwrap();
    writeln!(out, "pub const TX_CAPACITY: usize = {};", config.buffers.tx).unwrap();
    writeln!(
        out,
        "pub const MAX_PATTERNS: usize = {};",
        config.matching.max_patterns
    )
    .unwrap();
    writeln!(
        out,
        "pub const MAX_SEQ_LEN: usize = {};",
        config.matching.max_seq_len
    )
    .unwrap();
    writeln!(out, "pub const MATCH_POLL_MS: u64 = {};", config.matching.poll_ms).unwrap();
    writeln!(out, "pub const ECHO: bool = {};", config.echo.enabled).unwrap();
    if config.self_check.enabled {
        writeln!(
            out,
            "pub const SELF_CHECK: Option<&[u8]> = Some({});",
            byte_literal(&config.self_check.text)
        )
        .unwrap();
    } else {
        writeln!(out, "pub const SELF_CHECK: Option<&[u8]> = None;").unwrap();
    }

    writeln!(out, "pub const REPLIES: &[(&[u8], &[u8])] = &[").unwrap();
    for reply in &config.replies {
        writeln!(
            out,
            "    ({}, {}),",
            byte_literal(&reply.pattern),
            byte_literal(&reply.text)
        )
        .unwrap();
    }
    writeln!(out, "];").unwrap();

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("serial_config.rs"), out).unwrap();
}
