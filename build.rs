use std::env;
use std::fs;
use std::path::PathBuf;

/// Linker memory map for the STM32F100 value-line part.
const MEMORY_MAP: &str = "memory.x";

/// Build script entry.
fn main() {
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();

    println!("cargo:rerun-if-changed={}", MEMORY_MAP);
    println!("cargo:rerun-if-changed=build.rs");

    if target_arch == "arm" {
        configure_for_cortex_m();
    }
}

/// Put `memory.x` on the linker search path and link the demos with the
/// cortex-m-rt script.
fn configure_for_cortex_m() {
    let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    fs::copy(MEMORY_MAP, out.join(MEMORY_MAP)).expect("memory.x is missing");

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rustc-link-arg-examples=-Tlink.x");
}
