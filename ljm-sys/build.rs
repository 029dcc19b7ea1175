//! Build script for ljm-sys FFI bindings.
//!
//! With the `ljm-sdk` feature the crate links against the vendor LabJackM
//! shared library. Without it, panicking stub implementations of the LJM
//! entry points are compiled instead (see `src/lib.rs`), so the workspace
//! builds and tests on machines without the vendor runtime installed.

fn main() {
    println!("cargo:rerun-if-env-changed=LJM_LIB_DIR");

    #[cfg(feature = "ljm-sdk")]
    {
        if let Ok(dir) = std::env::var("LJM_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        } else {
            // Standard install locations for the vendor runtime
            for path in [
                "/usr/local/lib",
                "/usr/lib",
                "/opt/labjack_ljm/lib",
                "/usr/lib/x86_64-linux-gnu",
            ] {
                if std::path::Path::new(path).join("libLabJackM.so").exists() {
                    println!("cargo:rustc-link-search=native={}", path);
                    break;
                }
            }
        }
        println!("cargo:rustc-link-lib=LabJackM");
    }
}
