// Build script that tries to generate the C header with `cbindgen`.
// If `cbindgen` is not available, it copies the checked-in
// `include/goldfish_audio.h` to $OUT_DIR.
//
// Either way, consumers can include the header from:
//   - <repo>/goldfish-ffi/include/goldfish_audio.h   (checked-in)
//   - $OUT_DIR/goldfish_audio.h

use std::{env, fs, path::PathBuf, process::Command};

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=include/goldfish_audio.h");

    let (Some(crate_dir), Some(out_dir)) = (env::var_os("CARGO_MANIFEST_DIR"), env::var_os("OUT_DIR")) else {
        println!("cargo:warning=goldfish-ffi: cargo did not set the manifest/out dirs; skipping header");
        return;
    };
    let crate_dir = PathBuf::from(crate_dir);
    let header_repo = crate_dir.join("include").join("goldfish_audio.h");
    let header_out = PathBuf::from(out_dir).join("goldfish_audio.h");

    let cbindgen_ok = Command::new("cbindgen")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    if cbindgen_ok {
        let generated = Command::new("cbindgen")
            .args(["--crate", "goldfish-ffi", "--lang", "C", "--output"])
            .arg(&header_out)
            .current_dir(&crate_dir)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if generated {
            println!("cargo:warning=goldfish-ffi: generated header with cbindgen -> {}", header_out.display());
            return;
        }
        println!("cargo:warning=goldfish-ffi: cbindgen failed; using checked-in header");
    }

    if let Err(e) = fs::copy(&header_repo, &header_out) {
        println!("cargo:warning=goldfish-ffi: could not copy {}: {e}", header_repo.display());
    }
}
