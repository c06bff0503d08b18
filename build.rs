use std::env;
use std::path::PathBuf;

// FFmpeg discovery on Windows is the most common build failure; surface
// vcpkg hints early instead of letting ffmpeg-sys-next fail deep in its
// probe.
fn main() {
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=VCPKG_ROOT");
    println!("cargo:rerun-if-env-changed=VCPKGRS_DYNAMIC");

    if env::var("CARGO_CFG_TARGET_OS").unwrap_or_default() != "windows"
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=FFMPEG_DIR is not set. On Windows, install FFmpeg via vcpkg and set VCPKG_ROOT + FFMPEG_DIR."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let ffmpeg_dir = PathBuf::from(&vcpkg_root).join("installed").join(&triplet);
    if ffmpeg_dir.exists() {
        println!(
            "cargo:warning=Found a vcpkg install at {}. Set FFMPEG_DIR={} to make FFmpeg discovery explicit.",
            ffmpeg_dir.display(),
            ffmpeg_dir.display(),
        );
    } else {
        println!(
            "cargo:warning=VCPKG_ROOT is set but no FFmpeg install was found at {}.",
            ffmpeg_dir.display(),
        );
    }
}
