// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

// 构建脚本: ez-ffmpeg 静态链接时补齐 Windows MSVC 下的系统库
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_env = std::env::var("CARGO_CFG_TARGET_ENV").unwrap_or_default();
    if target_os != "windows" || target_env != "msvc" {
        return;
    }

    // mfx: Intel QSV, x264: 编码器, oleaut32/vfw32: dshow 输入, secur32: HTTP(S)/TLS
    for lib in ["libmfx", "libx264", "oleaut32", "vfw32", "secur32"] {
        println!("cargo:rustc-link-lib=dylib={}", lib);
    }
}
