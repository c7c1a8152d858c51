fn main() {
    // The hardware encoder talks to librockchip_mpp directly; only link it
    // when the `mpp` feature is enabled so plain builds work off-device.
    if std::env::var_os("CARGO_FEATURE_MPP").is_some() {
        println!("cargo:rustc-link-lib=dylib=rockchip_mpp");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
