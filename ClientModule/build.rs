fn main() {
    // The C++ bridge is only generated for hosts that opt into the `cpp` feature
    #[cfg(feature = "cpp")]
    {
        let mut build = cxx_build::bridge("src/ffi/cpp.rs");

        if cfg!(target_os = "windows") {
            build.flag("/std:c++17");
        } else {
            build.flag_if_supported("-std=c++17");
        }

        build.compile("nbridge_client_bridge");

        println!("cargo:rerun-if-changed=src/ffi/cpp.rs");
    }
}
