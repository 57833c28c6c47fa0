//! C++ view of the FFI entry points, generated by cxx.

#[cxx::bridge(namespace = "nbridge::ffi")]
mod bridge {
    extern "Rust" {
        fn cpp_install_dispatcher(ptr: usize);
        fn cpp_on_events(data: &[u8]) -> bool;
        fn cpp_force_update() -> bool;
    }
}

fn cpp_install_dispatcher(ptr: usize) {
    super::nbridge_install_dispatcher(ptr);
}

fn cpp_on_events(data: &[u8]) -> bool {
    super::on_events(data)
}

fn cpp_force_update() -> bool {
    super::force_update()
}
