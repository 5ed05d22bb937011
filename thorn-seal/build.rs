use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=native/include/seal_shim.h");
    println!("cargo:rerun-if-changed=native/CMakeLists.txt");
    println!("cargo:rerun-if-changed=native/src");

    let dst = cmake::Config::new("native")
        .define("CMAKE_BUILD_TYPE", "Release")
        .build();

    println!("cargo:rustc-link-search=native={}", dst.join("lib").display());
    println!("cargo:rustc-link-search=native={}", dst.join("lib64").display());
    println!("cargo:rustc-link-lib=static=thorn_seal_shim");
    println!("cargo:rustc-link-lib=static=seal-4.1");

    if cfg!(target_os = "linux") {
        println!("cargo:rustc-link-lib=dylib=stdc++");
    } else if cfg!(target_os = "macos") {
        println!("cargo:rustc-link-lib=dylib=c++");
    }

    let bindings = bindgen::Builder::default()
        .header(dst.join("include").join("seal_shim.h").to_string_lossy())
        .clang_arg(format!("-I{}", dst.join("include").display()))
        .allowlist_function("[A-Za-z0-9_]+")
        .allowlist_type("SealShim_Status")
        .size_t_is_usize(true)
        .generate()
        .expect("failed to generate seal_shim bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("failed to write seal_shim bindings");
}
