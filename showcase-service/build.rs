use std::env::var;
use std::io::Result;

fn main() -> Result<()> {
    let proto_files = &[
        // Custom method options
        "proto/tier/v1/options.proto",
        // Services
        "proto/showcase/v1/showcase.proto",
    ];

    let proto_folder = "proto";
    let out_dir = var("OUT_DIR").expect("Missing OUT_DIR environment variable");
    let descriptors_path = format!("{}/descriptors.bin", out_dir);

    for file in proto_files {
        println!("cargo:rerun-if-changed={file}");
    }

    tonic_prost_build::configure()
        .file_descriptor_set_path(descriptors_path)
        .protoc_arg("--experimental_allow_proto3_optional")
        .build_client(false)
        .compile_protos(proto_files, &[proto_folder])?;

    Ok(())
}
