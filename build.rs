fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The protos are only needed by the gRPC driver; default builds stay offline.
    #[cfg(feature = "grpc")]
    compile_firestore_protos()?;
    Ok(())
}

#[cfg(feature = "grpc")]
const GOOGLEAPIS: &str = "https://raw.githubusercontent.com/googleapis/googleapis/master";

#[cfg(feature = "grpc")]
const PROTO_FILES: &[&str] = &[
    "google/firestore/v1/firestore.proto",
    "google/firestore/v1/common.proto",
    "google/firestore/v1/document.proto",
    "google/firestore/v1/query.proto",
    "google/firestore/v1/write.proto",
    "google/firestore/v1/aggregation_result.proto",
    "google/firestore/v1/bloom_filter.proto",
    "google/firestore/v1/explain_stats.proto",
    "google/firestore/v1/pipeline.proto",
    "google/firestore/v1/query_profile.proto",
    "google/api/annotations.proto",
    "google/api/client.proto",
    "google/api/field_behavior.proto",
    "google/api/http.proto",
    "google/api/launch_stage.proto",
    "google/api/routing.proto",
    "google/rpc/status.proto",
    "google/type/latlng.proto",
];

#[cfg(feature = "grpc")]
fn compile_firestore_protos() -> Result<(), Box<dyn std::error::Error>> {
    use std::path::PathBuf;

    let out_dir = std::env::var("OUT_DIR")?;
    let proto_dir = PathBuf::from(&out_dir).join("proto");

    for path in PROTO_FILES {
        let dest = proto_dir.join(path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = ureq::get(&format!("{}/{}", GOOGLEAPIS, path))
            .call()?
            .into_string()?;
        std::fs::write(&dest, content)?;
    }

    // All files in one call so cross-package references resolve
    tonic_build::configure()
        .build_server(false)
        .compile_protos(
            &[proto_dir.join("google/firestore/v1/firestore.proto")],
            &[proto_dir],
        )?;

    // google.firestore.v1 refers to super::super::rpc and
    // super::super::super::r#type, so lay the modules out to match.
    let module = format!(
        r#"
#[path = "{out_dir}/google.r#type.rs"]
pub mod r#type;

pub mod google {{
    #[path = "{out_dir}/google.rpc.rs"]
    pub mod rpc;

    pub mod firestore {{
        #[path = "{out_dir}/google.firestore.v1.rs"]
        pub mod v1;
    }}

    pub use super::r#type;
}}
"#
    );
    std::fs::write(PathBuf::from(&out_dir).join("proto.rs"), module)?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
