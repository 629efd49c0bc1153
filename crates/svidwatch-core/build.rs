/// Builds the gRPC client and server code for `delegation.proto` using
/// `tonic-prost-build`.
///
/// The client half is what the watch manager uses. The server half is
/// generated as well so tests can stand up an in-process agent.
///
/// # Files and Paths
///
/// - Proto file: `proto/delegation.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// Panics if code generation fails.
///
/// # Output
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("delegation.v1");
/// }
/// ```
fn main() {
    println!("cargo:rerun-if-changed=proto/delegation.proto");

    tonic_prost_build::configure()
        .compile_protos(&["proto/delegation.proto"], &["proto"])
        .unwrap();
}
