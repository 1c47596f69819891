//! Generates the gRPC client and server for the `greeter.v1.Command` service.
//!
//! The messages are hand-written prost types in `transport::rpc::proto`, so
//! no `protoc` is needed at build time.

fn main() {
    let handle = tonic_build::manual::Method::builder()
        .name("handle")
        .route_name("Handle")
        .input_type("crate::transport::rpc::proto::CommandArguments")
        .output_type("crate::transport::rpc::proto::CommandResult")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let handle_stream = tonic_build::manual::Method::builder()
        .name("handle_stream")
        .route_name("HandleStream")
        .input_type("crate::transport::rpc::proto::CommandArguments")
        .output_type("crate::transport::rpc::proto::CommandResult")
        .codec_path("tonic::codec::ProstCodec")
        .client_streaming()
        .server_streaming()
        .build();

    let service = tonic_build::manual::Service::builder()
        .name("Command")
        .package("greeter.v1")
        .method(handle)
        .method(handle_stream)
        .build();

    println!("cargo:rerun-if-changed=build.rs");
    tonic_build::manual::Builder::new().compile(&[service]);
}
