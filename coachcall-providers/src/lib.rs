pub mod backend;
pub mod gateway;
pub mod parse;
pub mod request;
pub mod runtime;
pub mod sdk_manifest;
