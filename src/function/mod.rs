//! Function descriptors and the conversions between their wire shapes.

pub mod descriptor;

pub use descriptor::{
    request_to_summary, summary_to_request, CreateFunctionRequest, DeleteFunctionRequest,
    FunctionDescriptor, FunctionSummary,
};
